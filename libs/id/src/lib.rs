//! # stockroom-id
//!
//! Typed resource IDs for the stockroom inventory service.
//!
//! Resource IDs are system-generated and never shown as an item's business
//! identifier; the human-facing "custom ID" of an item is produced by
//! `stockroom-idformat` and lives alongside the item as a plain string.
//!
//! ## ID Format
//!
//! All resource IDs use a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `inv_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `itm_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//!
//! The crate also defines [`SequenceValue`], the integer handed out by an
//! inventory's sequence counter.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
