//! # stockroom-idformat
//!
//! The custom identifier engine for inventories.
//!
//! An inventory owner composes an [`IdentifierFormat`]: an ordered list of
//! [`FormatElement`]s (fixed text, random numbers, GUIDs, a timestamp and a
//! zero-padded sequence number). Rendering a format concatenates one fragment
//! per element, in list order, with no implicit separators.
//!
//! ## Modules
//!
//! - [`element`]: element kinds, wire form and per-element validation
//! - [`format`]: the validated, ordered format
//! - [`generate`]: one generator per element kind
//! - [`preview`]: trial (non-committing) and authoritative rendering
//! - [`editor`]: the Viewing / Editing / Saving state machine
//! - [`role`]: inventory roles and the permissions they carry
//!
//! Nothing here touches shared state. Sequence values are handed in by the
//! caller; the service that owns the counter lives in `stockroom-api`.

pub mod editor;
pub mod element;
mod error;
pub mod format;
pub mod generate;
pub mod preview;
pub mod role;

pub use editor::{EditorError, EditorState, FormatEditor, SaveFailure};
pub use element::{ElementKind, FormatElement, RawFormatElement};
pub use error::{ElementError, FormatError};
pub use format::{IdentifierFormat, RECOMMENDED_MAX_ELEMENTS, RECOMMENDED_MAX_SEQUENCE_WIDTH};
pub use generate::GenerationContext;
pub use preview::{
    generate_authoritative, generate_authoritative_with, preview_trial, AuthoritativeId,
    GenerationMode,
};
pub use role::InventoryRole;
