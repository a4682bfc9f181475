//! stockroom inventory API library.
//!
//! This crate primarily ships an `inventory-api` binary, but we expose a small
//! library surface to enable integration testing and reuse.

pub mod api;
pub mod arbiter;
pub mod config;
pub mod db;
pub mod identifiers;
pub mod sequence;
pub mod state;
