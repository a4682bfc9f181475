//! Application state shared across request handlers.

use std::sync::Arc;

use crate::db::Database;
use crate::identifiers::IdentifierService;

/// Shared application state.
///
/// This is passed to all request handlers via Axum's state extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    db: Database,
    identifiers: IdentifierService,
}

impl AppState {
    /// Create a new application state.
    pub fn new(db: Database, max_id_attempts: u32) -> Self {
        let identifiers = IdentifierService::new(db.clone(), max_id_attempts);
        Self {
            inner: Arc::new(AppStateInner { db, identifiers }),
        }
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.inner.db
    }

    pub fn identifiers(&self) -> &IdentifierService {
        &self.inner.identifiers
    }
}
