//! Idempotency records.
//!
//! Item creation consumes a sequence value, so a client that retries after a
//! dropped response would otherwise mint a second item. When the request
//! carries an `Idempotency-Key`, the key is reserved before any work is done,
//! the first response is stored against it and replayed for retries with the
//! same body. Reusing the key with a different body is a conflict; reusing it
//! while the first request is still running is reported as in progress.

use std::time::Duration;

/// A reservation nobody completed within this window (the request crashed or
/// was dropped) can be taken over by the next request with the same key.
pub const RESERVATION_TTL: Duration = Duration::from_secs(60);

/// A stored record. `response_status_code` is `None` while the request that
/// reserved the key is still running.
#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyRecord {
    pub request_hash: String,
    pub response_status_code: Option<i32>,
    pub response_body: Option<serde_json::Value>,
}

/// Result of reserving an idempotency key.
#[derive(Debug)]
pub enum IdempotencyCheck {
    /// The key is now reserved for this request - proceed.
    NotFound,
    /// Found a completed record for the same request - return the cached response.
    Found(IdempotencyRecord),
    /// The same request is still being processed under this key.
    InProgress,
    /// Found record with different request hash - conflict.
    Conflict,
}

impl IdempotencyCheck {
    /// Compares an existing record (if any) against the incoming request hash.
    pub fn evaluate(record: Option<IdempotencyRecord>, request_hash: &str) -> Self {
        match record {
            None => IdempotencyCheck::NotFound,
            Some(r) if r.request_hash != request_hash => IdempotencyCheck::Conflict,
            Some(r) if r.response_status_code.is_none() => IdempotencyCheck::InProgress,
            Some(r) => IdempotencyCheck::Found(r),
        }
    }
}

/// Lookup key for a record. Keys are scoped per inventory, actor and endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyScope {
    pub inventory_id: String,
    pub actor_id: String,
    pub endpoint_name: String,
    pub idempotency_key: String,
}

/// Input for completing a reservation with the response.
#[derive(Debug)]
pub struct StoreIdempotencyRecord {
    pub scope: IdempotencyScope,
    pub request_hash: String,
    pub response_status_code: i32,
    pub response_body: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str) -> IdempotencyRecord {
        IdempotencyRecord {
            request_hash: hash.to_string(),
            response_status_code: Some(201),
            response_body: None,
        }
    }

    fn pending(hash: &str) -> IdempotencyRecord {
        IdempotencyRecord {
            response_status_code: None,
            ..record(hash)
        }
    }

    #[test]
    fn evaluate_variants() {
        assert!(matches!(
            IdempotencyCheck::evaluate(None, "abc"),
            IdempotencyCheck::NotFound
        ));
        assert!(matches!(
            IdempotencyCheck::evaluate(Some(record("abc")), "abc"),
            IdempotencyCheck::Found(_)
        ));
        assert!(matches!(
            IdempotencyCheck::evaluate(Some(record("abc")), "def"),
            IdempotencyCheck::Conflict
        ));
        assert!(matches!(
            IdempotencyCheck::evaluate(Some(pending("abc")), "abc"),
            IdempotencyCheck::InProgress
        ));
        assert!(matches!(
            IdempotencyCheck::evaluate(Some(pending("abc")), "def"),
            IdempotencyCheck::Conflict
        ));
    }
}
