//! Errors raised by the keyed stores behind the rule cache and review queue.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already resolved: {0}")]
    AlreadyResolved(String),

    /// The backing store itself failed (connection, lock, I/O).
    #[error("store backend error: {0}")]
    Backend(String),
}
