//! Domain errors for thread operations
//!
//! These travel inside `anyhow::Error`; callers that need to branch on them use
//! `err.downcast_ref::<ThreadError>()`.

use crate::friend_request::FriendRequestStatus;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ThreadError {
    /// The friend-request table does not allow this transition.
    /// Nothing was written.
    #[error("invalid friend request transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: FriendRequestStatus,
        to: FriendRequestStatus,
    },

    /// A write reached the store without an open read-write transaction
    #[error("mutation attempted outside a read-write transaction")]
    MissingTransaction,

    #[error("not found: {0}")]
    NotFound(String),
}

impl ThreadError {
    pub fn thread_not_found(id: &crate::models::ThreadId) -> Self {
        ThreadError::NotFound(format!("thread {}", id.as_str()))
    }

    /// Returns the `ThreadError` wrapped in an `anyhow::Error`, if any
    pub fn from_anyhow(err: &anyhow::Error) -> Option<&ThreadError> {
        err.downcast_ref::<ThreadError>()
    }
}
