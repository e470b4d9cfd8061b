//! Friend request handshake for one-to-one threads
//!
//! `status` holds the six states and the allowed-transition table; `machine`
//! adds the transition operations to [`Thread`](crate::models::Thread).
//! Group threads never take part.

mod machine;
mod status;

pub use status::{ALL_FRIEND_REQUEST_STATUSES, FriendRequestStatus};
