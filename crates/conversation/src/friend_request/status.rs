//! Friend request status values and the allowed-transition table

use serde::{Deserialize, Serialize};

/// Where a one-to-one thread stands in the friend request handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestStatus {
    #[default]
    None,
    /// Local user started sending a request; not yet confirmed
    RequestSending,
    RequestSent,
    RequestReceived,
    Friends,
    RequestExpired,
}

/// Every status, in handshake order
pub const ALL_FRIEND_REQUEST_STATUSES: [FriendRequestStatus; 6] = [
    FriendRequestStatus::None,
    FriendRequestStatus::RequestSending,
    FriendRequestStatus::RequestSent,
    FriendRequestStatus::RequestReceived,
    FriendRequestStatus::Friends,
    FriendRequestStatus::RequestExpired,
];

impl FriendRequestStatus {
    /// Human-readable label, for display only
    pub fn description(&self) -> &'static str {
        match self {
            FriendRequestStatus::None => "none",
            FriendRequestStatus::RequestSending => "sending request",
            FriendRequestStatus::RequestSent => "request sent",
            FriendRequestStatus::RequestReceived => "request received",
            FriendRequestStatus::Friends => "friends",
            FriendRequestStatus::RequestExpired => "request expired",
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            FriendRequestStatus::RequestSending
                | FriendRequestStatus::RequestSent
                | FriendRequestStatus::RequestReceived
        )
    }

    pub fn is_sent_by_current_user(&self) -> bool {
        matches!(
            self,
            FriendRequestStatus::RequestSending | FriendRequestStatus::RequestSent
        )
    }

    /// Whether the handshake allows moving from `self` to `next`
    pub fn can_transition_to(&self, next: FriendRequestStatus) -> bool {
        use FriendRequestStatus::*;

        match self {
            None => matches!(next, RequestSending | RequestReceived),
            // None: the send failed before it left the device
            RequestSending => matches!(next, RequestSent | Friends | None),
            RequestSent => matches!(next, RequestReceived | Friends | RequestExpired),
            RequestReceived => {
                matches!(next, RequestReceived | RequestSent | Friends | RequestExpired)
            }
            RequestExpired => matches!(next, RequestSending | RequestReceived),
            Friends => next == Friends,
        }
    }
}
