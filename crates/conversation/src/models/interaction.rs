//! Interaction model: a message or event in a thread's log

use super::ThreadId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an interaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InteractionId(pub String);

impl InteractionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for InteractionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for InteractionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Bookkeeping and notice events shown inline in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoMessageKind {
    GroupUpdate,
    DisappearingMessagesUpdate,
    SessionReset,
    /// Safety number verification changed; never shown in the inbox
    VerificationStateChange,
    /// Profile key exchange; never shown in the inbox
    ProfileKeyUpdate,
}

impl InfoMessageKind {
    pub fn appears_in_inbox(&self) -> bool {
        !matches!(
            self,
            InfoMessageKind::VerificationStateChange | InfoMessageKind::ProfileKeyUpdate
        )
    }

    /// Preview text used when the event is the latest inbox item
    pub fn preview_text(&self) -> &'static str {
        match self {
            InfoMessageKind::GroupUpdate => "Group updated",
            InfoMessageKind::DisappearingMessagesUpdate => "Disappearing messages updated",
            InfoMessageKind::SessionReset => "Secure session reset",
            InfoMessageKind::VerificationStateChange => "Verification state changed",
            InfoMessageKind::ProfileKeyUpdate => "Profile updated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InteractionKind {
    IncomingMessage { author_id: String },
    OutgoingMessage,
    Info { info: InfoMessageKind },
}

/// Friend-request state carried by a message that initiated a handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendRequestMessageState {
    Pending,
    Accepted,
    Expired,
    Failed,
}

/// A single entry in a thread's interaction log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: InteractionId,
    pub thread_id: ThreadId,
    /// Logical position in the log, assigned by the store on first save.
    /// Zero means "not yet saved".
    #[serde(default)]
    pub sort_id: u64,
    /// Wall-clock time the interaction was sent or received
    pub timestamp: DateTime<Utc>,
    pub kind: InteractionKind,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub friend_request: Option<FriendRequestMessageState>,
}

impl Interaction {
    pub fn builder(id: InteractionId, thread_id: ThreadId) -> InteractionBuilder {
        InteractionBuilder::new(id, thread_id)
    }

    pub fn is_incoming(&self) -> bool {
        matches!(self.kind, InteractionKind::IncomingMessage { .. })
    }

    pub fn is_outgoing(&self) -> bool {
        matches!(self.kind, InteractionKind::OutgoingMessage)
    }

    /// Sent or received message content, as opposed to control events
    pub fn is_content(&self) -> bool {
        self.is_incoming() || self.is_outgoing()
    }

    pub fn appears_in_inbox(&self) -> bool {
        match &self.kind {
            InteractionKind::Info { info } => info.appears_in_inbox(),
            _ => true,
        }
    }

    pub fn is_unread(&self) -> bool {
        self.is_incoming() && !self.is_read
    }

    pub fn is_friend_request(&self) -> bool {
        self.friend_request.is_some()
    }

    pub fn is_pending_friend_request(&self) -> bool {
        self.friend_request == Some(FriendRequestMessageState::Pending)
    }

    /// Text shown as the thread's preview in the conversation list
    pub fn preview_text(&self) -> String {
        match &self.kind {
            InteractionKind::Info { info } => info.preview_text().to_string(),
            _ => self.body.clone().unwrap_or_default(),
        }
    }
}

/// Builder for creating Interaction instances
pub struct InteractionBuilder {
    id: InteractionId,
    thread_id: ThreadId,
    timestamp: Option<DateTime<Utc>>,
    kind: InteractionKind,
    body: Option<String>,
    is_read: bool,
    friend_request: Option<FriendRequestMessageState>,
}

impl InteractionBuilder {
    fn new(id: InteractionId, thread_id: ThreadId) -> Self {
        Self {
            id,
            thread_id,
            timestamp: None,
            kind: InteractionKind::OutgoingMessage,
            body: None,
            is_read: false,
            friend_request: None,
        }
    }

    /// Incoming message authored by `author_id`; starts unread
    pub fn incoming(mut self, author_id: impl Into<String>) -> Self {
        self.kind = InteractionKind::IncomingMessage {
            author_id: author_id.into(),
        };
        self.is_read = false;
        self
    }

    /// Outgoing message; outgoing messages are always read
    pub fn outgoing(mut self) -> Self {
        self.kind = InteractionKind::OutgoingMessage;
        self.is_read = true;
        self
    }

    pub fn info(mut self, info: InfoMessageKind) -> Self {
        self.kind = InteractionKind::Info { info };
        self.is_read = true;
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    /// Mark this message as carrying a pending friend request
    pub fn friend_request(mut self) -> Self {
        self.friend_request = Some(FriendRequestMessageState::Pending);
        self
    }

    pub fn build(self) -> Interaction {
        Interaction {
            id: self.id,
            thread_id: self.thread_id,
            sort_id: 0,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            kind: self.kind,
            body: self.body,
            is_read: self.is_read,
            friend_request: self.friend_request,
        }
    }
}
