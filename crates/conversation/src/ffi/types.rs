//! FFI-friendly type wrappers for UniFFI export
//!
//! These types convert internal Rust types to FFI-compatible versions:
//! - `DateTime<Utc>` → `i64` (Unix timestamp, seconds)
//! - `ThreadId`/`InteractionId` → `String`
//! - Tagged enums → flat records

use chrono::{DateTime, TimeZone, Utc};

use crate::error::ThreadError;
use crate::friend_request::FriendRequestStatus;
use crate::models::{
    ConversationColorName, DisappearingMessagesConfiguration, FriendRequestMessageState,
    InfoMessageKind, Interaction, InteractionKind,
};
use crate::query::{ThreadDetail, ThreadFilter, ThreadSummary};

// ============================================================================
// Error Types
// ============================================================================

/// FFI-friendly error type
#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum ConversationError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Invalid friend request transition: {message}")]
    InvalidTransition { message: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
}

impl From<anyhow::Error> for ConversationError {
    fn from(e: anyhow::Error) -> Self {
        match ThreadError::from_anyhow(&e) {
            Some(ThreadError::InvalidTransition { .. }) => ConversationError::InvalidTransition {
                message: e.to_string(),
            },
            Some(ThreadError::NotFound(resource)) => ConversationError::NotFound {
                resource: resource.clone(),
            },
            _ => ConversationError::Database {
                message: format!("{e:#}"),
            },
        }
    }
}

/// Unix seconds to `DateTime<Utc>`
pub(crate) fn timestamp_to_datetime(seconds: i64) -> Result<DateTime<Utc>, ConversationError> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| ConversationError::InvalidArgument {
            message: format!("timestamp out of range: {seconds}"),
        })
}

// ============================================================================
// Enums
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiFriendRequestStatus {
    None,
    RequestSending,
    RequestSent,
    RequestReceived,
    Friends,
    RequestExpired,
}

impl From<FriendRequestStatus> for FfiFriendRequestStatus {
    fn from(s: FriendRequestStatus) -> Self {
        match s {
            FriendRequestStatus::None => FfiFriendRequestStatus::None,
            FriendRequestStatus::RequestSending => FfiFriendRequestStatus::RequestSending,
            FriendRequestStatus::RequestSent => FfiFriendRequestStatus::RequestSent,
            FriendRequestStatus::RequestReceived => FfiFriendRequestStatus::RequestReceived,
            FriendRequestStatus::Friends => FfiFriendRequestStatus::Friends,
            FriendRequestStatus::RequestExpired => FfiFriendRequestStatus::RequestExpired,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiColorName {
    Crimson,
    Vermilion,
    Burlap,
    Forest,
    Wintergreen,
    Teal,
    Blue,
    Indigo,
    Violet,
    Plum,
    Taupe,
    Steel,
}

impl From<ConversationColorName> for FfiColorName {
    fn from(c: ConversationColorName) -> Self {
        match c {
            ConversationColorName::Crimson => FfiColorName::Crimson,
            ConversationColorName::Vermilion => FfiColorName::Vermilion,
            ConversationColorName::Burlap => FfiColorName::Burlap,
            ConversationColorName::Forest => FfiColorName::Forest,
            ConversationColorName::Wintergreen => FfiColorName::Wintergreen,
            ConversationColorName::Teal => FfiColorName::Teal,
            ConversationColorName::Blue => FfiColorName::Blue,
            ConversationColorName::Indigo => FfiColorName::Indigo,
            ConversationColorName::Violet => FfiColorName::Violet,
            ConversationColorName::Plum => FfiColorName::Plum,
            ConversationColorName::Taupe => FfiColorName::Taupe,
            ConversationColorName::Steel => FfiColorName::Steel,
        }
    }
}

impl From<FfiColorName> for ConversationColorName {
    fn from(c: FfiColorName) -> Self {
        match c {
            FfiColorName::Crimson => ConversationColorName::Crimson,
            FfiColorName::Vermilion => ConversationColorName::Vermilion,
            FfiColorName::Burlap => ConversationColorName::Burlap,
            FfiColorName::Forest => ConversationColorName::Forest,
            FfiColorName::Wintergreen => ConversationColorName::Wintergreen,
            FfiColorName::Teal => ConversationColorName::Teal,
            FfiColorName::Blue => ConversationColorName::Blue,
            FfiColorName::Indigo => ConversationColorName::Indigo,
            FfiColorName::Violet => ConversationColorName::Violet,
            FfiColorName::Plum => ConversationColorName::Plum,
            FfiColorName::Taupe => ConversationColorName::Taupe,
            FfiColorName::Steel => ConversationColorName::Steel,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiThreadFilter {
    Inbox,
    Archived,
    All,
}

impl From<FfiThreadFilter> for ThreadFilter {
    fn from(f: FfiThreadFilter) -> Self {
        match f {
            FfiThreadFilter::Inbox => ThreadFilter::Inbox,
            FfiThreadFilter::Archived => ThreadFilter::Archived,
            FfiThreadFilter::All => ThreadFilter::All,
        }
    }
}

/// Flattened interaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiInteractionKind {
    Incoming,
    Outgoing,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiFriendRequestMessageState {
    Pending,
    Accepted,
    Expired,
    Failed,
}

impl From<FriendRequestMessageState> for FfiFriendRequestMessageState {
    fn from(s: FriendRequestMessageState) -> Self {
        match s {
            FriendRequestMessageState::Pending => FfiFriendRequestMessageState::Pending,
            FriendRequestMessageState::Accepted => FfiFriendRequestMessageState::Accepted,
            FriendRequestMessageState::Expired => FfiFriendRequestMessageState::Expired,
            FriendRequestMessageState::Failed => FfiFriendRequestMessageState::Failed,
        }
    }
}

// ============================================================================
// Interaction Types
// ============================================================================

/// FFI-friendly interaction representation
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiInteraction {
    pub id: String,
    pub thread_id: String,
    pub sort_id: u64,
    /// Unix timestamp (seconds since epoch)
    pub timestamp: i64,
    pub kind: FfiInteractionKind,
    /// Set for incoming messages
    pub author_id: Option<String>,
    pub body: Option<String>,
    /// Display text; for info events this is the event description
    pub preview_text: String,
    pub is_read: bool,
    pub friend_request: Option<FfiFriendRequestMessageState>,
}

impl From<Interaction> for FfiInteraction {
    fn from(i: Interaction) -> Self {
        let preview_text = i.preview_text();
        let (kind, author_id) = match i.kind {
            InteractionKind::IncomingMessage { author_id } => {
                (FfiInteractionKind::Incoming, Some(author_id))
            }
            InteractionKind::OutgoingMessage => (FfiInteractionKind::Outgoing, None),
            InteractionKind::Info { .. } => (FfiInteractionKind::Info, None),
        };
        Self {
            id: i.id.0,
            thread_id: i.thread_id.0,
            sort_id: i.sort_id,
            timestamp: i.timestamp.timestamp(),
            kind,
            author_id,
            body: i.body,
            preview_text,
            is_read: i.is_read,
            friend_request: i.friend_request.map(FfiFriendRequestMessageState::from),
        }
    }
}

/// Info event kinds the host may record
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum FfiInfoMessageKind {
    GroupUpdate,
    DisappearingMessagesUpdate,
    SessionReset,
    VerificationStateChange,
    ProfileKeyUpdate,
}

impl From<FfiInfoMessageKind> for InfoMessageKind {
    fn from(k: FfiInfoMessageKind) -> Self {
        match k {
            FfiInfoMessageKind::GroupUpdate => InfoMessageKind::GroupUpdate,
            FfiInfoMessageKind::DisappearingMessagesUpdate => {
                InfoMessageKind::DisappearingMessagesUpdate
            }
            FfiInfoMessageKind::SessionReset => InfoMessageKind::SessionReset,
            FfiInfoMessageKind::VerificationStateChange => InfoMessageKind::VerificationStateChange,
            FfiInfoMessageKind::ProfileKeyUpdate => InfoMessageKind::ProfileKeyUpdate,
        }
    }
}

// ============================================================================
// Thread Types
// ============================================================================

/// FFI-friendly thread summary for list views
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiThreadSummary {
    pub id: String,
    pub name: String,
    pub is_group: bool,
    pub snippet: String,
    /// Unix timestamp (seconds since epoch) of the latest inbox interaction
    pub last_activity_at: Option<i64>,
    pub unread_count: u32,
    pub is_archived: bool,
    pub is_muted: bool,
    pub friend_request_status: FfiFriendRequestStatus,
    pub color: FfiColorName,
    pub has_draft: bool,
}

impl From<ThreadSummary> for FfiThreadSummary {
    fn from(t: ThreadSummary) -> Self {
        Self {
            id: t.id.0,
            name: t.name,
            is_group: t.is_group,
            snippet: t.snippet,
            last_activity_at: t.last_activity_at.map(|d| d.timestamp()),
            unread_count: t.unread_count as u32,
            is_archived: t.is_archived,
            is_muted: t.is_muted,
            friend_request_status: t.friend_request_status.into(),
            color: t.color.into(),
            has_draft: t.has_draft,
        }
    }
}

/// FFI-friendly thread detail with interactions
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiThreadDetail {
    pub summary: FfiThreadSummary,
    pub interactions: Vec<FfiInteraction>,
}

impl From<ThreadDetail> for FfiThreadDetail {
    fn from(d: ThreadDetail) -> Self {
        Self {
            summary: d.summary.into(),
            interactions: d.interactions.into_iter().map(FfiInteraction::from).collect(),
        }
    }
}

#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiDisappearingMessagesConfiguration {
    pub thread_id: String,
    pub enabled: bool,
    pub duration_seconds: u32,
}

impl From<DisappearingMessagesConfiguration> for FfiDisappearingMessagesConfiguration {
    fn from(c: DisappearingMessagesConfiguration) -> Self {
        Self {
            thread_id: c.thread_id.0,
            enabled: c.enabled,
            duration_seconds: c.duration_seconds,
        }
    }
}

// ============================================================================
// Log Callback
// ============================================================================

/// Log level for FFI callback
#[derive(Debug, Clone, Copy, uniffi::Enum)]
pub enum FfiLogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<log::Level> for FfiLogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => FfiLogLevel::Error,
            log::Level::Warn => FfiLogLevel::Warn,
            log::Level::Info => FfiLogLevel::Info,
            log::Level::Debug => FfiLogLevel::Debug,
            log::Level::Trace => FfiLogLevel::Trace,
        }
    }
}

impl From<FfiLogLevel> for log::Level {
    fn from(level: FfiLogLevel) -> Self {
        match level {
            FfiLogLevel::Error => log::Level::Error,
            FfiLogLevel::Warn => log::Level::Warn,
            FfiLogLevel::Info => log::Level::Info,
            FfiLogLevel::Debug => log::Level::Debug,
            FfiLogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Callback interface for receiving log messages from Rust
///
/// Hosts forward these to their platform logger (os_log on Apple platforms,
/// logcat on Android).
#[uniffi::export(callback_interface)]
pub trait LogCallback: Send + Sync {
    /// `target` is the module path, e.g. "conversation::friend_request::machine"
    fn on_log(&self, level: FfiLogLevel, target: String, message: String);
}
