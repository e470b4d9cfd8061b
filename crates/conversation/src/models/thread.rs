//! Thread model representing a conversation (one-to-one or group)

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ConversationColorName, Interaction};
use crate::friend_request::FriendRequestStatus;

const CONTACT_THREAD_PREFIX: &str = "c";
const GROUP_THREAD_PREFIX: &str = "g";

/// Unique identifier for a thread
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadId(pub String);

impl ThreadId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier of the one-to-one thread with `recipient_id`
    pub fn for_contact(recipient_id: &str) -> Self {
        Self(format!("{CONTACT_THREAD_PREFIX}{recipient_id}"))
    }

    /// Identifier of the group thread for a binary group id
    pub fn for_group(group_id: &[u8]) -> Self {
        Self(format!("{GROUP_THREAD_PREFIX}{}", BASE64.encode(group_id)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ThreadId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Structural kind of a thread, fixed at creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ThreadKind {
    Contact {
        recipient_id: String,
    },
    Group {
        group_id: Vec<u8>,
        title: Option<String>,
        member_ids: Vec<String>,
    },
}

/// A persisted conversation
///
/// Fields guarded by invariants (kind, creation date, friend request status,
/// color) are private; everything else is plain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    pub id: ThreadId,
    kind: ThreadKind,
    creation_date: DateTime<Utc>,
    /// Whether the thread appears in the conversation list
    #[serde(default)]
    pub should_be_visible: bool,
    /// Cache of the most recent interaction; the interaction log is authoritative
    #[serde(default)]
    pub last_interaction: Option<Interaction>,
    /// Archival watermark in logical (sort id) order
    #[serde(default)]
    pub archived_as_of_sort_id: Option<u64>,
    /// Wall-clock time of the last archive action
    #[serde(default)]
    pub archived_at: Option<DateTime<Utc>>,
    #[serde(default)]
    friend_request_status: FriendRequestStatus,
    #[serde(default)]
    friend_request_updated_at: Option<DateTime<Utc>>,
    conversation_color_name: ConversationColorName,
    #[serde(default)]
    pub is_force_hidden: bool,
    #[serde(default)]
    pub muted_until: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) draft_text: String,
}

impl Thread {
    /// New, unsaved one-to-one thread. The color is seeded by the recipient id.
    pub fn contact(recipient_id: impl Into<String>) -> Self {
        let recipient_id = recipient_id.into();
        let id = ThreadId::for_contact(&recipient_id);
        let color = ConversationColorName::stable_for_seed(&recipient_id);
        Self::with_kind(id, ThreadKind::Contact { recipient_id }, color)
    }

    /// New, unsaved group thread. The color is seeded by the thread id.
    pub fn group(group_id: Vec<u8>, title: Option<String>, member_ids: Vec<String>) -> Self {
        let id = ThreadId::for_group(&group_id);
        let color = ConversationColorName::stable_for_seed(id.as_str());
        Self::with_kind(
            id,
            ThreadKind::Group {
                group_id,
                title,
                member_ids,
            },
            color,
        )
    }

    fn with_kind(id: ThreadId, kind: ThreadKind, color: ConversationColorName) -> Self {
        Self {
            id,
            kind,
            creation_date: Utc::now(),
            should_be_visible: false,
            last_interaction: None,
            archived_as_of_sort_id: None,
            archived_at: None,
            friend_request_status: FriendRequestStatus::None,
            friend_request_updated_at: None,
            conversation_color_name: color,
            is_force_hidden: false,
            muted_until: None,
            draft_text: String::new(),
        }
    }

    /// Pure color assignment used at construction time
    pub fn stable_color_name_for_new_conversation(seed: &str) -> ConversationColorName {
        ConversationColorName::stable_for_seed(seed)
    }

    /// The fixed, ordered palette
    pub fn conversation_color_names() -> &'static [ConversationColorName] {
        &super::color::CONVERSATION_COLOR_NAMES
    }

    pub fn kind(&self) -> &ThreadKind {
        &self.kind
    }

    pub fn creation_date(&self) -> DateTime<Utc> {
        self.creation_date
    }

    pub fn is_group_thread(&self) -> bool {
        matches!(self.kind, ThreadKind::Group { .. })
    }

    /// Recipient id of a one-to-one thread
    pub fn contact_identifier(&self) -> Option<&str> {
        match &self.kind {
            ThreadKind::Contact { recipient_id } => Some(recipient_id),
            ThreadKind::Group { .. } => None,
        }
    }

    /// All participant identifiers, in order, without duplicates
    pub fn recipient_identifiers(&self) -> Vec<String> {
        match &self.kind {
            ThreadKind::Contact { recipient_id } => vec![recipient_id.clone()],
            ThreadKind::Group { member_ids, .. } => {
                let mut seen = std::collections::HashSet::new();
                member_ids
                    .iter()
                    .filter(|m| seen.insert(m.as_str()))
                    .cloned()
                    .collect()
            }
        }
    }

    pub fn conversation_color_name(&self) -> ConversationColorName {
        self.conversation_color_name
    }

    pub(crate) fn replace_conversation_color_name(&mut self, color: ConversationColorName) {
        self.conversation_color_name = color;
    }

    /// Persisted friend request status. See [`Thread::friend_request_status_at`]
    /// for the lazily-expired view.
    pub fn friend_request_status(&self) -> FriendRequestStatus {
        self.friend_request_status
    }

    pub fn friend_request_updated_at(&self) -> Option<DateTime<Utc>> {
        self.friend_request_updated_at
    }

    /// Only the friend request state machine calls this
    pub(crate) fn replace_friend_request_status(
        &mut self,
        status: FriendRequestStatus,
        at: DateTime<Utc>,
    ) {
        self.friend_request_status = status;
        self.friend_request_updated_at = Some(at);
    }

    pub fn friend_request_status_description(&self) -> &'static str {
        self.friend_request_status.description()
    }

    /// Reads the stored status. Use [`Thread::has_pending_friend_request_at`]
    /// where an elapsed request should count as expired; the same goes for
    /// the `has_current_user_*` predicates below.
    pub fn has_pending_friend_request(&self) -> bool {
        !self.is_group_thread() && self.friend_request_status.is_pending()
    }

    pub fn is_contact_friend(&self) -> bool {
        !self.is_group_thread() && self.friend_request_status == FriendRequestStatus::Friends
    }

    pub fn has_current_user_sent_friend_request(&self) -> bool {
        !self.is_group_thread() && self.friend_request_status.is_sent_by_current_user()
    }

    pub fn has_current_user_received_friend_request(&self) -> bool {
        !self.is_group_thread() && self.friend_request_status == FriendRequestStatus::RequestReceived
    }

    pub fn is_muted(&self) -> bool {
        self.is_muted_at(Utc::now())
    }

    pub fn is_muted_at(&self, now: DateTime<Utc>) -> bool {
        self.muted_until.is_some_and(|until| until > now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_contact_thread() {
        let thread = Thread::contact("+15551234567");
        assert_eq!(thread.id.as_str(), "c+15551234567");
        assert!(!thread.is_group_thread());
        assert_eq!(thread.contact_identifier(), Some("+15551234567"));
        assert_eq!(thread.recipient_identifiers(), vec!["+15551234567".to_string()]);
        assert_eq!(thread.conversation_color_name(), ConversationColorName::Burlap);
        assert_eq!(thread.friend_request_status(), FriendRequestStatus::None);
        assert!(!thread.should_be_visible);
    }

    #[test]
    fn test_group_thread() {
        let thread = Thread::group(
            vec![1, 2, 3],
            Some("Climbers".to_string()),
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
        );
        assert_eq!(thread.id.as_str(), "gAQID");
        assert!(thread.is_group_thread());
        assert_eq!(thread.contact_identifier(), None);
        assert_eq!(thread.recipient_identifiers(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            thread.conversation_color_name(),
            ConversationColorName::stable_for_seed("gAQID")
        );
    }

    #[test]
    fn test_group_never_reports_handshake_state() {
        let mut thread = Thread::group(vec![9], None, vec![]);
        thread.replace_friend_request_status(FriendRequestStatus::Friends, Utc::now());
        assert!(!thread.is_contact_friend());
        assert!(!thread.has_pending_friend_request());
    }

    #[test]
    fn test_mute_expiry() {
        let mut thread = Thread::contact("x");
        let now = Utc::now();
        assert!(!thread.is_muted_at(now));

        thread.muted_until = Some(now - Duration::minutes(1));
        assert!(!thread.is_muted_at(now));

        thread.muted_until = Some(now + Duration::hours(1));
        assert!(thread.is_muted_at(now));
    }

    #[test]
    fn test_draft_defaults_to_empty_on_old_documents() {
        let thread = Thread::contact("x");
        let mut json: serde_json::Value = serde_json::to_value(&thread).unwrap();
        json.as_object_mut().unwrap().remove("draft_text");
        let back: Thread = serde_json::from_value(json).unwrap();
        assert_eq!(back.draft_text, "");
    }
}
