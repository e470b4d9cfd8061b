//! Thread list and detail queries

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ConversationSettings;
use crate::friend_request::FriendRequestStatus;
use crate::models::{ConversationColorName, Interaction, Thread, ThreadId};
use crate::profile::ProfileLookup;
use crate::storage::ReadTransaction;

/// Which threads a list should contain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ThreadFilter {
    /// Visible, not hidden, not archived
    #[default]
    Inbox,
    /// Visible, not hidden, archived
    Archived,
    /// Every thread, including hidden ones
    All,
}

/// Summary information for displaying a thread in a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadSummary {
    pub id: ThreadId,
    /// Contact display name or group title
    pub name: String,
    pub is_group: bool,
    /// Preview of the latest inbox interaction
    pub snippet: String,
    /// Timestamp of the latest inbox interaction
    pub last_activity_at: Option<DateTime<Utc>>,
    /// Sort id of the latest interaction; zero for an empty thread
    pub last_sort_id: u64,
    pub unread_count: usize,
    pub is_archived: bool,
    pub is_muted: bool,
    /// Status as of the summary's `now`, with lazy expiry applied
    pub friend_request_status: FriendRequestStatus,
    pub color: ConversationColorName,
    pub has_draft: bool,
}

impl ThreadSummary {
    /// Summarize one thread as of `tx` and `now`
    pub fn for_thread(
        thread: &Thread,
        tx: &dyn ReadTransaction,
        profiles: &dyn ProfileLookup,
        settings: &ConversationSettings,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let inbox_item = thread.last_interaction_for_inbox(tx)?;
        let last_sort_id = tx
            .latest_interaction(&thread.id)?
            .map(|i| i.sort_id)
            .unwrap_or(0);

        Ok(Self {
            id: thread.id.clone(),
            name: thread.name(profiles),
            is_group: thread.is_group_thread(),
            snippet: inbox_item.as_ref().map(|i| i.preview_text()).unwrap_or_default(),
            last_activity_at: inbox_item.as_ref().map(|i| i.timestamp),
            last_sort_id,
            unread_count: thread.unread_message_count(tx)?,
            is_archived: thread.is_archived(tx)?,
            is_muted: thread.is_muted_at(now),
            friend_request_status: thread.friend_request_status_at(settings, now, tx)?,
            color: thread.conversation_color_name(),
            has_draft: !thread.current_draft(tx)?.is_empty(),
        })
    }
}

/// Detailed thread information including all interactions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThreadDetail {
    pub summary: ThreadSummary,
    /// All interactions, oldest first
    pub interactions: Vec<Interaction>,
}

/// List threads matching `filter`, most recent activity first
pub fn list_threads(
    tx: &dyn ReadTransaction,
    profiles: &dyn ProfileLookup,
    settings: &ConversationSettings,
    now: DateTime<Utc>,
    filter: ThreadFilter,
) -> Result<Vec<ThreadSummary>> {
    let mut summaries = Vec::new();
    for thread in tx.threads()? {
        let listed = match filter {
            ThreadFilter::All => true,
            ThreadFilter::Inbox | ThreadFilter::Archived => {
                thread.should_be_visible && !thread.is_force_hidden
            }
        };
        if !listed {
            continue;
        }

        let summary = ThreadSummary::for_thread(&thread, tx, profiles, settings, now)?;
        let keep = match filter {
            ThreadFilter::Inbox => !summary.is_archived,
            ThreadFilter::Archived => summary.is_archived,
            ThreadFilter::All => true,
        };
        if keep {
            summaries.push(summary);
        }
    }

    summaries.sort_by(|a, b| {
        b.last_sort_id
            .cmp(&a.last_sort_id)
            .then_with(|| a.id.as_str().cmp(b.id.as_str()))
    });
    Ok(summaries)
}

/// Summary plus every interaction, or None if the thread does not exist
pub fn get_thread_detail(
    tx: &dyn ReadTransaction,
    profiles: &dyn ProfileLookup,
    settings: &ConversationSettings,
    now: DateTime<Utc>,
    thread_id: &ThreadId,
) -> Result<Option<ThreadDetail>> {
    let Some(thread) = tx.thread(thread_id)? else {
        return Ok(None);
    };

    Ok(Some(ThreadDetail {
        summary: ThreadSummary::for_thread(&thread, tx, profiles, settings, now)?,
        interactions: tx.interactions(thread_id)?,
    }))
}
