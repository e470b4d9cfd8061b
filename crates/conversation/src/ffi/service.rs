//! ConversationService facade for UniFFI export
//!
//! A high-level, FFI-friendly API over the SQLite store. Every method runs in
//! its own transaction; a method that sends or receives a friend request
//! records the message and the status change in the same transaction.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use log::info;

use crate::config::ConversationSettings;
use crate::error::ThreadError;
use crate::ffi::logging::{init_ffi_logger, set_log_callback, set_log_level};
use crate::ffi::types::*;
use crate::friend_request::FriendRequestStatus;
use crate::models::{
    DisappearingMessagesConfiguration, Interaction, InteractionId, Thread, ThreadId,
    VALID_DURATIONS_SECONDS,
};
use crate::profile::InMemoryProfileLookup;
use crate::query::{self, ThreadSummary};
use crate::storage::{ConversationStoreExt, SqliteConversationStore, WriteTransaction};

/// Main service object for conversation operations
#[derive(uniffi::Object)]
pub struct ConversationService {
    store: Arc<SqliteConversationStore>,
    profiles: Arc<InMemoryProfileLookup>,
    settings: ConversationSettings,
}

impl ConversationService {
    /// Run `change` on the persisted thread inside a read-write transaction
    fn with_thread<R>(
        &self,
        thread_id: &str,
        change: impl FnOnce(&mut Thread, &mut dyn WriteTransaction) -> Result<R>,
    ) -> Result<R, ConversationError> {
        let id = ThreadId::new(thread_id);
        Ok(self.store.read_write(|tx| {
            let mut thread = tx
                .thread(&id)?
                .ok_or_else(|| ThreadError::thread_not_found(&id))?;
            change(&mut thread, tx)
        })?)
    }

    fn summary_in(
        &self,
        thread: &Thread,
        tx: &mut dyn WriteTransaction,
    ) -> Result<FfiThreadSummary> {
        let summary = ThreadSummary::for_thread(
            thread,
            tx.as_read(),
            self.profiles.as_ref(),
            &self.settings,
            Utc::now(),
        )?;
        Ok(summary.into())
    }
}

#[uniffi::export]
impl ConversationService {
    /// Open the service.
    ///
    /// # Arguments
    /// * `db_path` - Path to the SQLite database file
    /// * `config_dir` - Directory holding `conversation.json`; the platform
    ///   default when absent
    #[uniffi::constructor]
    pub fn new(db_path: String, config_dir: Option<String>) -> Result<Arc<Self>, ConversationError> {
        // Ensure parent directories exist
        if let Some(parent) = PathBuf::from(&db_path).parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConversationError::Database {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let store = SqliteConversationStore::new(&db_path).map_err(|e| {
            ConversationError::Database {
                message: format!("Failed to open database: {:#}", e),
            }
        })?;

        let settings = match config_dir {
            Some(dir) => ConversationSettings::load_from(&config::ConfigDir::at(dir)),
            None => ConversationSettings::load(),
        }
        .map_err(|e| ConversationError::InvalidArgument {
            message: format!("Failed to load settings: {:#}", e),
        })?;

        info!("Conversation service opened at {}", db_path);
        Ok(Arc::new(Self {
            store: Arc::new(store),
            profiles: Arc::new(InMemoryProfileLookup::new()),
            settings,
        }))
    }

    // ========================================================================
    // Profiles
    // ========================================================================

    pub fn set_local_identifier(&self, local_identifier: Option<String>) {
        self.profiles.set_local_identifier(local_identifier);
    }

    pub fn set_display_name(&self, participant_id: String, name: String) {
        self.profiles.set_display_name(participant_id, name);
    }

    pub fn set_whitelisted(&self, participant_id: String, whitelisted: bool) {
        self.profiles.set_whitelisted(participant_id, whitelisted);
    }

    pub fn is_note_to_self(&self, thread_id: String) -> Result<bool, ConversationError> {
        let id = ThreadId::new(thread_id);
        let thread = self
            .store
            .read(|tx| Thread::fetch(&id, tx))?
            .ok_or_else(|| ConversationError::NotFound {
                resource: format!("thread {}", id.as_str()),
            })?;
        Ok(thread.is_note_to_self(self.profiles.as_ref(), &self.settings))
    }

    // ========================================================================
    // Threads
    // ========================================================================

    pub fn get_or_create_contact_thread(
        &self,
        recipient_id: String,
    ) -> Result<FfiThreadSummary, ConversationError> {
        if recipient_id.trim().is_empty() {
            return Err(ConversationError::InvalidArgument {
                message: "recipient id must not be empty".to_string(),
            });
        }
        Ok(self.store.read_write(|tx| {
            let thread = Thread::get_or_create_contact_thread(&recipient_id, tx)?;
            self.summary_in(&thread, tx)
        })?)
    }

    pub fn get_or_create_group_thread(
        &self,
        group_id: Vec<u8>,
        title: Option<String>,
        member_ids: Vec<String>,
    ) -> Result<FfiThreadSummary, ConversationError> {
        Ok(self.store.read_write(|tx| {
            let thread = Thread::get_or_create_group_thread(&group_id, title, member_ids, tx)?;
            self.summary_in(&thread, tx)
        })?)
    }

    /// Threads for the conversation list, most recent activity first
    pub fn list_threads(
        &self,
        filter: FfiThreadFilter,
    ) -> Result<Vec<FfiThreadSummary>, ConversationError> {
        let threads = self.store.read(|tx| {
            query::list_threads(
                tx,
                self.profiles.as_ref(),
                &self.settings,
                Utc::now(),
                filter.into(),
            )
        })?;
        Ok(threads.into_iter().map(FfiThreadSummary::from).collect())
    }

    pub fn get_thread_detail(
        &self,
        thread_id: String,
    ) -> Result<Option<FfiThreadDetail>, ConversationError> {
        let id = ThreadId::new(thread_id);
        let detail = self.store.read(|tx| {
            query::get_thread_detail(tx, self.profiles.as_ref(), &self.settings, Utc::now(), &id)
        })?;
        Ok(detail.map(FfiThreadDetail::from))
    }

    pub fn search_within_conversation(
        &self,
        thread_id: String,
        text: String,
    ) -> Result<Vec<FfiInteraction>, ConversationError> {
        let id = ThreadId::new(thread_id);
        let results = self
            .store
            .read(|tx| query::search_within_conversation(&id, &text, tx))?;
        Ok(results.into_iter().map(FfiInteraction::from).collect())
    }

    /// Delete a thread with all of its interactions
    pub fn remove_thread(&self, thread_id: String) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| thread.clone().remove(tx))
    }

    // ========================================================================
    // Messages
    // ========================================================================

    /// Record a message the local user sent.
    ///
    /// With `is_friend_request` set, the thread moves to RequestSending in the
    /// same transaction.
    pub fn record_outgoing_message(
        &self,
        thread_id: String,
        interaction_id: String,
        body: String,
        is_friend_request: bool,
    ) -> Result<FfiInteraction, ConversationError> {
        self.with_thread(&thread_id, |thread, tx| {
            let mut builder =
                Interaction::builder(InteractionId::new(interaction_id), thread.id.clone())
                    .outgoing()
                    .body(body);
            if is_friend_request {
                builder = builder.friend_request();
            }
            let mut message = builder.build();
            tx.save_interaction(&mut message)?;
            thread.update_with_last_message(&message, tx)?;

            // Later messages while a request is in flight leave the status alone
            if is_friend_request
                && matches!(
                    thread.friend_request_status(),
                    FriendRequestStatus::None | FriendRequestStatus::RequestExpired
                )
            {
                thread.begin_sending_friend_request(tx)?;
            }
            // Cleanup may have settled this message
            Ok(tx.interaction(&message.id)?.unwrap_or(message).into())
        })
    }

    /// Record a message received from `author_id` at `timestamp` (Unix seconds)
    pub fn record_incoming_message(
        &self,
        thread_id: String,
        interaction_id: String,
        author_id: String,
        body: String,
        timestamp: i64,
        is_friend_request: bool,
    ) -> Result<FfiInteraction, ConversationError> {
        let timestamp = timestamp_to_datetime(timestamp)?;
        self.with_thread(&thread_id, |thread, tx| {
            let mut builder =
                Interaction::builder(InteractionId::new(interaction_id), thread.id.clone())
                    .incoming(author_id)
                    .body(body)
                    .timestamp(timestamp);
            if is_friend_request {
                builder = builder.friend_request();
            }
            let mut message = builder.build();
            tx.save_interaction(&mut message)?;
            thread.update_with_last_message(&message, tx)?;

            if is_friend_request {
                thread.receive_friend_request(tx)?;
            }
            Ok(tx.interaction(&message.id)?.unwrap_or(message).into())
        })
    }

    /// Record a bookkeeping or notice event
    pub fn record_info_message(
        &self,
        thread_id: String,
        interaction_id: String,
        kind: FfiInfoMessageKind,
    ) -> Result<FfiInteraction, ConversationError> {
        self.with_thread(&thread_id, |thread, tx| {
            let mut message =
                Interaction::builder(InteractionId::new(interaction_id), thread.id.clone())
                    .info(kind.into())
                    .build();
            tx.save_interaction(&mut message)?;
            thread.update_with_last_message(&message, tx)?;
            Ok(message.into())
        })
    }

    /// Returns how many interactions were marked read
    pub fn mark_all_as_read(&self, thread_id: String) -> Result<u32, ConversationError> {
        self.with_thread(&thread_id, |thread, tx| {
            Ok(thread.mark_all_as_read(tx)? as u32)
        })
    }

    // ========================================================================
    // Friend Requests
    // ========================================================================

    /// Status as of now, with lazy expiry applied
    pub fn friend_request_status(
        &self,
        thread_id: String,
    ) -> Result<FfiFriendRequestStatus, ConversationError> {
        let id = ThreadId::new(thread_id);
        let status = self.store.read(|tx| {
            let thread = tx
                .thread(&id)?
                .ok_or_else(|| ThreadError::thread_not_found(&id))?;
            thread.friend_request_status_at(&self.settings, Utc::now(), tx)
        })?;
        Ok(status.into())
    }

    pub fn did_send_friend_request(&self, thread_id: String) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| thread.did_send_friend_request(tx))
    }

    pub fn friend_request_send_failed(&self, thread_id: String) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| thread.friend_request_send_failed(tx))
    }

    pub fn accept_friend_request(&self, thread_id: String) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| thread.accept_friend_request(tx))
    }

    pub fn friend_request_accepted_by_peer(
        &self,
        thread_id: String,
    ) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| {
            thread.friend_request_accepted_by_peer(tx)
        })
    }

    /// Persist expiry of a stale pending request. Returns true if it expired.
    pub fn expire_friend_request_if_needed(
        &self,
        thread_id: String,
    ) -> Result<bool, ConversationError> {
        self.with_thread(&thread_id, |thread, tx| {
            thread.expire_friend_request_if_needed(&self.settings, Utc::now(), tx)
        })
    }

    pub fn has_pending_friend_request(&self, thread_id: String) -> Result<bool, ConversationError> {
        let id = ThreadId::new(thread_id);
        Ok(self.store.read(|tx| {
            let thread = tx
                .thread(&id)?
                .ok_or_else(|| ThreadError::thread_not_found(&id))?;
            thread.has_pending_friend_request_at(&self.settings, Utc::now(), tx)
        })?)
    }

    // ========================================================================
    // Thread State
    // ========================================================================

    pub fn archive_thread(&self, thread_id: String) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| thread.archive_thread(tx))
    }

    pub fn unarchive_thread(&self, thread_id: String) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| thread.unarchive_thread(tx))
    }

    pub fn set_draft(&self, thread_id: String, text: String) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| thread.set_draft(text, tx))
    }

    pub fn current_draft(&self, thread_id: String) -> Result<String, ConversationError> {
        let id = ThreadId::new(thread_id);
        Ok(self.store.read(|tx| match tx.thread(&id)? {
            Some(thread) => thread.current_draft(tx),
            None => Ok(String::new()),
        })?)
    }

    /// Mute until `muted_until` (Unix seconds); `None` unmutes
    pub fn set_muted_until(
        &self,
        thread_id: String,
        muted_until: Option<i64>,
    ) -> Result<(), ConversationError> {
        let date = muted_until.map(timestamp_to_datetime).transpose()?;
        self.with_thread(&thread_id, |thread, tx| {
            thread.update_with_muted_until_date(date, tx)
        })
    }

    pub fn set_conversation_color(
        &self,
        thread_id: String,
        color: FfiColorName,
    ) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| {
            thread.update_conversation_color_name(color.into(), tx)
        })
    }

    pub fn set_force_hidden(&self, thread_id: String, hidden: bool) -> Result<(), ConversationError> {
        self.with_thread(&thread_id, |thread, tx| thread.set_force_hidden(hidden, tx))
    }

    pub fn disappearing_messages_configuration(
        &self,
        thread_id: String,
    ) -> Result<FfiDisappearingMessagesConfiguration, ConversationError> {
        let id = ThreadId::new(thread_id);
        let config = self.store.read(|tx| {
            let thread = tx
                .thread(&id)?
                .ok_or_else(|| ThreadError::thread_not_found(&id))?;
            thread.disappearing_messages_configuration(&self.settings, tx)
        })?;
        Ok(config.into())
    }

    pub fn set_disappearing_messages(
        &self,
        thread_id: String,
        enabled: bool,
        duration_seconds: u32,
    ) -> Result<(), ConversationError> {
        if enabled && !DisappearingMessagesConfiguration::is_valid_duration(duration_seconds) {
            return Err(ConversationError::InvalidArgument {
                message: format!("unsupported duration: {duration_seconds}s"),
            });
        }
        self.with_thread(&thread_id, |thread, tx| {
            let config =
                DisappearingMessagesConfiguration::new(thread.id.clone(), enabled, duration_seconds);
            thread.update_disappearing_messages_configuration(&config, tx)
        })
    }
}

// ============================================================================
// Free Functions
// ============================================================================

/// Install the logging bridge and route records to `callback`.
///
/// Returns false if a different logger was already installed; the callback
/// and level are still applied to the bridge.
#[uniffi::export]
pub fn initialize_logging(callback: Box<dyn LogCallback>, max_level: FfiLogLevel) -> bool {
    let installed = init_ffi_logger(max_level.into()).is_ok();
    set_log_callback(Some(Arc::from(callback)));
    set_log_level(max_level.into());
    installed
}

#[uniffi::export]
pub fn update_log_level(max_level: FfiLogLevel) {
    set_log_level(max_level.into());
}

/// Color a new conversation seeded with `seed` would get
#[uniffi::export]
pub fn stable_color_name_for_seed(seed: String) -> FfiColorName {
    Thread::stable_color_name_for_new_conversation(&seed).into()
}

/// Disappearing message durations offered to users, in seconds
#[uniffi::export]
pub fn valid_disappearing_durations() -> Vec<u32> {
    VALID_DURATIONS_SECONDS.to_vec()
}
