//! Derived, read-only views of a single thread

use std::ops::ControlFlow;

use anyhow::Result;

use crate::config::ConversationSettings;
use crate::models::{DisappearingMessagesConfiguration, Interaction, Thread, ThreadKind};
use crate::profile::ProfileLookup;
use crate::storage::{EnumerationOrder, ReadTransaction};

/// Title shown for a group that has not been named
pub const DEFAULT_GROUP_TITLE: &str = "New Group";

impl Thread {
    /// Contact display name, or the group title
    pub fn name(&self, profiles: &dyn ProfileLookup) -> String {
        match self.kind() {
            ThreadKind::Contact { recipient_id } => profiles
                .display_name(recipient_id)
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| recipient_id.clone()),
            ThreadKind::Group { title, .. } => title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_GROUP_TITLE)
                .to_string(),
        }
    }

    /// A one-to-one thread with the local user
    pub fn is_note_to_self(
        &self,
        profiles: &dyn ProfileLookup,
        settings: &ConversationSettings,
    ) -> bool {
        if !settings.note_to_self_enabled {
            return false;
        }
        match (self.contact_identifier(), profiles.local_identifier()) {
            (Some(recipient), Some(local)) => recipient == local,
            _ => false,
        }
    }

    pub fn number_of_interactions(&self, tx: &dyn ReadTransaction) -> Result<usize> {
        tx.interaction_count(&self.id)
    }

    pub fn unread_message_count(&self, tx: &dyn ReadTransaction) -> Result<usize> {
        tx.unread_interaction_count(&self.id)
    }

    /// Newest interaction that is shown in the inbox. Bookkeeping events are
    /// skipped, so this can differ from the cached `last_interaction`.
    pub fn last_interaction_for_inbox(
        &self,
        tx: &dyn ReadTransaction,
    ) -> Result<Option<Interaction>> {
        let mut found = None;
        tx.enumerate_interactions(
            &self.id,
            EnumerationOrder::NewestFirst,
            &mut |i: &Interaction| {
                if i.appears_in_inbox() {
                    found = Some(i.clone());
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            },
        )?;
        Ok(found)
    }

    /// Preview text for the conversation list; empty when there is nothing to show
    pub fn last_message_text(&self, tx: &dyn ReadTransaction) -> Result<String> {
        Ok(self
            .last_interaction_for_inbox(tx)?
            .map(|i| i.preview_text())
            .unwrap_or_default())
    }

    /// Visit interactions oldest first until `visitor` breaks
    pub fn enumerate_interactions(
        &self,
        tx: &dyn ReadTransaction,
        visitor: &mut dyn FnMut(&Interaction) -> ControlFlow<()>,
    ) -> Result<()> {
        tx.enumerate_interactions(&self.id, EnumerationOrder::OldestFirst, visitor)
    }

    /// Archived iff a watermark is set and no interaction sorts after it
    pub fn is_archived(&self, tx: &dyn ReadTransaction) -> Result<bool> {
        let thread = self.persisted_or_self(tx)?;
        let Some(watermark) = thread.archived_as_of_sort_id else {
            return Ok(false);
        };
        Ok(match tx.latest_interaction(&self.id)? {
            Some(latest) => latest.sort_id <= watermark,
            None => true,
        })
    }

    /// Saved draft, or an empty string
    pub fn current_draft(&self, tx: &dyn ReadTransaction) -> Result<String> {
        Ok(self.persisted_or_self(tx)?.draft_text)
    }

    /// Persisted configuration, or a disabled one using the default duration
    pub fn disappearing_messages_configuration(
        &self,
        settings: &ConversationSettings,
        tx: &dyn ReadTransaction,
    ) -> Result<DisappearingMessagesConfiguration> {
        Ok(tx.disappearing_configuration(&self.id)?.unwrap_or_else(|| {
            DisappearingMessagesConfiguration::disabled(
                self.id.clone(),
                settings.default_disappearing_duration_seconds,
            )
        }))
    }

    /// Seconds before messages disappear; zero when disabled
    pub fn disappearing_messages_duration(&self, tx: &dyn ReadTransaction) -> Result<u32> {
        Ok(tx
            .disappearing_configuration(&self.id)?
            .map(|c| c.effective_duration_seconds())
            .unwrap_or(0))
    }

    fn persisted_or_self(&self, tx: &dyn ReadTransaction) -> Result<Thread> {
        Ok(tx.thread(&self.id)?.unwrap_or_else(|| self.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InfoMessageKind, InteractionId};
    use crate::profile::InMemoryProfileLookup;
    use crate::storage::{ConversationStoreExt, InMemoryConversationStore, WriteTransaction};

    fn save_message(tx: &mut dyn WriteTransaction, thread: &Thread, id: &str) -> Result<()> {
        let mut message = Interaction::builder(InteractionId::new(id), thread.id.clone())
            .incoming("+15550001111")
            .body(format!("body {id}"))
            .build();
        tx.save_interaction(&mut message)
    }

    fn save_info(
        tx: &mut dyn WriteTransaction,
        thread: &Thread,
        id: &str,
        info: InfoMessageKind,
    ) -> Result<()> {
        let mut message = Interaction::builder(InteractionId::new(id), thread.id.clone())
            .info(info)
            .build();
        tx.save_interaction(&mut message)
    }

    #[test]
    fn test_name_uses_profiles() {
        let profiles = InMemoryProfileLookup::new();
        let thread = Thread::contact("+15550001111");
        assert_eq!(thread.name(&profiles), "+15550001111");

        profiles.set_display_name("+15550001111", "Ada");
        assert_eq!(thread.name(&profiles), "Ada");

        let group = Thread::group(vec![1], None, vec![]);
        assert_eq!(group.name(&profiles), DEFAULT_GROUP_TITLE);
        let group = Thread::group(vec![1], Some("Climbers".into()), vec![]);
        assert_eq!(group.name(&profiles), "Climbers");
    }

    #[test]
    fn test_note_to_self() {
        let profiles = InMemoryProfileLookup::for_local_user("+1000");
        let mut settings = ConversationSettings::default();

        assert!(Thread::contact("+1000").is_note_to_self(&profiles, &settings));
        assert!(!Thread::contact("+2000").is_note_to_self(&profiles, &settings));
        assert!(!Thread::group(vec![1], None, vec![]).is_note_to_self(&profiles, &settings));

        settings.note_to_self_enabled = false;
        assert!(!Thread::contact("+1000").is_note_to_self(&profiles, &settings));
    }

    #[test]
    fn test_inbox_skips_bookkeeping() {
        let store = InMemoryConversationStore::new();
        let thread = Thread::contact("+15550001111");

        store
            .read_write(|tx| {
                tx.save_thread(&thread)?;
                save_message(tx, &thread, "m1")?;
                save_info(tx, &thread, "i1", InfoMessageKind::VerificationStateChange)?;
                save_info(tx, &thread, "i2", InfoMessageKind::ProfileKeyUpdate)
            })
            .unwrap();

        let latest = store.read(|tx| tx.latest_interaction(&thread.id)).unwrap();
        assert_eq!(latest.unwrap().id.as_str(), "i2");

        let inbox = store.read(|tx| thread.last_interaction_for_inbox(tx)).unwrap();
        assert_eq!(inbox.unwrap().id.as_str(), "m1");
        assert_eq!(store.read(|tx| thread.last_message_text(tx)).unwrap(), "body m1");
        assert_eq!(store.read(|tx| thread.number_of_interactions(tx)).unwrap(), 3);
        assert_eq!(store.read(|tx| thread.unread_message_count(tx)).unwrap(), 1);
    }

    #[test]
    fn test_empty_thread_reads() {
        let store = InMemoryConversationStore::new();
        let thread = Thread::contact("+15550001111");

        store
            .read(|tx| {
                assert_eq!(thread.last_interaction_for_inbox(tx)?, None);
                assert_eq!(thread.last_message_text(tx)?, "");
                assert_eq!(thread.current_draft(tx)?, "");
                assert!(!thread.is_archived(tx)?);
                assert_eq!(thread.disappearing_messages_duration(tx)?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_default_disappearing_configuration() {
        let store = InMemoryConversationStore::new();
        let thread = Thread::contact("+15550001111");
        let settings = ConversationSettings::default();

        let config = store
            .read(|tx| thread.disappearing_messages_configuration(&settings, tx))
            .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.thread_id, thread.id);
        assert_eq!(config.duration_seconds, settings.default_disappearing_duration_seconds);
    }

    #[test]
    fn test_enumerate_oldest_first() {
        let store = InMemoryConversationStore::new();
        let thread = Thread::contact("+15550001111");
        store
            .read_write(|tx| {
                save_message(tx, &thread, "m1")?;
                save_message(tx, &thread, "m2")
            })
            .unwrap();

        let mut seen = Vec::new();
        store
            .read(|tx| {
                thread.enumerate_interactions(tx, &mut |i: &Interaction| {
                    seen.push(i.id.0.clone());
                    ControlFlow::Continue(())
                })
            })
            .unwrap();
        assert_eq!(seen, vec!["m1".to_string(), "m2".to_string()]);
    }
}
