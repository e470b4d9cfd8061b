//! Thread mutations
//!
//! Each mutation reloads the persisted copy inside the transaction, applies
//! its change there, saves it, and then refreshes the caller's value. Two
//! stale copies of the same thread therefore never overwrite each other's
//! fields.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use log::{debug, info};

use crate::models::{
    ConversationColorName, DisappearingMessagesConfiguration, Interaction, Thread, ThreadId,
};
use crate::storage::{ReadTransaction, WriteTransaction};

impl Thread {
    /// The one-to-one thread with `recipient_id`, created and saved if missing
    pub fn get_or_create_contact_thread(
        recipient_id: &str,
        tx: &mut dyn WriteTransaction,
    ) -> Result<Thread> {
        let id = ThreadId::for_contact(recipient_id);
        if let Some(existing) = tx.thread(&id)? {
            return Ok(existing);
        }

        let thread = Thread::contact(recipient_id);
        tx.save_thread(&thread)?;
        info!("Created contact thread {}", thread.id.as_str());
        Ok(thread)
    }

    /// The group thread for `group_id`, created and saved if missing
    pub fn get_or_create_group_thread(
        group_id: &[u8],
        title: Option<String>,
        member_ids: Vec<String>,
        tx: &mut dyn WriteTransaction,
    ) -> Result<Thread> {
        let id = ThreadId::for_group(group_id);
        if let Some(existing) = tx.thread(&id)? {
            return Ok(existing);
        }

        let thread = Thread::group(group_id.to_vec(), title, member_ids);
        tx.save_thread(&thread)?;
        info!("Created group thread {}", thread.id.as_str());
        Ok(thread)
    }

    pub fn fetch(id: &ThreadId, tx: &dyn ReadTransaction) -> Result<Option<Thread>> {
        tx.thread(id)
    }

    /// Save this value as-is (creation, or after constructing a new thread)
    pub fn save(&self, tx: &mut dyn WriteTransaction) -> Result<()> {
        tx.save_thread(self)
    }

    /// Reload, change, save, refresh `self`
    fn apply_change(
        &mut self,
        tx: &mut dyn WriteTransaction,
        change: impl FnOnce(&mut Thread),
    ) -> Result<()> {
        let mut latest = self.latest_copy(tx.as_read())?;
        change(&mut latest);
        tx.save_thread(&latest)?;
        *self = latest;
        Ok(())
    }

    /// Refresh the cached last interaction after `message` joined the log.
    ///
    /// Sent or received content makes the thread visible; control events do
    /// not.
    pub fn update_with_last_message(
        &mut self,
        message: &Interaction,
        tx: &mut dyn WriteTransaction,
    ) -> Result<()> {
        let latest_in_log = tx.latest_interaction(&self.id)?;
        let becomes_visible = message.is_content();

        self.apply_change(tx, |thread| {
            thread.last_interaction = latest_in_log.or_else(|| Some(message.clone()));
            if becomes_visible {
                thread.should_be_visible = true;
            }
        })
    }

    /// Mark every unread interaction read. Returns how many changed.
    pub fn mark_all_as_read(&mut self, tx: &mut dyn WriteTransaction) -> Result<usize> {
        let unread: Vec<Interaction> = tx
            .interactions(&self.id)?
            .into_iter()
            .filter(|i| i.is_unread())
            .collect();
        if unread.is_empty() {
            return Ok(0);
        }

        for mut interaction in unread.iter().cloned() {
            interaction.is_read = true;
            tx.save_interaction(&mut interaction)?;
        }

        let latest_in_log = tx.latest_interaction(&self.id)?;
        self.apply_change(tx, |thread| thread.last_interaction = latest_in_log)?;

        debug!(
            "Marked {} interactions read in thread {}",
            unread.len(),
            self.id.as_str()
        );
        Ok(unread.len())
    }

    /// Archive as of the latest sort id. Anything saved afterwards sorts past
    /// the watermark and brings the thread back to the inbox.
    pub fn archive_thread(&mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        let watermark = tx.latest_sort_id()?;
        self.apply_change(tx, |thread| {
            thread.archived_as_of_sort_id = Some(watermark);
            thread.archived_at = Some(Utc::now());
        })?;
        info!("Archived thread {} at sort id {}", self.id.as_str(), watermark);
        Ok(())
    }

    pub fn unarchive_thread(&mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        self.apply_change(tx, |thread| {
            thread.archived_as_of_sort_id = None;
            thread.archived_at = None;
        })?;
        info!("Unarchived thread {}", self.id.as_str());
        Ok(())
    }

    pub fn set_draft(&mut self, text: impl Into<String>, tx: &mut dyn WriteTransaction) -> Result<()> {
        let text = text.into();
        self.apply_change(tx, |thread| thread.draft_text = text)
    }

    /// Mute until `date`; `None` unmutes
    pub fn update_with_muted_until_date(
        &mut self,
        date: Option<DateTime<Utc>>,
        tx: &mut dyn WriteTransaction,
    ) -> Result<()> {
        self.apply_change(tx, |thread| thread.muted_until = date)
    }

    /// Explicit color override. This is the only way a thread's color changes
    /// after creation.
    pub fn update_conversation_color_name(
        &mut self,
        color: ConversationColorName,
        tx: &mut dyn WriteTransaction,
    ) -> Result<()> {
        self.apply_change(tx, |thread| thread.replace_conversation_color_name(color))
    }

    pub fn set_force_hidden(&mut self, hidden: bool, tx: &mut dyn WriteTransaction) -> Result<()> {
        self.apply_change(tx, |thread| thread.is_force_hidden = hidden)
    }

    pub fn update_disappearing_messages_configuration(
        &self,
        config: &DisappearingMessagesConfiguration,
        tx: &mut dyn WriteTransaction,
    ) -> Result<()> {
        if config.thread_id != self.id {
            bail!(
                "configuration for thread {} applied to thread {}",
                config.thread_id.as_str(),
                self.id.as_str()
            );
        }
        if config.enabled && !DisappearingMessagesConfiguration::is_valid_duration(config.duration_seconds)
        {
            bail!("unsupported disappearing messages duration: {}s", config.duration_seconds);
        }
        tx.save_disappearing_configuration(config)
    }

    /// Delete every interaction in this thread. Returns how many were removed.
    pub fn remove_all_thread_interactions(&mut self, tx: &mut dyn WriteTransaction) -> Result<usize> {
        let removed = tx.remove_interactions_where(&self.id, &|_: &Interaction| true)?;
        if let Some(mut latest) = tx.thread(&self.id)? {
            latest.last_interaction = None;
            tx.save_thread(&latest)?;
            *self = latest;
        }
        debug!("Removed {} interactions from thread {}", removed, self.id.as_str());
        Ok(removed)
    }

    /// Delete the thread with its interactions and disappearing messages config
    pub fn remove(mut self, tx: &mut dyn WriteTransaction) -> Result<()> {
        self.remove_all_thread_interactions(tx)?;
        tx.remove_disappearing_configuration(&self.id)?;
        tx.remove_thread(&self.id)?;
        info!("Removed thread {}", self.id.as_str());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ThreadError;
    use crate::models::InteractionId;
    use crate::storage::{ConversationStoreExt, InMemoryConversationStore};
    use chrono::Duration;

    fn contact(store: &InMemoryConversationStore) -> Thread {
        store
            .read_write(|tx| Thread::get_or_create_contact_thread("+15550001111", tx))
            .unwrap()
    }

    fn receive(store: &InMemoryConversationStore, thread: &mut Thread, id: &str) -> Interaction {
        store
            .read_write(|tx| {
                let mut message = Interaction::builder(InteractionId::new(id), thread.id.clone())
                    .incoming("+15550001111")
                    .body(format!("body {id}"))
                    .build();
                tx.save_interaction(&mut message)?;
                thread.update_with_last_message(&message, tx)?;
                Ok(message)
            })
            .unwrap()
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = InMemoryConversationStore::new();
        let first = contact(&store);
        let second = contact(&store);

        assert_eq!(first, second);
        assert_eq!(store.read(|tx| tx.threads()).unwrap().len(), 1);
    }

    #[test]
    fn test_group_get_or_create() {
        let store = InMemoryConversationStore::new();
        let group = store
            .read_write(|tx| {
                Thread::get_or_create_group_thread(&[1, 2, 3], Some("Team".into()), vec![], tx)
            })
            .unwrap();
        assert_eq!(group.id.as_str(), "gAQID");
        assert!(store.read(|tx| Thread::fetch(&group.id, tx)).unwrap().is_some());
    }

    #[test]
    fn test_content_makes_thread_visible() {
        let store = InMemoryConversationStore::new();
        let mut thread = contact(&store);
        assert!(!thread.should_be_visible);

        store
            .read_write(|tx| {
                let mut info = Interaction::builder(InteractionId::new("i1"), thread.id.clone())
                    .info(crate::models::InfoMessageKind::SessionReset)
                    .build();
                tx.save_interaction(&mut info)?;
                thread.update_with_last_message(&info, tx)
            })
            .unwrap();
        assert!(!thread.should_be_visible);

        let message = receive(&store, &mut thread, "m1");
        assert!(thread.should_be_visible);
        assert_eq!(thread.last_interaction.as_ref(), Some(&message));

        // Same message again changes nothing
        let before = thread.clone();
        store
            .read_write(|tx| thread.update_with_last_message(&message, tx))
            .unwrap();
        assert_eq!(thread, before);
    }

    #[test]
    fn test_mark_all_as_read() {
        let store = InMemoryConversationStore::new();
        let mut thread = contact(&store);

        assert_eq!(store.read_write(|tx| thread.mark_all_as_read(tx)).unwrap(), 0);

        receive(&store, &mut thread, "m1");
        receive(&store, &mut thread, "m2");
        assert_eq!(store.read_write(|tx| thread.mark_all_as_read(tx)).unwrap(), 2);
        assert_eq!(
            store.read(|tx| tx.unread_interaction_count(&thread.id)).unwrap(),
            0
        );
        assert!(thread.last_interaction.as_ref().is_some_and(|i| i.is_read));
    }

    #[test]
    fn test_stale_copies_do_not_clobber_each_other() {
        let store = InMemoryConversationStore::new();
        let mut a = contact(&store);
        let mut b = a.clone();

        store.read_write(|tx| a.set_draft("draft", tx)).unwrap();
        store
            .read_write(|tx| b.update_with_muted_until_date(Some(Utc::now() + Duration::hours(1)), tx))
            .unwrap();

        let stored = store.read(|tx| Thread::fetch(&a.id, tx)).unwrap().unwrap();
        assert_eq!(stored.draft_text, "draft");
        assert!(stored.muted_until.is_some());
        assert_eq!(b, stored);
    }

    #[test]
    fn test_color_override() {
        let store = InMemoryConversationStore::new();
        let mut thread = contact(&store);

        store
            .read_write(|tx| thread.update_conversation_color_name(ConversationColorName::Plum, tx))
            .unwrap();
        let stored = store.read(|tx| Thread::fetch(&thread.id, tx)).unwrap().unwrap();
        assert_eq!(stored.conversation_color_name(), ConversationColorName::Plum);
    }

    #[test]
    fn test_disappearing_configuration_validation() {
        let store = InMemoryConversationStore::new();
        let thread = contact(&store);

        let wrong_duration = DisappearingMessagesConfiguration::new(thread.id.clone(), true, 7);
        assert!(
            store
                .read_write(|tx| thread.update_disappearing_messages_configuration(&wrong_duration, tx))
                .is_err()
        );

        let other_thread = DisappearingMessagesConfiguration::new(ThreadId::new("cother"), true, 30);
        assert!(
            store
                .read_write(|tx| thread.update_disappearing_messages_configuration(&other_thread, tx))
                .is_err()
        );
    }

    #[test]
    fn test_mutation_of_removed_thread_is_not_found() {
        let store = InMemoryConversationStore::new();
        let mut thread = contact(&store);
        let copy = thread.clone();

        store.read_write(|tx| copy.remove(tx)).unwrap();
        let err = store.read_write(|tx| thread.set_draft("x", tx)).unwrap_err();
        assert!(matches!(
            ThreadError::from_anyhow(&err),
            Some(ThreadError::NotFound(_))
        ));
    }

    #[test]
    fn test_remove_deletes_everything() {
        let store = InMemoryConversationStore::new();
        let mut thread = contact(&store);
        receive(&store, &mut thread, "m1");
        let config = DisappearingMessagesConfiguration::new(thread.id.clone(), true, 30);
        store
            .read_write(|tx| thread.update_disappearing_messages_configuration(&config, tx))
            .unwrap();

        let id = thread.id.clone();
        store.read_write(|tx| thread.remove(tx)).unwrap();

        store
            .read(|tx| {
                assert!(tx.thread(&id)?.is_none());
                assert_eq!(tx.interaction_count(&id)?, 0);
                assert!(tx.disappearing_configuration(&id)?.is_none());
                Ok(())
            })
            .unwrap();
    }
}
