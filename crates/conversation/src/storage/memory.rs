//! In-memory storage implementation
//!
//! Used for tests and for ephemeral sessions. Committed state is an immutable
//! snapshot behind an `Arc`; a read-write transaction works on a private copy
//! and swaps it in on success, so readers never observe partial writes.

use anyhow::{Result, anyhow};
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, RwLock};

use super::traits::{ConversationStore, EnumerationOrder, ReadTransaction, WriteTransaction};
use crate::models::{
    DisappearingMessagesConfiguration, Interaction, InteractionId, Thread, ThreadId,
};

#[derive(Debug, Clone, Default)]
struct StoreState {
    threads: HashMap<String, Thread>,
    interactions: HashMap<String, Interaction>,
    /// Ordered index: thread_id -> (sort_id -> interaction_id)
    thread_interactions: HashMap<String, BTreeMap<u64, String>>,
    disappearing_configs: HashMap<String, DisappearingMessagesConfiguration>,
    last_sort_id: u64,
}

/// In-memory implementation of ConversationStore
pub struct InMemoryConversationStore {
    committed: RwLock<Arc<StoreState>>,
    /// Serializes read-write transactions
    writer: Mutex<()>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self {
            committed: RwLock::new(Arc::new(StoreState::default())),
            writer: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Result<Arc<StoreState>> {
        let guard = self
            .committed
            .read()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        Ok(Arc::clone(&guard))
    }
}

impl Default for InMemoryConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn read_transaction(
        &self,
        block: &mut dyn FnMut(&dyn ReadTransaction) -> Result<()>,
    ) -> Result<()> {
        let state = self.snapshot()?;
        block(&*state)
    }

    fn read_write_transaction(
        &self,
        block: &mut dyn FnMut(&mut dyn WriteTransaction) -> Result<()>,
    ) -> Result<()> {
        let _writer = self
            .writer
            .lock()
            .map_err(|_| anyhow!("in-memory store writer lock poisoned"))?;

        let mut working = StoreState::clone(&*self.snapshot()?);
        block(&mut working)?;

        let mut committed = self
            .committed
            .write()
            .map_err(|_| anyhow!("in-memory store lock poisoned"))?;
        *committed = Arc::new(working);
        Ok(())
    }
}

impl StoreState {
    fn ordered_ids(&self, thread_id: &ThreadId) -> Option<&BTreeMap<u64, String>> {
        self.thread_interactions.get(thread_id.as_str())
    }

    fn unlink(&mut self, interaction: &Interaction) {
        if let Some(index) = self.thread_interactions.get_mut(interaction.thread_id.as_str()) {
            index.remove(&interaction.sort_id);
            if index.is_empty() {
                self.thread_interactions.remove(interaction.thread_id.as_str());
            }
        }
    }
}

impl ReadTransaction for StoreState {
    fn thread(&self, id: &ThreadId) -> Result<Option<Thread>> {
        Ok(self.threads.get(id.as_str()).cloned())
    }

    fn threads(&self) -> Result<Vec<Thread>> {
        Ok(self.threads.values().cloned().collect())
    }

    fn interaction(&self, id: &InteractionId) -> Result<Option<Interaction>> {
        Ok(self.interactions.get(id.as_str()).cloned())
    }

    fn interactions(&self, thread_id: &ThreadId) -> Result<Vec<Interaction>> {
        let Some(index) = self.ordered_ids(thread_id) else {
            return Ok(Vec::new());
        };
        Ok(index
            .values()
            .filter_map(|id| self.interactions.get(id).cloned())
            .collect())
    }

    fn interaction_count(&self, thread_id: &ThreadId) -> Result<usize> {
        Ok(self.ordered_ids(thread_id).map(|i| i.len()).unwrap_or(0))
    }

    fn unread_interaction_count(&self, thread_id: &ThreadId) -> Result<usize> {
        let Some(index) = self.ordered_ids(thread_id) else {
            return Ok(0);
        };
        Ok(index
            .values()
            .filter_map(|id| self.interactions.get(id))
            .filter(|i| i.is_unread())
            .count())
    }

    fn latest_interaction(&self, thread_id: &ThreadId) -> Result<Option<Interaction>> {
        Ok(self
            .ordered_ids(thread_id)
            .and_then(|index| index.values().next_back())
            .and_then(|id| self.interactions.get(id).cloned()))
    }

    fn enumerate_interactions(
        &self,
        thread_id: &ThreadId,
        order: EnumerationOrder,
        visitor: &mut dyn FnMut(&Interaction) -> ControlFlow<()>,
    ) -> Result<()> {
        let Some(index) = self.ordered_ids(thread_id) else {
            return Ok(());
        };
        let ids: Box<dyn Iterator<Item = &String>> = match order {
            EnumerationOrder::OldestFirst => Box::new(index.values()),
            EnumerationOrder::NewestFirst => Box::new(index.values().rev()),
        };
        for id in ids {
            if let Some(interaction) = self.interactions.get(id) {
                if visitor(interaction).is_break() {
                    break;
                }
            }
        }
        Ok(())
    }

    fn latest_sort_id(&self) -> Result<u64> {
        Ok(self.last_sort_id)
    }

    fn disappearing_configuration(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<DisappearingMessagesConfiguration>> {
        Ok(self.disappearing_configs.get(thread_id.as_str()).cloned())
    }
}

impl WriteTransaction for StoreState {
    fn as_read(&self) -> &dyn ReadTransaction {
        self
    }

    fn save_thread(&mut self, thread: &Thread) -> Result<()> {
        self.threads.insert(thread.id.0.clone(), thread.clone());
        Ok(())
    }

    fn remove_thread(&mut self, id: &ThreadId) -> Result<bool> {
        Ok(self.threads.remove(id.as_str()).is_some())
    }

    fn save_interaction(&mut self, interaction: &mut Interaction) -> Result<()> {
        if let Some(existing) = self.interactions.get(interaction.id.as_str()).cloned() {
            // Updates keep their place in the log
            interaction.sort_id = existing.sort_id;
            if existing.thread_id != interaction.thread_id {
                self.unlink(&existing);
            }
        } else {
            self.last_sort_id += 1;
            interaction.sort_id = self.last_sort_id;
        }

        self.thread_interactions
            .entry(interaction.thread_id.0.clone())
            .or_default()
            .insert(interaction.sort_id, interaction.id.0.clone());
        self.interactions
            .insert(interaction.id.0.clone(), interaction.clone());
        Ok(())
    }

    fn remove_interaction(&mut self, id: &InteractionId) -> Result<bool> {
        match self.interactions.remove(id.as_str()) {
            Some(removed) => {
                self.unlink(&removed);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn remove_interactions_where(
        &mut self,
        thread_id: &ThreadId,
        predicate: &dyn Fn(&Interaction) -> bool,
    ) -> Result<usize> {
        let doomed: Vec<InteractionId> = self
            .interactions(thread_id)?
            .into_iter()
            .filter(|i| predicate(i))
            .map(|i| i.id)
            .collect();
        for id in &doomed {
            self.remove_interaction(id)?;
        }
        Ok(doomed.len())
    }

    fn save_disappearing_configuration(
        &mut self,
        config: &DisappearingMessagesConfiguration,
    ) -> Result<()> {
        self.disappearing_configs
            .insert(config.thread_id.0.clone(), config.clone());
        Ok(())
    }

    fn remove_disappearing_configuration(&mut self, thread_id: &ThreadId) -> Result<bool> {
        Ok(self.disappearing_configs.remove(thread_id.as_str()).is_some())
    }
}
