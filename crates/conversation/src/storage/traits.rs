//! Storage trait definitions
//!
//! Every access goes through a transaction scope. Reads take a
//! [`ReadTransaction`]; writes need a [`WriteTransaction`], which only exists
//! inside [`ConversationStoreExt::read_write`]. A block that returns `Err`
//! leaves no trace in the store.

use std::ops::ControlFlow;

use anyhow::{Result, anyhow};

use crate::models::{
    DisappearingMessagesConfiguration, Interaction, InteractionId, Thread, ThreadId,
};

/// Direction for walking a thread's interaction log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationOrder {
    OldestFirst,
    NewestFirst,
}

/// Read access to threads, interactions and per-thread configuration
pub trait ReadTransaction {
    fn thread(&self, id: &ThreadId) -> Result<Option<Thread>>;

    /// All threads, in no particular order
    fn threads(&self) -> Result<Vec<Thread>>;

    fn interaction(&self, id: &InteractionId) -> Result<Option<Interaction>>;

    /// Interactions for a thread ordered by sort id ascending
    fn interactions(&self, thread_id: &ThreadId) -> Result<Vec<Interaction>>;

    fn interaction_count(&self, thread_id: &ThreadId) -> Result<usize>;

    /// Incoming interactions not yet marked read
    fn unread_interaction_count(&self, thread_id: &ThreadId) -> Result<usize>;

    /// The interaction with the highest sort id
    fn latest_interaction(&self, thread_id: &ThreadId) -> Result<Option<Interaction>>;

    /// Visit a thread's interactions in `order` until the visitor breaks
    fn enumerate_interactions(
        &self,
        thread_id: &ThreadId,
        order: EnumerationOrder,
        visitor: &mut dyn FnMut(&Interaction) -> ControlFlow<()>,
    ) -> Result<()>;

    /// Highest sort id ever handed out by the store (logical "now")
    fn latest_sort_id(&self) -> Result<u64>;

    fn disappearing_configuration(
        &self,
        thread_id: &ThreadId,
    ) -> Result<Option<DisappearingMessagesConfiguration>>;
}

/// Write access; only available inside a read-write transaction
pub trait WriteTransaction: ReadTransaction {
    /// View this transaction as read-only, for functions that only read
    fn as_read(&self) -> &dyn ReadTransaction;

    /// Insert or update a thread record
    fn save_thread(&mut self, thread: &Thread) -> Result<()>;

    /// Remove a thread record. Returns false if it did not exist.
    fn remove_thread(&mut self, id: &ThreadId) -> Result<bool>;

    /// Insert or update an interaction and write its sort id back.
    ///
    /// Sort ids are always store-assigned: a new interaction gets the next one
    /// whatever `sort_id` it carries, and an existing interaction keeps its own.
    fn save_interaction(&mut self, interaction: &mut Interaction) -> Result<()>;

    /// Remove an interaction. Returns false if it did not exist.
    fn remove_interaction(&mut self, id: &InteractionId) -> Result<bool>;

    /// Remove every interaction of `thread_id` matching `predicate`
    fn remove_interactions_where(
        &mut self,
        thread_id: &ThreadId,
        predicate: &dyn Fn(&Interaction) -> bool,
    ) -> Result<usize>;

    fn save_disappearing_configuration(
        &mut self,
        config: &DisappearingMessagesConfiguration,
    ) -> Result<()>;

    fn remove_disappearing_configuration(&mut self, thread_id: &ThreadId) -> Result<bool>;
}

/// A store that hands out transaction scopes
///
/// Read-write transactions are serialized; read transactions may run
/// concurrently and observe the last committed state.
pub trait ConversationStore: Send + Sync {
    fn read_transaction(
        &self,
        block: &mut dyn FnMut(&dyn ReadTransaction) -> Result<()>,
    ) -> Result<()>;

    /// Commit if `block` returns `Ok`, discard every write otherwise
    fn read_write_transaction(
        &self,
        block: &mut dyn FnMut(&mut dyn WriteTransaction) -> Result<()>,
    ) -> Result<()>;
}

/// Value-returning wrappers over [`ConversationStore`]
pub trait ConversationStoreExt: ConversationStore {
    fn read<R, F>(&self, block: F) -> Result<R>
    where
        F: FnOnce(&dyn ReadTransaction) -> Result<R>,
    {
        let mut block = Some(block);
        let mut output = None;
        self.read_transaction(&mut |tx: &dyn ReadTransaction| {
            let block = block
                .take()
                .ok_or_else(|| anyhow!("read transaction block invoked twice"))?;
            output = Some(block(tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| anyhow!("read transaction block did not run"))
    }

    fn read_write<R, F>(&self, block: F) -> Result<R>
    where
        F: FnOnce(&mut dyn WriteTransaction) -> Result<R>,
    {
        let mut block = Some(block);
        let mut output = None;
        self.read_write_transaction(&mut |tx: &mut dyn WriteTransaction| {
            let block = block
                .take()
                .ok_or_else(|| anyhow!("read-write transaction block invoked twice"))?;
            output = Some(block(tx)?);
            Ok(())
        })?;
        output.ok_or_else(|| anyhow!("read-write transaction block did not run"))
    }
}

impl<T: ConversationStore + ?Sized> ConversationStoreExt for T {}
