//! Storage traits and implementations
//!
//! All access to threads and interactions goes through transaction scopes
//! handed out by a [`ConversationStore`]. Two backends: an in-memory store for
//! tests and ephemeral sessions, and a SQLite store for persistence.

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryConversationStore;
pub use sqlite::SqliteConversationStore;
pub use traits::{
    ConversationStore, ConversationStoreExt, EnumerationOrder, ReadTransaction, WriteTransaction,
};
