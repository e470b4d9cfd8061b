//! Conversation crate - Business logic for messaging conversation threads
//!
//! This crate provides platform-independent conversation functionality:
//! - Domain models (Thread, Interaction, DisappearingMessagesConfiguration)
//! - The friend request handshake state machine and its message cleanup
//! - Stable conversation color assignment
//! - Transaction-scoped storage with in-memory and SQLite backends
//! - Query API for UI consumption (thread lists, details, search)
//! - Thread mutations (archive, mute, drafts, read state)
//!
//! Every operation takes an explicit transaction. Mutations need a
//! [`WriteTransaction`], which only exists inside
//! [`ConversationStoreExt::read_write`].
//!
//! The `ffi` module exposes a UniFFI facade for Swift/Kotlin hosts.

pub mod actions;
pub mod config;
pub mod error;
pub mod ffi;
pub mod friend_request;
pub mod models;
pub mod profile;
pub mod query;
pub mod storage;

pub use crate::config::ConversationSettings;
pub use error::ThreadError;
pub use friend_request::FriendRequestStatus;
pub use models::{
    CONVERSATION_COLOR_NAMES, ConversationColorName, DisappearingMessagesConfiguration,
    FriendRequestMessageState, InfoMessageKind, Interaction, InteractionId, InteractionKind,
    Thread, ThreadId, ThreadKind, VALID_DURATIONS_SECONDS,
};
pub use profile::{InMemoryProfileLookup, ProfileLookup};
pub use query::{
    ThreadDetail, ThreadFilter, ThreadSummary, get_thread_detail, list_threads,
    search_within_conversation,
};
pub use storage::{
    ConversationStore, ConversationStoreExt, EnumerationOrder, InMemoryConversationStore,
    ReadTransaction, SqliteConversationStore, WriteTransaction,
};

uniffi::setup_scaffolding!();
