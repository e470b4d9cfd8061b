//! FFI bindings for UniFFI export
//!
//! Swift/Kotlin bindings for the conversation crate.
//!
//! ## Usage from Swift
//!
//! ```swift
//! import ConversationFFI
//!
//! // Initialize logging first
//! initializeLogging(callback: myLogCallback, maxLevel: .info)
//!
//! let service = try ConversationService(dbPath: "/path/to/conversation.db", configDir: nil)
//! let thread = try service.getOrCreateContactThread(recipientId: "+15551234567")
//!
//! // Send a friend request, then confirm it went out
//! _ = try service.recordOutgoingMessage(
//!     threadId: thread.id, interactionId: uuid, body: "Hi!", isFriendRequest: true)
//! try service.didSendFriendRequest(threadId: thread.id)
//! ```

mod logging;
mod service;
mod types;

pub use logging::{init_ffi_logger, set_log_callback, set_log_level};
pub use service::*;
pub use types::*;
