//! Query API for UI consumption
//!
//! Read-only views: derived per-thread state, thread lists, and search within
//! a conversation. Everything takes a `&dyn ReadTransaction`, so queries run
//! in either transaction scope.

mod search;
mod thread;
mod threads;

pub use search::{MINIMUM_SEARCH_TEXT_LENGTH, normalize_search_text, search_within_conversation};
pub use thread::DEFAULT_GROUP_TITLE;
pub use threads::{ThreadDetail, ThreadFilter, ThreadSummary, get_thread_detail, list_threads};
