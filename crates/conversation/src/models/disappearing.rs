//! Per-thread disappearing messages policy

use super::ThreadId;
use serde::{Deserialize, Serialize};

/// Durations offered to users, in seconds
pub const VALID_DURATIONS_SECONDS: [u32; 11] = [
    5,
    10,
    30,
    60,
    5 * 60,
    30 * 60,
    60 * 60,
    6 * 60 * 60,
    12 * 60 * 60,
    24 * 60 * 60,
    7 * 24 * 60 * 60,
];

/// Disappearing messages configuration, stored as its own record keyed by
/// the thread id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisappearingMessagesConfiguration {
    pub thread_id: ThreadId,
    pub enabled: bool,
    pub duration_seconds: u32,
}

impl DisappearingMessagesConfiguration {
    pub fn new(thread_id: ThreadId, enabled: bool, duration_seconds: u32) -> Self {
        Self {
            thread_id,
            enabled,
            duration_seconds,
        }
    }

    /// Configuration used when none has been persisted
    pub fn disabled(thread_id: ThreadId, default_duration_seconds: u32) -> Self {
        Self::new(thread_id, false, default_duration_seconds)
    }

    /// Effective duration: zero when disabled
    pub fn effective_duration_seconds(&self) -> u32 {
        if self.enabled { self.duration_seconds } else { 0 }
    }

    pub fn is_valid_duration(duration_seconds: u32) -> bool {
        VALID_DURATIONS_SECONDS.contains(&duration_seconds)
    }
}
