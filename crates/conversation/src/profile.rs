//! Profile lookup capability
//!
//! Display names and whitelist state are owned elsewhere. Threads consume
//! them through [`ProfileLookup`], passed in by the caller.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use crate::models::ThreadId;

/// Read-only view of participant profiles
pub trait ProfileLookup: Send + Sync {
    fn display_name(&self, participant_id: &str) -> Option<String>;

    fn is_in_whitelist(&self, participant_id: &str) -> bool;

    fn is_thread_in_whitelist(&self, thread_id: &ThreadId) -> bool;

    /// Identifier of the local user, if known
    fn local_identifier(&self) -> Option<String> {
        None
    }
}

#[derive(Debug, Default)]
struct ProfileState {
    names: HashMap<String, String>,
    whitelist: HashSet<String>,
    thread_whitelist: HashSet<String>,
    local_identifier: Option<String>,
}

/// In-memory [`ProfileLookup`] for tests and embedders without a profile store
#[derive(Debug, Default)]
pub struct InMemoryProfileLookup {
    state: RwLock<ProfileState>,
}

impl InMemoryProfileLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup for a device whose user is `local_identifier`
    pub fn for_local_user(local_identifier: impl Into<String>) -> Self {
        let lookup = Self::new();
        lookup.set_local_identifier(Some(local_identifier.into()));
        lookup
    }

    pub fn set_display_name(&self, participant_id: impl Into<String>, name: impl Into<String>) {
        if let Ok(mut state) = self.state.write() {
            state.names.insert(participant_id.into(), name.into());
        }
    }

    pub fn set_whitelisted(&self, participant_id: impl Into<String>, whitelisted: bool) {
        if let Ok(mut state) = self.state.write() {
            let id = participant_id.into();
            if whitelisted {
                state.whitelist.insert(id);
            } else {
                state.whitelist.remove(&id);
            }
        }
    }

    pub fn set_thread_whitelisted(&self, thread_id: &ThreadId, whitelisted: bool) {
        if let Ok(mut state) = self.state.write() {
            if whitelisted {
                state.thread_whitelist.insert(thread_id.0.clone());
            } else {
                state.thread_whitelist.remove(thread_id.as_str());
            }
        }
    }

    pub fn set_local_identifier(&self, local_identifier: Option<String>) {
        if let Ok(mut state) = self.state.write() {
            state.local_identifier = local_identifier;
        }
    }
}

// A poisoned lock reads as "unknown"
impl ProfileLookup for InMemoryProfileLookup {
    fn display_name(&self, participant_id: &str) -> Option<String> {
        self.state.read().ok()?.names.get(participant_id).cloned()
    }

    fn is_in_whitelist(&self, participant_id: &str) -> bool {
        self.state
            .read()
            .map(|s| s.whitelist.contains(participant_id))
            .unwrap_or(false)
    }

    fn is_thread_in_whitelist(&self, thread_id: &ThreadId) -> bool {
        self.state
            .read()
            .map(|s| s.thread_whitelist.contains(thread_id.as_str()))
            .unwrap_or(false)
    }

    fn local_identifier(&self) -> Option<String> {
        self.state.read().ok()?.local_identifier.clone()
    }
}
