//! Conversation color palette and stable color assignment

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Named color assigned to a conversation
///
/// Serialized by name so persisted values survive palette reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationColorName {
    Crimson,
    Vermilion,
    Burlap,
    Forest,
    Wintergreen,
    Teal,
    Blue,
    Indigo,
    Violet,
    Plum,
    Taupe,
    Steel,
}

/// Palette order. Color assignment indexes into this list, so it must never
/// be reordered.
pub const CONVERSATION_COLOR_NAMES: [ConversationColorName; 12] = [
    ConversationColorName::Crimson,
    ConversationColorName::Vermilion,
    ConversationColorName::Burlap,
    ConversationColorName::Forest,
    ConversationColorName::Wintergreen,
    ConversationColorName::Teal,
    ConversationColorName::Blue,
    ConversationColorName::Indigo,
    ConversationColorName::Violet,
    ConversationColorName::Plum,
    ConversationColorName::Taupe,
    ConversationColorName::Steel,
];

impl Default for ConversationColorName {
    fn default() -> Self {
        ConversationColorName::Steel
    }
}

impl ConversationColorName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationColorName::Crimson => "crimson",
            ConversationColorName::Vermilion => "vermilion",
            ConversationColorName::Burlap => "burlap",
            ConversationColorName::Forest => "forest",
            ConversationColorName::Wintergreen => "wintergreen",
            ConversationColorName::Teal => "teal",
            ConversationColorName::Blue => "blue",
            ConversationColorName::Indigo => "indigo",
            ConversationColorName::Violet => "violet",
            ConversationColorName::Plum => "plum",
            ConversationColorName::Taupe => "taupe",
            ConversationColorName::Steel => "steel",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        CONVERSATION_COLOR_NAMES
            .iter()
            .copied()
            .find(|c| c.as_str() == name)
    }

    /// Deterministic color for a new conversation.
    ///
    /// The first 8 bytes of SHA-256(seed) are read as a little-endian `u64`
    /// and reduced modulo the palette size. Process hashers are randomized
    /// per launch and must not be used here.
    pub fn stable_for_seed(seed: &str) -> Self {
        let digest = Sha256::digest(seed.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        let hash = u64::from_le_bytes(prefix);
        let index = (hash % CONVERSATION_COLOR_NAMES.len() as u64) as usize;
        CONVERSATION_COLOR_NAMES[index]
    }
}
