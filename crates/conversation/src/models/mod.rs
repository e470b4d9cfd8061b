//! Domain models for conversation entities

mod color;
mod disappearing;
mod interaction;
mod thread;

pub use color::{CONVERSATION_COLOR_NAMES, ConversationColorName};
pub use disappearing::{DisappearingMessagesConfiguration, VALID_DURATIONS_SECONDS};
pub use interaction::{
    FriendRequestMessageState, InfoMessageKind, Interaction, InteractionBuilder, InteractionId,
    InteractionKind,
};
pub use thread::{Thread, ThreadId, ThreadKind};
