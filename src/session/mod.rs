//! Session surface: per-session history and state, and the turn driver

pub mod advisor;
pub mod history;
pub mod store;

pub use advisor::{Advisor, TurnNotice, TurnReport};
pub use history::{ChatMessage, ConversationHistory, MessageRole};
pub use store::{Session, SessionStore};
