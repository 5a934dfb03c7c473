pub mod events;
pub mod message;
pub mod session;
pub mod settings;

pub use events::{ClientEvent, ServerEvent};
pub use message::{ConversationTurn, Role, VoiceMessage};
pub use session::Session;
pub use settings::{Model, SessionConfig, Voice};
