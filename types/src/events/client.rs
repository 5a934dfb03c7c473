use crate::session::Session;

/// `session.update` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionUpdateEvent {
    /// The session configuration to update
    session: Session,
}

impl SessionUpdateEvent {
    pub fn new(session: Session) -> Self {
        Self { session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}
