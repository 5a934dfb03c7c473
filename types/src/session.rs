use crate::settings::Voice;

/// Session fields pushed to the remote service over the side-channel.
///
/// Only fields that are set are serialized, so an instructions-only update
/// goes out as `{"instructions": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Session {
    /// The default system instructions prepended to model calls.
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<String>,
}

impl Session {
    pub fn builder() -> SessionConfigurator {
        SessionConfigurator::new()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}

pub struct SessionConfigurator {
    session: Session,
}

impl Default for SessionConfigurator {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionConfigurator {
    pub fn new() -> Self {
        Self {
            session: Session::default(),
        }
    }

    pub fn with_instructions(mut self, instructions: &str) -> Self {
        self.session.instructions = Some(instructions.to_string());
        self
    }

    pub fn build(self) -> Session {
        self.session
    }
}

/// Session resource as reported by `session.created` / `session.updated`.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct SessionResource {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    voice: Option<Voice>,
    #[serde(default)]
    instructions: Option<String>,
}

impl SessionResource {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn voice(&self) -> Option<&Voice> {
        self.voice.as_ref()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }
}
