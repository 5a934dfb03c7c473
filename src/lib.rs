pub mod callbacks;
pub mod config;
pub mod consts;
pub mod diagnostics;
pub mod error;
pub mod manager;
pub mod media;
pub mod negotiator;
pub mod notify;
pub mod router;
pub mod settings;
pub mod transport;

pub use voice_session_types as types;

#[cfg(feature = "utils")]
pub use voice_session_utils as utils;

pub use callbacks::SessionCallbacks;
pub use config::{Config, ConfigBuilder};
pub use diagnostics::{ConnectionStats, QualityIssue};
pub use error::{MediaError, Result, SessionError};
pub use manager::{SessionManager, SessionManagerBuilder, SessionState, SessionStatus};
pub use notify::{Notice, Notifier, Severity};
pub use settings::{SettingsSource, SettingsStore};
