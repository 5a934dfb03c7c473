//! Observable voice/model/instructions selection.

use std::sync::Arc;

use tokio::sync::watch;

use crate::types::{Model, SessionConfig, Voice};

/// Read and observe access to the user's session settings.
///
/// The session manager re-reads [`SettingsSource::current`] on every connect
/// and follows [`SettingsSource::subscribe`] while connected.
pub trait SettingsSource: Send + Sync {
    fn current(&self) -> SessionConfig;

    fn subscribe(&self) -> watch::Receiver<SessionConfig>;
}

/// In-process settings store backed by a watch channel.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    tx: Arc<watch::Sender<SessionConfig>>,
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SettingsStore {
    pub fn new(initial: SessionConfig) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx: Arc::new(tx) }
    }

    pub fn set_voice(&self, voice: Voice) {
        self.update(|config| config.voice = voice);
    }

    pub fn set_model(&self, model: Model) {
        self.update(|config| config.model = model);
    }

    pub fn set_instructions(&self, instructions: &str) {
        self.update(|config| config.instructions = instructions.to_string());
    }

    /// Applies several field changes as one notification.
    pub fn update<F>(&self, modify: F)
    where
        F: FnOnce(&mut SessionConfig),
    {
        self.tx.send_if_modified(|config| {
            let before = config.clone();
            modify(config);
            *config != before
        });
    }
}

impl SettingsSource for SettingsStore {
    fn current(&self) -> SessionConfig {
        self.tx.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<SessionConfig> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unchanged_values_do_not_notify() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();

        store.set_voice(Voice::Nova);
        assert!(!rx.has_changed().unwrap());

        store.set_voice(Voice::Echo);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().voice, Voice::Echo);
    }

    #[tokio::test]
    async fn test_update_is_one_notification() {
        let store = SettingsStore::default();
        let mut rx = store.subscribe();

        store.update(|config| {
            config.voice = Voice::Shimmer;
            config.model = Model::Tts1Hd;
        });
        rx.changed().await.unwrap();
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.voice, Voice::Shimmer);
        assert_eq!(seen.model, Model::Tts1Hd);
        assert!(!rx.has_changed().unwrap());
    }
}
