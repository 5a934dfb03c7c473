use std::time::Duration;

use secrecy::SecretString;

use crate::consts::{
    BASE_URL, DATA_CHANNEL_LABEL, DEFAULT_ICE_SERVERS, ICE_CANDIDATE_POOL_SIZE, OPENAI_API_KEY, RECONNECT_DELAY_MS,
    SETTINGS_DEBOUNCE_MS, STATS_INTERVAL_SECS,
};

/// Process-wide settings read once when the session manager is built.
#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    api_key: Option<SecretString>,
    ice_servers: Vec<String>,
    ice_candidate_pool_size: u8,
    data_channel_label: String,
    stats_interval: Duration,
    reconnect_delay: Duration,
    settings_debounce: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.config.api_key = Some(SecretString::from(api_key.to_string()));
        self
    }

    pub fn without_api_key(mut self) -> Self {
        self.config.api_key = None;
        self
    }

    pub fn with_ice_servers(mut self, ice_servers: Vec<String>) -> Self {
        self.config.ice_servers = ice_servers;
        self
    }

    pub fn with_data_channel_label(mut self, label: &str) -> Self {
        self.config.data_channel_label = label.to_string();
        self
    }

    pub fn with_stats_interval(mut self, interval: Duration) -> Self {
        self.config.stats_interval = interval;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn with_settings_debounce(mut self, debounce: Duration) -> Self {
        self.config.settings_debounce = debounce;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Defaults, with the credential taken from `OPENAI_API_KEY`. An unset or
    /// empty variable leaves the credential absent.
    pub fn new() -> Self {
        let api_key = std::env::var(OPENAI_API_KEY)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);
        Self {
            base_url: BASE_URL.to_string(),
            api_key,
            ice_servers: DEFAULT_ICE_SERVERS.iter().map(|s| s.to_string()).collect(),
            ice_candidate_pool_size: ICE_CANDIDATE_POOL_SIZE,
            data_channel_label: DATA_CHANNEL_LABEL.to_string(),
            stats_interval: Duration::from_secs(STATS_INTERVAL_SECS),
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
            settings_debounce: Duration::from_millis(SETTINGS_DEBOUNCE_MS),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&SecretString> {
        self.api_key.as_ref()
    }

    pub fn ice_servers(&self) -> &[String] {
        &self.ice_servers
    }

    pub fn ice_candidate_pool_size(&self) -> u8 {
        self.ice_candidate_pool_size
    }

    pub fn data_channel_label(&self) -> &str {
        &self.data_channel_label
    }

    pub fn stats_interval(&self) -> Duration {
        self.stats_interval
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }

    pub fn settings_debounce(&self) -> Duration {
        self.settings_debounce
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_builder_overrides() {
        let config = Config::builder()
            .with_base_url("http://localhost:8080/v1/")
            .with_api_key("sk-test")
            .with_ice_servers(vec!["stun:example.org:3478".to_string()])
            .build();
        assert_eq!(config.base_url(), "http://localhost:8080/v1");
        assert_eq!(config.api_key().map(|k| k.expose_secret()), Some("sk-test"));
        assert_eq!(config.ice_servers(), ["stun:example.org:3478".to_string()]);
        assert_eq!(config.data_channel_label(), "oai-events");
    }

    #[test]
    fn test_defaults() {
        let config = Config::builder().without_api_key().build();
        assert!(config.api_key().is_none());
        assert_eq!(config.ice_servers().len(), 5);
        assert_eq!(config.ice_candidate_pool_size(), 10);
        assert_eq!(config.stats_interval(), Duration::from_secs(10));
    }
}
