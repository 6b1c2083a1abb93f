use std::time::Duration;

use crate::client::consts::{
    DEFAULT_CAPACITY, DEFAULT_SERVER_URL, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY_MS,
    SERVER_URL_ENV,
};

#[derive(Debug, Clone)]
pub struct Config {
    base_url: String,
    capacity: usize,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity.max(1);
        self
    }

    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.config.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.config.reconnect_delay = delay;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        Self {
            base_url: std::env::var(SERVER_URL_ENV)
                .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string()),
            capacity: DEFAULT_CAPACITY,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
            reconnect_delay: Duration::from_millis(RECONNECT_DELAY_MS),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Consecutive failed connection attempts tolerated before giving up.
    pub fn max_reconnect_attempts(&self) -> u32 {
        self.max_reconnect_attempts
    }

    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect_delay
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
