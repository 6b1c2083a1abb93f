#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Stats {
    connect_attempts: u32,
    reconnects: u32,
    events_sent: u64,
    events_received: u64,
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_attempt(&mut self) {
        self.connect_attempts += 1;
    }

    pub(crate) fn record_connected(&mut self, is_reconnect: bool) {
        if is_reconnect {
            self.reconnects += 1;
        }
    }

    pub(crate) fn record_sent(&mut self) {
        self.events_sent += 1;
    }

    pub(crate) fn record_received(&mut self) {
        self.events_received += 1;
    }

    pub fn connect_attempts(&self) -> u32 {
        self.connect_attempts
    }

    pub fn reconnects(&self) -> u32 {
        self.reconnects
    }

    pub fn events_sent(&self) -> u64 {
        self.events_sent
    }

    pub fn events_received(&self) -> u64 {
        self.events_received
    }
}
