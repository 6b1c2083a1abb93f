pub const SERVER_URL_ENV: &str = "ROOMIE_SERVER_URL";

pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:5000/ws";
pub const DEFAULT_CAPACITY: usize = 1024;

pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const RECONNECT_DELAY_MS: u64 = 1000;

pub const USER_AGENT_HEADER: &str = "User-Agent";
pub const USER_AGENT: &str = concat!("roomie-realtime/", env!("CARGO_PKG_VERSION"));
