pub mod ms {
    pub const NAVIGATION_TIMEOUT: u64 = 30_000;
    pub const SELECTOR_TIMEOUT: u64 = 30_000;
    pub const INTERACTION_TIMEOUT: u64 = 5_000;
    pub const INTERACTION_DELAY: u64 = 100;
    pub const SCROLL_DELAY: u64 = 1_000;
    pub const POLL_INTERVAL: u64 = 100;
    pub const VIEWPORT_SETTLE: u64 = 50;
    pub const NETWORK_IDLE: u64 = 500;
}

pub mod secs {
    pub const CDP_REQUEST: u64 = 120;
}
