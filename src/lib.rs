pub mod config;
pub mod devices;
pub mod error;
pub mod snapshot;
pub mod timeouts;
pub mod utils;

pub use config::Config;
pub use error::SnapshotError;

pub type Result<T> = std::result::Result<T, SnapshotError>;
