pub mod config;
pub mod error;
pub mod types;

pub use config::WorkerConfig;
pub use error::RaidlogError;
pub use types::*;
