use thiserror::Error;

#[derive(Error, Debug)]
pub enum RaidlogError {
    #[error("Configuration error: {0}")]
    Config(String),
}
