use playgate_model::AdSlotState;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Ad network error: {0}")]
    AdNetwork(String),

    #[error("Progress store error: {0}")]
    Store(String),

    #[error("Progress cache error: {0}")]
    Cache(String),

    #[error("Media engine error: {0}")]
    Engine(String),

    #[error("Invalid ad slot transition: {from} -> {to}")]
    InvalidTransition {
        from: AdSlotState,
        to: AdSlotState,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
