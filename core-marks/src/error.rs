use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarkError {
    #[error("Recorder {recorder} failed: {message}")]
    Recorder { recorder: String, message: String },

    #[error("Actor identity unavailable: {0}")]
    Identity(String),

    #[error("Mark ledger error: {0}")]
    Ledger(String),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, MarkError>;
