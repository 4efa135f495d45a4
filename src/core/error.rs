use thiserror::Error;

use crate::core::types::ItemRef;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("Missing mandatory configuration: {0}")]
    MissingConfig(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Regulator '{code}' does not track {item}")]
    RegulatorUnderflow { code: String, item: ItemRef },

    #[error("No active regulator for '{0}'")]
    UnknownRegulator(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AiError>;
