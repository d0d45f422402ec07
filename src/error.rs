use thiserror::Error;

#[derive(Error, Debug)]
pub enum TikbatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Encoder runtime not found: {0}")]
    RuntimeNotFound(String),

    #[error("Failed to launch encoder: {0}")]
    Launch(String),

    #[error("Encoding failed: {0}")]
    Encode(String),

    #[error("Invalid input: {0}")]
    InputInvalid(String),

    #[error("Settings error: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, TikbatchError>;
