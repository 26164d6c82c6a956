use thiserror::Error;

#[derive(Error, Debug)]
pub enum LakeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Provider error for {series_id}: {message}")]
    Provider { series_id: String, message: String },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Classification invariant violated: {0}")]
    Invariant(String),

    #[error("Persistence error: {message}")]
    Persistence { message: String },
}

pub type Result<T> = std::result::Result<T, LakeError>;
