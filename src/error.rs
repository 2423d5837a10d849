use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScanError>;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Setup failed: {0}")]
    Setup(String),

    #[error("Dispatch failed: {0}")]
    Dispatch(String),

    #[error("Submission failed: {0}")]
    Submission(String),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Manifest error in {file}: {message}")]
    Manifest { file: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Scan cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScanError {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Cancelled => 130,
            _ => 2,
        }
    }
}
