use std::path::PathBuf;

use thiserror::Error;

/// Startup and I/O failures. Anything here stops the run before or after
/// labeling; per-entry failures never surface as this type.
#[derive(Error, Debug)]
pub enum CitywatchError {
    #[error("{0} environment variable is required")]
    MissingEnv(String),

    #[error("{key} must be {expected}, got {value:?}")]
    InvalidEnv {
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("Failed to read input {}: {source}", path.display())]
    Input {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write output {}: {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}
