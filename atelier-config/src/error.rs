use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {origin}")]
    Toml {
        origin: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid JSON in {origin}")]
    Json {
        origin: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(
        "failed to parse config {origin}: toml error: {toml}; json error: {json}"
    )]
    Unparseable {
        origin: String,
        toml: String,
        json: String,
    },
    #[error("invalid URL for {key}: '{value}'")]
    InvalidUrl {
        key: String,
        value: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{key} must use http or https, got '{scheme}'")]
    UnsupportedScheme { key: String, scheme: String },
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}
