use escrow_types::EscrowError;
use thiserror::Error;

/// Errors raised while configuring, loading or persisting the escrow service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Escrow(#[from] EscrowError),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported snapshot schema version {found} (expected {expected})")]
    SchemaVersion { found: u32, expected: u32 },

    #[error("snapshot authority '{found}' does not match configured authority '{expected}'")]
    AuthorityMismatch { found: String, expected: String },

    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
