//! Configuration for the escrow service

use serde::{Deserialize, Serialize};

/// Main service configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EscrowConfig {
    /// Identity allowed to lock, unlock and burn; the registry runs as this identity
    #[serde(default = "default_authority")]
    pub authority: String,

    /// Snapshot persistence
    #[serde(default)]
    pub state: StateConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resources and balances created when no snapshot exists yet
    #[serde(default)]
    pub genesis: GenesisConfig,
}

impl Default for EscrowConfig {
    fn default() -> Self {
        Self {
            authority: default_authority(),
            state: StateConfig::default(),
            logging: LoggingConfig::default(),
            genesis: GenesisConfig::default(),
        }
    }
}

/// Snapshot persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Path of the JSON snapshot
    #[serde(default = "default_state_path")]
    pub path: String,

    /// Pretty-print the snapshot
    #[serde(default = "default_true")]
    pub pretty: bool,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
            pretty: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or `EnvFilter` directive
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Initial issuance applied to an empty state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub resources: Vec<GenesisResource>,

    #[serde(default)]
    pub credits: Vec<GenesisCredit>,
}

/// A resource registered at genesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisResource {
    pub id: u64,
    pub grouping_key: String,
    pub capacity: u64,
}

/// A balance credited at genesis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisCredit {
    pub resource: u64,
    pub holder: String,
    pub amount: u64,
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_authority() -> String {
    "application-registry".to_string()
}

fn default_state_path() -> String {
    "escrow-state.json".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EscrowConfig {
    /// Load configuration from defaults, an optional file, then `ESCROW__*` variables
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&EscrowConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("ESCROW")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EscrowConfig::default();
        assert_eq!(config.authority, "application-registry");
        assert_eq!(config.state.path, "escrow-state.json");
        assert!(config.state.pretty);
        assert!(config.genesis.resources.is_empty());
    }

    #[test]
    fn test_logging_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "info");
        assert!(!config.json);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EscrowConfig = serde_json::from_str(
            r#"{"genesis": {"resources": [{"id": 1, "grouping_key": "SOLENT", "capacity": 5000}]}}"#,
        )
        .unwrap();
        assert_eq!(config.authority, "application-registry");
        assert_eq!(config.genesis.resources[0].grouping_key, "SOLENT");
        assert!(config.genesis.credits.is_empty());
    }
}
