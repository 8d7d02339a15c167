//! Environment-backed runtime configuration for the bootstrap orchestrator.

use std::{
    env,
    error::Error,
    fmt,
    path::{Path, PathBuf},
};

const DEFAULT_DATA_DIR: &str = "./.lark-client-store";
const SETTINGS_FILENAME: &str = ".lark-connection.json";
const DEFAULT_CHAT_REFRESH_LIMIT: u32 = 100;

/// Runtime configuration used by the bootstrap orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapConfig {
    /// Optional server-address prefill for the first-run/connect form.
    pub prefill_server_address: Option<String>,
    /// Optional credential prefill for the first-run/connect form.
    pub prefill_credential: Option<String>,
    /// Directory holding persisted client files.
    pub data_dir: PathBuf,
    /// Chat count requested from the backend on each chat-list refresh.
    pub chat_refresh_limit: u32,
}

impl BootstrapConfig {
    /// Parse configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(mut lookup: F) -> Result<Self, ConfigError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let prefill_server_address = optional_trimmed_env("LARK_SERVER_ADDRESS", &mut lookup);
        let prefill_credential = optional_trimmed_env("LARK_CREDENTIAL", &mut lookup);
        let data_dir = optional_trimmed_env("LARK_DATA_DIR", &mut lookup)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));
        let chat_refresh_limit = parse_optional_u32(
            "LARK_CHAT_REFRESH_LIMIT",
            DEFAULT_CHAT_REFRESH_LIMIT,
            &mut lookup,
        )?;

        if chat_refresh_limit == 0 {
            return Err(ConfigError::InvalidValue {
                key: "LARK_CHAT_REFRESH_LIMIT",
                value: "0".to_owned(),
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Self {
            prefill_server_address,
            prefill_credential,
            data_dir,
            chat_refresh_limit,
        })
    }

    /// Location of the persisted connection settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.data_dir.join(SETTINGS_FILENAME)
    }
}

/// Errors produced while parsing runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable could not be parsed.
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidValue { key, value, reason } => {
                write!(f, "invalid {key}='{value}': {reason}")
            }
        }
    }
}

impl Error for ConfigError {}

fn optional_trimmed_env<F>(key: &'static str, lookup: &mut F) -> Option<String>
where
    F: FnMut(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn parse_optional_u32<F>(
    key: &'static str,
    default: u32,
    lookup: &mut F,
) -> Result<u32, ConfigError>
where
    F: FnMut(&str) -> Option<String>,
{
    let Some(value) = lookup(key) else {
        return Ok(default);
    };
    value
        .parse::<u32>()
        .map_err(|err| ConfigError::InvalidValue {
            key,
            value,
            reason: err.to_string(),
        })
}
