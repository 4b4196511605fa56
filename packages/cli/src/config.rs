//! Environment-variable configuration.
//!
//! All settings live in the environment, not in flags — the binary runs
//! the same way under a scheduler as it does from a shell. Values are read
//! once at startup into an explicit [`Config`] value and passed down.

use lakesync_keymap::DEFAULT_TABLE_FAMILIES;
use lakesync_queue::MAX_BATCH_KEYS;
use lakesync_transfer::DEFAULT_PART_SIZE;

/// Default listing page size.
const DEFAULT_PAGE_SIZE: i32 = 1000;

/// Default number of batches processed concurrently by `work`.
const DEFAULT_CONCURRENCY: usize = 4;

/// Errors raised while reading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Missing required environment variable.
    #[error("Missing environment variable: {name}")]
    MissingEnv {
        /// Name of the missing environment variable.
        name: &'static str,
    },

    /// Environment variable holds an unparseable value.
    #[error("Invalid value for {name}: {value}")]
    InvalidValue {
        /// Name of the offending environment variable.
        name: &'static str,
        /// The rejected value.
        value: String,
    },
}

/// Runtime configuration, read from `LAKESYNC_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Vendor export bucket (read with broker-issued credentials).
    pub source_bucket: String,
    /// Caller-owned destination bucket.
    pub destination_bucket: String,
    /// Work queue URL. Only `enumerate` and `work` need it.
    pub queue_url: Option<String>,
    /// Vendor credential broker endpoint.
    pub credentials_url: String,
    /// Vendor API bearer token. Only `enumerate` and `run` need it; the
    /// worker takes the token from each batch instead.
    pub token: Option<String>,
    /// Table families to enumerate.
    pub table_families: Vec<String>,
    /// Keys per work batch (clamped to the wire limit).
    pub batch_size: usize,
    /// Part size threshold for the copy engine, in bytes.
    pub part_size: u64,
    /// Listing page size.
    pub page_size: i32,
    /// How many batches one `work` invocation processes concurrently.
    pub concurrency: usize,
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a
    /// numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            source_bucket: require_env("LAKESYNC_SOURCE_BUCKET")?,
            destination_bucket: require_env("LAKESYNC_DEST_BUCKET")?,
            queue_url: optional_env("LAKESYNC_QUEUE_URL"),
            credentials_url: require_env("LAKESYNC_CREDENTIALS_URL")?,
            token: optional_env("LAKESYNC_TOKEN"),
            table_families: optional_env("LAKESYNC_TABLES")
                .map_or_else(default_families, |raw| parse_families(&raw)),
            batch_size: parse_or("LAKESYNC_BATCH_SIZE", MAX_BATCH_KEYS)?,
            part_size: parse_or("LAKESYNC_PART_SIZE", DEFAULT_PART_SIZE)?,
            page_size: parse_or("LAKESYNC_PAGE_SIZE", DEFAULT_PAGE_SIZE)?,
            concurrency: parse_or("LAKESYNC_CONCURRENCY", DEFAULT_CONCURRENCY)?,
        })
    }

    /// The queue URL, required for queue-backed commands.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if `LAKESYNC_QUEUE_URL` is unset.
    pub fn require_queue_url(&self) -> Result<&str, ConfigError> {
        self.queue_url.as_deref().ok_or(ConfigError::MissingEnv {
            name: "LAKESYNC_QUEUE_URL",
        })
    }

    /// The vendor API token, required for enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingEnv`] if `LAKESYNC_TOKEN` is unset.
    pub fn require_token(&self) -> Result<&str, ConfigError> {
        self.token.as_deref().ok_or(ConfigError::MissingEnv {
            name: "LAKESYNC_TOKEN",
        })
    }
}

fn require_env(name: &'static str) -> Result<String, ConfigError> {
    optional_env(name).ok_or(ConfigError::MissingEnv { name })
}

fn optional_env(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    optional_env(name).map_or(Ok(default), |raw| {
        raw.parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw,
        })
    })
}

fn default_families() -> Vec<String> {
    DEFAULT_TABLE_FAMILIES
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Splits a comma-separated family list, trimming whitespace and dropping
/// empty segments.
fn parse_families(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|family| !family.is_empty())
        .map(ToString::to_string)
        .collect()
}
