//! Configuration management
//!
//! Each service deserializes exactly the settings it needs, layered from an
//! optional config file plus `CASINO_*` environment variables (nested keys
//! separated by `__`, e.g. `CASINO_BROKER__URL`, `CASINO_EXCHANGE__API_KEY`).
//! A missing required setting fails deserialization, which is a fatal
//! startup condition rather than a runtime error.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::pipeline::DEFAULT_CHANNEL_CAPACITY;

#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    /// Broker gateway URL (the `/topics/{topic}` bridge is appended).
    pub url: String,
    /// Bound on the stage hand-off channels; a full channel blocks the
    /// producer instead of dropping events.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Rate quote API endpoint.
    pub api_url: String,
    /// Access key sent as the `access_key` query parameter.
    pub api_key: String,
    /// How long a fetched rate stays valid in the cache, in seconds.
    pub cache_ttl_secs: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string for the players catalog.
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Listen address for the metrics snapshot endpoint, e.g. `0.0.0.0:8080`.
    pub listen_addr: String,
}

/// Settings for the one-shot event generator.
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorServiceConfig {
    pub broker: BrokerConfig,
    pub output_topic: String,
    /// Hard deadline for the run; the generator stops on its own rather than
    /// waiting for an interrupt.
    #[serde(default = "default_run_secs")]
    pub run_secs: u64,
}

/// Settings for the currency-conversion service.
#[derive(Debug, Clone, Deserialize)]
pub struct CurrencyServiceConfig {
    pub broker: BrokerConfig,
    pub input_topic: String,
    pub output_topic: String,
    pub exchange: ExchangeConfig,
}

/// Settings for the description-enrichment service.
#[derive(Debug, Clone, Deserialize)]
pub struct DescriptionServiceConfig {
    pub broker: BrokerConfig,
    pub input_topic: String,
    pub output_topic: String,
}

/// Settings for the player-enrichment service.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerServiceConfig {
    pub broker: BrokerConfig,
    pub input_topic: String,
    pub output_topic: String,
    pub database: DatabaseConfig,
}

/// Settings for the metrics materialization service.
#[derive(Debug, Clone, Deserialize)]
pub struct MaterializeServiceConfig {
    pub broker: BrokerConfig,
    pub input_topic: String,
    pub http: HttpConfig,
}

/// Load a service's configuration from `{path}.toml` (if present) overlaid
/// with `CASINO_*` environment variables.
pub fn load_service<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(path).required(false))
        .add_source(config::Environment::with_prefix("CASINO").separator("__"))
        .build()?;

    Ok(settings.try_deserialize()?)
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_run_secs() -> u64 {
    5
}
