//! Application configuration

use std::collections::HashMap;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_with::serde_as;

use crate::errors::AisPluginError;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub feed: FeedConfig,
    pub exchange: ExchangeConfig,
    pub plugin: PluginConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Upstream AIS feed connection.
#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    /// Feature flag: when false, the poll ticker is a no-op.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Exchange bus connection.
#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    pub url: String,
    #[serde(default)]
    pub subjects: ExchangeSubjects,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeSubjects {
    #[serde(default = "default_exchange_subject")]
    pub exchange: String,
    #[serde(default = "default_error_subject")]
    pub error: String,
    #[serde(default = "default_event_bus_subject")]
    pub event_bus: String,
}

impl Default for ExchangeSubjects {
    fn default() -> Self {
        Self {
            exchange: default_exchange_subject(),
            error: default_error_subject(),
            event_bus: default_event_bus_subject(),
        }
    }
}

/// Registration identity of this plugin, plus the capability and setting
/// key-value pairs forwarded verbatim during registration.
#[derive(Debug, Deserialize, Clone)]
pub struct PluginConfig {
    pub group_id: String,
    pub application_name: String,
    #[serde(default = "default_response_topic")]
    pub response_topic: String,
    #[serde(default)]
    pub capabilities: HashMap<String, String>,
    #[serde(default)]
    pub settings: HashMap<String, String>,
}

impl PluginConfig {
    pub fn response_subscription_name(&self) -> String {
        format!("{}{}", self.group_id, self.response_topic)
    }
}

/// Tick periods of the periodic tasks, in seconds.
#[serde_as]
#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_feed_poll_interval")]
    pub feed_poll_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_registration_interval")]
    pub registration_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_movement_flush_interval")]
    pub movement_flush_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_delivery_retry_interval")]
    pub delivery_retry_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_asset_flush_interval")]
    pub asset_flush_interval: Duration,
    #[serde_as(as = "serde_with::DurationSeconds<u64>")]
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            feed_poll_interval: default_feed_poll_interval(),
            registration_interval: default_registration_interval(),
            movement_flush_interval: default_movement_flush_interval(),
            delivery_retry_interval: default_delivery_retry_interval(),
            asset_flush_interval: default_asset_flush_interval(),
            shutdown_grace: default_shutdown_grace(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(
                Environment::with_prefix("AISFORWARDER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Validate configuration parameters
    ///
    /// This is the only place allowed to prevent the service from
    /// starting.
    pub fn validate(&self) -> Result<(), AisPluginError> {
        self.feed.validate()?;
        self.plugin.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

impl FeedConfig {
    fn validate(&self) -> Result<(), AisPluginError> {
        if self.host.is_empty() {
            return Err(AisPluginError::ConfigurationError {
                message: "Feed host cannot be empty".to_string(),
            });
        }
        if self.port == 0 {
            return Err(AisPluginError::ConfigurationError {
                message: "Feed port cannot be zero".to_string(),
            });
        }
        Ok(())
    }
}

impl PluginConfig {
    fn validate(&self) -> Result<(), AisPluginError> {
        if self.group_id.is_empty() {
            return Err(AisPluginError::ConfigurationError {
                message: "Plugin group id cannot be empty".to_string(),
            });
        }
        if self.application_name.is_empty() {
            return Err(AisPluginError::ConfigurationError {
                message: "Plugin application name cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl SchedulerConfig {
    fn validate(&self) -> Result<(), AisPluginError> {
        let intervals = [
            self.feed_poll_interval,
            self.registration_interval,
            self.movement_flush_interval,
            self.delivery_retry_interval,
            self.asset_flush_interval,
        ];
        if intervals.iter().any(Duration::is_zero) {
            return Err(AisPluginError::ConfigurationError {
                message: "Tick intervals must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn default_enabled() -> bool {
    true
}

fn default_exchange_subject() -> String {
    "exchange.event".to_string()
}

fn default_error_subject() -> String {
    "exchange.plugin.failed-report".to_string()
}

fn default_event_bus_subject() -> String {
    "exchange.event-bus".to_string()
}

fn default_response_topic() -> String {
    "PLUGIN_RESPONSE".to_string()
}

fn default_feed_poll_interval() -> Duration {
    Duration::from_secs(15)
}

fn default_registration_interval() -> Duration {
    Duration::from_secs(30)
}

fn default_movement_flush_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_delivery_retry_interval() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_asset_flush_interval() -> Duration {
    Duration::from_secs(60 * 60)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(15)
}
