//! Configuration module for mintwatch-server.
//!
//! Handles loading configuration from the TOML file, CLI arguments and
//! environment variables, and turns the result into a validated
//! [`PipelineConfig`].

pub mod file;

use crate::config::file::{FeedSection, FileConfig, LedgerSection};
use mintwatch_core::config::{
    FeedConfig, LedgerConfig, MintCriteria, NotifierConfig, PipelineConfig,
};
use mintwatch_sdk::objects::ledger::Commitment;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("invalid url for {field}: {source}")]
    InvalidUrl {
        field: &'static str,
        source: url::ParseError,
    },

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("webhook endpoint not set (DISCORD_WEBHOOK, --webhook-url or [notifier].webhook_url)")]
    MissingWebhook,
}

/// Values from the command line or environment that take precedence over
/// the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub webhook_url: Option<Url>,
    pub dedup_file: Option<PathBuf>,
    /// Keep the dedup set in memory only.
    pub no_dedup_file: bool,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
    overrides: Overrides,
}

impl ConfigLoader {
    /// Create a new config loader. Without a path the stock defaults are
    /// used.
    pub fn new(config_path: Option<impl AsRef<Path>>, overrides: Overrides) -> Self {
        Self {
            config_path: config_path.map(|p| p.as_ref().to_path_buf()),
            overrides,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file, if one was given
    /// 2. Apply CLI and environment overrides
    /// 3. Validate the configuration
    /// 4. Build the pipeline configuration
    pub fn load(&self) -> Result<PipelineConfig, ConfigError> {
        let file_config = match &self.config_path {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                toml::from_str(&content)?
            }
            None => FileConfig::default(),
        };
        self.build(file_config)
    }

    fn build(&self, mut file_config: FileConfig) -> Result<PipelineConfig, ConfigError> {
        if let Some(url) = &self.overrides.webhook_url {
            file_config.notifier.webhook_url = Some(url.clone());
        }
        if let Some(path) = &self.overrides.dedup_file {
            file_config.dedup_file = Some(path.clone());
        }
        if self.overrides.no_dedup_file {
            file_config.dedup_file = None;
        }

        validate(&file_config)?;

        let webhook_url = file_config
            .notifier
            .webhook_url
            .clone()
            .ok_or(ConfigError::MissingWebhook)?;
        let mut notifier = NotifierConfig::new(webhook_url);
        notifier.username = file_config.notifier.username;
        notifier.mention = file_config.notifier.mention;

        let feed = if file_config.feed.enabled {
            Some(convert_feed(file_config.feed)?)
        } else {
            None
        };

        Ok(PipelineConfig {
            feed,
            ledger: file_config.ledger.map(convert_ledger),
            notifier,
            dedup_path: file_config.dedup_file,
            shutdown_grace: Duration::from_secs(file_config.shutdown_grace_secs),
            request_timeout: Duration::from_secs(file_config.request_timeout_secs),
        })
    }
}

fn validate(config: &FileConfig) -> Result<(), ConfigError> {
    if config.request_timeout_secs == 0 {
        return Err(ConfigError::ValidationError(
            "request_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if config.feed.enabled {
        if config.feed.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "feed.poll_interval_secs must be greater than zero".to_string(),
            ));
        }
        if config.feed.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "feed.page_size must be greater than zero".to_string(),
            ));
        }
    }

    if let Some(ledger) = &config.ledger {
        if ledger.deployer.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "ledger.deployer must not be empty".to_string(),
            ));
        }
        if ledger.lookup_commitment == Commitment::Processed {
            return Err(ConfigError::ValidationError(
                "ledger.lookup_commitment must be confirmed or finalized".to_string(),
            ));
        }
        if ledger.programs.is_empty() || ledger.operation_kinds.is_empty() {
            return Err(ConfigError::ValidationError(
                "ledger.programs and ledger.operation_kinds must not be empty".to_string(),
            ));
        }
    }

    if !config.feed.enabled && config.ledger.is_none() {
        return Err(ConfigError::ValidationError(
            "no source enabled: enable [feed] or add a [ledger] section".to_string(),
        ));
    }
    Ok(())
}

fn convert_feed(feed: FeedSection) -> Result<FeedConfig, ConfigError> {
    let endpoint = Url::parse(&feed.endpoint).map_err(|source| ConfigError::InvalidUrl {
        field: "feed.endpoint",
        source,
    })?;
    let mut config = FeedConfig::new(endpoint);
    config.page_size = feed.page_size;
    config.poll_interval = Duration::from_secs(feed.poll_interval_secs);
    config.project_link_base = feed.project_link_base;
    Ok(config)
}

fn convert_ledger(ledger: LedgerSection) -> LedgerConfig {
    let mut config = LedgerConfig::new(ledger.rpc_url, ledger.ws_url, ledger.deployer.trim());
    config.criteria = MintCriteria {
        programs: ledger.programs,
        operation_kinds: ledger.operation_kinds,
        log_marker: ledger.log_marker,
    };
    config.subscribe_commitment = ledger.subscribe_commitment;
    config.lookup_commitment = ledger.lookup_commitment;
    config.resubscribe_delay = Duration::from_secs(ledger.resubscribe_delay_secs);
    config.explorer_link_base = ledger.explorer_link_base;
    config
}
