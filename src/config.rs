// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use crate::ingest::{DataRoot, RecordKind, RetryPolicy};
use dotenv::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Ingestion service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Time-series store connection
    pub influxdb: InfluxDbConfig,

    /// Data roots written by the node
    pub paths: PathsConfig,

    /// Retry policy for files discovered while watching
    pub retry: RetryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// InfluxDB v2 connection configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluxDbConfig {
    /// Server url (e.g., "http://localhost:8086")
    pub url: String,

    /// API token
    pub token: String,

    /// Organization name
    pub org: String,

    /// Bucket name
    pub bucket: String,

    /// Buffered lines that trigger an automatic flush
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of the `node_trades` partition tree
    pub trades_base_path: PathBuf,

    /// Root of the `node_order_statuses` partition tree
    pub orders_base_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per file before giving up
    pub max_attempts: u32,

    /// Fixed delay between attempts in milliseconds
    pub delay_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

const DEFAULT_BATCH_SIZE: usize = 5000;
const DEFAULT_RETRY_ATTEMPTS: u32 = 5;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let influxdb_config = InfluxDbConfig {
            url: required_var("INFLUXDB_URL")?,
            token: required_var("INFLUXDB_TOKEN")?,
            org: required_var("INFLUXDB_ORG")?,
            bucket: required_var("INFLUXDB_BUCKET")?,
            batch_size: parsed_var("INFLUXDB_BATCH_SIZE", DEFAULT_BATCH_SIZE),
        };

        let paths_config = PathsConfig {
            trades_base_path: PathBuf::from(required_var("TRADES_BASE_PATH")?),
            orders_base_path: PathBuf::from(required_var("ORDERS_BASE_PATH")?),
        };

        let retry_config = RetryConfig {
            max_attempts: parsed_var("RETRY_MAX_ATTEMPTS", DEFAULT_RETRY_ATTEMPTS),
            delay_ms: parsed_var("RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS),
        };

        let logging_config = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            to_file: parsed_var("LOG_TO_FILE", false),
            file_path: env::var("LOG_FILE_PATH").ok(),
        };

        let config = Config {
            influxdb: influxdb_config,
            paths: paths_config,
            retry: retry_config,
            logging: logging_config,
        };
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut file = File::open(path).map_err(|e| {
            AppError::Config(format!("Failed to open config file: {}", e))
        })?;

        let mut contents = String::new();
        file.read_to_string(&mut contents).map_err(|e| {
            AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        let config: Config = serde_json::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file: {}", e))
        })?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self).map_err(|e| {
            AppError::Config(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, contents).map_err(|e| {
            AppError::Config(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Reject values that would make the service misbehave silently
    pub fn validate(&self) -> AppResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(AppError::Config(
                "RETRY_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.influxdb.batch_size == 0 {
            return Err(AppError::Config(
                "INFLUXDB_BATCH_SIZE must be at least 1".to_string(),
            ));
        }
        if self.paths.trades_base_path.as_os_str().is_empty()
            || self.paths.orders_base_path.as_os_str().is_empty()
        {
            return Err(AppError::Config("Data root paths must not be empty".to_string()));
        }
        Ok(())
    }

    /// Data roots in backfill order: trades first, then order statuses
    pub fn data_roots(&self) -> Vec<DataRoot> {
        vec![
            DataRoot::new(RecordKind::Trade, &self.paths.trades_base_path),
            DataRoot::new(RecordKind::OrderStatus, &self.paths.orders_base_path),
        ]
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            delay: Duration::from_millis(self.retry.delay_ms),
        }
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.try_init().map_err(|e| {
            AppError::Config(format!("Failed to initialize logger: {}", e))
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = PathBuf::from(env::var("HOME").unwrap_or_default());

        Self {
            influxdb: InfluxDbConfig {
                url: "http://localhost:8086".to_string(),
                token: "".to_string(),
                org: "hyperliquid".to_string(),
                bucket: "hyperliquid".to_string(),
                batch_size: DEFAULT_BATCH_SIZE,
            },
            paths: PathsConfig {
                trades_base_path: home.join("hl/data/node_trades/hourly"),
                orders_base_path: home.join("hl/data/node_order_statuses/hourly"),
            },
            retry: RetryConfig {
                max_attempts: DEFAULT_RETRY_ATTEMPTS,
                delay_ms: DEFAULT_RETRY_DELAY_MS,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                to_file: false,
                file_path: None,
            },
        }
    }
}

fn required_var(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| {
        AppError::Config(format!("Missing {} environment variable", name))
    })
}

fn parsed_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}
