use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },

    #[error("TAX_RATE_PERCENT must be between 0 and 100, got {0}")]
    TaxRateOutOfRange(Decimal),

    #[error("AUDIT_BUFFER_SIZE must be at least 1")]
    ZeroAuditBuffer,
}

/// Engine configuration
///
/// # Environment variables
///
/// | Variable | Default | Meaning |
/// |----------|---------|---------|
/// | WORK_DIR | ./data | redb files and logs |
/// | TAX_RATE_PERCENT | 13 | tax rate applied to every order |
/// | DEFAULT_PRINT_DESTINATION | unset | fallback for unassigned items |
/// | PRINT_TIMEOUT_MS | 5000 | per-printer network timeout |
/// | TICKET_WIDTH | 48 | ticket characters per line |
/// | AUDIT_BUFFER_SIZE | 1024 | audit channel capacity |
/// | LOG_LEVEL | info | base log level (RUST_LOG wins) |
/// | LOG_JSON | false | JSON console output |
/// | ENVIRONMENT | development | development / production |
///
/// A `.env` file in the working directory is loaded first if present.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub work_dir: String,
    pub tax_rate_percent: Decimal,
    pub default_print_destination: Option<String>,
    pub print_timeout_ms: u64,
    pub ticket_width: usize,
    pub audit_buffer_size: usize,
    pub log_level: String,
    pub log_json: bool,
    pub environment: String,
}

impl Config {
    /// Load from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load from an arbitrary variable source, then validate
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self {
            work_dir: lookup("WORK_DIR").unwrap_or_else(|| "./data".into()),
            tax_rate_percent: parse_var(&lookup, "TAX_RATE_PERCENT", Decimal::from(13))?,
            default_print_destination: lookup("DEFAULT_PRINT_DESTINATION")
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            print_timeout_ms: parse_var(&lookup, "PRINT_TIMEOUT_MS", 5000)?,
            ticket_width: parse_var(&lookup, "TICKET_WIDTH", 48)?,
            audit_buffer_size: parse_var(&lookup, "AUDIT_BUFFER_SIZE", 1024)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".into()),
            log_json: parse_var(&lookup, "LOG_JSON", false)?,
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| "development".into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Defaults rooted at `work_dir` (tests, embedding)
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        Self {
            work_dir: work_dir.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tax_rate_percent < Decimal::ZERO || self.tax_rate_percent > Decimal::ONE_HUNDRED {
            return Err(ConfigError::TaxRateOutOfRange(self.tax_rate_percent));
        }
        if self.audit_buffer_size == 0 {
            return Err(ConfigError::ZeroAuditBuffer);
        }
        Ok(())
    }

    pub fn print_timeout(&self) -> Duration {
        Duration::from_millis(self.print_timeout_ms)
    }

    pub fn orders_db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    pub fn audit_db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("audit.redb")
    }

    pub fn tickets_db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("tickets.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: "./data".into(),
            tax_rate_percent: Decimal::from(13),
            default_print_destination: None,
            print_timeout_ms: 5000,
            ticket_width: 48,
            audit_buffer_size: 1024,
            log_level: "info".into(),
            log_json: false,
            environment: "development".into(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
    }
}
