use crate::{Error, Result};

/// Process configuration loaded from environment variables at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Path to the strategy TOML file.
    pub strategy_config_path: String,
    /// Path to the JSON-lines bar file to replay.
    pub bars_path: String,
    /// Starting cash of the paper account.
    pub paper_initial_cash: f64,
    /// Slippage in basis points applied to every paper fill.
    pub paper_slippage_bps: f64,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the config from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bars_path = lookup("BARS_PATH").ok_or_else(|| {
            Error::Config("Required environment variable 'BARS_PATH' is not set".into())
        })?;

        Ok(Config {
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/strategy.toml".to_string()),
            bars_path,
            paper_initial_cash: parse_f64(&lookup, "PAPER_INITIAL_CASH", 10_000.0)?,
            paper_slippage_bps: parse_f64(&lookup, "PAPER_SLIPPAGE_BPS", 0.0)?,
        })
    }
}

fn parse_f64<F>(lookup: &F, key: &str, default: f64) -> Result<f64>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::Config(format!("{key} must be a number, got '{raw}'"))),
    }
}
