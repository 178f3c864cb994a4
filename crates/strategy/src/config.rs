use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use common::{Error, Result};

/// Strategy config file (TOML). Immutable once the engine is built.
///
/// Example `config/strategy.toml`:
/// ```toml
/// short_period = 5
/// long_period = 20
/// risk_pct = 0.1
/// stop_loss_pct = 0.08
/// trailing_stop_pct = 0.05
/// fee_pct = 0.001
/// hold_period = 10
/// min_short_cash = 110.0
///
/// [[instrument]]
/// symbol = "BTCUSDT"
/// lot_size = 0.00001
/// ```
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StrategyConfig {
    /// Window length of the fast moving average.
    #[serde(default = "default_short_period")]
    pub short_period: usize,
    /// Window length of the slow moving average. Must exceed `short_period`.
    #[serde(default = "default_long_period")]
    pub long_period: usize,
    /// Fraction of equity committed per entry (e.g. 0.1 = 10%).
    #[serde(default = "default_risk_pct")]
    pub risk_pct: f64,
    /// Stop-loss offset from the entry close (e.g. 0.08 = 8%).
    #[serde(default = "default_stop_loss_pct")]
    pub stop_loss_pct: f64,
    /// Trailing-stop offset from the entry close. `0.0` disables trailing stops.
    #[serde(default = "default_trailing_stop_pct")]
    pub trailing_stop_pct: f64,
    /// Exchange fee per fill as a fraction of notional.
    #[serde(default = "default_fee_pct")]
    pub fee_pct: f64,
    /// Bars a long position is held before the time-based exit fires.
    #[serde(default = "default_hold_period")]
    pub hold_period: u64,
    /// Shorts are only opened while available cash is strictly above this.
    #[serde(default = "default_min_short_cash")]
    pub min_short_cash: f64,
    /// Divide entry size by `1 + fee_pct` so the fee fits inside the risk budget.
    #[serde(default)]
    pub net_fees: bool,
    #[serde(default)]
    pub trailing_mode: TrailingMode,
    #[serde(default)]
    pub short_exit: ShortExitPolicy,
    #[serde(rename = "instrument", default)]
    pub instruments: Vec<InstrumentConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct InstrumentConfig {
    /// Trading symbol, e.g. "BTCUSDT".
    pub symbol: String,
    /// Minimum tradable increment. Entry sizes are floored to a multiple of it.
    #[serde(default)]
    pub lot_size: Option<f64>,
}

impl InstrumentConfig {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            lot_size: None,
        }
    }
}

/// How the trailing stop behaves after entry.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrailingMode {
    /// Fixed offset from the entry close; never moves.
    #[default]
    Static,
    /// Follows the close in the position's favour, never against it.
    Ratchet,
}

/// When an open short is closed.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShortExitPolicy {
    /// Only through the flip to long on a bullish crossover.
    #[default]
    Reversal,
    /// Also on hold-period expiry, mirroring the long exit.
    Symmetric,
}

// Serde defaults
fn default_short_period() -> usize {
    5
}
fn default_long_period() -> usize {
    20
}
fn default_risk_pct() -> f64 {
    0.1
}
fn default_stop_loss_pct() -> f64 {
    0.08
}
fn default_trailing_stop_pct() -> f64 {
    0.05
}
fn default_fee_pct() -> f64 {
    0.001
}
fn default_hold_period() -> u64 {
    10
}
fn default_min_short_cash() -> f64 {
    110.0
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            short_period: default_short_period(),
            long_period: default_long_period(),
            risk_pct: default_risk_pct(),
            stop_loss_pct: default_stop_loss_pct(),
            trailing_stop_pct: default_trailing_stop_pct(),
            fee_pct: default_fee_pct(),
            hold_period: default_hold_period(),
            min_short_cash: default_min_short_cash(),
            net_fees: false,
            trailing_mode: TrailingMode::default(),
            short_exit: ShortExitPolicy::default(),
            instruments: Vec::new(),
        }
    }
}

impl StrategyConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let cfg: StrategyConfig = toml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Defaults for every parameter, trading the given symbols.
    pub fn with_symbols<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            instruments: symbols.into_iter().map(InstrumentConfig::new).collect(),
            ..Self::default()
        }
    }

    /// Trailing offset, or `None` when trailing stops are disabled.
    pub fn trailing_pct(&self) -> Option<f64> {
        (self.trailing_stop_pct > 0.0).then_some(self.trailing_stop_pct)
    }

    pub fn validate(&self) -> Result<()> {
        if self.short_period == 0 {
            return Err(invalid("short_period must be at least 1"));
        }
        if self.short_period >= self.long_period {
            return Err(invalid(format!(
                "short_period ({}) must be less than long_period ({})",
                self.short_period, self.long_period
            )));
        }
        if self.instruments.is_empty() {
            return Err(invalid("at least one [[instrument]] must be configured"));
        }
        if !(self.risk_pct > 0.0 && self.risk_pct <= 1.0) {
            return Err(invalid(format!("risk_pct must be in (0, 1], got {}", self.risk_pct)));
        }
        if !(self.stop_loss_pct > 0.0 && self.stop_loss_pct < 1.0) {
            return Err(invalid(format!(
                "stop_loss_pct must be in (0, 1), got {}",
                self.stop_loss_pct
            )));
        }
        if !(self.trailing_stop_pct >= 0.0 && self.trailing_stop_pct < 1.0) {
            return Err(invalid(format!(
                "trailing_stop_pct must be in [0, 1), got {}",
                self.trailing_stop_pct
            )));
        }
        if !(self.fee_pct >= 0.0 && self.fee_pct < 1.0) {
            return Err(invalid(format!("fee_pct must be in [0, 1), got {}", self.fee_pct)));
        }
        if !(self.min_short_cash >= 0.0) {
            return Err(invalid(format!(
                "min_short_cash must be non-negative, got {}",
                self.min_short_cash
            )));
        }

        let mut seen = HashSet::new();
        for inst in &self.instruments {
            if inst.symbol.trim().is_empty() {
                return Err(invalid("instrument symbol must not be empty"));
            }
            if !seen.insert(inst.symbol.as_str()) {
                return Err(invalid(format!("instrument '{}' is configured twice", inst.symbol)));
            }
            if let Some(lot) = inst.lot_size {
                if !(lot > 0.0 && lot.is_finite()) {
                    return Err(invalid(format!(
                        "lot_size for '{}' must be positive, got {lot}",
                        inst.symbol
                    )));
                }
            }
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> Error {
    Error::Config(msg.into())
}
