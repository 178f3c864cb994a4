use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV observation for one instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub instrument: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    /// Closing price. This is the only price the moving averages observe.
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
}

impl Bar {
    /// Bar with every price set to `close`. Handy for replaying close-only series.
    pub fn flat(instrument: impl Into<String>, timestamp: DateTime<Utc>, close: f64) -> Self {
        Self {
            instrument: instrument.into(),
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }
}

/// Net direction held in one instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    #[default]
    Flat,
    Long,
    Short,
}

impl std::fmt::Display for PositionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PositionSide::Flat => write!(f, "flat"),
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// Kind of order the engine asks the execution layer to place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    /// Open a long position.
    Buy,
    /// Close a long position.
    Sell,
    /// Open a short position.
    SellShort,
    /// Close a short position.
    BuyToCover,
}

impl IntentKind {
    /// True when the order buys units (pays cash).
    pub fn is_buy(&self) -> bool {
        matches!(self, IntentKind::Buy | IntentKind::BuyToCover)
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentKind::Buy => write!(f, "BUY"),
            IntentKind::Sell => write!(f, "SELL"),
            IntentKind::SellShort => write!(f, "SELL_SHORT"),
            IntentKind::BuyToCover => write!(f, "BUY_TO_COVER"),
        }
    }
}

/// Why an intent was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentReason {
    /// Short MA crossed above / below the long MA.
    Crossover,
    /// Position closed ahead of a flip to the opposite side.
    Reversal,
    /// Position held for at least the configured hold period.
    HoldExpired,
    /// Execution layer observed a stop-loss or trailing-stop breach.
    StopTriggered,
}

impl std::fmt::Display for IntentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntentReason::Crossover => write!(f, "crossover"),
            IntentReason::Reversal => write!(f, "reversal"),
            IntentReason::HoldExpired => write!(f, "hold period expired"),
            IntentReason::StopTriggered => write!(f, "stop triggered"),
        }
    }
}

/// An order the engine wants placed. Market order at the bar's close.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub kind: IntentKind,
    pub instrument: String,
    /// Units of the instrument. Always > 0.
    pub size: f64,
    /// Reference price the decision was made at.
    pub price: f64,
    pub timestamp: DateTime<Utc>,
    pub reason: IntentReason,
}

/// Protective price levels of an open position.
///
/// Both are `None` while the instrument is flat.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StopLevels {
    pub stop_loss: Option<f64>,
    pub trailing_stop: Option<f64>,
}

impl StopLevels {
    pub fn is_empty(&self) -> bool {
        self.stop_loss.is_none() && self.trailing_stop.is_none()
    }

    /// The level that would be hit first for a position on `side`.
    /// Highest level for a long, lowest for a short.
    pub fn tightest(&self, side: PositionSide) -> Option<f64> {
        let levels = self.stop_loss.into_iter().chain(self.trailing_stop);
        match side {
            PositionSide::Long => levels.reduce(f64::max),
            PositionSide::Short => levels.reduce(f64::min),
            PositionSide::Flat => None,
        }
    }
}

/// Confirmation of an intent executed by the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub instrument: String,
    pub kind: IntentKind,
    pub fill_price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub timestamp: DateTime<Utc>,
}

/// Reason a bar was refused by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BarRejection {
    NonPositivePrice { price: f64 },
    NonFinitePrice,
    OutOfOrder {
        last: DateTime<Utc>,
        got: DateTime<Utc>,
    },
    UnknownInstrument,
}

impl std::fmt::Display for BarRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BarRejection::NonPositivePrice { price } => write!(f, "non-positive price {price}"),
            BarRejection::NonFinitePrice => write!(f, "non-finite price"),
            BarRejection::OutOfOrder { last, got } => {
                write!(f, "timestamp {got} is earlier than last accepted {last}")
            }
            BarRejection::UnknownInstrument => write!(f, "instrument is not configured"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tightest_stop_picks_nearest_level() {
        let stops = StopLevels {
            stop_loss: Some(92.0),
            trailing_stop: Some(95.0),
        };
        assert_eq!(stops.tightest(PositionSide::Long), Some(95.0));
        assert_eq!(stops.tightest(PositionSide::Short), Some(92.0));
        assert_eq!(stops.tightest(PositionSide::Flat), None);
    }

    #[test]
    fn tightest_stop_without_trailing() {
        let stops = StopLevels {
            stop_loss: Some(108.0),
            trailing_stop: None,
        };
        assert_eq!(stops.tightest(PositionSide::Short), Some(108.0));
        assert!(StopLevels::default().is_empty());
    }

    #[test]
    fn intent_kind_classification() {
        assert!(IntentKind::Buy.is_buy());
        assert!(IntentKind::BuyToCover.is_buy());
        assert!(!IntentKind::SellShort.is_buy());
    }

    #[test]
    fn bar_deserializes_without_volume() {
        let json = r#"{"instrument":"BTCUSDT","timestamp":"2022-01-01T00:00:00Z","open":1.0,"high":2.0,"low":0.5,"close":1.5}"#;
        let bar: Bar = serde_json::from_str(json).unwrap();
        assert_eq!(bar.close, 1.5);
        assert_eq!(bar.volume, 0.0);
    }
}
