use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use common::{
    AccountProvider, Bar, BarRejection, Error, IntentKind, IntentReason, OrderIntent,
    PositionSide, Result, StopLevels,
};

use crate::config::{ShortExitPolicy, StrategyConfig, TrailingMode};
use crate::indicators::MovingAverage;
use crate::sizing::{position_size, SizingParams};

/// An open position and its protective levels.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    /// Per-instrument bar index the position was opened on.
    pub entry_bar_index: u64,
    pub entry_price: f64,
    pub size: f64,
    pub stop_loss: f64,
    pub trailing_stop: Option<f64>,
}

/// Position held in one instrument. Stops live inside the open variants, so a
/// flat instrument cannot carry stop levels.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PositionState {
    #[default]
    Flat,
    Long(OpenPosition),
    Short(OpenPosition),
}

impl PositionState {
    pub fn side(&self) -> PositionSide {
        match self {
            PositionState::Flat => PositionSide::Flat,
            PositionState::Long(_) => PositionSide::Long,
            PositionState::Short(_) => PositionSide::Short,
        }
    }

    pub fn open(&self) -> Option<&OpenPosition> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(p) | PositionState::Short(p) => Some(p),
        }
    }

    pub fn stop_levels(&self) -> StopLevels {
        match self.open() {
            Some(p) => StopLevels {
                stop_loss: Some(p.stop_loss),
                trailing_stop: p.trailing_stop,
            },
            None => StopLevels::default(),
        }
    }

    /// Bars elapsed since entry, or 0 when flat.
    pub fn bars_held(&self, bar_index: u64) -> u64 {
        self.open()
            .map(|p| bar_index.saturating_sub(p.entry_bar_index))
            .unwrap_or(0)
    }
}

/// Point-in-time view of one instrument, for monitoring and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct InstrumentSnapshot {
    pub instrument: String,
    pub short_ma: Option<f64>,
    pub long_ma: Option<f64>,
    pub position: PositionSide,
    pub entry_bar_index: Option<u64>,
    pub entry_price: Option<f64>,
    pub size: f64,
    pub stops: StopLevels,
    pub bars_seen: u64,
}

#[derive(Debug, Clone)]
struct InstrumentState {
    short_ma: MovingAverage,
    long_ma: MovingAverage,
    position: PositionState,
    lot_size: Option<f64>,
    bars_seen: u64,
    last_timestamp: Option<DateTime<Utc>>,
}

/// Dual moving-average crossover engine.
///
/// Owns the indicator pair and position record of every configured
/// instrument. Each accepted bar is a pure `(state, bar) -> (state', intents)`
/// step; the engine holds no locks, so a concurrent feed must be serialized
/// by the caller.
#[derive(Debug, Clone)]
pub struct CrossoverEngine {
    config: StrategyConfig,
    instruments: HashMap<String, InstrumentState>,
}

impl CrossoverEngine {
    /// Validate the config and start every instrument flat with empty windows.
    pub fn new(config: StrategyConfig) -> Result<Self> {
        config.validate()?;

        let instruments = config
            .instruments
            .iter()
            .map(|inst| {
                let state = InstrumentState {
                    short_ma: MovingAverage::new(config.short_period),
                    long_ma: MovingAverage::new(config.long_period),
                    position: PositionState::Flat,
                    lot_size: inst.lot_size,
                    bars_seen: 0,
                    last_timestamp: None,
                };
                (inst.symbol.clone(), state)
            })
            .collect();

        info!(
            short = config.short_period,
            long = config.long_period,
            instruments = config.instruments.len(),
            "Crossover engine initialized"
        );
        Ok(Self {
            config,
            instruments,
        })
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Process one bar and return the intents it produced, in execution order.
    ///
    /// A rejected bar leaves the instrument untouched and returns
    /// `Error::InvalidBar`; other instruments are unaffected.
    pub fn on_bar(&mut self, bar: &Bar, account: &dyn AccountProvider) -> Result<Vec<OrderIntent>> {
        self.check_bar(bar)?;
        let Some(state) = self.instruments.get_mut(&bar.instrument) else {
            return Err(reject(bar, BarRejection::UnknownInstrument));
        };

        let bar_index = state.bars_seen;
        state.bars_seen += 1;
        state.last_timestamp = Some(bar.timestamp);
        state.short_ma.observe(bar.close);
        state.long_ma.observe(bar.close);

        let (Some(short), Some(long)) = (state.short_ma.value(), state.long_ma.value()) else {
            debug!(instrument = %bar.instrument, bar_index, "Moving averages not ready");
            return Ok(Vec::new());
        };
        debug!(instrument = %bar.instrument, bar_index, short, long, "Moving averages updated");

        let intents = state.decide(&self.config, bar, bar_index, short, long, account);
        if self.config.trailing_mode == TrailingMode::Ratchet {
            if let Some(pct) = self.config.trailing_pct() {
                state.ratchet_trailing(bar.close, pct);
            }
        }

        for intent in &intents {
            info!(
                instrument = %intent.instrument,
                kind = %intent.kind,
                size = intent.size,
                price = intent.price,
                reason = %intent.reason,
                "Order intent emitted"
            );
        }
        Ok(intents)
    }

    /// Check a bar against the acceptance rules without touching any state.
    pub fn check_bar(&self, bar: &Bar) -> Result<()> {
        let Some(state) = self.instruments.get(&bar.instrument) else {
            return Err(reject(bar, BarRejection::UnknownInstrument));
        };
        match validate_bar(bar, state.last_timestamp) {
            Some(reason) => Err(reject(bar, reason)),
            None => Ok(()),
        }
    }

    /// Close a position whose stop was breached, as observed by the execution layer.
    /// Returns `None` when the instrument is already flat.
    pub fn close_on_stop(
        &mut self,
        instrument: &str,
        trigger_price: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<Option<OrderIntent>> {
        let state = self.instruments.get_mut(instrument).ok_or_else(|| {
            Error::Execution(format!("stop triggered for unconfigured instrument '{instrument}'"))
        })?;

        let intent = state.close(instrument, trigger_price, timestamp, IntentReason::StopTriggered);
        if let Some(intent) = &intent {
            info!(
                instrument = %intent.instrument,
                kind = %intent.kind,
                size = intent.size,
                price = intent.price,
                "Stop triggered, position closed"
            );
        }
        Ok(intent)
    }

    /// Configured instrument symbols, sorted.
    pub fn instruments(&self) -> Vec<&str> {
        let mut symbols: Vec<&str> = self.instruments.keys().map(String::as_str).collect();
        symbols.sort_unstable();
        symbols
    }

    pub fn position(&self, instrument: &str) -> Option<&PositionState> {
        self.instruments.get(instrument).map(|s| &s.position)
    }

    pub fn stop_levels(&self, instrument: &str) -> Option<StopLevels> {
        self.instruments.get(instrument).map(|s| s.position.stop_levels())
    }

    /// Stop levels of every instrument, for external stop-trigger monitoring.
    pub fn stop_table(&self) -> BTreeMap<String, StopLevels> {
        self.instruments
            .iter()
            .map(|(symbol, s)| (symbol.clone(), s.position.stop_levels()))
            .collect()
    }

    pub fn snapshot(&self, instrument: &str) -> Option<InstrumentSnapshot> {
        let state = self.instruments.get(instrument)?;
        let open = state.position.open();
        Some(InstrumentSnapshot {
            instrument: instrument.to_string(),
            short_ma: state.short_ma.value(),
            long_ma: state.long_ma.value(),
            position: state.position.side(),
            entry_bar_index: open.map(|p| p.entry_bar_index),
            entry_price: open.map(|p| p.entry_price),
            size: open.map(|p| p.size).unwrap_or(0.0),
            stops: state.position.stop_levels(),
            bars_seen: state.bars_seen,
        })
    }
}

impl InstrumentState {
    /// Ordered decision list. First matching rule fires.
    fn decide(
        &mut self,
        cfg: &StrategyConfig,
        bar: &Bar,
        bar_index: u64,
        short: f64,
        long: f64,
        account: &dyn AccountProvider,
    ) -> Vec<OrderIntent> {
        let bullish = short > long;
        let bearish = short < long;
        let side = self.position.side();
        let held = self.position.bars_held(bar_index);
        let mut intents = Vec::new();

        if bullish && side != PositionSide::Long {
            // Close-then-flip: a short is covered before the long is opened.
            intents.extend(self.close(&bar.instrument, bar.close, bar.timestamp, IntentReason::Reversal));
            intents.extend(self.open(
                PositionSide::Long,
                cfg,
                bar,
                bar_index,
                account.current_equity(),
            ));
        } else if side == PositionSide::Long && (held >= cfg.hold_period || bearish) {
            let reason = if held >= cfg.hold_period {
                IntentReason::HoldExpired
            } else {
                IntentReason::Crossover
            };
            intents.extend(self.close(&bar.instrument, bar.close, bar.timestamp, reason));
        } else if bearish
            && side != PositionSide::Short
            && account.available_cash() > cfg.min_short_cash
        {
            intents.extend(self.open(
                PositionSide::Short,
                cfg,
                bar,
                bar_index,
                account.current_equity(),
            ));
        } else if cfg.short_exit == ShortExitPolicy::Symmetric
            && side == PositionSide::Short
            && held >= cfg.hold_period
        {
            intents.extend(self.close(
                &bar.instrument,
                bar.close,
                bar.timestamp,
                IntentReason::HoldExpired,
            ));
        }

        intents
    }

    /// Open a position on `side`. A zero size leaves the position untouched.
    fn open(
        &mut self,
        side: PositionSide,
        cfg: &StrategyConfig,
        bar: &Bar,
        bar_index: u64,
        equity: f64,
    ) -> Option<OrderIntent> {
        let price = bar.close;
        let size = position_size(SizingParams {
            equity,
            risk_pct: cfg.risk_pct,
            price,
            net_fee_pct: cfg.net_fees.then_some(cfg.fee_pct),
            lot_size: self.lot_size,
        });
        if size <= 0.0 {
            debug!(instrument = %bar.instrument, %side, equity, price, "Entry size is zero, no order");
            return None;
        }

        let trailing = cfg.trailing_pct();
        let (kind, position) = match side {
            PositionSide::Long => (
                IntentKind::Buy,
                PositionState::Long(OpenPosition {
                    entry_bar_index: bar_index,
                    entry_price: price,
                    size,
                    stop_loss: price * (1.0 - cfg.stop_loss_pct),
                    trailing_stop: trailing.map(|pct| price * (1.0 - pct)),
                }),
            ),
            PositionSide::Short => (
                IntentKind::SellShort,
                PositionState::Short(OpenPosition {
                    entry_bar_index: bar_index,
                    entry_price: price,
                    size,
                    stop_loss: price * (1.0 + cfg.stop_loss_pct),
                    trailing_stop: trailing.map(|pct| price * (1.0 + pct)),
                }),
            ),
            PositionSide::Flat => return None,
        };
        self.position = position;

        Some(OrderIntent {
            kind,
            instrument: bar.instrument.clone(),
            size,
            price,
            timestamp: bar.timestamp,
            reason: IntentReason::Crossover,
        })
    }

    /// Flatten the position for its full size. Clears both stop levels.
    fn close(
        &mut self,
        instrument: &str,
        price: f64,
        timestamp: DateTime<Utc>,
        reason: IntentReason,
    ) -> Option<OrderIntent> {
        let (kind, position) = match std::mem::take(&mut self.position) {
            PositionState::Flat => return None,
            PositionState::Long(p) => (IntentKind::Sell, p),
            PositionState::Short(p) => (IntentKind::BuyToCover, p),
        };
        Some(OrderIntent {
            kind,
            instrument: instrument.to_string(),
            size: position.size,
            price,
            timestamp,
            reason,
        })
    }

    fn ratchet_trailing(&mut self, close: f64, pct: f64) {
        match &mut self.position {
            PositionState::Long(p) => {
                let candidate = close * (1.0 - pct);
                p.trailing_stop = p.trailing_stop.map(|t| t.max(candidate));
            }
            PositionState::Short(p) => {
                let candidate = close * (1.0 + pct);
                p.trailing_stop = p.trailing_stop.map(|t| t.min(candidate));
            }
            PositionState::Flat => {}
        }
    }
}

fn validate_bar(bar: &Bar, last: Option<DateTime<Utc>>) -> Option<BarRejection> {
    for price in [bar.open, bar.high, bar.low, bar.close] {
        if !price.is_finite() {
            return Some(BarRejection::NonFinitePrice);
        }
        if price <= 0.0 {
            return Some(BarRejection::NonPositivePrice { price });
        }
    }
    match last {
        Some(last) if bar.timestamp < last => Some(BarRejection::OutOfOrder {
            last,
            got: bar.timestamp,
        }),
        _ => None,
    }
}

fn reject(bar: &Bar, reason: BarRejection) -> Error {
    warn!(instrument = %bar.instrument, timestamp = %bar.timestamp, reason = %reason, "Bar rejected");
    Error::InvalidBar {
        instrument: bar.instrument.clone(),
        reason,
    }
}
