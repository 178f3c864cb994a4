use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use common::{AccountProvider, Error, Fill, IntentKind, OrderIntent, PositionSide, Result};

/// A position held by the paper account.
#[derive(Debug, Clone, PartialEq)]
pub struct PaperPosition {
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_fee: f64,
    pub opened_at: DateTime<Utc>,
}

/// A round trip closed by the paper account.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosedTrade {
    pub instrument: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    /// Price PnL minus entry and exit fees.
    pub pnl: f64,
}

/// Simulated account for replays.
///
/// Fills are simulated at the given price with configurable slippage and a
/// proportional fee. No order ever leaves the process.
#[derive(Debug, Clone)]
pub struct PaperAccount {
    cash: f64,
    initial_cash: f64,
    positions: HashMap<String, PaperPosition>,
    /// Latest mark per instrument, used for equity.
    marks: HashMap<String, f64>,
    trades: Vec<ClosedTrade>,
    /// Fee as a fraction of fill notional.
    fee_pct: f64,
    /// Slippage in basis points applied to all fills.
    slippage_bps: f64,
}

impl PaperAccount {
    pub fn new(initial_cash: f64, fee_pct: f64, slippage_bps: f64) -> Self {
        info!(
            cash = initial_cash,
            fee_pct = fee_pct,
            slippage_bps = slippage_bps,
            "PaperAccount initialized"
        );
        Self {
            cash: initial_cash,
            initial_cash,
            positions: HashMap::new(),
            marks: HashMap::new(),
            trades: Vec::new(),
            fee_pct,
            slippage_bps,
        }
    }

    /// Update the latest price for an instrument.
    pub fn mark(&mut self, instrument: &str, price: f64) {
        self.marks.insert(instrument.to_string(), price);
    }

    pub fn position(&self, instrument: &str) -> Option<&PaperPosition> {
        self.positions.get(instrument)
    }

    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Sum of realized PnL over all closed trades.
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }

    /// Execute an intent at `price`.
    ///
    /// Entries require the instrument to be flat; exits require a position on
    /// the matching side.
    pub fn apply(&mut self, intent: &OrderIntent, price: f64) -> Result<Fill> {
        if !(price > 0.0 && price.is_finite()) {
            return Err(Error::Execution(format!(
                "cannot fill {} {} at price {price}",
                intent.kind, intent.instrument
            )));
        }
        if !(intent.size > 0.0) {
            return Err(Error::Execution(format!(
                "cannot fill {} {} with size {}",
                intent.kind, intent.instrument, intent.size
            )));
        }

        // Buys pay more, sells receive less
        let slip = self.slippage_bps / 10_000.0;
        let fill_price = if intent.kind.is_buy() {
            price * (1.0 + slip)
        } else {
            price * (1.0 - slip)
        };
        let notional = fill_price * intent.size;
        let fee = notional * self.fee_pct;

        match intent.kind {
            IntentKind::Buy | IntentKind::SellShort => {
                if let Some(existing) = self.positions.get(&intent.instrument) {
                    return Err(Error::Execution(format!(
                        "{} already has an open {} position",
                        intent.instrument, existing.side
                    )));
                }
                let side = if intent.kind == IntentKind::Buy {
                    self.cash -= notional + fee;
                    PositionSide::Long
                } else {
                    self.cash += notional - fee;
                    PositionSide::Short
                };
                self.positions.insert(
                    intent.instrument.clone(),
                    PaperPosition {
                        side,
                        quantity: intent.size,
                        entry_price: fill_price,
                        entry_fee: fee,
                        opened_at: intent.timestamp,
                    },
                );
            }
            IntentKind::Sell | IntentKind::BuyToCover => {
                let expected = if intent.kind == IntentKind::Sell {
                    PositionSide::Long
                } else {
                    PositionSide::Short
                };
                let position = match self.positions.get(&intent.instrument) {
                    Some(p) if p.side == expected => p.clone(),
                    _ => {
                        return Err(Error::Execution(format!(
                            "{} has no open {expected} position to close with {}",
                            intent.instrument, intent.kind
                        )))
                    }
                };
                self.positions.remove(&intent.instrument);

                let price_pnl = match expected {
                    PositionSide::Short => (position.entry_price - fill_price) * position.quantity,
                    _ => (fill_price - position.entry_price) * position.quantity,
                };
                if intent.kind == IntentKind::Sell {
                    self.cash += notional - fee;
                } else {
                    self.cash -= notional + fee;
                }

                let trade = ClosedTrade {
                    instrument: intent.instrument.clone(),
                    side: expected,
                    quantity: position.quantity,
                    entry_price: position.entry_price,
                    exit_price: fill_price,
                    opened_at: position.opened_at,
                    closed_at: intent.timestamp,
                    pnl: price_pnl - position.entry_fee - fee,
                };
                info!(
                    instrument = %trade.instrument,
                    side = %trade.side,
                    pnl = trade.pnl,
                    "Paper trade closed"
                );
                self.trades.push(trade);
            }
        }
        self.mark(&intent.instrument, price);

        debug!(
            instrument = %intent.instrument,
            kind = %intent.kind,
            reference = price,
            fill = fill_price,
            qty = intent.size,
            fee = fee,
            "Paper fill simulated"
        );

        Ok(Fill {
            instrument: intent.instrument.clone(),
            kind: intent.kind,
            fill_price,
            quantity: intent.size,
            fee,
            timestamp: intent.timestamp,
        })
    }
}

impl AccountProvider for PaperAccount {
    fn available_cash(&self) -> f64 {
        self.cash
    }

    fn current_equity(&self) -> f64 {
        let open_value: f64 = self
            .positions
            .iter()
            .map(|(instrument, p)| {
                let mark = self.marks.get(instrument).copied().unwrap_or(p.entry_price);
                match p.side {
                    PositionSide::Short => -mark * p.quantity,
                    _ => mark * p.quantity,
                }
            })
            .sum();
        self.cash + open_value
    }
}
