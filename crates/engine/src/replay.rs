use tracing::{info, warn};

use common::{AccountProvider, Bar, Fill, OrderIntent, PositionSide, Result};
use paper::{ClosedTrade, PaperAccount};
use strategy::CrossoverEngine;

use crate::feed::merge_chronological;

/// Outcome of a replay.
#[derive(Debug, Clone, Default)]
pub struct ReplayReport {
    pub bars_processed: usize,
    pub bars_rejected: usize,
    pub intents: Vec<OrderIntent>,
    pub fills: Vec<Fill>,
    pub failed_fills: usize,
    pub trades: Vec<ClosedTrade>,
    pub initial_cash: f64,
    pub final_cash: f64,
    pub final_equity: f64,
}

impl ReplayReport {
    pub fn realized_pnl(&self) -> f64 {
        self.trades.iter().map(|t| t.pnl).sum()
    }
}

/// Drives the crossover engine over a bar stream and executes its intents on
/// a paper account.
///
/// For each bar: stop breach check on the open position, mark to the close,
/// engine step, fills at the close.
pub struct Replay {
    strategy: CrossoverEngine,
    account: PaperAccount,
    intents: Vec<OrderIntent>,
    fills: Vec<Fill>,
    bars_processed: usize,
    bars_rejected: usize,
    failed_fills: usize,
}

impl Replay {
    pub fn new(strategy: CrossoverEngine, account: PaperAccount) -> Self {
        Self {
            strategy,
            account,
            intents: Vec::new(),
            fills: Vec::new(),
            bars_processed: 0,
            bars_rejected: 0,
            failed_fills: 0,
        }
    }

    pub fn account(&self) -> &PaperAccount {
        &self.account
    }

    /// Process one bar. Returns every intent it caused, stop exits first.
    ///
    /// A rejected bar is counted and returned as `Error::InvalidBar`; nothing
    /// else is touched.
    pub fn process(&mut self, bar: &Bar) -> Result<Vec<OrderIntent>> {
        if let Err(e) = self.strategy.check_bar(bar) {
            self.bars_rejected += 1;
            return Err(e);
        }

        let mut emitted = Vec::new();
        if let Some(fill_price) = self.stop_breach(bar) {
            if let Some(intent) =
                self.strategy
                    .close_on_stop(&bar.instrument, fill_price, bar.timestamp)?
            {
                self.execute(&intent);
                emitted.push(intent);
            }
        }

        self.account.mark(&bar.instrument, bar.close);
        let intents = match self.strategy.on_bar(bar, &self.account) {
            Ok(intents) => intents,
            Err(e) => {
                self.bars_rejected += 1;
                return Err(e);
            }
        };
        self.bars_processed += 1;

        for intent in &intents {
            self.execute(intent);
        }
        emitted.extend(intents);
        self.intents.extend(emitted.iter().cloned());
        Ok(emitted)
    }

    /// Merge the bars chronologically, process all of them and report.
    pub fn run(mut self, bars: Vec<Bar>) -> ReplayReport {
        let bars = merge_chronological(bars);
        info!(bars = bars.len(), "Replay starting");
        for bar in &bars {
            // Rejections are already logged by the engine.
            let _ = self.process(bar);
        }
        let report = self.into_report();
        info!(
            processed = report.bars_processed,
            rejected = report.bars_rejected,
            intents = report.intents.len(),
            trades = report.trades.len(),
            equity = report.final_equity,
            "Replay finished"
        );
        report
    }

    pub fn into_report(self) -> ReplayReport {
        ReplayReport {
            bars_processed: self.bars_processed,
            bars_rejected: self.bars_rejected,
            intents: self.intents,
            fills: self.fills,
            failed_fills: self.failed_fills,
            trades: self.account.trades().to_vec(),
            initial_cash: self.account.initial_cash(),
            final_cash: self.account.available_cash(),
            final_equity: self.account.current_equity(),
        }
    }

    /// Fill price of a stop hit by this bar, if any. A bar that opens
    /// through the stop fills at its open.
    fn stop_breach(&self, bar: &Bar) -> Option<f64> {
        let side = self.strategy.position(&bar.instrument)?.side();
        let level = self
            .strategy
            .stop_levels(&bar.instrument)?
            .tightest(side)?;
        match side {
            PositionSide::Long if bar.low <= level => Some(level.min(bar.open)),
            PositionSide::Short if bar.high >= level => Some(level.max(bar.open)),
            _ => None,
        }
    }

    fn execute(&mut self, intent: &OrderIntent) {
        match self.account.apply(intent, intent.price) {
            Ok(fill) => self.fills.push(fill),
            Err(e) => {
                self.failed_fills += 1;
                warn!(instrument = %intent.instrument, kind = %intent.kind, error = %e, "Fill failed");
            }
        }
    }
}
