/// Account state queried by the engine at each bar.
///
/// `PaperAccount` implements this for replays. A live broker adapter would
/// implement it on top of its balance endpoint; the engine never talks to a
/// broker directly.
pub trait AccountProvider {
    /// Cash available for new positions.
    fn available_cash(&self) -> f64;

    /// Cash plus the marked value of open positions.
    fn current_equity(&self) -> f64;
}

/// Fixed account values. Used when the caller already has the numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountSnapshot {
    pub available_cash: f64,
    pub equity: f64,
}

impl AccountSnapshot {
    pub fn new(available_cash: f64, equity: f64) -> Self {
        Self {
            available_cash,
            equity,
        }
    }
}

impl AccountProvider for AccountSnapshot {
    fn available_cash(&self) -> f64 {
        self.available_cash
    }

    fn current_equity(&self) -> f64 {
        self.equity
    }
}
