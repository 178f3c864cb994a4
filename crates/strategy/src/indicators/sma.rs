use std::collections::VecDeque;

/// Simple moving average over a fixed window of closing prices.
///
/// Keeps a running sum so each observation is O(1). The sum is rebuilt from
/// the window contents every `period` evictions, which bounds the drift that
/// accumulates from repeated add/subtract.
/// Returns `None` until `period` values have been observed.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    period: usize,
    window: VecDeque<f64>,
    sum: f64,
    evictions_since_resum: usize,
}

impl MovingAverage {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "moving average period must be >= 1");
        Self {
            period,
            window: VecDeque::with_capacity(period),
            sum: 0.0,
            evictions_since_resum: 0,
        }
    }

    /// Number of prices currently held (at most `period`).
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn is_ready(&self) -> bool {
        self.window.len() == self.period
    }

    /// Append a closing price, evicting the oldest once the window is full.
    pub fn observe(&mut self, price: f64) {
        if self.window.len() == self.period {
            if let Some(evicted) = self.window.pop_front() {
                self.sum -= evicted;
                self.evictions_since_resum += 1;
            }
        }
        self.window.push_back(price);
        self.sum += price;

        if self.evictions_since_resum >= self.period {
            self.sum = self.window.iter().sum();
            self.evictions_since_resum = 0;
        }
    }

    /// Arithmetic mean of the window, or `None` while fewer than `period` prices were seen.
    pub fn value(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        Some(self.sum / self.period as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_until_window_full() {
        let mut sma = MovingAverage::new(3);
        assert!(sma.value().is_none());
        sma.observe(10.0);
        sma.observe(11.0);
        assert!(sma.value().is_none());
        assert_eq!(sma.len(), 2);
        sma.observe(12.0);
        assert_eq!(sma.value(), Some(11.0));
    }

    #[test]
    fn repeated_query_on_unready_window_is_stable() {
        let mut sma = MovingAverage::new(5);
        sma.observe(42.0);
        assert_eq!(sma.value(), None);
        assert_eq!(sma.value(), None);
        sma.observe(42.0);
        assert_eq!(sma.value(), None);
    }

    #[test]
    fn identical_prices_average_to_that_price() {
        let mut sma = MovingAverage::new(4);
        for _ in 0..4 {
            sma.observe(25.0);
        }
        assert_eq!(sma.value(), Some(25.0));
    }

    #[test]
    fn oldest_price_is_evicted_first() {
        let mut sma = MovingAverage::new(2);
        sma.observe(1.0);
        sma.observe(3.0);
        sma.observe(5.0);
        assert_eq!(sma.len(), 2);
        assert_eq!(sma.value(), Some(4.0));
    }

    #[test]
    fn period_one_tracks_last_price() {
        let mut sma = MovingAverage::new(1);
        sma.observe(7.5);
        assert_eq!(sma.value(), Some(7.5));
        sma.observe(8.5);
        assert_eq!(sma.value(), Some(8.5));
    }

    #[test]
    fn running_sum_matches_recomputed_mean_over_long_series() {
        let mut sma = MovingAverage::new(7);
        let prices: Vec<f64> = (0..5_000)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 13.1 + i as f64 * 0.001)
            .collect();
        for &p in &prices {
            sma.observe(p);
        }
        let tail = &prices[prices.len() - 7..];
        let expected = tail.iter().sum::<f64>() / 7.0;
        let got = sma.value().unwrap();
        assert!((got - expected).abs() < 1e-9, "got {got}, expected {expected}");
    }
}
