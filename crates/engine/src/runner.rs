use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use common::{Bar, Error, OrderIntent, Result};

use crate::replay::{Replay, ReplayReport};

/// Cloneable handle for feeding bars into a running [`Runner`].
#[derive(Clone)]
pub struct RunnerHandle {
    bar_tx: mpsc::Sender<Bar>,
    intent_tx: broadcast::Sender<OrderIntent>,
}

impl RunnerHandle {
    /// Queue a bar. Fails once the runner has stopped.
    pub async fn send(&self, bar: Bar) -> Result<()> {
        self.bar_tx
            .send(bar)
            .await
            .map_err(|e| Error::Execution(format!("runner stopped, dropped bar for {}", e.0.instrument)))
    }

    /// Subscribe to every intent the runner emits from now on.
    pub fn subscribe_intents(&self) -> broadcast::Receiver<OrderIntent> {
        self.intent_tx.subscribe()
    }
}

/// Serializes bars from any number of producers into one ordered stream
/// through a [`Replay`].
pub struct Runner {
    replay: Replay,
    bar_rx: mpsc::Receiver<Bar>,
    intent_tx: broadcast::Sender<OrderIntent>,
}

impl Runner {
    pub fn new(replay: Replay) -> (Self, RunnerHandle) {
        let (bar_tx, bar_rx) = mpsc::channel(256);
        let (intent_tx, _) = broadcast::channel(1024);

        let handle = RunnerHandle {
            bar_tx,
            intent_tx: intent_tx.clone(),
        };
        let runner = Runner {
            replay,
            bar_rx,
            intent_tx,
        };
        (runner, handle)
    }

    /// Process bars until every handle is dropped. Call from `tokio::spawn`.
    pub async fn run(mut self) -> ReplayReport {
        info!("Runner started, waiting for bars");

        while let Some(bar) = self.bar_rx.recv().await {
            // Rejections are logged by the engine and counted in the report.
            let Ok(intents) = self.replay.process(&bar) else {
                continue;
            };
            for intent in intents {
                // No subscribers is fine
                if self.intent_tx.send(intent).is_err() {
                    debug!("No intent subscribers");
                }
            }
        }

        info!("Bar channel closed, runner shutting down");
        self.replay.into_report()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::IntentKind;
    use paper::PaperAccount;
    use strategy::{CrossoverEngine, StrategyConfig};

    fn runner() -> (Runner, RunnerHandle) {
        let cfg = StrategyConfig {
            short_period: 3,
            long_period: 5,
            fee_pct: 0.0,
            ..StrategyConfig::with_symbols(["BTCUSDT"])
        };
        let replay = Replay::new(
            CrossoverEngine::new(cfg).unwrap(),
            PaperAccount::new(10_000.0, 0.0, 0.0),
        );
        Runner::new(replay)
    }

    fn bar(i: i64, close: f64) -> Bar {
        let ts = Utc.timestamp_opt(1_640_995_200 + i * 60, 0).unwrap();
        Bar::flat("BTCUSDT", ts, close)
    }

    #[tokio::test]
    async fn runner_broadcasts_intents_and_reports_on_close() {
        let (runner, handle) = runner();
        let mut intents = handle.subscribe_intents();
        let task = tokio::spawn(runner.run());

        for (i, close) in [10.0, 11.0, 12.0, 13.0, 14.0].into_iter().enumerate() {
            handle.send(bar(i as i64, close)).await.unwrap();
        }
        drop(handle);

        let report = task.await.unwrap();
        assert_eq!(report.bars_processed, 5);
        assert_eq!(report.intents.len(), 1);

        let received = intents.recv().await.unwrap();
        assert_eq!(received.kind, IntentKind::Buy);
        assert_eq!(received.price, 14.0);
    }

    #[tokio::test]
    async fn rejected_bars_do_not_stop_the_runner() {
        let (runner, handle) = runner();
        let task = tokio::spawn(runner.run());

        handle.send(bar(1, 10.0)).await.unwrap();
        handle.send(bar(0, 10.0)).await.unwrap(); // out of order
        handle.send(bar(2, 0.0)).await.unwrap(); // zero price
        handle.send(bar(3, 10.0)).await.unwrap();
        drop(handle);

        let report = task.await.unwrap();
        assert_eq!(report.bars_processed, 2);
        assert_eq!(report.bars_rejected, 2);
    }

    #[tokio::test]
    async fn concurrent_producers_share_one_runner() {
        let (runner, handle) = runner();
        let task = tokio::spawn(runner.run());

        let producers: Vec<_> = (0..4)
            .map(|p| {
                let handle = handle.clone();
                tokio::spawn(async move {
                    // Arrival order is arbitrary, so late timestamps may be rejected.
                    handle.send(bar(p, 10.0)).await
                })
            })
            .collect();
        drop(handle);
        for p in producers {
            p.await.unwrap().unwrap();
        }

        let report = task.await.unwrap();
        assert_eq!(report.bars_processed + report.bars_rejected, 4);
    }

    #[tokio::test]
    async fn send_after_runner_dropped_fails() {
        let (runner, handle) = runner();
        drop(runner);
        let err = handle.send(bar(0, 10.0)).await.unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
    }
}
