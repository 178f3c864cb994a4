use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::Config;
use engine::{load_bars, merge_chronological, Replay, Runner};
use paper::PaperAccount;
use strategy::{CrossoverEngine, StrategyConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env()?;
    let strategy_cfg = StrategyConfig::load(&cfg.strategy_config_path)
        .with_context(|| format!("loading {}", cfg.strategy_config_path))?;
    info!(
        short = strategy_cfg.short_period,
        long = strategy_cfg.long_period,
        instruments = strategy_cfg.instruments.len(),
        "Macross starting"
    );

    // ── Engine + paper account ────────────────────────────────────────────────
    let strategy = CrossoverEngine::new(strategy_cfg)?;
    let account = PaperAccount::new(
        cfg.paper_initial_cash,
        strategy.config().fee_pct,
        cfg.paper_slippage_bps,
    );
    let (runner, handle) = Runner::new(Replay::new(strategy, account));
    let runner_task = tokio::spawn(runner.run());

    // ── Feed ──────────────────────────────────────────────────────────────────
    let bars = load_bars(&cfg.bars_path).with_context(|| format!("loading {}", cfg.bars_path))?;
    for bar in merge_chronological(bars) {
        handle.send(bar).await?;
    }
    drop(handle);

    let report = runner_task.await?;
    info!(
        processed = report.bars_processed,
        rejected = report.bars_rejected,
        intents = report.intents.len(),
        failed_fills = report.failed_fills,
        trades = report.trades.len(),
        realized_pnl = report.realized_pnl(),
        final_cash = report.final_cash,
        final_equity = report.final_equity,
        "Run complete"
    );

    Ok(())
}
