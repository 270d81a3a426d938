// =============================================================================
// Block Scheduler — per-block tick pipeline
// =============================================================================
//
// Polls the chain for new blocks and runs the pipeline once per block:
//
//   1. Sample gas price
//   2. Refresh wallet balances
//   3. Fetch USD prices (base pinned at 1.0, wrapped native mirrors native)
//      and update the portfolio peak/drawdown
//   4. Update indicators and regenerate signals per tracked asset
//   5. Run the risk guards (may trip the sticky halt)
//   6. Evaluate the decision rules
//   7. Execute at most one instruction, recording it only on success
//
// Steps 1-4 run on every new block no matter the engine mode, so indicators
// warm up and the dashboard stays current while the engine is Stopped or
// Halted. Steps 5-7 run only while Running and only once every tracked
// asset has filled its slow moving-average window.
//
// A block height is claimed the moment it is observed, so a tick that fails
// mid-pipeline is not retried until the next block arrives. Seeing the same
// height twice is a no-op.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::collaborators::{BalanceSource, FeeOracle, OrderExecutor, PriceSource};
use crate::decision::{decide, DecisionContext};
use crate::error::EngineError;
use crate::indicators::SMA_SLOW_PERIOD;
use crate::risk::{RiskInputs, RiskManager};
use crate::signals;
use crate::types::{EngineMode, PriceSample, TradeRecord};

pub struct Scheduler<G> {
    state: Arc<AppState>,
    gateway: G,
    poll_interval: Duration,
}

impl<G> Scheduler<G>
where
    G: PriceSource + BalanceSource + FeeOracle + OrderExecutor,
{
    pub fn new(state: Arc<AppState>, gateway: G, poll_interval: Duration) -> Self {
        Self {
            state,
            gateway,
            poll_interval,
        }
    }

    /// Poll loop. Runs until the process shuts down; every newly observed
    /// block produces a tick, and the engine mode only gates the trading
    /// stage inside it.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            interval.tick().await;

            let height = match self.gateway.block_height().await {
                Ok(h) => h,
                Err(e) => {
                    warn!(error = %e, "block height poll failed");
                    self.state.push_error(format!("block height poll: {e}"));
                    continue;
                }
            };

            let last = self.state.last_processed_height.load(Ordering::SeqCst);
            if height <= last {
                continue;
            }
            // Claim the height before doing any work.
            self.state
                .last_processed_height
                .store(height, Ordering::SeqCst);

            if let Err(e) = self.tick(height).await {
                warn!(height, error = %e, "tick aborted");
                self.state.push_error(format!("tick @{height}: {e}"));
            }
        }
    }

    /// One full pipeline pass for a freshly observed block.
    ///
    /// Any `SourceUnavailable` aborts the remainder of the tick; state
    /// already committed (gas price, balances) stays committed. A failed
    /// execution leaves the trade history and counters untouched.
    pub async fn tick(&self, height: u64) -> Result<(), EngineError> {
        let config = self.state.runtime_config.read().clone();
        let now = Utc::now();

        // ── 1. Gas price ─────────────────────────────────────────────────
        let gas_price_gwei = self.gateway.gas_price_gwei().await?;
        *self.state.gas_price_gwei.write() = gas_price_gwei;

        // ── 2. Balances ──────────────────────────────────────────────────
        let balances = self.gateway.balances().await?;

        // ── 3. Prices ────────────────────────────────────────────────────
        let mut tracked_prices: Vec<(String, f64)> = Vec::new();
        for asset in &config.tracked_assets {
            let price = self.gateway.price_usd(asset).await?;
            tracked_prices.push((asset.clone(), price));
        }
        let native_price = self.gateway.price_usd(&config.native_asset).await?;

        let mut prices: HashMap<String, f64> = tracked_prices.iter().cloned().collect();
        prices.insert(config.base_asset.clone(), 1.0);
        prices.insert(config.native_asset.clone(), native_price);
        // The wrapped token trades 1:1 with the native coin.
        prices.insert(config.wrapped_native.clone(), native_price);

        {
            let mut portfolio = self.state.portfolio.write();
            portfolio.balances = balances;
            portfolio.prices_usd = prices;
            portfolio.update_peak();
        }

        // ── 4. Indicators and signals ────────────────────────────────────
        let timestamp_ms = now.timestamp_millis();
        let mut warm = true;
        {
            let mut indicators = self.state.indicators.write();
            let mut signal_map = self.state.signals.write();
            for (asset, price) in &tracked_prices {
                let indicator_state = indicators.update(
                    asset,
                    PriceSample {
                        timestamp_ms,
                        price: *price,
                    },
                );
                let sample_count = indicators.sample_count(asset);
                warm &= sample_count >= SMA_SLOW_PERIOD;
                let signal = signals::generate(&indicator_state, *price, sample_count);
                debug!(
                    asset = %asset,
                    price,
                    composite = signal.composite,
                    sample_count,
                    "signal updated"
                );
                signal_map.insert(asset.clone(), signal);
            }
        }
        self.state.increment_version();

        // Trading stage: only while Running, and only once every tracked
        // asset has a full slow window behind it.
        if self.state.current_mode() != EngineMode::Running || !warm {
            return Ok(());
        }

        // ── 5. Risk guards ───────────────────────────────────────────────
        let report = {
            let mut portfolio = self.state.portfolio.write();
            let history = self.state.trade_history.read();
            RiskManager::check(
                &mut portfolio,
                &history,
                &config,
                RiskInputs {
                    block_height: height,
                    gas_price_gwei,
                    now,
                },
            )
        };
        if self.state.portfolio.read().halted {
            self.state.enter_halt();
        }

        if !report.ok {
            debug!(height, issues = ?report.issues, "risk guards blocked trading");
            return Ok(());
        }

        // ── 6. Decision rules ────────────────────────────────────────────
        let instruction = {
            let signal_map = self.state.signals.read();
            let portfolio = self.state.portfolio.read();
            let ctx = DecisionContext {
                signals: &signal_map,
                portfolio: &portfolio,
                config: &config,
            };
            decide(&ctx)
        };

        let Some(instruction) = instruction else {
            return Ok(());
        };

        // ── 7. Execution ─────────────────────────────────────────────────
        let receipt = self.gateway.execute(&instruction).await?;

        let record = TradeRecord {
            id: Uuid::new_v4().to_string(),
            time: now,
            kind: instruction.kind,
            from_asset: instruction.from_asset.clone(),
            to_asset: instruction.to_asset.clone(),
            amount_in: instruction.amount_in,
            amount_out_estimate: receipt.amount_out_estimate,
            tx_ref: receipt.tx_ref,
            block_height: height,
        };

        info!(
            rule = instruction.rule,
            kind = %record.kind,
            from = %record.from_asset,
            to = %record.to_asset,
            amount_in = record.amount_in,
            amount_in_usd = instruction.amount_in_usd,
            tx_ref = %record.tx_ref,
            height,
            "trade executed"
        );

        self.state.trade_history.write().push(record);
        self.state.increment_version();

        Ok(())
    }
}
