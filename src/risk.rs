// =============================================================================
// Risk Manager — five guard conditions protecting capital
// =============================================================================
//
// Guards, evaluated in a fixed order on every trading tick:
//   1. Drawdown     — decline from the portfolio peak beyond the limit trips
//                     the *sticky* halt flag; only an explicit reset clears it.
//   2. Cooldown     — minimum block spacing since the last executed trade.
//   3. Rate limit   — executed trades within the trailing one-hour window.
//   4. Gas ceiling  — current network gas price above the configured cap.
//   5. Gas reserve  — native balance too low to pay future transaction fees.
//
// Every guard is evaluated independently — no short-circuiting — so the
// report always shows the operator the full picture. A risk violation is a
// normal decision-suppressing outcome, not an error.
// =============================================================================

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::portfolio::{PortfolioState, TradeHistory};
use crate::runtime_config::RuntimeConfig;

/// Outcome of one risk evaluation. Trading may proceed only when `ok` is
/// true, i.e. the issue list is empty and the sticky halt is clear.
#[derive(Debug, Clone, Serialize)]
pub struct RiskReport {
    pub ok: bool,
    /// Human-readable violations, in guard order.
    pub issues: Vec<String>,
}

/// Inputs sampled once per tick that the guards need.
#[derive(Debug, Clone, Copy)]
pub struct RiskInputs {
    pub block_height: u64,
    pub gas_price_gwei: f64,
    pub now: DateTime<Utc>,
}

pub struct RiskManager;

impl RiskManager {
    /// Evaluate all guards against the current portfolio and history.
    ///
    /// Mutates the portfolio: advances the peak, recomputes the drawdown,
    /// and sets the sticky halt flag on a breach.
    pub fn check(
        portfolio: &mut PortfolioState,
        history: &TradeHistory,
        config: &RuntimeConfig,
        inputs: RiskInputs,
    ) -> RiskReport {
        let mut issues = Vec::new();

        // 1. Drawdown.
        let drawdown = portfolio.update_peak();
        if drawdown > config.max_drawdown_pct {
            if !portfolio.halted {
                warn!(
                    drawdown_pct = drawdown * 100.0,
                    limit_pct = config.max_drawdown_pct * 100.0,
                    "drawdown limit breached — engine halting"
                );
            }
            portfolio.halted = true;
            issues.push(format!(
                "Drawdown {:.2}% exceeds limit {:.2}%",
                drawdown * 100.0,
                config.max_drawdown_pct * 100.0
            ));
        } else if portfolio.halted {
            // Improved value does not clear the halt; report it every tick.
            issues.push(format!(
                "Halted: drawdown previously breached (currently {:.2}%) — reset required",
                drawdown * 100.0
            ));
        }

        // 2. Cooldown.
        if let Some(last) = history.last_trade_height() {
            let elapsed = inputs.block_height.saturating_sub(last);
            if elapsed < config.cooldown_blocks {
                issues.push(format!(
                    "Cooldown: {} of {} blocks elapsed since last trade",
                    elapsed, config.cooldown_blocks
                ));
            }
        }

        // 3. Rate limit.
        let recent = history.trades_in_last_hour(inputs.now);
        if recent >= config.max_trades_per_hour as usize {
            issues.push(format!(
                "Rate limit: {} trades in the last hour (limit {})",
                recent, config.max_trades_per_hour
            ));
        }

        // 4. Gas ceiling.
        if inputs.gas_price_gwei > config.max_gas_price_gwei {
            issues.push(format!(
                "Gas price {:.1} gwei above ceiling {:.1} gwei",
                inputs.gas_price_gwei, config.max_gas_price_gwei
            ));
        }

        // 5. Gas reserve.
        let native_balance = portfolio.balance(&config.native_asset);
        if native_balance < config.gas_reserve_native {
            issues.push(format!(
                "Native balance {:.4} {} below gas reserve {:.4}",
                native_balance, config.native_asset, config.gas_reserve_native
            ));
        }

        RiskReport {
            ok: issues.is_empty() && !portfolio.halted,
            issues,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{TradeKind, TradeRecord};
    use chrono::Duration;

    fn portfolio(usdc: f64, pol: f64) -> PortfolioState {
        let mut p = PortfolioState::default();
        p.balances.insert("USDC".into(), usdc);
        p.balances.insert("POL".into(), pol);
        p.prices_usd.insert("USDC".into(), 1.0);
        p.prices_usd.insert("POL".into(), 0.5);
        p
    }

    fn inputs(height: u64, gas: f64) -> RiskInputs {
        RiskInputs {
            block_height: height,
            gas_price_gwei: gas,
            now: Utc::now(),
        }
    }

    fn record_at(height: u64, minutes_ago: i64) -> TradeRecord {
        TradeRecord {
            id: format!("t{height}"),
            time: Utc::now() - Duration::minutes(minutes_ago),
            kind: TradeKind::Swap,
            from_asset: "USDC".into(),
            to_asset: "WETH".into(),
            amount_in: 100.0,
            amount_out_estimate: 0.05,
            tx_ref: "0xabc".into(),
            block_height: height,
        }
    }

    #[test]
    fn clean_portfolio_passes() {
        let mut p = portfolio(1000.0, 10.0);
        let report = RiskManager::check(
            &mut p,
            &TradeHistory::new(),
            &RuntimeConfig::default(),
            inputs(100, 30.0),
        );
        assert!(report.ok, "issues: {:?}", report.issues);
        assert!(report.issues.is_empty());
    }

    #[test]
    fn drawdown_breach_sets_sticky_halt() {
        let cfg = RuntimeConfig::default(); // 15% limit
        let mut p = portfolio(1000.0, 10.0);
        RiskManager::check(&mut p, &TradeHistory::new(), &cfg, inputs(100, 30.0));

        // Lose 20%.
        p.balances.insert("USDC".into(), 799.0);
        let report = RiskManager::check(&mut p, &TradeHistory::new(), &cfg, inputs(101, 30.0));
        assert!(!report.ok);
        assert!(p.halted);

        // Full recovery: halt stays until reset.
        p.balances.insert("USDC".into(), 1500.0);
        let report = RiskManager::check(&mut p, &TradeHistory::new(), &cfg, inputs(102, 30.0));
        assert!(!report.ok, "halt must remain sticky");
        assert!(report.issues.iter().any(|i| i.contains("reset required")));

        p.reset_halt();
        let report = RiskManager::check(&mut p, &TradeHistory::new(), &cfg, inputs(103, 30.0));
        assert!(report.ok);
    }

    #[test]
    fn cooldown_window_is_exact() {
        let cfg = RuntimeConfig::default(); // cooldown_blocks = 5
        let mut history = TradeHistory::new();
        history.push(record_at(100, 1));

        for height in 101..105 {
            let mut p = portfolio(1000.0, 10.0);
            let report = RiskManager::check(&mut p, &history, &cfg, inputs(height, 30.0));
            assert!(
                report.issues.iter().any(|i| i.contains("Cooldown")),
                "height {height} should still be cooling down"
            );
        }

        let mut p = portfolio(1000.0, 10.0);
        let report = RiskManager::check(&mut p, &history, &cfg, inputs(105, 30.0));
        assert!(
            !report.issues.iter().any(|i| i.contains("Cooldown")),
            "cooldown should be over at height 105"
        );
    }

    #[test]
    fn rate_limit_counts_trailing_hour() {
        let mut cfg = RuntimeConfig::default();
        cfg.cooldown_blocks = 0;
        cfg.max_trades_per_hour = 2;
        let mut history = TradeHistory::new();
        history.push(record_at(10, 90)); // outside window
        history.push(record_at(20, 40));
        history.push(record_at(30, 10));

        let mut p = portfolio(1000.0, 10.0);
        let report = RiskManager::check(&mut p, &history, &cfg, inputs(1000, 30.0));
        assert!(report.issues.iter().any(|i| i.contains("Rate limit")));
    }

    #[test]
    fn gas_guards_fire_independently() {
        let cfg = RuntimeConfig::default();
        // High gas AND empty native balance: both issues reported.
        let mut p = portfolio(1000.0, 0.1);
        let report = RiskManager::check(&mut p, &TradeHistory::new(), &cfg, inputs(100, 500.0));
        assert!(!report.ok);
        assert_eq!(
            report
                .issues
                .iter()
                .filter(|i| i.contains("Gas price") || i.contains("gas reserve"))
                .count(),
            2,
            "both gas guards must report: {:?}",
            report.issues
        );
    }
}
