// =============================================================================
// Portfolio State & Trade History
// =============================================================================
//
// The portfolio tracks balances and USD prices for all assets, the historical
// peak value, and the drawdown from that peak. The peak is monotonically
// non-decreasing except on an explicit operator reset; the halt flag is
// sticky until the same reset.
//
// The trade history is a bounded FIFO ring of confirmed executions. Cooldown
// is derived from the block height of the most recent record; the rate limit
// counts records inside the trailing one-hour window. Failed executions never
// reach the history, so they advance neither counter.
// =============================================================================

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::types::TradeRecord;

/// Maximum retained trade records (FIFO eviction).
pub const TRADE_HISTORY_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// Portfolio
// ---------------------------------------------------------------------------

/// Balances, valuations, and drawdown tracking for the whole account.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PortfolioState {
    /// Asset -> quantity held.
    pub balances: HashMap<String, f64>,
    /// Asset -> USD price (the base asset is pinned at 1.0).
    pub prices_usd: HashMap<String, f64>,
    /// Highest total value ever observed; only an explicit reset lowers it.
    pub peak_value_usd: f64,
    /// Decline from the peak as a fraction in [0, 1].
    pub drawdown_pct: f64,
    /// Sticky drawdown halt. Survives recovery of the portfolio value;
    /// cleared only by an explicit reset.
    pub halted: bool,
}

impl PortfolioState {
    /// Seed a portfolio with starting balances. Prices arrive on the first
    /// tick, so the initial valuation (and peak) is established then.
    pub fn new(balances: HashMap<String, f64>) -> Self {
        Self {
            balances,
            ..Self::default()
        }
    }

    /// Quantity of `asset` currently held (0.0 when unknown).
    pub fn balance(&self, asset: &str) -> f64 {
        self.balances.get(asset).copied().unwrap_or(0.0)
    }

    /// USD price of `asset` (0.0 when unknown).
    pub fn price_usd(&self, asset: &str) -> f64 {
        self.prices_usd.get(asset).copied().unwrap_or(0.0)
    }

    /// USD value of the holding in `asset`.
    pub fn value_usd(&self, asset: &str) -> f64 {
        self.balance(asset) * self.price_usd(asset)
    }

    /// Total USD value across all priced holdings.
    pub fn total_value_usd(&self) -> f64 {
        self.balances
            .iter()
            .map(|(asset, qty)| qty * self.price_usd(asset))
            .sum()
    }

    /// Advance the peak if the current value exceeds it, then recompute the
    /// drawdown. Returns the updated drawdown fraction.
    pub fn update_peak(&mut self) -> f64 {
        let current = self.total_value_usd();
        if current > self.peak_value_usd {
            self.peak_value_usd = current;
        }
        self.drawdown_pct = if self.peak_value_usd > 0.0 {
            (self.peak_value_usd - current) / self.peak_value_usd
        } else {
            0.0
        };
        self.drawdown_pct
    }

    /// Re-anchor the peak to the current value and clear the sticky halt.
    /// This is the explicit operator reset; nothing else clears the halt.
    pub fn reset_halt(&mut self) {
        self.peak_value_usd = self.total_value_usd();
        self.drawdown_pct = 0.0;
        self.halted = false;
    }
}

// ---------------------------------------------------------------------------
// Trade history
// ---------------------------------------------------------------------------

/// Bounded FIFO ring of confirmed trade executions.
#[derive(Debug, Clone, Default)]
pub struct TradeHistory {
    records: VecDeque<TradeRecord>,
}

impl TradeHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a confirmed execution, evicting the oldest beyond capacity.
    pub fn push(&mut self, record: TradeRecord) {
        self.records.push_back(record);
        while self.records.len() > TRADE_HISTORY_CAPACITY {
            self.records.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Block height of the most recent execution, if any.
    pub fn last_trade_height(&self) -> Option<u64> {
        self.records.back().map(|r| r.block_height)
    }

    /// Number of executions inside the trailing hour ending at `now`.
    pub fn trades_in_last_hour(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(1);
        self.records.iter().filter(|r| r.time > cutoff).count()
    }

    /// Most recent records, newest last.
    pub fn recent(&self, count: usize) -> Vec<TradeRecord> {
        let start = self.records.len().saturating_sub(count);
        self.records.iter().skip(start).cloned().collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TradeKind;

    fn record(height: u64, minutes_ago: i64) -> TradeRecord {
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

    fn portfolio(usdc: f64, weth: f64, weth_price: f64) -> PortfolioState {
        let mut p = PortfolioState::default();
        p.balances.insert("USDC".into(), usdc);
        p.balances.insert("WETH".into(), weth);
        p.prices_usd.insert("USDC".into(), 1.0);
        p.prices_usd.insert("WETH".into(), weth_price);
        p
    }

    #[test]
    fn total_value_sums_priced_holdings() {
        let p = portfolio(1000.0, 0.5, 2000.0);
        assert!((p.total_value_usd() - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn peak_is_monotone_and_drawdown_tracks() {
        let mut p = portfolio(1000.0, 0.0, 0.0);
        p.update_peak();
        assert!((p.peak_value_usd - 1000.0).abs() < 1e-9);

        p.balances.insert("USDC".into(), 800.0);
        let dd = p.update_peak();
        assert!((dd - 0.2).abs() < 1e-9);
        // Peak unchanged by the decline.
        assert!((p.peak_value_usd - 1000.0).abs() < 1e-9);

        p.balances.insert("USDC".into(), 1200.0);
        let dd = p.update_peak();
        assert!(dd.abs() < 1e-9);
        assert!((p.peak_value_usd - 1200.0).abs() < 1e-9);
    }

    #[test]
    fn halt_survives_value_recovery() {
        let mut p = portfolio(1000.0, 0.0, 0.0);
        p.update_peak();
        p.halted = true;
        p.balances.insert("USDC".into(), 2000.0);
        p.update_peak();
        assert!(p.halted, "halt must not clear on recovery");
        p.reset_halt();
        assert!(!p.halted);
        assert!((p.peak_value_usd - 2000.0).abs() < 1e-9);
    }

    #[test]
    fn history_is_bounded() {
        let mut h = TradeHistory::new();
        for i in 0..(TRADE_HISTORY_CAPACITY + 10) {
            h.push(record(i as u64, 0));
        }
        assert_eq!(h.len(), TRADE_HISTORY_CAPACITY);
        // Newest survives, oldest evicted.
        assert_eq!(
            h.last_trade_height(),
            Some((TRADE_HISTORY_CAPACITY + 9) as u64)
        );
    }

    #[test]
    fn hourly_window_counts_only_recent() {
        let mut h = TradeHistory::new();
        h.push(record(1, 90)); // outside the window
        h.push(record(2, 30));
        h.push(record(3, 5));
        assert_eq!(h.trades_in_last_hour(Utc::now()), 2);
    }
}
