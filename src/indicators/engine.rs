// =============================================================================
// Indicator Engine — per-asset rolling statistics
// =============================================================================
//
// Maintains a bounded price history plus the streaming accumulators (EMAs,
// MACD signal line, Wilder RSI) for each tracked asset, and produces a full
// `IndicatorState` snapshot from every appended sample.
//
// The accumulators carry cross-tick state: their values depend on the entire
// input history, not just the rolling window, so the engine must be fed
// exactly one sample per asset per tick, in time order. Only a process
// restart resets them.
// =============================================================================

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::indicators::bollinger::calculate_bollinger;
use crate::indicators::ema::Ema;
use crate::indicators::rsi::{WilderRsi, RSI_NEUTRAL};
use crate::types::PriceSample;

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

pub const SMA_FAST_PERIOD: usize = 10;
pub const SMA_SLOW_PERIOD: usize = 30;
pub const EMA_FAST_PERIOD: usize = 12;
pub const EMA_SLOW_PERIOD: usize = 26;
pub const MACD_SIGNAL_PERIOD: usize = 9;
pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STD_DEV: f64 = 2.0;

/// Maximum retained price samples per asset (FIFO eviction).
pub const PRICE_HISTORY_CAPACITY: usize = 500;

// ---------------------------------------------------------------------------
// Indicator state
// ---------------------------------------------------------------------------

/// Full indicator snapshot for one asset after the latest sample.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IndicatorState {
    pub sma_fast: f64,
    pub sma_slow: f64,
    pub ema_12: f64,
    pub ema_26: f64,
    pub macd: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    /// Always in [0, 100].
    pub rsi: f64,
    pub bb_upper: f64,
    pub bb_middle: f64,
    pub bb_lower: f64,
    /// Always in [0, 1].
    pub bb_percent_b: f64,
}

/// Arithmetic mean of the trailing `period` prices, or `None` until enough
/// samples exist.
fn sma(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }
    Some(prices[prices.len() - period..].iter().sum::<f64>() / period as f64)
}

// ---------------------------------------------------------------------------
// Per-asset accumulators
// ---------------------------------------------------------------------------

/// Rolling statistics for a single asset.
#[derive(Debug, Clone)]
pub struct AssetIndicators {
    history: VecDeque<PriceSample>,
    ema_fast: Ema,
    ema_slow: Ema,
    macd_signal: Ema,
    rsi: WilderRsi,
    last_state: Option<IndicatorState>,
}

impl AssetIndicators {
    fn new() -> Self {
        Self {
            history: VecDeque::with_capacity(PRICE_HISTORY_CAPACITY),
            ema_fast: Ema::new(EMA_FAST_PERIOD),
            ema_slow: Ema::new(EMA_SLOW_PERIOD),
            macd_signal: Ema::new(MACD_SIGNAL_PERIOD),
            rsi: WilderRsi::new(RSI_PERIOD),
            last_state: Some(Default::default()),
        }
    }

    /// Append one sample and recompute all indicators.
    ///
    /// SMAs fall back to the current price until their windows are warm, so
    /// the crossover reads neutral rather than garbage during warm-up.
    fn update(&mut self, sample: PriceSample) -> IndicatorState {
        self.history.push_back(sample);
        while self.history.len() > PRICE_HISTORY_CAPACITY {
            self.history.pop_front();
        }

        let price = sample.price;
        let prices: Vec<f64> = self.history.iter().map(|s| s.price).collect();

        let sma_fast = sma(&prices, SMA_FAST_PERIOD).unwrap_or(price);
        let sma_slow = sma(&prices, SMA_SLOW_PERIOD).unwrap_or(price);

        let ema_12 = self.ema_fast.update(price);
        let ema_26 = self.ema_slow.update(price);
        let macd = ema_12 - ema_26;
        let macd_signal = self.macd_signal.update(macd);
        let macd_hist = macd - macd_signal;

        let rsi = self.rsi.update(price);

        let bb = calculate_bollinger(&prices, BOLLINGER_PERIOD, BOLLINGER_STD_DEV, price);

        let state = IndicatorState {
            sma_fast,
            sma_slow,
            ema_12,
            ema_26,
            macd,
            macd_signal,
            macd_hist,
            rsi,
            bb_upper: bb.upper,
            bb_middle: bb.middle,
            bb_lower: bb.lower,
            bb_percent_b: bb.percent_b,
        };
        self.last_state = Some(state);
        state
    }
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self {
            sma_fast: 0.0,
            sma_slow: 0.0,
            ema_12: 0.0,
            ema_26: 0.0,
            macd: 0.0,
            macd_signal: 0.0,
            macd_hist: 0.0,
            rsi: RSI_NEUTRAL,
            bb_upper: 0.0,
            bb_middle: 0.0,
            bb_lower: 0.0,
            bb_percent_b: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Indicator engine for all tracked assets.
#[derive(Debug, Default)]
pub struct IndicatorEngine {
    assets: HashMap<String, AssetIndicators>,
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample for `asset` and return the resulting indicator state.
    /// Samples must arrive in ascending time order, one per tick.
    pub fn update(&mut self, asset: &str, sample: PriceSample) -> IndicatorState {
        self.assets
            .entry(asset.to_string())
            .or_insert_with(AssetIndicators::new)
            .update(sample)
    }

    /// Latest indicator state for `asset`, if any sample has been seen.
    pub fn state(&self, asset: &str) -> Option<IndicatorState> {
        self.assets.get(asset).and_then(|a| a.last_state)
    }

    /// Number of samples retained for `asset`.
    pub fn sample_count(&self, asset: &str) -> usize {
        self.assets.get(asset).map(|a| a.history.len()).unwrap_or(0)
    }

    /// Latest price for `asset`, if any.
    pub fn last_price(&self, asset: &str) -> Option<f64> {
        self.assets
            .get(asset)
            .and_then(|a| a.history.back())
            .map(|s| s.price)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: i64, price: f64) -> PriceSample {
        PriceSample {
            timestamp_ms: i * 1000,
            price,
        }
    }

    fn feed(engine: &mut IndicatorEngine, asset: &str, prices: &[f64]) -> IndicatorState {
        let mut last = IndicatorState::default();
        for (i, &p) in prices.iter().enumerate() {
            last = engine.update(asset, sample(i as i64, p));
        }
        last
    }

    #[test]
    fn sma_falls_back_to_price_until_warm() {
        let mut engine = IndicatorEngine::new();
        let state = feed(&mut engine, "WETH", &[100.0, 101.0, 102.0]);
        assert!((state.sma_fast - 102.0).abs() < 1e-12);
        assert!((state.sma_slow - 102.0).abs() < 1e-12);
    }

    #[test]
    fn sma_windows_after_warm_up() {
        let mut engine = IndicatorEngine::new();
        let prices: Vec<f64> = (1..=30).map(|x| x as f64).collect();
        let state = feed(&mut engine, "WETH", &prices);
        // Fast = mean of 21..=30, slow = mean of 1..=30.
        assert!((state.sma_fast - 25.5).abs() < 1e-12);
        assert!((state.sma_slow - 15.5).abs() < 1e-12);
    }

    #[test]
    fn macd_components_are_consistent() {
        let mut engine = IndicatorEngine::new();
        let prices: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64) * 0.5).collect();
        let state = feed(&mut engine, "WETH", &prices);
        assert!((state.macd - (state.ema_12 - state.ema_26)).abs() < 1e-9);
        assert!((state.macd_hist - (state.macd - state.macd_signal)).abs() < 1e-9);
        // Rising series: fast EMA above slow EMA.
        assert!(state.macd > 0.0);
    }

    #[test]
    fn ranges_hold_for_arbitrary_input() {
        let mut engine = IndicatorEngine::new();
        let prices: Vec<f64> = (0..200)
            .map(|i| 100.0 + ((i * 31) % 17) as f64 - 8.0)
            .collect();
        for (i, &p) in prices.iter().enumerate() {
            let state = engine.update("WBTC", sample(i as i64, p));
            assert!((0.0..=100.0).contains(&state.rsi));
            assert!((0.0..=1.0).contains(&state.bb_percent_b));
            assert!(state.bb_upper >= state.bb_lower);
        }
    }

    #[test]
    fn history_is_bounded_fifo() {
        let mut engine = IndicatorEngine::new();
        for i in 0..(PRICE_HISTORY_CAPACITY + 50) {
            engine.update("WETH", sample(i as i64, 100.0 + i as f64));
        }
        assert_eq!(engine.sample_count("WETH"), PRICE_HISTORY_CAPACITY);
        // Oldest samples were evicted: the last price is the newest.
        let last = engine.last_price("WETH").unwrap();
        assert!((last - (100.0 + (PRICE_HISTORY_CAPACITY + 49) as f64)).abs() < 1e-12);
    }

    #[test]
    fn replay_from_fresh_state_is_identical() {
        let prices: Vec<f64> = (0..120).map(|i| 100.0 + ((i * 13) % 29) as f64).collect();
        let mut a = IndicatorEngine::new();
        let mut b = IndicatorEngine::new();
        let sa = feed(&mut a, "WETH", &prices);
        let sb = feed(&mut b, "WETH", &prices);
        assert_eq!(sa.ema_12, sb.ema_12);
        assert_eq!(sa.macd_signal, sb.macd_signal);
        assert_eq!(sa.rsi, sb.rsi);
        assert_eq!(sa.bb_percent_b, sb.bb_percent_b);
    }

    #[test]
    fn assets_are_independent() {
        let mut engine = IndicatorEngine::new();
        feed(&mut engine, "WETH", &[100.0, 101.0]);
        assert_eq!(engine.sample_count("WBTC"), 0);
        assert!(engine.state("WBTC").is_none());
        assert!(engine.state("WETH").is_some());
    }
}
