// =============================================================================
// Composite Signal — fixed-weight blend of five sub-signals
// =============================================================================
//
// Maps an indicator snapshot plus the latest price into a single directional
// conviction score in [-1, 1] (positive = bullish), with the per-component
// breakdown retained for the dashboard and the decision audit.
//
// Sub-signals, each independently clamped to [-1, 1]:
//   sma_cross — relative fast/slow SMA gap, a 5 % gap saturates
//   rsi       — oversold below 30 buys, overbought above 70 sells
//   macd      — histogram normalised by the Bollinger middle band
//   bollinger — %B distance from the middle band
//   trend     — relative deviation of price from the slow SMA
//
// The blend is a fixed-weight linear combination (weights sum to 1). Given
// identical indicator state and price, the output is exactly reproducible.
// =============================================================================

use serde::Serialize;

use crate::indicators::{IndicatorState, SMA_SLOW_PERIOD};

// ---------------------------------------------------------------------------
// Scale factors and weights
// ---------------------------------------------------------------------------

/// A 5 % relative SMA gap saturates the crossover signal.
const SMA_CROSS_SCALE: f64 = 20.0;
/// A MACD histogram worth 2 % of price saturates the momentum signal.
const MACD_SCALE: f64 = 50.0;
/// A 10 % deviation from the slow SMA saturates the trend signal.
const TREND_SCALE: f64 = 10.0;

const WEIGHT_SMA: f64 = 0.25;
const WEIGHT_RSI: f64 = 0.20;
const WEIGHT_MACD: f64 = 0.20;
const WEIGHT_BOLLINGER: f64 = 0.20;
const WEIGHT_TREND: f64 = 0.15;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Per-component breakdown of the composite signal.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SignalComponents {
    pub sma_cross: f64,
    pub rsi: f64,
    pub macd: f64,
    pub bollinger: f64,
    pub trend: f64,
}

/// Directional conviction for one asset on one tick.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Signal {
    /// Composite score in [-1, 1]; positive = bullish.
    pub composite: f64,
    pub components: SignalComponents,
}

impl Signal {
    /// Neutral signal emitted during warm-up.
    pub fn neutral() -> Self {
        Self::default()
    }
}

fn clamp(value: f64) -> f64 {
    value.clamp(-1.0, 1.0)
}

// ---------------------------------------------------------------------------
// Generator
// ---------------------------------------------------------------------------

/// Compute the composite signal for one asset.
///
/// Returns the neutral signal until `sample_count` reaches the slow SMA
/// period; warming indicators would otherwise read as strong trends.
pub fn generate(state: &IndicatorState, price: f64, sample_count: usize) -> Signal {
    if sample_count < SMA_SLOW_PERIOD {
        return Signal::neutral();
    }

    // 1. SMA crossover.
    let sma_cross = if state.sma_slow > 0.0 {
        clamp((state.sma_fast - state.sma_slow) / state.sma_slow * SMA_CROSS_SCALE)
    } else {
        0.0
    };

    // 2. RSI reversion: oversold buys, overbought sells.
    let rsi = if state.rsi < 30.0 {
        clamp((30.0 - state.rsi) / 30.0)
    } else if state.rsi > 70.0 {
        clamp(-(state.rsi - 70.0) / 30.0)
    } else {
        0.0
    };

    // 3. MACD histogram, normalised by the middle band so the signal is
    //    comparable across assets of very different price magnitude.
    let macd = if state.bb_middle > 0.0 {
        clamp(state.macd_hist / state.bb_middle * MACD_SCALE)
    } else {
        0.0
    };

    // 4. Bollinger %B: below the middle band biases buy, above biases sell.
    let bollinger = clamp(-(state.bb_percent_b - 0.5) * 2.0);

    // 5. Trend: deviation of price from the slow SMA.
    let trend = if state.sma_slow > 0.0 {
        clamp((price - state.sma_slow) / state.sma_slow * TREND_SCALE)
    } else {
        0.0
    };

    let composite = clamp(
        WEIGHT_SMA * sma_cross
            + WEIGHT_RSI * rsi
            + WEIGHT_MACD * macd
            + WEIGHT_BOLLINGER * bollinger
            + WEIGHT_TREND * trend,
    );

    Signal {
        composite,
        components: SignalComponents {
            sma_cross,
            rsi,
            macd,
            bollinger,
            trend,
        },
    }
}
