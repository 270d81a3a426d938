// =============================================================================
// Technical Indicators Module
// =============================================================================
//
// Streaming implementations of the indicators behind the trading signal.
// Window statistics (SMA, Bollinger) recompute from the bounded price
// history; the smoothed ones (EMA, MACD signal, Wilder RSI) are stateful
// accumulators owned by the engine.

pub mod bollinger;
pub mod ema;
pub mod engine;
pub mod rsi;

pub use engine::{IndicatorEngine, IndicatorState, SMA_SLOW_PERIOD};
