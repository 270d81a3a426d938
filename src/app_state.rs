// =============================================================================
// Central Application State — Meridian Chain Pilot
// =============================================================================
//
// The single source of truth for the engine. The scheduler mutates it once
// per block tick; the REST API and WebSocket feed read it through the
// snapshot builder.
//
// Thread safety:
//   - Atomic counters for lock-free version tracking.
//   - parking_lot::RwLock for all mutable shared collections.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use serde::Serialize;

use crate::indicators::{IndicatorEngine, IndicatorState};
use crate::portfolio::{PortfolioState, TradeHistory};
use crate::runtime_config::RuntimeConfig;
use crate::signals::Signal;
use crate::types::{EngineMode, TradeRecord};

// =============================================================================
// Error Record
// =============================================================================

/// A recorded error event for the dashboard error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    /// Human-readable error message.
    pub message: String,
    /// ISO 8601 timestamp.
    pub at: String,
}

// =============================================================================
// AppState
// =============================================================================

/// Maximum number of recent errors to retain.
const MAX_RECENT_ERRORS: usize = 50;

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    // ── Version tracking ────────────────────────────────────────────────
    /// Monotonically increasing version counter. Incremented on every
    /// meaningful state mutation. The WebSocket feed uses this to detect
    /// changes and push updates.
    pub state_version: AtomicU64,

    /// WebSocket message sequence number (incremented per message sent).
    pub ws_sequence_number: AtomicU64,

    // ── Configuration ───────────────────────────────────────────────────
    pub runtime_config: Arc<RwLock<RuntimeConfig>>,

    // ── Engine lifecycle ────────────────────────────────────────────────
    pub mode: RwLock<EngineMode>,

    // ── Market state ────────────────────────────────────────────────────
    pub indicators: RwLock<IndicatorEngine>,
    pub signals: RwLock<HashMap<String, Signal>>,
    pub gas_price_gwei: RwLock<f64>,

    // ── Portfolio / trades ──────────────────────────────────────────────
    pub portfolio: RwLock<PortfolioState>,
    pub trade_history: RwLock<TradeHistory>,

    // ── Tick bookkeeping ────────────────────────────────────────────────
    /// Most recent block height the scheduler has claimed. A height is
    /// claimed as soon as it is observed, so a failed tick is not retried
    /// for that same block.
    pub last_processed_height: AtomicU64,

    // ── Error Log ───────────────────────────────────────────────────────
    pub recent_errors: RwLock<Vec<ErrorRecord>>,

    // ── Timing ──────────────────────────────────────────────────────────
    /// Instant when the process started. Used for uptime calculations.
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Construct a new `AppState` from the given runtime configuration.
    ///
    /// The engine always boots in [`EngineMode::Stopped`]; an operator must
    /// explicitly start it. The returned value is typically wrapped in `Arc`
    /// immediately.
    pub fn new(config: RuntimeConfig) -> Self {
        let portfolio = PortfolioState::new(config.starting_balances.clone());

        Self {
            state_version: AtomicU64::new(1),
            ws_sequence_number: AtomicU64::new(0),

            runtime_config: Arc::new(RwLock::new(config)),
            mode: RwLock::new(EngineMode::Stopped),

            indicators: RwLock::new(IndicatorEngine::new()),
            signals: RwLock::new(HashMap::new()),
            gas_price_gwei: RwLock::new(0.0),

            portfolio: RwLock::new(portfolio),
            trade_history: RwLock::new(TradeHistory::new()),

            last_processed_height: AtomicU64::new(0),
            recent_errors: RwLock::new(Vec::new()),
            start_time: std::time::Instant::now(),
        }
    }

    // ── Version Management ──────────────────────────────────────────────

    /// Atomically increment the state version. Call this after every
    /// meaningful mutation to signal WebSocket clients that fresh data is
    /// available.
    pub fn increment_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::SeqCst)
    }

    /// Read the current state version without modifying it.
    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::SeqCst)
    }

    // ── Lifecycle Transitions ───────────────────────────────────────────

    /// Start the engine. Only valid from `Stopped`; a halted engine must be
    /// reset first.
    pub fn start(&self) -> Result<EngineMode, String> {
        let mut mode = self.mode.write();
        match *mode {
            EngineMode::Stopped => {
                *mode = EngineMode::Running;
                self.increment_version();
                Ok(*mode)
            }
            EngineMode::Running => Err("engine already running".to_string()),
            EngineMode::Halted => {
                Err("engine halted by drawdown guard; reset required".to_string())
            }
        }
    }

    /// Stop the engine. A no-op when already stopped; halted engines stay
    /// halted until reset.
    pub fn stop(&self) -> Result<EngineMode, String> {
        let mut mode = self.mode.write();
        match *mode {
            EngineMode::Running => {
                *mode = EngineMode::Stopped;
                self.increment_version();
                Ok(*mode)
            }
            EngineMode::Stopped => Ok(*mode),
            EngineMode::Halted => Err("engine halted; use reset-halt".to_string()),
        }
    }

    /// Clear a drawdown halt. Re-anchors the portfolio peak to the current
    /// value so the drawdown guard does not immediately re-trip, and resumes
    /// trading: the only way out of `Halted` is back to `Running`.
    pub fn reset_halt(&self) -> Result<EngineMode, String> {
        let mut mode = self.mode.write();
        if *mode != EngineMode::Halted {
            return Err(format!("engine is {}, not halted", *mode));
        }
        self.portfolio.write().reset_halt();
        *mode = EngineMode::Running;
        self.increment_version();
        Ok(*mode)
    }

    /// Transition into the halted state. Called by the scheduler when the
    /// drawdown guard trips.
    pub fn enter_halt(&self) {
        let mut mode = self.mode.write();
        if *mode != EngineMode::Halted {
            *mode = EngineMode::Halted;
            self.increment_version();
        }
    }

    pub fn current_mode(&self) -> EngineMode {
        *self.mode.read()
    }

    // ── Error Logging ───────────────────────────────────────────────────

    /// Record an error message. The ring buffer is capped at
    /// [`MAX_RECENT_ERRORS`]; oldest entries are evicted when the limit is
    /// reached.
    pub fn push_error(&self, msg: String) {
        let record = ErrorRecord {
            message: msg,
            at: Utc::now().to_rfc3339(),
        };

        let mut errors = self.recent_errors.write();
        errors.push(record);
        while errors.len() > MAX_RECENT_ERRORS {
            errors.remove(0);
        }

        self.increment_version();
    }

    // ── Snapshot Builder ────────────────────────────────────────────────

    /// Build a complete, serialisable snapshot of the engine state.
    ///
    /// This is the payload sent to the dashboard via the REST
    /// `GET /api/v1/state` endpoint and the WebSocket push feed.
    pub fn build_snapshot(&self) -> StateSnapshot {
        let now = Utc::now();
        let config = self.runtime_config.read();
        let version = self.current_state_version();

        // ── Portfolio ───────────────────────────────────────────────
        let portfolio_snapshot = {
            let portfolio = self.portfolio.read();
            PortfolioSnapshot {
                balances: portfolio.balances.clone(),
                prices_usd: portfolio.prices_usd.clone(),
                total_value_usd: portfolio.total_value_usd(),
                peak_value_usd: portfolio.peak_value_usd,
                drawdown_pct: portfolio.drawdown_pct,
                halted: portfolio.halted,
            }
        };

        // ── Per-asset market view ───────────────────────────────────
        let assets = {
            let indicators = self.indicators.read();
            let signals = self.signals.read();
            let mut out = HashMap::new();
            for asset in &config.tracked_assets {
                out.insert(
                    asset.clone(),
                    AssetSnapshot {
                        last_price: indicators.last_price(asset),
                        sample_count: indicators.sample_count(asset),
                        indicators: indicators.state(asset),
                        signal: signals.get(asset).copied(),
                    },
                );
            }
            out
        };

        // ── Trades / errors ─────────────────────────────────────────
        let recent_trades = self.trade_history.read().recent(20);
        let recent_errors = self.recent_errors.read().clone();

        // ── Runtime config summary ──────────────────────────────────
        let runtime_config_summary = RuntimeConfigSummary {
            tracked_assets: config.tracked_assets.clone(),
            base_asset: config.base_asset.clone(),
            sizing_cap: config.sizing_cap,
            max_position_pct: config.max_position_pct,
            min_confluence: config.min_confluence,
            max_drawdown_pct: config.max_drawdown_pct,
            cooldown_blocks: config.cooldown_blocks,
            max_trades_per_hour: config.max_trades_per_hour,
            max_gas_price_gwei: config.max_gas_price_gwei,
        };

        StateSnapshot {
            state_version: version,
            server_time: now.timestamp_millis(),
            mode: self.current_mode().to_string(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            last_processed_height: self.last_processed_height.load(Ordering::SeqCst),
            gas_price_gwei: *self.gas_price_gwei.read(),
            portfolio: portfolio_snapshot,
            assets,
            recent_trades,
            recent_errors,
            runtime_config: runtime_config_summary,
        }
    }
}

// =============================================================================
// Serialisable snapshot types
// =============================================================================

/// Full engine state snapshot sent to the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StateSnapshot {
    pub state_version: u64,
    pub server_time: i64,
    pub mode: String,
    pub uptime_seconds: u64,
    pub last_processed_height: u64,
    pub gas_price_gwei: f64,
    pub portfolio: PortfolioSnapshot,
    pub assets: HashMap<String, AssetSnapshot>,
    pub recent_trades: Vec<TradeRecord>,
    pub recent_errors: Vec<ErrorRecord>,
    pub runtime_config: RuntimeConfigSummary,
}

/// Portfolio valuation snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioSnapshot {
    pub balances: HashMap<String, f64>,
    pub prices_usd: HashMap<String, f64>,
    pub total_value_usd: f64,
    pub peak_value_usd: f64,
    pub drawdown_pct: f64,
    pub halted: bool,
}

/// Per-asset market view: latest price, indicators, and composite signal.
#[derive(Debug, Clone, Serialize)]
pub struct AssetSnapshot {
    pub last_price: Option<f64>,
    pub sample_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indicators: Option<IndicatorState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<Signal>,
}

/// Summary of runtime config for the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeConfigSummary {
    pub tracked_assets: Vec<String>,
    pub base_asset: String,
    pub sizing_cap: f64,
    pub max_position_pct: f64,
    pub min_confluence: f64,
    pub max_drawdown_pct: f64,
    pub cooldown_blocks: u64,
    pub max_trades_per_hour: u32,
    pub max_gas_price_gwei: f64,
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> AppState {
        AppState::new(RuntimeConfig::default())
    }

    #[test]
    fn boots_stopped_with_seed_balances() {
        let s = state();
        assert_eq!(s.current_mode(), EngineMode::Stopped);
        assert!((s.portfolio.read().balance("USDC") - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn lifecycle_transitions() {
        let s = state();
        assert_eq!(s.start().unwrap(), EngineMode::Running);
        assert!(s.start().is_err());
        assert_eq!(s.stop().unwrap(), EngineMode::Stopped);
        // Stopping again is a no-op.
        assert_eq!(s.stop().unwrap(), EngineMode::Stopped);
    }

    #[test]
    fn halt_requires_explicit_reset() {
        let s = state();
        s.start().unwrap();
        s.portfolio.write().halted = true;
        s.enter_halt();
        assert_eq!(s.current_mode(), EngineMode::Halted);
        assert!(s.start().is_err());
        assert!(s.stop().is_err());
        // The reset clears the halt and resumes trading directly.
        assert_eq!(s.reset_halt().unwrap(), EngineMode::Running);
        assert!(!s.portfolio.read().halted);
        assert_eq!(s.stop().unwrap(), EngineMode::Stopped);
    }

    #[test]
    fn reset_halt_rejected_when_not_halted() {
        let s = state();
        assert!(s.reset_halt().is_err());
    }

    #[test]
    fn version_bumps_on_mutation() {
        let s = state();
        let v0 = s.current_state_version();
        s.push_error("boom".to_string());
        assert!(s.current_state_version() > v0);
        assert_eq!(s.recent_errors.read().len(), 1);
    }

    #[test]
    fn error_ring_buffer_is_bounded() {
        let s = state();
        for i in 0..60 {
            s.push_error(format!("err {i}"));
        }
        let errors = s.recent_errors.read();
        assert_eq!(errors.len(), MAX_RECENT_ERRORS);
        assert_eq!(errors[0].message, "err 10");
    }

    #[test]
    fn snapshot_reflects_config_assets() {
        let s = state();
        let snap = s.build_snapshot();
        assert_eq!(snap.mode, "Stopped");
        assert_eq!(snap.assets.len(), 2);
        assert!(snap.assets.contains_key("WETH"));
        assert!(snap.assets.contains_key("WBTC"));
        assert!(snap.recent_trades.is_empty());
    }
}
