// =============================================================================
// Shared types used across the Meridian trading engine
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One observation of an asset's USD price at a point in time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PriceSample {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Strictly positive USD price.
    pub price: f64,
}

/// Process-level engine state.
///
/// Transitions:
///   Stopped -> Running   explicit start
///   Running -> Halted    automatic, on drawdown breach
///   Halted  -> Running   explicit reset (also re-anchors the portfolio peak)
///   Running -> Stopped   explicit stop
///
/// Only `Running` permits trade emission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineMode {
    Stopped,
    Running,
    Halted,
}

impl Default for EngineMode {
    fn default() -> Self {
        Self::Stopped
    }
}

impl std::fmt::Display for EngineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Running => write!(f, "Running"),
            Self::Halted => write!(f, "Halted"),
        }
    }
}

/// What an executed trade actually did on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeKind {
    /// Native asset wrapped into its ERC-20 form (funding pre-step).
    Wrap,
    /// Token-for-token exchange with minimum-output protection.
    Swap,
}

impl std::fmt::Display for TradeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Wrap => write!(f, "Wrap"),
            Self::Swap => write!(f, "Swap"),
        }
    }
}

/// A single trade the decision engine wants executed.
///
/// `amount_in` is denominated in `from_asset` units. The executor is
/// responsible for deriving the minimum acceptable output from the configured
/// slippage tolerance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeInstruction {
    pub kind: TradeKind,
    pub from_asset: String,
    pub to_asset: String,
    pub amount_in: f64,
    /// USD value of `amount_in` at decision time, for sizing audit.
    pub amount_in_usd: f64,
    /// Name of the decision rule that produced this instruction.
    pub rule: &'static str,
}

/// Confirmation returned by the order executor on success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReceipt {
    /// Transaction hash or simulator reference.
    pub tx_ref: String,
    /// Estimated output amount in `to_asset` units.
    pub amount_out_estimate: f64,
}

/// One confirmed, executed trade. Appended to the bounded history only after
/// the executor reports success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub time: DateTime<Utc>,
    pub kind: TradeKind,
    pub from_asset: String,
    pub to_asset: String,
    pub amount_in: f64,
    pub amount_out_estimate: f64,
    pub tx_ref: String,
    pub block_height: u64,
}
