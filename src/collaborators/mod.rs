// =============================================================================
// Collaborator contracts — the engine's only view of the outside world
// =============================================================================
//
// The scheduler is generic over these four seams. Implementations:
//   - `rpc::ChainRpcClient`  — JSON-RPC block height / gas price plus an HTTP
//                              spot-price feed (read-only chain access).
//   - `paper::PaperMarket`   — deterministic in-memory simulation of all four
//                              contracts, used in demo mode and tests.
//   - `rpc::ShadowGateway`   — live chain reads combined with the paper
//                              wallet, for shadow mode.
//
// Wallet management, ABI encoding, and transaction assembly live behind
// `OrderExecutor`; the engine only ever sees the instruction/receipt
// exchange.

#![allow(async_fn_in_trait)]

use std::collections::HashMap;

use crate::error::EngineError;
use crate::types::{ExecutionReceipt, TradeInstruction};

/// Supplies a USD price per tracked asset at each tick.
pub trait PriceSource {
    async fn price_usd(&self, asset: &str) -> Result<f64, EngineError>;
}

/// Supplies the account's balances, asset -> quantity.
pub trait BalanceSource {
    async fn balances(&self) -> Result<HashMap<String, f64>, EngineError>;
}

/// Supplies chain timing and fee information.
pub trait FeeOracle {
    async fn block_height(&self) -> Result<u64, EngineError>;
    async fn gas_price_gwei(&self) -> Result<f64, EngineError>;
}

/// Executes a trade instruction with minimum-output protection derived from
/// the configured slippage tolerance. The engine never retries a failed
/// execution within the same tick.
pub trait OrderExecutor {
    async fn execute(&self, instruction: &TradeInstruction)
        -> Result<ExecutionReceipt, EngineError>;
}

pub mod paper;
pub mod rpc;

pub use paper::PaperMarket;
pub use rpc::{ChainRpcClient, ShadowGateway};
