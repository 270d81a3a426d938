// =============================================================================
// Paper Market — in-memory simulation of every collaborator contract
// =============================================================================
//
// One hub implements all four seams so demo mode and tests can run the full
// tick pipeline without touching a chain. Clone-able handle over shared
// state: the scheduler owns one clone, the test (or the demo stepper task)
// keeps another to advance blocks, move prices, and script failures.
//
// Failure scripting: `fail_next_*` flags make exactly the next corresponding
// call return the matching `EngineError`, then clear themselves.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::collaborators::{BalanceSource, FeeOracle, OrderExecutor, PriceSource};
use crate::error::EngineError;
use crate::runtime_config::RuntimeConfig;
use crate::types::{ExecutionReceipt, TradeInstruction, TradeKind};

struct Inner {
    /// Pinned at $1.00; the demo drift never touches it.
    base_asset: String,
    prices: RwLock<HashMap<String, f64>>,
    balances: RwLock<HashMap<String, f64>>,
    height: AtomicU64,
    gas_price_gwei: RwLock<f64>,
    /// Simulated execution cost, percent of output.
    slippage_pct: RwLock<f64>,
    fail_next_price: AtomicBool,
    fail_next_balances: AtomicBool,
    fail_next_execution: AtomicBool,
}

/// Shared-handle paper market. Cheap to clone.
#[derive(Clone)]
pub struct PaperMarket {
    inner: Arc<Inner>,
}

impl PaperMarket {
    /// Build a wallet from the configured starting balances. The base asset
    /// is seeded at $1.00 up front so swaps funded from it always have a
    /// priced route, whoever sets the other prices.
    pub fn new(config: &RuntimeConfig) -> Self {
        let mut prices = HashMap::new();
        prices.insert(config.base_asset.clone(), 1.0);
        Self {
            inner: Arc::new(Inner {
                base_asset: config.base_asset.clone(),
                prices: RwLock::new(prices),
                balances: RwLock::new(config.starting_balances.clone()),
                height: AtomicU64::new(1),
                gas_price_gwei: RwLock::new(30.0),
                slippage_pct: RwLock::new(config.slippage_pct),
                fail_next_price: AtomicBool::new(false),
                fail_next_balances: AtomicBool::new(false),
                fail_next_execution: AtomicBool::new(false),
            }),
        }
    }

    // ── Scripting controls ──────────────────────────────────────────────

    pub fn set_price(&self, asset: &str, price: f64) {
        self.inner.prices.write().insert(asset.to_string(), price);
    }

    pub fn set_balance(&self, asset: &str, quantity: f64) {
        self.inner
            .balances
            .write()
            .insert(asset.to_string(), quantity);
    }

    pub fn set_gas_price(&self, gwei: f64) {
        *self.inner.gas_price_gwei.write() = gwei;
    }

    pub fn advance_block(&self) -> u64 {
        self.inner.height.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_height(&self) -> u64 {
        self.inner.height.load(Ordering::SeqCst)
    }

    pub fn balance(&self, asset: &str) -> f64 {
        self.inner.balances.read().get(asset).copied().unwrap_or(0.0)
    }

    pub fn fail_next_price(&self) {
        self.inner.fail_next_price.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_balances(&self) {
        self.inner.fail_next_balances.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_execution(&self) {
        self.inner.fail_next_execution.store(true, Ordering::SeqCst);
    }

    /// Advance one block and drift every price along a deterministic
    /// oscillation. Drives demo mode; tests prefer `set_price` directly.
    pub fn step(&self) {
        let height = self.advance_block();
        let drift = 1.0 + 0.002 * ((height as f64) * 0.35).sin();
        let mut prices = self.inner.prices.write();
        for (asset, price) in prices.iter_mut() {
            if *asset != self.inner.base_asset {
                *price *= drift;
            }
        }
    }
}

impl PriceSource for PaperMarket {
    async fn price_usd(&self, asset: &str) -> Result<f64, EngineError> {
        if self.inner.fail_next_price.swap(false, Ordering::SeqCst) {
            return Err(EngineError::SourceUnavailable(
                "scripted price failure".into(),
            ));
        }
        self.inner
            .prices
            .read()
            .get(asset)
            .copied()
            .ok_or_else(|| EngineError::SourceUnavailable(format!("no paper price for {asset}")))
    }
}

impl BalanceSource for PaperMarket {
    async fn balances(&self) -> Result<HashMap<String, f64>, EngineError> {
        if self.inner.fail_next_balances.swap(false, Ordering::SeqCst) {
            return Err(EngineError::SourceUnavailable(
                "scripted balance failure".into(),
            ));
        }
        Ok(self.inner.balances.read().clone())
    }
}

impl FeeOracle for PaperMarket {
    async fn block_height(&self) -> Result<u64, EngineError> {
        Ok(self.inner.height.load(Ordering::SeqCst))
    }

    async fn gas_price_gwei(&self) -> Result<f64, EngineError> {
        Ok(*self.inner.gas_price_gwei.read())
    }
}

impl OrderExecutor for PaperMarket {
    async fn execute(
        &self,
        instruction: &TradeInstruction,
    ) -> Result<ExecutionReceipt, EngineError> {
        if self.inner.fail_next_execution.swap(false, Ordering::SeqCst) {
            return Err(EngineError::ExecutionFailed(
                "scripted execution failure".into(),
            ));
        }

        let amount_out = match instruction.kind {
            // Wrapping is 1:1 by construction.
            TradeKind::Wrap => instruction.amount_in,
            TradeKind::Swap => {
                let prices = self.inner.prices.read();
                let from_price = prices.get(&instruction.from_asset).copied().unwrap_or(0.0);
                let to_price = prices.get(&instruction.to_asset).copied().unwrap_or(0.0);
                if from_price <= 0.0 || to_price <= 0.0 {
                    return Err(EngineError::ExecutionFailed(format!(
                        "no simulated route {} -> {}",
                        instruction.from_asset, instruction.to_asset
                    )));
                }
                let slippage = *self.inner.slippage_pct.read() / 100.0;
                instruction.amount_in * from_price / to_price * (1.0 - slippage)
            }
        };

        {
            let mut balances = self.inner.balances.write();
            let held = balances
                .get(&instruction.from_asset)
                .copied()
                .unwrap_or(0.0);
            if held + 1e-12 < instruction.amount_in {
                return Err(EngineError::ExecutionFailed(format!(
                    "insufficient {} balance: {held} < {}",
                    instruction.from_asset, instruction.amount_in
                )));
            }
            balances.insert(instruction.from_asset.clone(), held - instruction.amount_in);
            *balances.entry(instruction.to_asset.clone()).or_insert(0.0) += amount_out;
        }

        let tx_ref = format!("sim-{}", Uuid::new_v4());
        info!(
            kind = %instruction.kind,
            from = %instruction.from_asset,
            to = %instruction.to_asset,
            amount_in = instruction.amount_in,
            amount_out,
            tx_ref = %tx_ref,
            "paper fill"
        );

        Ok(ExecutionReceipt {
            tx_ref,
            amount_out_estimate: amount_out,
        })
    }
}
