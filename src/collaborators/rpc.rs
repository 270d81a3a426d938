// =============================================================================
// Chain RPC Client — read-only JSON-RPC + HTTP spot prices
// =============================================================================
//
// Thin reqwest-based client for the two on-chain reads the engine needs
// (`eth_blockNumber`, `eth_gasPrice`) plus a simple HTTP spot-price endpoint
// returning `{"symbol": ..., "price": ...}` per asset.
//
// Every transport or decode failure maps to `EngineError::SourceUnavailable`;
// the scheduler treats that as "skip the rest of this tick", never as a
// reason to halt.
// =============================================================================

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::collaborators::{BalanceSource, FeeOracle, OrderExecutor, PaperMarket, PriceSource};
use crate::error::EngineError;
use crate::types::{ExecutionReceipt, TradeInstruction};

const WEI_PER_GWEI: f64 = 1_000_000_000.0;

/// Read-only chain access over JSON-RPC, prices over plain HTTP.
#[derive(Debug, Clone)]
pub struct ChainRpcClient {
    rpc_url: String,
    price_url: String,
    client: reqwest::Client,
}

impl ChainRpcClient {
    /// Create a new client.
    ///
    /// # Arguments
    /// * `rpc_url`   — JSON-RPC endpoint of the chain node.
    /// * `price_url` — base URL of the spot-price service; the asset symbol
    ///                 is appended as a `symbol` query parameter.
    pub fn new(rpc_url: impl Into<String>, price_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self {
            rpc_url: rpc_url.into(),
            price_url: price_url.into(),
            client,
        }
    }

    /// Issue one JSON-RPC call and return the `result` field.
    async fn rpc_call(&self, method: &str, params: Value) -> Result<Value, EngineError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::SourceUnavailable(format!("{method}: {e}")))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError::SourceUnavailable(format!("{method} decode: {e}")))?;

        if let Some(err) = payload.get("error") {
            return Err(EngineError::SourceUnavailable(format!(
                "{method} rpc error: {err}"
            )));
        }

        payload
            .get("result")
            .cloned()
            .ok_or_else(|| EngineError::SourceUnavailable(format!("{method}: missing result")))
    }

    /// Parse a `0x`-prefixed hex quantity from a JSON-RPC result.
    fn parse_hex_u128(value: &Value, method: &str) -> Result<u128, EngineError> {
        let raw = value
            .as_str()
            .ok_or_else(|| EngineError::SourceUnavailable(format!("{method}: non-string result")))?;
        u128::from_str_radix(raw.trim_start_matches("0x"), 16)
            .map_err(|e| EngineError::SourceUnavailable(format!("{method}: bad hex {raw}: {e}")))
    }
}

impl FeeOracle for ChainRpcClient {
    async fn block_height(&self) -> Result<u64, EngineError> {
        let result = self.rpc_call("eth_blockNumber", json!([])).await?;
        let height = Self::parse_hex_u128(&result, "eth_blockNumber")? as u64;
        debug!(height, "block height fetched");
        Ok(height)
    }

    async fn gas_price_gwei(&self) -> Result<f64, EngineError> {
        let result = self.rpc_call("eth_gasPrice", json!([])).await?;
        let wei = Self::parse_hex_u128(&result, "eth_gasPrice")?;
        Ok(wei as f64 / WEI_PER_GWEI)
    }
}

impl PriceSource for ChainRpcClient {
    async fn price_usd(&self, asset: &str) -> Result<f64, EngineError> {
        let response = self
            .client
            .get(&self.price_url)
            .query(&[("symbol", asset)])
            .send()
            .await
            .map_err(|e| EngineError::SourceUnavailable(format!("price {asset}: {e}")))?;

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EngineError::SourceUnavailable(format!("price {asset} decode: {e}")))?;

        let price = payload
            .get("price")
            .and_then(|v| v.as_f64())
            .ok_or_else(|| {
                EngineError::SourceUnavailable(format!("price {asset}: missing price field"))
            })?;

        if price <= 0.0 || !price.is_finite() {
            return Err(EngineError::SourceUnavailable(format!(
                "price {asset}: non-positive value {price}"
            )));
        }

        Ok(price)
    }
}

// =============================================================================
// Shadow Gateway — live market data, simulated wallet
// =============================================================================

/// Shadow mode: real prices, block heights, and gas from the chain, but all
/// balances and executions routed through the in-memory paper wallet. Lets
/// the engine run against live conditions without signing anything.
#[derive(Clone)]
pub struct ShadowGateway {
    chain: ChainRpcClient,
    wallet: PaperMarket,
}

impl ShadowGateway {
    pub fn new(chain: ChainRpcClient, wallet: PaperMarket) -> Self {
        Self { chain, wallet }
    }
}

impl PriceSource for ShadowGateway {
    async fn price_usd(&self, asset: &str) -> Result<f64, EngineError> {
        let price = self.chain.price_usd(asset).await?;
        // Mirror into the wallet so simulated fills use live prices.
        self.wallet.set_price(asset, price);
        Ok(price)
    }
}

impl FeeOracle for ShadowGateway {
    async fn block_height(&self) -> Result<u64, EngineError> {
        self.chain.block_height().await
    }

    async fn gas_price_gwei(&self) -> Result<f64, EngineError> {
        self.chain.gas_price_gwei().await
    }
}

impl BalanceSource for ShadowGateway {
    async fn balances(&self) -> Result<HashMap<String, f64>, EngineError> {
        self.wallet.balances().await
    }
}

impl OrderExecutor for ShadowGateway {
    async fn execute(
        &self,
        instruction: &TradeInstruction,
    ) -> Result<ExecutionReceipt, EngineError> {
        self.wallet.execute(instruction).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_parsing_accepts_prefixed_quantities() {
        let v = json!("0x10");
        assert_eq!(ChainRpcClient::parse_hex_u128(&v, "t").unwrap(), 16);
        let v = json!("0x3b9aca00"); // 1 gwei in wei
        assert_eq!(
            ChainRpcClient::parse_hex_u128(&v, "t").unwrap(),
            1_000_000_000
        );
    }

    #[test]
    fn hex_parsing_rejects_garbage() {
        assert!(ChainRpcClient::parse_hex_u128(&json!("0xzz"), "t").is_err());
        assert!(ChainRpcClient::parse_hex_u128(&json!(42), "t").is_err());
    }
}
