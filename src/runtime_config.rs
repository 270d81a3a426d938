// =============================================================================
// Runtime Configuration — Hot-reloadable engine settings with atomic save
// =============================================================================
//
// Central configuration hub for the Meridian engine.  Every tunable threshold
// lives here so that the engine can be reconfigured at runtime without a
// restart.  Components never snapshot the config; they read the current value
// on each invocation.
//
// Persistence uses an atomic tmp + rename pattern to prevent corruption on
// crash.  All fields carry `#[serde(default)]` so that adding new fields
// never breaks loading an older config file.
// =============================================================================

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

// =============================================================================
// Default-value helpers (required by serde `default = "..."` attribute)
// =============================================================================

fn default_tracked_assets() -> Vec<String> {
    vec!["WETH".to_string(), "WBTC".to_string()]
}

fn default_base_asset() -> String {
    "USDC".to_string()
}

fn default_wrapped_native() -> String {
    "WPOL".to_string()
}

fn default_native_asset() -> String {
    "POL".to_string()
}

fn default_sizing_cap() -> f64 {
    0.25
}

fn default_max_position_pct() -> f64 {
    0.40
}

fn default_min_trade_usd() -> f64 {
    10.0
}

fn default_slippage_pct() -> f64 {
    0.5
}

fn default_max_drawdown_pct() -> f64 {
    0.15
}

fn default_cooldown_blocks() -> u64 {
    5
}

fn default_max_trades_per_hour() -> u32 {
    6
}

fn default_min_confluence() -> f64 {
    0.35
}

fn default_risk_off_threshold() -> f64 {
    -0.2
}

fn default_risk_off_fraction() -> f64 {
    0.30
}

fn default_max_gas_price_gwei() -> f64 {
    150.0
}

fn default_gas_reserve_native() -> f64 {
    1.0
}

fn default_starting_balances() -> HashMap<String, f64> {
    let mut balances = HashMap::new();
    balances.insert("USDC".to_string(), 1000.0);
    balances.insert("POL".to_string(), 25.0);
    balances
}

// =============================================================================
// RuntimeConfig
// =============================================================================

/// On-disk location of the persisted runtime configuration.
pub const CONFIG_PATH: &str = "runtime_config.json";

/// Top-level runtime configuration for the Meridian engine.
///
/// Every field has a serde default so that older JSON files missing new fields
/// will still deserialise correctly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    // --- Asset universe -----------------------------------------------------

    /// Assets the engine maintains indicators and signals for.
    #[serde(default = "default_tracked_assets")]
    pub tracked_assets: Vec<String>,

    /// Stable settlement / funding asset.
    #[serde(default = "default_base_asset")]
    pub base_asset: String,

    /// ERC-20 wrapped form of the native gas asset.
    #[serde(default = "default_wrapped_native")]
    pub wrapped_native: String,

    /// Native gas asset (pays transaction fees, must keep a reserve).
    #[serde(default = "default_native_asset")]
    pub native_asset: String,

    // --- Trade sizing -------------------------------------------------------

    /// Maximum fraction of the funding balance committed to one trade.
    /// Actual fraction is `min(sizing_cap, |signal|)`.
    #[serde(default = "default_sizing_cap")]
    pub sizing_cap: f64,

    /// Cap on any single acquired position as a fraction of total portfolio
    /// value.
    #[serde(default = "default_max_position_pct")]
    pub max_position_pct: f64,

    /// Dust floor: no instruction is emitted below this USD value.
    #[serde(default = "default_min_trade_usd")]
    pub min_trade_usd: f64,

    /// Slippage tolerance applied by the order executor, in percent.
    #[serde(default = "default_slippage_pct")]
    pub slippage_pct: f64,

    // --- Risk guards --------------------------------------------------------

    /// Drawdown from the portfolio peak that trips the sticky halt, as a
    /// fraction (0.15 = 15 %).
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: f64,

    /// Minimum number of blocks between executed trades.
    #[serde(default = "default_cooldown_blocks")]
    pub cooldown_blocks: u64,

    /// Maximum executed trades in any trailing one-hour window.
    #[serde(default = "default_max_trades_per_hour")]
    pub max_trades_per_hour: u32,

    /// Gas price ceiling in gwei; trading pauses above it.
    #[serde(default = "default_max_gas_price_gwei")]
    pub max_gas_price_gwei: f64,

    /// Native-asset balance that must remain untouched to pay future fees.
    #[serde(default = "default_gas_reserve_native")]
    pub gas_reserve_native: f64,

    // --- Decision thresholds ------------------------------------------------

    /// Minimum composite-signal magnitude before a trade is considered.
    #[serde(default = "default_min_confluence")]
    pub min_confluence: f64,

    /// Composite level below which *all* assets must fall to trigger the
    /// risk-off liquidation rule. Deliberately independent of
    /// `min_confluence`.
    #[serde(default = "default_risk_off_threshold")]
    pub risk_off_threshold: f64,

    /// Fraction of the largest non-base holding liquidated by the risk-off
    /// rule.
    #[serde(default = "default_risk_off_fraction")]
    pub risk_off_fraction: f64,

    // --- Simulation ---------------------------------------------------------

    /// Starting balances for the paper wallet (demo mode only).
    #[serde(default = "default_starting_balances")]
    pub starting_balances: HashMap<String, f64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tracked_assets: default_tracked_assets(),
            base_asset: default_base_asset(),
            wrapped_native: default_wrapped_native(),
            native_asset: default_native_asset(),
            sizing_cap: default_sizing_cap(),
            max_position_pct: default_max_position_pct(),
            min_trade_usd: default_min_trade_usd(),
            slippage_pct: default_slippage_pct(),
            max_drawdown_pct: default_max_drawdown_pct(),
            cooldown_blocks: default_cooldown_blocks(),
            max_trades_per_hour: default_max_trades_per_hour(),
            max_gas_price_gwei: default_max_gas_price_gwei(),
            gas_reserve_native: default_gas_reserve_native(),
            min_confluence: default_min_confluence(),
            risk_off_threshold: default_risk_off_threshold(),
            risk_off_fraction: default_risk_off_fraction(),
            starting_balances: default_starting_balances(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a JSON file at `path`.
    ///
    /// If the file does not exist, returns an error so the caller can fall
    /// back to defaults with a warning.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read runtime config from {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse runtime config from {}", path.display()))?;

        info!(
            path = %path.display(),
            tracked_assets = ?config.tracked_assets,
            "runtime config loaded"
        );

        Ok(config)
    }

    /// Persist the current configuration to `path` using an atomic write
    /// (write to `.tmp`, then rename).
    ///
    /// This prevents corruption if the process crashes mid-write.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = serde_json::to_string_pretty(self)
            .context("failed to serialise runtime config to JSON")?;

        let tmp_path = path.with_extension("json.tmp");

        std::fs::write(&tmp_path, &content)
            .with_context(|| format!("failed to write tmp config to {}", tmp_path.display()))?;

        std::fs::rename(&tmp_path, path)
            .with_context(|| format!("failed to rename tmp config to {}", path.display()))?;

        info!(path = %path.display(), "runtime config saved (atomic)");
        Ok(())
    }

    /// Apply a partial update, field by field. Returns a human-readable list
    /// of the changes made (empty when the update was a no-op).
    pub fn apply_update(&mut self, update: &ConfigUpdate) -> Vec<String> {
        let mut changes = Vec::new();

        macro_rules! apply_field {
            ($field:ident) => {
                if let Some(val) = update.$field {
                    if self.$field != val {
                        changes.push(format!(
                            "{}: {} -> {}",
                            stringify!($field),
                            self.$field,
                            val
                        ));
                        self.$field = val;
                    }
                }
            };
        }

        apply_field!(sizing_cap);
        apply_field!(max_position_pct);
        apply_field!(min_trade_usd);
        apply_field!(slippage_pct);
        apply_field!(max_drawdown_pct);
        apply_field!(cooldown_blocks);
        apply_field!(max_trades_per_hour);
        apply_field!(max_gas_price_gwei);
        apply_field!(gas_reserve_native);
        apply_field!(min_confluence);
        apply_field!(risk_off_threshold);
        apply_field!(risk_off_fraction);

        changes
    }
}

// =============================================================================
// Partial update payload
// =============================================================================

/// Operator-supplied partial config update. Every field is independently
/// overridable; `None` leaves the current value untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigUpdate {
    #[serde(default)]
    pub sizing_cap: Option<f64>,
    #[serde(default)]
    pub max_position_pct: Option<f64>,
    #[serde(default)]
    pub min_trade_usd: Option<f64>,
    #[serde(default)]
    pub slippage_pct: Option<f64>,
    #[serde(default)]
    pub max_drawdown_pct: Option<f64>,
    #[serde(default)]
    pub cooldown_blocks: Option<u64>,
    #[serde(default)]
    pub max_trades_per_hour: Option<u32>,
    #[serde(default)]
    pub max_gas_price_gwei: Option<f64>,
    #[serde(default)]
    pub gas_reserve_native: Option<f64>,
    #[serde(default)]
    pub min_confluence: Option<f64>,
    #[serde(default)]
    pub risk_off_threshold: Option<f64>,
    #[serde(default)]
    pub risk_off_fraction: Option<f64>,
}
