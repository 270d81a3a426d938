// =============================================================================
// Decision Engine — ordered rule cascade, first match wins
// =============================================================================
//
// Stateless given its inputs. The cascade is an explicit ordered list of
// named rules so the priority order is auditable and each rule can be unit
// tested in isolation:
//
//   1. acquire   — strongest bullish signal above +min_confluence, funded in
//                  priority order base asset -> wrapped native -> native
//                  (native funding emits a Wrap pre-step instead of the swap).
//   2. dispose   — bearish signal below -min_confluence with a held balance;
//                  swap into the base asset.
//   3. risk_off  — every tracked signal below risk_off_threshold; liquidate a
//                  fixed fraction of the largest non-base holding (the native
//                  balance counts only above the fee reserve).
//
// The first rule that fires ends evaluation: at most one instruction per
// tick. A rule whose sizing lands under the dust floor does not fire, and
// evaluation continues with the next rule.
//
// Candidate ordering is deterministic: ties on signal strength break on
// asset name, so replaying identical inputs always yields the same
// instruction.
// =============================================================================

use std::collections::HashMap;

use tracing::debug;

use crate::portfolio::PortfolioState;
use crate::runtime_config::RuntimeConfig;
use crate::signals::Signal;
use crate::types::{TradeInstruction, TradeKind};

// ---------------------------------------------------------------------------
// Context and rule table
// ---------------------------------------------------------------------------

/// Everything a rule may consult. Borrowed for the duration of one decision.
pub struct DecisionContext<'a> {
    pub signals: &'a HashMap<String, Signal>,
    pub portfolio: &'a PortfolioState,
    pub config: &'a RuntimeConfig,
}

/// One entry in the cascade: a name for the audit trail and the rule body.
pub struct DecisionRule {
    pub name: &'static str,
    pub apply: fn(&DecisionContext) -> Option<TradeInstruction>,
}

/// The cascade, in priority order.
pub const RULES: &[DecisionRule] = &[
    DecisionRule {
        name: "acquire",
        apply: rule_acquire,
    },
    DecisionRule {
        name: "dispose",
        apply: rule_dispose,
    },
    DecisionRule {
        name: "risk_off",
        apply: rule_risk_off,
    },
];

/// Evaluate the cascade and return the first instruction that fires.
pub fn decide(ctx: &DecisionContext) -> Option<TradeInstruction> {
    for rule in RULES {
        if let Some(instruction) = (rule.apply)(ctx) {
            debug!(
                rule = rule.name,
                kind = %instruction.kind,
                from = %instruction.from_asset,
                to = %instruction.to_asset,
                amount_in = instruction.amount_in,
                amount_in_usd = instruction.amount_in_usd,
                "decision rule fired"
            );
            return Some(instruction);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Candidate selection helpers
// ---------------------------------------------------------------------------

/// Tracked assets sorted by name for deterministic tie-breaks.
fn sorted_tracked<'a>(ctx: &'a DecisionContext) -> Vec<&'a String> {
    let mut assets: Vec<&String> = ctx
        .config
        .tracked_assets
        .iter()
        .filter(|a| ctx.signals.contains_key(*a))
        .collect();
    assets.sort();
    assets
}

/// Strongest signal satisfying `pred`. Strict comparison over the sorted
/// asset list means ties keep the alphabetically first asset.
fn best_candidate<'a>(
    ctx: &'a DecisionContext,
    pred: impl Fn(f64) -> bool,
) -> Option<(&'a String, f64)> {
    let mut best: Option<(&String, f64)> = None;
    for asset in sorted_tracked(ctx) {
        let composite = ctx.signals[asset].composite;
        if !pred(composite) {
            continue;
        }
        match best {
            Some((_, current)) if composite <= current => {}
            _ => best = Some((asset, composite)),
        }
    }
    best
}

// ---------------------------------------------------------------------------
// Rule 1: acquire
// ---------------------------------------------------------------------------

fn rule_acquire(ctx: &DecisionContext) -> Option<TradeInstruction> {
    let config = ctx.config;
    let (asset, composite) = best_candidate(ctx, |c| c > config.min_confluence)?;

    // Funding priority: base asset, then wrapped native, then native (which
    // needs a wrap pre-step before it can be swapped).
    let funding_order = [
        (&config.base_asset, TradeKind::Swap),
        (&config.wrapped_native, TradeKind::Swap),
        (&config.native_asset, TradeKind::Wrap),
    ];

    for (funding, kind) in funding_order {
        let mut available = ctx.portfolio.balance(funding);
        if kind == TradeKind::Wrap {
            // Never wrap the fee reserve away.
            available = (available - config.gas_reserve_native).max(0.0);
        }
        let funding_price = ctx.portfolio.price_usd(funding);
        if available <= 0.0 || funding_price <= 0.0 {
            continue;
        }

        let fraction = config.sizing_cap.min(composite.abs());
        let mut amount_in = available * fraction;
        let mut amount_usd = amount_in * funding_price;

        // Cap the resulting position relative to total portfolio value.
        let total = ctx.portfolio.total_value_usd();
        let held_usd = ctx.portfolio.value_usd(asset);
        let headroom = (total * config.max_position_pct - held_usd).max(0.0);
        if amount_usd > headroom {
            amount_usd = headroom;
            amount_in = amount_usd / funding_price;
        }

        if amount_usd < config.min_trade_usd {
            continue;
        }

        let to_asset = match kind {
            // The wrap pre-step funds next tick's swap out of wrapped native.
            TradeKind::Wrap => config.wrapped_native.clone(),
            TradeKind::Swap => asset.clone(),
        };

        return Some(TradeInstruction {
            kind,
            from_asset: funding.clone(),
            to_asset,
            amount_in,
            amount_in_usd: amount_usd,
            rule: "acquire",
        });
    }

    None
}

// ---------------------------------------------------------------------------
// Rule 2: dispose
// ---------------------------------------------------------------------------

fn rule_dispose(ctx: &DecisionContext) -> Option<TradeInstruction> {
    let config = ctx.config;

    for asset in sorted_tracked(ctx) {
        let composite = ctx.signals[asset].composite;
        if composite >= -config.min_confluence {
            continue;
        }

        let balance = ctx.portfolio.balance(asset);
        let price = ctx.portfolio.price_usd(asset);
        if balance <= 0.0 || price <= 0.0 {
            continue;
        }

        let fraction = config.sizing_cap.min(composite.abs());
        let amount_in = balance * fraction;
        let amount_usd = amount_in * price;
        if amount_usd < config.min_trade_usd {
            continue;
        }

        return Some(TradeInstruction {
            kind: TradeKind::Swap,
            from_asset: asset.clone(),
            to_asset: config.base_asset.clone(),
            amount_in,
            amount_in_usd: amount_usd,
            rule: "dispose",
        });
    }

    None
}

// ---------------------------------------------------------------------------
// Rule 3: risk-off fallback
// ---------------------------------------------------------------------------

fn rule_risk_off(ctx: &DecisionContext) -> Option<TradeInstruction> {
    let config = ctx.config;
    let tracked = sorted_tracked(ctx);
    if tracked.is_empty() {
        return None;
    }

    // Fires only when *every* tracked asset reads bearish below the
    // threshold simultaneously.
    if !tracked
        .iter()
        .all(|a| ctx.signals[*a].composite < config.risk_off_threshold)
    {
        return None;
    }

    // Largest liquidatable holding by USD value. Only the base asset is
    // exempt; the native balance counts, but never the slice of it held back
    // as the fee reserve.
    let spendable = |asset: &str| -> f64 {
        let held = ctx.portfolio.balance(asset);
        if asset == config.native_asset {
            (held - config.gas_reserve_native).max(0.0)
        } else {
            held
        }
    };
    let largest = ctx
        .portfolio
        .balances
        .keys()
        .filter(|a| **a != config.base_asset)
        .map(|a| (a, spendable(a) * ctx.portfolio.price_usd(a)))
        .filter(|(_, v)| *v > 0.0)
        .max_by(|(a_name, a), (b_name, b)| {
            a.partial_cmp(b)
                .unwrap_or(std::cmp::Ordering::Equal)
                // Ties break on name so replay is deterministic.
                .then_with(|| b_name.cmp(a_name))
        });

    let (asset, value_usd) = largest?;
    let amount_in = spendable(asset) * config.risk_off_fraction;
    let amount_usd = value_usd * config.risk_off_fraction;
    if amount_usd < config.min_trade_usd {
        return None;
    }

    Some(TradeInstruction {
        kind: TradeKind::Swap,
        from_asset: asset.clone(),
        to_asset: config.base_asset.clone(),
        amount_in,
        amount_in_usd: amount_usd,
        rule: "risk_off",
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn signal(composite: f64) -> Signal {
        Signal {
            composite,
            ..Default::default()
        }
    }

    fn base_portfolio() -> PortfolioState {
        let mut p = PortfolioState::default();
        p.balances.insert("USDC".into(), 1000.0);
        p.balances.insert("POL".into(), 25.0);
        p.prices_usd.insert("USDC".into(), 1.0);
        p.prices_usd.insert("POL".into(), 0.5);
        p.prices_usd.insert("WPOL".into(), 0.5);
        p.prices_usd.insert("WETH".into(), 2000.0);
        p.prices_usd.insert("WBTC".into(), 40000.0);
        p
    }

    fn signals(weth: f64, wbtc: f64) -> HashMap<String, Signal> {
        let mut m = HashMap::new();
        m.insert("WETH".to_string(), signal(weth));
        m.insert("WBTC".to_string(), signal(wbtc));
        m
    }

    #[test]
    fn no_rule_fires_on_neutral_signals() {
        let portfolio = base_portfolio();
        let config = RuntimeConfig::default();
        let sigs = signals(0.0, 0.0);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        assert!(decide(&ctx).is_none());
    }

    #[test]
    fn acquire_funds_from_base_asset_first() {
        let portfolio = base_portfolio();
        let config = RuntimeConfig::default();
        let sigs = signals(0.6, 0.1);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).expect("acquire should fire");
        assert_eq!(instr.rule, "acquire");
        assert_eq!(instr.kind, TradeKind::Swap);
        assert_eq!(instr.from_asset, "USDC");
        assert_eq!(instr.to_asset, "WETH");
        // sizing_cap 0.25 < |0.6| => 25% of the 1000 USDC balance.
        assert!((instr.amount_in - 250.0).abs() < 1e-9);
    }

    #[test]
    fn acquire_sizes_by_signal_when_below_cap() {
        let portfolio = base_portfolio();
        let mut config = RuntimeConfig::default();
        config.sizing_cap = 0.5;
        let sigs = signals(0.4, 0.0);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        // |signal| 0.4 < cap 0.5 => 40% of balance.
        assert!((instr.amount_in - 400.0).abs() < 1e-9);
    }

    #[test]
    fn acquire_picks_strongest_signal() {
        let portfolio = base_portfolio();
        let config = RuntimeConfig::default();
        let sigs = signals(0.5, 0.8);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        assert_eq!(instr.to_asset, "WBTC");
    }

    #[test]
    fn acquire_wraps_native_when_only_funding_source() {
        let mut portfolio = base_portfolio();
        portfolio.balances.insert("USDC".into(), 0.0);
        // 25 POL at $0.50, reserve of 1 POL keeps 24 available.
        let mut config = RuntimeConfig::default();
        config.min_trade_usd = 1.0;
        let sigs = signals(0.9, 0.0);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        assert_eq!(instr.kind, TradeKind::Wrap);
        assert_eq!(instr.from_asset, "POL");
        assert_eq!(instr.to_asset, "WPOL");
        // 24 available * min(0.25, 0.9) = 6 POL.
        assert!((instr.amount_in - 6.0).abs() < 1e-9);
    }

    #[test]
    fn acquire_respects_position_cap() {
        let mut portfolio = base_portfolio();
        // Already holding WETH worth ~38% of the portfolio.
        portfolio.balances.insert("WETH".into(), 0.31);
        let config = RuntimeConfig::default(); // max_position_pct 0.40
        let sigs = signals(0.9, 0.0);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        let total = portfolio.total_value_usd();
        let held = portfolio.value_usd("WETH");
        let headroom = total * config.max_position_pct - held;
        assert!((instr.amount_in_usd - headroom).abs() < 1e-6);
    }

    #[test]
    fn dust_floor_suppresses_acquire() {
        let mut portfolio = base_portfolio();
        portfolio.balances.insert("USDC".into(), 30.0);
        portfolio.balances.insert("POL".into(), 1.0); // nothing above reserve
        let config = RuntimeConfig::default(); // min_trade_usd 10
        let sigs = signals(0.36, 0.0);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        // 30 * min(0.25, 0.36) = 7.50 USD < 10 floor.
        assert!(decide(&ctx).is_none());
    }

    #[test]
    fn dispose_swaps_holding_into_base() {
        let mut portfolio = base_portfolio();
        portfolio.balances.insert("WETH".into(), 0.5);
        let config = RuntimeConfig::default();
        let sigs = signals(-0.6, 0.0);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        assert_eq!(instr.rule, "dispose");
        assert_eq!(instr.from_asset, "WETH");
        assert_eq!(instr.to_asset, "USDC");
        // 0.5 * min(0.25, 0.6) = 0.125 WETH.
        assert!((instr.amount_in - 0.125).abs() < 1e-9);
    }

    #[test]
    fn acquire_outranks_dispose() {
        // Both a strong buy and a strong sell exist; rule order wins.
        let mut portfolio = base_portfolio();
        portfolio.balances.insert("WBTC".into(), 0.01);
        let config = RuntimeConfig::default();
        let sigs = signals(0.7, -0.7);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        assert_eq!(instr.rule, "acquire");
    }

    #[test]
    fn risk_off_liquidates_largest_holding() {
        let mut portfolio = base_portfolio();
        portfolio.balances.insert("USDC".into(), 100.0);
        portfolio.balances.insert("WETH".into(), 0.2); // $400
        portfolio.balances.insert("WBTC".into(), 0.005); // $200
        let config = RuntimeConfig::default();
        // Bearish but above min_confluence in magnitude nowhere; still all
        // below the -0.2 risk-off threshold.
        let sigs = signals(-0.25, -0.3);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        assert_eq!(instr.rule, "risk_off");
        assert_eq!(instr.from_asset, "WETH");
        assert_eq!(instr.to_asset, "USDC");
        // 30% of the 0.2 WETH holding.
        assert!((instr.amount_in - 0.06).abs() < 1e-9);
    }

    #[test]
    fn risk_off_taps_native_above_the_fee_reserve() {
        let mut portfolio = base_portfolio();
        portfolio.balances.insert("USDC".into(), 50.0);
        // 100 POL at $0.50; 99 sit above the 1 POL reserve.
        portfolio.balances.insert("POL".into(), 100.0);
        let config = RuntimeConfig::default();
        let sigs = signals(-0.25, -0.3);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        assert_eq!(instr.rule, "risk_off");
        assert_eq!(instr.from_asset, "POL");
        assert_eq!(instr.to_asset, "USDC");
        // 30% of the 99 POL above the reserve.
        assert!((instr.amount_in - 29.7).abs() < 1e-9);
    }

    #[test]
    fn risk_off_never_sells_the_reserve_itself() {
        let mut portfolio = base_portfolio();
        // Native sits exactly at the reserve; WETH is the only real position.
        portfolio.balances.insert("POL".into(), 1.0);
        portfolio.balances.insert("WETH".into(), 0.2);
        let config = RuntimeConfig::default();
        let sigs = signals(-0.25, -0.3);
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        let instr = decide(&ctx).unwrap();
        assert_eq!(instr.from_asset, "WETH");
    }

    #[test]
    fn risk_off_requires_unanimous_bearishness() {
        let mut portfolio = base_portfolio();
        portfolio.balances.insert("WETH".into(), 0.2);
        let config = RuntimeConfig::default();
        let sigs = signals(-0.25, -0.1); // WBTC not below the threshold
        let ctx = DecisionContext {
            signals: &sigs,
            portfolio: &portfolio,
            config: &config,
        };
        assert!(decide(&ctx).is_none());
    }

    #[test]
    fn at_most_one_instruction_and_never_dust() {
        let mut portfolio = base_portfolio();
        portfolio.balances.insert("WETH".into(), 0.5);
        portfolio.balances.insert("WBTC".into(), 0.01);
        let config = RuntimeConfig::default();
        for (weth, wbtc) in [(0.9, 0.9), (-0.9, -0.9), (0.5, -0.5), (-0.25, -0.25)] {
            let sigs = signals(weth, wbtc);
            let ctx = DecisionContext {
                signals: &sigs,
                portfolio: &portfolio,
                config: &config,
            };
            if let Some(instr) = decide(&ctx) {
                assert!(instr.amount_in_usd >= config.min_trade_usd);
                assert!(instr.amount_in > 0.0);
            }
        }
    }
}
