// =============================================================================
// Relative Strength Index (RSI) — Wilder's Smoothing, streaming form
// =============================================================================
//
// RSI measures the speed and magnitude of recent price changes to evaluate
// whether an asset is overbought or oversold.
//
// Step 1 — Compute the price change (delta) from the previous close.
// Step 2 — Until `period + 1` samples exist, the output is the neutral 50 and
//          deltas accumulate into a seed window.
// Step 3 — Seed average gain / average loss with the simple mean of the first
//          `period` deltas, then switch to Wilder's exponential smoothing:
//            avg_gain = (prev_avg_gain * (period - 1) + gain) / period
//            avg_loss = (prev_avg_loss * (period - 1) + loss) / period
// Step 4 — RS  = avg_gain / avg_loss   (avg_loss == 0 => RS = 100 sentinel)
//          RSI = 100 - 100 / (1 + RS)
//
// Thresholds:  RSI > 70 => OVERBOUGHT,  RSI < 30 => OVERSOLD.
// =============================================================================

/// Neutral output while the accumulator is warming up.
pub const RSI_NEUTRAL: f64 = 50.0;

/// Streaming RSI accumulator. Feed one close per tick via [`WilderRsi::update`].
///
/// The smoothed averages depend on the full input history; they are never
/// reset except on process restart.
#[derive(Debug, Clone)]
pub struct WilderRsi {
    period: usize,
    prev_price: Option<f64>,
    /// Deltas collected before the averages are seeded.
    seed_deltas: Vec<f64>,
    avg_gain: Option<f64>,
    avg_loss: Option<f64>,
}

impl WilderRsi {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            prev_price: None,
            seed_deltas: Vec::with_capacity(period),
            avg_gain: None,
            avg_loss: None,
        }
    }

    /// Fold the next close into the accumulator and return the RSI in
    /// [0, 100]. Returns [`RSI_NEUTRAL`] until `period + 1` closes have been
    /// seen.
    pub fn update(&mut self, price: f64) -> f64 {
        let delta = match self.prev_price.replace(price) {
            Some(prev) => price - prev,
            None => return RSI_NEUTRAL,
        };

        match (self.avg_gain, self.avg_loss) {
            (Some(gain), Some(loss)) => {
                let period = self.period as f64;
                let g = if delta > 0.0 { delta } else { 0.0 };
                let l = if delta < 0.0 { delta.abs() } else { 0.0 };
                let avg_gain = (gain * (period - 1.0) + g) / period;
                let avg_loss = (loss * (period - 1.0) + l) / period;
                self.avg_gain = Some(avg_gain);
                self.avg_loss = Some(avg_loss);
                rsi_from_averages(avg_gain, avg_loss)
            }
            _ => {
                self.seed_deltas.push(delta);
                if self.seed_deltas.len() < self.period {
                    return RSI_NEUTRAL;
                }
                // Seed with the simple mean of the initial window.
                let period = self.period as f64;
                let (sum_gain, sum_loss) = self
                    .seed_deltas
                    .iter()
                    .fold((0.0_f64, 0.0_f64), |(g, l), &d| {
                        if d > 0.0 {
                            (g + d, l)
                        } else {
                            (g, l + d.abs())
                        }
                    });
                let avg_gain = sum_gain / period;
                let avg_loss = sum_loss / period;
                self.avg_gain = Some(avg_gain);
                self.avg_loss = Some(avg_loss);
                self.seed_deltas.clear();
                rsi_from_averages(avg_gain, avg_loss)
            }
        }
    }

    /// Whether the smoothed averages have been seeded (`period + 1` closes).
    pub fn is_warm(&self) -> bool {
        self.avg_gain.is_some()
    }
}

/// Convert average gain / average loss into an RSI value in [0, 100].
///
/// A zero average loss uses the RS = 100 sentinel rather than dividing, which
/// keeps a purely rising series just under 100 instead of producing infinity.
fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    let rs = if avg_loss == 0.0 {
        100.0
    } else {
        avg_gain / avg_loss
    };
    (100.0 - 100.0 / (1.0 + rs)).clamp(0.0, 100.0)
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn feed(rsi: &mut WilderRsi, closes: &[f64]) -> f64 {
        let mut last = RSI_NEUTRAL;
        for &c in closes {
            last = rsi.update(c);
        }
        last
    }

    #[test]
    fn neutral_until_period_plus_one_samples() {
        let mut rsi = WilderRsi::new(14);
        // 14 closes = 13 deltas: still warming up.
        let closes: Vec<f64> = (1..=14).map(|x| x as f64).collect();
        let v = feed(&mut rsi, &closes);
        assert!((v - RSI_NEUTRAL).abs() < 1e-12);
        assert!(!rsi.is_warm());
        // The 15th close completes the seed window.
        let v = rsi.update(15.0);
        assert!(rsi.is_warm());
        assert!(v > RSI_NEUTRAL);
    }

    #[test]
    fn all_gains_saturates_high() {
        let mut rsi = WilderRsi::new(14);
        let closes: Vec<f64> = (1..=40).map(|x| x as f64).collect();
        let v = feed(&mut rsi, &closes);
        // RS sentinel of 100 maps to 100 - 100/101.
        assert!(v > 98.0, "expected near-saturated RSI, got {v}");
        assert!(v <= 100.0);
    }

    #[test]
    fn all_losses_saturates_low() {
        let mut rsi = WilderRsi::new(14);
        let closes: Vec<f64> = (1..=40).rev().map(|x| x as f64).collect();
        let v = feed(&mut rsi, &closes);
        assert!(v < 1e-9, "expected 0.0, got {v}");
    }

    #[test]
    fn flat_market_uses_zero_loss_sentinel() {
        let mut rsi = WilderRsi::new(14);
        let v = feed(&mut rsi, &vec![100.0; 40]);
        // No gains and no losses: the avg_loss == 0 sentinel applies.
        let expected = 100.0 - 100.0 / 101.0;
        assert!((v - expected).abs() < 1e-9, "got {v}");
    }

    #[test]
    fn always_in_range() {
        let closes = vec![
            44.34, 44.09, 44.15, 43.61, 44.33, 44.83, 45.10, 45.42, 45.84, 46.08, 45.89, 46.03,
            44.18, 44.22, 44.57, 43.42, 42.66, 43.13, 44.02, 45.50,
        ];
        let mut rsi = WilderRsi::new(14);
        for &c in &closes {
            let v = rsi.update(c);
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }

    #[test]
    fn replay_is_deterministic() {
        let closes: Vec<f64> = (0..60).map(|i| 100.0 + ((i * 7) % 13) as f64).collect();
        let mut a = WilderRsi::new(14);
        let mut b = WilderRsi::new(14);
        let va = feed(&mut a, &closes);
        let vb = feed(&mut b, &closes);
        assert_eq!(va, vb);
    }
}
