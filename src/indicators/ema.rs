// =============================================================================
// Exponential Moving Average (EMA) — streaming accumulator
// =============================================================================
//
// EMA gives more weight to recent prices, making it more responsive to new
// information than the Simple Moving Average (SMA).
//
// Formula:
//   multiplier = 2 / (period + 1)
//   EMA_t      = price_t * multiplier + EMA_{t-1} * (1 - multiplier)
//
// The very first value seeds the accumulator with the raw price itself (a
// k-less bootstrap). This warm-up convention is part of the engine's contract:
// changing it shifts every downstream MACD and signal value.
// =============================================================================

/// Streaming EMA accumulator. Feed one value per tick via [`Ema::update`].
///
/// The accumulator depends on the full history of inputs, not just a rolling
/// window; it is never reset except on process restart.
#[derive(Debug, Clone)]
pub struct Ema {
    multiplier: f64,
    value: Option<f64>,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self {
            multiplier: 2.0 / (period as f64 + 1.0),
            value: None,
        }
    }

    /// Fold the next input into the accumulator and return the updated EMA.
    pub fn update(&mut self, price: f64) -> f64 {
        let next = match self.value {
            Some(prev) => price * self.multiplier + prev * (1.0 - self.multiplier),
            None => price,
        };
        self.value = Some(next);
        next
    }

    /// Current EMA value, or `None` before the first input.
    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_value_seeds_from_raw_price() {
        let mut ema = Ema::new(12);
        assert!(ema.value().is_none());
        assert!((ema.update(100.0) - 100.0).abs() < 1e-12);
    }

    #[test]
    fn known_recurrence() {
        // period 3 => multiplier = 0.5
        let mut ema = Ema::new(3);
        ema.update(10.0);
        let v = ema.update(20.0); // 20*0.5 + 10*0.5 = 15
        assert!((v - 15.0).abs() < 1e-12);
        let v = ema.update(30.0); // 30*0.5 + 15*0.5 = 22.5
        assert!((v - 22.5).abs() < 1e-12);
    }

    #[test]
    fn converges_to_constant_input() {
        // Contraction property: constant input P pulls the EMA to P.
        let mut ema = Ema::new(12);
        ema.update(50.0);
        let mut last = 0.0;
        for _ in 0..500 {
            last = ema.update(100.0);
        }
        assert!((last - 100.0).abs() < 1e-6, "EMA did not converge: {last}");
    }

    #[test]
    fn replay_is_deterministic() {
        let series: Vec<f64> = (1..=50).map(|i| 100.0 + (i as f64) * 0.3).collect();
        let mut a = Ema::new(12);
        let mut b = Ema::new(12);
        for &p in &series {
            a.update(p);
        }
        for &p in &series {
            b.update(p);
        }
        assert_eq!(a.value(), b.value());
    }
}
