// =============================================================================
// Bollinger Bands
// =============================================================================
//
// Bollinger Bands consist of a middle band (SMA), an upper band (SMA + k*σ),
// and a lower band (SMA - k*σ), with σ the population standard deviation over
// the look-back window. %B locates the last price within the bands:
//
//   %B = (price - lower) / (upper - lower), clamped to [0, 1]
//
// A zero-width band (flat window) defines %B as 0.5 — price sits exactly on
// the middle band.
// =============================================================================

/// Result of a Bollinger Band calculation.
#[derive(Debug, Clone, Copy)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    /// Position of `last_price` within the bands, in [0, 1].
    pub percent_b: f64,
}

/// Calculate Bollinger Bands over the trailing `period` prices.
///
/// When fewer than `period` prices exist the whole available window is used;
/// with a single sample the bands collapse onto the price and %B is 0.5.
pub fn calculate_bollinger(
    prices: &[f64],
    period: usize,
    num_std: f64,
    last_price: f64,
) -> BollingerBands {
    let window = if prices.len() > period {
        &prices[prices.len() - period..]
    } else {
        prices
    };

    if window.is_empty() {
        return BollingerBands {
            upper: last_price,
            middle: last_price,
            lower: last_price,
            percent_b: 0.5,
        };
    }

    let n = window.len() as f64;
    let middle = window.iter().sum::<f64>() / n;
    let variance = window.iter().map(|x| (x - middle).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    let upper = middle + num_std * std_dev;
    let lower = middle - num_std * std_dev;

    let percent_b = if std_dev == 0.0 {
        0.5
    } else {
        ((last_price - lower) / (upper - lower)).clamp(0.0, 1.0)
    };

    BollingerBands {
        upper,
        middle,
        lower,
        percent_b,
    }
}
