/// Standard juice on a spread bet, in American odds
pub const STANDARD_JUICE: i32 = -110;

/// Every 20 points of juice away from -110...
pub const JUICE_POINTS_PER_STEP: f64 = 20.0;

/// ...is worth about 0.1 points of spread
pub const SPREAD_POINTS_PER_STEP: f64 = 0.1;

/// Convert decimal odds to American odds
/// 2.50 -> +150, 1.91 -> -110
///
/// Returns `None` for prices at or below 1.0, which have no American equivalent,
/// and for prices so far from even that the line does not fit in an `i32`.
pub fn decimal_to_american(decimal: f64) -> Option<i32> {
    if !decimal.is_finite() || decimal <= 1.0 {
        return None;
    }

    let american = if decimal >= 2.0 {
        (decimal - 1.0) * 100.0
    } else {
        -100.0 / (decimal - 1.0)
    };

    // Halves round up (toward positive infinity)
    let rounded = (american + 0.5).floor();
    if !rounded.is_finite() || rounded > i32::MAX as f64 || rounded < i32::MIN as f64 {
        return None;
    }

    Some(rounded as i32)
}

/// Shift a spread by how far its price sits from standard juice, so lines
/// priced differently across books can be compared point for point.
///
/// A -3.0 line at -110 stays -3.0; the same line at -130 is worth -3.1.
pub fn juice_adjusted_spread(spread: f64, decimal_price: f64) -> Option<f64> {
    let american = decimal_to_american(decimal_price)?;
    let juice_diff = american as f64 - STANDARD_JUICE as f64;
    let point_adjustment = (juice_diff / JUICE_POINTS_PER_STEP) * SPREAD_POINTS_PER_STEP;

    Some(spread + point_adjustment)
}

/// Price in decimal odds that corresponds to standard -110 juice
pub fn standard_juice_decimal() -> f64 {
    1.0 + 100.0 / (-STANDARD_JUICE) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decimal_to_american() {
        assert_eq!(decimal_to_american(2.5), Some(150));
        assert_eq!(decimal_to_american(2.0), Some(100));
        assert_eq!(decimal_to_american(1.5), Some(-200));
        assert_eq!(decimal_to_american(1.91), Some(-110));
        assert_eq!(decimal_to_american(1.95), Some(-105));
    }

    #[test]
    fn test_decimal_to_american_sign() {
        // Underdog prices are never below +100
        let mut price = 2.0;
        while price < 20.0 {
            assert!(decimal_to_american(price).unwrap() >= 100, "price {}", price);
            price += 0.037;
        }

        // Favorite prices are always negative
        let mut price = 1.001;
        while price < 2.0 {
            assert!(decimal_to_american(price).unwrap() < 0, "price {}", price);
            price += 0.013;
        }
    }

    #[test]
    fn test_decimal_to_american_rejects_invalid_prices() {
        assert_eq!(decimal_to_american(1.0), None);
        assert_eq!(decimal_to_american(0.5), None);
        assert_eq!(decimal_to_american(-2.0), None);
        assert_eq!(decimal_to_american(f64::NAN), None);
        assert_eq!(juice_adjusted_spread(-3.0, 1.0), None);
    }

    #[test]
    fn test_extreme_prices_do_not_overflow() {
        // Still passes ingest validation, but the line is off the i32 scale
        assert_eq!(decimal_to_american(3.0e7), None);
        assert_eq!(juice_adjusted_spread(-3.0, 3.0e7), None);
        assert_eq!(decimal_to_american(1.0 + 1e-12), None);
        assert_eq!(juice_adjusted_spread(-3.0, 1.0 + 1e-12), None);

        // Largest representable underdog still adjusts without wrapping
        let american = decimal_to_american(2.0e7).unwrap();
        assert_eq!(american, 1_999_999_900);
        let adjusted = juice_adjusted_spread(0.0, 2.0e7).unwrap();
        assert!(adjusted > 0.0);
        assert!((adjusted - (american as f64 + 110.0) / 20.0 * 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_no_adjustment_at_standard_juice() {
        let price = standard_juice_decimal();
        assert_eq!(decimal_to_american(price), Some(STANDARD_JUICE));
        for spread in [-7.5, -3.0, 0.0, 2.5, 10.0] {
            let adjusted = juice_adjusted_spread(spread, price).unwrap();
            assert!((adjusted - spread).abs() < 1e-9);
        }
    }

    #[test]
    fn test_juice_adjusted_spread() {
        // -105 is 5 cents better than standard: +0.025 points
        let adjusted = juice_adjusted_spread(-2.5, 1.95).unwrap();
        assert!((adjusted - (-2.475)).abs() < 1e-9);

        // +100 is 210 cents from -110: +1.05 points
        let adjusted = juice_adjusted_spread(-3.0, 2.0).unwrap();
        assert!((adjusted - (-1.95)).abs() < 1e-9);

        // -130 is 20 cents worse: -0.1 points
        let adjusted = juice_adjusted_spread(3.5, 1.0 + 100.0 / 130.0).unwrap();
        assert!((adjusted - 3.4).abs() < 1e-9);
    }
}
