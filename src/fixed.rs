/// Rounds half away from zero to `places` decimals.
pub fn round_to(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let scale = 10f64.powi(places as i32);
    let rounded = (value * scale).round() / scale;
    // Keep "-0.00" out of rendered output.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Fixed-precision rendering of `value`, e.g. `to_fixed(2.345, 2) == "2.35"`.
pub fn to_fixed(value: f64, places: u32) -> String {
    format!("{:.*}", places as usize, round_to(value, places))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(to_fixed(0.125, 2), "0.13");
        assert_eq!(to_fixed(-0.125, 2), "-0.13");
        assert_eq!(to_fixed(66.666_666, 1), "66.7");
    }

    #[test]
    fn never_renders_negative_zero() {
        assert_eq!(to_fixed(-0.001, 2), "0.00");
    }

    #[test]
    fn non_finite_values_collapse_to_zero() {
        assert_eq!(to_fixed(f64::NAN, 1), "0.0");
        assert_eq!(round_to(f64::INFINITY, 2), 0.0);
    }
}
