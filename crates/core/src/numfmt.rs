//! C-style `%.<precision>g` formatting for floating point values.
//!
//! Reals are rendered this way both when converting a value to text and when
//! emitting a real literal into filter text, so that a value read back by a
//! source layer's filter compiler compares equal to the original.

use alloc::format;
use alloc::string::{String, ToString};

/// Formats `value` like C's `printf("%.*g", precision, value)`.
///
/// ```
/// use featql_core::numfmt::format_g;
/// assert_eq!(format_g(3.5, 16), "3.5");
/// assert_eq!(format_g(1e20, 16), "1e+20");
/// assert_eq!(format_g(0.0001, 15), "0.0001");
/// ```
pub fn format_g(value: f64, precision: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".to_string() } else { "0".to_string() };
    }

    let precision = precision.max(1);
    let sci = format!("{:.*e}", precision - 1, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = strip_fraction_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        let magnitude = exponent.unsigned_abs();
        if magnitude < 10 {
            format!("{}e{}0{}", mantissa, sign, magnitude)
        } else {
            format!("{}e{}{}", mantissa, sign, magnitude)
        }
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        let fixed = format!("{:.*}", decimals, value);
        strip_fraction_zeros(&fixed).to_string()
    }
}

fn strip_fraction_zeros(text: &str) -> &str {
    if !text.contains('.') {
        return text;
    }
    let trimmed = text.trim_end_matches('0');
    trimmed.strip_suffix('.').unwrap_or(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_values() {
        assert_eq!(format_g(10.0, 16), "10");
        assert_eq!(format_g(-42.0, 16), "-42");
        assert_eq!(format_g(0.0, 16), "0");
    }

    #[test]
    fn test_fractional_values() {
        assert_eq!(format_g(0.1, 16), "0.1");
        assert_eq!(format_g(2.5, 15), "2.5");
        assert_eq!(format_g(1.0 / 3.0, 16), "0.3333333333333333");
    }

    #[test]
    fn test_scientific_values() {
        assert_eq!(format_g(1e20, 16), "1e+20");
        assert_eq!(format_g(1.5e-7, 16), "1.5e-07");
        assert_eq!(format_g(-2.25e100, 16), "-2.25e+100");
    }

    #[test]
    fn test_special_values() {
        assert_eq!(format_g(f64::NAN, 16), "nan");
        assert_eq!(format_g(f64::INFINITY, 16), "inf");
        assert_eq!(format_g(f64::NEG_INFINITY, 16), "-inf");
    }
}
