//! Human readable rendering of base-unit amounts.
//!
//! Amounts travel through the engine as integers in base units. Operators
//! read and type them as decimals, so conversion goes through
//! [`rust_decimal::Decimal`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Render `amount` base units with `decimals` fractional digits, trailing zeros trimmed
pub fn format_units(amount: u128, decimals: u32) -> String {
    if let Ok(value) = i128::try_from(amount) {
        if let Ok(decimal) = Decimal::try_from_i128_with_scale(value, decimals) {
            return decimal.normalize().to_string();
        }
    }
    // Outside the 96-bit mantissa: fall back to integer splitting
    let scale = 10u128.pow(decimals);
    let whole = amount / scale;
    let frac = amount % scale;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac.trim_end_matches('0'))
}

/// Render an 18-decimal USD value with two decimals
pub fn format_usd(usd: u128) -> String {
    let text = format_units(usd, crate::utils::constants::USD_DECIMALS);
    match Decimal::from_str(&text) {
        Ok(decimal) => format!("${}", decimal.round_dp(2)),
        Err(_) => format!("${}", text),
    }
}

/// Render a basis-point value as a percentage
pub fn format_bps(bps: u128) -> String {
    format!("{}%", format_units(bps, 2))
}

/// Parse a decimal string such as `"12.5"` into base units
pub fn parse_units(text: &str, decimals: u32) -> Result<u128> {
    let invalid = |reason: String| Error::InvalidParameter {
        name: "amount".into(),
        reason,
    };
    let decimal = Decimal::from_str(text.trim()).map_err(|e| invalid(e.to_string()))?;
    if decimal.is_sign_negative() {
        return Err(invalid("amount cannot be negative".into()));
    }
    if decimal.scale() > decimals {
        return Err(invalid(format!("more than {} decimal places", decimals)));
    }
    let mantissa = decimal.mantissa().to_u128().ok_or_else(|| invalid("out of range".into()))?;
    let factor = 10u128.pow(decimals - decimal.scale());
    mantissa.checked_mul(factor).ok_or(Error::Overflow {
        operation: format!("parse_units({})", text),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_units() {
        assert_eq!(format_units(1_500_000, 6), "1.5");
        assert_eq!(format_units(1_000_000, 6), "1");
        assert_eq!(format_units(0, 18), "0");
        assert_eq!(format_units(u128::MAX, 0), u128::MAX.to_string());
    }

    #[test]
    fn test_format_usd_and_bps() {
        assert_eq!(format_usd(1_234_500_000_000_000_000), "$1.23");
        assert_eq!(format_bps(30), "0.3%");
        assert_eq!(format_bps(11_000), "110%");
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse_units("1.5", 6).unwrap(), 1_500_000);
        assert_eq!(parse_units("1000", 6).unwrap(), 1_000_000_000);
        assert!(parse_units("-1", 6).is_err());
        assert!(parse_units("0.0000001", 6).is_err());
        assert!(parse_units("abc", 6).is_err());
    }
}
