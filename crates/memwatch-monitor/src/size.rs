//! Human-readable byte sizes.
//!
//! Binary units only: `1K` is 1024 bytes, `1M` is 1024², and so on. Parsing
//! accepts a bare integer (`"1048576"`) or a number followed by a unit
//! letter (`"1M"`, `"1.5g"`). Formatting renders the largest unit that fits
//! and truncates the value to an integer, so `10000` renders as `9K`.
//!
//! ```rust
//! use memwatch_monitor::size;
//!
//! assert_eq!(size::parse("1G")?, 1_073_741_824);
//! assert_eq!(size::format(1_073_741_824), "1G");
//! assert_eq!(size::format(10_000), "9K");
//! # Ok::<(), memwatch_monitor::SizeError>(())
//! ```

use crate::error::SizeError;

const UNITS: [char; 9] = ['B', 'K', 'M', 'G', 'T', 'P', 'E', 'Z', 'Y'];

/// Parses a size string into bytes.
///
/// # Errors
///
/// Returns [`SizeError`] for empty input, an unknown unit letter, a
/// malformed or negative number, or a result that overflows `u64`.
pub fn parse(input: &str) -> Result<u64, SizeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(SizeError::Empty);
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed
            .parse::<u64>()
            .map_err(|_| SizeError::OutOfRange(input.to_string()));
    }

    let mut chars = trimmed.chars();
    let unit = chars.next_back().map_or('?', |c| c.to_ascii_uppercase());
    let number = chars.as_str();

    let exponent = UNITS
        .iter()
        .position(|u| *u == unit)
        .ok_or_else(|| SizeError::UnknownUnit {
            input: input.to_string(),
            unit: unit.to_string(),
        })?;

    let value: f64 = number
        .trim()
        .parse()
        .map_err(|_| SizeError::InvalidNumber(input.to_string()))?;
    if !value.is_finite() || value < 0.0 {
        return Err(SizeError::InvalidNumber(input.to_string()));
    }

    let bytes = value * 2f64.powi(10 * exponent as i32);
    // 2^64 is exactly representable; anything at or above it does not fit.
    if bytes >= 18_446_744_073_709_551_616.0 {
        return Err(SizeError::OutOfRange(input.to_string()));
    }

    Ok(bytes as u64)
}

/// Renders a byte count in its canonical short form (`1G`, `9K`, `512B`).
#[must_use]
pub fn format(bytes: u64) -> String {
    for (exponent, unit) in UNITS.iter().enumerate().skip(1).rev() {
        let shift = 10 * exponent as u32;
        let Some(prefix) = 1u64.checked_shl(shift) else {
            continue;
        };
        if bytes >= prefix {
            return format!("{}{}", bytes / prefix, unit);
        }
    }
    format!("{bytes}B")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_integer() {
        assert_eq!(parse("0").unwrap(), 0);
        assert_eq!(parse("1048576").unwrap(), 1_048_576);
        assert_eq!(parse(" 42 ").unwrap(), 42);
    }

    #[test]
    fn test_parse_units() {
        assert_eq!(parse("1K").unwrap(), 1024);
        assert_eq!(parse("1M").unwrap(), 1_048_576);
        assert_eq!(parse("1G").unwrap(), 1_073_741_824);
        assert_eq!(parse("2t").unwrap(), 2 * (1u64 << 40));
        assert_eq!(parse("10B").unwrap(), 10);
    }

    #[test]
    fn test_parse_fractional() {
        assert_eq!(parse("1.5K").unwrap(), 1536);
        assert_eq!(parse("0.5M").unwrap(), 524_288);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse(""), Err(SizeError::Empty));
        assert!(matches!(parse("12Q"), Err(SizeError::UnknownUnit { .. })));
        assert!(matches!(parse("xM"), Err(SizeError::InvalidNumber(_))));
        assert!(matches!(parse("-1M"), Err(SizeError::InvalidNumber(_))));
        assert!(matches!(parse("M"), Err(SizeError::InvalidNumber(_))));
    }

    #[test]
    fn test_parse_overflow() {
        assert!(matches!(parse("16E"), Err(SizeError::OutOfRange(_))));
        assert!(matches!(parse("1Z"), Err(SizeError::OutOfRange(_))));
        assert!(matches!(
            parse("99999999999999999999999"),
            Err(SizeError::OutOfRange(_))
        ));
        assert_eq!(parse("15E").unwrap(), 15 * (1u64 << 60));
    }

    #[test]
    fn test_format_truncates() {
        assert_eq!(format(10_000), "9K");
        assert_eq!(format(100_001_221), "95M");
        assert_eq!(format(1_048_576), "1M");
        assert_eq!(format(1023), "1023B");
        assert_eq!(format(0), "0B");
        assert_eq!(format(u64::MAX), "15E");
    }

    #[test]
    fn test_canonical_forms_survive_parse_then_format() {
        for text in ["1K", "1M", "1G", "3T", "7P", "2E"] {
            assert_eq!(format(parse(text).unwrap()), text);
        }
    }
}
