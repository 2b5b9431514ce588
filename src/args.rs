//! Argument parsing helpers shared by the command implementations.
//!
//! Clients send every argument as a bulk string, so numbers and keywords
//! arrive as raw bytes. The parsers here follow Redis' strict rules: an
//! integer must be written in canonical decimal form (no sign prefix `+`, no
//! leading zeros, no surrounding whitespace), which is also the form that
//! decides whether a stored value can be kept integer-encoded.

use std::str;

/// The longest decimal representation of an `i64` (`-9223372036854775808`).
const MAX_I64_DIGITS: usize = 20;

/// Parses a canonical signed 64-bit decimal integer.
///
/// Returns `None` for anything [`format_i64`] would not produce, so
/// `parse_i64(s).map(format_i64) == Some(s)` whenever parsing succeeds.
pub fn parse_i64(payload: &[u8]) -> Option<i64> {
    if payload.is_empty() || payload.len() > MAX_I64_DIGITS {
        return None;
    }

    let digits = match payload {
        [b'-', rest @ ..] => rest,
        _ => payload,
    };

    match digits {
        [] => return None,
        [b'0'] if digits.len() != payload.len() => return None, // "-0"
        [b'0'] => return Some(0),
        [b'1'..=b'9', rest @ ..] if rest.iter().all(u8::is_ascii_digit) => {}
        _ => return None,
    }

    // The text is pure ASCII at this point.
    str::from_utf8(payload).ok()?.parse::<i64>().ok()
}

/// Parses a finite floating point operand.
///
/// NaN and infinities are rejected along with anything the standard float
/// grammar refuses, including surrounding whitespace.
pub fn parse_long_double(payload: &[u8]) -> Option<f64> {
    let text = str::from_utf8(payload).ok()?;
    if text.is_empty() || text.trim() != text {
        return None;
    }

    let value: f64 = text.parse().ok()?;
    value.is_finite().then_some(value)
}

/// Compares an operand against a keyword using ASCII case folding.
#[inline]
pub fn eq_ignore_case(payload: &[u8], keyword: &str) -> bool {
    payload.eq_ignore_ascii_case(keyword.as_bytes())
}

/// Renders an integer in the canonical form accepted by [`parse_i64`].
#[inline]
pub fn format_i64(value: i64) -> String {
    value.to_string()
}

/// Significant digits kept by [`format_float`], as C's `%.15g`.
const FLOAT_DIGITS: usize = 15;

/// Renders a float the way INCRBYFLOAT replies with it.
///
/// Rounds to 15 significant digits like `%.15g`, then drops trailing zeros
/// and a dangling decimal point, so `0.1 + 0.2` prints as `0.3`. Very large
/// or small magnitudes use exponent form (`1e+20`). Negative zero prints as
/// `0`.
pub fn format_float(value: f64) -> String {
    if value == 0.0 {
        return "0".to_string();
    }

    // The exponent after rounding decides between fixed and exponent form.
    let sci = format!("{:.*e}", FLOAT_DIGITS - 1, value);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= FLOAT_DIGITS as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        return format!(
            "{}e{}{:02}",
            trim_fraction(mantissa),
            sign,
            exp.unsigned_abs()
        );
    }

    let decimals = (FLOAT_DIGITS as i32 - 1 - exp) as usize;
    trim_fraction(&format!("{:.*}", decimals, value)).to_string()
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

/// Resolves a Redis style inclusive `[start, end]` range against a length.
///
/// Negative offsets count from the end. The start is clamped at zero and the
/// end into `[0, len - 1]`. Returns `None` when the effective range is empty.
pub fn normalize_range(start: i64, end: i64, len: usize) -> Option<(usize, usize)> {
    if len == 0 {
        return None;
    }

    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let mut start = if start < 0 {
        start.saturating_add(len)
    } else {
        start
    };
    let mut end = if end < 0 { end.saturating_add(len) } else { end };

    if start < 0 {
        start = 0;
    }
    if end < 0 {
        end = 0;
    }
    if end >= len {
        end = len - 1;
    }
    if start > end {
        return None;
    }

    Some((usize::try_from(start).ok()?, usize::try_from(end).ok()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_i64_canonical() {
        assert_eq!(parse_i64(b"0"), Some(0));
        assert_eq!(parse_i64(b"42"), Some(42));
        assert_eq!(parse_i64(b"-17"), Some(-17));
        assert_eq!(parse_i64(b"9223372036854775807"), Some(i64::MAX));
        assert_eq!(parse_i64(b"-9223372036854775808"), Some(i64::MIN));
    }

    #[test]
    fn test_parse_i64_rejects_non_canonical() {
        for input in [
            &b""[..],
            b"-",
            b"+1",
            b"01",
            b"-0",
            b"-01",
            b" 1",
            b"1 ",
            b"1.0",
            b"abc",
            b"9223372036854775808",
            b"-9223372036854775809",
            b"123456789012345678901",
        ] {
            assert_eq!(parse_i64(input), None, "{:?}", input);
        }
    }

    #[test]
    fn test_parse_long_double() {
        assert_eq!(parse_long_double(b"10.5"), Some(10.5));
        assert_eq!(parse_long_double(b"-3"), Some(-3.0));
        assert_eq!(parse_long_double(b"5.0e3"), Some(5000.0));
        assert_eq!(parse_long_double(b""), None);
        assert_eq!(parse_long_double(b"abc"), None);
        assert_eq!(parse_long_double(b" 1.5"), None);
        assert_eq!(parse_long_double(b"nan"), None);
        assert_eq!(parse_long_double(b"inf"), None);
        assert_eq!(parse_long_double(b"-infinity"), None);
    }

    #[test]
    fn test_eq_ignore_case() {
        assert!(eq_ignore_case(b"xor", "XOR"));
        assert!(eq_ignore_case(b"NoT", "not"));
        assert!(!eq_ignore_case(b"nott", "not"));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(10.5), "10.5");
        assert_eq!(format_float(3.0), "3");
        assert_eq!(format_float(-0.0), "0");
        assert_eq!(format_float(5000.0), "5000");
        assert_eq!(format_float(-1.25), "-1.25");
        assert_eq!(format_float(0.1 + 0.2), "0.3");
        assert_eq!(format_float(1.1 + 2.2), "3.3");
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(0.00001), "1e-05");
        assert_eq!(format_float(1e20), "1e+20");
        assert_eq!(format_float(123456789012345.0), "123456789012345");
        assert_eq!(format_float(-2.5e-7), "-2.5e-07");
    }

    #[test]
    fn test_normalize_range() {
        assert_eq!(normalize_range(0, -1, 5), Some((0, 4)));
        assert_eq!(normalize_range(-3, -1, 5), Some((2, 4)));
        assert_eq!(normalize_range(1, 100, 5), Some((1, 4)));
        assert_eq!(normalize_range(-100, 1, 5), Some((0, 1)));
        assert_eq!(normalize_range(3, 1, 5), None);
        assert_eq!(normalize_range(5, 10, 5), None);
        assert_eq!(normalize_range(0, 0, 0), None);
        assert_eq!(normalize_range(i64::MIN, i64::MAX, 3), Some((0, 2)));
    }
}
