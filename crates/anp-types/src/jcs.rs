//! JSON Canonicalization Scheme (JCS, RFC 8785).
//!
//! Every signature in ANP is computed over the canonical byte form of a JSON
//! value, so two independent implementations must produce byte-identical
//! output for the same data. RFC 8785 fixes the three degrees of freedom JSON
//! leaves open:
//!
//! - **Whitespace**: none.
//! - **Member order**: object keys sorted by their UTF-16 code units.
//! - **Numbers**: the shortest form mandated by ECMA-262 for `Number` to
//!   string conversion (integral doubles print without a fraction, the
//!   exponent threshold is 10^21, small magnitudes switch to exponential
//!   below 10^-6).
//!
//! Array element order is significant and preserved as-is.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//!
//! let value = json!({"b": 1, "a": [3, 2, 1]});
//! let bytes = anp_types::jcs::canonicalize(&value).unwrap();
//! assert_eq!(bytes, br#"{"a":[3,2,1],"b":1}"#);
//! ```

use serde_json::Value;
use std::fmt::Write as _;

/// Largest integer magnitude an IEEE 754 double represents exactly.
const MAX_SAFE_INTEGER: u64 = 9_007_199_254_740_991;

/// Errors produced during canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanonicalizeError {
    /// The value contains a number that is NaN or infinite. JSON has no
    /// representation for these, and RFC 8785 forbids inventing one.
    #[error("non-finite number cannot be canonicalized")]
    NonFinite,
    /// The value contains data outside the RFC 8785 domain, such as an
    /// integer that cannot be represented exactly as an IEEE 754 double.
    #[error("unsupported JSON value: {0}")]
    UnsupportedType(String),
}

/// Serializes a JSON value to its RFC 8785 canonical bytes.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>, CanonicalizeError> {
    let mut out = Vec::with_capacity(128);
    write_value(value, &mut out)?;
    Ok(out)
}

/// Serializes a JSON value to its RFC 8785 canonical form as a `String`.
pub fn canonicalize_to_string(value: &Value) -> Result<String, CanonicalizeError> {
    let bytes = canonicalize(value)?;
    // write_value only ever emits valid UTF-8.
    Ok(String::from_utf8(bytes).expect("canonical output is UTF-8"))
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), CanonicalizeError> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(number) => {
            let formatted = format_number(number)?;
            out.extend_from_slice(formatted.as_bytes());
        }
        Value::String(string) => write_string(string, out),
        Value::Array(items) => {
            out.push(b'[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort_by(|a, b| utf16_cmp(a.as_str(), b.as_str()));
            out.push(b'{');
            for (index, key) in keys.iter().enumerate() {
                if index > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_value(&map[key.as_str()], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

/// RFC 8785 sorts keys by UTF-16 code units, not Unicode scalar values.
/// The two orders differ for supplementary-plane characters, which encode
/// as surrogate pairs starting below U+E000.
fn utf16_cmp(a: &str, b: &str) -> std::cmp::Ordering {
    a.encode_utf16().cmp(b.encode_utf16())
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{0008}' => out.extend_from_slice(b"\\b"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\u{000C}' => out.extend_from_slice(b"\\f"),
            '\r' => out.extend_from_slice(b"\\r"),
            c if (c as u32) < 0x20 => {
                let mut escaped = String::with_capacity(6);
                write!(escaped, "\\u{:04x}", c as u32).expect("write to String");
                out.extend_from_slice(escaped.as_bytes());
            }
            c => {
                let mut buffer = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buffer).as_bytes());
            }
        }
    }
    out.push(b'"');
}

fn format_number(number: &serde_json::Number) -> Result<String, CanonicalizeError> {
    if let Some(unsigned) = number.as_u64() {
        if unsigned <= MAX_SAFE_INTEGER {
            return Ok(unsigned.to_string());
        }
        return Err(CanonicalizeError::UnsupportedType(format!(
            "integer {unsigned} exceeds IEEE 754 double precision"
        )));
    }
    if let Some(signed) = number.as_i64() {
        if signed.unsigned_abs() <= MAX_SAFE_INTEGER {
            return Ok(signed.to_string());
        }
        return Err(CanonicalizeError::UnsupportedType(format!(
            "integer {signed} exceeds IEEE 754 double precision"
        )));
    }
    let float = number
        .as_f64()
        .ok_or_else(|| CanonicalizeError::UnsupportedType("unrepresentable number".into()))?;
    if !float.is_finite() {
        return Err(CanonicalizeError::NonFinite);
    }
    Ok(es6_number(float))
}

/// Formats a finite double per ECMA-262 `Number::toString` (section
/// 6.1.6.1.20), which RFC 8785 adopts verbatim.
///
/// `{:e}` gives us the shortest round-trip digit string plus a decimal
/// exponent; the remainder is the ECMA positional/exponential layout rules.
fn es6_number(value: f64) -> String {
    if value == 0.0 {
        // Covers -0.0, which ECMA prints as "0".
        return "0".to_string();
    }
    let scientific = format!("{value:e}");
    let (sign, body) = match scientific.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", scientific.as_str()),
    };
    let (mantissa, exponent) = body.split_once('e').expect("{:e} output contains 'e'");
    let exponent: i32 = exponent.parse().expect("{:e} exponent is an integer");
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let digit_count = digits.len() as i32;
    // Position of the decimal point relative to the digit string: the value
    // equals 0.<digits> * 10^point.
    let point = exponent + 1;

    let body = if (1..=21).contains(&point) {
        if digit_count <= point {
            let zeros = (point - digit_count) as usize;
            format!("{digits}{}", "0".repeat(zeros))
        } else {
            let split = point as usize;
            format!("{}.{}", &digits[..split], &digits[split..])
        }
    } else if (-5..=0).contains(&point) {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let exp = point - 1;
        let exp_sign = if exp < 0 { '-' } else { '+' };
        let head = &digits[..1];
        let tail = &digits[1..];
        if tail.is_empty() {
            format!("{head}e{exp_sign}{}", exp.abs())
        } else {
            format!("{head}.{tail}e{exp_sign}{}", exp.abs())
        }
    };
    format!("{sign}{body}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(value: Value) -> String {
        canonicalize_to_string(&value).unwrap()
    }

    #[test]
    fn sorts_object_keys() {
        assert_eq!(canon(json!({"b": 1, "a": [3, 2, 1]})), r#"{"a":[3,2,1],"b":1}"#);
    }

    #[test]
    fn preserves_array_order() {
        assert_eq!(canon(json!([3, 1, 2])), "[3,1,2]");
    }

    #[test]
    fn no_insignificant_whitespace() {
        assert_eq!(
            canon(json!({"nested": {"x": [true, false, null]}})),
            r#"{"nested":{"x":[true,false,null]}}"#
        );
    }

    #[test]
    fn integral_doubles_print_as_integers() {
        assert_eq!(canon(json!(120.0)), "120");
        assert_eq!(canon(json!(-0.0)), "0");
        assert_eq!(canon(json!(1.0)), "1");
    }

    #[test]
    fn fractional_numbers_shortest_form() {
        assert_eq!(canon(json!(0.5)), "0.5");
        assert_eq!(canon(json!(120.5)), "120.5");
        assert_eq!(canon(json!(0.000001)), "0.000001");
    }

    #[test]
    fn exponent_thresholds_follow_ecma() {
        assert_eq!(canon(json!(1e21)), "1e+21");
        assert_eq!(canon(json!(1e20)), "100000000000000000000");
        assert_eq!(canon(json!(1e-7)), "1e-7");
        assert_eq!(canon(json!(-2.5e30)), "-2.5e+30");
    }

    #[test]
    fn rfc8785_number_vectors() {
        // Appendix-style vectors from the JCS reference material.
        assert_eq!(canon(json!(333333333.3333333)), "333333333.3333333");
        assert_eq!(canon(json!(9007199254740991i64)), "9007199254740991");
        assert_eq!(canon(json!(9.999999999999997e22)), "9.999999999999997e+22");
    }

    #[test]
    fn rejects_unsafe_integers() {
        let err = canonicalize(&json!(9007199254740993u64)).unwrap_err();
        assert!(matches!(err, CanonicalizeError::UnsupportedType(_)));
    }

    #[test]
    fn string_escaping_is_minimal() {
        assert_eq!(canon(json!("a\"b\\c")), r#""a\"b\\c""#);
        assert_eq!(canon(json!("\u{0008}\t\n\u{000C}\r")), r#""\b\t\n\f\r""#);
        assert_eq!(canon(json!("\u{001F}")), "\"\\u001f\"");
        // Non-ASCII passes through as raw UTF-8.
        assert_eq!(canon(json!("€")), "\"€\"");
    }

    #[test]
    fn utf16_key_order_for_supplementary_plane() {
        // U+1D11E (𝄞) encodes as the surrogate pair D834 DD1E, which sorts
        // before U+E000-range characters under UTF-16 code-unit order.
        let value = json!({"\u{E000}": 1, "\u{1D11E}": 2});
        assert_eq!(canon(value), "{\"\u{1D11E}\":2,\"\u{E000}\":1}");
    }

    #[test]
    fn canonical_form_is_a_fixed_point() {
        let value = json!({
            "z": {"b": 0.5, "a": [1, 2.25, "x"]},
            "a": null,
            "m": [true, {"k": "v"}]
        });
        let once = canonicalize(&value).unwrap();
        let reparsed: Value = serde_json::from_slice(&once).unwrap();
        let twice = canonicalize(&reparsed).unwrap();
        assert_eq!(once, twice);
    }
}
