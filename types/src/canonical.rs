//! Canonical JSON encoding.
//!
//! Signatures are computed over bytes, so two logically-equal commands must
//! encode to identical bytes regardless of how they were constructed. The
//! rules: object keys in lexicographic byte order (recursively), array order
//! preserved, no insignificant whitespace, deterministic string escapes.

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("number has no canonical form: {0}")]
    UnrepresentableNumber(String),
}

/// Encode a value into its canonical byte representation.
pub fn encode(value: &Value) -> Result<Vec<u8>, Error> {
    let mut out = Vec::with_capacity(128);
    write_value(value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> Result<(), Error> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(true) => out.extend_from_slice(b"true"),
        Value::Bool(false) => out.extend_from_slice(b"false"),
        Value::Number(number) => {
            if let Some(i) = number.as_i64() {
                out.extend_from_slice(i.to_string().as_bytes());
            } else if let Some(u) = number.as_u64() {
                out.extend_from_slice(u.to_string().as_bytes());
            } else {
                match number.as_f64() {
                    // serde_json rejects non-finite floats at construction,
                    // so a canonical shortest-form rendering always exists.
                    Some(f) if f.is_finite() => {
                        out.extend_from_slice(f.to_string().as_bytes())
                    }
                    _ => return Err(Error::UnrepresentableNumber(number.to_string())),
                }
            }
        }
        Value::String(s) => write_string(s, out),
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            // Sort explicitly rather than relying on the map's iteration
            // order, which changes with serde_json's `preserve_order` flag.
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

            out.push(b'{');
            for (i, (key, item)) in entries.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_string(key, out);
                out.push(b':');
                write_value(item, out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

fn write_string(s: &str, out: &mut Vec<u8>) {
    out.push(b'"');
    for c in s.chars() {
        match c {
            '"' => out.extend_from_slice(b"\\\""),
            '\\' => out.extend_from_slice(b"\\\\"),
            '\u{08}' => out.extend_from_slice(b"\\b"),
            '\t' => out.extend_from_slice(b"\\t"),
            '\n' => out.extend_from_slice(b"\\n"),
            '\u{0c}' => out.extend_from_slice(b"\\f"),
            '\r' => out.extend_from_slice(b"\\r"),
            c if (c as u32) < 0x20 => {
                out.extend_from_slice(format!("\\u{:04x}", c as u32).as_bytes());
            }
            c => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    out.push(b'"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    #[test]
    fn encoding_is_stable_over_insertion_order() {
        let mut forward = Map::new();
        forward.insert("alpha".into(), json!(1));
        forward.insert("beta".into(), json!([1, 2, 3]));
        forward.insert("gamma".into(), json!({"x": true, "y": null}));

        let mut reverse = Map::new();
        reverse.insert("gamma".into(), json!({"y": null, "x": true}));
        reverse.insert("beta".into(), json!([1, 2, 3]));
        reverse.insert("alpha".into(), json!(1));

        let a = encode(&Value::Object(forward)).unwrap();
        let b = encode(&Value::Object(reverse)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn any_change_changes_the_output() {
        let base = encode(&json!({"k": "v", "n": 7})).unwrap();
        assert_ne!(base, encode(&json!({"k": "v", "n": 8})).unwrap());
        assert_ne!(base, encode(&json!({"k": "w", "n": 7})).unwrap());
        assert_ne!(base, encode(&json!({"j": "v", "n": 7})).unwrap());
    }

    #[test]
    fn array_order_is_significant() {
        let a = encode(&json!([1, 2])).unwrap();
        let b = encode(&json!([2, 1])).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn keys_are_sorted_and_output_is_compact() {
        let bytes = encode(&json!({"b": 2, "a": [true, null], "c": "x"})).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":[true,null],"b":2,"c":"x"}"#
        );
    }

    #[test]
    fn strings_escape_deterministically() {
        let bytes = encode(&json!("a\"b\\c\nd\u{01}")).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "\"a\\\"b\\\\c\\nd\\u0001\""
        );
    }

    #[test]
    fn nested_objects_sort_recursively() {
        let a = encode(&json!({"outer": {"z": 1, "a": 2}})).unwrap();
        let b = encode(&json!({"outer": {"a": 2, "z": 1}})).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            String::from_utf8(a).unwrap(),
            r#"{"outer":{"a":2,"z":1}}"#
        );
    }
}
