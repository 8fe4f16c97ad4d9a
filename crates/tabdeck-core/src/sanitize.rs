//! Client input sanitization.
//!
//! Incoming tabs arrive as loosely typed JSON. Sanitization never rejects a
//! whole request: malformed fields collapse to valid (possibly empty) values,
//! and only tabs missing a required key are dropped.

use serde_json::Value;

use crate::manifest::{Tab, TabType};

/// Maximum length of a tab id after filtering.
pub const MAX_ID_LEN: usize = 64;

/// Keys a raw tab must carry to be kept.
const REQUIRED_KEYS: [&str; 4] = ["id", "title", "type", "url"];

/// Strip characters outside `[A-Za-z0-9_-]` and truncate to [`MAX_ID_LEN`].
pub fn sanitize_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_ID_LEN)
        .collect()
}

/// Sanitize one raw tab.
///
/// Returns `None` when the value is not an object or lacks any of `id`,
/// `title`, `type`, `url`. A key present with a `null` value counts as
/// present and becomes an empty string.
pub fn sanitize_tab(raw: &Value) -> Option<Tab> {
    let obj = raw.as_object()?;
    if !REQUIRED_KEYS.iter().all(|key| obj.contains_key(*key)) {
        return None;
    }

    Some(Tab {
        id: sanitize_id(&stringify(&obj["id"])),
        title: stringify(&obj["title"]).trim().to_string(),
        tab_type: TabType::normalize(&stringify(&obj["type"])),
        url: stringify(&obj["url"]).trim().to_string(),
    })
}

/// Sanitize a raw tab list, dropping unusable entries and preserving order.
pub fn sanitize_tabs(raw: &[Value]) -> Vec<Tab> {
    raw.iter().filter_map(sanitize_tab).collect()
}

/// Integer-parse the client's `activeIndex`, falling back to 0.
///
/// - integers are taken as-is, finite floats are truncated
/// - strings use their leading `[+-]?[0-9]+` run after leading whitespace,
///   so `"3rd"` is 3
/// - anything else (absent, `null`, booleans, arrays, objects) is 0
pub fn parse_active_index(raw: Option<&Value>) -> i64 {
    match raw {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => leading_integer(s).unwrap_or(0),
        _ => 0,
    }
}

fn leading_integer(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => ("-", &s[1..]),
        Some(b'+') => ("", &s[1..]),
        _ => ("", s),
    };
    let digits_len = rest.bytes().take_while(u8::is_ascii_digit).count();
    if digits_len == 0 {
        return None;
    }
    format!("{sign}{}", &rest[..digits_len]).parse().ok()
}

/// Loose string coercion for client fields.
///
/// Numbers print without a trailing `.0`, arrays join their elements with
/// commas, and objects collapse to `[object Object]`.
fn stringify(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) => number_to_string(f),
            _ => n.to_string(),
        },
        Value::Array(items) => items.iter().map(stringify).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn number_to_string(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    let magnitude = f.abs();
    if (1e-6..1e21).contains(&magnitude) {
        return f.to_string();
    }
    // Exponent form carries an explicit sign: 1e+21, 1.5e-7.
    let text = format!("{f:e}");
    match text.split_once('e') {
        Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
        _ => text,
    }
}
