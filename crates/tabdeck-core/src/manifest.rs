//! Manifest and tab types.
//!
//! A [`Manifest`] is built fresh for every save and serialized once. Stored
//! manifests are read back as raw JSON documents (they may have been written
//! by older tooling), so revision lookups on stored data go through
//! [`stored_rev`] rather than deserializing into [`Manifest`].

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ─────────────────────────────────────────────────────────────────────────────
// Tab
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of content a tab displays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabType {
    /// PDF document.
    Pdf,
    /// Image file.
    Image,
    /// Anything else, shown as a plain link.
    #[default]
    Link,
}

impl TabType {
    /// Wire name of the type.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Image => "image",
            Self::Link => "link",
        }
    }

    /// Map a client-supplied type name onto the closed set.
    ///
    /// Matching is case-insensitive. Unknown names become [`TabType::Link`].
    pub fn normalize(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "pdf" => Self::Pdf,
            "image" => Self::Image,
            _ => Self::Link,
        }
    }
}

impl std::fmt::Display for TabType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single content tab, in display order within its manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    /// Identifier restricted to `[A-Za-z0-9_-]`, at most 64 characters. May be empty.
    pub id: String,
    /// Display title, trimmed.
    pub title: String,
    /// Content kind.
    #[serde(rename = "type")]
    pub tab_type: TabType,
    /// Content location, trimmed but not validated.
    pub url: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Manifest
// ─────────────────────────────────────────────────────────────────────────────

/// The persisted tab manifest.
///
/// Field order is the serialized key order: `rev`, `activeIndex`, `tabs`,
/// `updatedAt`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Revision, starting at 1.
    pub rev: u64,
    /// Index of the tab shown first.
    pub active_index: i64,
    /// Tabs in display order.
    pub tabs: Vec<Tab>,
    /// RFC 3339 UTC write time with millisecond precision.
    pub updated_at: String,
}

impl Manifest {
    /// Build a manifest stamped with the current time.
    #[must_use]
    pub fn new(rev: u64, active_index: i64, tabs: Vec<Tab>) -> Self {
        Self {
            rev,
            active_index,
            tabs,
            updated_at: timestamp_now(),
        }
    }

    /// Serialize to the on-disk representation (two-space indented JSON).
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }
}

/// Current instant as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

// ─────────────────────────────────────────────────────────────────────────────
// Stored documents
// ─────────────────────────────────────────────────────────────────────────────

/// Read the `rev` of a stored manifest document with numeric coercion.
///
/// Accepts non-negative JSON numbers (fractions truncated) and numeric
/// strings. Returns `None` for anything else, including negative values.
pub fn stored_rev(doc: &Value) -> Option<u64> {
    match doc.get("rev")? {
        Value::Number(n) => n.as_u64().or_else(|| non_negative_trunc(n.as_f64()?)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>()
                .ok()
                .or_else(|| non_negative_trunc(s.parse::<f64>().ok()?))
        }
        _ => None,
    }
}

/// Revision for the next save given the previously stored document.
///
/// No previous document, or one without a usable `rev`, starts over at 1.
pub fn next_rev(previous: Option<&Value>) -> u64 {
    previous
        .and_then(stored_rev)
        .map_or(1, |rev| rev.saturating_add(1))
}

fn non_negative_trunc(value: f64) -> Option<u64> {
    (value.is_finite() && value >= 0.0).then(|| value.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Manifest {
        Manifest {
            rev: 3,
            active_index: 1,
            tabs: vec![Tab {
                id: "intro".into(),
                title: "Intro".into(),
                tab_type: TabType::Pdf,
                url: "/assets/intro.pdf".into(),
            }],
            updated_at: "2024-01-02T03:04:05.678Z".into(),
        }
    }

    #[test]
    fn serialized_layout_is_stable() {
        let bytes = sample().to_json_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        insta::assert_snapshot!(text, @r#"
        {
          "rev": 3,
          "activeIndex": 1,
          "tabs": [
            {
              "id": "intro",
              "title": "Intro",
              "type": "pdf",
              "url": "/assets/intro.pdf"
            }
          ],
          "updatedAt": "2024-01-02T03:04:05.678Z"
        }
        "#);
    }

    #[test]
    fn deserializes_what_it_writes() {
        let bytes = sample().to_json_bytes().unwrap();
        let back: Manifest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn timestamp_has_millis_and_z_suffix() {
        let ts = timestamp_now();
        assert!(ts.ends_with('Z'), "{ts}");
        assert_eq!(ts.len(), "2024-01-02T03:04:05.678Z".len(), "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn tab_type_normalize() {
        assert_eq!(TabType::normalize("pdf"), TabType::Pdf);
        assert_eq!(TabType::normalize("IMAGE"), TabType::Image);
        assert_eq!(TabType::normalize("Link"), TabType::Link);
        assert_eq!(TabType::normalize("video"), TabType::Link);
        assert_eq!(TabType::normalize(""), TabType::Link);
        assert_eq!(TabType::normalize(" pdf"), TabType::Link);
    }

    #[test]
    fn stored_rev_coercion() {
        assert_eq!(stored_rev(&json!({"rev": 7})), Some(7));
        assert_eq!(stored_rev(&json!({"rev": 2.9})), Some(2));
        assert_eq!(stored_rev(&json!({"rev": "12"})), Some(12));
        assert_eq!(stored_rev(&json!({"rev": " 4 "})), Some(4));
        assert_eq!(stored_rev(&json!({"rev": -3})), None);
        assert_eq!(stored_rev(&json!({"rev": "abc"})), None);
        assert_eq!(stored_rev(&json!({"rev": null})), None);
        assert_eq!(stored_rev(&json!({"rev": [1]})), None);
        assert_eq!(stored_rev(&json!({})), None);
        assert_eq!(stored_rev(&json!([1, 2])), None);
    }

    #[test]
    fn next_rev_starts_at_one() {
        assert_eq!(next_rev(None), 1);
        assert_eq!(next_rev(Some(&json!({"tabs": []}))), 1);
        assert_eq!(next_rev(Some(&json!({"rev": "x"}))), 1);
    }

    #[test]
    fn next_rev_increments() {
        assert_eq!(next_rev(Some(&json!({"rev": 1}))), 2);
        assert_eq!(next_rev(Some(&json!({"rev": "41"}))), 42);
    }

    #[test]
    fn next_rev_saturates() {
        assert_eq!(next_rev(Some(&json!({"rev": u64::MAX}))), u64::MAX);
    }
}
