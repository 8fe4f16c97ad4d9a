//! Save and load request handling.
//!
//! Transport-neutral: a front end deserializes the request body, calls
//! [`save`] or [`load`], and renders the returned value or
//! [`ApiError::body`] however its protocol requires.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tabdeck_core::Manifest;
use thiserror::Error;

use crate::errors::{ReadError, WriteError};
use crate::reader::ManifestReader;
use crate::writer::{FallbackInfo, FallbackKind, ManifestWriter, WriteOutcome};

// ─────────────────────────────────────────────────────────────────────────────
// Authorization
// ─────────────────────────────────────────────────────────────────────────────

/// Pre-check deciding whether a save may proceed.
pub trait Authorize: Send + Sync {
    /// Whether the presented PIN grants write access.
    fn authorize(&self, pin: Option<&str>) -> bool;
}

/// Accepts exactly one configured PIN.
#[derive(Clone)]
pub struct PinAuthorizer {
    pin: String,
}

impl PinAuthorizer {
    /// Authorizer for `pin`.
    pub fn new(pin: impl Into<String>) -> Self {
        Self { pin: pin.into() }
    }
}

impl std::fmt::Debug for PinAuthorizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PinAuthorizer").finish_non_exhaustive()
    }
}

impl Authorize for PinAuthorizer {
    fn authorize(&self, pin: Option<&str>) -> bool {
        pin.is_some_and(|p| !p.is_empty() && p == self.pin)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Requests and responses
// ─────────────────────────────────────────────────────────────────────────────

/// Body of a save request. Fields stay untyped until validated.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// Admin PIN; must be a string.
    #[serde(default)]
    pub pin: Value,
    /// Raw tabs; must be an array.
    #[serde(default)]
    pub tabs: Value,
    /// Raw active index; coerced to an integer.
    #[serde(default)]
    pub active_index: Value,
}

impl SaveRequest {
    /// Build from an arbitrary JSON body. Non-object bodies become an empty
    /// request.
    pub fn from_body(body: Value) -> Self {
        serde_json::from_value(body).unwrap_or_default()
    }
}

/// Successful save response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    /// Always `true`.
    pub ok: bool,
    /// Manifest as persisted.
    pub manifest: Manifest,
    /// Operator-facing note for degraded saves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    /// Degraded-save details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<FallbackInfo>,
    /// Path written, for degraded saves.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<PathBuf>,
}

impl From<WriteOutcome> for SaveResponse {
    fn from(outcome: WriteOutcome) -> Self {
        let warning = outcome.fallback.as_ref().map(|f| match f.kind {
            FallbackKind::Direct => "Manifest saved using non-atomic fallback; \
                 an interrupted save could leave it incomplete."
                .to_string(),
            FallbackKind::Alternate => "Manifest saved using non-atomic fallback to an alternate path; \
                 readers will pick it up while it is the newest copy."
                .to_string(),
        });
        let location = outcome.fallback.is_some().then_some(outcome.path);
        Self {
            ok: true,
            manifest: outcome.manifest,
            warning,
            fallback: outcome.fallback,
            location,
        }
    }
}

/// Successful load response.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadResponse {
    /// Stored document, unmodified.
    pub manifest: Value,
    /// Source file, relative to the base directory when possible.
    pub source: PathBuf,
}

/// Client-facing error body.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// User-safe message.
    pub error: String,
    /// Filesystem details, for exposable write failures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

/// Path and code of a failed write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorDetails {
    /// Path attempted.
    pub path: PathBuf,
    /// Stable error code.
    pub code: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

/// Request-level failures.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing or wrong PIN.
    #[error("Unauthorized")]
    Unauthorized,
    /// `tabs` is not an array.
    #[error("Invalid payload")]
    InvalidPayload,
    /// The save failed.
    #[error(transparent)]
    Write(#[from] WriteError),
    /// No manifest is stored.
    #[error("Manifest not found")]
    NotFound,
    /// A stored manifest could not be loaded.
    #[error("Failed to load manifest")]
    Load(#[from] ReadError),
}

impl ApiError {
    /// Body to return to the client. Internal details are withheld.
    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Write(e) if e.is_exposable() => ErrorBody {
                error: e.to_string(),
                details: e.path().zip(e.code()).map(|(path, code)| ErrorDetails {
                    path: path.to_path_buf(),
                    code: code.to_string(),
                }),
            },
            Self::Write(_) => ErrorBody {
                error: "Internal Server Error".to_string(),
                details: None,
            },
            other => ErrorBody {
                error: other.to_string(),
                details: None,
            },
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Authorize, validate, and persist a save request.
pub async fn save(
    writer: &ManifestWriter,
    auth: &dyn Authorize,
    request: SaveRequest,
) -> Result<SaveResponse, ApiError> {
    save_outcome(writer, auth, request).await.map(SaveResponse::from)
}

/// Like [`save`], but hands back the raw [`WriteOutcome`] so the caller can
/// consult a [`RetryPolicy`](crate::policy::RetryPolicy) before responding.
pub async fn save_outcome(
    writer: &ManifestWriter,
    auth: &dyn Authorize,
    request: SaveRequest,
) -> Result<WriteOutcome, ApiError> {
    if !auth.authorize(request.pin.as_str()) {
        return Err(ApiError::Unauthorized);
    }
    let Value::Array(tabs) = &request.tabs else {
        return Err(ApiError::InvalidPayload);
    };
    Ok(writer.write(tabs, Some(&request.active_index)).await?)
}

/// Load the freshest manifest, disclosing its path relative to `base`.
pub async fn load(reader: &ManifestReader, base: &Path) -> Result<LoadResponse, ApiError> {
    let outcome = reader.read().await?.ok_or(ApiError::NotFound)?;
    Ok(LoadResponse {
        source: relative_to(&outcome.path, base),
        manifest: outcome.manifest,
    })
}

/// Express `path` relative to `base`, walking up with `..` as needed.
///
/// Falls back to `path` unchanged when one is absolute and the other is not.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    if path.is_absolute() != base.is_absolute() {
        return path.to_path_buf();
    }
    let ours: Vec<Component<'_>> = path.components().collect();
    let theirs: Vec<Component<'_>> = base.components().collect();
    let common = ours
        .iter()
        .zip(&theirs)
        .take_while(|(a, b)| a == b)
        .count();

    let mut out: PathBuf = theirs[common..]
        .iter()
        .filter(|c| !matches!(c, Component::CurDir))
        .map(|_| Component::ParentDir)
        .collect();
    out.extend(&ours[common..]);
    out
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;
    use std::sync::Arc;

    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::config::StoreConfig;
    use crate::testutil::{MemFs, Op};
    use crate::traits::ManifestFs;

    const PRIMARY: &str = "/srv/app/data/manifest.json";

    fn store(fs: &Arc<MemFs>) -> (ManifestWriter, ManifestReader) {
        let config = StoreConfig::new(PRIMARY);
        let dyn_fs = Arc::clone(fs) as Arc<dyn ManifestFs>;
        (
            ManifestWriter::new(config.clone(), Arc::clone(&dyn_fs)),
            ManifestReader::new(config, dyn_fs),
        )
    }

    fn request(body: Value) -> SaveRequest {
        SaveRequest::from_body(body)
    }

    // ── Authorization ───────────────────────────────────────────────

    #[test]
    fn pin_must_match_exactly() {
        let auth = PinAuthorizer::new("123456");
        assert!(auth.authorize(Some("123456")));
        assert!(!auth.authorize(Some("123457")));
        assert!(!auth.authorize(Some("")));
        assert!(!auth.authorize(None));
    }

    #[test]
    fn empty_configured_pin_never_authorizes() {
        let auth = PinAuthorizer::new("");
        assert!(!auth.authorize(Some("")));
    }

    #[test]
    fn debug_hides_pin() {
        assert!(!format!("{:?}", PinAuthorizer::new("987654")).contains("987654"));
    }

    // ── save ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn wrong_pin_is_unauthorized() {
        let fs = Arc::new(MemFs::new());
        let (writer, _) = store(&fs);
        let err = save(&writer, &PinAuthorizer::new("1"), request(json!({"pin": "2", "tabs": []})))
            .await
            .unwrap_err();
        assert_matches!(err, ApiError::Unauthorized);
        assert_eq!(err.body().error, "Unauthorized");
        assert!(fs.calls(Op::Write).is_empty());
    }

    #[tokio::test]
    async fn numeric_pin_is_unauthorized() {
        let fs = Arc::new(MemFs::new());
        let (writer, _) = store(&fs);
        let err = save(&writer, &PinAuthorizer::new("1"), request(json!({"pin": 1, "tabs": []})))
            .await
            .unwrap_err();
        assert_matches!(err, ApiError::Unauthorized);
    }

    #[tokio::test]
    async fn non_array_tabs_is_invalid() {
        let fs = Arc::new(MemFs::new());
        let (writer, _) = store(&fs);
        let auth = PinAuthorizer::new("1");
        for tabs in [json!(null), json!({}), json!("[]")] {
            let err = save(&writer, &auth, request(json!({"pin": "1", "tabs": tabs})))
                .await
                .unwrap_err();
            assert_matches!(err, ApiError::InvalidPayload);
            assert_eq!(err.body().error, "Invalid payload");
        }
    }

    #[tokio::test]
    async fn non_object_body_is_unauthorized() {
        let fs = Arc::new(MemFs::new());
        let (writer, _) = store(&fs);
        let err = save(&writer, &PinAuthorizer::new("1"), request(json!([1, 2])))
            .await
            .unwrap_err();
        assert_matches!(err, ApiError::Unauthorized);
    }

    #[tokio::test]
    async fn clean_save_has_no_fallback_fields() {
        let fs = Arc::new(MemFs::new());
        let (writer, _) = store(&fs);
        let response = save(
            &writer,
            &PinAuthorizer::new("1"),
            request(json!({"pin": "1", "tabs": [], "activeIndex": "0"})),
        )
        .await
        .unwrap();

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["manifest"]["rev"], 1);
        for key in ["warning", "fallback", "location"] {
            assert!(value.get(key).is_none(), "unexpected {key}");
        }
    }

    #[tokio::test]
    async fn save_outcome_exposes_tier() {
        let fs = Arc::new(MemFs::new());
        fs.fail(Op::Write, format!("{PRIMARY}.tmp"), ErrorKind::PermissionDenied);
        let (writer, _) = store(&fs);
        let outcome = save_outcome(&writer, &PinAuthorizer::new("1"), request(json!({"pin": "1", "tabs": []})))
            .await
            .unwrap();
        assert_eq!(outcome.tier, crate::writer::WriteTier::Direct);
        assert!(outcome.is_degraded());
    }

    #[tokio::test]
    async fn degraded_save_warns() {
        let fs = Arc::new(MemFs::new());
        fs.fail(Op::Write, format!("{PRIMARY}.tmp"), ErrorKind::PermissionDenied);
        let (writer, _) = store(&fs);
        let response = save(&writer, &PinAuthorizer::new("1"), request(json!({"pin": "1", "tabs": []})))
            .await
            .unwrap();

        assert!(response.warning.as_deref().unwrap().contains("non-atomic fallback"));
        assert_eq!(response.location, Some(PathBuf::from(PRIMARY)));
        assert_eq!(response.fallback.unwrap().kind, FallbackKind::Direct);
    }

    #[tokio::test]
    async fn exhausted_save_exposes_details() {
        let fs = Arc::new(MemFs::new());
        fs.fail(Op::Write, format!("{PRIMARY}.tmp"), ErrorKind::PermissionDenied);
        fs.fail(Op::Write, PRIMARY, ErrorKind::PermissionDenied);
        let (writer, _) = store(&fs);
        let err = save(&writer, &PinAuthorizer::new("1"), request(json!({"pin": "1", "tabs": []})))
            .await
            .unwrap_err();

        let body = serde_json::to_value(err.body()).unwrap();
        assert!(body["error"].as_str().unwrap().starts_with("Unable to write manifest to"));
        assert_eq!(body["details"]["path"], PRIMARY);
        assert_eq!(body["details"]["code"], "EACCES");
    }

    #[tokio::test]
    async fn internal_write_error_is_masked() {
        let fs = Arc::new(MemFs::new());
        fs.fail(Op::Write, format!("{PRIMARY}.tmp"), ErrorKind::StorageFull);
        let (writer, _) = store(&fs);
        let err = save(&writer, &PinAuthorizer::new("1"), request(json!({"pin": "1", "tabs": []})))
            .await
            .unwrap_err();

        assert_eq!(
            err.body(),
            ErrorBody {
                error: "Internal Server Error".to_string(),
                details: None
            }
        );
    }

    // ── load ────────────────────────────────────────────────────────

    #[tokio::test]
    async fn load_missing_is_not_found() {
        let fs = Arc::new(MemFs::new());
        let (_, reader) = store(&fs);
        let err = load(&reader, Path::new("/srv/app")).await.unwrap_err();
        assert_matches!(err, ApiError::NotFound);
        assert_eq!(err.body().error, "Manifest not found");
    }

    #[tokio::test]
    async fn load_discloses_relative_source() {
        let fs = Arc::new(MemFs::new());
        fs.insert_json(PRIMARY, &json!({"rev": 3, "tabs": []}));
        let (_, reader) = store(&fs);
        let response = load(&reader, Path::new("/srv/app")).await.unwrap();
        assert_eq!(response.source, PathBuf::from("data/manifest.json"));
        assert_eq!(response.manifest["rev"], 3);
    }

    #[tokio::test]
    async fn load_corrupt_is_generic_failure() {
        let fs = Arc::new(MemFs::new());
        fs.insert(PRIMARY, "nope");
        let (_, reader) = store(&fs);
        let err = load(&reader, Path::new("/srv/app")).await.unwrap_err();
        assert_matches!(err, ApiError::Load(ReadError::Corrupt { .. }));
        assert_eq!(err.body().error, "Failed to load manifest");
    }

    // ── relative_to ─────────────────────────────────────────────────

    #[test]
    fn relative_paths() {
        assert_eq!(
            relative_to(Path::new("/srv/app/manifest.json"), Path::new("/srv/app")),
            PathBuf::from("manifest.json")
        );
        assert_eq!(
            relative_to(Path::new("/tmp/manifest.json"), Path::new("/srv/app")),
            PathBuf::from("../../tmp/manifest.json")
        );
        assert_eq!(
            relative_to(Path::new("manifest.json"), Path::new("/srv")),
            PathBuf::from("manifest.json")
        );
    }
}
