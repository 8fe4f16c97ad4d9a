//! Manifest locations shared by writer and reader.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Where the manifest is stored.
///
/// Paths are used as given; resolve relative paths before building this.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Primary manifest file. Revisions are derived only from this file.
    pub primary: PathBuf,
    /// Alternate file written when the primary is not writable.
    pub fallback: Option<PathBuf>,
}

impl StoreConfig {
    /// Config with only a primary path.
    pub fn new(primary: impl Into<PathBuf>) -> Self {
        Self {
            primary: primary.into(),
            fallback: None,
        }
    }

    /// Set the alternate path.
    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<PathBuf>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Paths the reader inspects, in evaluation order.
    ///
    /// The fallback comes first so it wins modification-time ties. A
    /// fallback equal to the primary is not listed twice.
    pub fn candidates(&self) -> Vec<&Path> {
        let mut out = Vec::with_capacity(2);
        if let Some(fallback) = self.fallback.as_deref().filter(|f| *f != self.primary.as_path()) {
            out.push(fallback);
        }
        out.push(self.primary.as_path());
        out
    }
}

/// Sibling temp file used for atomic replacement: `<path>.tmp`.
pub fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidates_primary_only() {
        let config = StoreConfig::new("/data/manifest.json");
        assert_eq!(config.candidates(), [Path::new("/data/manifest.json")]);
    }

    #[test]
    fn candidates_fallback_first() {
        let config =
            StoreConfig::new("/data/manifest.json").with_fallback(Some("/tmp/manifest.json".into()));
        assert_eq!(
            config.candidates(),
            [Path::new("/tmp/manifest.json"), Path::new("/data/manifest.json")]
        );
    }

    #[test]
    fn candidates_skip_duplicate_fallback() {
        let config =
            StoreConfig::new("/data/manifest.json").with_fallback(Some("/data/manifest.json".into()));
        assert_eq!(config.candidates().len(), 1);
    }

    #[test]
    fn temp_path_appends_suffix() {
        assert_eq!(
            temp_path(Path::new("/data/manifest.json")),
            PathBuf::from("/data/manifest.json.tmp")
        );
        assert_eq!(temp_path(Path::new("m")), PathBuf::from("m.tmp"));
    }
}
