//! Document keys.
//!
//! Editors spell the same file differently (percent-encoding, drive letter
//! case). Every uri crossing into the bridge goes through [`normalize`] so
//! one file always maps to one key.

use std::path::{Path, PathBuf};

use tower_lsp::lsp_types::Url;

/// Canonical key for `uri`. File uris round-trip through a path; anything
/// else is kept as written.
pub fn normalize(uri: &Url) -> String {
    if uri.scheme() == "file"
        && let Ok(path) = uri.to_file_path()
        && let Ok(normal) = Url::from_file_path(&path)
    {
        return normal.to_string();
    }
    uri.to_string()
}

pub fn from_path(path: &Path) -> Option<String> {
    Url::from_file_path(path).ok().map(|url| url.to_string())
}

pub fn to_url(key: &str) -> Option<Url> {
    Url::parse(key).ok()
}

pub fn to_path(uri: &Url) -> Option<PathBuf> {
    uri.to_file_path().ok()
}
