//! Project source discovery.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;

use crate::error::ConfigError;

fn build_globset(patterns: &[String]) -> Result<GlobSet, ConfigError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| ConfigError::Glob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| ConfigError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Every file under `root` matching one of `patterns`, relative to `root`
/// for matching purposes, honouring ignore files. Sorted.
pub fn discover_sources(root: &Path, patterns: &[String]) -> Result<Vec<PathBuf>, ConfigError> {
    let globs = build_globset(patterns)?;
    let mut sources = Vec::new();

    for entry in WalkBuilder::new(root).require_git(false).build() {
        let entry = entry?;
        if !entry.file_type().is_some_and(|kind| kind.is_file()) {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if globs.is_match(relative) {
            sources.push(path.to_path_buf());
        }
    }

    sources.sort();
    tracing::debug!(root = %root.display(), count = sources.len(), "Discovered sources");
    Ok(sources)
}
