//! Per-document diagnostics in two bands.
//!
//! Parse problems belong to one document's latest parse; analysis problems
//! come from whole-project analysis. A fresh parse invalidates the analysis
//! built on the old one, so clearing parse problems clears both bands.

use std::collections::BTreeMap;

use ghul_types::{Diagnostic, ProblemKind};

#[derive(Debug, Default)]
struct ProblemList {
    parse: Vec<Diagnostic>,
    analysis: Vec<Diagnostic>,
}

impl ProblemList {
    fn combined(&self) -> Vec<Diagnostic> {
        self.parse.iter().chain(&self.analysis).cloned().collect()
    }
}

/// Documents keep their entry after being cleared so the next publish
/// tells the editor their problems are gone.
pub(crate) struct ProblemStore {
    data: BTreeMap<String, ProblemList>,
}

impl ProblemStore {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, kind: ProblemKind, uri: &str, diagnostic: Diagnostic) {
        let list = self.data.entry(uri.to_string()).or_default();
        match kind {
            ProblemKind::Parse => list.parse.push(diagnostic),
            ProblemKind::Analysis => list.analysis.push(diagnostic),
        }
    }

    pub fn clear_parse_problems(&mut self, uri: &str) {
        if let Some(list) = self.data.get_mut(uri) {
            list.parse.clear();
            list.analysis.clear();
        }
    }

    pub fn clear_analysis_problems(&mut self, uri: &str) {
        if let Some(list) = self.data.get_mut(uri) {
            list.analysis.clear();
        }
    }

    /// Called once per outgoing edit batch, before it is sent.
    pub fn clear_all_analysis_problems(&mut self) {
        let uris: Vec<String> = self.data.keys().cloned().collect();
        for uri in &uris {
            self.clear_analysis_problems(uri);
        }
    }

    /// Forget everything. Returns the documents that had an entry, so the
    /// caller can publish empty lists for them.
    pub fn clear(&mut self) -> Vec<String> {
        std::mem::take(&mut self.data).into_keys().collect()
    }

    /// Every known document with its aggregate diagnostics, in uri order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec<Diagnostic>)> {
        self.data
            .iter()
            .map(|(uri, list)| (uri.as_str(), list.combined()))
    }

    pub fn error_count(&self) -> usize {
        self.data
            .values()
            .flat_map(|list| list.parse.iter().chain(&list.analysis))
            .filter(|d| d.severity().is_error())
            .count()
    }
}
