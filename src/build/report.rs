//! Per-pass outcome: what was built, skipped, failed and removed.

use super::error::PageFailure;
use crate::log;
use crate::site::Site;
use colored::Colorize;
use rustc_hash::FxHashSet;
use std::{
    fmt,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageStatus {
    Built,
    Skipped,
    Failed,
    /// Processed but never written.
    Ignored,
}

impl fmt::Display for PageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Built => "built",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
            Self::Ignored => "ignored",
        };
        // Pad before colouring so width applies to the visible text.
        let label = format!("{label:>width$}", width = f.width().unwrap_or(0));
        let s = match self {
            Self::Built => label.green(),
            Self::Skipped => label.dimmed(),
            Self::Failed => label.red(),
            Self::Ignored => label.yellow(),
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Default)]
pub struct BuildReport {
    /// Pages whose chain ran and committed, in commit order.
    pub built: Vec<PathBuf>,
    /// Pages not stale this pass.
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<(PathBuf, PageFailure)>,
    /// Pages dropped from the table, with their published output.
    pub removed: Vec<PathBuf>,
    /// Output files actually (re)written.
    pub written: usize,
    /// Outputs that already held the rendered bytes.
    pub unchanged: usize,
    pub rounds: usize,
    pub elapsed: Duration,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure(&self, source: &Path) -> Option<&PageFailure> {
        self.failed
            .iter()
            .find(|(p, _)| p == source)
            .map(|(_, f)| f)
    }

    pub(crate) fn fail(&mut self, source: PathBuf, failure: impl Into<PageFailure>) {
        self.built.retain(|p| *p != source);
        self.failed.retain(|(p, _)| *p != source);
        self.failed.push((source, failure.into()));
    }

    /// Status of every page in the site, in discovery order.
    pub fn statuses<'a>(&self, site: &'a Site) -> Vec<(&'a Path, PageStatus)> {
        let failed: FxHashSet<&Path> = self.failed.iter().map(|(p, _)| p.as_path()).collect();
        let built: FxHashSet<&Path> = self.built.iter().map(PathBuf::as_path).collect();

        site.pages()
            .map(|page| {
                let source = page.source.as_path();
                let status = if failed.contains(source) {
                    PageStatus::Failed
                } else if page.ignored {
                    PageStatus::Ignored
                } else if built.contains(source) {
                    PageStatus::Built
                } else {
                    PageStatus::Skipped
                };
                (source, status)
            })
            .collect()
    }

    /// Print failures and a one-line total.
    pub fn log(&self) {
        for (source, failure) in &self.failed {
            log!("error"; "{}: {}", source.display(), failure);
        }
        log!(
            "build";
            "{} built, {} skipped, {} failed, {} removed ({} written) in {:.2?}",
            self.built.len(),
            self.skipped.len(),
            self.failed.len(),
            self.removed.len(),
            self.written,
            self.elapsed
        );
    }
}
