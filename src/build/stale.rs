//! Change detection.
//!
//! A page is stale when the site is force-refreshed, when it has never been
//! built, when its fingerprint differs from the one recorded at its last
//! build, or when anything it depends on is stale. The whole stale set is
//! computed before any page runs.

use crate::deps::DependencyGraph;
use crate::site::{Page, Site};
use rustc_hash::FxHashSet;
use std::path::PathBuf;

/// Whether `page` is stale on its own account, ignoring dependencies.
pub fn is_stale(page: &Page, force: bool) -> bool {
    force || page.needs_build()
}

/// Pages stale on their own account, in discovery order.
pub fn seeds(site: &Site, force: bool) -> Vec<PathBuf> {
    site.pages()
        .filter(|p| is_stale(p, force))
        .map(|p| p.source.clone())
        .collect()
}

/// Closure of `seeds` (plus removed paths) over dependents, restricted to
/// pages still in the table and not in `exclude`.
pub fn stale_set(
    site: &Site,
    graph: &DependencyGraph,
    seeds: Vec<PathBuf>,
    exclude: &FxHashSet<PathBuf>,
) -> FxHashSet<PathBuf> {
    graph
        .transitive_stale_set(seeds)
        .into_iter()
        .filter(|p| site.page(p).is_some() && !exclude.contains(p))
        .collect()
}
