//! Build orchestration.
//!
//! # Pass
//!
//! ```text
//! sync sources ──► stale set ──► waves ──► commit ──► (derived changed? next round)
//!                                                         │
//!                          destination check ◄────────────┘
//!                                 │
//!                          delete obsolete ──► atomic writes ──► BuildReport
//! ```
//!
//! Chains of one wave run in parallel on copies of their pages; results are
//! committed to the table in wave order once the wave is done. Nothing is
//! written until every round has settled and destinations are unique, so a
//! configuration error leaves the output tree untouched.
//!
//! Edges recorded by a chain are only known once it has run. A page that
//! read another page which changed in the same wave or a later one saw
//! values from before that page was processed; it is marked dirty and runs
//! again in the next round, now ordered behind its dependencies.

pub mod chain;
pub mod error;
pub mod report;
pub mod stale;
pub mod write;

pub use report::{BuildReport, PageStatus};

use crate::config::ConfigError;
use crate::deps::DependencyGraph;
use crate::logger::Progress;
use crate::site::{Fingerprint, Page, Site};
use crate::{debug, log};
use error::{PageFailure, ProcessorError};
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    path::{Path, PathBuf},
    time::Instant,
};
use write::WriteOutcome;

/// Full pass: rescan the whole source tree, then build what is stale.
pub fn render(site: &mut Site) -> Result<BuildReport, ConfigError> {
    site.discover()?;
    run_pass(site, Output::Publish)
}

/// Incremental pass over the given changed paths.
pub fn rebuild(site: &mut Site, changes: &[PathBuf]) -> Result<BuildReport, ConfigError> {
    site.apply_changes(changes)?;
    run_pass(site, Output::Publish)
}

/// Full pass that leaves the output tree alone.
///
/// Pages carry their processed state afterwards but still count as unbuilt,
/// so the next real pass writes them.
pub fn dry_run(site: &mut Site) -> Result<BuildReport, ConfigError> {
    site.discover()?;
    run_pass(site, Output::Discard)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Output {
    Publish,
    Discard,
}

/// Bookkeeping for one pass.
#[derive(Default)]
struct Pass {
    report: BuildReport,
    built: FxHashSet<PathBuf>,
    failed: FxHashSet<PathBuf>,
    /// `last_build` before this pass first committed the page.
    previous: FxHashMap<PathBuf, Option<Fingerprint>>,
    removed: Vec<Page>,
    /// Waves run so far, counted across rounds.
    waves: usize,
    /// Wave each page last ran in.
    ran_at: FxHashMap<PathBuf, usize>,
    /// Wave in which what other pages see of a page last changed.
    changed_at: FxHashMap<PathBuf, usize>,
}

impl Pass {
    fn fail(&mut self, source: &Path, failure: impl Into<PageFailure>) {
        let failure = failure.into();
        debug!("build"; "{}: {}", source.display(), failure);
        self.built.remove(source);
        self.ran_at.remove(source);
        self.failed.insert(source.to_path_buf());
        self.report.fail(source.to_path_buf(), failure);
    }

    fn built(&mut self, source: &Path) {
        if self.built.insert(source.to_path_buf()) {
            self.report.built.push(source.to_path_buf());
        }
    }
}

fn run_pass(site: &mut Site, output: Output) -> Result<BuildReport, ConfigError> {
    let started = Instant::now();
    let mut pass = Pass::default();
    let force = site.force_refresh;
    let max_rounds = site.config().build.max_rounds;

    for page in site.pages_mut() {
        page.stale = false;
    }

    for round in 0..=max_rounds {
        let removed = site.take_removed();
        let removed_paths: Vec<PathBuf> = removed.iter().map(|p| p.source.clone()).collect();
        pass.removed.extend(removed);

        let graph = DependencyGraph::from_site(site, &removed_paths);
        let mut seeds = stale::seeds(site, force && round == 0);
        seeds.extend(removed_paths);
        let stale = stale::stale_set(site, &graph, seeds, &pass.failed);
        if stale.is_empty() {
            break;
        }

        if round == max_rounds {
            let mut unsettled: Vec<_> = stale.into_iter().collect();
            unsettled.sort_by_key(|p| site.position(p));
            for source in unsettled {
                let message = format!("generated pages did not settle after {max_rounds} rounds");
                pass.fail(&source, ProcessorError::new("build", message));
            }
            break;
        }

        pass.report.rounds = round + 1;
        debug!("build"; "round {}: {} stale", round + 1, stale.len());
        for source in &stale {
            if let Some(page) = site.page_mut(source) {
                page.stale = true;
            }
        }

        let schedule = graph.schedule(&stale, |p| site.position(p).unwrap_or(usize::MAX));
        for cycle in schedule.cycles {
            for page in &cycle.pages {
                pass.fail(page, cycle.clone());
            }
        }
        for (page, member) in schedule.blocked {
            pass.fail(&page, PageFailure::BlockedByCycle(member));
        }

        let progress = Progress::new("build", stale.len());
        for wave in &schedule.waves {
            run_wave(site, wave, &mut pass, &progress);
        }
        progress.finish();
        requeue_early_readers(site, &pass);
    }

    if let Err(err) = check_destinations(site, &pass.built) {
        rollback(site, &mut pass);
        return Err(err);
    }

    match output {
        Output::Publish => publish(site, &mut pass),
        Output::Discard => rollback(site, &mut pass),
    }

    pass.report.skipped = site
        .pages()
        .filter(|p| !pass.built.contains(&p.source) && !pass.failed.contains(&p.source))
        .map(|p| p.source.clone())
        .collect();
    pass.report.removed = pass.removed.iter().map(|p| p.source.clone()).collect();
    pass.report.elapsed = started.elapsed();
    Ok(pass.report)
}

/// Forget that this pass built anything and hand removals back.
fn rollback(site: &mut Site, pass: &mut Pass) {
    for (source, previous) in pass.previous.drain() {
        if let Some(page) = site.page_mut(&source) {
            page.last_build = previous;
        }
    }
    site.requeue_removed(std::mem::take(&mut pass.removed));
}

/// Run one wave's chains in parallel, then commit results in wave order.
fn run_wave(site: &mut Site, wave: &[PathBuf], pass: &mut Pass, progress: &Progress) {
    let wave_index = pass.waves;
    pass.waves += 1;
    let view: &Site = site;
    let results: Vec<_> = wave
        .par_iter()
        .filter(|source| !pass.failed.contains(*source))
        .filter_map(|source| {
            let mut page = view.page(source)?.clone();
            let result = chain::apply(&mut page, view).map(|derived| (page, derived));
            progress.inc();
            Some((source, result))
        })
        .collect();

    for (source, result) in results {
        let (page, derived) = match result {
            Ok(ok) => ok,
            Err(e) => {
                pass.fail(source, e);
                continue;
            }
        };

        let Some(current) = site.page(source) else {
            continue;
        };
        let previous = current.last_build;
        let changed = !current.same_view(&page);
        pass.previous.entry(source.clone()).or_insert(previous);
        if !site.commit(page) {
            continue;
        }
        if changed {
            pass.changed_at.insert(source.clone(), wave_index);
        }

        match site.register_derived(source, derived) {
            Ok(()) => {
                pass.ran_at.insert(source.clone(), wave_index);
                pass.built(source);
            }
            Err(e) => {
                if let Some(page) = site.page_mut(source) {
                    page.last_build = previous;
                }
                pass.fail(source, e);
            }
        }
    }
}

/// Mark pages that ran no later than a dependency changed.
fn requeue_early_readers(site: &mut Site, pass: &Pass) {
    let graph = DependencyGraph::from_site(site, &[]);
    let mut early: Vec<&PathBuf> = pass
        .ran_at
        .iter()
        .filter(|&(page, &ran)| {
            graph
                .dependencies_of(page)
                .any(|dep| pass.changed_at.get(dep).is_some_and(|&changed| changed >= ran))
        })
        .map(|(page, _)| page)
        .collect();
    early.sort_by_key(|p| site.position(p));

    for source in early {
        if let Some(page) = site.page_mut(source) {
            debug!("build"; "{}: read a dependency before it was built", source.display());
            page.dirty = true;
        }
    }
}

/// Every page that will occupy its destination after this pass must own it alone.
fn check_destinations(site: &Site, built: &FxHashSet<PathBuf>) -> Result<(), ConfigError> {
    let mut owners: FxHashMap<&Path, &Path> = FxHashMap::default();
    for page in site.pages() {
        if page.ignored || (page.written.is_none() && !built.contains(&page.source)) {
            continue;
        }
        if let Some(first) = owners.insert(page.dest(), &page.source) {
            return Err(ConfigError::DuplicateDestination {
                dest: page.dest().to_path_buf(),
                first: first.to_path_buf(),
                second: page.source.clone(),
            });
        }
    }
    Ok(())
}

/// Delete obsolete outputs, then write every built page.
fn publish(site: &mut Site, pass: &mut Pass) {
    let root = site.config().build.output.clone();

    let mut built: Vec<PathBuf> = pass.built.iter().cloned().collect();
    built.sort_by_key(|p| site.position(p));

    // Outputs of removed pages and pages that moved or became ignored.
    let claimed: FxHashSet<&Path> = site
        .pages()
        .filter(|p| !p.ignored && (p.written.is_some() || pass.built.contains(&p.source)))
        .map(Page::dest)
        .collect();
    let mut obsolete: Vec<PathBuf> = pass.removed.iter().filter_map(|p| p.written.clone()).collect();
    obsolete.extend(built.iter().filter_map(|source| {
        let page = site.page(source)?;
        let written = page.written.as_deref()?;
        (page.ignored || written != page.dest()).then(|| written.to_path_buf())
    }));
    obsolete.retain(|dest| !claimed.contains(dest.as_path()));

    for dest in obsolete {
        debug!("remove"; "{}", dest.display());
        if let Err(e) = write::remove_output(&root, &root.join(&dest)) {
            log!("error"; "failed to remove {}: {}", dest.display(), e);
        }
    }

    for source in built {
        let Some(page) = site.page_mut(&source) else {
            continue;
        };
        if page.ignored {
            page.written = None;
            continue;
        }
        let dest = page.dest().to_path_buf();
        match write::write_output(&root.join(&dest), &page.output) {
            Ok(outcome) => {
                match outcome {
                    WriteOutcome::Written => pass.report.written += 1,
                    WriteOutcome::Unchanged => pass.report.unchanged += 1,
                }
                page.written = Some(dest);
            }
            Err(e) => {
                page.last_build = None;
                pass.fail(&source, e);
            }
        }
    }
}

#[cfg(test)]
mod tests;
