//! Page → page dependency graph.
//!
//! Edges point from a dependent to its dependency and are keyed by source
//! path. The graph is rebuilt from the page table at the start of every
//! round, so it never holds references into the table.
//!
//! ```text
//!   blog/index.md ──► blog/a.md          dependents of blog/a.md:
//!        │                                  { blog/index.md, tags/x.tag }
//!        └──────────► templates/page.html
//!   tags/x.tag ─────► blog/a.md
//! ```

use crate::build::error::DependencyCycleError;
use crate::site::{PathPattern, Site};
use rustc_hash::{FxHashMap, FxHashSet};
use std::{
    collections::VecDeque,
    path::{Path, PathBuf},
};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// dependent → dependencies
    dependencies: FxHashMap<PathBuf, FxHashSet<PathBuf>>,
    /// dependency → dependents
    dependents: FxHashMap<PathBuf, FxHashSet<PathBuf>>,
}

/// Execution order for a stale set.
#[derive(Debug, Default)]
pub struct Schedule {
    /// Each wave only depends on earlier waves.
    pub waves: Vec<Vec<PathBuf>>,
    pub cycles: Vec<DependencyCycleError>,
    /// Pages that wait on a cycle, with the cycle page they reach first.
    pub blocked: Vec<(PathBuf, PathBuf)>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Open,
    Done,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every edge the site knows about.
    ///
    /// `removed` are paths of pages dropped since the last pass; dependency
    /// globs are matched against them as well so their dependents rebuild.
    pub fn from_site(site: &Site, removed: &[PathBuf]) -> Self {
        let mut graph = Self::new();
        for page in site.pages() {
            for dep in page.all_dependencies() {
                graph.record_dependency(&page.source, dep);
            }

            let rule_globs = page
                .rule
                .and_then(|i| site.rules().get(i))
                .into_iter()
                .flat_map(|rule| rule.deps.iter().cloned());
            // Recorded globs were compiled once already when the processor ran.
            let recorded = page
                .dependency_globs
                .iter()
                .filter_map(|glob| PathPattern::new(glob).ok());

            for pattern in rule_globs.chain(recorded) {
                for other in site.pages_matching(&pattern) {
                    graph.record_dependency(&page.source, &other.source);
                }
                for path in removed.iter().filter(|p| pattern.matches(p)) {
                    graph.record_dependency(&page.source, path);
                }
            }
        }
        graph
    }

    /// Record that `dependent` must be rebuilt whenever `dependency` is.
    /// Self edges carry no information and are dropped.
    pub fn record_dependency(&mut self, dependent: &Path, dependency: &Path) {
        if dependent == dependency {
            return;
        }
        self.dependencies
            .entry(dependent.to_path_buf())
            .or_default()
            .insert(dependency.to_path_buf());
        self.dependents
            .entry(dependency.to_path_buf())
            .or_default()
            .insert(dependent.to_path_buf());
    }

    pub fn dependencies_of(&self, page: &Path) -> impl Iterator<Item = &PathBuf> {
        self.dependencies.get(page).into_iter().flatten()
    }

    pub fn dependents_of(&self, page: &Path) -> impl Iterator<Item = &PathBuf> {
        self.dependents.get(page).into_iter().flatten()
    }

    /// Seeds plus everything that transitively depends on them.
    pub fn transitive_stale_set(
        &self,
        seeds: impl IntoIterator<Item = PathBuf>,
    ) -> FxHashSet<PathBuf> {
        let mut stale = FxHashSet::default();
        let mut queue: VecDeque<PathBuf> = seeds.into_iter().collect();
        while let Some(page) = queue.pop_front() {
            if !stale.insert(page.clone()) {
                continue;
            }
            queue.extend(
                self.dependents_of(&page)
                    .filter(|d| !stale.contains(*d))
                    .cloned(),
            );
        }
        stale
    }

    /// Order `nodes` into waves, dependency before dependent.
    ///
    /// Only edges between members of `nodes` constrain the order. Within a
    /// wave, pages are sorted by `position`. Pages left over by the
    /// topological sort are either on a cycle or blocked behind one.
    pub fn schedule(
        &self,
        nodes: &FxHashSet<PathBuf>,
        position: impl Fn(&Path) -> usize,
    ) -> Schedule {
        let sorted = |mut v: Vec<PathBuf>| {
            v.sort_by_key(|p| (position(p), p.clone()));
            v
        };

        let mut in_degree: FxHashMap<&Path, usize> = nodes
            .iter()
            .map(|n| {
                let count = self.dependencies_of(n).filter(|d| nodes.contains(*d)).count();
                (n.as_path(), count)
            })
            .collect();

        let mut schedule = Schedule::default();
        let mut current = sorted(
            in_degree
                .iter()
                .filter(|&(_, &d)| d == 0)
                .map(|(n, _)| n.to_path_buf())
                .collect(),
        );
        let mut scheduled = 0;

        while !current.is_empty() {
            let mut next = Vec::new();
            for page in &current {
                for dependent in self.dependents_of(page).filter(|d| nodes.contains(*d)) {
                    if let Some(degree) = in_degree.get_mut(dependent.as_path()) {
                        *degree -= 1;
                        if *degree == 0 {
                            next.push(dependent.clone());
                        }
                    }
                }
            }
            scheduled += current.len();
            schedule.waves.push(current);
            current = sorted(next);
        }

        if scheduled < nodes.len() {
            let leftover: FxHashSet<PathBuf> = in_degree
                .into_iter()
                .filter(|&(_, d)| d > 0)
                .map(|(n, _)| n.to_path_buf())
                .collect();
            self.explain_leftover(&leftover, &sorted, &mut schedule);
        }
        schedule
    }

    /// Split unschedulable pages into cycles and pages blocked behind them.
    fn explain_leftover(
        &self,
        leftover: &FxHashSet<PathBuf>,
        sorted: &impl Fn(Vec<PathBuf>) -> Vec<PathBuf>,
        schedule: &mut Schedule,
    ) {
        let neighbours = |page: &Path| {
            sorted(
                self.dependencies_of(page)
                    .filter(|d| leftover.contains(*d))
                    .cloned()
                    .collect(),
            )
        };

        // Depth-first along dependency edges; reaching an open node closes a cycle.
        let mut marks: FxHashMap<PathBuf, Mark> = FxHashMap::default();
        for start in sorted(leftover.iter().cloned().collect()) {
            if marks.contains_key(&start) {
                continue;
            }
            marks.insert(start.clone(), Mark::Open);
            let mut stack = vec![(start.clone(), neighbours(&start), 0usize)];

            while let Some((page, next, i)) = stack.last_mut() {
                let Some(dep) = next.get(*i).cloned() else {
                    marks.insert(page.clone(), Mark::Done);
                    stack.pop();
                    continue;
                };
                *i += 1;
                match marks.get(&dep) {
                    None => {
                        marks.insert(dep.clone(), Mark::Open);
                        let deps = neighbours(&dep);
                        stack.push((dep, deps, 0));
                    }
                    Some(Mark::Open) => {
                        let from = stack.iter().position(|(p, ..)| *p == dep).unwrap_or(0);
                        let pages = stack[from..].iter().map(|(p, ..)| p.clone()).collect();
                        schedule.cycles.push(DependencyCycleError { pages });
                    }
                    Some(Mark::Done) => {}
                }
            }
        }

        let on_cycle: FxHashSet<&PathBuf> =
            schedule.cycles.iter().flat_map(|c| &c.pages).collect();
        for page in sorted(leftover.iter().cloned().collect()) {
            if on_cycle.contains(&page) {
                continue;
            }
            let reached = self.first_reachable(&page, |p| on_cycle.contains(p));
            if let Some(member) = reached {
                schedule.blocked.push((page, member));
            }
        }
    }

    /// Breadth-first along dependency edges to the first page satisfying `hit`.
    fn first_reachable(&self, from: &Path, hit: impl Fn(&PathBuf) -> bool) -> Option<PathBuf> {
        let mut seen = FxHashSet::default();
        let mut queue: VecDeque<&PathBuf> = self.dependencies_of(from).collect();
        while let Some(page) = queue.pop_front() {
            if hit(page) {
                return Some(page.clone());
            }
            if seen.insert(page) {
                queue.extend(self.dependencies_of(page));
            }
        }
        None
    }
}
