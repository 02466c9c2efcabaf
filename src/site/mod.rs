//! The site: page table, discovery and derived-page bookkeeping.
//!
//! Pages live in one `Vec` in discovery order with a path index beside it.
//! Everything that refers to another page does so by source path and
//! resolves it here.
//!
//! The table is only mutated between waves by the holder of the pass
//! (`build::render` / `build::rebuild`); chains see it through `&Site`.

mod page;
pub mod rules;

pub use page::{Fingerprint, Metadata, Page, PageKind, url_for};
pub use rules::{PathPattern, Rule, RuleSet};

use crate::build::error::ProcessorError;
use crate::config::{ConfigError, SiteConfig};
use crate::processors::{DerivedPage, ProcessorRegistry};
use rustc_hash::FxHashMap;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use walkdir::WalkDir;

pub struct Site {
    config: Arc<SiteConfig>,
    registry: Arc<ProcessorRegistry>,
    rules: RuleSet,
    pages: Vec<Page>,
    index: FxHashMap<PathBuf, usize>,
    /// Pages dropped since the last pass picked them up.
    removed: Vec<Page>,
    /// Rebuild every page on the next pass.
    pub force_refresh: bool,
}

impl Site {
    /// Validate the configuration against the registry and compile the rules.
    pub fn new(
        config: Arc<SiteConfig>,
        registry: Arc<ProcessorRegistry>,
    ) -> Result<Self, ConfigError> {
        config.validate(&registry)?;
        let rules = RuleSet::new(&config)?;
        Ok(Self {
            config,
            registry,
            rules,
            pages: Vec::new(),
            index: FxHashMap::default(),
            removed: Vec::new(),
            force_refresh: false,
        })
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProcessorRegistry {
        &self.registry
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    // ------------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------------

    /// All pages in discovery order.
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn page(&self, source: &Path) -> Option<&Page> {
        self.index.get(source).map(|&i| &self.pages[i])
    }

    pub(crate) fn page_mut(&mut self, source: &Path) -> Option<&mut Page> {
        self.index.get(source).map(|&i| &mut self.pages[i])
    }

    pub(crate) fn pages_mut(&mut self) -> impl Iterator<Item = &mut Page> {
        self.pages.iter_mut()
    }

    /// Discovery position, used to order everything deterministically.
    pub fn position(&self, source: &Path) -> Option<usize> {
        self.index.get(source).copied()
    }

    /// Look a page up by source path, then by destination path. Absolute
    /// paths inside the source or output tree are accepted too.
    pub fn find(&self, path: &Path) -> Option<&Page> {
        if let Some(page) = self.page(path) {
            return Some(page);
        }
        if let Some(rel) = self.relative_source(path)
            && let Some(page) = self.page(&rel)
        {
            return Some(page);
        }
        let dest = path
            .strip_prefix(&self.config.build.output)
            .unwrap_or(path);
        let dest = Path::new(dest.to_str().map_or("", |s| s.trim_start_matches('/')));
        self.pages.iter().find(|p| p.dest() == dest)
    }

    /// Pages whose source path matches `pattern`, in discovery order.
    pub fn pages_matching<'a, 'p>(
        &'a self,
        pattern: &'p PathPattern,
    ) -> impl Iterator<Item = &'a Page> + use<'a, 'p> {
        self.pages.iter().filter(|p| pattern.matches(&p.source))
    }

    /// Map a filesystem path into the source tree, if it lies there.
    pub fn relative_source(&self, path: &Path) -> Option<PathBuf> {
        let root = &self.config.build.source;
        if path.is_relative() {
            return Some(path.to_path_buf());
        }
        if let Ok(rel) = path.strip_prefix(root) {
            return Some(rel.to_path_buf());
        }
        // Watch events may report a different spelling of the same directory.
        let canonical = path.canonicalize().ok().or_else(|| {
            let parent = path.parent()?.canonicalize().ok()?;
            Some(parent.join(path.file_name()?))
        })?;
        canonical.strip_prefix(root).ok().map(Path::to_path_buf)
    }

    // ------------------------------------------------------------------------
    // Discovery
    // ------------------------------------------------------------------------

    /// Bring the page table in line with the whole source tree.
    ///
    /// Every new file is matched against the rules before anything changes,
    /// so a file without a rule leaves the table untouched.
    pub fn discover(&mut self) -> Result<(), ConfigError> {
        let root = self.config.build.source.clone();
        if !root.is_dir() {
            return Err(ConfigError::Validation(format!(
                "source directory `{}` does not exist",
                root.display()
            )));
        }

        let found = self.walk(&root)?;
        for rel in &found {
            if self.page(rel).is_none() {
                self.rules.match_path(rel)?;
            }
        }
        for rel in &found {
            self.sync_file(rel)?;
        }

        let found: BTreeSet<&PathBuf> = found.iter().collect();
        let gone: Vec<PathBuf> = self
            .pages
            .iter()
            .filter(|p| !p.is_derived() && !found.contains(&p.source))
            .map(|p| p.source.clone())
            .collect();
        for source in gone {
            self.remove_page(&source);
        }
        Ok(())
    }

    /// Apply filesystem change notifications: existing paths are re-read,
    /// new ones discovered, missing ones dropped.
    pub fn apply_changes(&mut self, paths: &[PathBuf]) -> Result<(), ConfigError> {
        for path in paths {
            let Some(rel) = self.relative_source(path) else {
                continue;
            };
            if rel.as_os_str().is_empty() || self.rules.is_ignored(&rel) {
                continue;
            }
            let abs = self.config.build.source.join(&rel);

            if abs.is_dir() {
                for file in self.walk(&abs)? {
                    self.sync_file(&file)?;
                }
            } else if abs.is_file() {
                self.sync_file(&rel)?;
            } else {
                let gone: Vec<PathBuf> = self
                    .pages
                    .iter()
                    .filter(|p| !p.is_derived() && p.source.starts_with(&rel))
                    .map(|p| p.source.clone())
                    .collect();
                for source in gone {
                    self.remove_page(&source);
                }
            }
        }
        Ok(())
    }

    /// Source-relative paths of every non-ignored file below `dir`, sorted.
    fn walk(&self, dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
        let root = &self.config.build.source;
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                e.path()
                    .strip_prefix(root)
                    .is_ok_and(|rel| rel.as_os_str().is_empty() || !self.rules.is_ignored(rel))
            });
        for entry in walker {
            let entry = entry.map_err(|e| {
                let path = e.path().unwrap_or(dir).to_path_buf();
                ConfigError::Io(path, e.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(rel) = entry.path().strip_prefix(root) {
                files.push(rel.to_path_buf());
            }
        }
        Ok(files)
    }

    /// Read one source file into the table.
    fn sync_file(&mut self, rel: &Path) -> Result<(), ConfigError> {
        let abs = self.config.build.source.join(rel);
        let raw = fs::read(&abs).map_err(|e| ConfigError::Io(abs.clone(), e))?;

        if let Some(page) = self.page_mut(rel) {
            if page.is_derived() {
                return Err(ConfigError::Validation(format!(
                    "`{}` is both a source file and a generated page",
                    rel.display()
                )));
            }
            if page.fingerprint != Fingerprint::of(&raw) {
                page.refresh(raw);
            }
            return Ok(());
        }

        let rule = self.rules.match_path(rel)?;
        let mut page = Page::from_source(rel.to_path_buf(), raw);
        apply_rule(&mut page, rule);
        self.insert_page(page);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Table mutation
    // ------------------------------------------------------------------------

    fn insert_page(&mut self, page: Page) {
        self.index.insert(page.source.clone(), self.pages.len());
        self.pages.push(page);
    }

    /// Store the result of a successful chain. Returns false if the page
    /// left the table while its chain ran.
    pub(crate) fn commit(&mut self, built: Page) -> bool {
        match self.page_mut(&built.source) {
            Some(page) => {
                page.absorb(built);
                true
            }
            None => false,
        }
    }

    /// Drop a page and, transitively, derived pages it was the last origin of.
    pub(crate) fn remove_page(&mut self, source: &Path) {
        let mut queue = vec![source.to_path_buf()];
        while let Some(source) = queue.pop() {
            let Some(i) = self.index.remove(&source) else {
                continue;
            };
            let page = self.pages.remove(i);
            self.reindex(i);

            for derived in self.pages.iter_mut().filter(|p| p.is_derived()) {
                if derived.origins.remove(&source).is_some() {
                    derived.dirty = true;
                    if derived.origins.is_empty() {
                        queue.push(derived.source.clone());
                    }
                }
            }
            self.removed.push(page);
        }
    }

    fn reindex(&mut self, from: usize) {
        for (i, page) in self.pages.iter().enumerate().skip(from) {
            self.index.insert(page.source.clone(), i);
        }
    }

    /// Pages removed since the last call.
    pub(crate) fn take_removed(&mut self) -> Vec<Page> {
        std::mem::take(&mut self.removed)
    }

    /// Hand removals back after an aborted pass.
    pub(crate) fn requeue_removed(&mut self, pages: Vec<Page>) {
        let later = std::mem::replace(&mut self.removed, pages);
        self.removed.extend(later);
    }

    /// Replace the derived pages registered by `origin` with `derived`.
    ///
    /// A page registered by several origins is kept once; it disappears
    /// when its last origin stops registering it.
    pub(crate) fn register_derived(
        &mut self,
        origin: &Path,
        derived: Vec<DerivedPage>,
    ) -> Result<(), ProcessorError> {
        let mut incoming = Vec::with_capacity(derived.len());
        for d in derived {
            if let Some(existing) = self.page(&d.source)
                && !existing.is_derived()
            {
                return Err(ProcessorError::new(
                    "register",
                    format!("`{}` is a source file", d.source.display()),
                ));
            }
            incoming.push(self.derived_page(d)?);
        }

        let registered: BTreeSet<PathBuf> = incoming.iter().map(|(p, _)| p.source.clone()).collect();

        for (mut page, contributions) in incoming {
            match self.page_mut(&page.source) {
                Some(existing) => {
                    existing.replace_derived(page);
                    let previous = existing
                        .origins
                        .insert(origin.to_path_buf(), contributions.clone());
                    if previous.as_ref() != Some(&contributions) {
                        existing.dirty = true;
                    }
                }
                None => {
                    page.origins.insert(origin.to_path_buf(), contributions);
                    self.insert_page(page);
                }
            }
        }

        let dropped: Vec<PathBuf> = self
            .pages
            .iter()
            .filter(|p| p.origins.contains_key(origin) && !registered.contains(&p.source))
            .map(|p| p.source.clone())
            .collect();
        for source in dropped {
            let Some(page) = self.page_mut(&source) else {
                continue;
            };
            page.origins.remove(origin);
            page.dirty = true;
            if page.origins.is_empty() {
                self.remove_page(&source);
            }
        }
        Ok(())
    }

    /// Turn a registration into a page record with chain and destination,
    /// plus the pages it reported as contributing.
    fn derived_page(&self, d: DerivedPage) -> Result<(Page, BTreeSet<PathBuf>), ProcessorError> {
        let mut page = Page::derived(d.source, d.raw, d.metadata);
        match d.chain {
            Some(chain) => page.chain = chain,
            None => {
                let rule = self.rules.match_path(&page.source).map_err(|_| {
                    ProcessorError::new(
                        "register",
                        format!("no rule matches generated page `{}`", page.source.display()),
                    )
                })?;
                apply_rule(&mut page, rule);
            }
        }
        if let Some(dest) = d.dest {
            page.set_base_dest(dest);
        }
        Ok((page, d.depends_on))
    }
}

fn apply_rule(page: &mut Page, rule: &Rule) {
    page.rule = Some(rule.index);
    page.chain = rule.chain.clone();
    page.set_base_dest(rule.dest.apply(&page.source));
}
