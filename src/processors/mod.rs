//! Processor capability contract and the name → implementation registry.
//!
//! A rule names its chain as strings (`"template templates/page.html"`);
//! the registry resolves each name to a [`Processor`] trait object. The
//! registry is built once at startup and shared read-only.
//!
//! # Built-in processors
//!
//! | Name                     | Effect                                       |
//! |--------------------------|----------------------------------------------|
//! | `config`                 | front matter → metadata                      |
//! | `markdown`               | Markdown → HTML                              |
//! | `template`               | wrap content in a template page              |
//! | `inner-template`         | render the page itself as a template         |
//! | `ext`                    | change destination extension                 |
//! | `directorify`            | `a.html` → `a/index.html`                    |
//! | `rename`                 | destination from a template                  |
//! | `relativize`             | root-absolute links → relative links         |
//! | `tags`                   | one derived page per tag                     |
//! | `collect`                | list matching pages into `metadata.pages`    |
//! | `paginate`               | one derived page per group of matching pages |
//! | `paginate-collect-pages` | refresh a paginated page's `pages`           |
//! | `external`               | pipe content through a command               |
//! | `ignore`                 | process, never write                         |

mod collect;
mod config;
mod external;
mod ignore;
mod markdown;
mod paginate;
mod paths;
mod relativize;
mod tags;
pub mod template;

use crate::build::error::ProcessorError;
use crate::config::ProcessorCall;
use crate::site::{Metadata, Page, Site};
use rustc_hash::FxHashMap;
use std::{collections::BTreeSet, path::PathBuf};

/// One named transformation step.
///
/// Implementations see the page as left by the previous step and a
/// read-only view of the site. They must be deterministic in their inputs:
/// the same page, site state and arguments give byte-identical results.
pub trait Processor: Send + Sync {
    fn name(&self) -> &'static str;

    /// One-line description for `quire processors`.
    fn description(&self) -> &'static str;

    fn process(
        &self,
        page: &mut Page,
        ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError>;
}

/// A page synthesized by a processor.
///
/// `source` is a virtual path and the identity of the derived page. When
/// `chain` is `None` the page goes through the rule matching its virtual path.
#[derive(Debug, Clone)]
pub struct DerivedPage {
    pub source: PathBuf,
    pub raw: Vec<u8>,
    pub metadata: Metadata,
    pub dest: Option<PathBuf>,
    pub chain: Option<Vec<ProcessorCall>>,
    /// Pages whose content went into this one.
    pub depends_on: BTreeSet<PathBuf>,
}

impl DerivedPage {
    pub fn new(source: impl Into<PathBuf>, raw: Vec<u8>, metadata: Metadata) -> Self {
        Self {
            source: source.into(),
            raw,
            metadata,
            dest: None,
            chain: None,
            depends_on: BTreeSet::new(),
        }
    }
}

/// Everything a processor may touch besides the page itself.
pub struct ProcessContext<'a> {
    site: &'a Site,
    remaining: &'a [ProcessorCall],
    derived: Vec<DerivedPage>,
    halted: bool,
}

impl<'a> ProcessContext<'a> {
    pub fn new(site: &'a Site) -> Self {
        Self {
            site,
            remaining: &[],
            derived: Vec::new(),
            halted: false,
        }
    }

    pub fn site(&self) -> &'a Site {
        self.site
    }

    /// Steps after the one currently running.
    pub fn remaining_chain(&self) -> &'a [ProcessorCall] {
        self.remaining
    }

    pub(crate) fn set_remaining(&mut self, remaining: &'a [ProcessorCall]) {
        self.remaining = remaining;
    }

    /// Register a derived page. Registering the same virtual path twice in
    /// one chain keeps the last registration.
    pub fn register(&mut self, page: DerivedPage) {
        self.derived.retain(|d| d.source != page.source);
        self.derived.push(page);
    }

    /// Skip the rest of the chain for this page.
    pub fn halt(&mut self) {
        self.halted = true;
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.halted
    }

    pub(crate) fn into_derived(self) -> Vec<DerivedPage> {
        self.derived
    }
}

/// Immutable name → processor map.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: FxHashMap<&'static str, Box<dyn Processor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a processor; a later registration under the same name replaces the earlier one.
    pub fn with(mut self, processor: impl Processor + 'static) -> Self {
        self.processors.insert(processor.name(), Box::new(processor));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn Processor> {
        self.processors.get(name).map(Box::as_ref)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.processors.contains_key(name)
    }

    /// Processors sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &dyn Processor> {
        let mut all: Vec<_> = self.processors.values().map(Box::as_ref).collect();
        all.sort_by_key(|p| p.name());
        all.into_iter()
    }
}

impl std::fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.iter().map(|p| p.name())).finish()
    }
}

/// Registry with every built-in processor.
pub fn builtin() -> ProcessorRegistry {
    ProcessorRegistry::new()
        .with(config::Config)
        .with(markdown::Markdown)
        .with(template::Template)
        .with(template::InnerTemplate)
        .with(paths::Ext)
        .with(paths::Directorify)
        .with(paths::Rename)
        .with(relativize::Relativize)
        .with(tags::Tags)
        .with(collect::Collect)
        .with(paginate::Paginate)
        .with(paginate::PaginateCollectPages)
        .with(external::External)
        .with(ignore::Ignore)
}

/// Fail with a usage message unless `args` has between `min` and `max` entries.
fn expect_args(
    name: &str,
    args: &[String],
    min: usize,
    max: usize,
    usage: &str,
) -> Result<(), ProcessorError> {
    if args.len() < min || args.len() > max {
        return Err(ProcessorError::new(name, format!("usage: {name} {usage}")));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod testing {
    //! Site fixtures shared by processor and build tests.

    use super::*;
    use crate::config::SiteConfig;
    use std::{fs, path::Path, sync::Arc};
    use tempfile::TempDir;

    /// A temporary site: `quire.toml` plus source files.
    pub struct Fixture {
        pub dir: TempDir,
        pub config: Arc<SiteConfig>,
    }

    impl Fixture {
        pub fn new(config_toml: &str, files: &[(&str, &str)]) -> Self {
            let dir = TempDir::new().unwrap();
            let config_path = dir.path().join("quire.toml");
            fs::write(&config_path, config_toml).unwrap();
            for (path, content) in files {
                write_file(&dir.path().join("src").join(path), content);
            }
            let config = Arc::new(SiteConfig::load(&config_path).unwrap());
            Self { dir, config }
        }

        pub fn site(&self) -> Site {
            Site::new(Arc::clone(&self.config), Arc::new(builtin())).unwrap()
        }

        pub fn source(&self, rel: &str) -> PathBuf {
            self.config.build.source.join(rel)
        }

        pub fn output(&self, rel: &str) -> PathBuf {
            self.config.build.output.join(rel)
        }

        pub fn write(&self, rel: &str, content: &str) {
            write_file(&self.source(rel), content);
        }

        pub fn read_output(&self, rel: &str) -> String {
            fs::read_to_string(self.output(rel))
                .unwrap_or_else(|e| panic!("{rel}: {e}"))
        }
    }

    pub fn write_file(path: &Path, content: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Run one processor over `page` against `site`.
    pub fn run(
        site: &Site,
        page: &mut Page,
        name: &str,
        args: &[&str],
    ) -> Result<Vec<DerivedPage>, ProcessorError> {
        let registry = builtin();
        let processor = registry.get(name).unwrap();
        let args: Vec<String> = args.iter().map(|a| (*a).to_owned()).collect();
        let mut ctx = ProcessContext::new(site);
        processor.process(page, &mut ctx, &args)?;
        Ok(ctx.into_derived())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_names() {
        let registry = builtin();
        let names: Vec<_> = registry.iter().map(|p| p.name()).collect();
        assert_eq!(
            names,
            vec![
                "collect",
                "config",
                "directorify",
                "ext",
                "external",
                "ignore",
                "inner-template",
                "markdown",
                "paginate",
                "paginate-collect-pages",
                "relativize",
                "rename",
                "tags",
                "template",
            ]
        );
        assert!(registry.contains("markdown"));
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_expect_args() {
        let args = vec!["a".to_string()];
        assert!(expect_args("ext", &args, 1, 1, "<.ext>").is_ok());
        let err = expect_args("ext", &[], 1, 1, "<.ext>").unwrap_err();
        assert!(err.to_string().contains("usage: ext <.ext>"));
    }
}
