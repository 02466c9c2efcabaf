//! The per-file build record.

use crate::build::error::ProcessorError;
use crate::config::ProcessorCall;
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    path::{Path, PathBuf},
};

/// Ordered string-keyed page metadata (front matter plus processor output).
pub type Metadata = serde_json::Map<String, Value>;

/// Content hash recorded per page.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint(blake3::Hash);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes))
    }

    /// Hash several byte slices as one stream.
    pub fn of_parts<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Self {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Self(hasher.finalize())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.0.to_hex()[..12])
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.0.to_hex().as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PageKind {
    /// Discovered from a file in the source tree.
    Source,
    /// Registered by a processor (tag page, pagination group).
    Derived,
}

/// One unit of source content plus its build state.
///
/// `source` is the identity: the path relative to the source tree, or a
/// virtual path for derived pages. Other pages are referenced only by that
/// path, never owned.
#[derive(Debug, Clone, Serialize)]
pub struct Page {
    pub source: PathBuf,
    pub kind: PageKind,

    dest: PathBuf,
    url: String,
    /// Destination before any processor ran; every chain starts from it.
    #[serde(skip)]
    base_dest: PathBuf,

    pub metadata: Metadata,
    /// Metadata every chain starts from: empty for source pages, the
    /// registered values for derived pages.
    #[serde(skip)]
    pub(crate) seed: Metadata,

    #[serde(skip)]
    pub raw: Vec<u8>,
    #[serde(skip)]
    pub output: Vec<u8>,

    /// Index into the rule list, set once at discovery.
    pub rule: Option<usize>,
    pub chain: Vec<ProcessorCall>,

    /// Recorded by the last successful chain.
    pub dependencies: BTreeSet<PathBuf>,
    /// Globs recorded by the last successful chain; pages that later start
    /// matching one also count as dependencies.
    pub dependency_globs: BTreeSet<String>,
    /// Derived pages only: origin page → the pages it reported as contributing.
    pub origins: BTreeMap<PathBuf, BTreeSet<PathBuf>>,

    /// Fingerprint of the current source state.
    pub fingerprint: Fingerprint,
    pub last_build: Option<Fingerprint>,
    pub stale: bool,
    /// Processed but never written.
    pub ignored: bool,
    /// Needs another run: its origin set changed, or its last chain read a
    /// page before that page was processed.
    #[serde(skip)]
    pub(crate) dirty: bool,
    /// Output path of the last successful write, relative to the output root.
    pub written: Option<PathBuf>,
}

impl Page {
    pub fn from_source(source: PathBuf, raw: Vec<u8>) -> Self {
        let fingerprint = Fingerprint::of(&raw);
        Self::new(source, PageKind::Source, raw, Metadata::new(), fingerprint)
    }

    /// A page registered by a processor. Its fingerprint covers content and
    /// seed metadata so an identical re-registration is not a change.
    pub fn derived(source: PathBuf, raw: Vec<u8>, metadata: Metadata) -> Self {
        let meta_bytes = serde_json::to_vec(&metadata).unwrap_or_default();
        let fingerprint = Fingerprint::of_parts([
            raw.as_slice(),
            meta_bytes.as_slice(),
            source.as_os_str().as_encoded_bytes(),
        ]);
        Self::new(source, PageKind::Derived, raw, metadata, fingerprint)
    }

    fn new(
        source: PathBuf,
        kind: PageKind,
        raw: Vec<u8>,
        seed: Metadata,
        fingerprint: Fingerprint,
    ) -> Self {
        let dest = source.clone();
        Self {
            url: url_for(&dest),
            base_dest: dest.clone(),
            dest,
            source,
            kind,
            metadata: seed.clone(),
            seed,
            output: raw.clone(),
            raw,
            rule: None,
            chain: Vec::new(),
            dependencies: BTreeSet::new(),
            dependency_globs: BTreeSet::new(),
            origins: BTreeMap::new(),
            fingerprint,
            last_build: None,
            stale: false,
            ignored: false,
            dirty: false,
            written: None,
        }
    }

    pub fn is_derived(&self) -> bool {
        self.kind == PageKind::Derived
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Rewrite the destination; the site URL follows.
    pub fn set_dest(&mut self, dest: impl Into<PathBuf>) {
        self.dest = dest.into();
        self.url = url_for(&self.dest);
    }

    /// Set the destination chosen by the rule's naming transform.
    pub(crate) fn set_base_dest(&mut self, dest: PathBuf) {
        self.base_dest = dest.clone();
        self.set_dest(dest);
    }

    /// Replace source bytes with a freshly read version.
    pub fn refresh(&mut self, raw: Vec<u8>) {
        self.fingerprint = Fingerprint::of(&raw);
        self.raw = raw;
    }

    /// Take over content and seed metadata from a re-registration of the
    /// same derived page. Returns whether anything changed.
    pub(crate) fn replace_derived(&mut self, other: Page) -> bool {
        if self.fingerprint == other.fingerprint {
            return false;
        }
        self.fingerprint = other.fingerprint;
        self.raw = other.raw;
        self.seed = other.seed;
        true
    }

    /// Reset processor-visible state so a chain always starts from the same input.
    pub(crate) fn reset_for_chain(&mut self) {
        self.output = self.raw.clone();
        self.metadata = self.seed.clone();
        self.dest = self.base_dest.clone();
        self.url = url_for(&self.dest);
        self.dependencies.clear();
        self.dependency_globs.clear();
        self.ignored = false;
    }

    /// Take over what a chain produced on a copy of this record.
    ///
    /// Table-owned state (origins, source bytes) stays as it is: another
    /// page may have re-registered this one while its chain ran, in which
    /// case the fingerprint no longer matches and the page stays stale.
    pub(crate) fn absorb(&mut self, built: Page) {
        if self.origins == built.origins {
            self.dirty = false;
        }
        self.last_build = Some(built.fingerprint);
        self.metadata = built.metadata;
        self.output = built.output;
        self.dest = built.dest;
        self.url = built.url;
        self.dependencies = built.dependencies;
        self.dependency_globs = built.dependency_globs;
        self.ignored = built.ignored;
    }

    /// Whether other pages would read the same values from `self` and `other`.
    pub(crate) fn same_view(&self, other: &Page) -> bool {
        self.metadata == other.metadata
            && self.output == other.output
            && self.dest == other.dest
            && self.ignored == other.ignored
    }

    /// Every page this one depends on, by source path.
    pub fn all_dependencies(&self) -> impl Iterator<Item = &PathBuf> {
        self.dependencies
            .iter()
            .chain(self.origins.keys())
            .chain(self.origins.values().flatten())
    }

    /// Whether the page needs a run regardless of the dependency graph.
    pub fn needs_build(&self) -> bool {
        self.dirty || self.last_build != Some(self.fingerprint)
    }

    /// Current output as text.
    pub fn content(&self) -> Result<&str, ProcessorError> {
        std::str::from_utf8(&self.output)
            .map_err(|e| ProcessorError::new("content", format!("not valid UTF-8: {e}")))
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.output = content.into().into_bytes();
    }

    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// `title` metadata, falling back to the file stem.
    pub fn title(&self) -> String {
        self.meta_str("title").map(str::to_owned).unwrap_or_else(|| {
            self.source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }

    /// String list metadata; a single string counts as a one-element list.
    pub fn meta_list(&self, key: &str) -> Vec<String> {
        match self.metadata.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }
}

/// Site-relative URL for a destination path; `index.html` maps to its directory.
pub fn url_for(dest: &Path) -> String {
    let mut url = String::from("/");
    let parts: Vec<_> = dest
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect();
    url.push_str(&parts.join("/"));
    if let Some(dir) = url.strip_suffix("index.html") {
        return dir.to_owned();
    }
    url
}
