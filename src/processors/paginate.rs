//! `paginate <size> <glob>`: split matching pages into fixed-size groups.
//!
//! N matching pages (discovery order) with page size K give `ceil(N/K)`
//! derived pages. Each one runs the rest of the origin's chain and sees:
//!
//! ```text
//! pages      [{url, title, source}, …]   this group only
//! paginator  {index, total, prev, next}  1-based; prev/next are URLs or null
//! ```
//!
//! Group 1 takes the origin's destination; group `i` gets `-i` appended to
//! the file stem (`blog/index.html` → `blog/index-2.html`). The origin itself
//! stops here and is not written.
//!
//! `paginate-collect-pages`, placed later in the chain, re-reads the group's
//! members from the site so `pages` reflects their current state.

use super::{DerivedPage, ProcessContext, Processor, collect, expect_args};
use crate::build::error::ProcessorError;
use crate::site::{Page, PathPattern, url_for};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};

pub struct Paginate;

impl Processor for Paginate {
    fn name(&self) -> &'static str {
        "paginate"
    }

    fn description(&self) -> &'static str {
        "split pages matching a glob into groups, one generated page per group"
    }

    fn process(
        &self,
        page: &mut Page,
        ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 2, 2, "<page size> <glob>")?;
        let size: usize = args[0]
            .parse()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                ProcessorError::new(self.name(), format!("bad page size `{}`", args[0]))
            })?;
        let pattern = PathPattern::new(&args[1])
            .map_err(|e| ProcessorError::new(self.name(), e.to_string()))?;
        page.dependency_globs.insert(args[1].clone());

        let site = ctx.site();
        let members: Vec<&Page> = site
            .pages_matching(&pattern)
            .filter(|p| p.source != page.source && !p.ignored)
            .collect();
        for member in &members {
            page.dependencies.insert(member.source.clone());
        }

        let groups: Vec<&[&Page]> = members.chunks(size).collect();
        let total = groups.len();
        let dests: Vec<PathBuf> = (1..=total).map(|i| group_dest(page.dest(), i)).collect();
        let content = page.output.clone();
        let chain = ctx.remaining_chain().to_vec();

        for (i, group) in groups.iter().enumerate() {
            let link = |j: Option<usize>| {
                j.and_then(|j| dests.get(j))
                    .map_or(Value::Null, |d| Value::String(url_for(d)))
            };

            let mut metadata = page.metadata.clone();
            metadata.insert(
                "pages".into(),
                Value::Array(group.iter().map(|p| Value::Object(collect::entry(p))).collect()),
            );
            metadata.insert(
                "paginator".into(),
                json!({
                    "index": i + 1,
                    "total": total,
                    "prev": link(i.checked_sub(1)),
                    "next": link(Some(i + 1)),
                }),
            );

            let source = format!("{}#{}", page.source.display(), i + 1);
            let mut derived = DerivedPage::new(source, content.clone(), metadata);
            derived.dest = Some(dests[i].clone());
            derived.chain = Some(chain.clone());
            derived.depends_on = group.iter().map(|p| p.source.clone()).collect();
            ctx.register(derived);
        }

        page.ignored = true;
        ctx.halt();
        Ok(())
    }
}

/// Refresh `pages` of a paginated page from the pages it lists.
pub struct PaginateCollectPages;

impl Processor for PaginateCollectPages {
    fn name(&self) -> &'static str {
        "paginate-collect-pages"
    }

    fn description(&self) -> &'static str {
        "re-read the current paginator group into metadata.pages"
    }

    fn process(
        &self,
        page: &mut Page,
        ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 0, 0, "")?;
        if !page.metadata.contains_key("paginator") {
            return Err(ProcessorError::new(self.name(), "page was not made by `paginate`"));
        }
        let sources: Vec<PathBuf> = match page.metadata.get("pages") {
            Some(Value::Array(entries)) => entries
                .iter()
                .filter_map(|e| e.get("source").and_then(Value::as_str))
                .map(PathBuf::from)
                .collect(),
            _ => Vec::new(),
        };

        let site = ctx.site();
        let mut entries = Vec::with_capacity(sources.len());
        for source in sources {
            if let Some(member) = site.page(&source) {
                entries.push(Value::Object(collect::entry(member)));
            }
            page.dependencies.insert(source);
        }
        page.metadata.insert("pages".into(), Value::Array(entries));
        Ok(())
    }
}

fn group_dest(base: &Path, index: usize) -> PathBuf {
    if index == 1 {
        return base.to_path_buf();
    }
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match base.extension() {
        Some(ext) => format!("{stem}-{index}.{}", ext.to_string_lossy()),
        None => format!("{stem}-{index}"),
    };
    base.with_file_name(name)
}
