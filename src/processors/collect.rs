//! `collect <glob|tagged> [sort-key]`: list pages into `metadata.pages`.
//!
//! Each entry is `{url, title, source}` plus `date` when the page has one.
//! Entries follow discovery order, or descend by `sort-key` when given.
//! `tagged` lists the pages whose `tags` contain this page's `tag`, which is
//! what tag pages use.

use super::{ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::{Page, PathPattern};
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub struct Collect;

impl Processor for Collect {
    fn name(&self) -> &'static str {
        "collect"
    }

    fn description(&self) -> &'static str {
        "list pages matching a glob (or sharing this page's tag) into metadata.pages"
    }

    fn process(
        &self,
        page: &mut Page,
        ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 1, 2, "<glob|tagged> [sort-key]")?;
        let site = ctx.site();

        let members: Vec<&Page> = if args[0] == "tagged" {
            let tag = page
                .meta_str("tag")
                .ok_or_else(|| ProcessorError::new(self.name(), "page has no `tag` metadata"))?;
            site.pages()
                .filter(|p| p.meta_list("tags").iter().any(|t| t == tag))
                .collect()
        } else {
            let pattern = PathPattern::new(&args[0])
                .map_err(|e| ProcessorError::new(self.name(), e.to_string()))?;
            page.dependency_globs.insert(args[0].clone());
            site.pages_matching(&pattern).collect()
        };

        let mut members: Vec<&Page> = members
            .into_iter()
            .filter(|p| p.source != page.source && !p.ignored)
            .collect();
        if let Some(key) = args.get(1) {
            members.sort_by(|a, b| compare_by(b, a, key));
        }

        let entries = members
            .iter()
            .map(|p| {
                page.dependencies.insert(p.source.clone());
                Value::Object(entry(p))
            })
            .collect();
        page.metadata.insert("pages".into(), Value::Array(entries));
        Ok(())
    }
}

/// Listing entry for one page.
pub(super) fn entry(page: &Page) -> Map<String, Value> {
    let mut entry = Map::new();
    entry.insert("url".into(), Value::String(page.url().to_owned()));
    entry.insert("title".into(), Value::String(page.title()));
    entry.insert(
        "source".into(),
        Value::String(page.source.display().to_string()),
    );
    if let Some(date) = page.metadata.get("date") {
        entry.insert("date".into(), date.clone());
    }
    entry
}

/// Ascending order of `key`. Numbers compare numerically, strings
/// lexically; pages without a usable value sort first.
fn compare_by(a: &Page, b: &Page, key: &str) -> Ordering {
    match (a.metadata.get(key), b.metadata.get(key)) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let x = x.as_f64().unwrap_or_default();
            x.total_cmp(&y.as_f64().unwrap_or_default())
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (x, y) => rank(x).cmp(&rank(y)),
    }
}

fn rank(value: Option<&Value>) -> u8 {
    match value {
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        _ => 0,
    }
}
