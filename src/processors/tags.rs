//! `tags tags/{tag}.tag`: one derived page per tag.
//!
//! Every page carrying a tag registers the same derived page, so a tag page
//! ends up with one origin per tagged page. Its chain comes from the rule
//! matching the generated path, typically `collect tagged` plus a template.

use super::{DerivedPage, ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::{Metadata, Page};
use crate::utils::slug::slugify;
use serde_json::Value;
use std::collections::BTreeSet;

pub struct Tags;

impl Processor for Tags {
    fn name(&self) -> &'static str {
        "tags"
    }

    fn description(&self) -> &'static str {
        "generate a page per tag from a path template like tags/{tag}.tag"
    }

    fn process(
        &self,
        page: &mut Page,
        ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 1, 1, "<path template with {tag}>")?;
        let template = &args[0];
        if !template.contains("{tag}") {
            return Err(ProcessorError::new(
                self.name(),
                format!("`{template}` has no {{tag}} placeholder"),
            ));
        }

        let tags: BTreeSet<String> = page.meta_list("tags").into_iter().collect();
        for tag in tags {
            let mut metadata = Metadata::new();
            metadata.insert("tag".into(), Value::String(tag.clone()));
            metadata.insert("title".into(), Value::String(tag.clone()));

            let source = template.replace("{tag}", &slugify(&tag));
            let mut derived = DerivedPage::new(source, Vec::new(), metadata);
            derived.depends_on.insert(page.source.clone());
            ctx.register(derived);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testing::{Fixture, run};
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn test_one_page_per_tag() {
        let fx = Fixture::new("[[rule]]\npattern = \"*\"", &[]);
        let site = fx.site();
        let mut page = Page::from_source("post.md".into(), Vec::new());
        page.metadata.insert("tags".into(), json!(["Rust", "Web Dev", "Rust"]));

        let derived = run(&site, &mut page, "tags", &["tags/{tag}.tag"]).unwrap();
        let sources: Vec<_> = derived.iter().map(|d| d.source.clone()).collect();
        assert_eq!(
            sources,
            vec![PathBuf::from("tags/rust.tag"), PathBuf::from("tags/web-dev.tag")]
        );
        assert_eq!(derived[1].metadata["tag"], json!("Web Dev"));
        assert!(derived[0].depends_on.contains(&PathBuf::from("post.md")));
        assert!(derived[0].chain.is_none());
    }

    #[test]
    fn test_template_needs_placeholder() {
        let fx = Fixture::new("[[rule]]\npattern = \"*\"", &[]);
        let site = fx.site();
        let mut page = Page::from_source("post.md".into(), Vec::new());
        assert!(run(&site, &mut page, "tags", &["tags/all.tag"]).is_err());
    }
}
