//! `relativize`: root-absolute `href`/`src` → paths relative to the page.
//!
//! Lets the output tree be opened straight from disk or served below a
//! sub-path.

use super::{ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::Page;
use regex::{Captures, Regex};
use std::{path::Path, sync::LazyLock};

static ABSOLUTE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\b(href|src)=(["'])/([^/"'][^"']*|)(["'])"#).expect("link regex")
});

pub struct Relativize;

impl Processor for Relativize {
    fn name(&self) -> &'static str {
        "relativize"
    }

    fn description(&self) -> &'static str {
        "make root-absolute links relative to the page"
    }

    fn process(
        &self,
        page: &mut Page,
        _ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 0, 0, "")?;
        let rewritten = relativize(page.content()?, page.dest());
        page.set_content(rewritten);
        Ok(())
    }
}

fn relativize(html: &str, dest: &Path) -> String {
    let depth = dest.components().count().saturating_sub(1);
    let up = "../".repeat(depth);

    ABSOLUTE_LINK
        .replace_all(html, |cap: &Captures<'_>| {
            let target = &cap[3];
            let relative = match (up.as_str(), target) {
                ("", "") => "./".to_owned(),
                (up, target) => format!("{up}{target}"),
            };
            format!("{}={}{}{}", &cap[1], &cap[2], relative, &cap[4])
        })
        .into_owned()
}
