//! `markdown`: Markdown → HTML.

use super::{ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::Page;
use pulldown_cmark::{Options, Parser, html as md_html};

pub struct Markdown;

impl Processor for Markdown {
    fn name(&self) -> &'static str {
        "markdown"
    }

    fn description(&self) -> &'static str {
        "render Markdown content to HTML"
    }

    fn process(
        &self,
        page: &mut Page,
        _ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 0, 0, "")?;
        let html = render(page.content()?);
        page.set_content(html);
        Ok(())
    }
}

pub fn render(source: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS;
    let parser = Parser::new_ext(source, options);
    let mut html = String::with_capacity(source.len() * 3 / 2);
    md_html::push_html(&mut html, parser);
    html
}
