//! Running one page's processor chain.

use super::error::ProcessorError;
use crate::config::ProcessorCall;
use crate::processors::{DerivedPage, ProcessContext};
use crate::site::{Page, Site};

/// Run `page.chain` over `page`, starting from its raw content.
///
/// Processors run in chain order; the first failure aborts the rest of the
/// chain and the caller discards the partially processed copy.
pub fn apply(page: &mut Page, site: &Site) -> Result<Vec<DerivedPage>, ProcessorError> {
    page.reset_for_chain();
    let chain = std::mem::take(&mut page.chain);
    let result = run(&chain, page, site);
    page.chain = chain;
    result
}

fn run(
    chain: &[ProcessorCall],
    page: &mut Page,
    site: &Site,
) -> Result<Vec<DerivedPage>, ProcessorError> {
    let mut ctx = ProcessContext::new(site);
    for (i, call) in chain.iter().enumerate() {
        let processor = site.registry().get(&call.name).ok_or_else(|| {
            ProcessorError::new(call.name.as_str(), "no such processor")
        })?;
        ctx.set_remaining(&chain[i + 1..]);
        processor.process(page, &mut ctx, &call.args)?;
        if ctx.is_halted() {
            break;
        }
    }
    Ok(ctx.into_derived())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testing::Fixture;
    use std::path::Path;

    #[test]
    fn test_chain_runs_in_order_from_raw() {
        let fx = Fixture::new(
            r#"
            [[rule]]
            pattern = "*.md"
            processors = ["config", "markdown", "ext .html"]
            "#,
            &[("a.md", "+++\ntitle = \"A\"\n+++\n# Hi\n")],
        );
        let mut site = fx.site();
        site.discover().unwrap();

        let mut page = site.page(Path::new("a.md")).unwrap().clone();
        for _ in 0..2 {
            let derived = apply(&mut page, &site).unwrap();
            assert!(derived.is_empty());
            assert_eq!(page.content().unwrap(), "<h1>Hi</h1>\n");
            assert_eq!(page.meta_str("title"), Some("A"));
            assert_eq!(page.dest(), Path::new("a.html"));
            assert_eq!(page.chain.len(), 3);
        }
    }

    #[test]
    fn test_failure_aborts_chain() {
        let fx = Fixture::new(
            r#"
            [[rule]]
            pattern = "*.md"
            processors = ["template missing.html", "ext .html"]
            "#,
            &[("a.md", "x")],
        );
        let mut site = fx.site();
        site.discover().unwrap();

        let mut page = site.page(Path::new("a.md")).unwrap().clone();
        let err = apply(&mut page, &site).unwrap_err();
        assert_eq!(err.processor, "template");
        assert_eq!(page.dest(), Path::new("a.md"));
    }
}
