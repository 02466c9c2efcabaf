//! Destination rewriting: `ext`, `directorify`, `rename`.

use super::{ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::{Page, rules::DestTemplate};
use std::path::{Path, PathBuf};

/// `ext .html`: replace the destination extension.
pub struct Ext;

impl Processor for Ext {
    fn name(&self) -> &'static str {
        "ext"
    }

    fn description(&self) -> &'static str {
        "change the destination extension"
    }

    fn process(
        &self,
        page: &mut Page,
        _ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 1, 1, "<.ext>")?;
        let ext = args[0].trim_start_matches('.');
        let dest = page.dest().with_extension(ext);
        page.set_dest(dest);
        Ok(())
    }
}

/// `a/b.html` → `a/b/index.html`; `index.html` files stay put.
pub struct Directorify;

impl Processor for Directorify {
    fn name(&self) -> &'static str {
        "directorify"
    }

    fn description(&self) -> &'static str {
        "move page.ext to page/index.ext"
    }

    fn process(
        &self,
        page: &mut Page,
        _ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 0, 0, "")?;
        let dest = directorify(page.dest());
        page.set_dest(dest);
        Ok(())
    }
}

fn directorify(dest: &Path) -> PathBuf {
    if dest.file_stem().is_some_and(|s| s == "index") {
        return dest.to_path_buf();
    }
    let index = match dest.extension() {
        Some(ext) => Path::new("index").with_extension(ext),
        None => PathBuf::from("index"),
    };
    dest.with_extension("").join(index)
}

/// `rename {dir}/{stem}/index.html`: rewrite the destination from a
/// template applied to the current destination.
pub struct Rename;

impl Processor for Rename {
    fn name(&self) -> &'static str {
        "rename"
    }

    fn description(&self) -> &'static str {
        "rewrite the destination from a {dir}/{stem}/{ext}/{name}/{path} template"
    }

    fn process(
        &self,
        page: &mut Page,
        _ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 1, 1, "<dest template>")?;
        let template =
            DestTemplate::new(&args[0]).map_err(|e| ProcessorError::new(self.name(), e))?;
        let dest = template.apply(page.dest());
        if dest.as_os_str().is_empty() {
            return Err(ProcessorError::new(self.name(), "template produced an empty path"));
        }
        page.set_dest(dest);
        Ok(())
    }
}
