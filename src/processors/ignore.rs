//! `ignore`: run the chain but never publish the page.
//!
//! Templates and partials use this: they are pages others depend on, but
//! have no output of their own.

use super::{ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::Page;

pub struct Ignore;

impl Processor for Ignore {
    fn name(&self) -> &'static str {
        "ignore"
    }

    fn description(&self) -> &'static str {
        "process the page but do not write it"
    }

    fn process(
        &self,
        page: &mut Page,
        _ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 0, 0, "")?;
        page.ignored = true;
        Ok(())
    }
}
