//! `external <command> [args…]`: pipe content through a program.
//!
//! The command runs in the source directory with the content on stdin; its
//! stdout becomes the new content. A non-zero exit fails the page with the
//! command's stderr.

use super::{ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::Page;
use std::{
    io::Write,
    process::{Command, Stdio},
    thread,
};

pub struct External;

impl Processor for External {
    fn name(&self) -> &'static str {
        "external"
    }

    fn description(&self) -> &'static str {
        "pipe content through an external command"
    }

    fn process(
        &self,
        page: &mut Page,
        ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 1, usize::MAX, "<command> [args...]")?;
        let error = |msg: String| ProcessorError::new("external", msg);
        let name = &args[0];

        let mut child = Command::new(name)
            .args(&args[1..])
            .current_dir(&ctx.site().config().build.source)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| error(format!("failed to spawn `{name}`: {e}")))?;

        let stdin = child.stdin.take();
        let input = &page.output;
        // Feed stdin from a second thread so a chatty child cannot block on a full stdout.
        let output = thread::scope(|s| {
            s.spawn(move || {
                if let Some(mut stdin) = stdin {
                    stdin.write_all(input).ok();
                }
            });
            child.wait_with_output()
        })
        .map_err(|e| error(format!("`{name}` failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(error(format!(
                "`{name}` exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        page.output = output.stdout;
        Ok(())
    }
}
