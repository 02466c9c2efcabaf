//! Page-scoped build errors.
//!
//! None of these abort a pass: each is recorded against the page it
//! belongs to and the rest of the site keeps building.

use std::{fmt, io, path::PathBuf};
use thiserror::Error;

/// A processor failed; the page keeps its previous output.
#[derive(Debug, Clone, Error)]
#[error("{processor}: {message}")]
pub struct ProcessorError {
    pub processor: String,
    pub message: String,
}

impl ProcessorError {
    pub fn new(processor: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            processor: processor.into(),
            message: message.into(),
        }
    }
}

/// Pages that depend on each other in a loop, in edge order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct DependencyCycleError {
    pub pages: Vec<PathBuf>,
}

impl fmt::Display for DependencyCycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dependency cycle: ")?;
        for page in &self.pages {
            write!(f, "{} -> ", page.display())?;
        }
        match self.pages.first() {
            Some(first) => write!(f, "{}", first.display()),
            None => Ok(()),
        }
    }
}

/// Writing one output file failed. Not retried.
#[derive(Debug, Error)]
#[error("failed to write {}: {source}", dest.display())]
pub struct WriteError {
    pub dest: PathBuf,
    #[source]
    pub source: io::Error,
}

/// Why a page did not build in a pass.
#[derive(Debug, Error)]
pub enum PageFailure {
    #[error(transparent)]
    Processor(#[from] ProcessorError),

    #[error(transparent)]
    Cycle(#[from] DependencyCycleError),

    #[error("depends on a dependency cycle through {}", .0.display())]
    BlockedByCycle(PathBuf),

    #[error(transparent)]
    Write(#[from] WriteError),
}
