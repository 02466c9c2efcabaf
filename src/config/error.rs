//! Configuration error types.
//!
//! Every variant is fatal: a build that hits one aborts before writing
//! anything to the output directory.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{0}`")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config file parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("Config validation error: {0}")]
    Validation(String),

    #[error("no rule matches `{0}` (add a rule or an ignore pattern)")]
    NoMatchingRule(PathBuf),

    #[error("malformed rule `{pattern}`: {reason}")]
    MalformedRule { pattern: String, reason: String },

    #[error("rule `{pattern}` uses unknown processor `{name}`")]
    UnknownProcessor { pattern: String, name: String },

    #[error("`{first}` and `{second}` both write `{dest}`")]
    DuplicateDestination {
        dest: PathBuf,
        first: PathBuf,
        second: PathBuf,
    },
}
