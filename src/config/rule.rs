//! `[[rule]]` entries: pattern → processor chain bindings.

use super::defaults;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// One `[[rule]]` table.
///
/// ```toml
/// [[rule]]
/// pattern = "blog/*.md"
/// deps = ["templates/*.html"]
/// processors = ["config", "markdown", "template templates/post.html"]
/// dest = "{dir}/{stem}/index.html"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    pub pattern: String,

    /// Globs of source paths every matched page depends on.
    #[serde(default)]
    pub deps: Vec<String>,

    #[serde(default)]
    pub processors: Vec<ProcessorCall>,

    /// Destination template, see [`crate::site::rules::DestTemplate`].
    #[serde(default = "defaults::rule::dest")]
    pub dest: String,
}

/// A processor name with its whitespace-separated arguments,
/// written as a single string: `"paginate 10 blog/*.md"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProcessorCall {
    pub name: String,
    pub args: Vec<String>,
}

impl ProcessorCall {
    pub fn new(name: impl Into<String>, args: &[&str]) -> Self {
        Self {
            name: name.into(),
            args: args.iter().map(|a| (*a).to_owned()).collect(),
        }
    }
}

impl FromStr for ProcessorCall {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let name = words.next().ok_or("empty processor call")?.to_owned();
        Ok(Self {
            name,
            args: words.map(str::to_owned).collect(),
        })
    }
}

impl TryFrom<String> for ProcessorCall {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ProcessorCall> for String {
    fn from(call: ProcessorCall) -> Self {
        call.to_string()
    }
}

impl fmt::Display for ProcessorCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}
