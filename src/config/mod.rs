//! Site configuration management for `quire.toml`.
//!
//! # Sections
//!
//! | Section     | Purpose                                        |
//! |-------------|------------------------------------------------|
//! | `[build]`   | Source/output trees, ignore patterns           |
//! | `[serve]`   | Preview server and watcher                     |
//! | `[[rule]]`  | Pattern → processor chain, in match order      |
//! | `[extra]`   | User-defined values, visible as `site.*`       |
//!
//! # Example
//!
//! ```toml
//! [build]
//! source = "src"
//! output = "site"
//!
//! [[rule]]
//! pattern = "*.md"
//! processors = ["config", "markdown", "template templates/page.html"]
//! dest = "{dir}/{stem}.html"
//!
//! [[rule]]
//! pattern = "templates/*"
//! processors = ["ignore"]
//!
//! [extra]
//! title = "My site"
//! ```

mod build;
pub mod defaults;
mod error;
mod rule;
mod serve;

pub use build::BuildConfig;
pub use error::ConfigError;
pub use rule::{ProcessorCall, RuleConfig};
pub use serve::ServeConfig;

use crate::cli::{Cli, Commands};
use crate::processors::ProcessorRegistry;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Root configuration structure representing quire.toml
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    /// Absolute path to the config file (set after loading)
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub serve: ServeConfig,

    /// Rules in declaration order. Order is the only tie-break.
    #[serde(default, rename = "rule")]
    pub rules: Vec<RuleConfig>,

    /// User-defined extra fields
    #[serde(default)]
    pub extra: toml::Table,
}

impl SiteConfig {
    /// Parse configuration from TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from file path, resolving `build.source` and
    /// `build.output` against the file's directory.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        let mut config = Self::from_str(&content)?;

        config.config_path = normalize_path(path);
        let root = config
            .config_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        config.set_root(&root);

        Ok(config)
    }

    /// Make `source` and `output` absolute relative to `root`.
    pub fn set_root(&mut self, root: &Path) {
        self.build.source = normalize_path(&root.join(&self.build.source));
        self.build.output = normalize_path(&root.join(&self.build.output));
    }

    /// Update configuration with CLI arguments
    pub fn update_with_cli(&mut self, cli: &Cli) {
        if let Commands::Serve {
            interface,
            port,
            no_watch,
            ..
        } = &cli.command
        {
            update_option(&mut self.serve.interface, interface.as_ref());
            update_option(&mut self.serve.port, port.as_ref());
            if *no_watch {
                self.serve.watch = false;
            }
        }
    }

    /// Check everything that can be checked without touching the source tree.
    ///
    /// Glob syntax is checked when the rule set is compiled.
    pub fn validate(&self, registry: &ProcessorRegistry) -> Result<(), ConfigError> {
        if self.rules.is_empty() {
            return Err(ConfigError::Validation(
                "at least one [[rule]] is required".into(),
            ));
        }
        if self.serve.debounce_ms == 0 {
            return Err(ConfigError::Validation(
                "[serve.debounce_ms] must be greater than zero".into(),
            ));
        }
        if self.build.max_rounds == 0 {
            return Err(ConfigError::Validation(
                "[build.max_rounds] must be greater than zero".into(),
            ));
        }
        if self.build.output.starts_with(&self.build.source) {
            return Err(ConfigError::Validation(
                "[build.output] must not be inside [build.source]".into(),
            ));
        }

        for rule in &self.rules {
            if rule.pattern.trim().is_empty() {
                return Err(ConfigError::MalformedRule {
                    pattern: rule.pattern.clone(),
                    reason: "empty pattern".into(),
                });
            }
            if let Some(call) = rule.processors.iter().find(|c| !registry.contains(&c.name)) {
                return Err(ConfigError::UnknownProcessor {
                    pattern: rule.pattern.clone(),
                    name: call.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Update config option if CLI value is provided
fn update_option<T: Clone>(config_option: &mut T, cli_option: Option<&T>) {
    if let Some(option) = cli_option {
        *config_option = option.clone();
    }
}

/// Normalize a path to absolute, using canonicalize if the path exists
fn normalize_path(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        }
    })
}
