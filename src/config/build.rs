//! `[build]` section configuration.

use super::defaults;
use educe::Educe;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// `[build]` section in quire.toml.
///
/// # Example
/// ```toml
/// [build]
/// source = "src"
/// output = "site"
/// ignore = [".*", "drafts/*"]
/// ```
#[derive(Debug, Clone, Educe, Serialize, Deserialize)]
#[educe(Default)]
#[serde(deny_unknown_fields)]
pub struct BuildConfig {
    /// Source tree. Relative paths are resolved against the config file directory.
    #[serde(default = "defaults::build::source")]
    #[educe(Default = defaults::build::source())]
    pub source: PathBuf,

    /// Output tree served by the preview server.
    #[serde(default = "defaults::build::output")]
    #[educe(Default = defaults::build::output())]
    pub output: PathBuf,

    /// Files matching any of these patterns are skipped by discovery
    /// instead of failing with "no matching rule".
    #[serde(default = "defaults::build::ignore")]
    #[educe(Default = defaults::build::ignore())]
    pub ignore: Vec<String>,

    /// Upper bound on derived-page settle rounds within a single pass.
    #[serde(default = "defaults::build::max_rounds")]
    #[educe(Default = defaults::build::max_rounds())]
    pub max_rounds: usize,
}

#[cfg(test)]
mod tests {
    use super::super::SiteConfig;
    use std::path::PathBuf;

    #[test]
    fn test_build_config_defaults() {
        let config: SiteConfig = toml::from_str("").unwrap();

        assert_eq!(config.build.source, PathBuf::from("src"));
        assert_eq!(config.build.output, PathBuf::from("site"));
        assert_eq!(config.build.max_rounds, 8);
        assert!(config.build.ignore.iter().any(|p| p == ".*"));
    }

    #[test]
    fn test_build_config_override() {
        let config = r#"
            [build]
            source = "content"
            output = "public"
            ignore = ["drafts/*"]
        "#;
        let config: SiteConfig = toml::from_str(config).unwrap();

        assert_eq!(config.build.source, PathBuf::from("content"));
        assert_eq!(config.build.output, PathBuf::from("public"));
        assert_eq!(config.build.ignore, vec!["drafts/*".to_string()]);
    }

    #[test]
    fn test_unknown_field_rejection() {
        let config = r#"
            [build]
            minify = true
        "#;
        let result: Result<SiteConfig, _> = toml::from_str(config);

        assert!(result.is_err());
    }
}
