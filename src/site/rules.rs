//! Rule matching: source path → processor chain and destination naming.
//!
//! First match in declaration order wins. Nothing but the path is
//! consulted, so the lookup is a pure function of the rule list.
//!
//! # Pattern semantics
//!
//! | Pattern      | Matched against        | Example hit        |
//! |--------------|------------------------|--------------------|
//! | `*.md`       | file name only         | `blog/post.md`     |
//! | `blog/*.md`  | whole relative path    | `blog/post.md`     |
//! | `blog/**`    | whole relative path    | `blog/2024/a.png`  |

use crate::config::{ConfigError, ProcessorCall, SiteConfig};
use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([a-z]+)\}").expect("placeholder regex"));

// ============================================================================
// Path patterns
// ============================================================================

/// A compiled glob over source-relative paths.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    matcher: GlobMatcher,
    name_only: bool,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, globset::Error> {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()?
            .compile_matcher();
        Ok(Self {
            raw: pattern.to_owned(),
            matcher,
            name_only: !pattern.contains('/'),
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        if self.name_only {
            path.file_name()
                .is_some_and(|name| self.matcher.is_match(Path::new(name)))
        } else {
            self.matcher.is_match(path)
        }
    }

    pub fn matches_any_component(&self, path: &Path) -> bool {
        if self.name_only {
            path.components()
                .any(|c| self.matcher.is_match(Path::new(c.as_os_str())))
        } else {
            self.matcher.is_match(path)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

// ============================================================================
// Destination naming
// ============================================================================

/// Destination-naming transform: `{path}`, `{dir}`, `{stem}`, `{ext}`, `{name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestTemplate(String);

impl DestTemplate {
    const KEYS: &[&str] = &["path", "dir", "stem", "ext", "name"];

    pub fn new(template: &str) -> Result<Self, String> {
        if template.trim().is_empty() {
            return Err("empty destination template".into());
        }
        for cap in PLACEHOLDER.captures_iter(template) {
            if !Self::KEYS.contains(&&cap[1]) {
                return Err(format!("unknown placeholder `{{{}}}`", &cap[1]));
            }
        }
        Ok(Self(template.to_owned()))
    }

    /// Destination for `source`, relative to the output root.
    pub fn apply(&self, source: &Path) -> PathBuf {
        let lossy = |p: Option<&std::ffi::OsStr>| {
            p.map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
        };
        let path = source.to_string_lossy().replace('\\', "/");
        let dir = source
            .parent()
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        let stem = lossy(source.file_stem());
        let ext = lossy(source.extension());
        let name = lossy(source.file_name());

        let rendered = PLACEHOLDER.replace_all(&self.0, |cap: &regex::Captures<'_>| {
            match &cap[1] {
                "path" => path.clone(),
                "dir" => dir.clone(),
                "stem" => stem.clone(),
                "ext" => ext.clone(),
                "name" => name.clone(),
                _ => String::new(),
            }
        });

        normalize_dest(&rendered)
    }
}

/// Drop empty segments so `{dir}/{stem}.html` works for top-level files.
pub fn normalize_dest(dest: &str) -> PathBuf {
    dest.split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect()
}

// ============================================================================
// Rules
// ============================================================================

#[derive(Debug, Clone)]
pub struct Rule {
    pub index: usize,
    pub pattern: PathPattern,
    pub deps: Vec<PathPattern>,
    pub chain: Vec<ProcessorCall>,
    pub dest: DestTemplate,
}

/// The compiled rule list plus ignore patterns.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
    ignore: Vec<PathPattern>,
}

impl RuleSet {
    pub fn new(config: &SiteConfig) -> Result<Self, ConfigError> {
        let malformed = |pattern: &str, reason: String| ConfigError::MalformedRule {
            pattern: pattern.to_owned(),
            reason,
        };

        let rules = config
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| {
                let pattern =
                    PathPattern::new(&rule.pattern).map_err(|e| malformed(&rule.pattern, e.to_string()))?;
                let deps = rule
                    .deps
                    .iter()
                    .map(|dep| {
                        PathPattern::new(dep)
                            .map_err(|e| malformed(&rule.pattern, format!("dependency `{dep}`: {e}")))
                    })
                    .collect::<Result<_, _>>()?;
                let dest = DestTemplate::new(&rule.dest).map_err(|e| malformed(&rule.pattern, e))?;
                Ok(Rule {
                    index,
                    pattern,
                    deps,
                    chain: rule.processors.clone(),
                    dest,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let ignore = config
            .build
            .ignore
            .iter()
            .map(|p| PathPattern::new(p).map_err(|e| malformed(p, e.to_string())))
            .collect::<Result<_, _>>()?;

        Ok(Self { rules, ignore })
    }

    /// First rule, in declaration order, whose pattern matches `path`.
    pub fn match_path(&self, path: &Path) -> Result<&Rule, ConfigError> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.matches(path))
            .ok_or_else(|| ConfigError::NoMatchingRule(path.to_path_buf()))
    }

    /// Name-only ignore patterns apply to every path component, so `.*`
    /// also hides files inside dot-directories.
    pub fn is_ignored(&self, path: &Path) -> bool {
        self.ignore.iter().any(|p| p.matches_any_component(path))
    }

    pub fn get(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(toml: &str) -> RuleSet {
        RuleSet::new(&SiteConfig::from_str(toml).unwrap()).unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let set = rules(
            r#"
            [[rule]]
            pattern = "index.md"
            processors = ["config"]

            [[rule]]
            pattern = "*.md"
            processors = ["markdown"]
            "#,
        );

        assert_eq!(set.match_path(Path::new("index.md")).unwrap().index, 0);
        assert_eq!(set.match_path(Path::new("about.md")).unwrap().index, 1);
        // name-only pattern matches in subdirectories too
        assert_eq!(set.match_path(Path::new("blog/index.md")).unwrap().index, 0);
    }

    #[test]
    fn test_match_is_deterministic() {
        let set = rules(
            r#"
            [[rule]]
            pattern = "blog/*.md"

            [[rule]]
            pattern = "*.md"
            "#,
        );
        for _ in 0..3 {
            assert_eq!(set.match_path(Path::new("blog/a.md")).unwrap().index, 0);
            assert_eq!(set.match_path(Path::new("blog/2024/a.md")).unwrap().index, 1);
        }
    }

    #[test]
    fn test_no_matching_rule() {
        let set = rules(
            r#"
            [[rule]]
            pattern = "*.md"
            "#,
        );
        let err = set.match_path(Path::new("logo.png")).unwrap_err();
        assert!(matches!(err, ConfigError::NoMatchingRule(p) if p == Path::new("logo.png")));
    }

    #[test]
    fn test_malformed_pattern() {
        let config = SiteConfig::from_str(
            r#"
            [[rule]]
            pattern = "blog/[*.md"
            "#,
        )
        .unwrap();
        assert!(matches!(
            RuleSet::new(&config),
            Err(ConfigError::MalformedRule { .. })
        ));
    }

    #[test]
    fn test_malformed_dest() {
        let config = SiteConfig::from_str(
            r#"
            [[rule]]
            pattern = "*.md"
            dest = "{slug}.html"
            "#,
        )
        .unwrap();
        let err = RuleSet::new(&config).unwrap_err();
        assert!(err.to_string().contains("{slug}"));
    }

    #[test]
    fn test_double_star() {
        let pattern = PathPattern::new("static/**").unwrap();
        assert!(pattern.matches(Path::new("static/css/site.css")));
        assert!(!pattern.matches(Path::new("blog/static.css")));
    }

    #[test]
    fn test_ignore_patterns() {
        let set = rules(
            r#"
            [build]
            ignore = [".*", "*~", "drafts/*"]

            [[rule]]
            pattern = "*"
            "#,
        );
        assert!(set.is_ignored(Path::new(".DS_Store")));
        assert!(set.is_ignored(Path::new("blog/.hidden/a.md")));
        assert!(set.is_ignored(Path::new("post.md~")));
        assert!(set.is_ignored(Path::new("drafts/wip.md")));
        assert!(!set.is_ignored(Path::new("blog/post.md")));
    }

    #[test]
    fn test_dest_template() {
        let t = DestTemplate::new("{dir}/{stem}.html").unwrap();
        assert_eq!(t.apply(Path::new("index.md")), PathBuf::from("index.html"));
        assert_eq!(t.apply(Path::new("blog/a.md")), PathBuf::from("blog/a.html"));

        let t = DestTemplate::new("{path}").unwrap();
        assert_eq!(t.apply(Path::new("css/site.css")), PathBuf::from("css/site.css"));

        let t = DestTemplate::new("{dir}/{stem}/index.{ext}").unwrap();
        assert_eq!(t.apply(Path::new("blog/a.html")), PathBuf::from("blog/a/index.html"));
    }
}
