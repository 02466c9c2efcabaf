//! `template` and `inner-template`: `{{ key }}` substitution.
//!
//! # Keys
//!
//! | Key            | Value                                   |
//! |----------------|-----------------------------------------|
//! | `content`      | current page content                    |
//! | `url`          | page URL                                |
//! | `source`       | source path                             |
//! | `dest`         | destination path                        |
//! | `site.KEY`     | `[extra]` value from `quire.toml`       |
//! | anything else  | dotted lookup into metadata             |
//!
//! Lists of strings are joined with `, `; lists of objects with a `url`
//! render as a `<ul>` of links. Missing keys render empty.
//!
//! # Filters
//!
//! A value can be piped through filters, applied left to right:
//! `{{ content | strip_html | excerpt 30 }}`.
//!
//! | Filter           | Effect                                               |
//! |------------------|------------------------------------------------------|
//! | `strip_html`     | drop every `<...>` tag                               |
//! | `strip_newlines` | drop `\r` and `\n`                                   |
//! | `excerpt N`      | first N words followed by ` [...]` if there are more |

use super::{ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::{Page, Site};
use regex::{Captures, Regex};
use serde_json::Value;
use std::{path::Path, sync::LazyLock};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z0-9_.\-]+)\s*((?:\|[^|}]*)*)\}\}").expect("placeholder regex")
});

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag regex"));

/// Wrap the page in a template page.
pub struct Template;

impl Processor for Template {
    fn name(&self) -> &'static str {
        "template"
    }

    fn description(&self) -> &'static str {
        "render a template page around the content"
    }

    fn process(
        &self,
        page: &mut Page,
        ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 1, 1, "<template path>")?;
        let path = Path::new(&args[0]);
        let site = ctx.site();

        page.dependencies.insert(path.to_path_buf());
        let template = site.page(path).ok_or_else(|| {
            ProcessorError::new(self.name(), format!("template `{}` not found", path.display()))
        })?;
        let source = std::str::from_utf8(&template.raw).map_err(|e| {
            ProcessorError::new(self.name(), format!("template `{}`: {e}", path.display()))
        })?;

        let rendered = render(source, page, site).map_err(|e| ProcessorError::new(self.name(), e))?;
        page.set_content(rendered);
        Ok(())
    }
}

/// Render the page's own content as a template.
pub struct InnerTemplate;

impl Processor for InnerTemplate {
    fn name(&self) -> &'static str {
        "inner-template"
    }

    fn description(&self) -> &'static str {
        "render the page content itself as a template"
    }

    fn process(
        &self,
        page: &mut Page,
        ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 0, 0, "")?;
        let rendered = render(page.content()?, page, ctx.site())
            .map_err(|e| ProcessorError::new(self.name(), e))?;
        page.set_content(rendered);
        Ok(())
    }
}

/// Substitute every `{{ key | filter ... }}` in `template` from `page` and `site`.
///
/// Fails on an unknown filter or a bad filter argument.
pub fn render(template: &str, page: &Page, site: &Site) -> Result<String, String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for cap in PLACEHOLDER.captures_iter(template) {
        let Some(whole) = cap.get(0) else {
            continue;
        };
        out.push_str(&template[last..whole.start()]);
        out.push_str(&substitute(&cap, page, site)?);
        last = whole.end();
    }
    out.push_str(&template[last..]);
    Ok(out)
}

fn substitute(cap: &Captures<'_>, page: &Page, site: &Site) -> Result<String, String> {
    let mut value = lookup(&cap[1], page, site);
    let filters = cap.get(2).map_or("", |m| m.as_str());
    for filter in filters.split('|').map(str::trim).filter(|f| !f.is_empty()) {
        value = apply_filter(filter, value)?;
    }
    Ok(value)
}

fn apply_filter(filter: &str, value: String) -> Result<String, String> {
    let mut parts = filter.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();
    match (name, args.as_slice()) {
        ("strip_html", []) => Ok(strip_html(&value)),
        ("strip_newlines", []) => Ok(strip_newlines(&value)),
        ("excerpt", [words]) => {
            let words = words
                .parse()
                .map_err(|_| format!("excerpt: bad word count `{words}`"))?;
            Ok(excerpt(&value, words))
        }
        ("strip_html" | "strip_newlines" | "excerpt", _) => {
            Err(format!("wrong arguments for filter `{filter}`"))
        }
        _ => Err(format!("unknown filter `{name}`")),
    }
}

pub fn strip_html(text: &str) -> String {
    TAG.replace_all(text, "").into_owned()
}

pub fn strip_newlines(text: &str) -> String {
    text.replace(['\r', '\n'], "")
}

/// The first `max_words` whitespace-separated words, with ` [...]` when
/// some were cut. Text that fits is returned unchanged.
pub fn excerpt(text: &str, max_words: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return text.to_owned();
    }
    if max_words == 0 {
        return String::new();
    }
    format!("{} [...]", words[..max_words].join(" "))
}

fn lookup(key: &str, page: &Page, site: &Site) -> String {
    match key {
        "content" => String::from_utf8_lossy(&page.output).into_owned(),
        "url" => page.url().to_owned(),
        "source" => page.source.display().to_string(),
        "dest" => page.dest().display().to_string(),
        _ => {
            if let Some(rest) = key.strip_prefix("site.") {
                let mut parts = rest.split('.');
                let first = parts.next().unwrap_or_default();
                let mut value = site.config().extra.get(first);
                for part in parts {
                    value = value.and_then(|v| v.get(part));
                }
                return value.map(display_toml).unwrap_or_default();
            }

            let mut parts = key.split('.');
            let first = parts.next().unwrap_or_default();
            let mut value = page.metadata.get(first);
            for part in parts {
                value = value.and_then(|v| match v {
                    Value::Array(items) => part.parse::<usize>().ok().and_then(|i| items.get(i)),
                    _ => v.get(part),
                });
            }
            value.map(display_json).unwrap_or_default()
        }
    }
}

fn display_json(value: &Value) -> String {
    match value {
        Value::Null | Value::Object(_) => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) if items.iter().all(|v| v.get("url").is_some()) && !items.is_empty() => {
            link_list(items)
        }
        Value::Array(items) => items
            .iter()
            .map(display_json)
            .collect::<Vec<_>>()
            .join(", "),
    }
}

fn display_toml(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Array(items) => items
            .iter()
            .map(display_toml)
            .collect::<Vec<_>>()
            .join(", "),
        toml::Value::Table(_) => String::new(),
        other => other.to_string(),
    }
}

fn link_list(items: &[Value]) -> String {
    let mut html = String::from("<ul>\n");
    for item in items {
        let url = item.get("url").map(display_json).unwrap_or_default();
        let title = item
            .get("title")
            .map(display_json)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| url.clone());
        html.push_str(&format!(
            "<li><a href=\"{}\">{}</a></li>\n",
            escape(&url),
            escape(&title)
        ));
    }
    html.push_str("</ul>");
    html
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::testing::{Fixture, run};
    use serde_json::json;

    const CONFIG: &str = r#"
        [[rule]]
        pattern = "templates/*"
        processors = ["ignore"]

        [[rule]]
        pattern = "*"
        dest = "{dir}/{stem}.html"

        [extra]
        title = "My Site"
        nav = { home = "/" }
    "#;

    fn fixture() -> Fixture {
        Fixture::new(
            CONFIG,
            &[
                ("templates/page.html", "<title>{{ title }} | {{site.title}}</title>\n{{ content }}"),
                ("a.md", "Hello"),
            ],
        )
    }

    #[test]
    fn test_render_keys() {
        let fx = fixture();
        let mut site = fx.site();
        site.discover().unwrap();
        let mut page = site.page(Path::new("a.md")).unwrap().clone();
        page.metadata.insert("title".into(), json!("A"));
        page.metadata.insert("tags".into(), json!(["x", "y"]));
        page.metadata.insert("paginator".into(), json!({"index": 2, "next": null}));

        let out = render(
            "{{url}} {{ source }} {{dest}} {{ tags }} {{paginator.index}} [{{paginator.next}}] [{{missing}}] {{site.nav.home}}",
            &page,
            &site,
        )
        .unwrap();
        assert_eq!(out, "/a.html a.md a.html x, y 2 [] [] /");
    }

    #[test]
    fn test_link_list() {
        let fx = fixture();
        let mut site = fx.site();
        site.discover().unwrap();
        let mut page = site.page(Path::new("a.md")).unwrap().clone();
        page.metadata.insert(
            "pages".into(),
            json!([{"url": "/b.html", "title": "B & co"}, {"url": "/c.html"}]),
        );
        assert_eq!(
            render("{{ pages }}", &page, &site).unwrap(),
            "<ul>\n<li><a href=\"/b.html\">B &amp; co</a></li>\n<li><a href=\"/c.html\">/c.html</a></li>\n</ul>"
        );
    }

    #[test]
    fn test_template_records_dependency() {
        let fx = fixture();
        let mut site = fx.site();
        site.discover().unwrap();
        let mut page = site.page(Path::new("a.md")).unwrap().clone();
        page.metadata.insert("title".into(), json!("A"));

        run(&site, &mut page, "template", &["templates/page.html"]).unwrap();
        assert_eq!(page.content().unwrap(), "<title>A | My Site</title>\nHello");
        assert!(page.dependencies.contains(Path::new("templates/page.html")));
    }

    #[test]
    fn test_missing_template() {
        let fx = fixture();
        let mut site = fx.site();
        site.discover().unwrap();
        let mut page = site.page(Path::new("a.md")).unwrap().clone();

        let err = run(&site, &mut page, "template", &["templates/nope.html"]).unwrap_err();
        assert_eq!(err.processor, "template");
        assert!(err.to_string().contains("templates/nope.html"));
    }

    #[test]
    fn test_strip_html() {
        for input in [
            r#"<a href="link.html">cruft</a>"#,
            "<b><span><div>cruf</div>t</span></b>",
            "<a>cruf</a>t",
            "<a ><span ><h1>cr</h1>u</span>f</a>t",
            "<br/>c<br/>r<br />u<br />ft",
        ] {
            assert_eq!(strip_html(input), "cruft", "{input}");
        }
    }

    #[test]
    fn test_strip_newlines() {
        for input in ["c\r\nr\r\nu\r\nft", "\r\n\r\n\r\n\r\n\r\ncru\r\nft"] {
            assert_eq!(strip_newlines(input), "cruft");
        }
    }

    #[test]
    fn test_excerpt() {
        let text = "The quick'ned brown fox, jumps; over the lazy doo-dawg.";
        let cases = [
            (0, ""),
            (1, "The [...]"),
            (3, "The quick'ned brown [...]"),
            (4, "The quick'ned brown fox, [...]"),
            (8, "The quick'ned brown fox, jumps; over the lazy [...]"),
            (99, "The quick'ned brown fox, jumps; over the lazy doo-dawg."),
        ];
        for (words, expected) in cases {
            assert_eq!(excerpt(text, words), expected, "{words} words");
        }
    }

    #[test]
    fn test_filters_in_placeholders() {
        let fx = fixture();
        let mut site = fx.site();
        site.discover().unwrap();
        let mut page = site.page(Path::new("a.md")).unwrap().clone();
        page.set_content("<p>One two\nthree four</p>");

        let out = render("{{ content | strip_html | excerpt 2 }}", &page, &site);
        assert_eq!(out.unwrap(), "One two [...]");
        let out = render("{{ content | strip_newlines | strip_html }}", &page, &site);
        assert_eq!(out.unwrap(), "One twothree four");
        assert_eq!(render("{{content|excerpt 9}}", &page, &site).unwrap(), page.content().unwrap());

        assert!(render("{{ content | shout }}", &page, &site).unwrap_err().contains("shout"));
        assert!(render("{{ content | excerpt many }}", &page, &site).is_err());
        assert!(render("{{ content | excerpt }}", &page, &site).is_err());
    }

    #[test]
    fn test_inner_template() {
        let fx = fixture();
        let mut site = fx.site();
        site.discover().unwrap();
        let mut page = site.page(Path::new("a.md")).unwrap().clone();
        page.set_content("Welcome to {{ site.title }}");
        run(&site, &mut page, "inner-template", &[]).unwrap();
        assert_eq!(page.content().unwrap(), "Welcome to My Site");
    }
}
