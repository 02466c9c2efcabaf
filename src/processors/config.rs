//! `config`: front matter → metadata.
//!
//! Two header styles are accepted:
//!
//! ```text
//! +++                        title: Hello
//! title = "Hello"            tags: rust, web
//! tags = ["rust", "web"]     ----
//! +++                        body…
//! body…
//! ```
//!
//! The header is stripped from the content. `tags` given as comma separated
//! text becomes a list.

use super::{ProcessContext, Processor, expect_args};
use crate::build::error::ProcessorError;
use crate::site::{Metadata, Page};
use serde_json::Value;

pub struct Config;

impl Processor for Config {
    fn name(&self) -> &'static str {
        "config"
    }

    fn description(&self) -> &'static str {
        "read front matter into page metadata"
    }

    fn process(
        &self,
        page: &mut Page,
        _ctx: &mut ProcessContext<'_>,
        args: &[String],
    ) -> Result<(), ProcessorError> {
        expect_args(self.name(), args, 0, 0, "")?;
        let content = page.content()?;
        let Some((header, body)) = parse_front_matter(content)? else {
            return Ok(());
        };
        let body = body.to_owned();
        for (key, value) in header {
            page.metadata.insert(key, value);
        }
        page.set_content(body);
        Ok(())
    }
}

/// Split `content` into metadata and body. `None` when there is no header.
fn parse_front_matter(content: &str) -> Result<Option<(Metadata, &str)>, ProcessorError> {
    let (mut meta, body) = if let Some(rest) = content.strip_prefix("+++") {
        let Some((toml_src, body)) = split_toml(rest) else {
            return Err(ProcessorError::new("config", "unterminated `+++` block"));
        };
        let table: toml::Table = toml::from_str(toml_src)
            .map_err(|e| ProcessorError::new("config", format!("invalid front matter: {e}")))?;
        let meta: Metadata = table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect();
        (meta, body)
    } else if let Some((header, body)) = split_text(content) {
        (parse_text(header)?, body)
    } else {
        return Ok(None);
    };

    if let Some(Value::String(tags)) = meta.get("tags") {
        let list = tags
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Value::String(t.to_owned()))
            .collect();
        meta.insert("tags".into(), Value::Array(list));
    }
    Ok(Some((meta, body)))
}

/// `rest` is everything after the opening `+++`.
fn split_toml(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.strip_prefix("\r\n").or_else(|| rest.strip_prefix('\n'))?;
    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "+++" {
            return Some((&rest[..offset], &rest[offset + line.len()..]));
        }
        offset += line.len();
    }
    None
}

/// Text header: `key: value` lines up to a line of four or more dashes.
fn split_text(content: &str) -> Option<(&str, &str)> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_end();
        if trimmed.len() >= 4 && trimmed.bytes().all(|b| b == b'-') {
            return Some((&content[..offset], &content[offset + line.len()..]));
        }
        if !trimmed.is_empty() && !trimmed.contains(':') {
            return None;
        }
        offset += line.len();
    }
    None
}

fn parse_text(header: &str) -> Result<Metadata, ProcessorError> {
    let mut meta = Metadata::new();
    for line in header.lines().filter(|l| !l.trim().is_empty()) {
        let Some((key, value)) = line.split_once(':') else {
            return Err(ProcessorError::new("config", format!("bad header line `{line}`")));
        };
        meta.insert(key.trim().to_lowercase(), Value::String(value.trim().to_owned()));
    }
    Ok(meta)
}

fn toml_to_json(value: toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::from(i),
        toml::Value::Float(f) => Value::from(f),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(d) => Value::String(d.to_string()),
        toml::Value::Array(items) => Value::Array(items.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
