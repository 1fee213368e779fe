use regex::Regex;
use std::sync::LazyLock;

use crate::error::{CatenaError, Result};
use crate::schema::ChainValues;

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*\.?([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").unwrap()
});

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Variable(String),
}

/// A parsed `{{variable}}` template
#[derive(Debug, Clone)]
pub struct Formatter {
    text: String,
    segments: Vec<Segment>,
    fields: Vec<String>,
}

impl Formatter {
    /// Parse a template. Unbalanced or malformed `{{ }}` is rejected here,
    /// not at render time.
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        let mut segments = Vec::new();
        let mut fields: Vec<String> = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_RE.captures_iter(&text) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            let literal = &text[last..whole.start()];
            check_literal(literal)?;
            if !literal.is_empty() {
                segments.push(Segment::Literal(literal.to_string()));
            }
            let name = name.as_str().to_string();
            if !fields.contains(&name) {
                fields.push(name.clone());
            }
            segments.push(Segment::Variable(name));
            last = whole.end();
        }

        let tail = &text[last..];
        check_literal(tail)?;
        if !tail.is_empty() {
            segments.push(Segment::Literal(tail.to_string()));
        }

        Ok(Self {
            text,
            segments,
            fields,
        })
    }

    /// Distinct variable names in order of first appearance
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Substitute every placeholder. Unused values are ignored.
    pub fn render(&self, values: &ChainValues) -> Result<String> {
        let mut out = String::with_capacity(self.text.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Variable(name) => {
                    let value = values
                        .get(name)
                        .ok_or_else(|| CatenaError::MissingVariable(name.clone()))?;
                    out.push_str(&value.render());
                }
            }
        }
        Ok(out)
    }
}

fn check_literal(literal: &str) -> Result<()> {
    if let Some(pos) = literal.find("{{") {
        return Err(CatenaError::Template(format!(
            "malformed placeholder near '{}'",
            literal[pos..].chars().take(20).collect::<String>()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_single_variable() {
        let formatter = Formatter::new("{{query}}").unwrap();
        let out = formatter
            .render(&ChainValues::from([("query", "x")]))
            .unwrap();
        assert_eq!(out, "x");
        assert_eq!(formatter.fields(), &["query".to_string()]);
    }

    #[test]
    fn test_missing_variable() {
        let formatter = Formatter::new("{{query}}").unwrap();
        let err = formatter.render(&ChainValues::new()).unwrap_err();
        assert!(matches!(err, CatenaError::MissingVariable(name) if name == "query"));
    }

    #[test]
    fn test_dot_syntax_and_whitespace() {
        let formatter = Formatter::new("Q: {{ .input }} / {{input}} / {{other}}").unwrap();
        assert_eq!(formatter.fields(), &["input".to_string(), "other".to_string()]);

        let out = formatter
            .render(&ChainValues::from([("input", "a"), ("other", "b"), ("unused", "c")]))
            .unwrap();
        assert_eq!(out, "Q: a / a / b");
    }

    #[test]
    fn test_unterminated_placeholder_rejected() {
        assert!(matches!(
            Formatter::new("hello {{name"),
            Err(CatenaError::Template(_))
        ));
        assert!(matches!(
            Formatter::new("{{ 1bad }}"),
            Err(CatenaError::Template(_))
        ));
    }

    #[test]
    fn test_literal_only() {
        let formatter = Formatter::new("no variables here").unwrap();
        assert!(formatter.fields().is_empty());
        assert_eq!(
            formatter.render(&ChainValues::new()).unwrap(),
            "no variables here"
        );
    }
}
