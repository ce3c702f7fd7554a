//! Section registry: key → template, in declaration order.

use crate::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// One registered section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionTemplate {
    #[serde(skip)]
    pub key: String,
    /// Markup with embedded `{{ expr }}` expressions
    #[serde(rename = "html", alias = "markup")]
    pub markup: String,
    /// Default style fragment collected whenever the section renders
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css: Option<String>,
}

impl SectionTemplate {
    pub fn new(key: impl Into<String>, markup: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            markup: markup.into(),
            css: None,
        }
    }

    pub fn with_css(mut self, css: impl Into<String>) -> Self {
        self.css = Some(css.into());
        self
    }
}

/// Ordered mapping of section key to template
///
/// Iteration order is the order in which keys were first inserted; this is
/// the fallback layout when a page config carries none.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SectionRegistry {
    sections: Vec<SectionTemplate>,
    index: HashMap<String, usize>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. Re-registering a key replaces its template but
    /// keeps its original position.
    pub fn insert(&mut self, template: SectionTemplate) {
        match self.index.get(&template.key) {
            Some(&i) => self.sections[i] = template,
            None => {
                self.index.insert(template.key.clone(), self.sections.len());
                self.sections.push(template);
            }
        }
    }

    /// Builder-style registration
    pub fn with_section(mut self, key: &str, markup: &str) -> Self {
        self.insert(SectionTemplate::new(key, markup));
        self
    }

    pub fn get(&self, key: &str) -> Option<&SectionTemplate> {
        self.index.get(key).map(|&i| &self.sections[i])
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    /// Keys in natural (declaration) order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.sections.iter().map(|s| s.key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SectionTemplate> {
        self.sections.iter()
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Parse a `page-sections` block: a JSON object mapping each key to
    /// `{"html": ..., "css": ...}` or directly to a markup string.
    ///
    /// Entries of any other shape are skipped with a warning.
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::new());
        }
        let value: Value = serde_json::from_str(text)
            .map_err(|e| Error::ConfigError(format!("page-sections: {}", e)))?;
        let Value::Object(entries) = value else {
            return Err(Error::ConfigError(
                "page-sections: expected a JSON object".into(),
            ));
        };

        let mut registry = Self::new();
        for (key, entry) in entries {
            let template = match entry {
                Value::String(markup) => SectionTemplate::new(key, markup),
                Value::Object(_) => match serde_json::from_value::<SectionTemplate>(entry) {
                    Ok(mut t) => {
                        t.key = key;
                        t
                    }
                    Err(e) => {
                        warn!("Skipping section '{}': {}", key, e);
                        continue;
                    }
                },
                other => {
                    warn!("Skipping section '{}': unexpected value {}", key, other);
                    continue;
                }
            };
            registry.insert(template);
        }
        Ok(registry)
    }
}

impl FromIterator<SectionTemplate> for SectionRegistry {
    fn from_iter<I: IntoIterator<Item = SectionTemplate>>(iter: I) -> Self {
        let mut registry = Self::new();
        for template in iter {
            registry.insert(template);
        }
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_json_preserves_declaration_order() {
        let reg = SectionRegistry::from_json(
            r#"{"pricing": {"html": "<div></div>"}, "hero": {"html": "<h1></h1>", "css": "h1{}"}, "faq": "<dl></dl>"}"#,
        )
        .unwrap();
        assert_eq!(reg.keys().collect::<Vec<_>>(), vec!["pricing", "hero", "faq"]);
        assert_eq!(reg.get("hero").unwrap().css.as_deref(), Some("h1{}"));
        assert_eq!(reg.get("faq").unwrap().markup, "<dl></dl>");
    }

    #[test]
    fn markup_alias_is_accepted() {
        let reg = SectionRegistry::from_json(r#"{"a": {"markup": "<p></p>"}}"#).unwrap();
        assert_eq!(reg.get("a").unwrap().markup, "<p></p>");
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let reg = SectionRegistry::from_json(r#"{"a": 3, "b": {"css": "x"}, "c": "<p></p>"}"#).unwrap();
        assert_eq!(reg.keys().collect::<Vec<_>>(), vec!["c"]);
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        assert!(matches!(
            SectionRegistry::from_json("{not json"),
            Err(Error::ConfigError(_))
        ));
        assert!(SectionRegistry::from_json("[]").is_err());
        assert!(SectionRegistry::from_json("  ").unwrap().is_empty());
    }

    #[test]
    fn reinsert_keeps_position() {
        let mut reg = SectionRegistry::new().with_section("a", "1").with_section("b", "2");
        reg.insert(SectionTemplate::new("a", "3"));
        assert_eq!(reg.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(reg.get("a").unwrap().markup, "3");
    }
}
