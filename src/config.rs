//! Page configuration and input loading
//!
//! A host page embeds three named blocks:
//! - `page-config`: JSON [`PageConfig`]
//! - `page-sections`: JSON section registry (optional)
//! - `page-css`: the shared base style sheet (raw text)

use crate::registry::SectionRegistry;
use crate::{Error, Result};
use log::{debug, warn};
use scraper::{Html, Selector};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const CONFIG_BLOCK_ID: &str = "page-config";
pub const SECTIONS_BLOCK_ID: &str = "page-sections";
pub const CSS_BLOCK_ID: &str = "page-css";

/// Render decisions supplied by the recommendation side
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Section order; absent (or not an array) means registry order
    #[serde(default, deserialize_with = "lenient_layout")]
    pub layout: Option<Vec<String>>,
    /// Per-section override data, keyed by section key
    #[serde(default)]
    pub customizations: Map<String, Value>,
    /// Free-form diagnostic payload; enables the debug overlay
    #[serde(default)]
    pub debug: Option<Value>,
    #[serde(default)]
    pub scores: Option<Value>,
    #[serde(default)]
    pub global_scores: Option<Value>,
    #[serde(default)]
    pub user_scores: Option<Value>,
}

fn lenient_layout<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(
            items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => s,
                    other => other.to_string(),
                })
                .collect(),
        ),
        Some(other) => {
            warn!("Ignoring layout that is not an array: {}", other);
            None
        }
    })
}

impl PageConfig {
    /// Parse the `page-config` block. Blank input yields an empty config.
    pub fn from_json(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(text).map_err(|e| Error::ConfigError(format!("page-config: {}", e)))
    }

    /// Customization for `key`, or an empty one when none (or a non-object)
    /// was supplied.
    pub fn customization(&self, key: &str) -> Customization {
        match self.customizations.get(key) {
            Some(Value::Object(fields)) => Customization::from_fields(fields.clone()),
            Some(other) => {
                debug!("Ignoring non-object customization for '{}': {}", key, other);
                Customization::default()
            }
            None => Customization::default(),
        }
    }
}

/// Override data for one section
///
/// All fields are visible to the section's template expressions. `css` and
/// `style` additionally drive the style aggregator and the post-insert style
/// override when they are non-empty strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Customization(Map<String, Value>);

impl Customization {
    pub fn from_fields(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn css(&self) -> Option<&str> {
        self.non_empty_str("css")
    }

    pub fn style(&self) -> Option<&str> {
        self.non_empty_str("style")
    }

    fn non_empty_str(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Everything a composition pass reads, loaded once per page
#[derive(Debug, Clone, Default)]
pub struct PageInputs {
    pub config: PageConfig,
    pub registry: SectionRegistry,
    pub base_css: String,
}

impl PageInputs {
    /// Build from the raw block contents; absent blocks are treated as empty.
    pub fn from_parts(
        config: Option<&str>,
        sections: Option<&str>,
        base_css: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            config: PageConfig::from_json(config.unwrap_or_default())?,
            registry: SectionRegistry::from_json(sections.unwrap_or_default())?,
            base_css: base_css.unwrap_or_default().to_string(),
        })
    }

    /// Read the input blocks out of a host HTML document
    pub fn from_html(html: &str) -> Result<Self> {
        let document = Html::parse_document(html);
        let config = block_text(&document, CONFIG_BLOCK_ID)?;
        let sections = block_text(&document, SECTIONS_BLOCK_ID)?;
        let css = block_text(&document, CSS_BLOCK_ID)?;
        if sections.is_none() {
            debug!("No #{} block; registry is empty", SECTIONS_BLOCK_ID);
        }
        Self::from_parts(config.as_deref(), sections.as_deref(), css.as_deref())
    }
}

fn block_text(document: &Html, id: &str) -> Result<Option<String>> {
    let selector = Selector::parse(&format!("#{}", id))
        .map_err(|e| Error::ConfigError(format!("invalid block id '{}': {:?}", id, e)))?;
    Ok(document
        .select(&selector)
        .next()
        .map(|node| node.text().collect::<String>()))
}
