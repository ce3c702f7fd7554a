//! Style aggregation
//!
//! Collects the base style sheet and per-section fragments during a pass and
//! publishes them as one `<style>` block. Publication is an upsert keyed by
//! the block id, so flushing again replaces rather than duplicates.

use crate::document::{HostDocument, StyleUpsert};
use crate::Result;
use sha2::{Digest, Sha256};

/// A style fragment contributed by one section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssFragment {
    pub key: String,
    pub css: String,
}

#[derive(Debug, Clone, Default)]
pub struct CssAggregator {
    style_id: String,
    base: Option<String>,
    fragments: Vec<CssFragment>,
}

impl CssAggregator {
    pub fn new(style_id: impl Into<String>) -> Self {
        Self {
            style_id: style_id.into(),
            base: None,
            fragments: Vec::new(),
        }
    }

    pub fn with_base(mut self, css: &str) -> Self {
        self.set_base(css);
        self
    }

    /// Set the shared style sheet emitted ahead of every fragment
    pub fn set_base(&mut self, css: &str) {
        self.base = Some(css.to_string()).filter(|s| !s.trim().is_empty());
    }

    /// Append a fragment for `key`. Blank fragments are ignored.
    pub fn collect(&mut self, key: &str, css: &str) {
        if css.trim().is_empty() {
            return;
        }
        self.fragments.push(CssFragment {
            key: key.to_string(),
            css: css.to_string(),
        });
    }

    pub fn fragments(&self) -> &[CssFragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_none() && self.fragments.is_empty()
    }

    /// The aggregated sheet: base first, then fragments in collection order,
    /// separated by blank lines.
    pub fn stylesheet(&self) -> String {
        let mut parts = Vec::with_capacity(self.fragments.len() + 1);
        if let Some(base) = &self.base {
            parts.push(base.clone());
        }
        for fragment in &self.fragments {
            parts.push(format!("/* {} css */\n{}", fragment.key, fragment.css));
        }
        parts.join("\n\n")
    }

    /// Hex sha256 of the aggregated sheet
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(self.stylesheet().as_bytes()))
    }

    /// Publish the sheet into `doc` under the block id.
    pub fn flush<D: HostDocument + ?Sized>(&self, doc: &mut D) -> Result<StyleUpsert> {
        if self.is_empty() {
            return Ok(StyleUpsert::Skipped);
        }
        doc.upsert_style(&self.style_id, &self.stylesheet(), &self.fingerprint())
    }
}
