//! Debug overlay
//!
//! When the page config carries a debug payload, an `<aside>` dumping every
//! render decision is appended to the end of `<body>`. The overlay reads the
//! pass's state but never feeds back into it.

use crate::compositor::RenderState;
use crate::config::PageConfig;
use crate::document::HostDocument;
use crate::dom::{Element, Node};
use crate::template::truthy;
use crate::Result;
use log::warn;
use serde_json::Value;

pub const PANEL_CLASS: &str = "debug-panel";

pub struct DebugOverlay<'a> {
    panel_id: &'a str,
}

impl<'a> DebugOverlay<'a> {
    pub fn new(panel_id: &'a str) -> Self {
        Self { panel_id }
    }

    /// Build the overlay element
    pub fn build(&self, debug: &Value, page: &PageConfig, state: &RenderState) -> Result<Element> {
        let blocks: [(&str, Value); 7] = [
            ("Debug object", debug.clone()),
            ("Layout (final)", serde_json::to_value(&state.layout)?),
            ("Scores (combined)", page.scores.clone().unwrap_or(Value::Null)),
            (
                "Global scores (bandit)",
                page.global_scores.clone().unwrap_or(Value::Null),
            ),
            (
                "User scores (per-visitor)",
                page.user_scores.clone().unwrap_or(Value::Null),
            ),
            (
                "Customizations",
                Value::Object(page.customizations.clone()),
            ),
            ("Render state", serde_json::to_value(state)?),
        ];

        let mut panel = Element::new("aside")
            .with_attr("id", self.panel_id)
            .with_attr("class", PANEL_CLASS)
            .with_child(Element::new("strong").with_text("Recommendations Debug"))
            .with_child(
                Element::new("div")
                    .with_child(Element::new("em").with_text("Note:"))
                    .with_text(" all fields from server-side recommendations are shown below."),
            );
        for (title, value) in blocks {
            let pretty = serde_json::to_string_pretty(&value)?;
            panel.children.push(
                Element::new("div")
                    .with_child(Element::new("h4").with_text(title))
                    .with_child(Element::new("pre").with_text(pretty))
                    .into(),
            );
        }
        Ok(panel)
    }

    /// Append the overlay to `doc`. Returns whether an overlay was added;
    /// a falsy payload (`false`, `0`, `""`, `null`) adds nothing, and failures
    /// are logged and leave the document untouched.
    pub fn render<D: HostDocument + ?Sized>(
        &self,
        debug: Option<&Value>,
        page: &PageConfig,
        state: &RenderState,
        doc: &mut D,
    ) -> bool {
        let Some(debug) = debug.filter(|d| truthy(d)) else {
            return false;
        };
        let attempt = self
            .build(debug, page, state)
            .and_then(|panel| doc.append_to_body(Node::Element(panel)));
        match attempt {
            Ok(()) => true,
            Err(e) => {
                warn!("debug panel error: {}", e);
                false
            }
        }
    }
}
