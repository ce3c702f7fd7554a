//! Pagebuilder
//!
//! Composes a landing page out of independently templated sections. The
//! inputs are three data blocks embedded in a host HTML document: the page
//! configuration (layout order, per-section customizations, debug payload),
//! the section registry, and a shared base style sheet.
//!
//! # Features
//!
//! - **Sandboxed templates**: section markup embeds `{{ expr }}` expressions
//!   evaluated by a small interpreter that can only read the section's
//!   customization fields
//! - **Typed output**: rendered markup is parsed into a [`dom::Node`] tree and
//!   serialized only at the document boundary
//! - **Safe degradation**: unknown sections render a placeholder, broken
//!   templates fall back to their raw text, a missing render root is a no-op
//!
//! # Example
//!
//! ```
//! use pagebuilder::{BuilderConfig, render_page};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let html = r#"<html><head></head><body>
//! <div id="page-root"></div>
//! <script id="page-sections" type="application/json">{"hero": {"html": "<h1>{{title}}</h1>"}}</script>
//! <script id="page-config" type="application/json">{"customizations": {"hero": {"title": "Hi"}}}</script>
//! </body></html>"#;
//!
//! let (output, state) = render_page(html, BuilderConfig::default())?;
//! assert!(output.contains("<h1 data-section=\"hero\">Hi</h1>"));
//! assert_eq!(state.rendered, vec!["hero".to_string()]);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod compositor;
pub mod config;
pub mod css;
pub mod debug;
pub mod document;
pub mod dom;
pub mod layout;
pub mod registry;
pub mod session;
pub mod template;

pub use compositor::{Compositor, RenderState};
pub use config::{Customization, PageConfig, PageInputs};
pub use css::CssAggregator;
pub use debug::DebugOverlay;
pub use document::{HostDocument, PageDocument, StyleUpsert};
pub use dom::{Element, Node};
pub use layout::{resolve_layout, LayoutSource, ResolvedLayout};
pub use registry::{SectionRegistry, SectionTemplate};
pub use session::{SessionProvider, SubscriptionId};
pub use template::{EvalError, TemplateRenderer};

/// Configuration for a composition pass
///
/// The defaults match the identifiers used by the hosting pages:
/// - sections are inserted under `#page-root`
/// - the aggregated style sheet is published as `<style id="ai-custom-css">`
/// - sections are located through their `data-section` attribute
///
/// # Examples
///
/// ```
/// let cfg = pagebuilder::BuilderConfig::default();
/// assert_eq!(cfg.root_id, "page-root");
/// assert!(cfg.enable_debug_overlay);
/// ```
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Id of the container sections are appended to
    pub root_id: String,
    /// Id under which the aggregated style block is published
    pub style_block_id: String,
    /// Id given to the debug overlay element
    pub debug_panel_id: String,
    /// Attribute carrying a section's key on its rendered element
    pub marker_attribute: String,
    /// Attribute on `<body>` carrying the current session identifier
    pub session_attribute: String,
    /// Whether a debug payload in the page config produces an overlay
    pub enable_debug_overlay: bool,
    /// Treat references to missing customization fields as evaluation errors
    pub strict_fields: bool,
    /// Drop `<script>` elements and inline `on*` handlers from rendered sections
    pub strip_scripts: bool,
    /// Stamp the marker attribute onto a section's first element when the
    /// template does not carry it
    pub stamp_section_marker: bool,
    /// Maximum nesting depth of a single template expression
    pub expression_depth_limit: usize,
    /// Maximum number of expressions in a single template
    pub expression_limit: usize,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            root_id: "page-root".to_string(),
            style_block_id: "ai-custom-css".to_string(),
            debug_panel_id: "builder-debug".to_string(),
            marker_attribute: "data-section".to_string(),
            session_attribute: "data-session-id".to_string(),
            enable_debug_overlay: true,
            strict_fields: false,
            strip_scripts: true,
            stamp_section_marker: true,
            expression_depth_limit: 32,
            expression_limit: 512,
        }
    }
}

/// Compose a full host document in one call.
///
/// Reads the input blocks from `html`, composes the page into the same
/// document and returns the serialized result together with the pass's
/// [`RenderState`].
pub fn render_page(html: &str, config: BuilderConfig) -> Result<(String, RenderState)> {
    let inputs = PageInputs::from_html(html)?;
    let mut document = PageDocument::parse(html);
    let mut compositor = Compositor::new(config, inputs);
    let state = compositor.compose(&mut document)?;
    Ok((document.to_html(), state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuilderConfig::default();
        assert_eq!(config.style_block_id, "ai-custom-css");
        assert_eq!(config.marker_attribute, "data-section");
        assert!(config.strip_scripts);
        assert!(!config.strict_fields);
    }

    #[test]
    fn test_render_page_without_root_leaves_document_alone() {
        let html = r#"<html><head></head><body><p>static</p>
<script id="page-sections" type="application/json">{"hero": {"html": "<h1>x</h1>"}}</script>
</body></html>"#;
        let (out, state) = render_page(html, BuilderConfig::default()).expect("render");
        assert!(!state.root_found);
        assert!(!out.contains("<h1"));
        assert!(!out.contains("ai-custom-css"));
    }
}
