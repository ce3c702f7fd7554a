//! Page compositor
//!
//! Drives one composition pass over a host document:
//!
//! 1. resolve the layout
//! 2. for each key, in order: look up the template (or insert a placeholder),
//!    collect style fragments, render, insert under the root, then apply the
//!    customization's `style` override to the inserted section
//! 3. flush the aggregated style sheet once
//! 4. publish the session id and, if requested, the debug overlay
//!
//! A missing render root makes the whole pass a no-op. Every other failure
//! inside a section is recovered locally and recorded in [`RenderState`].

use crate::config::PageInputs;
use crate::css::CssAggregator;
use crate::debug::DebugOverlay;
use crate::document::{HostDocument, StyleUpsert};
use crate::dom::{Element, Node};
use crate::layout::{resolve_layout, LayoutSource};
use crate::session::SessionProvider;
use crate::template::TemplateRenderer;
use crate::{BuilderConfig, Error, Result};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

pub const PLACEHOLDER_CLASS: &str = "section-placeholder";

/// What a composition pass decided and did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderState {
    /// Resolved layout, in render order
    pub layout: Vec<String>,
    pub layout_source: LayoutSource,
    /// Keys rendered from a registered template
    pub rendered: Vec<String>,
    /// Keys with no template, rendered as placeholders
    pub placeholders: Vec<String>,
    /// Keys whose template failed to evaluate and was inserted raw
    pub degraded: Vec<String>,
    /// Keys whose `style` override found no marked element
    pub unstyled: Vec<String>,
    pub root_found: bool,
    pub stylesheet_published: bool,
    pub overlay_rendered: bool,
}

pub struct Compositor {
    config: BuilderConfig,
    inputs: PageInputs,
    renderer: TemplateRenderer,
    session: Option<Arc<SessionProvider>>,
    composed: bool,
}

impl Compositor {
    pub fn new(config: BuilderConfig, inputs: PageInputs) -> Self {
        let renderer = TemplateRenderer::new(&config);
        Self {
            config,
            inputs,
            renderer,
            session: None,
            composed: false,
        }
    }

    /// Attach the shared session provider whose id is published on `<body>`
    pub fn with_session(mut self, provider: Arc<SessionProvider>) -> Self {
        self.session = Some(provider);
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn inputs(&self) -> &PageInputs {
        &self.inputs
    }

    pub fn is_composed(&self) -> bool {
        self.composed
    }

    /// Run the composition pass. A page is composed at most once; a second
    /// call fails without touching the document.
    pub fn compose<D: HostDocument + ?Sized>(&mut self, doc: &mut D) -> Result<RenderState> {
        if self.composed {
            return Err(Error::RenderError("page has already been composed".into()));
        }
        if !doc.has_element(&self.config.root_id) {
            warn!("Render root #{} not found; nothing rendered", self.config.root_id);
            return Ok(RenderState::default());
        }
        self.composed = true;

        let layout = resolve_layout(self.inputs.config.layout.as_deref(), &self.inputs.registry);
        let mut state = RenderState {
            layout: layout.keys.clone(),
            layout_source: layout.source,
            root_found: true,
            ..Default::default()
        };
        let mut css =
            CssAggregator::new(self.config.style_block_id.as_str()).with_base(&self.inputs.base_css);

        for key in &layout.keys {
            self.render_section(doc, key, &mut css, &mut state)?;
        }

        match css.flush(doc) {
            Ok(outcome) => state.stylesheet_published = outcome != StyleUpsert::Skipped,
            Err(e) => warn!("Failed to publish styles: {}", e),
        }

        self.sync_session(doc);

        if self.config.enable_debug_overlay {
            state.overlay_rendered = DebugOverlay::new(&self.config.debug_panel_id).render(
                self.inputs.config.debug.as_ref(),
                &self.inputs.config,
                &state,
                doc,
            );
        }

        info!(
            "Composed {} sections ({} placeholders, {} degraded)",
            state.layout.len(),
            state.placeholders.len(),
            state.degraded.len()
        );
        Ok(state)
    }

    fn render_section<D: HostDocument + ?Sized>(
        &self,
        doc: &mut D,
        key: &str,
        css: &mut CssAggregator,
        state: &mut RenderState,
    ) -> Result<()> {
        let root_id = self.config.root_id.as_str();
        let marker = self.config.marker_attribute.as_str();

        let Some(section) = self.inputs.registry.get(key) else {
            debug!("Unknown section '{}'; inserting placeholder", key);
            doc.append_children(root_id, vec![placeholder(marker, key)])?;
            state.placeholders.push(key.to_string());
            return Ok(());
        };

        let customization = self.inputs.config.customization(key);
        if let Some(default_css) = section.css.as_deref() {
            css.collect(key, default_css);
        }
        if let Some(extra) = customization.css() {
            css.collect(key, extra);
        }

        let rendered = self
            .renderer
            .render_section(&section.markup, customization.fields());
        if rendered.degraded {
            state.degraded.push(key.to_string());
        }
        let mut nodes = rendered.nodes;
        if self.config.stamp_section_marker {
            stamp_marker(&mut nodes, marker, key);
        }
        let inserted = doc.append_children(root_id, nodes)?;
        state.rendered.push(key.to_string());

        if let Some(style) = customization.style() {
            if let Err(e) = doc.set_marked_attribute(root_id, inserted, (marker, key), "style", style)
            {
                warn!("apply customization failed for {}: {}", key, e);
                state.unstyled.push(key.to_string());
            }
        }
        Ok(())
    }

    /// Publish the provider's current session id on `<body>`.
    ///
    /// Called at the end of a pass; hosts call it again after the provider
    /// notifies a change.
    pub fn sync_session<D: HostDocument + ?Sized>(&self, doc: &mut D) {
        let Some(id) = self.session.as_ref().and_then(|p| p.get()) else {
            return;
        };
        if let Err(e) = doc.set_body_attribute(&self.config.session_attribute, &id) {
            warn!("Failed to publish session id: {}", e);
        }
    }
}

fn placeholder(marker: &str, key: &str) -> Node {
    Element::new("section")
        .with_attr(marker, key)
        .with_attr("class", PLACEHOLDER_CLASS)
        .with_child(Element::new("p").with_text(format!("Unknown section: {}", key)))
        .into()
}

/// Give the section's first element the marker attribute unless some element
/// in the fragment already carries one.
fn stamp_marker(nodes: &mut [Node], marker: &str, key: &str) {
    let marked = |el: &Element| el.attr(marker).is_some();
    if nodes
        .iter()
        .filter_map(Node::as_element)
        .any(|el| el.find(&marked).is_some())
    {
        return;
    }
    if let Some(first) = nodes.iter_mut().find_map(Node::as_element_mut) {
        first.set_attr(marker, key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PageConfig;
    use crate::document::PageDocument;
    use crate::registry::SectionRegistry;

    fn inputs(config: &str, registry: SectionRegistry) -> PageInputs {
        PageInputs {
            config: PageConfig::from_json(config).unwrap(),
            registry,
            base_css: String::new(),
        }
    }

    fn root_children(doc: &PageDocument) -> Vec<Element> {
        doc.element_by_id("page-root")
            .unwrap()
            .child_elements()
            .cloned()
            .collect()
    }

    #[test]
    fn header_and_pricing_example() {
        let registry = SectionRegistry::new()
            .with_section("header", "<h1>{{text}}</h1>")
            .with_section("pricing", "<div class='p {{highlight?'hi':''}}'></div>");
        let mut compositor = Compositor::new(
            BuilderConfig::default(),
            inputs(
                r#"{"layout": ["header", "pricing"], "customizations": {"pricing": {"highlight": true}}}"#,
                registry,
            ),
        );
        let mut doc = PageDocument::with_root("page-root");
        let state = compositor.compose(&mut doc).unwrap();

        let children = root_children(&doc);
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].tag, "h1");
        assert_eq!(children[0].text_content(), "");
        assert_eq!(children[1].attr("class"), Some("p hi"));
        assert!(state.degraded.is_empty());
        assert_eq!(state.rendered, vec!["header", "pricing"]);
    }

    #[test]
    fn omitted_layout_uses_registry_order() {
        let registry = SectionRegistry::new()
            .with_section("b", "<p>b</p>")
            .with_section("a", "<p>a</p>");
        let mut compositor = Compositor::new(BuilderConfig::default(), inputs("{}", registry));
        let mut doc = PageDocument::with_root("page-root");
        let state = compositor.compose(&mut doc).unwrap();
        assert_eq!(state.layout_source, LayoutSource::RegistryOrder);
        let texts: Vec<String> = root_children(&doc).iter().map(Element::text_content).collect();
        assert_eq!(texts, vec!["b", "a"]);
    }

    #[test]
    fn unknown_key_renders_single_placeholder() {
        let mut compositor = Compositor::new(
            BuilderConfig::default(),
            inputs(r#"{"layout": ["ghost"]}"#, SectionRegistry::new()),
        );
        let mut doc = PageDocument::with_root("page-root");
        let state = compositor.compose(&mut doc).unwrap();
        let children = root_children(&doc);
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].attr("class"), Some(PLACEHOLDER_CLASS));
        assert!(children[0].text_content().contains("ghost"));
        assert_eq!(state.placeholders, vec!["ghost"]);
    }

    #[test]
    fn style_override_replaces_existing_style() {
        let registry = SectionRegistry::new().with_section(
            "hero",
            "<section data-section=\"hero\" style=\"color:red\"><h1>x</h1></section>",
        );
        let mut compositor = Compositor::new(
            BuilderConfig::default(),
            inputs(
                r#"{"customizations": {"hero": {"style": "background:#000"}}}"#,
                registry,
            ),
        );
        let mut doc = PageDocument::with_root("page-root");
        compositor.compose(&mut doc).unwrap();
        assert_eq!(root_children(&doc)[0].attr("style"), Some("background:#000"));
    }

    #[test]
    fn style_override_without_target_is_recorded() {
        let registry = SectionRegistry::new().with_section("hero", "just text");
        let mut compositor = Compositor::new(
            BuilderConfig::default(),
            inputs(r#"{"customizations": {"hero": {"style": "x"}}}"#, registry),
        );
        let mut doc = PageDocument::with_root("page-root");
        let state = compositor.compose(&mut doc).unwrap();
        assert_eq!(state.unstyled, vec!["hero"]);
        assert_eq!(state.rendered, vec!["hero"]);
    }

    #[test]
    fn marker_is_not_overwritten() {
        let mut nodes = crate::dom::parse_fragment("<div data-section=\"other\"></div>");
        stamp_marker(&mut nodes, "data-section", "hero");
        assert_eq!(nodes[0].as_element().unwrap().attr("data-section"), Some("other"));

        let mut nodes = crate::dom::parse_fragment("<div><span></span></div>");
        stamp_marker(&mut nodes, "data-section", "hero");
        assert_eq!(nodes[0].as_element().unwrap().attr("data-section"), Some("hero"));
    }

    #[test]
    fn missing_root_is_a_no_op() {
        let registry = SectionRegistry::new().with_section("a", "<p>a</p>");
        let mut compositor = Compositor::new(
            BuilderConfig::default(),
            inputs(
                r#"{"customizations": {"a": {"css": "p{}"}}, "debug": {"x": 1}}"#,
                registry,
            ),
        );
        let mut doc = PageDocument::new();
        let before = doc.clone();
        let state = compositor.compose(&mut doc).unwrap();
        assert_eq!(doc, before);
        assert!(!state.root_found);
        assert!(!compositor.is_composed());
    }

    #[test]
    fn second_compose_is_refused() {
        let mut compositor = Compositor::new(
            BuilderConfig::default(),
            inputs("{}", SectionRegistry::new().with_section("a", "<p>a</p>")),
        );
        let mut doc = PageDocument::with_root("page-root");
        compositor.compose(&mut doc).unwrap();
        let after_first = doc.clone();
        assert!(matches!(
            compositor.compose(&mut doc),
            Err(Error::RenderError(_))
        ));
        assert_eq!(doc, after_first);
    }

    #[test]
    fn css_is_collected_in_render_order() {
        let registry: SectionRegistry = vec![
            crate::registry::SectionTemplate::new("a", "<p>a</p>").with_css(".a{}"),
            crate::registry::SectionTemplate::new("b", "<p>b</p>"),
        ]
        .into_iter()
        .collect();
        let mut page = inputs(
            r#"{"layout": ["b", "a"], "customizations": {"b": {"css": ".b{}"}, "a": {"css": ".a2{}"}, "unused": {"css": ".u{}"}}}"#,
            registry,
        );
        page.base_css = "body{}".into();
        let mut compositor = Compositor::new(BuilderConfig::default(), page);
        let mut doc = PageDocument::with_root("page-root");
        let state = compositor.compose(&mut doc).unwrap();
        assert!(state.stylesheet_published);
        let sheet = doc.element_by_id("ai-custom-css").unwrap().text_content();
        assert_eq!(
            sheet,
            "body{}\n\n/* b css */\n.b{}\n\n/* a css */\n.a{}\n\n/* a css */\n.a2{}"
        );
    }

    #[test]
    fn session_id_is_published_on_body() {
        let provider = SessionProvider::shared(Some("s-1".into()));
        let mut compositor = Compositor::new(
            BuilderConfig::default(),
            inputs("{}", SectionRegistry::new()),
        )
        .with_session(provider.clone());
        let mut doc = PageDocument::with_root("page-root");
        compositor.compose(&mut doc).unwrap();
        assert_eq!(doc.body().unwrap().attr("data-session-id"), Some("s-1"));

        provider.set("s-2");
        compositor.sync_session(&mut doc);
        assert_eq!(doc.body().unwrap().attr("data-session-id"), Some("s-2"));
    }

    #[test]
    fn overlay_follows_sections_and_respects_toggle() {
        let registry = SectionRegistry::new().with_section("a", "<p>a</p>");
        let config = r#"{"debug": {"fallback": true}}"#;

        let mut on = Compositor::new(BuilderConfig::default(), inputs(config, registry.clone()));
        let mut doc = PageDocument::with_root("page-root");
        assert!(on.compose(&mut doc).unwrap().overlay_rendered);
        let body = doc.body().unwrap();
        assert_eq!(body.child_elements().last().unwrap().tag, "aside");

        let mut off = Compositor::new(
            BuilderConfig {
                enable_debug_overlay: false,
                ..Default::default()
            },
            inputs(config, registry),
        );
        let mut doc = PageDocument::with_root("page-root");
        assert!(!off.compose(&mut doc).unwrap().overlay_rendered);
        assert!(doc.element_by_id("builder-debug").is_none());
    }
}
