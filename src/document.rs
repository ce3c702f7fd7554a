//! Host document boundary
//!
//! The compositor never touches markup directly; it asks a [`HostDocument`]
//! to insert typed nodes, overwrite an attribute on a marked element, upsert
//! a style block, and append to `<body>`. [`PageDocument`] is the in-memory
//! implementation backed by a parsed HTML page.

use crate::dom::{convert_element, Element, Node};
use crate::{Error, Result};
use scraper::Html;
use std::ops::Range;

/// Attribute recording the content fingerprint of a published style block
pub const FINGERPRINT_ATTRIBUTE: &str = "data-fingerprint";

/// Outcome of publishing a style block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleUpsert {
    /// A new style element was created
    Inserted,
    /// An existing element with the same id had its content replaced
    Replaced,
    /// An existing element already carried identical content
    Unchanged,
    /// Nothing to publish
    Skipped,
}

/// Mutation surface a composition pass needs from its host document.
pub trait HostDocument {
    /// Whether an element with the given id exists
    fn has_element(&self, id: &str) -> bool;

    /// Append `nodes` as the last children of the element `parent_id`.
    /// Returns the child index range the nodes now occupy.
    fn append_children(&mut self, parent_id: &str, nodes: Vec<Node>) -> Result<Range<usize>>;

    /// Within the children `range` of `parent_id`, find the first element
    /// (searching descendants too) whose `marker.0` attribute equals
    /// `marker.1` and set `name` to `value`, replacing any previous value.
    fn set_marked_attribute(
        &mut self,
        parent_id: &str,
        range: Range<usize>,
        marker: (&str, &str),
        name: &str,
        value: &str,
    ) -> Result<()>;

    /// Publish `css` in `<head>` under `id`, replacing any prior content with
    /// the same id.
    fn upsert_style(&mut self, id: &str, css: &str, fingerprint: &str) -> Result<StyleUpsert>;

    /// Append a node as the last child of `<body>`
    fn append_to_body(&mut self, node: Node) -> Result<()>;

    /// Set an attribute on `<body>`
    fn set_body_attribute(&mut self, name: &str, value: &str) -> Result<()>;
}

/// An in-memory HTML document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageDocument {
    html: Element,
}

impl Default for PageDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl PageDocument {
    /// An empty `<html><head></head><body></body></html>` shell
    pub fn new() -> Self {
        Self {
            html: Element::new("html")
                .with_child(Element::new("head"))
                .with_child(Element::new("body")),
        }
    }

    /// A shell whose body holds a single empty container with the given id
    pub fn with_root(root_id: &str) -> Self {
        let mut doc = Self::new();
        if let Some(body) = doc.body_mut() {
            body.children
                .push(Element::new("div").with_attr("id", root_id).into());
        }
        doc
    }

    /// Parse a complete HTML document
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut root = convert_element(document.root_element());
        // html5ever always synthesises head and body; keep the invariant for
        // hand-built trees too.
        if !root.child_elements().any(|el| el.tag == "head") {
            root.children.insert(0, Element::new("head").into());
        }
        if !root.child_elements().any(|el| el.tag == "body") {
            root.children.push(Element::new("body").into());
        }
        Self { html: root }
    }

    pub fn root(&self) -> &Element {
        &self.html
    }

    pub fn head(&self) -> Option<&Element> {
        self.html.child_elements().find(|el| el.tag == "head")
    }

    pub fn body(&self) -> Option<&Element> {
        self.html.child_elements().find(|el| el.tag == "body")
    }

    fn head_mut(&mut self) -> Option<&mut Element> {
        self.html
            .children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|el| el.tag == "head")
    }

    fn body_mut(&mut self) -> Option<&mut Element> {
        self.html
            .children
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find(|el| el.tag == "body")
    }

    pub fn element_by_id(&self, id: &str) -> Option<&Element> {
        self.html.find_by_id(id)
    }

    /// Serialize the whole document, doctype included
    pub fn to_html(&self) -> String {
        format!("<!DOCTYPE html>{}", self.html.to_html())
    }
}

impl HostDocument for PageDocument {
    fn has_element(&self, id: &str) -> bool {
        self.element_by_id(id).is_some()
    }

    fn append_children(&mut self, parent_id: &str, nodes: Vec<Node>) -> Result<Range<usize>> {
        let parent = self
            .html
            .find_by_id_mut(parent_id)
            .ok_or_else(|| Error::DocumentError(format!("no element with id '{}'", parent_id)))?;
        let start = parent.children.len();
        parent.children.extend(nodes);
        Ok(start..parent.children.len())
    }

    fn set_marked_attribute(
        &mut self,
        parent_id: &str,
        range: Range<usize>,
        marker: (&str, &str),
        name: &str,
        value: &str,
    ) -> Result<()> {
        let parent = self
            .html
            .find_by_id_mut(parent_id)
            .ok_or_else(|| Error::DocumentError(format!("no element with id '{}'", parent_id)))?;
        let (marker_name, marker_value) = marker;
        let matches = |el: &Element| el.attr(marker_name) == Some(marker_value);
        let end = range.end.min(parent.children.len());
        let start = range.start.min(end);
        let target = parent.children[start..end]
            .iter_mut()
            .filter_map(Node::as_element_mut)
            .find_map(|el| el.find_mut(&matches))
            .ok_or_else(|| {
                Error::DocumentError(format!(
                    "no element with {}=\"{}\" among inserted nodes",
                    marker_name, marker_value
                ))
            })?;
        target.set_attr(name, value);
        Ok(())
    }

    fn upsert_style(&mut self, id: &str, css: &str, fingerprint: &str) -> Result<StyleUpsert> {
        if let Some(existing) = self.html.find_by_id_mut(id) {
            if existing.tag == "style" && existing.attr(FINGERPRINT_ATTRIBUTE) == Some(fingerprint) {
                return Ok(StyleUpsert::Unchanged);
            }
            existing.children = vec![Node::text(css)];
            existing.set_attr(FINGERPRINT_ATTRIBUTE, fingerprint);
            return Ok(StyleUpsert::Replaced);
        }
        let head = self
            .head_mut()
            .ok_or_else(|| Error::DocumentError("document has no <head>".into()))?;
        head.children.push(
            Element::new("style")
                .with_attr("id", id)
                .with_attr(FINGERPRINT_ATTRIBUTE, fingerprint)
                .with_text(css)
                .into(),
        );
        Ok(StyleUpsert::Inserted)
    }

    fn append_to_body(&mut self, node: Node) -> Result<()> {
        let body = self
            .body_mut()
            .ok_or_else(|| Error::DocumentError("document has no <body>".into()))?;
        body.children.push(node);
        Ok(())
    }

    fn set_body_attribute(&mut self, name: &str, value: &str) -> Result<()> {
        let body = self
            .body_mut()
            .ok_or_else(|| Error::DocumentError("document has no <body>".into()))?;
        body.set_attr(name, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_keeps_head_body_and_ids() {
        let doc = PageDocument::parse(
            "<html><head><title>T</title></head><body><div id=\"page-root\"></div></body></html>",
        );
        assert!(doc.head().is_some());
        assert!(doc.has_element("page-root"));
        assert!(!doc.has_element("missing"));
    }

    #[test]
    fn append_children_reports_range() {
        let mut doc = PageDocument::with_root("root");
        let r1 = doc
            .append_children("root", vec![Element::new("a").into()])
            .unwrap();
        let r2 = doc
            .append_children("root", vec![Element::new("b").into(), Element::new("c").into()])
            .unwrap();
        assert_eq!(r1, 0..1);
        assert_eq!(r2, 1..3);
        assert!(doc.append_children("nope", vec![]).is_err());
    }

    #[test]
    fn set_marked_attribute_only_searches_range() {
        let mut doc = PageDocument::with_root("root");
        doc.append_children(
            "root",
            vec![Element::new("div").with_attr("data-section", "hero").into()],
        )
        .unwrap();
        let range = doc
            .append_children("root", vec![Element::new("p").into()])
            .unwrap();
        let err = doc.set_marked_attribute("root", range, ("data-section", "hero"), "style", "x");
        assert!(err.is_err());
        doc.set_marked_attribute("root", 0..1, ("data-section", "hero"), "style", "x")
            .unwrap();
        let root = doc.element_by_id("root").unwrap();
        assert_eq!(root.child_elements().next().unwrap().attr("style"), Some("x"));
    }

    #[test]
    fn upsert_style_replaces_by_id() {
        let mut doc = PageDocument::new();
        assert_eq!(doc.upsert_style("s", "a{}", "f1").unwrap(), StyleUpsert::Inserted);
        assert_eq!(doc.upsert_style("s", "a{}", "f1").unwrap(), StyleUpsert::Unchanged);
        assert_eq!(doc.upsert_style("s", "b{}", "f2").unwrap(), StyleUpsert::Replaced);
        let head = doc.head().unwrap();
        let styles: Vec<_> = head.child_elements().filter(|e| e.tag == "style").collect();
        assert_eq!(styles.len(), 1);
        assert_eq!(styles[0].text_content(), "b{}");
    }

    #[test]
    fn serializes_with_doctype() {
        let mut doc = PageDocument::new();
        doc.set_body_attribute("data-session-id", "abc").unwrap();
        assert_eq!(
            doc.to_html(),
            "<!DOCTYPE html><html><head></head><body data-session-id=\"abc\"></body></html>"
        );
    }
}
