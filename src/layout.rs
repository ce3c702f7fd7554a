//! Layout resolution

use crate::registry::SectionRegistry;
use serde::Serialize;

/// Where a resolved layout came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutSource {
    /// The page config supplied an explicit order
    #[default]
    Configured,
    /// No order was supplied; the registry's declaration order was used
    RegistryOrder,
}

/// The final sequence of section keys for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResolvedLayout {
    pub keys: Vec<String>,
    pub source: LayoutSource,
}

impl ResolvedLayout {
    /// Keys with no registered template, in layout order (duplicates kept)
    pub fn unknown_keys<'a>(&'a self, registry: &SectionRegistry) -> Vec<&'a str> {
        self.keys
            .iter()
            .map(String::as_str)
            .filter(|k| !registry.contains(k))
            .collect()
    }
}

/// Resolve the render order.
///
/// A supplied layout is used exactly as given, unknown keys and duplicates
/// included. Without one, every registered section renders in declaration
/// order.
pub fn resolve_layout(layout: Option<&[String]>, registry: &SectionRegistry) -> ResolvedLayout {
    match layout {
        Some(keys) => ResolvedLayout {
            keys: keys.to_vec(),
            source: LayoutSource::Configured,
        },
        None => ResolvedLayout {
            keys: registry.keys().map(str::to_string).collect(),
            source: LayoutSource::RegistryOrder,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> SectionRegistry {
        SectionRegistry::new()
            .with_section("hero", "<h1></h1>")
            .with_section("pricing", "<div></div>")
            .with_section("contact", "<form></form>")
    }

    #[test]
    fn configured_layout_is_returned_unchanged() {
        let layout = vec!["pricing".to_string(), "ghost".to_string(), "pricing".to_string()];
        let resolved = resolve_layout(Some(layout.as_slice()), &registry());
        assert_eq!(resolved.keys, layout);
        assert_eq!(resolved.source, LayoutSource::Configured);
        assert_eq!(resolved.unknown_keys(&registry()), vec!["ghost"]);
    }

    #[test]
    fn missing_layout_falls_back_to_registry_order() {
        let resolved = resolve_layout(None, &registry());
        assert_eq!(resolved.keys, vec!["hero", "pricing", "contact"]);
        assert_eq!(resolved.source, LayoutSource::RegistryOrder);
    }

    #[test]
    fn empty_layout_renders_nothing() {
        let resolved = resolve_layout(Some(&[][..]), &registry());
        assert!(resolved.keys.is_empty());
    }
}
