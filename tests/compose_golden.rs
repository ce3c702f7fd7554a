use pagebuilder::{BuilderConfig, Compositor, PageDocument, PageInputs};
use serde::Deserialize;
use std::fs;

#[derive(Deserialize)]
struct Fixture {
    name: String,
    sections: serde_json::Value,
    config: serde_json::Value,
    #[serde(default)]
    css: Option<String>,
    expected: String,
}

#[test]
fn test_compose_golden() {
    let data = fs::read_to_string("tests/compose_golden.json").expect("Failed to read fixtures");
    let fixtures: Vec<Fixture> = serde_json::from_str(&data).expect("Invalid JSON");
    assert!(!fixtures.is_empty());

    for f in fixtures {
        let config = f.config.to_string();
        let sections = f.sections.to_string();
        let inputs = PageInputs::from_parts(Some(&config), Some(&sections), f.css.as_deref())
            .expect("fixture inputs");

        let mut document = PageDocument::with_root("page-root");
        let mut compositor = Compositor::new(BuilderConfig::default(), inputs);
        let state = compositor.compose(&mut document).expect("compose failed");
        assert!(state.root_found, "{}: root not found", f.name);

        let root = document.element_by_id("page-root").expect("root");
        let rendered: String = root.children.iter().map(|n| n.to_html()).collect();
        assert_eq!(rendered, f.expected, "Mismatch for fixture '{}'", f.name);
    }
}
