//! Compose a small landing page and print it.
//!
//! Run with `RUST_LOG=debug` to follow each section through the pass.

use pagebuilder::{BuilderConfig, Compositor, PageDocument, PageInputs, SessionProvider};

const SECTIONS: &str = r#"{
  "hero": {"html": "<section><h1>{{headline}}</h1><p>{{tagline || 'Build pages from parts'}}</p></section>", "css": ".hero h1{font-size:3rem}"},
  "features": "<ul><li>{{first}}</li><li>{{second}}</li></ul>",
  "cta": "<a class='cta {{urgent ? \"cta--urgent\" : \"\"}}' href='/signup'>{{label}}</a>"
}"#;

const CONFIG: &str = r#"{
  "layout": ["hero", "features", "reviews", "cta"],
  "customizations": {
    "hero": {"headline": "Launch today", "style": "background:#101828;color:#fff"},
    "features": {"first": "Typed templates", "second": "One style block"},
    "cta": {"label": "Start free", "urgent": true, "css": ".cta--urgent{color:#d92d20}"}
  },
  "debug": {"source": "demo"}
}"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let inputs = PageInputs::from_parts(Some(CONFIG), Some(SECTIONS), Some("body{margin:0}"))?;
    let session = SessionProvider::shared(Some("demo-session".into()));
    let mut compositor = Compositor::new(BuilderConfig::default(), inputs).with_session(session);

    let mut document = PageDocument::with_root("page-root");
    let state = compositor.compose(&mut document)?;

    println!("{}", document.to_html());
    eprintln!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
