use pagebuilder::{BuilderConfig, Compositor, PageDocument, PageInputs, SessionProvider};
use std::sync::{Arc, Mutex};

/// Minimal telemetry sink: tags every event with the session id current at
/// the time it is recorded.
struct Recorder {
    session: Arc<SessionProvider>,
    events: Mutex<Vec<(String, Option<String>)>>,
}

impl Recorder {
    fn record(&self, name: &str) {
        self.events
            .lock()
            .unwrap()
            .push((name.to_string(), self.session.get()));
    }
}

fn inputs() -> PageInputs {
    PageInputs::from_parts(None, Some(r#"{"hero": "<h1>hi</h1>"}"#), None).unwrap()
}

#[test]
fn test_consent_updates_recorder_and_page() {
    let provider = SessionProvider::shared(None);
    let recorder = Recorder {
        session: provider.clone(),
        events: Mutex::new(Vec::new()),
    };

    let mut compositor = Compositor::new(BuilderConfig::default(), inputs()).with_session(provider.clone());
    let mut document = PageDocument::with_root("page-root");
    compositor.compose(&mut document).unwrap();
    assert_eq!(document.body().unwrap().attr("data-session-id"), None);

    recorder.record("view");
    provider.set("consented-1");
    recorder.record("click");
    compositor.sync_session(&mut document);

    assert_eq!(
        *recorder.events.lock().unwrap(),
        vec![
            ("view".to_string(), None),
            ("click".to_string(), Some("consented-1".to_string())),
        ]
    );
    assert_eq!(
        document.body().unwrap().attr("data-session-id"),
        Some("consented-1")
    );
}

#[test]
fn test_subscriber_sees_changes_from_other_threads() {
    let provider = SessionProvider::shared(Some("initial".into()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    provider.subscribe(move |id| sink.lock().unwrap().push(id.map(str::to_string)));

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let writer = provider.clone();
            std::thread::spawn(move || writer.set(format!("s-{}", i)))
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    // every write is a distinct id, so every write notifies
    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    let expected: Vec<Option<String>> = (0..4).map(|i| Some(format!("s-{}", i))).collect();
    assert_eq!(seen, expected);
    assert!(provider.get().unwrap().starts_with("s-"));
}
