//! Shared session identifier
//!
//! The consent flow may mint a new session id after the page has rendered,
//! and the telemetry recorder needs to see it. Instead of a page-global
//! setter, both sides hold an `Arc<SessionProvider>`: writers call
//! [`SessionProvider::set`], readers call [`SessionProvider::get`] or
//! subscribe for change notifications.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

type SessionListener = Arc<dyn Fn(Option<&str>) + Send + Sync>;

/// Handle returned by [`SessionProvider::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
pub struct SessionProvider {
    current: Mutex<Option<String>>,
    listeners: Mutex<Vec<(SubscriptionId, SessionListener)>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for SessionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionProvider")
            .field("current", &self.get())
            .field("listeners", &lock(&self.listeners).len())
            .finish()
    }
}

// A panicking listener must not wedge the provider for everyone else.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionProvider {
    pub fn new(initial: Option<String>) -> Self {
        Self {
            current: Mutex::new(initial),
            ..Default::default()
        }
    }

    /// Convenience constructor for the common shared form
    pub fn shared(initial: Option<String>) -> Arc<Self> {
        Arc::new(Self::new(initial))
    }

    pub fn get(&self) -> Option<String> {
        lock(&self.current).clone()
    }

    /// Replace the session id, notifying subscribers if it changed
    pub fn set(&self, id: impl Into<String>) {
        self.replace(Some(id.into()));
    }

    /// Forget the session id (for example after consent is declined)
    pub fn clear(&self) {
        self.replace(None);
    }

    fn replace(&self, next: Option<String>) {
        {
            let mut current = lock(&self.current);
            if *current == next {
                return;
            }
            *current = next.clone();
        }
        // Snapshot so listeners may subscribe/unsubscribe re-entrantly.
        let listeners: Vec<SessionListener> = lock(&self.listeners)
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for cb in listeners {
            cb(next.as_deref());
        }
    }

    /// Register a callback invoked with the new id after every change
    pub fn subscribe<F>(&self, cb: F) -> SubscriptionId
    where
        F: Fn(Option<&str>) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        lock(&self.listeners).push((id, Arc::new(cb)));
        id
    }

    /// Remove a previously registered callback; returns whether it existed
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = lock(&self.listeners);
        let before = listeners.len();
        listeners.retain(|(sid, _)| *sid != id);
        listeners.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_notifies_subscribers_once_per_change() {
        let provider = SessionProvider::shared(None);
        let seen = Arc::new(Mutex::new(Vec::<Option<String>>::new()));
        let sink = seen.clone();
        provider.subscribe(move |id| sink.lock().unwrap().push(id.map(str::to_string)));

        provider.set("abc");
        provider.set("abc");
        provider.set("def");
        provider.clear();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![Some("abc".to_string()), Some("def".to_string()), None]
        );
        assert_eq!(provider.get(), None);
    }

    #[test]
    fn unsubscribe_stops_notifications() {
        let provider = SessionProvider::new(Some("a".into()));
        let count = Arc::new(AtomicU64::new(0));
        let c = count.clone();
        let id = provider.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        provider.set("b");
        assert!(provider.unsubscribe(id));
        assert!(!provider.unsubscribe(id));
        provider.set("c");
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(provider.get().as_deref(), Some("c"));
    }

    #[test]
    fn provider_is_shareable_across_threads() {
        let provider = SessionProvider::shared(None);
        let writer = provider.clone();
        std::thread::spawn(move || writer.set("from-thread"))
            .join()
            .unwrap();
        assert_eq!(provider.get().as_deref(), Some("from-thread"));
    }
}
