use std::collections::HashMap;
use std::sync::Mutex;

use crate::events::NodeEvent;
use crate::events::WatchKind;

/// One-shot callback invoked with the event that consumed the watch.
pub type WatchCallback = Box<dyn FnOnce(NodeEvent) + Send>;

/// Per-path one-shot watch registrations.
///
/// Registrations are keyed by (path, category) and removed on first
/// delivery. Re-arming a (path, category) pair replaces the previous
/// callback, mirroring the service's own watch bookkeeping.
pub struct WatchRegistry {
    watches: Mutex<HashMap<(String, WatchKind), WatchCallback>>,
}

impl WatchRegistry {
    pub fn new() -> WatchRegistry {
        WatchRegistry {
            watches: Mutex::new(HashMap::new()),
        }
    }

    pub fn arm(&self, path: &str, kind: WatchKind, callback: WatchCallback) {
        let mut watches = self.lock();
        watches.insert((path.to_string(), kind), callback);
    }

    /// Remove a registration that was never armed server-side.
    pub fn disarm(&self, path: &str, kind: WatchKind) {
        let mut watches = self.lock();
        watches.remove(&(path.to_string(), kind));
    }

    /// Deliver an event to the first matching registration, consuming it.
    ///
    /// Returns false when no registration matched the event's path and
    /// category set.
    pub fn dispatch(&self, event: &NodeEvent) -> bool {
        let callback = {
            let mut watches = self.lock();
            let mut callback = None;
            for kind in event.kind.categories() {
                if let Some(armed) = watches.remove(&(event.path.clone(), *kind)) {
                    callback = Some(armed);
                    break;
                }
            }
            callback
        };
        match callback {
            Some(callback) => {
                callback(event.clone());
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn armed(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<(String, WatchKind), WatchCallback>> {
        self.watches.lock().expect("watch registry lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    use super::super::NodeEvent;
    use super::super::NodeEventKind;
    use super::super::WatchKind;
    use super::WatchRegistry;

    fn event(path: &str, kind: NodeEventKind) -> NodeEvent {
        NodeEvent {
            kind,
            path: path.to_string(),
        }
    }

    #[test]
    fn dispatch_consumes_registration() {
        let registry = WatchRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let count = Arc::clone(&fired);
        registry.arm(
            "/a",
            WatchKind::Data,
            Box::new(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            }),
        );
        assert!(registry.dispatch(&event("/a", NodeEventKind::DataChanged)));
        assert!(!registry.dispatch(&event("/a", NodeEventKind::DataChanged)));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(registry.armed(), 0);
    }

    #[test]
    fn dispatch_ignores_other_paths() {
        let registry = WatchRegistry::new();
        registry.arm("/a", WatchKind::Data, Box::new(|_| ()));
        assert!(!registry.dispatch(&event("/b", NodeEventKind::DataChanged)));
        assert_eq!(registry.armed(), 1);
    }

    #[test]
    fn existence_watch_observes_data_changes() {
        let registry = WatchRegistry::new();
        registry.arm("/a", WatchKind::Exists, Box::new(|_| ()));
        assert!(registry.dispatch(&event("/a", NodeEventKind::DataChanged)));
    }

    #[test]
    fn children_watch_ignores_data_changes() {
        let registry = WatchRegistry::new();
        registry.arm("/a", WatchKind::Children, Box::new(|_| ()));
        assert!(!registry.dispatch(&event("/a", NodeEventKind::DataChanged)));
        assert!(registry.dispatch(&event("/a", NodeEventKind::ChildrenChanged)));
    }

    #[test]
    fn rearm_replaces_callback() {
        let registry = WatchRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let first = Arc::clone(&fired);
        registry.arm(
            "/a",
            WatchKind::Data,
            Box::new(move |_| {
                first.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let second = Arc::clone(&fired);
        registry.arm(
            "/a",
            WatchKind::Data,
            Box::new(move |_| {
                second.fetch_add(10, Ordering::SeqCst);
            }),
        );
        assert_eq!(registry.armed(), 1);
        assert!(registry.dispatch(&event("/a", NodeEventKind::DataChanged)));
        assert_eq!(fired.load(Ordering::SeqCst), 10);
    }
}
