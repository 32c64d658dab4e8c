use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use slog::Logger;

use crate::events::SessionState;
use crate::gate::ConnectionGate;
use crate::relay::Relay;
use crate::session::Session;

mod backend;

use self::backend::MockBackend;
use self::backend::MockState;

/// Helper to mock a zookeeper namespace for tests.
///
/// The namespace lives in memory and is shared by every session created from
/// the same `MockNamespace`, so tests can assert on it directly.
pub struct MockNamespace {
    state: Arc<Mutex<MockState>>,
}

impl MockNamespace {
    pub fn new() -> MockNamespace {
        MockNamespace {
            state: Arc::new(Mutex::new(MockState::with_root())),
        }
    }

    /// Return a connected `Session` backed by the in-memory namespace.
    pub fn session(&self, logger: Logger) -> Session {
        self.build(logger, true, Some(Duration::from_secs(5)))
    }

    /// Return a `Session` whose connection gate never opens.
    ///
    /// Useful to exercise connect deadlines and close-while-connecting.
    pub fn pending_session(&self, logger: Logger, connect_timeout: Option<Duration>) -> Session {
        self.build(logger, false, connect_timeout)
    }

    /// Check the in-memory namespace for a node.
    pub fn contains(&self, path: &str) -> bool {
        self.lock().contains(path)
    }

    /// Current payload of a node in the in-memory namespace.
    pub fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.lock().data(path)
    }

    /// Number of server-side watches currently armed.
    pub fn armed_watches(&self) -> usize {
        self.lock().armed_watches()
    }

    fn build(&self, logger: Logger, connected: bool, connect_timeout: Option<Duration>) -> Session {
        let gate = ConnectionGate::new();
        let relay = Arc::new(Relay::new(gate.clone(), logger.clone()));
        let backend = MockBackend {
            relay: Arc::clone(&relay),
            state: Arc::clone(&self.state),
        };
        if connected {
            relay.handle_state(SessionState::Connected);
        }
        Session::with_backend(Arc::new(backend), connect_timeout, gate, logger, relay)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().expect("mock namespace state poisoned")
    }
}
