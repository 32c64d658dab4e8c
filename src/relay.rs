use std::sync::Mutex;

use slog::debug;
use slog::error;
use slog::info;
use slog::warn;
use slog::Logger;

use crate::events::NodeEvent;
use crate::events::SessionState;
use crate::gate::ConnectionGate;
use crate::metrics::ZOO_WATCH_EVENTS_COUNT;
use crate::watches::WatchRegistry;

/// Single per-session dispatch point for asynchronous notifications.
///
/// State transitions are logged and the first connected transition opens the
/// connection gate. Node events are logged and handed to the watch registry.
pub struct Relay {
    gate: ConnectionGate,
    logger: Logger,
    state: Mutex<SessionState>,
    watches: WatchRegistry,
}

impl Relay {
    pub fn new(gate: ConnectionGate, logger: Logger) -> Relay {
        Relay {
            gate,
            logger,
            state: Mutex::new(SessionState::Connecting),
            watches: WatchRegistry::new(),
        }
    }

    pub fn current_state(&self) -> SessionState {
        *self.state.lock().expect("session state lock poisoned")
    }

    pub fn watches(&self) -> &WatchRegistry {
        &self.watches
    }

    /// Observe a session state transition.
    ///
    /// Repeated notifications of the current state are dropped: the client
    /// library reports states over more than one channel.
    pub fn handle_state(&self, state: SessionState) {
        {
            let mut current = self.state.lock().expect("session state lock poisoned");
            if *current == state {
                return;
            }
            *current = state;
        }
        match state {
            SessionState::AuthFailed => error!(self.logger, "Zookeeper authentication failed"),
            SessionState::Closed => warn!(self.logger, "Zookeeper session closed"),
            SessionState::Connected => {
                info!(self.logger, "Zookeeper connection established");
                self.gate.open();
            }
            SessionState::ConnectedReadOnly => {
                warn!(self.logger, "Zookeeper connection is read-only");
            }
            SessionState::Connecting => debug!(self.logger, "Zookeeper session connecting"),
            SessionState::Disconnected => {
                warn!(self.logger, "Disconnected from zookeeper, client will retry");
            }
            SessionState::Expired => error!(self.logger, "Zookeeper session expired"),
        }
    }

    /// Observe a node change notification.
    pub fn handle_event(&self, event: NodeEvent) {
        ZOO_WATCH_EVENTS_COUNT
            .with_label_values(&[event.kind.as_str()])
            .inc();
        info!(
            self.logger, "Received node event";
            "path" => &event.path,
            "kind" => event.kind.as_str(),
        );
        if !self.watches.dispatch(&event) {
            debug!(self.logger, "No armed watch for node event"; "path" => &event.path);
        }
    }
}
