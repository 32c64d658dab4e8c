use std::sync::Arc;
use std::sync::Condvar;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use crate::error::ErrorKind;
use crate::Result;

/// Gate blocking operations until the session reports connected.
///
/// The gate fires exactly once: the first connected transition opens it
/// permanently. Closing the session before a connection is established
/// cancels it permanently instead, failing current and future waiters.
#[derive(Clone)]
pub struct ConnectionGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    signal: Condvar,
    state: Mutex<GateState>,
}

#[derive(Clone, Copy, Eq, PartialEq, Debug)]
enum GateState {
    Cancelled,
    Open,
    Pending,
}

impl ConnectionGate {
    pub fn new() -> ConnectionGate {
        ConnectionGate {
            inner: Arc::new(GateInner {
                signal: Condvar::new(),
                state: Mutex::new(GateState::Pending),
            }),
        }
    }

    /// Release all waiters, permanently.
    ///
    /// A gate cancelled before it was opened stays cancelled.
    pub fn open(&self) {
        let mut state = self.lock();
        if *state == GateState::Pending {
            *state = GateState::Open;
            self.inner.signal.notify_all();
        }
    }

    /// Fail all waiters, permanently.
    ///
    /// Cancelling an already open gate has no effect.
    pub fn cancel(&self) {
        let mut state = self.lock();
        if *state == GateState::Pending {
            *state = GateState::Cancelled;
            self.inner.signal.notify_all();
        }
    }

    pub fn is_open(&self) -> bool {
        *self.lock() == GateState::Open
    }

    /// Block the calling thread until the gate opens.
    ///
    /// A deadline of `None` waits indefinitely. Returns `ConnectTimeout` if
    /// the deadline expires and `NotConnected` if the gate was cancelled.
    pub fn wait(&self, deadline: Option<Duration>) -> Result<()> {
        let start = Instant::now();
        let mut state = self.lock();
        while *state == GateState::Pending {
            match deadline {
                None => {
                    state = self
                        .inner
                        .signal
                        .wait(state)
                        .expect("connection gate lock poisoned");
                }
                Some(limit) => {
                    let remaining = match limit.checked_sub(start.elapsed()) {
                        Some(remaining) => remaining,
                        None => return Err(ErrorKind::ConnectTimeout.into()),
                    };
                    let (guard, timeout) = self
                        .inner
                        .signal
                        .wait_timeout(state, remaining)
                        .expect("connection gate lock poisoned");
                    state = guard;
                    if timeout.timed_out() && *state == GateState::Pending {
                        return Err(ErrorKind::ConnectTimeout.into());
                    }
                }
            }
        }
        match *state {
            GateState::Open => Ok(()),
            _ => Err(ErrorKind::NotConnected.into()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GateState> {
        self.inner
            .state
            .lock()
            .expect("connection gate lock poisoned")
    }
}
