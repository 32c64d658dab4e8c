use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use slog::debug;
use slog::info;
use slog::Logger;

use crate::backend::zookeeper::ZookeeperBackend;
use crate::backend::NamespaceBackend;
use crate::config::Config;
use crate::error::ErrorKind;
use crate::events::NodeEvent;
use crate::events::NodeMeta;
use crate::events::SessionState;
use crate::events::WatchKind;
use crate::gate::ConnectionGate;
use crate::metrics::ZOO_OP_DURATION;
use crate::metrics::ZOO_OP_ERRORS_COUNT;
use crate::relay::Relay;
use crate::Result;

/// Connection-gated handle to a zookeeper namespace.
///
/// A session is an owned object with an open/use/close lifecycle: `open`
/// starts an asynchronous connection attempt, every operation blocks on the
/// connection gate until the session is connected (subject to the configured
/// connect deadline) and `close` terminates the session, failing any further
/// operation with `NotConnected`.
///
/// The session adds no retry or recovery policy of its own: transient
/// disconnections are retried by the client library, every other error
/// propagates to the caller as-is.
pub struct Session {
    backend: Arc<dyn NamespaceBackend>,
    closed: AtomicBool,
    connect_timeout: Option<Duration>,
    gate: ConnectionGate,
    logger: Logger,
    relay: Arc<Relay>,
}

impl Session {
    /// Open a new session against the configured zookeeper ensemble.
    pub fn open(config: Config, logger: Logger) -> Result<Session> {
        let gate = ConnectionGate::new();
        let relay = Arc::new(Relay::new(gate.clone(), logger.clone()));
        let backend = ZookeeperBackend::connect(&config, Arc::clone(&relay), logger.clone())?;
        let connect_timeout = config.connect_timeout.map(Duration::from_secs);
        Ok(Session::with_backend(
            Arc::new(backend),
            connect_timeout,
            gate,
            logger,
            relay,
        ))
    }

    /// Internal method to create a `Session` over the given backend.
    pub(crate) fn with_backend(
        backend: Arc<dyn NamespaceBackend>,
        connect_timeout: Option<Duration>,
        gate: ConnectionGate,
        logger: Logger,
        relay: Arc<Relay>,
    ) -> Session {
        Session {
            backend,
            closed: AtomicBool::new(false),
            connect_timeout,
            gate,
            logger,
            relay,
        }
    }

    /// Block until the session is connected.
    ///
    /// Subject to the configured connect deadline; operations perform the
    /// same wait implicitly.
    pub fn wait_connected(&self) -> Result<()> {
        self.ready()
    }

    /// Last session state observed by the relay.
    pub fn state(&self) -> SessionState {
        self.relay.current_state()
    }

    /// Lightweight check that the session is usable.
    pub fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Relaxed)
            && self.gate.is_open()
            && self.state() == SessionState::Connected
    }
}

impl Session {
    /// Check a node for existence, returning its metadata when present.
    pub fn exists(&self, path: &str) -> Result<Option<NodeMeta>> {
        self.ready()?;
        self.timed("exists", |backend| backend.exists(path, false))
    }

    /// Like [`Session::exists`], arming a one-shot watch for the next change
    /// to the path: creation, data change or deletion.
    pub fn exists_watch<F>(&self, path: &str, callback: F) -> Result<Option<NodeMeta>>
    where
        F: FnOnce(NodeEvent) + Send + 'static,
    {
        self.watched("exists", path, WatchKind::Exists, callback, |backend| {
            backend.exists(path, true)
        })
    }

    /// Create a persistent node under an existing parent.
    ///
    /// Creation is not recursive: a missing parent fails with `NoParent`.
    pub fn create(&self, path: &str, data: &[u8]) -> Result<String> {
        self.ready()?;
        let created = self.timed("create", |backend| backend.create(path, data.to_vec()))?;
        info!(self.logger, "Created node"; "path" => &created);
        Ok(created)
    }

    /// Fetch a node's payload and metadata.
    pub fn read(&self, path: &str) -> Result<(Vec<u8>, NodeMeta)> {
        self.ready()?;
        self.timed("read", |backend| backend.read(path, false))
    }

    /// Like [`Session::read`], arming a one-shot watch for the next data
    /// change or deletion of the path.
    pub fn read_watch<F>(&self, path: &str, callback: F) -> Result<(Vec<u8>, NodeMeta)>
    where
        F: FnOnce(NodeEvent) + Send + 'static,
    {
        self.watched("read", path, WatchKind::Data, callback, |backend| {
            backend.read(path, true)
        })
    }

    /// Overwrite a node's payload.
    ///
    /// Passing the version observed on a previous read makes the update
    /// conditional, failing with `BadVersion` when the node changed in
    /// between. `None` overwrites unconditionally.
    pub fn update(&self, path: &str, data: &[u8], version: Option<i32>) -> Result<NodeMeta> {
        self.ready()?;
        let meta = self.timed("update", |backend| {
            backend.update(path, data.to_vec(), version)
        })?;
        info!(self.logger, "Updated node data"; "path" => path, "version" => meta.version);
        Ok(meta)
    }

    /// List the names of a node's direct children, sorted.
    pub fn list_children(&self, path: &str) -> Result<Vec<String>> {
        self.ready()?;
        self.timed("children", |backend| backend.children(path, false))
    }

    /// Like [`Session::list_children`], arming a one-shot watch for the next
    /// change to the path's child list or its deletion.
    pub fn list_children_watch<F>(&self, path: &str, callback: F) -> Result<Vec<String>>
    where
        F: FnOnce(NodeEvent) + Send + 'static,
    {
        self.watched("children", path, WatchKind::Children, callback, |backend| {
            backend.children(path, true)
        })
    }

    /// Delete a childless node.
    ///
    /// The same version guard as [`Session::update`] applies.
    pub fn delete(&self, path: &str, version: Option<i32>) -> Result<()> {
        self.ready()?;
        self.timed("delete", |backend| backend.delete(path, version))?;
        info!(self.logger, "Deleted node"; "path" => path);
        Ok(())
    }

    /// Terminate the session.
    ///
    /// Closing is idempotent; any blocked or future operation fails with
    /// `NotConnected`.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.gate.cancel();
        let result = self.timed("close", |backend| backend.close());
        info!(self.logger, "Zookeeper session closed by client");
        result
    }
}

impl Session {
    /// Gate every operation on the connected session.
    fn ready(&self) -> Result<()> {
        if self.closed.load(Ordering::Relaxed) {
            return Err(ErrorKind::NotConnected.into());
        }
        self.gate.wait(self.connect_timeout)
    }

    fn timed<T>(
        &self,
        op: &'static str,
        call: impl FnOnce(&dyn NamespaceBackend) -> Result<T>,
    ) -> Result<T> {
        let timer = ZOO_OP_DURATION.with_label_values(&[op]).start_timer();
        let result = call(self.backend.as_ref());
        timer.observe_duration();
        if result.is_err() {
            ZOO_OP_ERRORS_COUNT.with_label_values(&[op]).inc();
        }
        result
    }

    /// Issue a read-side operation with a one-shot watch registration.
    ///
    /// The registration is armed before the call so no event can slip past,
    /// and rolled back if the service never armed the watch.
    fn watched<T, F>(
        &self,
        op: &'static str,
        path: &str,
        kind: WatchKind,
        callback: F,
        call: impl FnOnce(&dyn NamespaceBackend) -> Result<T>,
    ) -> Result<T>
    where
        F: FnOnce(NodeEvent) + Send + 'static,
    {
        self.ready()?;
        self.relay.watches().arm(path, kind, Box::new(callback));
        let result = self.timed(op, call);
        if result.is_err() {
            self.relay.watches().disarm(path, kind);
            debug!(self.logger, "Disarmed watch after failed operation"; "path" => path);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crossbeam_channel::unbounded;
    use slog::o;
    use slog::Discard;
    use slog::Logger;

    use super::super::mock::MockNamespace;
    use super::super::ErrorKind;
    use super::super::NodeEventKind;
    use super::Session;

    const RECV_WAIT: Duration = Duration::from_secs(1);
    const NO_EVENT_WAIT: Duration = Duration::from_millis(50);

    fn logger() -> Logger {
        Logger::root(Discard, o!())
    }

    fn session(mock: &MockNamespace) -> Session {
        mock.session(logger())
    }

    #[test]
    fn create_then_exists() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        let created = session.create("/study", b"root-data").expect("create to succeed");
        assert_eq!(created, "/study");
        let meta = session
            .exists("/study")
            .expect("exists to succeed")
            .expect("node to be present");
        assert_eq!(meta.version, 0);
        assert_eq!(meta.num_children, 0);
    }

    #[test]
    fn create_missing_parent_fails() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        match session.create("/study/0727", b"child-data") {
            Ok(_) => panic!("create succeeded without a parent"),
            Err(error) => match error.kind() {
                ErrorKind::NoParent(path) => assert_eq!(path, "/study"),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
        assert!(!mock.contains("/study/0727"));
    }

    #[test]
    fn create_existing_fails() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"root-data").expect("create to succeed");
        match session.create("/study", b"root-data") {
            Ok(_) => panic!("duplicate create succeeded"),
            Err(error) => match error.kind() {
                ErrorKind::NodeExists(path) => assert_eq!(path, "/study"),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
    }

    #[test]
    fn read_returns_last_write() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"root-data").expect("create to succeed");
        let (data, meta) = session.read("/study").expect("read to succeed");
        assert_eq!(data, b"root-data");
        assert_eq!(meta.version, 0);
        session
            .update("/study", b"new-data", None)
            .expect("update to succeed");
        let (data, meta) = session.read("/study").expect("read to succeed");
        assert_eq!(data, b"new-data");
        assert_eq!(meta.version, 1);
    }

    #[test]
    fn read_missing_fails() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        match session.read("/missing") {
            Ok(_) => panic!("read of missing node succeeded"),
            Err(error) => match error.kind() {
                ErrorKind::NoSuchNode(path) => assert_eq!(path, "/missing"),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
    }

    #[test]
    fn update_missing_fails_and_never_creates() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        match session.update("/missing", b"data", None) {
            Ok(_) => panic!("update of missing node succeeded"),
            Err(error) => match error.kind() {
                ErrorKind::NoSuchNode(path) => assert_eq!(path, "/missing"),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
        assert!(session
            .exists("/missing")
            .expect("exists to succeed")
            .is_none());
    }

    #[test]
    fn update_stale_version_fails() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"v0").expect("create to succeed");
        session.update("/study", b"v1", Some(0)).expect("update to succeed");
        match session.update("/study", b"v2", Some(0)) {
            Ok(_) => panic!("stale update succeeded"),
            Err(error) => match error.kind() {
                ErrorKind::BadVersion(path) => assert_eq!(path, "/study"),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
        assert_eq!(mock.data("/study"), Some(b"v1".to_vec()));
    }

    #[test]
    fn list_children_of_fresh_node_is_empty() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"root-data").expect("create to succeed");
        let children = session.list_children("/study").expect("children to succeed");
        assert!(children.is_empty());
    }

    #[test]
    fn list_children_sorted() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"").expect("create to succeed");
        session.create("/study/b", b"").expect("create to succeed");
        session.create("/study/a", b"").expect("create to succeed");
        session.create("/study/a/nested", b"").expect("create to succeed");
        let children = session.list_children("/study").expect("children to succeed");
        assert_eq!(children, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn delete_with_children_fails() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"").expect("create to succeed");
        session.create("/study/0727", b"").expect("create to succeed");
        match session.delete("/study", None) {
            Ok(()) => panic!("delete of a parent succeeded"),
            Err(error) => match error.kind() {
                ErrorKind::NotEmpty(path) => assert_eq!(path, "/study"),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
        session.delete("/study/0727", None).expect("delete to succeed");
        session.delete("/study", None).expect("delete to succeed");
        assert!(!mock.contains("/study"));
    }

    #[test]
    fn delete_stale_version_fails() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"v0").expect("create to succeed");
        session.update("/study", b"v1", None).expect("update to succeed");
        match session.delete("/study", Some(0)) {
            Ok(()) => panic!("stale delete succeeded"),
            Err(error) => match error.kind() {
                ErrorKind::BadVersion(path) => assert_eq!(path, "/study"),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
        session.delete("/study", Some(1)).expect("delete to succeed");
    }

    #[test]
    fn data_watch_fires_once() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"v0").expect("create to succeed");
        let (send, recv) = unbounded();
        session
            .read_watch("/study", move |event| {
                let _ = send.send(event);
            })
            .expect("read to succeed");
        session.update("/study", b"v1", None).expect("update to succeed");
        let event = recv.recv_timeout(RECV_WAIT).expect("watch to fire");
        assert_eq!(event.path, "/study");
        assert_eq!(event.kind, NodeEventKind::DataChanged);
        session.update("/study", b"v2", None).expect("update to succeed");
        assert!(recv.recv_timeout(NO_EVENT_WAIT).is_err());
    }

    #[test]
    fn data_watch_rearms() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"v0").expect("create to succeed");
        let (send, recv) = unbounded();
        let sender = send.clone();
        session
            .read_watch("/study", move |event| {
                let _ = sender.send(event);
            })
            .expect("read to succeed");
        session.update("/study", b"v1", None).expect("update to succeed");
        recv.recv_timeout(RECV_WAIT).expect("watch to fire");
        session
            .read_watch("/study", move |event| {
                let _ = send.send(event);
            })
            .expect("read to succeed");
        session.update("/study", b"v2", None).expect("update to succeed");
        let event = recv.recv_timeout(RECV_WAIT).expect("re-armed watch to fire");
        assert_eq!(event.kind, NodeEventKind::DataChanged);
    }

    #[test]
    fn exists_watch_fires_on_create() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        let (send, recv) = unbounded();
        let absent = session
            .exists_watch("/study", move |event| {
                let _ = send.send(event);
            })
            .expect("exists to succeed");
        assert!(absent.is_none());
        session.create("/study", b"root-data").expect("create to succeed");
        let event = recv.recv_timeout(RECV_WAIT).expect("watch to fire");
        assert_eq!(event.path, "/study");
        assert_eq!(event.kind, NodeEventKind::Created);
    }

    #[test]
    fn exists_watch_fires_on_delete() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"root-data").expect("create to succeed");
        let (send, recv) = unbounded();
        session
            .exists_watch("/study", move |event| {
                let _ = send.send(event);
            })
            .expect("exists to succeed");
        session.delete("/study", None).expect("delete to succeed");
        let event = recv.recv_timeout(RECV_WAIT).expect("watch to fire");
        assert_eq!(event.kind, NodeEventKind::Deleted);
    }

    #[test]
    fn children_watch_fires_on_child_create() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"").expect("create to succeed");
        let (send, recv) = unbounded();
        session
            .list_children_watch("/study", move |event| {
                let _ = send.send(event);
            })
            .expect("children to succeed");
        session.create("/study/0727", b"").expect("create to succeed");
        let event = recv.recv_timeout(RECV_WAIT).expect("watch to fire");
        assert_eq!(event.path, "/study");
        assert_eq!(event.kind, NodeEventKind::ChildrenChanged);
    }

    #[test]
    fn failed_watch_operation_disarms() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"").expect("create to succeed");
        let (send, recv) = unbounded();
        let result = session.read_watch("/missing", move |event| {
            let _ = send.send(event);
        });
        assert!(result.is_err());
        // The armed callback was rolled back, so a later change to the same
        // path must not fire it.
        session.create("/missing", b"").expect("create to succeed");
        assert!(recv.recv_timeout(NO_EVENT_WAIT).is_err());
    }

    #[test]
    fn operations_after_close_fail() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.create("/study", b"").expect("create to succeed");
        session.close().expect("close to succeed");
        match session.exists("/study") {
            Ok(_) => panic!("operation succeeded on a closed session"),
            Err(error) => match error.kind() {
                ErrorKind::NotConnected => (),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
    }

    #[test]
    fn close_is_idempotent() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        session.close().expect("close to succeed");
        session.close().expect("second close to succeed");
        assert!(!session.is_connected());
    }

    #[test]
    fn pending_session_times_out() {
        let mock = MockNamespace::new();
        let session = mock.pending_session(logger(), Some(Duration::from_millis(20)));
        match session.exists("/study") {
            Ok(_) => panic!("operation succeeded without a connection"),
            Err(error) => match error.kind() {
                ErrorKind::ConnectTimeout => (),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
        assert!(!session.is_connected());
    }

    #[test]
    fn close_cancels_pending_waiters() {
        let mock = MockNamespace::new();
        let session = mock.pending_session(logger(), None);
        session.close().expect("close to succeed");
        match session.wait_connected() {
            Ok(()) => panic!("closed session reported connected"),
            Err(error) => match error.kind() {
                ErrorKind::NotConnected => (),
                kind => panic!("unexpected error kind: {:?}", kind),
            },
        }
    }

    #[test]
    fn study_walkthrough() {
        let mock = MockNamespace::new();
        let session = session(&mock);
        assert_eq!(
            session.create("/study", b"root-data").expect("create to succeed"),
            "/study"
        );
        assert_eq!(
            session
                .create("/study/0727", b"child-data")
                .expect("create to succeed"),
            "/study/0727"
        );
        let (data, meta) = session.read("/study/0727").expect("read to succeed");
        assert_eq!(data, b"child-data");
        session
            .update("/study/0727", b"new-data", Some(meta.version))
            .expect("update to succeed");
        let (data, _) = session.read("/study/0727").expect("read to succeed");
        assert_eq!(data, b"new-data");
        let children = session.list_children("/study").expect("children to succeed");
        assert_eq!(children, vec!["0727".to_string()]);
        session.delete("/study/0727", None).expect("delete to succeed");
        assert!(session
            .exists("/study/0727")
            .expect("exists to succeed")
            .is_none());
        session.close().expect("close to succeed");
    }
}
