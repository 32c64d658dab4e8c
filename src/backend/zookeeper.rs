use std::sync::Arc;
use std::time::Duration;

use failure::Fail;
use failure::ResultExt;
use slog::debug;
use slog::info;
use slog::Logger;

use zookeeper::Acl;
use zookeeper::CreateMode;
use zookeeper::WatchedEvent;
use zookeeper::WatchedEventType;
use zookeeper::Watcher;
use zookeeper::ZkError;
use zookeeper::ZooKeeper;

use crate::config::Config;
use crate::error::Error;
use crate::error::ErrorKind;
use crate::events::NodeEvent;
use crate::events::NodeEventKind;
use crate::events::NodeMeta;
use crate::events::SessionState;
use crate::metrics::ZOO_CONNECT_COUNT;
use crate::metrics::ZOO_TIMEOUTS_COUNT;
use crate::relay::Relay;
use crate::Result;

use super::container_path;
use super::NamespaceBackend;

/// Zookeeper-backed namespace operations.
pub struct ZookeeperBackend {
    keeper: ZooKeeper,
}

impl ZookeeperBackend {
    /// Open a new session with the configured ensemble.
    ///
    /// The handshake completes asynchronously: operations become usable once
    /// the relay observes the connected state and opens the gate.
    pub fn connect(config: &Config, relay: Arc<Relay>, logger: Logger) -> Result<ZookeeperBackend> {
        info!(logger, "Initiating zookeeper session"; "ensemble" => &config.ensemble);
        let timeout = Duration::from_secs(config.timeout);
        let watcher = RelayWatcher {
            logger: logger.clone(),
            relay: Arc::clone(&relay),
        };
        let keeper = ZooKeeper::connect(&config.ensemble, timeout, watcher)
            .with_context(|_| ErrorKind::Connect)?;
        ZOO_CONNECT_COUNT.inc();
        keeper.add_listener(move |state| match SessionState::from_zk(state) {
            Some(state) => relay.handle_state(state),
            None => debug!(logger, "Ignoring deprecated zookeeper client state"; "state" => ?state),
        });
        Ok(ZookeeperBackend { keeper })
    }
}

impl NamespaceBackend for ZookeeperBackend {
    fn exists(&self, path: &str, watch: bool) -> Result<Option<NodeMeta>> {
        match self.keeper.exists(path, watch) {
            Ok(meta) => Ok(meta.map(NodeMeta::from)),
            Err(error) => Err(op_error(error, "exists", path)),
        }
    }

    fn create(&self, path: &str, data: Vec<u8>) -> Result<String> {
        let result = self
            .keeper
            .create(path, data, Acl::open_unsafe().clone(), CreateMode::Persistent);
        match result {
            Ok(created) => Ok(created),
            // Creation is not recursive: a missing parent is the caller's
            // problem, reported as such instead of as a missing node.
            Err(ZkError::NoNode) => Err(ErrorKind::NoParent(container_path(path)).into()),
            Err(error) => Err(op_error(error, "create", path)),
        }
    }

    fn read(&self, path: &str, watch: bool) -> Result<(Vec<u8>, NodeMeta)> {
        match self.keeper.get_data(path, watch) {
            Ok((data, meta)) => Ok((data, NodeMeta::from(meta))),
            Err(error) => Err(op_error(error, "read", path)),
        }
    }

    fn update(&self, path: &str, data: Vec<u8>, version: Option<i32>) -> Result<NodeMeta> {
        match self.keeper.set_data(path, data, version) {
            Ok(meta) => Ok(NodeMeta::from(meta)),
            Err(error) => Err(op_error(error, "update", path)),
        }
    }

    fn children(&self, path: &str, watch: bool) -> Result<Vec<String>> {
        match self.keeper.get_children(path, watch) {
            Ok(mut children) => {
                children.sort();
                Ok(children)
            }
            Err(error) => Err(op_error(error, "children", path)),
        }
    }

    fn delete(&self, path: &str, version: Option<i32>) -> Result<()> {
        match self.keeper.delete(path, version) {
            Ok(()) => Ok(()),
            Err(error) => Err(op_error(error, "delete", path)),
        }
    }

    fn close(&self) -> Result<()> {
        self.keeper
            .close()
            .with_context(|_| ErrorKind::Backend("session close"))?;
        Ok(())
    }
}

/// Map a zookeeper error onto the facade taxonomy.
fn op_error(error: ZkError, op: &'static str, path: &str) -> Error {
    if error == ZkError::OperationTimeout {
        ZOO_TIMEOUTS_COUNT.inc();
    }
    match error {
        ZkError::NoNode => ErrorKind::NoSuchNode(path.to_string()).into(),
        ZkError::NodeExists => ErrorKind::NodeExists(path.to_string()).into(),
        ZkError::NotEmpty => ErrorKind::NotEmpty(path.to_string()).into(),
        ZkError::BadVersion => ErrorKind::BadVersion(path.to_string()).into(),
        ZkError::SessionExpired => ErrorKind::SessionExpired.into(),
        ZkError::AuthFailed | ZkError::NoAuth => ErrorKind::AuthFailed.into(),
        ZkError::ConnectionLoss => ErrorKind::NotConnected.into(),
        error => Error::from(error.context(ErrorKind::Backend(op))),
    }
}

/// Forwards client library notifications to the session relay.
struct RelayWatcher {
    logger: Logger,
    relay: Arc<Relay>,
}

impl Watcher for RelayWatcher {
    fn handle(&self, event: WatchedEvent) {
        if let WatchedEventType::None = event.event_type {
            // Session events carry the state transition, not a node change.
            match SessionState::from_keeper(event.keeper_state) {
                Some(state) => self.relay.handle_state(state),
                None => debug!(
                    self.logger, "Ignoring keeper state notification";
                    "state" => ?event.keeper_state,
                ),
            }
            return;
        }
        let kind = match NodeEventKind::from_watched(event.event_type) {
            Some(kind) => kind,
            None => {
                debug!(
                    self.logger, "Ignoring unhandled watch event type";
                    "type" => ?event.event_type,
                );
                return;
            }
        };
        let path = match event.path {
            Some(path) => path,
            None => {
                debug!(self.logger, "Dropping node event without a path"; "kind" => kind.as_str());
                return;
            }
        };
        self.relay.handle_event(NodeEvent { kind, path });
    }
}
