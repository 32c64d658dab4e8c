use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::backend::container_path;
use crate::backend::NamespaceBackend;
use crate::error::ErrorKind;
use crate::events::NodeEvent;
use crate::events::NodeEventKind;
use crate::events::NodeMeta;
use crate::events::SessionState;
use crate::events::WatchKind;
use crate::relay::Relay;
use crate::Result;

/// In-memory namespace backend.
///
/// Mimics the service contract the real backend surfaces: parent checks on
/// create, version guards on update/delete, and one-shot server-side watches
/// consumed by the first matching change and delivered to the relay.
pub struct MockBackend {
    pub relay: Arc<Relay>,
    pub state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock namespace state poisoned")
    }

    /// Deliver events outside the state lock: callbacks may issue operations.
    fn fire(&self, events: Vec<NodeEvent>) {
        for event in events {
            self.relay.handle_event(event);
        }
    }
}

impl NamespaceBackend for MockBackend {
    fn exists(&self, path: &str, watch: bool) -> Result<Option<NodeMeta>> {
        let mut state = self.lock();
        state.check_open()?;
        if watch {
            state.arm(path, WatchKind::Exists);
        }
        Ok(state.meta(path))
    }

    fn create(&self, path: &str, data: Vec<u8>) -> Result<String> {
        let events = {
            let mut state = self.lock();
            state.check_open()?;
            if state.contains(path) {
                return Err(ErrorKind::NodeExists(path.to_string()).into());
            }
            let parent = container_path(path);
            if !state.contains(&parent) {
                return Err(ErrorKind::NoParent(parent).into());
            }
            state.insert(path, data);
            state.consume_create_watches(path)
        };
        self.fire(events);
        Ok(path.to_string())
    }

    fn read(&self, path: &str, watch: bool) -> Result<(Vec<u8>, NodeMeta)> {
        let mut state = self.lock();
        state.check_open()?;
        let data = state
            .data(path)
            .ok_or_else(|| ErrorKind::NoSuchNode(path.to_string()))?;
        if watch {
            state.arm(path, WatchKind::Data);
        }
        let meta = state.meta(path).expect("node disappeared while locked");
        Ok((data, meta))
    }

    fn update(&self, path: &str, data: Vec<u8>, version: Option<i32>) -> Result<NodeMeta> {
        let (meta, events) = {
            let mut state = self.lock();
            state.check_open()?;
            state.check_version(path, version)?;
            state.overwrite(path, data);
            let meta = state.meta(path).expect("node disappeared while locked");
            (meta, state.consume_data_watches(path))
        };
        self.fire(events);
        Ok(meta)
    }

    fn children(&self, path: &str, watch: bool) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.check_open()?;
        if !state.contains(path) {
            return Err(ErrorKind::NoSuchNode(path.to_string()).into());
        }
        if watch {
            state.arm(path, WatchKind::Children);
        }
        Ok(state.child_names(path))
    }

    fn delete(&self, path: &str, version: Option<i32>) -> Result<()> {
        let events = {
            let mut state = self.lock();
            state.check_open()?;
            if !state.child_names(path).is_empty() {
                return Err(ErrorKind::NotEmpty(path.to_string()).into());
            }
            state.check_version(path, version)?;
            state.remove(path);
            state.consume_delete_watches(path)
        };
        self.fire(events);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        {
            let mut state = self.lock();
            state.closed = true;
        }
        self.relay.handle_state(SessionState::Closed);
        Ok(())
    }
}

/// Raw in-memory namespace shared across mock sessions.
pub struct MockState {
    closed: bool,
    next_zxid: i64,
    nodes: HashMap<String, MockNode>,
    watches: HashSet<(String, WatchKind)>,
}

struct MockNode {
    czxid: i64,
    data: Vec<u8>,
    mzxid: i64,
    version: i32,
}

impl MockState {
    pub(crate) fn with_root() -> MockState {
        let mut nodes = HashMap::new();
        nodes.insert(
            "/".to_string(),
            MockNode {
                czxid: 0,
                data: Vec::new(),
                mzxid: 0,
                version: 0,
            },
        );
        MockState {
            closed: false,
            next_zxid: 1,
            nodes,
            watches: HashSet::new(),
        }
    }

    pub(crate) fn armed_watches(&self) -> usize {
        self.watches.len()
    }

    pub(crate) fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub(crate) fn data(&self, path: &str) -> Option<Vec<u8>> {
        self.nodes.get(path).map(|node| node.data.clone())
    }

    fn arm(&mut self, path: &str, kind: WatchKind) {
        self.watches.insert((path.to_string(), kind));
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(ErrorKind::NotConnected.into());
        }
        Ok(())
    }

    fn check_version(&self, path: &str, version: Option<i32>) -> Result<()> {
        let node = self
            .nodes
            .get(path)
            .ok_or_else(|| ErrorKind::NoSuchNode(path.to_string()))?;
        match version {
            Some(expected) if expected != node.version => {
                Err(ErrorKind::BadVersion(path.to_string()).into())
            }
            _ => Ok(()),
        }
    }

    fn child_names(&self, path: &str) -> Vec<String> {
        let prefix = match path {
            "/" => "/".to_string(),
            path => format!("{}/", path),
        };
        let mut names: Vec<String> = self
            .nodes
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter(|rest| !rest.is_empty() && !rest.contains('/'))
            .map(String::from)
            .collect();
        names.sort();
        names
    }

    fn insert(&mut self, path: &str, data: Vec<u8>) {
        let zxid = self.next_zxid;
        self.next_zxid += 1;
        self.nodes.insert(
            path.to_string(),
            MockNode {
                czxid: zxid,
                data,
                mzxid: zxid,
                version: 0,
            },
        );
    }

    fn meta(&self, path: &str) -> Option<NodeMeta> {
        let node = self.nodes.get(path)?;
        Some(NodeMeta {
            czxid: node.czxid,
            mzxid: node.mzxid,
            version: node.version,
            data_length: node.data.len() as i32,
            num_children: self.child_names(path).len() as i32,
        })
    }

    fn overwrite(&mut self, path: &str, data: Vec<u8>) {
        let zxid = self.next_zxid;
        self.next_zxid += 1;
        let node = self.nodes.get_mut(path).expect("node checked before overwrite");
        node.data = data;
        node.mzxid = zxid;
        node.version += 1;
    }

    fn remove(&mut self, path: &str) {
        self.nodes.remove(path);
    }

    /// Consume watches satisfied by a node creation.
    fn consume_create_watches(&mut self, path: &str) -> Vec<NodeEvent> {
        let mut events = Vec::new();
        if self.consume(path, WatchKind::Exists) {
            events.push(NodeEvent {
                kind: NodeEventKind::Created,
                path: path.to_string(),
            });
        }
        let parent = container_path(path);
        if self.consume(&parent, WatchKind::Children) {
            events.push(NodeEvent {
                kind: NodeEventKind::ChildrenChanged,
                path: parent,
            });
        }
        events
    }

    /// Consume watches satisfied by a data change.
    fn consume_data_watches(&mut self, path: &str) -> Vec<NodeEvent> {
        let mut events = Vec::new();
        for kind in [WatchKind::Data, WatchKind::Exists] {
            if self.consume(path, kind) {
                events.push(NodeEvent {
                    kind: NodeEventKind::DataChanged,
                    path: path.to_string(),
                });
            }
        }
        events
    }

    /// Consume watches satisfied by a node deletion.
    fn consume_delete_watches(&mut self, path: &str) -> Vec<NodeEvent> {
        let mut events = Vec::new();
        for kind in [WatchKind::Data, WatchKind::Exists, WatchKind::Children] {
            if self.consume(path, kind) {
                events.push(NodeEvent {
                    kind: NodeEventKind::Deleted,
                    path: path.to_string(),
                });
            }
        }
        let parent = container_path(path);
        if self.consume(&parent, WatchKind::Children) {
            events.push(NodeEvent {
                kind: NodeEventKind::ChildrenChanged,
                path: parent,
            });
        }
        events
    }

    fn consume(&mut self, path: &str, kind: WatchKind) -> bool {
        self.watches.remove(&(path.to_string(), kind))
    }
}

#[cfg(test)]
mod tests {
    use super::MockState;
    use super::WatchKind;

    #[test]
    fn child_names_are_direct_children_only() {
        let mut state = MockState::with_root();
        state.insert("/study", Vec::new());
        state.insert("/study/a", Vec::new());
        state.insert("/study/a/nested", Vec::new());
        state.insert("/studyish", Vec::new());
        assert_eq!(state.child_names("/study"), vec!["a".to_string()]);
        assert_eq!(
            state.child_names("/"),
            vec!["study".to_string(), "studyish".to_string()]
        );
    }

    #[test]
    fn watches_consume_once() {
        let mut state = MockState::with_root();
        state.insert("/study", Vec::new());
        state.arm("/study", WatchKind::Data);
        assert_eq!(state.consume_data_watches("/study").len(), 1);
        assert_eq!(state.consume_data_watches("/study").len(), 0);
        assert_eq!(state.armed_watches(), 0);
    }
}
