use zookeeper::KeeperState;
use zookeeper::Stat;
use zookeeper::WatchedEventType;
use zookeeper::ZkState;

/// Lifecycle states of a session, as reported by the client library.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum SessionState {
    AuthFailed,
    Closed,
    Connected,
    ConnectedReadOnly,
    Connecting,
    Disconnected,
    Expired,
}

impl SessionState {
    /// Map a client state transition, skipping deprecated states.
    pub(crate) fn from_zk(state: ZkState) -> Option<SessionState> {
        match state {
            ZkState::AuthFailed => Some(SessionState::AuthFailed),
            ZkState::Closed => Some(SessionState::Closed),
            ZkState::Connected => Some(SessionState::Connected),
            ZkState::ConnectedReadOnly => Some(SessionState::ConnectedReadOnly),
            ZkState::Connecting => Some(SessionState::Connecting),
            _ => None,
        }
    }

    /// Map the session state attached to a watched event, skipping
    /// notifications with no state transition of interest.
    pub(crate) fn from_keeper(state: KeeperState) -> Option<SessionState> {
        match state {
            KeeperState::AuthFailed => Some(SessionState::AuthFailed),
            KeeperState::ConnectedReadOnly => Some(SessionState::ConnectedReadOnly),
            KeeperState::Disconnected => Some(SessionState::Disconnected),
            KeeperState::Expired => Some(SessionState::Expired),
            KeeperState::SyncConnected => Some(SessionState::Connected),
            _ => None,
        }
    }
}

/// Categories of watch registrations, keyed by the operation that arms them.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum WatchKind {
    Children,
    Data,
    Exists,
}

/// Kinds of change notifications delivered for a node.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub enum NodeEventKind {
    ChildrenChanged,
    Created,
    DataChanged,
    Deleted,
}

impl NodeEventKind {
    pub(crate) fn from_watched(event_type: WatchedEventType) -> Option<NodeEventKind> {
        match event_type {
            WatchedEventType::NodeChildrenChanged => Some(NodeEventKind::ChildrenChanged),
            WatchedEventType::NodeCreated => Some(NodeEventKind::Created),
            WatchedEventType::NodeDataChanged => Some(NodeEventKind::DataChanged),
            WatchedEventType::NodeDeleted => Some(NodeEventKind::Deleted),
            _ => None,
        }
    }

    /// Watch categories satisfied by this event kind, in dispatch order.
    ///
    /// The rules mirror the service's own: an existence watch also observes
    /// data changes and deletion, a children watch also observes deletion of
    /// the watched node itself.
    pub(crate) fn categories(self) -> &'static [WatchKind] {
        match self {
            NodeEventKind::ChildrenChanged => &[WatchKind::Children],
            NodeEventKind::Created => &[WatchKind::Exists],
            NodeEventKind::DataChanged => &[WatchKind::Data, WatchKind::Exists],
            NodeEventKind::Deleted => &[WatchKind::Data, WatchKind::Exists, WatchKind::Children],
        }
    }

    pub(crate) fn as_str(self) -> &'static str {
        match self {
            NodeEventKind::ChildrenChanged => "children-changed",
            NodeEventKind::Created => "created",
            NodeEventKind::DataChanged => "data-changed",
            NodeEventKind::Deleted => "deleted",
        }
    }
}

/// A change notification for a watched node path.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct NodeEvent {
    pub kind: NodeEventKind,
    pub path: String,
}

/// Subset of the service's stat structure surfaced by the facade.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
pub struct NodeMeta {
    /// Transaction ID that created the node.
    pub czxid: i64,

    /// Transaction ID that last modified the node.
    pub mzxid: i64,

    /// Data version, incremented on every update.
    pub version: i32,

    /// Size of the node payload in bytes.
    pub data_length: i32,

    /// Number of direct children.
    pub num_children: i32,
}

impl From<Stat> for NodeMeta {
    fn from(stat: Stat) -> NodeMeta {
        NodeMeta {
            czxid: stat.czxid,
            mzxid: stat.mzxid,
            version: stat.version,
            data_length: stat.data_length,
            num_children: stat.num_children,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::NodeEventKind;
    use super::WatchKind;

    #[test]
    fn children_changes_reach_children_watches() {
        let categories = NodeEventKind::ChildrenChanged.categories();
        assert_eq!(categories, &[WatchKind::Children]);
    }

    #[test]
    fn deletion_reaches_every_watch_category() {
        let categories = NodeEventKind::Deleted.categories();
        assert!(categories.contains(&WatchKind::Data));
        assert!(categories.contains(&WatchKind::Exists));
        assert!(categories.contains(&WatchKind::Children));
    }
}
