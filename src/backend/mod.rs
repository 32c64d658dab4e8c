use std::path::Path;

use crate::events::NodeMeta;
use crate::Result;

pub mod zookeeper;

/// Namespace operations offered by a coordination service backend.
///
/// Watch flags request a one-shot server-side watch for the operation's
/// category; delivery lands on the session relay.
pub trait NamespaceBackend: Send + Sync {
    /// Check a node for existence, returning its metadata when present.
    fn exists(&self, path: &str, watch: bool) -> Result<Option<NodeMeta>>;

    /// Create a persistent node under an existing parent.
    fn create(&self, path: &str, data: Vec<u8>) -> Result<String>;

    /// Fetch a node's payload and metadata.
    fn read(&self, path: &str, watch: bool) -> Result<(Vec<u8>, NodeMeta)>;

    /// Overwrite a node's payload, optionally guarded by an expected version.
    fn update(&self, path: &str, data: Vec<u8>, version: Option<i32>) -> Result<NodeMeta>;

    /// List the names of a node's direct children.
    fn children(&self, path: &str, watch: bool) -> Result<Vec<String>>;

    /// Delete a childless node, optionally guarded by an expected version.
    fn delete(&self, path: &str, version: Option<i32>) -> Result<()>;

    /// Terminate the session with the service.
    fn close(&self) -> Result<()>;
}

/// Return the path to the container of the given path.
///
/// The root is its own container.
pub(crate) fn container_path(path: &str) -> String {
    match Path::new(path).parent().and_then(Path::to_str) {
        Some("") | None => "/".to_string(),
        Some(parent) => parent.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::container_path;

    #[test]
    fn container_of_nested_node() {
        assert_eq!(container_path("/study/0727"), "/study");
    }

    #[test]
    fn container_of_root_child() {
        assert_eq!(container_path("/study"), "/");
    }

    #[test]
    fn container_of_root() {
        assert_eq!(container_path("/"), "/");
    }
}
