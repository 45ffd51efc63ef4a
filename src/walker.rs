use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{EndpointType, Facet, ProjectId};
use crate::osf::{OsfApi, attr_str, attributes, fetch_pages, related_href};
use crate::record::{FileNode, FileStructure, NodeKind, StorageProvider};

/// One folder listing: its children in remote order, whether anything at or
/// below this level is incomplete, and the error that cut this level's own
/// listing short.
struct Listing {
    children: Vec<FileNode>,
    partial: bool,
    error: Option<String>,
}

/// Depth-first walk of every storage provider of a project.
pub struct FileTreeWalker<'a, A: OsfApi + ?Sized> {
    api: &'a A,
    base_url: &'a str,
    max_depth: usize,
}

impl<'a, A: OsfApi + ?Sized> FileTreeWalker<'a, A> {
    pub fn new(api: &'a A, base_url: &'a str, max_depth: usize) -> Self {
        Self {
            api,
            base_url,
            max_depth,
        }
    }

    /// Never fails: a provider list or folder that cannot be fetched is
    /// marked partial and everything retrieved so far is kept.
    pub fn walk(&self, id: &ProjectId, endpoint_type: EndpointType) -> FileStructure {
        let Some(url) = endpoint_type.facet_url(self.base_url, id, Facet::Files) else {
            return FileStructure::default();
        };
        let pages = fetch_pages(self.api, &url);
        let mut partial = false;
        let error = pages.error.map(|err| {
            warn!(project = %id, error = %err, "storage providers unavailable");
            partial = true;
            err.to_string()
        });

        let mut providers = Vec::with_capacity(pages.items.len());
        for item in &pages.items {
            let Some(name) = attr_str(item, "name").or_else(|| attr_str(item, "provider")) else {
                warn!(project = %id, "storage provider without a name skipped");
                partial = true;
                continue;
            };
            let root = related_href(item, "files").unwrap_or_else(|| format!("{url}{name}/"));
            debug!(project = %id, provider = %name, "walking provider");
            providers.push(self.walk_provider(name, &root));
        }

        FileStructure {
            providers,
            partial,
            error,
        }
    }

    fn walk_provider(&self, name: String, root: &str) -> StorageProvider {
        let listing = self.list_folder(root, 0);
        StorageProvider {
            name,
            children: listing.children,
            partial: listing.partial,
            error: listing.error,
        }
    }

    fn list_folder(&self, url: &str, depth: usize) -> Listing {
        let pages = fetch_pages(self.api, url);
        let error = pages.error.map(|err| {
            warn!(url, kept = pages.items.len(), error = %err, "folder listing failed");
            err.to_string()
        });

        let mut partial = error.is_some();
        let mut children = Vec::with_capacity(pages.items.len());
        for item in &pages.items {
            let Some(mut node) = node_from(item) else {
                debug!(url, "entry of unknown kind skipped");
                partial = true;
                continue;
            };
            if node.kind == NodeKind::Folder {
                partial |= self.fill_folder(&mut node, item, depth + 1);
            }
            children.push(node);
        }
        Listing {
            children,
            partial,
            error,
        }
    }

    /// Lists a folder's children into `node`, returning whether its subtree
    /// is incomplete. `node.partial` marks only the folder whose own listing
    /// failed.
    fn fill_folder(&self, node: &mut FileNode, item: &Value, depth: usize) -> bool {
        let Some(href) = related_href(item, "files") else {
            return false;
        };
        if depth > self.max_depth {
            node.partial = true;
            node.error = Some(format!("folder deeper than {} levels", self.max_depth));
            return true;
        }
        let listing = self.list_folder(&href, depth);
        node.children = listing.children;
        node.partial = listing.error.is_some();
        node.error = listing.error;
        listing.partial
    }
}

/// `None` for entries that are neither a file nor a folder.
fn node_from(item: &Value) -> Option<FileNode> {
    let attrs = attributes(item)?;
    let kind = match attrs.get("kind").and_then(Value::as_str) {
        Some("file") => NodeKind::File,
        Some("folder") => NodeKind::Folder,
        _ => return None,
    };
    Some(FileNode {
        name: attr_str(item, "name").unwrap_or_default(),
        kind,
        path: attr_str(item, "materialized_path").unwrap_or_default(),
        size: attrs.get("size").and_then(Value::as_u64),
        download_count: match kind {
            NodeKind::File => download_count(attrs),
            NodeKind::Folder => 0,
        },
        created: attr_str(item, "date_created"),
        modified: attr_str(item, "date_modified"),
        children: Vec::new(),
        partial: false,
        error: None,
    })
}

/// `extra.downloads`, else `current_version.metrics.downloads`, else 0.
fn download_count(attrs: &Value) -> u64 {
    let count = |value: &Value| value.as_u64().or_else(|| value.as_f64().map(|v| v as u64));
    attrs
        .get("extra")
        .and_then(|extra| extra.get("downloads"))
        .and_then(count)
        .or_else(|| {
            attrs
                .get("current_version")
                .and_then(|version| version.get("metrics"))
                .and_then(|metrics| metrics.get("downloads"))
                .and_then(count)
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn downloads_prefer_extra_then_version_metrics() {
        assert_eq!(download_count(&json!({ "extra": { "downloads": 12 } })), 12);
        assert_eq!(
            download_count(&json!({ "current_version": { "metrics": { "downloads": 5 } } })),
            5
        );
        assert_eq!(download_count(&json!({ "current_version": 3 })), 0);
    }

    #[test]
    fn folder_nodes_carry_no_downloads() {
        let node = node_from(&json!({
            "attributes": { "name": "cad", "kind": "folder", "extra": { "downloads": 9 } }
        }))
        .unwrap();
        assert_eq!(node.kind, NodeKind::Folder);
        assert_eq!(node.download_count, 0);
    }

    #[test]
    fn entries_without_a_known_kind_are_not_nodes() {
        assert_eq!(node_from(&json!({ "attributes": { "name": "x" } })), None);
        assert_eq!(
            node_from(&json!({ "attributes": { "name": "x", "kind": "link" } })),
            None
        );
        let file = node_from(&json!({ "attributes": { "name": "a.stl", "kind": "file" } }));
        assert_eq!(file.unwrap().kind, NodeKind::File);
    }
}
