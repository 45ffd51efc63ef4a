use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{EndpointType, Facet, ProjectId};

/// One fully collected project, frozen once its metrics are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub project_id: ProjectId,
    pub url: String,
    pub endpoint_type: EndpointType,
    pub title: String,
    pub description: String,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub public: bool,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub fork: bool,
    pub registration: bool,
    pub preprint: bool,
    pub license: Option<License>,
    pub subjects: Vec<Subject>,
    pub contributors: Vec<Contributor>,
    pub file_structure: FileStructure,
    pub metrics: Metrics,
    pub analytics: Value,
    pub citation: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facet_failures: Vec<FacetFailure>,
    pub collection_date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    pub text: String,
    pub parents: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contributor {
    pub name: String,
    pub permission: Option<String>,
    pub bibliographic: bool,
    pub user_id: String,
    pub user_link: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetFailure {
    pub facet: Facet,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    File,
    Folder,
}

/// Files and folders of one storage provider, in listing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStructure {
    pub providers: Vec<StorageProvider>,
    /// Set when the provider list itself could not be fetched.
    #[serde(default, skip_serializing_if = "is_false")]
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProvider {
    pub name: String,
    pub children: Vec<FileNode>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub kind: NodeKind,
    pub path: String,
    pub size: Option<u64>,
    pub download_count: u64,
    pub created: Option<String>,
    pub modified: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FileNode>,
    /// The folder's listing failed or was cut off; `children` is a subset.
    #[serde(default, skip_serializing_if = "is_false")]
    pub partial: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileNode {
    fn fold<T>(&self, init: T, f: &impl Fn(T, &FileNode) -> T) -> T {
        let acc = f(init, self);
        self.children
            .iter()
            .fold(acc, |acc, child| child.fold(acc, f))
    }
}

impl FileStructure {
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    fn fold<T>(&self, init: T, f: impl Fn(T, &FileNode) -> T) -> T {
        self.providers.iter().fold(init, |acc, provider| {
            provider
                .children
                .iter()
                .fold(acc, |acc, node| node.fold(acc, &f))
        })
    }

    pub fn total_downloads(&self) -> u64 {
        self.fold(0, |sum, node| match node.kind {
            NodeKind::File => sum + node.download_count,
            NodeKind::Folder => sum,
        })
    }

    pub fn file_count(&self) -> usize {
        self.fold(0, |count, node| match node.kind {
            NodeKind::File => count + 1,
            NodeKind::Folder => count,
        })
    }

    /// True when any level of the tree was only partially retrieved, which
    /// makes the rolled-up metrics a lower bound.
    pub fn is_partial(&self) -> bool {
        self.partial
            || self.providers.iter().any(|provider| provider.partial)
            || self.fold(false, |partial, node| partial || node.partial)
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|provider| provider.name.clone())
            .collect()
    }
}

/// Aggregates derived from the file tree and contributor list, never
/// fetched directly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_downloads: u64,
    pub activity_logs: u64,
    pub contributor_count: usize,
    pub file_count: usize,
    pub storage_providers: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub partial: bool,
}

impl Metrics {
    pub fn compute(
        file_structure: &FileStructure,
        contributors: &[Contributor],
        activity_logs: u64,
    ) -> Self {
        Self {
            total_downloads: file_structure.total_downloads(),
            activity_logs,
            contributor_count: contributors.len(),
            file_count: file_structure.file_count(),
            storage_providers: file_structure.provider_names(),
            partial: file_structure.is_partial(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InvalidUrl,
    Unresolved,
}

/// A seed that produced no record, with the reason it was excluded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub url: String,
    pub project_id: Option<ProjectId>,
    pub kind: FailureKind,
    pub reason: String,
    pub failed_at: String,
}

fn is_false(value: &bool) -> bool {
    !*value
}
