use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CollectorError;

static OSF_PATH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)osf\.io/([^?#\s]*)").unwrap());
static GUID_SEGMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z0-9]{5,})(?:_v\d+)?$").unwrap());
static BARE_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{5,}$").unwrap());

/// First path segments of osf.io pages that are not projects.
const RESERVED_SEGMENTS: &[&str] = &[
    "collections",
    "dashboard",
    "download",
    "explore",
    "institutions",
    "login",
    "logout",
    "meetings",
    "myprojects",
    "register",
    "registries",
    "search",
    "settings",
    "support",
];

/// OSF GUIDs are five characters; preprint provider slugs are longer.
const GUID_LEN: usize = 5;

/// Stable OSF identifier (`abc12`), always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ProjectId {
    type Err = CollectorError;

    /// Accepts full urls, scheme-less `osf.io/<id>` links, OSF DOIs
    /// (`10.17605/OSF.IO/<ID>`) and bare ids.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Some(caps) = OSF_PATH_RE.captures(trimmed) {
            return id_from_osf_path(&caps[1])
                .map(Self)
                .ok_or_else(|| CollectorError::InvalidProjectUrl(value.to_string()));
        }
        if BARE_ID_RE.is_match(trimmed) {
            return Ok(Self(trimmed.to_ascii_lowercase()));
        }
        Err(CollectorError::InvalidProjectUrl(value.to_string()))
    }
}

/// `<id>/...`, `preprints/<id>` or `preprints/<provider>/<id>`.
fn id_from_osf_path(path: &str) -> Option<String> {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    let first = segments.next()?;
    if first.eq_ignore_ascii_case("preprints") {
        return match (segments.next(), segments.next()) {
            (Some(_provider), Some(id)) => guid(id),
            (Some(id), None) => guid(id).filter(|id| id.len() == GUID_LEN),
            _ => None,
        };
    }
    if RESERVED_SEGMENTS
        .iter()
        .any(|word| first.eq_ignore_ascii_case(word))
    {
        return None;
    }
    guid(first)
}

fn guid(segment: &str) -> Option<String> {
    GUID_SEGMENT_RE
        .captures(segment)
        .map(|caps| caps[1].to_ascii_lowercase())
}

/// The three resource shapes a project id can belong to on the OSF API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointType {
    Node,
    Registration,
    Preprint,
}

impl EndpointType {
    /// Resolution order. The first shape answering with a success status wins.
    pub const PRIORITY: [EndpointType; 3] = [
        EndpointType::Node,
        EndpointType::Registration,
        EndpointType::Preprint,
    ];

    pub fn collection(self) -> &'static str {
        match self {
            EndpointType::Node => "nodes",
            EndpointType::Registration => "registrations",
            EndpointType::Preprint => "preprints",
        }
    }

    pub fn resource_url(self, base_url: &str, id: &ProjectId) -> String {
        format!(
            "{}/{}/{}/",
            base_url.trim_end_matches('/'),
            self.collection(),
            id.as_str()
        )
    }

    /// Sub-resource url for a facet, or `None` when this shape has no such
    /// sub-resource (preprints carry neither logs nor file storage).
    pub fn facet_url(self, base_url: &str, id: &ProjectId, facet: Facet) -> Option<String> {
        let segment = match (self, facet) {
            (EndpointType::Preprint, Facet::Logs | Facet::Files) => return None,
            (_, Facet::Subjects) => "subjects",
            (_, Facet::Contributors) => "contributors",
            (_, Facet::Citation) => "citation",
            (_, Facet::Analytics) => "analytics",
            (_, Facet::Logs) => "logs",
            (_, Facet::Files) => "files",
            (_, Facet::License) => return None,
        };
        Some(format!(
            "{}{}/",
            self.resource_url(base_url, id),
            segment
        ))
    }
}

impl fmt::Display for EndpointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointType::Node => write!(f, "node"),
            EndpointType::Registration => write!(f, "registration"),
            EndpointType::Preprint => write!(f, "preprint"),
        }
    }
}

/// One independently fetchable sub-resource of a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Subjects,
    Contributors,
    License,
    Citation,
    Analytics,
    Logs,
    Files,
}

impl fmt::Display for Facet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Facet::Subjects => "subjects",
            Facet::Contributors => "contributors",
            Facet::License => "license",
            Facet::Citation => "citation",
            Facet::Analytics => "analytics",
            Facet::Logs => "logs",
            Facet::Files => "files",
        };
        f.write_str(name)
    }
}
