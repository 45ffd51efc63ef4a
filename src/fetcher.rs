use serde_json::Value;
use tracing::{debug, warn};

use crate::domain::{EndpointType, Facet, ProjectId};
use crate::error::CollectorError;
use crate::osf::{OsfApi, attr_str, attributes, fetch_list, related_href};
use crate::record::{
    Contributor, FacetFailure, FileStructure, License, Metrics, ProjectRecord, Subject,
};
use crate::resolver::Resolution;

const UNKNOWN_CONTRIBUTOR: &str = "Unknown";

static NULL: Value = Value::Null;

/// Fills every facet of a resolved project except the file tree. A facet
/// that cannot be fetched is left empty and listed in `facet_failures`.
pub struct MetadataFetcher<'a, A: OsfApi + ?Sized> {
    api: &'a A,
    base_url: &'a str,
}

impl<'a, A: OsfApi + ?Sized> MetadataFetcher<'a, A> {
    pub fn new(api: &'a A, base_url: &'a str) -> Self {
        Self { api, base_url }
    }

    pub fn fetch(
        &self,
        url: &str,
        id: &ProjectId,
        resolution: &Resolution,
        collection_date: String,
    ) -> ProjectRecord {
        let endpoint_type = resolution.endpoint_type;
        let data = resolution.document.get("data").unwrap_or(&NULL);
        let attrs = attributes(data).unwrap_or(&NULL);
        let mut failures = Vec::new();

        let license = self
            .fetch_license(data)
            .unwrap_or_else(|err| record_failure(&mut failures, id, Facet::License, err));
        let subjects = self
            .fetch_subjects(data, id, endpoint_type)
            .unwrap_or_else(|err| record_failure(&mut failures, id, Facet::Subjects, err));
        let contributors = self
            .fetch_contributors(id, endpoint_type)
            .unwrap_or_else(|err| record_failure(&mut failures, id, Facet::Contributors, err));
        let analytics = self
            .fetch_passthrough(id, endpoint_type, Facet::Analytics)
            .unwrap_or_else(|err| record_failure(&mut failures, id, Facet::Analytics, err));
        let activity_logs = self
            .fetch_log_count(id, endpoint_type)
            .unwrap_or_else(|err| record_failure(&mut failures, id, Facet::Logs, err));
        let citation = self
            .fetch_passthrough(id, endpoint_type, Facet::Citation)
            .unwrap_or_else(|err| record_failure(&mut failures, id, Facet::Citation, err));

        ProjectRecord {
            project_id: id.clone(),
            url: url.to_string(),
            endpoint_type,
            title: attr_str(data, "title").unwrap_or_default(),
            description: attr_str(data, "description").unwrap_or_default(),
            created: attr_str(data, "date_created"),
            modified: attr_str(data, "date_modified"),
            public: flag(attrs, "public"),
            category: attr_str(data, "category"),
            tags: string_list(attrs.get("tags")),
            fork: flag(attrs, "fork"),
            registration: flag(attrs, "registration"),
            preprint: flag(attrs, "preprint"),
            license,
            subjects,
            contributors,
            file_structure: FileStructure::default(),
            metrics: Metrics {
                activity_logs,
                ..Metrics::default()
            },
            analytics,
            citation,
            facet_failures: failures,
            collection_date,
        }
    }

    /// Embedded license first, then the license relationship. A project
    /// without a license relationship has no license, which is not an error.
    fn fetch_license(&self, data: &Value) -> Result<Option<License>, CollectorError> {
        if let Some(embedded) = embedded_data(data, "license").filter(|value| value.is_object()) {
            return Ok(license_from(embedded));
        }
        let Some(href) = related_href(data, "license") else {
            return Ok(None);
        };
        let document = self.api.get(&href)?;
        Ok(document.get("data").and_then(license_from))
    }

    fn fetch_subjects(
        &self,
        data: &Value,
        id: &ProjectId,
        endpoint_type: EndpointType,
    ) -> Result<Vec<Subject>, CollectorError> {
        if let Some(embedded) = embedded_data(data, "subjects").and_then(Value::as_array) {
            if !embedded.is_empty() {
                return Ok(embedded.iter().filter_map(subject_from).collect());
            }
        }
        let Some(url) = endpoint_type.facet_url(self.base_url, id, Facet::Subjects) else {
            return Ok(Vec::new());
        };
        let items = fetch_list(self.api, &url)?;
        Ok(items.iter().filter_map(subject_from).collect())
    }

    /// Contributors in authorship order. Names come from the embedded user,
    /// else one lookup of the user link, else "Unknown".
    fn fetch_contributors(
        &self,
        id: &ProjectId,
        endpoint_type: EndpointType,
    ) -> Result<Vec<Contributor>, CollectorError> {
        let Some(url) = endpoint_type.facet_url(self.base_url, id, Facet::Contributors) else {
            return Ok(Vec::new());
        };
        let items = fetch_list(self.api, &format!("{url}?embed=users"))?;
        Ok(items
            .iter()
            .map(|item| {
                let user_link = related_href(item, "users");
                let name = embedded_data(item, "users")
                    .and_then(|user| attr_str(user, "full_name"))
                    .or_else(|| user_link.as_deref().and_then(|href| self.lookup_user(href)))
                    .unwrap_or_else(|| UNKNOWN_CONTRIBUTOR.to_string());
                let attrs = attributes(item).unwrap_or(&NULL);
                Contributor {
                    name,
                    permission: attr_str(item, "permission"),
                    bibliographic: flag(attrs, "bibliographic"),
                    user_id: item
                        .get("id")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    user_link,
                }
            })
            .collect())
    }

    fn lookup_user(&self, href: &str) -> Option<String> {
        match self.api.get(href) {
            Ok(document) => document.get("data").and_then(|user| attr_str(user, "full_name")),
            Err(err) => {
                debug!(href, error = %err, "contributor lookup failed");
                None
            }
        }
    }

    fn fetch_passthrough(
        &self,
        id: &ProjectId,
        endpoint_type: EndpointType,
        facet: Facet,
    ) -> Result<Value, CollectorError> {
        match endpoint_type.facet_url(self.base_url, id, facet) {
            Some(url) => self.api.get(&url),
            None => Ok(Value::Null),
        }
    }

    /// Preprints keep no activity log; their count is zero.
    fn fetch_log_count(
        &self,
        id: &ProjectId,
        endpoint_type: EndpointType,
    ) -> Result<u64, CollectorError> {
        let Some(url) = endpoint_type.facet_url(self.base_url, id, Facet::Logs) else {
            return Ok(0);
        };
        let document = self.api.get(&url)?;
        let total = document
            .get("meta")
            .and_then(|meta| meta.get("total"))
            .or_else(|| {
                document
                    .get("links")
                    .and_then(|links| links.get("meta"))
                    .and_then(|meta| meta.get("total"))
            })
            .and_then(Value::as_u64);
        Ok(total.unwrap_or_else(|| {
            document
                .get("data")
                .and_then(Value::as_array)
                .map(|data| data.len() as u64)
                .unwrap_or(0)
        }))
    }
}

fn record_failure<T: Default>(
    failures: &mut Vec<FacetFailure>,
    id: &ProjectId,
    facet: Facet,
    err: CollectorError,
) -> T {
    warn!(project = %id, %facet, error = %err, "facet unavailable");
    failures.push(FacetFailure {
        facet,
        reason: err.to_string(),
    });
    T::default()
}

fn embedded_data<'v>(item: &'v Value, name: &str) -> Option<&'v Value> {
    item.get("embeds")
        .and_then(|embeds| embeds.get(name))
        .and_then(|embed| embed.get("data"))
}

fn license_from(item: &Value) -> Option<License> {
    let attrs = attributes(item)?;
    let text = |key: &str| {
        attrs
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    Some(License {
        name: text("name"),
        text: text("text"),
        url: text("url"),
    })
}

fn subject_from(item: &Value) -> Option<Subject> {
    let text = attr_str(item, "text")?;
    let parents = attributes(item)
        .and_then(|attrs| attrs.get("parents"))
        .and_then(Value::as_array)
        .map(|parents| {
            parents
                .iter()
                .filter_map(|parent| match parent {
                    Value::String(name) => Some(name.clone()),
                    Value::Object(_) => parent
                        .get("text")
                        .and_then(Value::as_str)
                        .map(|name| name.to_string()),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();
    Some(Subject { text, parents })
}

fn flag(attrs: &Value, key: &str) -> bool {
    attrs.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|item| item.to_string())
                .collect()
        })
        .unwrap_or_default()
}
