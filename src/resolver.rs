use serde_json::Value;
use tracing::debug;

use crate::domain::{EndpointType, ProjectId};
use crate::error::CollectorError;
use crate::osf::OsfApi;

/// The shape a project id answered to, with the basic-attributes document
/// that answered.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub endpoint_type: EndpointType,
    pub document: Value,
}

/// Tries node, registration, then preprint, and stops at the first shape
/// that answers with a document of the matching type.
pub fn resolve_endpoint<A: OsfApi + ?Sized>(
    api: &A,
    base_url: &str,
    id: &ProjectId,
) -> Result<Resolution, CollectorError> {
    let mut attempts = Vec::new();
    for endpoint_type in EndpointType::PRIORITY {
        let url = endpoint_type.resource_url(base_url, id);
        let reason = match api.get(&url) {
            Ok(document) => match check_document(&document, endpoint_type) {
                Ok(()) => {
                    debug!(project = %id, %endpoint_type, "resolved");
                    return Ok(Resolution {
                        endpoint_type,
                        document,
                    });
                }
                Err(reason) => reason,
            },
            Err(err) => err.to_string(),
        };
        debug!(project = %id, %endpoint_type, %reason, "shape rejected");
        attempts.push(format!("{endpoint_type}: {reason}"));
    }
    Err(CollectorError::Unresolved {
        project_id: id.to_string(),
        attempts,
    })
}

fn check_document(document: &Value, endpoint_type: EndpointType) -> Result<(), String> {
    let data = document
        .get("data")
        .filter(|data| data.is_object())
        .ok_or_else(|| "response has no data object".to_string())?;
    match data.get("type").and_then(Value::as_str) {
        Some(kind) if kind != endpoint_type.collection() => {
            Err(format!("type mismatch, got {kind}"))
        }
        _ => Ok(()),
    }
}
