#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use osh_collector::config::RetryPolicy;
use osh_collector::error::CollectorError;
use osh_collector::osf::{OsfApi, with_retries};
use osh_collector::ratelimit::{Clock, ManualClock, RateLimiter};

pub const BASE: &str = "https://api.test/v2";
pub const INTERVAL: Duration = Duration::from_secs(2);

enum Canned {
    Json(Value),
    Status(u16),
}

/// Canned OSF API. Unknown urls answer 404. Requests go through the same
/// retry helper and a rate limiter on a manual clock, so tests can count
/// attempts and check spacing without sleeping.
pub struct MockOsf {
    responses: HashMap<String, Canned>,
    calls: Mutex<Vec<(String, Instant)>>,
    clock: Arc<ManualClock>,
    limiter: RateLimiter<Arc<ManualClock>>,
    retry: RetryPolicy,
}

impl MockOsf {
    pub fn new() -> Self {
        let clock = Arc::new(ManualClock::new());
        Self {
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
            limiter: RateLimiter::with_clock(INTERVAL, clock.clone()),
            clock,
            retry: RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(100),
            },
        }
    }

    pub fn json(mut self, url: impl Into<String>, value: Value) -> Self {
        self.responses.insert(url.into(), Canned::Json(value));
        self
    }

    pub fn status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.responses.insert(url.into(), Canned::Status(status));
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().iter().map(|(_, at)| *at).collect()
    }

    pub fn count(&self, url: &str) -> usize {
        self.calls().iter().filter(|call| call.as_str() == url).count()
    }

    fn get_once(&self, url: &str) -> Result<Value, CollectorError> {
        self.limiter.wait();
        self.calls
            .lock()
            .unwrap()
            .push((url.to_string(), self.clock.now()));
        match self.responses.get(url) {
            Some(Canned::Json(value)) => Ok(value.clone()),
            Some(Canned::Status(status)) => Err(CollectorError::OsfStatus {
                status: *status,
                message: "mock failure".to_string(),
            }),
            None => Err(CollectorError::OsfStatus {
                status: 404,
                message: "Not found.".to_string(),
            }),
        }
    }
}

impl OsfApi for MockOsf {
    fn get(&self, url: &str) -> Result<Value, CollectorError> {
        with_retries(&self.retry, &self.clock, url, || self.get_once(url))
    }
}

pub fn url(collection: &str, id: &str, rest: &str) -> String {
    format!("{BASE}/{collection}/{id}/{rest}")
}

pub fn list(items: Vec<Value>) -> Value {
    json!({ "data": items, "links": { "next": null } })
}

pub fn project_doc(collection: &str, id: &str, title: &str) -> Value {
    json!({
        "data": {
            "id": id,
            "type": collection,
            "attributes": {
                "title": title,
                "description": format!("{title} description"),
                "date_created": "2021-03-04T10:00:00.000000",
                "date_modified": "2023-07-01T08:30:00.000000",
                "public": true,
                "category": "project",
                "tags": ["open hardware", "microscopy"],
                "fork": false,
                "registration": collection == "registrations",
                "preprint": collection == "preprints"
            },
            "embeds": {
                "license": {
                    "data": {
                        "id": "lic1",
                        "attributes": {
                            "name": "CERN Open Hardware Licence Version 2 - Strongly Reciprocal",
                            "text": "...",
                            "url": "https://ohwr.org/cern_ohl_s_v2.txt"
                        }
                    }
                }
            }
        }
    })
}

pub fn contributor(id: &str, name: &str, permission: &str) -> Value {
    json!({
        "id": id,
        "attributes": { "permission": permission, "bibliographic": true },
        "embeds": { "users": { "data": { "attributes": { "full_name": name } } } },
        "relationships": {
            "users": { "links": { "related": { "href": format!("{BASE}/users/{id}/") } } }
        }
    })
}

pub fn file(name: &str, path: &str, downloads: u64) -> Value {
    json!({
        "attributes": {
            "name": name,
            "kind": "file",
            "materialized_path": path,
            "size": 1024,
            "date_created": "2021-03-04T10:00:00.000000",
            "date_modified": "2021-03-05T10:00:00.000000",
            "extra": { "downloads": downloads }
        }
    })
}

pub fn folder(name: &str, path: &str, href: &str) -> Value {
    json!({
        "attributes": {
            "name": name,
            "kind": "folder",
            "materialized_path": path,
            "size": null
        },
        "relationships": {
            "files": { "links": { "related": { "href": href } } }
        }
    })
}

pub fn provider(name: &str, href: &str) -> Value {
    json!({
        "attributes": { "name": name, "kind": "folder" },
        "relationships": {
            "files": { "links": { "related": { "href": href } } }
        }
    })
}

/// Registers every facet of a project except its file tree.
pub fn with_facets(mock: MockOsf, collection: &str, id: &str, title: &str) -> MockOsf {
    let mock = mock
        .json(url(collection, id, ""), project_doc(collection, id, title))
        .json(
            url(collection, id, "subjects/"),
            list(vec![json!({
                "attributes": { "text": "Engineering", "parents": ["Physical Sciences"] }
            })]),
        )
        .json(
            url(collection, id, "contributors/?embed=users"),
            list(vec![
                contributor(&format!("{id}-u1"), "Ada Lovelace", "admin"),
                contributor(&format!("{id}-u2"), "Grace Hopper", "write"),
            ]),
        )
        .json(
            url(collection, id, "analytics/"),
            json!({ "data": { "views": 12 } }),
        )
        .json(
            url(collection, id, "citation/"),
            json!({ "data": { "attributes": { "title": title } } }),
        );
    if collection == "preprints" {
        return mock;
    }
    mock.json(
        url(collection, id, "logs/"),
        json!({ "data": [], "meta": { "total": 17 } }),
    )
}

/// A node with one provider holding `bom.csv` (4 downloads) and a `cad/`
/// folder with `case.step` (6 downloads).
pub fn with_simple_tree(mock: MockOsf, id: &str) -> MockOsf {
    let root = url("nodes", id, "files/osfstorage/");
    let cad = format!("{root}cad/");
    mock.json(
        url("nodes", id, "files/"),
        list(vec![provider("osfstorage", &root)]),
    )
    .json(
        root,
        list(vec![
            file("bom.csv", "/bom.csv", 4),
            folder("cad", "/cad/", &cad),
        ]),
    )
    .json(cad, list(vec![file("case.step", "/cad/case.step", 6)]))
}

pub fn assert_spaced(times: &[Instant]) {
    for pair in times.windows(2) {
        assert!(pair[1].duration_since(pair[0]) >= INTERVAL);
    }
}
