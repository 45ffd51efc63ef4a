use std::collections::HashSet;
use std::sync::Arc;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::{ResolvedConfig, RetryPolicy};
use crate::error::CollectorError;
use crate::ratelimit::{Clock, RateLimiter, SystemClock};

const JSON_API: &str = "application/vnd.api+json";

/// Read-only access to the OSF v2 API. Every call is one logical GET;
/// implementations own retry and rate limiting.
pub trait OsfApi: Send + Sync {
    fn get(&self, url: &str) -> Result<Value, CollectorError>;
}

impl<A: OsfApi + ?Sized> OsfApi for Arc<A> {
    fn get(&self, url: &str) -> Result<Value, CollectorError> {
        (**self).get(url)
    }
}

pub struct OsfHttpClient<C: Clock = SystemClock> {
    client: Client,
    limiter: RateLimiter<C>,
    retry: RetryPolicy,
}

impl OsfHttpClient<SystemClock> {
    pub fn new(config: &ResolvedConfig) -> Result<Self, CollectorError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> OsfHttpClient<C> {
    pub fn with_clock(config: &ResolvedConfig, clock: C) -> Result<Self, CollectorError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("osh-collector/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| CollectorError::OsfRequest(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static(JSON_API));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|err| CollectorError::OsfRequest(err.to_string()))?;

        Ok(Self {
            client,
            limiter: RateLimiter::with_clock(config.request_interval, clock),
            retry: config.retry,
        })
    }

    fn send_once(&self, url: &str) -> Result<Value, CollectorError> {
        self.limiter.wait();
        debug!(url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| classify_transport(&err))?;
        let response = Self::handle_status(response)?;
        let body = response.bytes().map_err(|err| classify_transport(&err))?;
        serde_json::from_slice(&body).map_err(|err| CollectorError::OsfDecode(err.to_string()))
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, CollectorError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .map(|body| error_detail(&body))
            .unwrap_or_else(|_| "OSF request failed".to_string());
        Err(CollectorError::OsfStatus { status, message })
    }
}

impl<C: Clock> OsfApi for OsfHttpClient<C> {
    fn get(&self, url: &str) -> Result<Value, CollectorError> {
        with_retries(&self.retry, self.limiter.clock(), url, || self.send_once(url))
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or the
/// policy's retry budget is spent.
pub fn with_retries<T, C, F>(
    policy: &RetryPolicy,
    clock: &C,
    url: &str,
    mut op: F,
) -> Result<T, CollectorError>
where
    C: Clock + ?Sized,
    F: FnMut() -> Result<T, CollectorError>,
{
    let mut attempt = 0usize;
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && err.is_transient() => {
                let delay = policy.delay(attempt);
                warn!(
                    url,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient OSF error, retrying"
                );
                clock.sleep(delay);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Every item gathered from a paged listing, plus the error that cut the
/// walk short, if any. Items from pages before the failure are kept.
#[derive(Debug, Default)]
pub struct PagedList {
    pub items: Vec<Value>,
    pub error: Option<CollectorError>,
}

impl PagedList {
    pub fn into_result(self) -> Result<Vec<Value>, CollectorError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.items),
        }
    }
}

/// Collects `data` across every page of a JSON:API list, following
/// `links.next` until it is null or repeats.
pub fn fetch_pages<A: OsfApi + ?Sized>(api: &A, url: &str) -> PagedList {
    let mut list = PagedList::default();
    let mut visited = HashSet::new();
    let mut next = Some(url.to_string());
    while let Some(page_url) = next.take() {
        if !visited.insert(page_url.clone()) {
            break;
        }
        let page = match api.get(&page_url) {
            Ok(page) => page,
            Err(err) => {
                list.error = Some(err);
                break;
            }
        };
        if let Some(data) = page.get("data").and_then(Value::as_array) {
            list.items.extend(data.iter().cloned());
        }
        next = page
            .get("links")
            .and_then(|links| links.get("next"))
            .and_then(link_href);
    }
    list
}

/// [`fetch_pages`] for callers that need the whole list or nothing.
pub fn fetch_list<A: OsfApi + ?Sized>(api: &A, url: &str) -> Result<Vec<Value>, CollectorError> {
    fetch_pages(api, url).into_result()
}

/// `relationships.<name>.links.related`, which OSF serves either as a bare
/// string or as `{ "href": ... }`.
pub fn related_href(item: &Value, relationship: &str) -> Option<String> {
    item.get("relationships")
        .and_then(|rels| rels.get(relationship))
        .and_then(|rel| rel.get("links"))
        .and_then(|links| links.get("related"))
        .and_then(link_href)
}

fn link_href(link: &Value) -> Option<String> {
    let href = match link {
        Value::String(href) => Some(href.as_str()),
        Value::Object(map) => map.get("href").and_then(Value::as_str),
        _ => None,
    }?;
    (!href.is_empty()).then(|| href.to_string())
}

pub fn attributes(item: &Value) -> Option<&Value> {
    item.get("attributes").filter(|attrs| attrs.is_object())
}

pub fn attr_str(item: &Value, key: &str) -> Option<String> {
    attributes(item)
        .and_then(|attrs| attrs.get(key))
        .and_then(Value::as_str)
        .map(|value| value.to_string())
}

fn classify_transport(err: &reqwest::Error) -> CollectorError {
    if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
        CollectorError::OsfHttp(err.to_string())
    } else {
        CollectorError::OsfRequest(err.to_string())
    }
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|doc| {
            doc.get("errors")
                .and_then(Value::as_array)
                .and_then(|errors| errors.first())
                .and_then(|first| first.get("detail"))
                .and_then(Value::as_str)
                .map(|detail| detail.to_string())
        })
        .unwrap_or_else(|| body.chars().take(200).collect())
}
