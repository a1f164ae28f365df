//! Paginating API client.
//!
//! Drives the request/response loop for one logical fetch: consults the
//! response cache, gates on the quota limiter, issues page requests,
//! classifies outcomes, follows `Link: rel="next"` hints, and writes the
//! merged result back to the cache. Aborts surface a typed error alongside
//! whatever was accumulated; partial data is never dropped silently.

use crate::config::{GitHubConfig, StorageConfig};
use crate::network::limiter::QuotaLimiter;
use crate::network::outcome::{classify, Outcome};
use crate::network::retry::RetryPolicy;
use crate::network::transport::{RawResponse, Transport};
use crate::store::ResponseCache;
use crate::{ReconError, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Options for one logical fetch.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Cap on the number of pages walked. `None` walks until the server
    /// stops advertising a next page.
    pub max_pages: Option<u32>,
    /// Items requested per page.
    pub per_page: u32,
    /// Per-request deadline handed to the transport.
    pub timeout: Duration,
    /// Freshness window for the cache lookup.
    pub cache_ttl_hours: u64,
    /// Backoff policy for transient transport failures.
    pub retry: RetryPolicy,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_pages: None,
            per_page: GitHubConfig::PER_PAGE,
            timeout: GitHubConfig::REQUEST_TIMEOUT,
            cache_ttl_hours: StorageConfig::CACHE_TTL_HOURS,
            retry: RetryPolicy::default(),
        }
    }
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = Some(max_pages);
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_cache_ttl_hours(mut self, hours: u64) -> Self {
        self.cache_ttl_hours = hours;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Result of one logical fetch: the accumulated raw items, plus the error
/// that stopped the page loop early, if any.
#[derive(Debug)]
pub struct Fetched {
    pub items: Vec<Value>,
    /// Why the loop stopped early. `None` means the fetch ran to completion.
    pub error: Option<ReconError>,
    /// Whether the items came straight from the cache.
    pub from_cache: bool,
}

impl Fetched {
    fn cached(items: Vec<Value>) -> Self {
        Self {
            items,
            error: None,
            from_cache: true,
        }
    }

    fn complete(items: Vec<Value>) -> Self {
        Self {
            items,
            error: None,
            from_cache: false,
        }
    }

    fn aborted(items: Vec<Value>, error: ReconError) -> Self {
        Self {
            items,
            error: Some(error),
            from_cache: false,
        }
    }

    /// True when the loop stopped before exhausting the result set.
    pub fn is_partial(&self) -> bool {
        self.error.is_some()
    }
}

/// Parse a `Link` header into `rel -> url` pairs.
fn parse_link_header(value: &str) -> HashMap<String, String> {
    let mut links = HashMap::new();
    for part in value.split(',') {
        let mut segments = part.splitn(2, ';');
        let (Some(url), Some(rel)) = (segments.next(), segments.next()) else {
            continue;
        };
        let url = url.trim().trim_start_matches('<').trim_end_matches('>');
        let Some(rel) = rel.trim().strip_prefix("rel=") else {
            continue;
        };
        links.insert(rel.trim_matches('"').to_string(), url.to_string());
    }
    links
}

/// Whether the response advertises another page.
fn has_next_page(response: &RawResponse) -> bool {
    response
        .header("link")
        .map(|value| parse_link_header(value).contains_key("next"))
        .unwrap_or(false)
}

/// Rate-limited, cached, paginating GitHub API client.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    cache: Arc<ResponseCache>,
    limiter: Mutex<QuotaLimiter>,
    base_url: String,
    headers: Vec<(String, String)>,
}

impl ApiClient {
    /// Create a client over the given transport and cache.
    ///
    /// The token, when present, is sent as `Authorization: token …`; its
    /// storage is the host application's concern.
    pub fn new(
        transport: Arc<dyn Transport>,
        cache: Arc<ResponseCache>,
        token: Option<String>,
    ) -> Self {
        let mut headers = vec![
            (
                "Accept".to_string(),
                GitHubConfig::ACCEPT_HEADER.to_string(),
            ),
            (
                "User-Agent".to_string(),
                GitHubConfig::USER_AGENT.to_string(),
            ),
        ];
        if let Some(token) = token {
            headers.push(("Authorization".to_string(), format!("token {}", token)));
        }

        Self {
            transport,
            cache,
            limiter: Mutex::new(QuotaLimiter::new()),
            base_url: GitHubConfig::API_BASE.to_string(),
            headers,
        }
    }

    /// Override the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Fetch all pages for `endpoint` + `params`.
    ///
    /// A fresh cache hit returns immediately with no limiter or network
    /// interaction. Otherwise the page loop runs per the protocol described
    /// in the module docs, and a completed fetch with at least one item is
    /// written back to the cache under the original request signature;
    /// individual pages are never cached.
    pub async fn fetch(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        options: &FetchOptions,
    ) -> Result<Fetched> {
        if let Some(cached) = self.cache.get(endpoint, params, options.cache_ttl_hours)? {
            let items = cached
                .as_array()
                .cloned()
                .ok_or_else(|| ReconError::Corrupt {
                    what: format!("cache record for {}", endpoint),
                    detail: "cached payload is not an item array".to_string(),
                })?;
            debug!(endpoint, count = items.len(), "Using cached response");
            return Ok(Fetched::cached(items));
        }

        let url = format!("{}{}", self.base_url, endpoint);
        let mut items: Vec<Value> = Vec::new();
        let mut page: u32 = 1;
        let mut rate_limit_retried = false;

        loop {
            self.limiter.lock().await.wait_if_needed().await;

            let mut page_params = params.to_vec();
            page_params.push(("page".to_string(), page.to_string()));
            page_params.push(("per_page".to_string(), options.per_page.to_string()));

            let response = match self.issue_page(&url, &page_params, options).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(endpoint, page, error = %e, "Transport failure, aborting fetch");
                    return Ok(Fetched::aborted(items, e));
                }
            };

            let outcome = {
                let mut limiter = self.limiter.lock().await;
                classify(&mut limiter, &response)
            };

            match outcome {
                Err(e) => {
                    warn!(endpoint, page, error = %e, "Unreadable response, aborting fetch");
                    return Ok(Fetched::aborted(items, e));
                }
                Ok(Outcome::Empty) => {
                    debug!(endpoint, page, "No more data");
                    break;
                }
                Ok(Outcome::RateLimited) => {
                    if rate_limit_retried {
                        warn!(endpoint, page, "Rate limited twice, degrading to partial result");
                        return Ok(Fetched::aborted(
                            items,
                            ReconError::RateLimited {
                                endpoint: endpoint.to_string(),
                            },
                        ));
                    }
                    warn!(
                        endpoint,
                        page,
                        cooldown_secs = GitHubConfig::RATE_LIMIT_COOLDOWN.as_secs(),
                        "Rate limited, cooling down before retrying page"
                    );
                    tokio::time::sleep(GitHubConfig::RATE_LIMIT_COOLDOWN).await;
                    rate_limit_retried = true;
                }
                Ok(Outcome::Fatal {
                    message,
                    status,
                    payload,
                }) => {
                    warn!(endpoint, page, status, "Fatal API error: {}", message);
                    return Ok(Fetched::aborted(
                        items,
                        ReconError::Api {
                            message,
                            status_code: status,
                            payload,
                        },
                    ));
                }
                Ok(Outcome::Success(value)) => {
                    rate_limit_retried = false;
                    let before = items.len();
                    match value {
                        Value::Array(list) => items.extend(list),
                        single => items.push(single),
                    }
                    if items.len() == before {
                        debug!(endpoint, page, "Empty page, stopping");
                        break;
                    }

                    let more = has_next_page(&response);
                    let under_cap = options.max_pages.map_or(true, |cap| page < cap);
                    if more && under_cap {
                        page += 1;
                    } else {
                        break;
                    }
                }
            }
        }

        if !items.is_empty() {
            self.cache
                .put(endpoint, params, &Value::Array(items.clone()))?;
        }

        debug!(endpoint, pages = page, count = items.len(), "Fetch complete");
        Ok(Fetched::complete(items))
    }

    /// Issue one page request, retrying transient transport failures per
    /// the options' retry policy.
    async fn issue_page(
        &self,
        url: &str,
        params: &[(String, String)],
        options: &FetchOptions,
    ) -> Result<RawResponse> {
        let retry = &options.retry;
        let max_attempts = retry.max_attempts.max(1);

        for attempt in 0..max_attempts {
            match self
                .transport
                .get(url, &self.headers, params, options.timeout)
                .await
            {
                Ok(response) => {
                    if attempt > 0 {
                        debug!(url, attempts = attempt + 1, "Request succeeded after retry");
                    }
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = retry.delay_for(attempt);
                    warn!(
                        url,
                        attempt = attempt + 1,
                        max_attempts,
                        error = %e,
                        "Transport error, retrying in {:?}",
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        unreachable!("retry loop should have returned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tempfile::TempDir;

    /// Scripted transport: pops one canned reply per call.
    struct MockTransport {
        replies: StdMutex<Vec<Result<RawResponse>>>,
        calls: AtomicUsize,
        seen_pages: StdMutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(replies: Vec<Result<RawResponse>>) -> Self {
            let mut replies = replies;
            replies.reverse();
            Self {
                replies: StdMutex::new(replies),
                calls: AtomicUsize::new(0),
                seen_pages: StdMutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn seen_pages(&self) -> Vec<String> {
            self.seen_pages.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn get(
            &self,
            _url: &str,
            _headers: &[(String, String)],
            params: &[(String, String)],
            _timeout: Duration,
        ) -> Result<RawResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some((_, page)) = params.iter().find(|(k, _)| k == "page") {
                self.seen_pages.lock().unwrap().push(page.clone());
            }
            self.replies
                .lock()
                .unwrap()
                .pop()
                .expect("mock transport ran out of replies")
        }
    }

    fn page_response(items: Vec<Value>, has_next: bool) -> RawResponse {
        let mut headers = vec![(
            "X-RateLimit-Remaining".to_string(),
            "4999".to_string(),
        )];
        if has_next {
            headers.push((
                "Link".to_string(),
                "<https://api.github.com/x?page=2>; rel=\"next\", \
                 <https://api.github.com/x?page=9>; rel=\"last\""
                    .to_string(),
            ));
        }
        RawResponse::new(200, headers, Value::Array(items).to_string())
    }

    fn client_with(
        replies: Vec<Result<RawResponse>>,
    ) -> (TempDir, Arc<MockTransport>, Arc<ResponseCache>, ApiClient) {
        let temp_dir = TempDir::new().unwrap();
        let cache = Arc::new(ResponseCache::open(temp_dir.path().join("cache.sqlite")).unwrap());
        let transport = Arc::new(MockTransport::new(replies));
        let client = ApiClient::new(transport.clone(), cache.clone(), None);
        (temp_dir, transport, cache, client)
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_link_header() {
        let links = parse_link_header(
            "<https://api.github.com/r?page=2>; rel=\"next\", \
             <https://api.github.com/r?page=5>; rel=\"last\"",
        );
        assert_eq!(links["next"], "https://api.github.com/r?page=2");
        assert_eq!(links["last"], "https://api.github.com/r?page=5");
        assert!(!links.contains_key("prev"));

        assert!(parse_link_header("").is_empty());
        assert!(parse_link_header("garbage").is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_pagination_stops_when_next_hint_absent() {
        // Three pages; the third omits rel="next". Exactly three requests.
        let (_tmp, transport, _cache, client) = client_with(vec![
            Ok(page_response(vec![json!({"id": 1})], true)),
            Ok(page_response(vec![json!({"id": 2})], true)),
            Ok(page_response(vec![json!({"id": 3})], false)),
        ]);

        let fetched = client
            .fetch("/orgs/acme/repos", &[], &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(transport.calls(), 3);
        assert_eq!(fetched.items.len(), 3);
        assert!(fetched.error.is_none());
        assert_eq!(transport.seen_pages(), vec!["1", "2", "3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_max_pages_caps_requests() {
        // Every page advertises a next page; the cap must stop the walk.
        let (_tmp, transport, _cache, client) = client_with(vec![
            Ok(page_response(vec![json!({"id": 1})], true)),
            Ok(page_response(vec![json!({"id": 2})], true)),
            Ok(page_response(vec![json!({"id": 3})], true)),
        ]);

        let options = FetchOptions::default().with_max_pages(2);
        let fetched = client.fetch("/orgs/acme/repos", &[], &options).await.unwrap();

        assert_eq!(transport.calls(), 2);
        assert_eq!(fetched.items.len(), 2);
        assert!(fetched.error.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_fetch_caches_merged_result_second_skips_network() {
        // Scenario A: one network walk, then a pure cache read.
        let (_tmp, transport, _cache, client) = client_with(vec![
            Ok(page_response(vec![json!({"id": 1})], true)),
            Ok(page_response(vec![json!({"id": 2})], false)),
        ]);
        let search = params(&[("q", "test")]);

        let first = client
            .fetch("/search", &search, &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        assert!(!first.from_cache);
        assert_eq!(transport.calls(), 2);

        let second = client
            .fetch("/search", &search, &FetchOptions::default())
            .await
            .unwrap();
        assert_eq!(second.items.len(), 2);
        assert!(second.from_cache);
        assert_eq!(second.items, first.items);
        // No further network activity.
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_404_yields_empty_and_is_not_cached() {
        // Scenario B.
        let (_tmp, transport, cache, client) = client_with(vec![Ok(RawResponse::new(
            404,
            vec![],
            r#"{"message": "Not Found"}"#,
        ))]);
        let search = params(&[("q", "ghost")]);

        let fetched = client
            .fetch("/search", &search, &FetchOptions::default())
            .await
            .unwrap();

        assert!(fetched.items.is_empty());
        assert!(fetched.error.is_none());
        assert_eq!(transport.calls(), 1);
        assert!(cache.get("/search", &search, 24).unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_rate_limit_degrades_to_partial_result() {
        // Scenario C: page 1 succeeds, page 2 is rate limited twice.
        let (_tmp, transport, _cache, client) = client_with(vec![
            Ok(page_response(vec![json!({"id": 1})], true)),
            Ok(RawResponse::new(403, vec![], "")),
            Ok(RawResponse::new(403, vec![], "")),
        ]);

        let fetched = client
            .fetch("/orgs/acme/repos", &[], &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(fetched.items.len(), 1);
        assert!(matches!(
            fetched.error,
            Some(ReconError::RateLimited { .. })
        ));
        assert_eq!(transport.calls(), 3);
        // Both rate-limited attempts targeted the same page.
        assert_eq!(transport.seen_pages(), vec!["1", "2", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_retry_can_recover() {
        // A single 403 followed by success continues the walk.
        let (_tmp, transport, _cache, client) = client_with(vec![
            Ok(RawResponse::new(403, vec![], "")),
            Ok(page_response(vec![json!({"id": 1})], false)),
        ]);

        let fetched = client
            .fetch("/orgs/acme/repos", &[], &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(fetched.items.len(), 1);
        assert!(fetched.error.is_none());
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_aborts_with_partial_items() {
        let (_tmp, _transport, _cache, client) = client_with(vec![
            Ok(page_response(vec![json!({"id": 1})], true)),
            Ok(RawResponse::new(
                500,
                vec![],
                r#"{"message": "Server Error"}"#,
            )),
        ]);

        let fetched = client
            .fetch("/orgs/acme/repos", &[], &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(fetched.items.len(), 1);
        match fetched.error {
            Some(ReconError::Api {
                status_code,
                ref message,
                ..
            }) => {
                assert_eq!(status_code, 500);
                assert_eq!(message, "Server Error");
            }
            ref other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_retried_then_aborts() {
        let network_err = || {
            Err(ReconError::Network {
                message: "connection refused".into(),
                cause: None,
            })
        };
        let (_tmp, transport, _cache, client) =
            client_with(vec![network_err(), network_err(), network_err()]);

        let options = FetchOptions::default().with_retry(
            RetryPolicy::new()
                .with_max_attempts(3)
                .with_base_delay(Duration::from_millis(10))
                .with_jitter(false),
        );
        let fetched = client.fetch("/orgs/acme/repos", &[], &options).await.unwrap();

        assert!(fetched.items.is_empty());
        assert!(matches!(fetched.error, Some(ReconError::Network { .. })));
        assert_eq!(transport.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_object_body_counts_as_one_item() {
        let (_tmp, _transport, _cache, client) = client_with(vec![Ok(RawResponse::new(
            200,
            vec![],
            r#"{"name": "widget", "owner": {"login": "acme"}}"#,
        ))]);

        let fetched = client
            .fetch("/repos/acme/widget", &[], &FetchOptions::default())
            .await
            .unwrap();

        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.items[0]["name"], "widget");
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_success_page_stops_loop() {
        let (_tmp, transport, cache, client) = client_with(vec![Ok(page_response(vec![], true))]);

        let fetched = client
            .fetch("/orgs/acme/repos", &[], &FetchOptions::default())
            .await
            .unwrap();

        assert!(fetched.items.is_empty());
        assert!(fetched.error.is_none());
        assert_eq!(transport.calls(), 1);
        // Nothing accumulated, nothing cached.
        assert!(cache.get("/orgs/acme/repos", &[], 24).unwrap().is_none());
    }
}
