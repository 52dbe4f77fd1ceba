// src/scraper/fetch.rs

use rand::Rng;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::HttpConfig;
use crate::scraper::ScraperError;

const MAX_BACKOFF_SECS: u64 = 10;
const JITTER_MAX_SECS: u64 = 2;

// Markers of interstitial challenge pages served instead of content.
const BLOCK_MARKERS: &[&str] = &[
    "cf-browser-verification",
    "challenge-platform",
    "<title>Just a moment...</title>",
    "Attention Required! | Cloudflare",
    "px-captcha",
    "Access Denied</title>",
];

/// A browsing session as seen by an adapter: URL in, HTML out.
pub trait PageFetcher: Send + Sync {
    /// `settle` is how long the page needs to finish rendering; only a
    /// rendering proxy can honour it.
    fn fetch_html(&self, url: &str, settle: Duration) -> Result<String, ScraperError>;
}

/// ZenRows-style rendering API: `GET {endpoint}?url=...&apikey=...`.
#[derive(Debug, Clone)]
struct RenderProxy {
    endpoint: String,
    api_key: String,
}

/// Blocking HTTP session with bounded timeouts and retries.
pub struct HttpFetcher {
    client: Client,
    max_attempts: u32,
    proxy: Option<RenderProxy>,
}

impl HttpFetcher {
    pub fn new(http: &HttpConfig) -> Result<Self, ScraperError> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://www.google.com/"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("pt-BR,pt;q=0.9,en;q=0.8"));

        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .default_headers(headers)
            .timeout(Duration::from_secs(http.timeout_secs))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .build()
            .map_err(|e| ScraperError::Network(e.to_string()))?;

        let api_key = http
            .resolve_proxy_key()
            .map_err(|e| ScraperError::Config(e.to_string()))?;
        let proxy = match (http.render_proxy_url.as_ref(), api_key) {
            (Some(endpoint), Some(api_key)) => Some(RenderProxy {
                endpoint: endpoint.clone(),
                api_key,
            }),
            (Some(_), None) => {
                return Err(ScraperError::Config(
                    "render_proxy_url is set but render_proxy_key is missing".into(),
                ))
            }
            _ => None,
        };

        Ok(Self {
            client,
            max_attempts: http.max_attempts.max(1),
            proxy,
        })
    }

    fn try_fetch_html(&self, url: &str, settle: Duration) -> Result<String, ScraperError> {
        let request = match &self.proxy {
            Some(proxy) => {
                let mut params = vec![
                    ("url", url.to_string()),
                    ("apikey", proxy.api_key.clone()),
                    ("original_status", "true".to_string()),
                ];
                if !settle.is_zero() {
                    params.push(("js_render", "true".to_string()));
                    params.push(("wait", settle.as_millis().to_string()));
                }
                self.client.get(&proxy.endpoint).query(&params)
            }
            None => self.client.get(url),
        };

        let resp = request.send()?;
        let status = resp.status().as_u16();
        let text = resp.text()?;

        if let Some(reason) = detect_block(status, &text) {
            return Err(ScraperError::Blocked(format!("{url}: {reason}")));
        }
        if !(200..300).contains(&status) {
            return Err(ScraperError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        Ok(text)
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_html(&self, url: &str, settle: Duration) -> Result<String, ScraperError> {
        let mut attempt = 1;
        loop {
            let start = Instant::now();
            match self.try_fetch_html(url, settle) {
                Ok(html) => {
                    debug!(url, attempt, elapsed = ?start.elapsed(), bytes = html.len(), "Fetched page");
                    return Ok(html);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!(url, attempt, elapsed = ?start.elapsed(), error = %e, "Fetch failed, retrying");
                    std::thread::sleep(backoff(attempt));
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn backoff(attempt: u32) -> Duration {
    let base = std::cmp::min(2 * u64::from(attempt), MAX_BACKOFF_SECS);
    let jitter = rand::thread_rng().gen_range(0..=JITTER_MAX_SECS);
    Duration::from_secs(base + jitter)
}

/// Classify anti-bot responses: rate limits, forbidden, and challenge pages
/// served with a 200.
pub fn detect_block(status: u16, body: &str) -> Option<String> {
    match status {
        403 => return Some("HTTP 403".to_string()),
        429 => return Some("HTTP 429 (rate limited)".to_string()),
        _ => {}
    }
    BLOCK_MARKERS
        .iter()
        .find(|marker| body.contains(*marker))
        .map(|marker| format!("challenge page ({marker})"))
}
