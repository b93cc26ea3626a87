//! Live web search used to ground each turn.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::{Config, SearchConfig, MAX_SEARCH_RESULTS};

const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

static RESULT_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".result"));
static TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".result__a"));
static SNIPPET_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".result__snippet"));
static URL_SELECTOR: Lazy<Selector> = Lazy::new(|| selector(".result__url"));

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static CSS selector is valid")
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("search provider returned status {0}")]
    Status(u16),

    #[error("search endpoint is invalid: {0}")]
    Endpoint(#[from] url::ParseError),
}

/// One result as returned by the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub body: String,
}

/// Text search provider
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Up to `limit` hits, most relevant first, in provider order.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// DuckDuckGo HTML endpoint; needs no API key
#[derive(Clone)]
pub struct DuckDuckGo {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGo {
    pub fn new(endpoint: impl Into<String>, timeout: Option<Duration>) -> Result<Self, SearchError> {
        let mut builder = reqwest::Client::builder().user_agent(USER_AGENT);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SearchError> {
        Self::new(
            config.search.endpoint.clone(),
            config.request_timeout_secs.map(Duration::from_secs),
        )
    }
}

#[async_trait]
impl WebSearch for DuckDuckGo {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let url = url::Url::parse_with_params(&self.endpoint, &[("q", query)])?;

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(SearchError::Status(response.status().as_u16()));
        }

        let html = response.text().await?;
        Ok(parse_results(&html, limit))
    }
}

/// Extract result blocks from a DuckDuckGo HTML page. Blocks without a
/// snippet carry no usable context and are skipped.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);

    document
        .select(&RESULT_SELECTOR)
        .filter_map(|element| {
            let body = first_text(&element, &SNIPPET_SELECTOR);
            if body.is_empty() {
                return None;
            }

            Some(SearchHit {
                title: first_text(&element, &TITLE_SELECTOR),
                url: first_text(&element, &URL_SELECTOR),
                body,
            })
        })
        .take(limit)
        .collect()
}

fn first_text(element: &ElementRef, selector: &Selector) -> String {
    element
        .select(selector)
        .next()
        .map(|e| {
            let raw: String = e.text().collect();
            raw.split_whitespace().collect::<Vec<_>>().join(" ")
        })
        .unwrap_or_default()
}

/// Turns a query into a context string for the prompt. Never fails.
pub struct WebContextFetcher<S> {
    search: S,
    limit: usize,
    fallback: String,
}

/// Context handed to the prompt assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebContext {
    pub text: String,
    pub snippets: usize,
    pub fallback: bool,
}

impl<S: WebSearch> WebContextFetcher<S> {
    pub fn new(search: S, config: &SearchConfig) -> Self {
        Self {
            search,
            limit: config.effective_limit(),
            fallback: config.fallback.clone(),
        }
    }

    /// Newline-joined snippet bodies, or the fallback text on error or no results.
    pub async fn fetch_context(&self, query: &str) -> WebContext {
        match self.search.search(query, self.limit).await {
            Ok(hits) if !hits.is_empty() => {
                let bodies: Vec<&str> = hits
                    .iter()
                    .take(self.limit.min(MAX_SEARCH_RESULTS))
                    .inspect(|hit| debug!(title = %hit.title, url = %hit.url, "search hit"))
                    .map(|hit| hit.body.as_str())
                    .collect();
                info!(snippets = bodies.len(), "web context fetched");
                WebContext {
                    text: bodies.join("\n"),
                    snippets: bodies.len(),
                    fallback: false,
                }
            }
            Ok(_) => {
                info!("web search returned no results");
                self.fallback()
            }
            Err(e) => {
                warn!(error = %e, "web search failed; using fallback context");
                self.fallback()
            }
        }
    }

    fn fallback(&self) -> WebContext {
        WebContext {
            text: self.fallback.clone(),
            snippets: 0,
            fallback: true,
        }
    }
}
