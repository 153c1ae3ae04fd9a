//! Web tools - search and fetch

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;
use crate::Result;
use crate::error::Error;
use super::{required_str, Tool};

const SEARCH_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (compatible; agency/0.1)";
const DEFAULT_MAX_LENGTH: usize = 10_000;
const DEFAULT_MAX_RESULTS: usize = 10;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static RE: OnceLock<Regex> = OnceLock::new();
            RE.get_or_init(|| Regex::new($pattern).expect("valid regex"))
        }
    };
}

static_regex!(result_link, r#"(?s)<a[^>]*class="result__a"[^>]*>.*?</a>"#);
static_regex!(href_attr, r#"href="([^"]*)""#);
static_regex!(result_snippet, r#"(?s)class="result__snippet"[^>]*>(.*?)</(?:a|td|div)>"#);
static_regex!(script_or_style, r"(?is)<script[^>]*>.*?</script>|<style[^>]*>.*?</style>");
static_regex!(html_tag, r"(?s)<[^>]*>");

fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

/// Keep at most `max_len` characters.
fn truncate(text: String, max_len: usize) -> String {
    let total = text.chars().count();
    if total <= max_len {
        return text;
    }
    let head: String = text.chars().take(max_len).collect();
    format!("{}...\n\n[Truncated - {} total chars]", head, total)
}

/// Strip markup, decode entities and collapse whitespace.
pub fn html_to_text(html: &str) -> String {
    let text = script_or_style().replace_all(html, " ");
    let text = html_tag().replace_all(&text, " ");
    let text = html_escape::decode_html_entities(&text);
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// One hit from the search results page
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Result links on the results page go through a redirect that carries the
/// target in `uddg`.
fn resolve_result_url(href: &str) -> String {
    let href = html_escape::decode_html_entities(href);
    let href = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.into_owned()
    };

    let target = href
        .split(['?', '&'])
        .find_map(|pair| pair.strip_prefix("uddg="))
        .and_then(|encoded| urlencoding::decode(encoded).ok())
        .map(|url| url.into_owned());
    target.unwrap_or(href)
}

/// Parse a DuckDuckGo HTML results page.
pub fn parse_results(html: &str, limit: usize) -> Vec<SearchResult> {
    let links: Vec<_> = result_link().find_iter(html).collect();

    links
        .iter()
        .enumerate()
        .filter_map(|(i, link)| {
            let anchor = link.as_str();
            let href = href_attr().captures(anchor)?.get(1)?.as_str();
            let title = html_to_text(anchor);
            if title.is_empty() {
                return None;
            }

            // the snippet sits between this link and the next one
            let end = links.get(i + 1).map(|next| next.start()).unwrap_or(html.len());
            let snippet = result_snippet()
                .captures(&html[link.end()..end])
                .and_then(|c| c.get(1))
                .map(|m| html_to_text(m.as_str()))
                .unwrap_or_default();

            Some(SearchResult {
                title,
                url: resolve_result_url(href),
                snippet,
            })
        })
        .take(limit)
        .collect()
}

/// Web search tool backed by DuckDuckGo's HTML endpoint
pub struct WebSearchTool {
    client: Client,
    endpoint: String,
}

impl WebSearchTool {
    pub fn new() -> Self {
        Self::with_endpoint(http_client(), SEARCH_URL)
    }

    pub fn with_endpoint(client: Client, endpoint: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
        }
    }
}

impl Default for WebSearchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str { "web_search" }
    fn description(&self) -> &str {
        "Performs a web search for your query and returns the top results as markdown links with snippets"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The search query to perform"
                },
                "max_results": {
                    "type": "number",
                    "description": "Maximum number of results (default 10)"
                }
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let query = required_str(&params, "query")?;
        let limit = params
            .get("max_results")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_RESULTS);

        debug!("Searching the web for {:?}", query);
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Search request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("Search failed with HTTP {}", status)));
        }
        let html = response
            .text()
            .await
            .map_err(|e| Error::Tool(format!("Failed to read search results: {}", e)))?;

        let results = parse_results(&html, limit);
        if results.is_empty() {
            return Err(Error::Tool("No results found! Try a less restrictive/shorter query.".to_string()));
        }

        let formatted: Vec<String> = results
            .iter()
            .map(|r| format!("[{}]({})\n{}", r.title, r.url, r.snippet))
            .collect();
        Ok(format!("## Search Results\n\n{}", formatted.join("\n\n")))
    }
}

/// Fetch a web page and return its readable text
pub struct WebFetchTool {
    client: Client,
}

impl WebFetchTool {
    pub fn new() -> Self {
        Self::with_client(http_client())
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl Default for WebFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn name(&self) -> &str { "web_fetch" }
    fn description(&self) -> &str {
        "Fetch a web page by URL and return its content as plain text"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "URL to fetch"
                },
                "max_length": {
                    "type": "number",
                    "description": "Maximum characters to return (default 10000)"
                }
            },
            "required": ["url"]
        })
    }

    async fn execute(&self, params: Value) -> Result<String> {
        let url = required_str(&params, "url")?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(Error::Tool(format!("Only http(s) URLs can be fetched: {}", url)));
        }

        let max_len = params
            .get("max_length")
            .and_then(|v| v.as_u64())
            .map(|n| n as usize)
            .unwrap_or(DEFAULT_MAX_LENGTH);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Tool(format!("Failed to fetch {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Tool(format!("HTTP error: {}", status)));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("html"))
            .unwrap_or(false);
        let body = response
            .text()
            .await
            .map_err(|e| Error::Tool(format!("Failed to read response: {}", e)))?;

        let text = if is_html { html_to_text(&body) } else { body };
        Ok(truncate(text, max_len))
    }
}
