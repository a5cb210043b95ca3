use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use rand::Rng;
use reqwest::{Client, ClientBuilder};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::{Config, FetchStrategy};

const GNEWS_BASE: &str = "https://gnews.io/api/v4";
const CUSTOM_SEARCH_BASE: &str = "https://www.googleapis.com";

/// Article fetch cap used by the news pipeline.
pub const DEFAULT_MAX_RESULTS: usize = 10;

/// A news article as carried through one request. Ephemeral, never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Article {
    pub url: String,
    /// Description or scraped body text. May be empty.
    pub content: String,
    /// The query this article was found under.
    pub query: String,
}

/// Seam for the news-search step so handlers can be tested with a stub.
#[async_trait]
pub trait FetchNews: Send + Sync {
    /// Fetch up to `max_results` articles about `place`. Returns an empty
    /// list on total failure, never an error; an empty list is a user-facing
    /// not-found condition, not a fetch-layer error.
    async fn search(&self, place: &str, max_results: usize) -> Vec<Article>;
}

/// Build the fetcher the configured strategy calls for.
pub fn from_config(config: &Config) -> Arc<dyn FetchNews> {
    match config.fetch_strategy {
        FetchStrategy::Api => Arc::new(GNewsFetcher::new(
            config.gnews_api_key.clone().unwrap_or_default(),
        )),
        FetchStrategy::Scrape => Arc::new(ScrapeFetcher::new(
            config.google_search_api_key.clone(),
            config.google_search_cx.clone(),
        )),
    }
}

/// Strip commas and collapse whitespace so the place string works as a
/// free-text search query.
pub fn sanitize_query(place: &str) -> String {
    place
        .replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_client() -> Client {
    ClientBuilder::new()
        .timeout(Duration::from_secs(10))
        .connect_timeout(Duration::from_secs(5))
        .build()
        .expect("Failed to build HTTP client")
}

// ---------------------------------------------------------------------------
// Primary strategy: one call to the GNews search API.
// ---------------------------------------------------------------------------

pub struct GNewsFetcher {
    client: Client,
    api_key: String,
    base: String,
}

impl GNewsFetcher {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, GNEWS_BASE.to_string())
    }

    pub fn with_endpoint(api_key: String, base: String) -> Self {
        Self {
            client: build_client(),
            api_key,
            base,
        }
    }
}

#[async_trait]
impl FetchNews for GNewsFetcher {
    async fn search(&self, place: &str, max_results: usize) -> Vec<Article> {
        let query = sanitize_query(place);
        let url = format!("{}/search", self.base);

        let result = self
            .client
            .get(&url)
            .query(&[
                ("q", query.clone()),
                ("token", self.api_key.clone()),
                ("lang", "en".to_string()),
                ("max", max_results.to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, %place, "GNews request failed");
                return Vec::new();
            }
        };

        let data: GNewsResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, %place, "GNews returned malformed payload");
                return Vec::new();
            }
        };

        let articles = articles_from_gnews(data, place, max_results);
        if articles.is_empty() {
            warn!(%place, "No articles found in GNews response");
        } else {
            info!(%place, count = articles.len(), "GNews search succeeded");
        }
        articles
    }
}

#[derive(Deserialize)]
struct GNewsResponse {
    #[serde(default)]
    articles: Vec<GNewsArticle>,
}

#[derive(Deserialize)]
struct GNewsArticle {
    url: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    content: Option<String>,
}

fn articles_from_gnews(data: GNewsResponse, place: &str, max_results: usize) -> Vec<Article> {
    data.articles
        .into_iter()
        .take(max_results)
        .map(|a| {
            let content = a
                .description
                .filter(|d| !d.is_empty())
                .or(a.content)
                .unwrap_or_default();
            Article {
                url: a.url,
                content,
                query: place.to_string(),
            }
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Alternate strategy: web searches per query variant, scraping result pages.
// ---------------------------------------------------------------------------

const QUERY_VARIANT_COUNT: usize = 5;

// Brittle by nature; reproduces the known-news-domain filter as-is.
const NEWS_DOMAINS: &[&str] = &[
    "bbc.com",
    "cnn.com",
    "reuters.com",
    "ap.org",
    "npr.org",
    "theguardian.com",
    "nytimes.com",
    "washingtonpost.com",
    "bloomberg.com",
    "wsj.com",
    "forbes.com",
    "time.com",
    "newsweek.com",
    "usatoday.com",
    "abcnews.go.com",
    "cbsnews.com",
    "nbcnews.com",
    "foxnews.com",
    "skynews.com",
    "news.google.com",
    "yahoo.com/news",
    "msn.com",
    "indianexpress.com",
    "timesofindia.indiatimes.com",
    "hindustantimes.com",
    "ndtv.com",
    "republicworld.com",
    "news18.com",
    "zeenews.india.com",
    "aljazeera.com",
    "dw.com",
    "france24.com",
    "euronews.com",
];

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("title").expect("Failed to parse title selector"));
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("Failed to parse paragraph selector"));

pub struct ScrapeFetcher {
    client: Client,
    search_api_key: Option<String>,
    search_cx: Option<String>,
    search_base: String,
}

impl ScrapeFetcher {
    pub fn new(search_api_key: Option<String>, search_cx: Option<String>) -> Self {
        Self::with_endpoint(search_api_key, search_cx, CUSTOM_SEARCH_BASE.to_string())
    }

    pub fn with_endpoint(
        search_api_key: Option<String>,
        search_cx: Option<String>,
        search_base: String,
    ) -> Self {
        Self {
            client: build_client(),
            search_api_key,
            search_cx,
            search_base,
        }
    }

    async fn web_search(&self, key: &str, cx: &str, query: &str, num: usize) -> Vec<String> {
        let url = format!("{}/customsearch/v1", self.search_base);
        let result = self
            .client
            .get(&url)
            .query(&[
                ("key", key.to_string()),
                ("cx", cx.to_string()),
                ("q", query.to_string()),
                ("num", num.to_string()),
                ("sort", "date".to_string()),
            ])
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, %query, "Web search failed");
                return Vec::new();
            }
        };

        let data: CustomSearchResponse = match response.json().await {
            Ok(data) => data,
            Err(e) => {
                warn!(error = %e, %query, "Web search returned malformed payload");
                return Vec::new();
            }
        };

        data.items.into_iter().map(|item| item.link).collect()
    }

    async fn scrape_article(&self, url: &str) -> Option<String> {
        let result = self
            .client
            .get(url)
            // Some article pages refuse non-browser clients
            .header(
                "User-Agent",
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36",
            )
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let html = match result {
            Ok(response) => match response.text().await {
                Ok(html) => html,
                Err(e) => {
                    warn!(error = %e, %url, "Failed to read article body");
                    return None;
                }
            },
            Err(e) => {
                warn!(error = %e, %url, "Failed to fetch article");
                return None;
            }
        };

        Some(extract_article_text(&html))
    }
}

#[async_trait]
impl FetchNews for ScrapeFetcher {
    async fn search(&self, place: &str, max_results: usize) -> Vec<Article> {
        let (key, cx) = match (self.search_api_key.as_deref(), self.search_cx.as_deref()) {
            (Some(key), Some(cx)) => (key, cx),
            _ => {
                warn!("Scrape strategy selected but web-search credentials are not configured");
                return Vec::new();
            }
        };

        let per_query = max_results / QUERY_VARIANT_COUNT + 1;
        let mut articles: Vec<Article> = Vec::new();

        for (i, query) in query_variants(place).into_iter().enumerate() {
            if articles.len() >= max_results {
                break;
            }
            if i > 0 {
                // Pace consecutive search queries
                let delay = rand::thread_rng().gen_range(1.0..3.0);
                tokio::time::sleep(Duration::from_secs_f64(delay)).await;
            }

            let urls = self.web_search(key, cx, &query, per_query).await;
            debug!(%query, candidates = urls.len(), "Web search returned candidates");

            for url in urls.into_iter().filter(|u| is_news_website(u)) {
                if articles.len() >= max_results {
                    break;
                }
                if let Some(content) = self.scrape_article(&url).await {
                    articles.push(Article {
                        url,
                        content,
                        query: query.clone(),
                    });
                }
            }
        }

        articles.truncate(max_results);
        if articles.is_empty() {
            warn!(%place, "Scrape strategy found no articles");
        }
        articles
    }
}

#[derive(Deserialize)]
struct CustomSearchResponse {
    #[serde(default)]
    items: Vec<CustomSearchItem>,
}

#[derive(Deserialize)]
struct CustomSearchItem {
    link: String,
}

fn query_variants(place: &str) -> Vec<String> {
    vec![
        format!("{place} news today"),
        "latest news".to_string(),
        "current events".to_string(),
        format!("breaking news {place}"),
        "recent developments".to_string(),
    ]
}

fn is_news_website(url: &str) -> bool {
    let url = url.to_lowercase();
    NEWS_DOMAINS.iter().any(|domain| url.contains(domain))
}

/// Title plus the first three substantial paragraphs, tags stripped.
fn extract_article_text(html: &str) -> String {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "No title found".to_string());

    let paragraphs: Vec<String> = document
        .select(&PARAGRAPH_SELECTOR)
        .take(3)
        .map(|p| p.text().collect::<String>().trim().to_string())
        .filter(|p| p.chars().count() > 50)
        .collect();

    if paragraphs.is_empty() {
        format!("Title: {}\n\nContent extraction failed for this article.", title)
    } else {
        format!("Title: {}\n\n{}", title, paragraphs.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_commas_and_collapses_whitespace() {
        assert_eq!(
            sanitize_query("London,  England,United Kingdom"),
            "London England United Kingdom"
        );
        assert_eq!(sanitize_query("  Paris  "), "Paris");
        assert_eq!(sanitize_query(""), "");
    }

    #[test]
    fn query_variants_cover_place() {
        let variants = query_variants("Tokyo");
        assert_eq!(variants.len(), QUERY_VARIANT_COUNT);
        assert_eq!(variants[0], "Tokyo news today");
        assert_eq!(variants[3], "breaking news Tokyo");
    }

    #[test]
    fn news_domain_filter() {
        assert!(is_news_website("https://www.bbc.com/news/world-12345"));
        assert!(is_news_website("HTTPS://EDITION.CNN.COM/2025/story"));
        assert!(!is_news_website("https://example.com/blog/post"));
    }

    #[test]
    fn gnews_mapping_prefers_description_and_caps_results() {
        let data = GNewsResponse {
            articles: (0..12)
                .map(|i| GNewsArticle {
                    url: format!("https://news.example/{i}"),
                    description: if i == 0 {
                        Some(String::new())
                    } else {
                        Some(format!("description {i}"))
                    },
                    content: Some(format!("body {i}")),
                })
                .collect(),
        };

        let articles = articles_from_gnews(data, "London", 10);
        assert_eq!(articles.len(), 10);
        // Empty description falls through to the content field
        assert_eq!(articles[0].content, "body 0");
        assert_eq!(articles[1].content, "description 1");
        assert!(articles.iter().all(|a| a.query == "London"));
    }

    #[test]
    fn extract_keeps_only_substantial_paragraphs() {
        let html = r#"
            <html><head><title>Flood warnings issued</title></head>
            <body>
              <p>Short.</p>
              <p>The river burst its banks overnight, forcing dozens of families to evacuate their homes.</p>
              <p>Also short.</p>
              <p>This paragraph is outside the first three and must be ignored even though it is long enough.</p>
            </body></html>
        "#;
        let text = extract_article_text(html);
        assert!(text.starts_with("Title: Flood warnings issued"));
        assert!(text.contains("burst its banks"));
        assert!(!text.contains("Short."));
        assert!(!text.contains("outside the first three"));
    }

    #[test]
    fn extract_reports_failure_without_paragraphs() {
        let html = "<html><head><title>Paywall</title></head><body><p>No.</p></body></html>";
        assert_eq!(
            extract_article_text(html),
            "Title: Paywall\n\nContent extraction failed for this article."
        );
    }

    #[tokio::test]
    async fn gnews_fetcher_returns_empty_when_provider_unreachable() {
        let fetcher =
            GNewsFetcher::with_endpoint("key".to_string(), "http://127.0.0.1:9".to_string());
        assert!(fetcher.search("London", 10).await.is_empty());
    }

    #[tokio::test]
    async fn scrape_fetcher_disabled_without_credentials() {
        let fetcher = ScrapeFetcher::new(None, None);
        assert!(fetcher.search("London", 10).await.is_empty());
    }
}
