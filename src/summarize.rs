use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::{Client, ClientBuilder};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::news::Article;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com";
const GEMINI_MODEL: &str = "gemini-1.5-flash";
const MAX_RETRIES: u32 = 3;

/// A generated summary must be longer than this after trimming to count as a
/// successful attempt.
const MIN_SUMMARY_LEN: usize = 50;

/// Seam for the summarization step so handlers can be tested with a stub.
#[async_trait]
pub trait Summarize: Send + Sync {
    /// Summarize `articles` for `place`. Never fails: after retries are
    /// exhausted the deterministic template fallback is returned.
    async fn summarize(&self, articles: &[Article], place: &str) -> String;
}

/// Summarizer backed by the Gemini generative-language API.
pub struct GeminiSummarizer {
    client: Client,
    api_key: String,
    base: String,
    max_retries: u32,
}

impl GeminiSummarizer {
    pub fn new(api_key: String) -> Self {
        Self::with_endpoint(api_key, GEMINI_BASE.to_string(), MAX_RETRIES)
    }

    pub fn with_endpoint(api_key: String, base: String, max_retries: u32) -> Self {
        // No request timeout here: generation can legitimately run long, so
        // the model call relies on the client's own defaults.
        let client = ClientBuilder::new()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base,
            max_retries,
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base, GEMINI_MODEL
        );

        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| e.to_string())?;

        let json: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        json["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| "Invalid response format from model".to_string())
    }
}

#[async_trait]
impl Summarize for GeminiSummarizer {
    async fn summarize(&self, articles: &[Article], place: &str) -> String {
        if self.api_key.is_empty() {
            error!("Generative-model credential missing, using fallback summary");
            return fallback_summary(articles, place);
        }

        let prompt = build_prompt(articles, place);

        for attempt in 1..=self.max_retries {
            match self.generate(&prompt).await {
                Ok(text) => {
                    let summary = text.trim();
                    if summary.chars().count() > MIN_SUMMARY_LEN {
                        info!(%place, attempt, chars = summary.chars().count(), "Summary generated");
                        return summary.to_string();
                    }
                    warn!(%place, attempt, "Summary too short, retrying");
                    if attempt < self.max_retries {
                        let delay = rand::thread_rng().gen_range(1.0..3.0);
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    }
                }
                Err(e) => {
                    error!(%place, attempt, error = %e, "Model call failed");
                    if attempt < self.max_retries {
                        let delay = rand::thread_rng().gen_range(2.0..5.0);
                        tokio::time::sleep(Duration::from_secs_f64(delay)).await;
                    }
                }
            }
        }

        fallback_summary(articles, place)
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

/// Prompt embedding up to the first five articles.
pub fn build_prompt(articles: &[Article], place: &str) -> String {
    let mut articles_text = String::new();
    for (i, article) in articles.iter().take(5).enumerate() {
        articles_text.push_str(&format!("\n--- Article {} ---\n", i + 1));
        articles_text.push_str(&format!("URL: {}\n", article.url));
        let content = if article.content.is_empty() {
            "No content"
        } else {
            article.content.as_str()
        };
        articles_text.push_str(&format!("Content: {}\n", content));
    }

    format!(
        "You are a professional news summarizer. Please provide a comprehensive and engaging \
         summary of the latest news from {place} based on the following articles:\n\
         {articles_text}\n\
         Instructions:\n\
         1. Create a well-structured summary that captures the most important news events\n\
         2. Focus on recent developments, current events, and significant happenings\n\
         3. Organize the information logically with clear sections if multiple topics are covered\n\
         4. Use a professional but engaging tone\n\
         5. Include specific details, dates, and key figures when available\n\
         6. If there are multiple unrelated stories, organize them under appropriate headings\n\
         7. Aim for 200-400 words\n\
         8. End with a brief note about the general situation or outlook for the region\n\n\
         Please provide only the summary without any meta-commentary about the task."
    )
}

/// Deterministic summary used when the model path is unavailable or keeps
/// failing. Renders up to three article leads plus a closing count line.
pub fn fallback_summary(articles: &[Article], place: &str) -> String {
    if articles.is_empty() {
        return format!(
            "No recent news articles found for {place}. This could be due to limited coverage \
             or search limitations."
        );
    }

    let mut summary = format!("Latest News from {place}:\n\n");

    for (i, article) in articles.iter().take(3).enumerate() {
        if article.content.is_empty() {
            continue;
        }
        let first_sentence: String = article
            .content
            .split('.')
            .next()
            .unwrap_or("")
            .chars()
            .take(150)
            .collect();
        summary.push_str(&format!("{}. {}...\n\n", i + 1, first_sentence));
    }

    summary.push_str(&format!(
        "Found {} news articles related to {place}. ",
        articles.len()
    ));
    summary.push_str("For more detailed information, please check the original news sources.");
    summary
}
