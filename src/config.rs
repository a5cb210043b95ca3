use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use crate::error::{AppError, Result};

/// Which news-fetch strategy the server runs with. The two strategies are
/// mutually exclusive; `Api` is the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchStrategy {
    /// Single query against the GNews search API.
    Api,
    /// Web searches per query variant, then scraping the article pages.
    Scrape,
}

impl FromStr for FetchStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "api" => Ok(FetchStrategy::Api),
            "scrape" => Ok(FetchStrategy::Scrape),
            other => Err(AppError::Config(format!(
                "Invalid NEWS_FETCH_STRATEGY '{other}', expected 'api' or 'scrape'"
            ))),
        }
    }
}

#[derive(Clone)]
pub struct Config {
    pub server_addr: SocketAddr,
    /// Credential for the generative-summarization provider. Required.
    pub gemini_api_key: String,
    /// Credential for the GNews search API. Required for the `Api` strategy.
    pub gnews_api_key: Option<String>,
    /// Credential for the secondary geocoder; absence disables that fallback.
    pub google_maps_api_key: Option<String>,
    /// Credentials for the web-search step of the `Scrape` strategy; absence
    /// disables that step.
    pub google_search_api_key: Option<String>,
    pub google_search_cx: Option<String>,
    pub fetch_strategy: FetchStrategy,
    /// Directory holding the capped request log.
    pub log_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        // Load environment variables from .env file if it exists
        dotenv::dotenv().ok();

        let gemini_api_key = env::var("GEMINI_API_KEY").map_err(|_| {
            AppError::Config("GEMINI_API_KEY not found in environment variables".to_string())
        })?;

        let gnews_api_key = env::var("GNEWS_API_KEY").ok();
        let google_maps_api_key = env::var("GOOGLE_MAPS_API_KEY").ok();
        let google_search_api_key = env::var("GOOGLE_SEARCH_API_KEY").ok();
        let google_search_cx = env::var("GOOGLE_SEARCH_CX").ok();

        let fetch_strategy = match env::var("NEWS_FETCH_STRATEGY") {
            Ok(raw) => raw.parse::<FetchStrategy>()?,
            Err(_) => FetchStrategy::Api,
        };

        if fetch_strategy == FetchStrategy::Api && gnews_api_key.is_none() {
            return Err(AppError::Config(
                "GNEWS_API_KEY is required for the 'api' fetch strategy".to_string(),
            ));
        }

        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "Data".to_string());

        // Load server configuration with defaults
        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
        let port = port
            .parse::<u16>()
            .map_err(|e| AppError::Config(format!("Invalid port: {}", e)))?;
        let ip = IpAddr::from_str(&host)
            .map_err(|e| AppError::Config(format!("Invalid host address: {}", e)))?;

        let server_addr = SocketAddr::new(ip, port);

        Ok(Config {
            server_addr,
            gemini_api_key,
            gnews_api_key,
            google_maps_api_key,
            google_search_api_key,
            google_search_cx,
            fetch_strategy,
            log_dir: PathBuf::from(log_dir),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_strategy_parses_known_values() {
        assert_eq!("api".parse::<FetchStrategy>().unwrap(), FetchStrategy::Api);
        assert_eq!(
            "SCRAPE".parse::<FetchStrategy>().unwrap(),
            FetchStrategy::Scrape
        );
        assert!("rss".parse::<FetchStrategy>().is_err());
    }
}
