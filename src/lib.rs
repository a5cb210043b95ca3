pub mod api;
pub mod config;
pub mod error;
pub mod geocode;
pub mod news;
pub mod request_log;
pub mod summarize;

use std::sync::Arc;
use tokio::sync::Mutex;

use config::Config;
use geocode::ResolveLocation;
use news::FetchNews;
use request_log::RequestLog;
use summarize::Summarize;

/// Application state that will be shared across handlers.
///
/// The resolver, fetcher, and summarizer sit behind trait objects so tests
/// can drive the router with stub components. The request log is behind a
/// mutex to keep its read-modify-write file update single-writer in-process.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub resolver: Arc<dyn ResolveLocation>,
    pub fetcher: Arc<dyn FetchNews>,
    pub summarizer: Arc<dyn Summarize>,
    pub request_log: Arc<Mutex<RequestLog>>,
}

impl AppState {
    /// Wire the real provider-backed components from configuration.
    pub fn from_config(config: Config) -> Self {
        let resolver = Arc::new(geocode::LocationResolver::new(
            config.google_maps_api_key.clone(),
        ));
        let fetcher = news::from_config(&config);
        let summarizer = Arc::new(summarize::GeminiSummarizer::new(
            config.gemini_api_key.clone(),
        ));
        let request_log = Arc::new(Mutex::new(RequestLog::new(config.log_dir.clone())));

        AppState {
            config: Arc::new(config),
            resolver,
            fetcher,
            summarizer,
            request_log,
        }
    }
}
