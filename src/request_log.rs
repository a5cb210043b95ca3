use std::io::ErrorKind;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::error;

use crate::error::{AppError, Result};

const LOG_FILE_NAME: &str = "chatlog.json";

/// Oldest entries are evicted beyond this count.
pub const MAX_LOG_ENTRIES: usize = 100;

/// Summaries are truncated to this many characters before persisting.
pub const SUMMARY_TRUNCATE_LEN: usize = 200;

/// Soft daily cap on summarization requests, just under the model provider's
/// free-tier quota.
pub const DAILY_REQUEST_LIMIT: usize = 1400;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LogEntry {
    pub timestamp: String,
    pub coordinates: Coordinates,
    pub location: String,
    pub summary: String,
}

/// Capped append-only request log stored as one JSON array on disk.
///
/// The file is read-modify-written whole; callers must serialize writers
/// (the server keeps the log behind a mutex in `AppState`). Entries are never
/// mutated after append; eviction of the oldest is the only removal path.
pub struct RequestLog {
    dir: PathBuf,
}

impl RequestLog {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    /// Append one entry, best-effort. Failures are logged and swallowed so a
    /// logging problem can never fail the request being served.
    pub async fn append(&self, lat: f64, lng: f64, location: &str, summary: &str) {
        if let Err(e) = self.try_append(lat, lng, location, summary).await {
            error!(error = %e, "Failed to append request log entry");
        }
    }

    async fn try_append(&self, lat: f64, lng: f64, location: &str, summary: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        let mut entries = self.read().await?;
        entries.push(LogEntry {
            timestamp: Utc::now().to_rfc3339(),
            coordinates: Coordinates { lat, lng },
            location: location.to_string(),
            summary: truncate_summary(summary),
        });

        if entries.len() > MAX_LOG_ENTRIES {
            let excess = entries.len() - MAX_LOG_ENTRIES;
            entries.drain(..excess);
        }

        let json = serde_json::to_string_pretty(&entries)
            .map_err(|e| AppError::Internal(e.to_string()))?;
        fs::write(self.file_path(), json)
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;

        Ok(())
    }

    /// Read the whole log, oldest first. A missing file is an empty log; a
    /// present-but-corrupt file is a distinguishable read error.
    pub async fn read(&self) -> Result<Vec<LogEntry>> {
        let raw = match fs::read_to_string(self.file_path()).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::LogRead(e.to_string())),
        };

        serde_json::from_str(&raw).map_err(|e| AppError::LogRead(e.to_string()))
    }

    /// Count of logged requests whose timestamp falls on today's UTC date.
    /// Unparseable timestamps are skipped.
    pub async fn requests_today(&self) -> usize {
        let entries = self.read().await.unwrap_or_default();
        let today = Utc::now().date_naive();

        entries
            .iter()
            .filter(|entry| {
                DateTime::parse_from_rfc3339(&entry.timestamp)
                    .map(|t| t.with_timezone(&Utc).date_naive() == today)
                    .unwrap_or(false)
            })
            .count()
    }

    /// Advisory gate: false once today's usage reaches the daily limit. The
    /// pipeline then skips the model call and uses the fallback summary.
    pub async fn within_rate_limit(&self) -> bool {
        self.requests_today().await < DAILY_REQUEST_LIMIT
    }
}

fn truncate_summary(summary: &str) -> String {
    if summary.chars().count() > SUMMARY_TRUNCATE_LEN {
        let truncated: String = summary.chars().take(SUMMARY_TRUNCATE_LEN).collect();
        format!("{truncated}...")
    } else {
        summary.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn log_in(dir: &tempfile::TempDir) -> RequestLog {
        RequestLog::new(dir.path().join("Data"))
    }

    #[tokio::test]
    async fn read_of_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        assert_eq!(log_in(&dir).read().await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn append_then_read_round_trips_fields() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);

        log.append(51.5074, -0.1278, "London, England, United Kingdom", "All quiet.")
            .await;

        let entries = log.read().await.unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.coordinates, Coordinates { lat: 51.5074, lng: -0.1278 });
        assert_eq!(entry.location, "London, England, United Kingdom");
        assert_eq!(entry.summary, "All quiet.");
        assert!(DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[tokio::test]
    async fn long_summaries_are_truncated_at_write_time() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);

        let summary = "x".repeat(250);
        log.append(0.0, 0.0, "Null Island", &summary).await;

        let entries = log.read().await.unwrap();
        assert_eq!(entries[0].summary.chars().count(), SUMMARY_TRUNCATE_LEN + 3);
        assert!(entries[0].summary.ends_with("..."));
    }

    #[tokio::test]
    async fn short_summaries_are_stored_verbatim() {
        assert_eq!(truncate_summary("short"), "short");
        let exactly = "y".repeat(SUMMARY_TRUNCATE_LEN);
        assert_eq!(truncate_summary(&exactly), exactly);
    }

    #[tokio::test]
    async fn capped_at_one_hundred_entries_evicting_oldest() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);

        for i in 0..105 {
            log.append(1.0, 2.0, &format!("place-{i}"), "summary").await;
        }

        let entries = log.read().await.unwrap();
        assert_eq!(entries.len(), MAX_LOG_ENTRIES);
        // The five oldest are gone and relative order is preserved
        assert_eq!(entries[0].location, "place-5");
        assert_eq!(entries[99].location, "place-104");
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.location, format!("place-{}", i + 5));
        }
    }

    #[tokio::test]
    async fn corrupt_file_is_a_distinguishable_error() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);

        std::fs::create_dir_all(dir.path().join("Data")).unwrap();
        std::fs::write(dir.path().join("Data").join("chatlog.json"), "not json").unwrap();

        match log.read().await {
            Err(AppError::LogRead(_)) => {}
            other => panic!("expected LogRead error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn requests_today_counts_only_todays_entries() {
        let dir = tempdir().unwrap();
        let log = log_in(&dir);

        log.append(1.0, 1.0, "here", "now").await;
        log.append(2.0, 2.0, "there", "now").await;

        // Plant an old and a broken timestamp alongside the fresh ones
        let mut entries = log.read().await.unwrap();
        entries.push(LogEntry {
            timestamp: "2001-01-01T00:00:00+00:00".to_string(),
            coordinates: Coordinates { lat: 0.0, lng: 0.0 },
            location: "past".to_string(),
            summary: "old".to_string(),
        });
        entries.push(LogEntry {
            timestamp: "garbage".to_string(),
            coordinates: Coordinates { lat: 0.0, lng: 0.0 },
            location: "broken".to_string(),
            summary: "bad".to_string(),
        });
        std::fs::write(
            dir.path().join("Data").join("chatlog.json"),
            serde_json::to_string_pretty(&entries).unwrap(),
        )
        .unwrap();

        assert_eq!(log.requests_today().await, 2);
        assert!(log.within_rate_limit().await);
    }
}
