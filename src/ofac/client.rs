//! Cached download layer over the Treasury SDN XML feed.
//!
//! Mirrors `core.rs`'s rate-limited fetch shape for the single OFAC endpoint: one
//! file is ever fetched, but it's cached locally and trusted for a week, with a
//! stale-but-available fallback when a refresh attempt fails.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use super::parser::{SdnCitation, SdnEntry, parse_sdn_xml};
use crate::error::{OfacError, PipelineError};

const SDN_URL: &str = "https://www.treasury.gov/ofac/downloads/sdn.xml";
const TRUST_WINDOW_DAYS: i64 = 7;

pub struct OfacClient {
    client: reqwest::Client,
    cache_dir: PathBuf,
}

/// Reported by `get_cache_info` for observability: the cache file path, its
/// embedded date, and its age in days.
#[derive(Debug, Clone)]
pub struct CacheInfo {
    pub path: PathBuf,
    pub date: NaiveDate,
    pub age_days: i64,
}

/// Result of `check_for_updates`: whether newly-fetched content differs from the
/// last cached content, independent of the date-based freshness gate.
#[derive(Debug, Clone)]
pub struct UpdateCheck {
    pub changed: bool,
    pub new_hash: String,
    pub previous_hash: Option<String>,
}

impl OfacClient {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self, PipelineError> {
        let cache_dir = cache_dir.into();
        std::fs::create_dir_all(&cache_dir).map_err(OfacError::Cache)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .user_agent("filingwatch/0.1")
            .build()
            .map_err(OfacError::Fetch)?;
        Ok(Self { client, cache_dir })
    }

    fn cache_path_for(&self, date: NaiveDate) -> PathBuf {
        self.cache_dir.join(format!("sdn_{}.xml", date.format("%Y-%m-%d")))
    }

    fn find_latest_cached(&self) -> Option<(PathBuf, NaiveDate)> {
        let entries = std::fs::read_dir(&self.cache_dir).ok()?;
        let mut best: Option<(PathBuf, NaiveDate)> = None;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(date_str) = name.strip_prefix("sdn_").and_then(|s| s.strip_suffix(".xml")) {
                if let Ok(date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
                    if best.as_ref().map(|(_, d)| date > *d).unwrap_or(true) {
                        best = Some((entry.path(), date));
                    }
                }
            }
        }
        best
    }

    /// Fetches the SDN list, honoring the 7-day trust window unless
    /// `force_refresh` is set. Falls back to the most recent cached copy
    /// (regardless of age) when a refresh attempt fails over the network, and
    /// only errors when no cached copy exists at all.
    pub async fn get_sdn_entries(
        &self,
        force_refresh: bool,
    ) -> Result<Vec<(SdnEntry, SdnCitation)>, PipelineError> {
        let today = Utc::now().date_naive();

        if !force_refresh {
            if let Some((path, date)) = self.find_latest_cached() {
                let age = (today - date).num_days();
                if age < TRUST_WINDOW_DAYS {
                    info!(age_days = age, "serving cached SDN list");
                    let xml = std::fs::read_to_string(&path).map_err(OfacError::Cache)?;
                    return parse_sdn_xml(&xml, SDN_URL, Some(&date.format("%Y-%m-%d").to_string()));
                }
            }
        }

        match self.fetch_and_cache(today).await {
            Ok(xml) => parse_sdn_xml(&xml, SDN_URL, Some(&today.format("%Y-%m-%d").to_string())),
            Err(e) => {
                if let Some((path, date)) = self.find_latest_cached() {
                    warn!(error = %e, "OFAC refresh failed, falling back to stale cache");
                    let xml = std::fs::read_to_string(&path).map_err(OfacError::Cache)?;
                    parse_sdn_xml(&xml, SDN_URL, Some(&date.format("%Y-%m-%d").to_string()))
                } else {
                    Err(OfacError::NoCacheAvailable.into())
                }
            }
        }
    }

    async fn fetch_and_cache(&self, today: NaiveDate) -> Result<String, PipelineError> {
        let resp = self
            .client
            .get(SDN_URL)
            .send()
            .await
            .map_err(OfacError::Fetch)?;
        let body = resp.text().await.map_err(OfacError::Fetch)?;
        let path = self.cache_path_for(today);
        std::fs::write(&path, &body).map_err(OfacError::Cache)?;
        Ok(body)
    }

    /// Computes the SHA-256 hash of freshly fetched content and compares it to
    /// the hash of the most recently cached content, independent of the
    /// date-based freshness gate — a same-day re-fetch via `force_refresh` can
    /// still report "no update."
    pub async fn check_for_updates(&self) -> Result<UpdateCheck, PipelineError> {
        let today = Utc::now().date_naive();
        let previous_hash = self
            .find_latest_cached()
            .and_then(|(path, _)| std::fs::read_to_string(path).ok())
            .map(|content| compute_content_hash(&content));

        let fresh = self.fetch_and_cache(today).await?;
        let new_hash = compute_content_hash(&fresh);
        let changed = previous_hash.as_deref() != Some(new_hash.as_str());

        Ok(UpdateCheck {
            changed,
            new_hash,
            previous_hash,
        })
    }

    pub fn get_cache_info(&self) -> Option<CacheInfo> {
        let (path, date) = self.find_latest_cached()?;
        let age_days = (Utc::now().date_naive() - date).num_days();
        Some(CacheInfo { path, date, age_days })
    }
}

fn compute_content_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    format!("{digest:x}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compute_content_hash_is_deterministic() {
        assert_eq!(compute_content_hash("abc"), compute_content_hash("abc"));
        assert_ne!(compute_content_hash("abc"), compute_content_hash("abd"));
    }
}
