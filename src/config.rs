//! Configuration for the pipeline and the EDGAR client it sits on top of.
//!
//! [`EdgarConfig`] and [`EdgarUrls`] control the fetch layer's rate limiting, HTTP
//! timeouts, base URLs, and user agent string, and predate the rest of this crate.
//! [`Config`] is the pipeline-wide settings struct: it embeds an `EdgarConfig` and
//! adds the graph store, OFAC cache, review queue, and optional LLM-fallback
//! settings the rest of the pipeline needs. [`Config::from_env`] is the entry point
//! used by the scheduler binary; unit tests construct `Config` directly instead.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::EdgarError;

/// Configuration settings for the Edgar HTTP client.
///
/// This struct contains all the settings needed to customize how the Edgar client
/// behaves, including network timeouts, rate limiting, and service endpoints. The
/// default configuration is optimized for general use and SEC.gov compliance, but
/// you can adjust these settings based on your application's needs.
///
/// # Examples
///
/// Using defaults:
/// ```rust
/// # use filingwatch::config::EdgarConfig;
/// let config = EdgarConfig::default();
/// ```
///
/// Custom configuration:
/// ```rust
/// # use filingwatch::config::{EdgarConfig, EdgarUrls};
/// # use std::time::Duration;
/// let config = EdgarConfig::new(
///     "research_app/1.0 contact@university.edu",
///     5,  // More conservative rate
///     Duration::from_secs(45),
///     None,  // Use default URLs
/// );
/// ```
#[derive(Debug, Clone)]
pub struct EdgarConfig {
    /// User agent string for HTTP requests (required by SEC)
    pub user_agent: String,

    /// Rate limit in requests per second (default: 10)
    pub rate_limit: u32,

    /// HTTP request timeout duration
    pub timeout: Duration,

    /// Base URLs for different EDGAR services
    pub base_urls: EdgarUrls,
}

/// Base URLs for the different SEC EDGAR service endpoints.
///
/// The SEC EDGAR system is distributed across multiple domains, each serving
/// different types of content. The archives domain hosts historical filings,
/// the data domain provides structured API access, and the files domain serves
/// various data files. You typically won't need to change these unless you're
/// running tests against a mock server.
#[derive(Debug, Clone)]
pub struct EdgarUrls {
    /// Archives base URL (historical filings)
    pub archives: String,

    /// Data API base URL (structured data)
    pub data: String,

    /// Files base URL (company tickers, etc.)
    pub files: String,

    /// Search API base URL
    pub search: String,
}

impl Default for EdgarConfig {
    fn default() -> Self {
        Self {
            user_agent: "filingwatch/0.1.0".to_string(),
            rate_limit: 10,
            timeout: Duration::from_secs(30),
            base_urls: EdgarUrls {
                archives: "https://www.sec.gov/Archives/edgar".to_string(),
                data: "https://data.sec.gov".to_string(),
                files: "https://www.sec.gov/files".to_string(),
                search: "https://efts.sec.gov/LATEST/search-index/".to_string(),
            },
        }
    }
}

impl EdgarConfig {
    /// Creates custom Edgar configuration.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use filingwatch::config::{EdgarConfig, EdgarUrls};
    /// use std::time::Duration;
    ///
    /// let config = EdgarConfig::new(
    ///     "MyApp contact@example.com",
    ///     10,
    ///     Duration::from_secs(30),
    ///     None,
    /// );
    /// ```
    pub fn new(
        user_agent: impl Into<String>,
        rate_limit: u32,
        timeout: Duration,
        base_urls: Option<EdgarUrls>,
    ) -> Self {
        Self {
            user_agent: user_agent.into(),
            rate_limit,
            timeout,
            base_urls: base_urls.unwrap_or_default(),
        }
    }
}

impl Default for EdgarUrls {
    fn default() -> Self {
        Self {
            archives: "https://www.sec.gov/Archives/edgar".to_string(),
            data: "https://data.sec.gov".to_string(),
            files: "https://www.sec.gov/files".to_string(),
            search: "https://efts.sec.gov/LATEST/search-index/".to_string(),
        }
    }
}

/// Pipeline-wide configuration: the EDGAR fetch layer plus the graph store, OFAC
/// cache, review queue, and optional LLM-fallback settings.
///
/// Built either from the environment via [`Config::from_env`] (what the scheduler
/// binary uses) or constructed directly, which is how tests build fixtures that
/// point at a temp directory and an in-memory graph.
#[derive(Debug, Clone)]
pub struct Config {
    /// Settings for the underlying EDGAR HTTP client.
    pub edgar: EdgarConfig,

    /// Bolt URI for the graph store, e.g. `bolt://127.0.0.1:7687`.
    pub neo4j_uri: String,

    /// Graph store username.
    pub neo4j_user: String,

    /// Graph store password.
    pub neo4j_password: String,

    /// API key for the LLM-fallback extraction path. Extraction falls back to the
    /// rule-based parser's best-effort output when this is unset.
    pub anthropic_api_key: Option<String>,

    /// Directory the OFAC client caches the last-fetched SDN list in.
    pub ofac_cache_dir: PathBuf,

    /// Path to the review queue's SQLite database file.
    pub review_queue_db_path: PathBuf,
}

impl Config {
    /// Reads configuration from the environment.
    ///
    /// `SEC_EDGAR_USER_AGENT` and `NEO4J_PASSWORD` are required; SEC's access policy
    /// rejects requests without a contact-identifying user agent, and the graph
    /// store has no usable default credential. Everything else falls back to a
    /// local-development default.
    ///
    /// | Variable                  | Default                     |
    /// |----------------------------|-----------------------------|
    /// | `SEC_EDGAR_USER_AGENT`     | *(required)*                 |
    /// | `NEO4J_URI`                | `bolt://127.0.0.1:7687`      |
    /// | `NEO4J_USER`               | `neo4j`                      |
    /// | `NEO4J_PASSWORD`           | *(required)*                 |
    /// | `ANTHROPIC_API_KEY`        | unset (LLM fallback disabled)|
    /// | `OFAC_CACHE_DIR`           | `.cache/ofac`                 |
    /// | `REVIEW_QUEUE_DB_PATH`     | `review_queue.db`            |
    pub fn from_env() -> std::result::Result<Self, EdgarError> {
        let user_agent = std::env::var("SEC_EDGAR_USER_AGENT").map_err(|_| {
            EdgarError::ConfigError(
                "SEC_EDGAR_USER_AGENT must be set (SEC requires a contact-identifying user agent)"
                    .to_string(),
            )
        })?;
        let neo4j_uri =
            std::env::var("NEO4J_URI").unwrap_or_else(|_| "bolt://127.0.0.1:7687".to_string());
        let neo4j_user = std::env::var("NEO4J_USER").unwrap_or_else(|_| "neo4j".to_string());
        let neo4j_password = std::env::var("NEO4J_PASSWORD").map_err(|_| {
            EdgarError::ConfigError("NEO4J_PASSWORD must be set".to_string())
        })?;
        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        let ofac_cache_dir = std::env::var("OFAC_CACHE_DIR")
            .unwrap_or_else(|_| ".cache/ofac".to_string())
            .into();
        let review_queue_db_path = std::env::var("REVIEW_QUEUE_DB_PATH")
            .unwrap_or_else(|_| "review_queue.db".to_string())
            .into();

        Ok(Self {
            edgar: EdgarConfig::new(user_agent, 10, Duration::from_secs(30), None),
            neo4j_uri,
            neo4j_user,
            neo4j_password,
            anthropic_api_key,
            ofac_cache_dir,
            review_queue_db_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn edgar_config_default_matches_sec_endpoints() {
        let config = EdgarConfig::default();
        assert_eq!(config.rate_limit, 10);
        assert_eq!(config.base_urls.data, "https://data.sec.gov");
    }

    #[test]
    fn from_env_requires_user_agent() {
        // SAFETY: tests run single-threaded within this module; no other test
        // reads or writes these variables.
        unsafe {
            std::env::remove_var("SEC_EDGAR_USER_AGENT");
        }
        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, EdgarError::ConfigError(_)));
    }
}
