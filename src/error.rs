//! Error types for the pipeline.
//!
//! The [`edgar`](crate::edgar) fetch layer returns `Result<T, EdgarError>`, unchanged from
//! its original lineage. Everything built on top of it — extractors, the graph loader,
//! signal and risk analysis, the scheduler — returns `PipelineResult<T, PipelineError>`,
//! which wraps `EdgarError` alongside sibling enums for OFAC, extraction, graph-store and
//! review-queue failures. `PipelineError` is the one error type that crosses module
//! boundaries; the sibling enums stay local to the module that raises them.

use std::string::FromUtf8Error;
use thiserror::Error;

/// Comprehensive error type for the EDGAR fetch layer.
///
/// This enum covers the various ways that operations can fail when interacting with
/// the SEC EDGAR system. Errors are categorized by their source: network issues,
/// HTTP status codes, parsing problems, configuration mistakes, or validation failures.
///
/// Each variant includes relevant context to help diagnose issues. For example,
/// `InvalidResponse` includes a preview of the response content, and `UnexpectedContentType`
/// shows both the expected and actual content types along with a content preview.
///
/// # Examples
///
/// Handling specific error types:
/// ```rust
/// # use filingwatch::edgar::{Edgar, FilingOperations};
/// # use filingwatch::EdgarError;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// # let edgar = Edgar::new("app contact@example.com")?;
/// match edgar.filings("0001234567", None).await {
///     Ok(filings) => println!("Found {} filings", filings.len()),
///     Err(EdgarError::NotFound) => println!("Company not found"),
///     Err(EdgarError::RateLimitExceeded) => println!("Rate limited, try again later"),
///     Err(e) => println!("Error: {}", e),
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum EdgarError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("Resource not found")]
    NotFound,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    #[error("Invalid year: must be 1994 or greater")]
    InvalidYear,

    #[error("Invalid quarter: must be between 1 and 4")]
    InvalidQuarter,

    #[error("Invalid month: must be between 1 and 12")]
    InvalidMonth,

    #[error("Invalid day: must be between 1 and 31")]
    InvalidDay,

    #[error("Invalid year: must be 2005 or greater for XBRL")]
    InvalidXBRLYear,

    #[error("Ticker not found")]
    TickerNotFound,

    #[error("File error: {0}")]
    FileError(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("XML deserialization error: {0}")]
    XmlDe(#[from] quick_xml::DeError),

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("Value conversion error: {0}")]
    ValueConversion(String),

    #[error("String parsing error: {0}")]
    ParseIntError(#[from] std::num::ParseIntError),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] FromUtf8Error),

    #[error(
        "Unexpected content type from URL {url}. Expected pattern {expected_pattern}, but got Content-Type: {got_content_type}. Content preview: {content_preview}..."
    )]
    UnexpectedContentType {
        url: String,
        expected_pattern: String, // e.g., "application/json"
        got_content_type: String,
        content_preview: String, // Add a preview of the content
    },
}

pub type Result<T> = std::result::Result<T, EdgarError>;

/// Failures fetching or parsing the OFAC SDN list.
#[derive(Error, Debug)]
pub enum OfacError {
    #[error("failed to fetch OFAC SDN list: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("OFAC SDN XML parsing error: {0}")]
    Parse(String),

    #[error("OFAC cache error: {0}")]
    Cache(#[from] std::io::Error),

    #[error("no cached SDN list available and fetch failed")]
    NoCacheAvailable,
}

/// Failures turning raw filing content into typed, cited records.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("extraction not supported for form type: {0}")]
    UnsupportedForm(String),

    #[error("HTML structure did not match expected layout: {0}")]
    Html(String),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("expected section not found: {0}")]
    MissingSection(String),

    #[error("LLM fallback extraction failed: {0}")]
    LlmFallback(String),
}

/// Failures talking to or traversing the property graph.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("graph driver error: {0}")]
    Driver(#[from] neo4rs::Error),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("constraint violation: {0}")]
    Constraint(String),
}

/// Failures reading or writing the review queue store.
#[derive(Error, Debug)]
pub enum ReviewQueueError {
    #[error("review queue storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("review item not found: {0}")]
    NotFound(String),
}

/// The error type returned by everything built on top of the EDGAR fetch layer:
/// extractors, the graph loader, signal/risk/sanctions analysis, and the scheduler.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Edgar(#[from] EdgarError),

    #[error(transparent)]
    Ofac(#[from] OfacError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    ReviewQueue(#[from] ReviewQueueError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
