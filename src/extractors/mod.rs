//! Rule-based (LLM-fallback) extractors turning filing HTML/XML into typed,
//! cited records.
//!
//! Every extractor returns an [`ExtractionResult<T>`] rather than propagating
//! failure through `Result`'s `?`: a filing that yields nothing, or yields
//! low-confidence records, is a per-filing condition recovered locally (enqueued
//! to [`crate::review_queue`]), not a whole-operation error. The whole-operation
//! `Result<_, PipelineError>` is reserved for "couldn't fetch the filing at all."

pub mod event;
pub mod form4;
pub mod officer;
pub mod ownership;
pub mod subsidiary;

pub use event::EventParser;
pub use form4::{Form4Parser, Form4Result, Form4Transaction};
pub use officer::{Officer, OfficerParser};
pub use ownership::{OwnershipParser, OwnershipRecord};
pub use subsidiary::{Subsidiary, SubsidiaryParser};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::PipelineError;

/// How an extraction result was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    RuleBased,
    Llm,
    Hybrid,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractionMetadata {
    pub method: ExtractionMethod,
    pub confidence: f64,
    pub source_filing_id: Option<String>,
    pub source_url: Option<String>,
    pub section_name: Option<String>,
    pub table_name: Option<String>,
}

/// The uniform return shape for every extractor. `warnings` carries
/// `ExtractionFailure`/`LowConfidence` conditions as data rather than as `Err`
/// variants — see `crate::error`'s module doc for why.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionResult<T> {
    pub records: Vec<T>,
    pub metadata: ExtractionMetadata,
    pub warnings: Vec<String>,
    pub filing_date: Option<String>,
    pub filing_url: Option<String>,
}

impl<T> ExtractionResult<T> {
    pub fn empty(method: ExtractionMethod) -> Self {
        Self {
            records: Vec::new(),
            metadata: ExtractionMetadata {
                method,
                confidence: 0.0,
                source_filing_id: None,
                source_url: None,
                section_name: None,
                table_name: None,
            },
            warnings: Vec::new(),
            filing_date: None,
            filing_url: None,
        }
    }
}

/// Confidence threshold below which a successful extraction is still flagged
/// for review (but still loaded into the graph — see `error`'s `LowConfidence`
/// doc comment).
pub const LLM_CONFIDENCE_THRESHOLD: f64 = 0.9;

/// Opaque LLM fallback used when rule-based parsing is insufficient. Extractors
/// depend on this trait, not a concrete client, so tests can supply a canned
/// responder.
#[async_trait]
pub trait TextAnalyzer: Send + Sync {
    async fn analyze(&self, prompt: &str) -> Result<serde_json::Value, PipelineError>;
}

/// Truncates a source-text snippet to the extractor record limit (300 chars).
pub fn truncate_snippet(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

/// Parses a percentage-like string: strips `%`, treats `-`/`—`/`*`/`N/A` as
/// null, maps "less than 1%" and a bare footnote asterisk to `0.5`, and
/// discards (rather than clamps) anything outside `[0, 100]`.
pub fn parse_percentage(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed == "-"
        || trimmed == "—"
        || trimmed == "*"
        || trimmed.eq_ignore_ascii_case("n/a")
    {
        return None;
    }
    let lower = trimmed.to_lowercase();
    if lower.contains("less than 1") {
        return Some(0.5);
    }
    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return Some(0.5); // bare footnote marker paired with value 1
    }
    let value: f64 = cleaned.parse().ok()?;
    if (0.0..=100.0).contains(&value) {
        Some(value)
    } else {
        None
    }
}

/// Parses a shares/number-like string: strips commas, treats dash variants and
/// `N/A` as null.
pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" || trimmed == "—" || trimmed == "*" || trimmed.eq_ignore_ascii_case("n/a") {
        return None;
    }
    let cleaned: String = trimmed.chars().filter(|c| *c != ',').collect();
    cleaned.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_percentage_variants() {
        assert_eq!(parse_percentage("8.2%"), Some(8.2));
        assert_eq!(parse_percentage("8.2 percent"), Some(8.2));
        assert_eq!(parse_percentage("less than 1%"), Some(0.5));
        assert_eq!(parse_percentage("-"), None);
        assert_eq!(parse_percentage("N/A"), None);
        assert_eq!(parse_percentage("150%"), None);
    }

    #[test]
    fn parse_number_strips_commas() {
        assert_eq!(parse_number("1,234,567"), Some(1_234_567.0));
        assert_eq!(parse_number("—"), None);
    }
}
