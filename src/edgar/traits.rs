//! Trait definitions organizing EDGAR operations by feature area.
//!
//! The fetch layer uses traits to logically group related functionality into
//! domains: company information, filings, and search. Each feature has a
//! corresponding trait that the `Edgar` client implements when that feature
//! is enabled.
//!
//! This design allows for:
//! - Clear separation of concerns
//! - Feature-gated compilation (only include what you need)
//! - Easy mocking and testing
//! - Discoverable API through trait methods
//!
//! Users typically interact with the `Edgar` struct directly rather than through
//! trait objects, but the traits are useful for understanding the API surface and
//! for testing scenarios where you want to provide alternative implementations.

#[cfg(feature = "company")]
use super::company::CompanyTicker;
use crate::error::Result;
#[cfg(feature = "filings")]
use super::filings::{DetailedFiling, DirectoryResponse, Submission};
#[cfg(any(feature = "filings"))]
use super::options::FilingOptions;
#[cfg(feature = "search")]
use super::search::{Hit, SearchOptions, SearchResponse};
use async_trait::async_trait;

/// Operations for resolving company tickers and CIKs.
///
/// Company data is retrieved from SEC's ticker-mapping endpoint, which covers
/// ticker symbol to CIK resolution — the lookup almost every other EDGAR
/// operation needs as its starting point.
#[cfg(feature = "company")]
#[async_trait]
pub trait CompanyOperations {
    /// Retrieves a list of all company tickers from EDGAR.
    async fn company_tickers(&self) -> Result<Vec<CompanyTicker>>;
    /// Retrieves the Central Index Key (CIK) for a given company ticker symbol.
    async fn company_cik(&self, ticker: &str) -> Result<u64>;
}

/// Operations for accessing SEC filings and related documents.
///
/// This trait provides comprehensive access to company filings including submissions
/// data, filing directories, and document content. It supports retrieving recent
/// filings, latest filings of specific types, and generating URLs for text filings
/// and SGML headers.
///
/// Filing operations are the core of most EDGAR use cases, enabling you to discover
/// what a company has filed and retrieve the actual filing documents for analysis.
#[cfg(feature = "filings")]
#[async_trait]
pub trait FilingOperations {
    /// Retrieves all submissions for a specific company identified by CIK.
    async fn submissions(&self, cik: &str) -> Result<Submission>;
    /// Helper function to get recent filings in a form of a Vec.
    async fn get_recent_filings(&self, cik: &str) -> Result<Vec<DetailedFiling>>;
    /// Retrieves a list of filings for a specific company identified by CIK.
    async fn filings(&self, cik: &str, opts: Option<FilingOptions>) -> Result<Vec<DetailedFiling>>;
    /// Retrieves the directory structure for a specific filing.
    async fn filing_directory(
        &self,
        cik: &str,
        accession_number: &str,
    ) -> Result<DirectoryResponse>;
    /// Retrieves the directory structure for a specific entity.
    async fn entity_directory(&self, cik: &str) -> Result<DirectoryResponse>;
    /// Constructs a filing URL from a combined filing ID (format: "accession_number:filename")
    fn get_filing_url_from_id(&self, cik: &str, filing_id: &str) -> Result<String>;
    /// Fetches a filing's content directly using its URL
    async fn get_filing_content_by_id(&self, cik: &str, filing_id: &str) -> Result<String>;
    /// Fetches the latest filing for a company matching one of the requested form types.
    ///
    /// Use this when you want “latest 10-Q **or** 10-K”, etc. The forms are applied as a filter,
    /// and the newest matching filing (as returned by the SEC) is downloaded.
    async fn get_latest_filing_content(&self, cik: &str, form_types: &[&str]) -> Result<String>;
    /// Generates URLs for text filings with original SEC.gov links based on specified options without downloading content
    async fn get_text_filing_links(
        &self,
        cik: &str,
        opts: Option<FilingOptions>,
    ) -> Result<Vec<(DetailedFiling, String, String)>>;
    /// Generates URLs for SGML header files with original SEC.gov links based on specified options without downloading content
    async fn get_sgml_header_links(
        &self,
        cik: &str,
        opts: Option<FilingOptions>,
    ) -> Result<Vec<(DetailedFiling, String, String)>>;
}

/// Operations for searching EDGAR filings with flexible criteria.
///
/// The search trait provides access to SEC's full-text search capabilities, allowing
/// you to find filings by keywords, form types, dates, companies, and other attributes.
/// It supports both single-page queries and comprehensive multi-page retrieval.
///
/// Search is particularly useful when you need to find filings based on content or
/// when you don't know exact identifiers. The search system indexes filing text,
/// metadata, and company information for comprehensive discoverability.
#[cfg(feature = "search")]
#[async_trait]
pub trait SearchOperations {
    /// Performs a search query on EDGAR
    async fn search(&self, options: SearchOptions) -> Result<SearchResponse>;
    /// Performs a search query and fetches all available pages
    async fn search_all(&self, options: SearchOptions) -> Result<Vec<Hit>>;
}
