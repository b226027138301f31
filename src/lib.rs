//! # filingwatch - a financial-intelligence pipeline over SEC EDGAR and OFAC
//!
//! `filingwatch` ingests SEC EDGAR disclosures (8-K material events, Form 4 insider
//! transactions, DEF 14A proxy statements, 10-K Exhibit 21 subsidiary lists) plus the
//! OFAC SDN sanctions list, extracts typed records with full source-text provenance,
//! loads them into a property graph, and derives three classes of signal: M&A-indicative
//! filing signals, insider-buying clusters, and risk/sanctions exposure via graph
//! traversal.
//!
//! ## Layout
//!
//! - [`edgar`] / [`ofac`] — rate-limited fetch layers for the two upstream sources.
//! - [`extractors`] — rule-based (LLM-fallback) parsers turning filings into typed,
//!   cited records.
//! - [`name_validator`] — rejects table-header/company-suffix/sentence strings
//!   mistakenly captured as person names.
//! - [`review_queue`] — persists failed and low-confidence extractions for human review.
//! - [`graph`] / [`entity_loader`] / [`party_linker`] — the citation-preserving graph
//!   loader.
//! - [`signals`] — 8-K item classification, insider trade classification and cluster
//!   detection, and the combined signal feed.
//! - [`connections`] / [`risk`] / [`sanctions`] — graph-traversal analysis services.
//! - [`accuracy`] — retroactive scoring of past signals against subsequent price moves.
//! - [`scheduler`] / [`alerts`] — the checkpointed incremental scanner and alert store.
//!
//! ## Basic usage
//!
//! ```rust
//! use filingwatch::edgar::{Edgar, FilingOperations, FilingOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Edgar::new("filingwatch/0.1 contact@example.com")?;
//!     let options = FilingOptions::new().with_form_type("8-K").with_limit(5);
//!     let filings = client.filings("320193", Some(options)).await?;
//!     for filing in filings {
//!         println!("Filing: {} on {}", filing.form, filing.filing_date);
//!     }
//!     Ok(())
//! }
//! ```

pub mod accuracy;
pub mod alerts;
pub mod config;
pub mod connections;
pub mod entity_loader;
pub mod error;
pub mod evidence;
pub mod extractors;
pub mod graph;
pub mod model;
pub mod name_validator;
pub mod ofac;
pub mod party_linker;
pub mod review_queue;
pub mod risk;
pub mod sanctions;
pub mod scheduler;
pub mod signals;

/// The SEC EDGAR fetch layer, carried over from the EdgarKit lineage this crate grew
/// out of: rate limiting, submissions/filings/search, and ticker resolution.
pub mod edgar {
    mod company;
    mod core;
    mod discovery;
    mod filings;
    mod options;
    mod search;
    mod traits;

    pub use company::CompanyTicker;
    pub use core::Edgar;
    pub use discovery::{
        DiscoveredFiler, TickerMatch, discover_filers, score_candidate,
        search_companies_by_ticker_or_name, strip_parentheticals,
    };
    pub use filings::{DetailedFiling, Directory, DirectoryItem, DirectoryResponse, Submission};
    pub use options::FilingOptions;
    pub use search::{Hit, Hits, SearchOptions, SearchResponse, TotalHits};
    pub use traits::{CompanyOperations, FilingOperations, SearchOperations};
}

pub use config::Config;
pub use error::{EdgarError, PipelineError, Result};

/// Current crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
