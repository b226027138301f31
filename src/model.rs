//! Graph node and edge types shared across the extraction, loading, and
//! analysis layers.
//!
//! Every node carries a stable `Uuid` plus a natural key used for MERGE-style
//! upserts; every edge sourced from a filing carries a [`Provenance`] record.
//! These types are the wire format between [`crate::entity_loader`] and
//! [`crate::graph`] — nothing here talks to the graph driver directly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a record or field was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    RuleBased,
    Llm,
    Hybrid,
    Manual,
}

/// Source-text justification attached to every sourced edge and record.
///
/// `raw_text` is truncated by the caller before construction (300 chars for
/// extractor records, 500 for edges, 2000 for OFAC citations — see
/// [`crate::extractors`] and [`crate::ofac`]); this type does not enforce a
/// length itself since the limit is context-dependent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub source_filing: Option<Uuid>,
    pub raw_text: String,
    pub source_section: Option<String>,
    pub source_table: Option<String>,
    pub extraction_method: ExtractionMethod,
    pub confidence: f64,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    pub id: Uuid,
    pub cik: Option<String>,
    pub name: String,
    pub normalized_name: String,
    pub tickers: Vec<String>,
    pub sic: Option<String>,
    pub sic_description: Option<String>,
    pub state_of_incorporation: Option<String>,
    pub jurisdiction: Option<String>,
    pub is_sanctioned: bool,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
    pub id: Uuid,
    pub name: String,
    pub normalized_name: String,
    pub is_pep: bool,
    pub is_sanctioned: bool,
    pub ofac_uid: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filing {
    pub id: Uuid,
    pub accession_number: String,
    pub form_type: String,
    pub filing_date: String,
    pub filing_url: Option<String>,
    pub extraction_method: ExtractionMethod,
    pub extracted_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub accession_number: String,
    pub item_number: String,
    pub filing_date: String,
    pub item_name: String,
    pub signal_type: String,
    pub is_ma_signal: bool,
    pub persons_mentioned: Vec<String>,
    pub raw_text: String,
    pub llm_summary: Option<String>,
    pub llm_agreement_type: Option<String>,
    pub llm_parties: Option<Vec<String>>,
    pub llm_key_terms: Option<Vec<String>>,
    pub llm_forward_looking: Option<bool>,
    pub llm_market_implications: Option<String>,
    pub llm_version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OwnershipType {
    D,
    I,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsiderTransaction {
    pub id: Uuid,
    pub accession_number: String,
    pub index: usize,
    pub transaction_date: String,
    pub transaction_code: char,
    pub transaction_type: String,
    pub security_title: Option<String>,
    pub shares: Option<f64>,
    pub price_per_share: Option<f64>,
    pub total_value: Option<f64>,
    pub shares_after_transaction: Option<f64>,
    pub ownership_type: Option<OwnershipType>,
    pub is_derivative: bool,
    pub insider_name: String,
    pub insider_title: Option<String>,
}

impl InsiderTransaction {
    /// The dedup/natural key: `{accession_number}_{index}`.
    pub fn natural_key(&self) -> String {
        format!("{}_{}", self.accession_number, self.index)
    }
}

/// A registered-office or mailing address, deduplicated on its normalized
/// text so that unrelated companies sharing the same address (a common
/// shell-company signature) collapse onto one node instead of one per filer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub id: Uuid,
    pub normalized_text: String,
    pub raw_text: String,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

/// Collapses an address to its MERGE natural key: trimmed, uppercased,
/// whitespace-collapsed. Deliberately coarse — punctuation and suite-number
/// noise still fold together, which is what makes mass-registration
/// detection work at all.
pub fn normalize_address(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ").trim().to_uppercase()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jurisdiction {
    pub code: String,
    pub name: String,
    pub country: String,
    pub is_secrecy_jurisdiction: bool,
    pub secrecy_score: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SanctionedEntity {
    pub id: Uuid,
    pub ofac_uid: String,
    pub aliases: Vec<String>,
    pub sanction_programs: Vec<String>,
    pub addresses: Vec<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub id_numbers: Vec<String>,
    pub remarks: Option<String>,
    pub source: String,
    pub source_date: Option<String>,
    pub raw_text: String,
    pub raw_text_hash: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub dedup_key: String,
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub company_cik: String,
    pub company_name: String,
    pub ticker: Option<String>,
    pub title: String,
    pub description: String,
    pub created_at: String,
    pub acknowledged: bool,
    pub acknowledged_at: Option<String>,
}

impl Alert {
    /// Builds the dedup natural key: `{cik}_{alert_type}_{YYYY-MM-DD}`.
    pub fn dedup_key(cik: &str, alert_type: &str, date: &str) -> String {
        format!("{cik}_{alert_type}_{date}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    Success,
    PartialSuccess,
    Error,
    SkippedWeekend,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerState {
    pub scanner_id: String,
    pub last_checkpoint: String,
    pub last_run_at: Option<String>,
    pub last_status: Option<ScanStatus>,
    pub total_runs: u64,
    pub total_errors: u64,
    pub last_error: Option<String>,
}

/// Normalizes a company or person name to its graph natural key form:
/// trimmed and uppercased. Used consistently by [`crate::entity_loader`],
/// [`crate::party_linker`], and [`crate::connections`] so lookups agree.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_uppercase()
}

/// Zero-pads a CIK to the 10-digit form used as the Company natural key,
/// stripping any non-digit characters first (dashes, leading zeros already
/// present, etc).
pub fn normalize_cik(cik: &str) -> String {
    let digits: String = cik.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{digits:0>10}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_cik_pads_and_strips() {
        assert_eq!(normalize_cik("320193"), "0000320193");
        assert_eq!(normalize_cik("0000320193"), "0000320193");
        assert_eq!(normalize_cik("CIK0000320193"), "0000320193");
    }

    #[test]
    fn normalize_name_trims_and_upcases() {
        assert_eq!(normalize_name("  Apple Inc.  "), "APPLE INC.");
    }

    #[test]
    fn normalize_address_collapses_whitespace_and_case() {
        assert_eq!(normalize_address("  123  Main   St,\nSuite 400 "), "123 MAIN ST, SUITE 400");
    }

    #[test]
    fn insider_transaction_natural_key() {
        let txn = InsiderTransaction {
            id: Uuid::nil(),
            accession_number: "0001234567-25-000001".to_string(),
            index: 3,
            transaction_date: "2025-01-01".to_string(),
            transaction_code: 'P',
            transaction_type: "Purchase".to_string(),
            security_title: None,
            shares: None,
            price_per_share: None,
            total_value: None,
            shares_after_transaction: None,
            ownership_type: None,
            is_derivative: false,
            insider_name: "Doe Jane".to_string(),
            insider_title: None,
        };
        assert_eq!(txn.natural_key(), "0001234567-25-000001_3");
    }
}
