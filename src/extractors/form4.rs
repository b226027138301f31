//! Parses Form 4 (insider ownership) XML into a typed transaction list.
//!
//! Pre-2005 Form 4s were filed as HTML, not XML; [`Form4Parser::parse`] skips
//! anything that doesn't start with an XML declaration or `<ownershipDocument>`
//! rather than attempting HTML parsing, mirroring the upstream filter. Unlike
//! most extractors in this module, a Form 4's natural unit is the whole filing
//! (issuer + insider + every transaction), so this one returns `Form4Result`
//! directly instead of wrapping records in `ExtractionResult`.

use serde::{Deserialize, Serialize};

use crate::error::{ExtractionError, PipelineError};

fn transaction_type_name(code: &str) -> &'static str {
    match code {
        "P" => "Purchase",
        "S" => "Sale",
        "A" => "Award",
        "M" => "Exercise",
        "F" => "Tax",
        "G" => "Gift",
        "D" => "Disposition",
        "C" => "Conversion",
        "W" => "Acquisition Due to Will/Inheritance",
        "J" => "Other",
        "K" => "Equity Swap",
        "U" => "Tender of Shares",
        "I" => "Discretionary Transaction",
        _ => "Unknown",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InsiderInfo {
    pub name: String,
    pub cik: String,
    pub title: String,
    pub is_officer: bool,
    pub is_director: bool,
    pub is_ten_percent_owner: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Form4Transaction {
    pub security_title: String,
    pub transaction_date: String,
    pub transaction_code: String,
    pub transaction_type: String,
    pub shares: f64,
    pub price_per_share: f64,
    pub total_value: f64,
    pub shares_after_transaction: f64,
    pub ownership_type: String,
    pub is_derivative: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Form4Result {
    pub issuer_cik: String,
    pub issuer_name: String,
    pub insider: InsiderInfo,
    pub accession_number: String,
    pub filing_date: String,
    pub transactions: Vec<Form4Transaction>,
    pub warnings: Vec<String>,
}

impl Form4Result {
    /// Net share change across all transactions: positive is net buying.
    /// P/A/M/C/W add shares; S/F/G/D subtract them.
    pub fn net_shares(&self) -> f64 {
        self.transactions
            .iter()
            .map(|t| match t.transaction_code.as_str() {
                "P" | "A" | "M" | "C" | "W" => t.shares,
                "S" | "F" | "G" | "D" => -t.shares,
                _ => 0.0,
            })
            .sum()
    }

    pub fn has_purchases(&self) -> bool {
        self.transactions.iter().any(|t| t.transaction_code == "P")
    }

    pub fn has_sales(&self) -> bool {
        self.transactions.iter().any(|t| t.transaction_code == "S")
    }

    pub fn total_purchase_value(&self) -> f64 {
        self.transactions
            .iter()
            .filter(|t| t.transaction_code == "P")
            .map(|t| t.total_value)
            .sum()
    }
}

pub struct Form4Parser;

impl Default for Form4Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Form4Parser {
    pub fn new() -> Self {
        Self
    }

    /// Returns `Ok(None)` (not an error) for pre-XML HTML Form 4s and for a
    /// document with no reporting owner — both are "nothing to extract,"
    /// not a fetch or parse failure.
    pub fn parse(
        &self,
        xml_content: &str,
        accession_number: &str,
        filing_date: &str,
    ) -> Result<Option<Form4Result>, PipelineError> {
        let stripped = xml_content.trim_start();
        if !stripped.starts_with("<?xml") && !stripped.starts_with("<ownershipDocument") {
            return Ok(None);
        }

        let doc: RawOwnershipDocument = quick_xml::de::from_str(xml_content)
            .map_err(|e| PipelineError::from(ExtractionError::Xml(e)))?;

        let Some(owner) = doc.reporting_owner else {
            return Ok(None);
        };
        let Some(name) = owner
            .id
            .as_ref()
            .and_then(|i| i.name.clone())
            .filter(|n| !n.is_empty())
        else {
            return Ok(None);
        };

        let cik = owner.id.as_ref().and_then(|i| i.cik.clone()).unwrap_or_default();
        let rel = owner.relationship;
        let insider = InsiderInfo {
            name,
            cik,
            title: rel.as_ref().and_then(|r| r.officer_title.clone()).unwrap_or_default(),
            is_officer: rel.as_ref().map(|r| r.is_officer.as_deref() == Some("1")).unwrap_or(false),
            is_director: rel.as_ref().map(|r| r.is_director.as_deref() == Some("1")).unwrap_or(false),
            is_ten_percent_owner: rel
                .as_ref()
                .map(|r| r.is_ten_percent_owner.as_deref() == Some("1"))
                .unwrap_or(false),
        };

        let mut transactions = Vec::new();
        if let Some(table) = &doc.non_derivative_table {
            for raw in &table.transactions {
                if let Some(txn) = parse_transaction(raw, false) {
                    transactions.push(txn);
                }
            }
        }
        if let Some(table) = &doc.derivative_table {
            for raw in &table.transactions {
                if let Some(txn) = parse_transaction(raw, true) {
                    transactions.push(txn);
                }
            }
        }

        Ok(Some(Form4Result {
            issuer_cik: doc.issuer.cik.unwrap_or_default(),
            issuer_name: doc.issuer.name.unwrap_or_default(),
            insider,
            accession_number: accession_number.to_string(),
            filing_date: filing_date.to_string(),
            transactions,
            warnings: Vec::new(),
        }))
    }
}

fn parse_transaction(raw: &RawTransaction, is_derivative: bool) -> Option<Form4Transaction> {
    let code = raw.coding.as_ref()?.transaction_code.clone()?;
    if code.is_empty() {
        return None;
    }
    let shares = raw
        .amounts
        .as_ref()
        .and_then(|a| a.shares.as_ref())
        .and_then(|v| v.value)
        .unwrap_or(0.0);
    let price = raw
        .amounts
        .as_ref()
        .and_then(|a| a.price_per_share.as_ref())
        .and_then(|v| v.value)
        .unwrap_or(0.0);
    let shares_after = raw
        .post_amounts
        .as_ref()
        .and_then(|a| a.shares_owned_following.as_ref())
        .and_then(|v| v.value)
        .unwrap_or(0.0);
    let ownership_type = raw
        .ownership_nature
        .as_ref()
        .and_then(|o| o.direct_or_indirect.as_ref())
        .and_then(|v| v.value.clone())
        .unwrap_or_else(|| "D".to_string());

    Some(Form4Transaction {
        security_title: raw
            .security_title
            .as_ref()
            .and_then(|v| v.value.clone())
            .unwrap_or_else(|| "Unknown".to_string()),
        transaction_date: raw
            .transaction_date
            .as_ref()
            .and_then(|v| v.value.clone())
            .unwrap_or_default(),
        transaction_type: transaction_type_name(&code).to_string(),
        transaction_code: code,
        shares,
        price_per_share: price,
        total_value: shares * price,
        shares_after_transaction: shares_after,
        ownership_type,
        is_derivative,
    })
}

// --- quick-xml serde shapes ---

#[derive(Debug, Deserialize)]
#[serde(rename = "ownershipDocument")]
struct RawOwnershipDocument {
    issuer: RawIssuer,
    #[serde(rename = "reportingOwner", default)]
    reporting_owner: Option<RawOwner>,
    #[serde(rename = "nonDerivativeTable", default)]
    non_derivative_table: Option<RawTransactionTable>,
    #[serde(rename = "derivativeTable", default)]
    derivative_table: Option<RawTransactionTable>,
}

#[derive(Debug, Deserialize)]
struct RawIssuer {
    #[serde(rename = "issuerCik", default)]
    cik: Option<String>,
    #[serde(rename = "issuerName", default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOwner {
    #[serde(rename = "reportingOwnerId", default)]
    id: Option<RawOwnerId>,
    #[serde(rename = "reportingOwnerRelationship", default)]
    relationship: Option<RawOwnerRelationship>,
}

#[derive(Debug, Deserialize)]
struct RawOwnerId {
    #[serde(rename = "rptOwnerName", default)]
    name: Option<String>,
    #[serde(rename = "rptOwnerCik", default)]
    cik: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawOwnerRelationship {
    #[serde(rename = "isOfficer", default)]
    is_officer: Option<String>,
    #[serde(rename = "isDirector", default)]
    is_director: Option<String>,
    #[serde(rename = "isTenPercentOwner", default)]
    is_ten_percent_owner: Option<String>,
    #[serde(rename = "officerTitle", default)]
    officer_title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawTransactionTable {
    #[serde(rename = "$value", default)]
    transactions: Vec<RawTransaction>,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    #[serde(rename = "securityTitle", default)]
    security_title: Option<RawValue<String>>,
    #[serde(rename = "transactionDate", default)]
    transaction_date: Option<RawValue<String>>,
    #[serde(rename = "transactionCoding", default)]
    coding: Option<RawCoding>,
    #[serde(rename = "transactionAmounts", default)]
    amounts: Option<RawAmounts>,
    #[serde(rename = "postTransactionAmounts", default)]
    post_amounts: Option<RawPostAmounts>,
    #[serde(rename = "ownershipNature", default)]
    ownership_nature: Option<RawOwnershipNature>,
}

#[derive(Debug, Deserialize)]
struct RawCoding {
    #[serde(rename = "transactionCode", default)]
    transaction_code: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAmounts {
    #[serde(rename = "transactionShares", default)]
    shares: Option<RawValue<f64>>,
    #[serde(rename = "transactionPricePerShare", default)]
    price_per_share: Option<RawValue<f64>>,
}

#[derive(Debug, Deserialize)]
struct RawPostAmounts {
    #[serde(rename = "sharesOwnedFollowingTransaction", default)]
    shares_owned_following: Option<RawValue<f64>>,
}

#[derive(Debug, Deserialize)]
struct RawOwnershipNature {
    #[serde(rename = "directOrIndirectOwnership", default)]
    direct_or_indirect: Option<RawValue<String>>,
}

#[derive(Debug, Deserialize)]
struct RawValue<T> {
    value: Option<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<ownershipDocument>
  <issuer>
    <issuerCik>0000320193</issuerCik>
    <issuerName>Apple Inc.</issuerName>
  </issuer>
  <reportingOwner>
    <reportingOwnerId>
      <rptOwnerName>Doe Jane</rptOwnerName>
      <rptOwnerCik>0001234567</rptOwnerCik>
    </reportingOwnerId>
    <reportingOwnerRelationship>
      <isOfficer>1</isOfficer>
      <isDirector>0</isDirector>
      <isTenPercentOwner>0</isTenPercentOwner>
      <officerTitle>Chief Financial Officer</officerTitle>
    </reportingOwnerRelationship>
  </reportingOwner>
  <nonDerivativeTable>
    <nonDerivativeTransaction>
      <securityTitle><value>Common Stock</value></securityTitle>
      <transactionDate><value>2026-01-15</value></transactionDate>
      <transactionCoding>
        <transactionCode>P</transactionCode>
      </transactionCoding>
      <transactionAmounts>
        <transactionShares><value>1000</value></transactionShares>
        <transactionPricePerShare><value>150.25</value></transactionPricePerShare>
      </transactionAmounts>
      <postTransactionAmounts>
        <sharesOwnedFollowingTransaction><value>5000</value></sharesOwnedFollowingTransaction>
      </postTransactionAmounts>
      <ownershipNature>
        <directOrIndirectOwnership><value>D</value></directOrIndirectOwnership>
      </ownershipNature>
    </nonDerivativeTransaction>
  </nonDerivativeTable>
</ownershipDocument>"#;

    #[test]
    fn skips_non_xml_content() {
        let parser = Form4Parser::new();
        let result = parser
            .parse("This is an HTML Form 4 from 1998", "0001234567-99-000001", "1999-01-01")
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn parses_purchase_transaction() {
        let parser = Form4Parser::new();
        let result = parser
            .parse(SAMPLE, "0001234567-26-000001", "2026-01-15")
            .unwrap()
            .expect("expected a parsed Form4Result");
        assert_eq!(result.issuer_cik, "0000320193");
        assert_eq!(result.transactions.len(), 1);
        let txn = &result.transactions[0];
        assert_eq!(txn.transaction_code, "P");
        assert_eq!(txn.transaction_type, "Purchase");
        assert_eq!(txn.shares, 1000.0);
        assert_eq!(txn.total_value, 150_250.0);
        assert!(!txn.is_derivative);
        assert!(result.has_purchases());
        assert!(!result.has_sales());
        assert_eq!(result.net_shares(), 1000.0);
        assert_eq!(result.total_purchase_value(), 150_250.0);
    }

    #[test]
    fn net_shares_mixes_purchases_and_sales() {
        let mut result = Form4Parser::new()
            .parse(SAMPLE, "acc", "2026-01-15")
            .unwrap()
            .unwrap();
        result.transactions.push(Form4Transaction {
            security_title: "Common Stock".to_string(),
            transaction_date: "2026-02-01".to_string(),
            transaction_code: "S".to_string(),
            transaction_type: "Sale".to_string(),
            shares: 400.0,
            price_per_share: 160.0,
            total_value: 64_000.0,
            shares_after_transaction: 4600.0,
            ownership_type: "D".to_string(),
            is_derivative: false,
        });
        assert_eq!(result.net_shares(), 600.0);
        assert!(result.has_sales());
    }

    #[test]
    fn transaction_type_name_maps_known_codes() {
        assert_eq!(transaction_type_name("M"), "Exercise");
        assert_eq!(transaction_type_name("Z"), "Unknown");
    }
}
