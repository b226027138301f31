//! Company ticker/CIK resolution.
//!
//! Most requests to other EDGAR endpoints need a CIK; this module bootstraps
//! that lookup from a ticker symbol.

use super::CompanyOperations;
use super::Edgar;
use crate::error::{EdgarError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json;
use std::collections::HashMap;

/// Mapping between stock ticker symbols and company CIKs.
///
/// This structure represents a company's stock ticker along with its Central Index Key
/// (CIK) and official title. The SEC maintains this mapping to help users discover
/// company identifiers for EDGAR queries. Note that companies can have multiple tickers
/// across different exchanges.
#[derive(Debug, Deserialize, Serialize)]
pub struct CompanyTicker {
    #[serde(rename = "cik_str")]
    pub cik: u64,
    pub ticker: String,
    pub title: String,
}

#[async_trait]
impl CompanyOperations for Edgar {
    /// Retrieves a list of company tickers from the SEC EDGAR database.
    ///
    /// This function fetches the company_tickers.json file from the SEC EDGAR database,
    /// which contains information about company tickers, CIK numbers, and company names.
    /// It then parses this data into a vector of `CompanyTicker` structs.
    async fn company_tickers(&self) -> Result<Vec<CompanyTicker>> {
        let url = format!("{}/company_tickers.json", self.edgar_files_url);
        let response = self.get(&url).await?;
        let map: HashMap<String, CompanyTicker> = serde_json::from_str(&response)?;
        Ok(map.into_values().collect())
    }

    /// Retrieves the Central Index Key (CIK) for a given company ticker symbol.
    ///
    /// This function searches for a company's CIK using its ticker symbol. It first fetches
    /// all company tickers and then finds the matching ticker, returning its associated CIK.
    async fn company_cik(&self, ticker: &str) -> Result<u64> {
        let tickers = self.company_tickers().await?;

        let company = tickers
            .iter()
            .find(|t| t.ticker == ticker.to_uppercase())
            .ok_or(EdgarError::TickerNotFound)?;

        Ok(company.cik)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_company_cik() {
        let edgar = Edgar::new("test_agent example@example.com").unwrap();
        let cik = edgar.company_cik("AAPL").await.unwrap();
        assert_eq!(cik, 320193);
    }

    #[tokio::test]
    async fn test_company_cik_not_found() {
        let edgar = Edgar::new("test_agent example@example.com").unwrap();
        let result = edgar.company_cik("INVALID").await;
        assert!(matches!(result, Err(EdgarError::TickerNotFound)));
    }
}
