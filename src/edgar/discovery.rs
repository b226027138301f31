//! Filer discovery: turns a raw ticker/name query or a full-text-search sweep
//! into candidate companies, scored the way a human triaging search results
//! would — an exact ticker hit always outranks a name substring match.
//!
//! Built on top of [`super::SearchOperations::search_all`] and
//! [`super::CompanyOperations::company_tickers`] rather than any new HTTP
//! plumbing: this module is pure scoring and shaping over what the rest of
//! the `edgar` module already fetches.

use crate::error::Result;

use super::{CompanyTicker, Hit, SearchOperations, SearchOptions};

/// Strips a trailing `(...)` parenthetical off a company name, e.g.
/// `"Apple Inc (AAPL)"` -> `"Apple Inc"`. EFTS display names sometimes carry
/// the ticker this way; callers that want the bare legal name use this
/// before matching.
pub fn strip_parentheticals(name: &str) -> String {
    match name.find('(') {
        Some(idx) => name[..idx].trim().to_string(),
        None => name.trim().to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct TickerMatch {
    pub cik: u64,
    pub ticker: String,
    pub title: String,
    pub score: u32,
}

/// Weighted scoring table: exact ticker match dominates everything else,
/// since a user typing a ticker almost always means that exact company.
pub fn score_candidate(query: &str, candidate: &CompanyTicker) -> u32 {
    let q = query.trim().to_uppercase();
    let ticker = candidate.ticker.to_uppercase();
    let title = candidate.title.to_uppercase();

    if ticker == q {
        1000
    } else if ticker.starts_with(&q) {
        500
    } else if title == q {
        400
    } else if title.starts_with(&q) {
        300
    } else if title.split_whitespace().any(|w| w.starts_with(&q)) {
        200
    } else if title.contains(&q) {
        100
    } else if ticker.contains(&q) {
        50
    } else {
        0
    }
}

/// Scores every candidate against `query`, drops zero-score entries, and
/// sorts highest-scoring first (ties broken by ticker for determinism).
pub fn search_companies_by_ticker_or_name(query: &str, candidates: &[CompanyTicker]) -> Vec<TickerMatch> {
    let mut matches: Vec<TickerMatch> = candidates
        .iter()
        .map(|c| TickerMatch {
            cik: c.cik,
            ticker: c.ticker.clone(),
            title: c.title.clone(),
            score: score_candidate(query, c),
        })
        .filter(|m| m.score > 0)
        .collect();

    matches.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.ticker.cmp(&b.ticker)));
    matches
}

#[derive(Debug, Clone)]
pub struct DiscoveredFiler {
    pub cik: String,
    pub name: String,
    pub form: String,
    pub filing_date: String,
    pub accession_number: String,
    pub sics: Vec<String>,
}

fn hit_to_filer(hit: Hit) -> Option<DiscoveredFiler> {
    let cik = hit._source.ciks.first()?.clone();
    let name = hit._source.display_names.first().map(|n| strip_parentheticals(n)).unwrap_or_default();
    Some(DiscoveredFiler {
        cik,
        name,
        form: hit._source.form,
        filing_date: hit._source.file_date,
        accession_number: hit._source.adsh,
        sics: hit._source.sics,
    })
}

/// Sweeps EDGAR full-text search for every filing of `forms` within
/// `date_range`, paginating through every page via `search_all`, and shapes
/// the hits into [`DiscoveredFiler`] records deduplicated has not been
/// applied here — callers fold by CIK themselves since the scheduler and a
/// one-off report want different dedup granularity.
pub async fn discover_filers<E: SearchOperations>(
    edgar: &E,
    forms: &[&str],
    date_range: (&str, &str),
) -> Result<Vec<DiscoveredFiler>> {
    let options = SearchOptions::new()
        .with_forms(forms.iter().map(|f| f.to_string()).collect())
        .with_date_range(date_range.0.to_string(), date_range.1.to_string())
        .with_count(100);

    let hits = edgar.search_all(options).await?;
    Ok(hits.into_iter().filter_map(hit_to_filer).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ticker(cik: u64, ticker: &str, title: &str) -> CompanyTicker {
        CompanyTicker { cik, ticker: ticker.to_string(), title: title.to_string() }
    }

    #[test]
    fn strip_parentheticals_removes_trailing_ticker_annotation() {
        assert_eq!(strip_parentheticals("Apple Inc (AAPL)"), "Apple Inc");
        assert_eq!(strip_parentheticals("Acme Corp"), "Acme Corp");
    }

    #[test]
    fn exact_ticker_outranks_name_substring() {
        let candidates = vec![
            ticker(1, "ACME", "Totally Different Holdings"),
            ticker(2, "XYZ", "Acme Widget Corp"),
        ];
        let matches = search_companies_by_ticker_or_name("ACME", &candidates);
        assert_eq!(matches[0].ticker, "ACME");
        assert_eq!(matches[0].score, 1000);
    }

    #[test]
    fn scoring_table_orders_ticker_prefix_above_name_prefix() {
        let c1 = ticker(1, "ACMEX", "Other Co");
        let c2 = ticker(2, "ZZZ", "Acme International");
        assert!(score_candidate("ACME", &c1) > score_candidate("ACME", &c2));
    }

    #[test]
    fn zero_score_candidates_are_dropped() {
        let candidates = vec![ticker(1, "ZZZ", "Totally Unrelated")];
        let matches = search_companies_by_ticker_or_name("ACME", &candidates);
        assert!(matches.is_empty());
    }
}
