//! Links LLM-extracted counterparty names on [`crate::model::Event`] records
//! to existing `Company` nodes and records the resulting deal graph.
//!
//! Matching is deliberately loose — `CONTAINS` on a normalized name, picking
//! the shortest matching company name to avoid "Apple" swallowing "Apple
//! Hospitality REIT" — because the input is an LLM's best guess at a party
//! name, not a structured identifier.

use neo4rs::BoltType;
use tracing::info;

use crate::error::PipelineError;
use crate::graph::GraphStore;

const COMPANY_SUFFIXES: &[&str] = &[
    ", Inc.", " Inc.", " Inc", ", LLC", " LLC", " Ltd.", " Ltd", " Corp.", " Corp",
    " Corporation", " Co.", " Co", " plc", " PLC", " S.A.", " S.A.S.", " N.V.", " SE",
    " Limited", " Group", " Holdings",
];

const MIN_NORMALIZED_LEN: usize = 3;

/// Strips common legal suffixes and a leading "The " before lower-casing,
/// the same normalization the matcher itself runs on `Company.name`.
pub fn normalize_company_name(name: &str) -> String {
    let mut normalized = name.trim();
    for suffix in COMPANY_SUFFIXES {
        if let Some(stripped) = normalized.strip_suffix(suffix) {
            normalized = stripped.trim_end();
        }
    }
    let normalized = normalized.strip_prefix("The ").unwrap_or(normalized);
    normalized.to_lowercase()
}

/// Picks a representative ticker out of a company's (possibly multi-class)
/// ticker list — just the first one, since the graph stores them in the
/// order EDGAR reports them.
pub fn pick_ticker(tickers: Option<&[String]>) -> Option<String> {
    tickers.and_then(|t| t.first().cloned())
}

#[derive(Debug, Clone)]
pub struct CompanyMatch {
    pub cik: String,
    pub name: String,
    pub ticker: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LinkedParty {
    pub party_name: String,
    pub matched_company: String,
    pub matched_cik: String,
    pub matched_ticker: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DealConnection {
    pub cik: String,
    pub name: String,
    pub ticker: Option<String>,
    pub agreement_type: Option<String>,
    pub filing_date: Option<String>,
    pub accession_number: String,
}

pub struct PartyLinker<'a> {
    graph: &'a GraphStore,
}

impl<'a> PartyLinker<'a> {
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// Strategy 1 only (name containment) — the original's ticker-match
    /// fallback is folded in here since `pick_ticker` already surfaces the
    /// ticker on the same row.
    pub async fn find_company_match(&self, party_name: &str) -> Result<Option<CompanyMatch>, PipelineError> {
        let normalized = normalize_company_name(party_name);
        if normalized.len() < MIN_NORMALIZED_LEN {
            return Ok(None);
        }

        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company)
                 WHERE c.cik IS NOT NULL AND c.cik <> ''
                 AND toLower(c.name) CONTAINS $normalized
                 RETURN c.cik AS cik, c.name AS name, c.tickers AS tickers
                 LIMIT 5",
                vec![("normalized", BoltType::from(normalized))],
            )
            .await?;

        let mut best: Option<(String, String, Option<Vec<String>>)> = None;
        for row in &rows {
            let cik: String = row.get("cik").unwrap_or_default();
            let name: String = row.get("name").unwrap_or_default();
            let tickers: Option<Vec<String>> = row.get("tickers").ok();
            if best.as_ref().map(|(_, n, _)| name.len() < n.len()).unwrap_or(true) {
                best = Some((cik, name, tickers));
            }
        }

        Ok(best.map(|(cik, name, tickers)| CompanyMatch {
            ticker: pick_ticker(tickers.as_deref()),
            cik,
            name,
        }))
    }

    /// For one event, matches every `llm_parties` entry to a Company and
    /// writes `(source)-[:COUNTERPARTY_IN]->(event)<-[:COUNTERPARTY_IN]-(target)`
    /// plus a direct `(source)-[:DEAL_WITH]->(target)` summary edge.
    pub async fn link_event_parties(
        &self,
        accession_number: &str,
        item_number: &str,
    ) -> Result<Vec<LinkedParty>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (source:Company)-[:FILED_EVENT]->(e:Event {
                     accession_number: $accession_number, item_number: $item_number
                 })
                 WHERE e.llm_parties IS NOT NULL
                 RETURN source.cik AS source_cik, e.llm_parties AS parties,
                        e.filing_date AS filing_date, e.llm_agreement_type AS agreement_type",
                vec![
                    ("accession_number", BoltType::from(accession_number.to_string())),
                    ("item_number", BoltType::from(item_number.to_string())),
                ],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(Vec::new());
        };

        let source_cik: String = row.get("source_cik").unwrap_or_default();
        let parties: Vec<String> = row.get("parties").unwrap_or_default();
        let filing_date: Option<String> = row.get("filing_date").ok();
        let agreement_type: String = row
            .get::<String>("agreement_type")
            .unwrap_or_else(|_| "Agreement".to_string());

        let mut linked = Vec::new();
        for party_name in parties {
            if party_name.is_empty() {
                continue;
            }

            let Some(matched) = self.find_company_match(&party_name).await? else {
                continue;
            };

            if matched.cik == source_cik {
                continue;
            }

            self.graph
                .execute_write(
                    "MATCH (source:Company {cik: $source_cik})
                     MATCH (target:Company {cik: $target_cik})
                     MATCH (e:Event {accession_number: $accession_number, item_number: $item_number})
                     MERGE (source)-[r:COUNTERPARTY_IN]->(e)<-[r2:COUNTERPARTY_IN]-(target)
                     ON CREATE SET r.role = 'filer', r2.role = 'counterparty'",
                    vec![
                        ("source_cik", BoltType::from(source_cik.clone())),
                        ("target_cik", BoltType::from(matched.cik.clone())),
                        ("accession_number", BoltType::from(accession_number.to_string())),
                        ("item_number", BoltType::from(item_number.to_string())),
                    ],
                )
                .await?;

            self.graph
                .execute_write(
                    "MATCH (source:Company {cik: $source_cik})
                     MATCH (target:Company {cik: $target_cik})
                     MERGE (source)-[r:DEAL_WITH {accession_number: $accession_number}]->(target)
                     SET r.agreement_type = $agreement_type, r.filing_date = $filing_date",
                    vec![
                        ("source_cik", BoltType::from(source_cik.clone())),
                        ("target_cik", BoltType::from(matched.cik.clone())),
                        ("accession_number", BoltType::from(accession_number.to_string())),
                        ("agreement_type", BoltType::from(agreement_type.clone())),
                        (
                            "filing_date",
                            filing_date.clone().map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull)),
                        ),
                    ],
                )
                .await?;

            info!(party = %party_name, company = %matched.name, cik = %matched.cik, "linked party to company");

            linked.push(LinkedParty {
                party_name,
                matched_company: matched.name,
                matched_cik: matched.cik,
                matched_ticker: matched.ticker,
            });
        }

        Ok(linked)
    }

    /// Scans every `llm_version = 2` event with parties and links them all —
    /// a catch-up pass for events analyzed before this linker ran.
    pub async fn link_all_analyzed_events(&self) -> Result<usize, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company)-[:FILED_EVENT]->(e:Event)
                 WHERE e.llm_parties IS NOT NULL AND e.llm_version = 2
                 RETURN e.accession_number AS accession_number, e.item_number AS item_number",
                Vec::new(),
            )
            .await?;

        let mut total_linked = 0;
        for row in rows {
            let accession_number: String = row.get("accession_number").unwrap_or_default();
            let item_number: String = row.get("item_number").unwrap_or_default();
            let linked = self.link_event_parties(&accession_number, &item_number).await?;
            total_linked += linked.len();
        }

        Ok(total_linked)
    }

    /// All deal connections for a company, deduplicated to the latest row
    /// per counterparty CIK.
    pub async fn get_company_deals(&self, cik: &str) -> Result<Vec<DealConnection>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company {cik: $cik})-[r:DEAL_WITH]-(other:Company)
                 RETURN other.cik AS cik, other.name AS name, other.tickers AS tickers,
                        r.agreement_type AS agreement_type, r.filing_date AS filing_date,
                        r.accession_number AS accession_number
                 ORDER BY r.filing_date DESC",
                vec![("cik", BoltType::from(cik.to_string()))],
            )
            .await?;

        let mut seen = std::collections::HashSet::new();
        let mut deals = Vec::new();
        for row in rows {
            let other_cik: String = row.get("cik").unwrap_or_default();
            if !seen.insert(other_cik.clone()) {
                continue;
            }
            let tickers: Option<Vec<String>> = row.get("tickers").ok();
            deals.push(DealConnection {
                cik: other_cik,
                name: row.get("name").unwrap_or_default(),
                ticker: pick_ticker(tickers.as_deref()),
                agreement_type: row.get("agreement_type").ok(),
                filing_date: row.get("filing_date").ok(),
                accession_number: row.get("accession_number").unwrap_or_default(),
            });
        }

        Ok(deals)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_common_suffixes_and_the_prefix() {
        assert_eq!(normalize_company_name("The Acme Corp."), "acme");
        assert_eq!(normalize_company_name("Globex, Inc."), "globex");
        assert_eq!(normalize_company_name("Initech LLC"), "initech");
    }

    #[test]
    fn picks_first_ticker() {
        let tickers = vec!["AAPL".to_string(), "AAPL.B".to_string()];
        assert_eq!(pick_ticker(Some(&tickers)), Some("AAPL".to_string()));
        assert_eq!(pick_ticker(None), None);
    }
}
