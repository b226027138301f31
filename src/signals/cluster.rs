//! Detects standalone insider buying clusters directly from Form 4 data —
//! no 8-K required. Clusters of independent purchase decisions often
//! precede material announcements by weeks, making this the most actionable
//! leading indicator the pipeline produces.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, Utc};
use neo4rs::BoltType;

use crate::error::PipelineError;
use crate::graph::GraphStore;
use crate::party_linker::pick_ticker;

use super::trade::{classify_trades_batch, is_bullish_trade};

#[derive(Debug, Clone)]
pub struct BuyerDetail {
    pub name: String,
    pub title: String,
    pub total_value: f64,
    pub trade_count: u32,
}

#[derive(Debug, Clone)]
pub struct InsiderClusterSignal {
    pub cik: String,
    pub company_name: String,
    pub ticker: Option<String>,
    pub window_start: String,
    pub window_end: String,
    pub signal_level: String,
    pub signal_summary: String,
    pub num_buyers: usize,
    pub total_buy_value: f64,
    pub buyers: Vec<BuyerDetail>,
}

impl InsiderClusterSignal {
    pub fn accession_number(&self) -> String {
        format!("CLUSTER-{}-{}", self.cik, self.window_end)
    }
}

fn level_order(level: &str) -> u8 {
    match level {
        "high" => 0,
        "medium" => 1,
        _ => 2,
    }
}

struct TradeRow {
    cik: String,
    company_name: String,
    tickers: Option<Vec<String>>,
    transaction_date: String,
    transaction_code: String,
    total_value: f64,
    insider_name: String,
    insider_title: String,
}

pub struct InsiderClusterEngine<'a> {
    graph: &'a GraphStore,
}

impl<'a> InsiderClusterEngine<'a> {
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// 1. pull P/M trades in the last `days` days, 2. group by CIK, 3.
    /// classify exercise_hold vs exercise_sell, 4. slide a `window_days`
    /// window back from the latest bullish trade, 5. count distinct buyers
    /// in that window: 3+ buyers = high, 2+ buyers or ≥$500K = medium, else low.
    pub async fn detect_clusters(
        &self,
        days: i64,
        window_days: i64,
        min_level: &str,
    ) -> Result<Vec<InsiderClusterSignal>, PipelineError> {
        let since_date = (Utc::now().date_naive() - Duration::days(days)).format("%Y-%m-%d").to_string();

        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company)-[:INSIDER_TRADE_OF]->(t:InsiderTransaction)<-[:TRADED_BY]-(p:Person)
                 WHERE t.transaction_date >= $since_date AND t.transaction_code IN ['P', 'M']
                 RETURN c.cik AS cik, c.name AS company_name, c.tickers AS tickers,
                        t.transaction_date AS transaction_date, t.transaction_code AS transaction_code,
                        t.total_value AS total_value, p.name AS insider_name, t.insider_title AS insider_title
                 ORDER BY t.transaction_date DESC",
                vec![("since_date", BoltType::from(since_date))],
            )
            .await?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let mut trades_by_cik: HashMap<String, Vec<TradeRow>> = HashMap::new();
        for row in rows {
            let cik: String = row.get("cik").unwrap_or_default();
            let tickers: Option<Vec<String>> = row.get("tickers").ok();
            trades_by_cik.entry(cik.clone()).or_default().push(TradeRow {
                cik,
                company_name: row.get("company_name").unwrap_or_default(),
                tickers,
                transaction_date: row.get("transaction_date").unwrap_or_default(),
                transaction_code: row.get("transaction_code").unwrap_or_default(),
                total_value: row.get("total_value").unwrap_or(0.0),
                insider_name: row.get::<String>("insider_name").unwrap_or_else(|_| "Unknown".to_string()),
                insider_title: row.get("insider_title").unwrap_or_default(),
            });
        }

        let min_order = level_order(min_level);
        let mut clusters = Vec::new();

        for (cik, trades) in trades_by_cik {
            let trade_types = classify_trades_batch(
                &trades,
                |t| &t.insider_name,
                |t| &t.transaction_date,
                |t| &t.transaction_code,
            );

            let bullish_trades: Vec<(&TradeRow, &str)> = trades
                .iter()
                .zip(trade_types.iter())
                .filter(|(t, tt)| is_bullish_trade(tt) && t.total_value > 0.0)
                .map(|(t, tt)| (t, *tt))
                .collect();

            if bullish_trades.is_empty() {
                continue;
            }

            let Some(latest_date) = bullish_trades
                .iter()
                .filter_map(|(t, _)| if t.transaction_date.is_empty() { None } else { Some(t.transaction_date.as_str()) })
                .max()
            else {
                continue;
            };

            let Ok(window_end_dt) = NaiveDate::parse_from_str(latest_date, "%Y-%m-%d") else {
                continue;
            };
            let window_start_dt = window_end_dt - Duration::days(window_days);
            let window_start = window_start_dt.format("%Y-%m-%d").to_string();
            let window_end = latest_date.to_string();

            let window_trades: Vec<&TradeRow> = bullish_trades
                .iter()
                .filter(|(t, _)| !t.transaction_date.is_empty() && t.transaction_date.as_str() >= window_start.as_str())
                .map(|(t, _)| *t)
                .collect();

            if window_trades.is_empty() {
                continue;
            }

            let mut buyer_agg: HashMap<String, BuyerDetail> = HashMap::new();
            for t in &window_trades {
                let entry = buyer_agg.entry(t.insider_name.clone()).or_insert_with(|| BuyerDetail {
                    name: t.insider_name.clone(),
                    title: t.insider_title.clone(),
                    total_value: 0.0,
                    trade_count: 0,
                });
                entry.total_value += t.total_value.abs();
                entry.trade_count += 1;
            }

            let num_buyers = buyer_agg.len();
            let total_buy_value: f64 = buyer_agg.values().map(|b| b.total_value).sum();
            let mut buyers: Vec<BuyerDetail> = buyer_agg.into_values().collect();
            buyers.sort_by(|a, b| b.total_value.partial_cmp(&a.total_value).unwrap_or(std::cmp::Ordering::Equal));

            let (level, summary) = if num_buyers >= 3 {
                ("high".to_string(), format!("Insider Cluster: {num_buyers} insiders buying"))
            } else if num_buyers >= 2 || total_buy_value >= 500_000.0 {
                let summary = if num_buyers >= 2 {
                    format!("Insider Cluster: {num_buyers} insiders buying")
                } else {
                    format!("Insider Buying: ${total_buy_value:.0} total")
                };
                ("medium".to_string(), summary)
            } else {
                let summary = buyers.first().map(|b| format!("Insider Purchase: {}", b.name)).unwrap_or_else(|| "Insider Purchase".to_string());
                ("low".to_string(), summary)
            };

            if level_order(&level) > min_order {
                continue;
            }

            let tickers = trades.first().and_then(|t| t.tickers.clone());
            let company_name = trades.first().map(|t| t.company_name.clone()).unwrap_or_default();

            clusters.push(InsiderClusterSignal {
                cik,
                company_name,
                ticker: pick_ticker(tickers.as_deref()),
                window_start,
                window_end,
                signal_level: level,
                signal_summary: summary,
                num_buyers,
                total_buy_value,
                buyers,
            });
        }

        clusters.sort_by(|a, b| b.window_end.cmp(&a.window_end));
        clusters.sort_by_key(|c| level_order(&c.signal_level));
        Ok(clusters)
    }

    /// As [`Self::detect_clusters`], but drops companies that already have
    /// an 8-K M&A signal in the same lookback window, to avoid double
    /// counting the same underlying event.
    pub async fn detect_clusters_excluding_8k(
        &self,
        days: i64,
        window_days: i64,
        min_level: &str,
    ) -> Result<Vec<InsiderClusterSignal>, PipelineError> {
        let clusters = self.detect_clusters(days, window_days, min_level).await?;
        if clusters.is_empty() {
            return Ok(clusters);
        }

        let since_date = (Utc::now().date_naive() - Duration::days(days)).format("%Y-%m-%d").to_string();
        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company)-[:FILED_EVENT]->(e:Event)
                 WHERE e.is_ma_signal = true AND e.filing_date >= $since_date
                 RETURN DISTINCT c.cik AS cik",
                vec![("since_date", BoltType::from(since_date))],
            )
            .await?;

        let ciks_with_8k: std::collections::HashSet<String> =
            rows.into_iter().filter_map(|r| r.get::<String>("cik").ok()).collect();

        Ok(clusters.into_iter().filter(|c| !ciks_with_8k.contains(&c.cik)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accession_number_encodes_cik_and_window_end() {
        let signal = InsiderClusterSignal {
            cik: "0001234567".to_string(),
            company_name: "Acme".to_string(),
            ticker: None,
            window_start: "2026-01-16".to_string(),
            window_end: "2026-02-15".to_string(),
            signal_level: "high".to_string(),
            signal_summary: String::new(),
            num_buyers: 3,
            total_buy_value: 1_000_000.0,
            buyers: vec![],
        };
        assert_eq!(signal.accession_number(), "CLUSTER-0001234567-2026-02-15");
    }

    #[test]
    fn level_order_ranks_high_before_medium_before_low() {
        assert!(level_order("high") < level_order("medium"));
        assert!(level_order("medium") < level_order("low"));
    }
}
