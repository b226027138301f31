//! Builds the ranked signal feed from stored 8-K events, enriched with
//! insider trading context pulled from Form 4 data within a ±60-day window.

use std::collections::{HashMap, HashSet};

use chrono::{Duration, NaiveDate, Utc};
use neo4rs::BoltType;
use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use crate::error::PipelineError;
use crate::graph::GraphStore;

use super::classifier::{classify_signal_level, compute_combined_signal};

static SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\b(JR\.?|SR\.?|III|IV|II|ESQ\.?|PH\.?D\.?|MD|L\.?P\.?)\b"#).unwrap());
static PUNCT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"['".,()]"#).unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Significant (4+ letter) uppercase words from a name, used to match an
/// 8-K's `persons_mentioned` (usually "First Last") against EDGAR's
/// "LAST FIRST MIDDLE" insider names — handles both orderings by ignoring
/// order entirely and matching on the keyword set.
fn name_keywords(name: &str) -> HashSet<String> {
    let upper = name.to_uppercase();
    let stripped = SUFFIX_RE.replace_all(&upper, "");
    let stripped = PUNCT_RE.replace_all(&stripped, "");
    let normalized = WHITESPACE_RE.replace_all(stripped.trim(), " ");
    normalized
        .split(' ')
        .filter(|w| w.len() >= 4 && w.chars().all(|c| c.is_ascii_alphabetic()))
        .map(|w| w.to_string())
        .collect()
}

#[derive(Debug, Clone)]
struct PersonTrade {
    direction: &'static str,
    value: f64,
    title: String,
}

/// Matches 8-K `persons_mentioned` against insider trades by the same
/// person, producing human-readable "X mentioned in filing — sold $Y"
/// strings. Matches once per mentioned person, first keyword hit wins.
fn match_persons(persons_mentioned: &[String], trades_by_person: &HashMap<String, Vec<PersonTrade>>) -> Vec<String> {
    if persons_mentioned.is_empty() || trades_by_person.is_empty() {
        return Vec::new();
    }

    let mut keyword_to_trader: HashMap<String, (&str, &Vec<PersonTrade>)> = HashMap::new();
    for (name, trades) in trades_by_person {
        for kw in name_keywords(name) {
            keyword_to_trader.entry(kw).or_insert((name.as_str(), trades));
        }
    }

    let mut matches = Vec::new();
    let mut seen = HashSet::new();
    for person in persons_mentioned {
        let keywords = name_keywords(person);
        if keywords.is_empty() {
            continue;
        }
        for kw in &keywords {
            if let Some((original_name, trades)) = keyword_to_trader.get(kw.as_str()) {
                if seen.contains(*original_name) {
                    continue;
                }
                seen.insert(original_name.to_string());

                let buys: Vec<_> = trades.iter().filter(|t| t.direction == "buy").collect();
                let sells: Vec<_> = trades.iter().filter(|t| t.direction == "sell").collect();
                let title = trades.first().map(|t| t.title.as_str()).unwrap_or("");
                let title_str = if title.is_empty() { String::new() } else { format!(" ({title})") };

                if !buys.is_empty() {
                    let total: f64 = buys.iter().map(|t| t.value).sum();
                    matches.push(format!("{original_name}{title_str} mentioned in filing — bought ${total:.0}"));
                } else if !sells.is_empty() {
                    let total: f64 = sells.iter().map(|t| t.value).sum();
                    matches.push(format!("{original_name}{title_str} mentioned in filing — sold ${total:.0}"));
                } else {
                    matches.push(format!("{original_name}{title_str} mentioned in filing — also traded stock"));
                }
                break;
            }
        }
    }

    matches
}

#[derive(Debug, Clone)]
pub struct InsiderContext {
    pub net_direction: String,
    pub total_buy_value: f64,
    pub total_sell_value: f64,
    pub notable_trades: Vec<String>,
    pub cluster_activity: bool,
    pub trade_count: usize,
    pub person_matches: Vec<String>,
}

impl InsiderContext {
    fn none() -> Self {
        Self {
            net_direction: "none".to_string(),
            total_buy_value: 0.0,
            total_sell_value: 0.0,
            notable_trades: Vec::new(),
            cluster_activity: false,
            trade_count: 0,
            person_matches: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalItem {
    pub company_name: String,
    pub cik: String,
    pub ticker: Option<String>,
    pub filing_date: String,
    pub signal_level: String,
    pub signal_summary: String,
    pub items: Vec<String>,
    pub item_names: Vec<String>,
    pub persons_mentioned: Vec<String>,
    pub accession_number: String,
    pub combined_signal_level: Option<String>,
    pub insider_context: Option<InsiderContext>,
}

fn level_order(level: &str) -> u8 {
    match level {
        "high" => 0,
        "medium" => 1,
        _ => 2,
    }
}

fn combined_order(level: &str) -> u8 {
    match level {
        "critical" => 0,
        "high_bearish" => 1,
        "high" => 2,
        "medium" => 3,
        _ => 4,
    }
}

pub struct SignalFeed<'a> {
    graph: &'a GraphStore,
}

impl<'a> SignalFeed<'a> {
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// Batch-fetches ±60-day insider context for a list of signals, keyed by
    /// `"{cik}|{filing_date}|{accession_number}"`.
    pub async fn get_insider_context_batch(
        &self,
        signals: &[SignalItem],
    ) -> Result<HashMap<String, InsiderContext>, PipelineError> {
        if signals.is_empty() {
            return Ok(HashMap::new());
        }

        let ciks: Vec<String> = signals.iter().map(|s| s.cik.clone()).collect::<HashSet<_>>().into_iter().collect();

        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company)-[:INSIDER_TRADE_OF]->(t:InsiderTransaction)<-[:TRADED_BY]-(p:Person)
                 WHERE c.cik IN $ciks
                 RETURN c.cik AS cik, t.transaction_date AS transaction_date,
                        t.transaction_type AS transaction_type, t.total_value AS total_value,
                        p.name AS insider_name, t.insider_title AS insider_title
                 ORDER BY t.transaction_date DESC",
                vec![("ciks", BoltType::from(ciks))],
            )
            .await?;

        struct Trade {
            date: String,
            transaction_type: String,
            value: f64,
            name: String,
            title: String,
        }

        let mut trades_by_cik: HashMap<String, Vec<Trade>> = HashMap::new();
        for row in rows {
            let cik: String = row.get("cik").unwrap_or_default();
            trades_by_cik.entry(cik).or_default().push(Trade {
                date: row.get("transaction_date").unwrap_or_default(),
                transaction_type: row.get::<String>("transaction_type").unwrap_or_default().to_lowercase(),
                value: row.get::<f64>("total_value").unwrap_or(0.0).abs(),
                name: row.get::<String>("insider_name").unwrap_or_else(|_| "Unknown".to_string()),
                title: row.get("insider_title").unwrap_or_default(),
            });
        }

        let mut contexts = HashMap::new();
        for signal in signals {
            let key = format!("{}|{}|{}", signal.cik, signal.filing_date, signal.accession_number);
            let Some(trades) = trades_by_cik.get(&signal.cik) else {
                contexts.insert(key, InsiderContext::none());
                continue;
            };

            let Ok(filing_dt) = NaiveDate::parse_from_str(&signal.filing_date, "%Y-%m-%d") else {
                contexts.insert(key, InsiderContext::none());
                continue;
            };

            let window_start = (filing_dt - Duration::days(60)).format("%Y-%m-%d").to_string();
            let window_end = (filing_dt + Duration::days(60)).format("%Y-%m-%d").to_string();

            let window_trades: Vec<&Trade> = trades
                .iter()
                .filter(|t| !t.date.is_empty() && t.date.as_str() >= window_start.as_str() && t.date.as_str() <= window_end.as_str())
                .collect();

            if window_trades.is_empty() {
                contexts.insert(key, InsiderContext::none());
                continue;
            }

            let mut total_buy = 0.0;
            let mut total_sell = 0.0;
            let mut buyers = HashSet::new();
            let mut sellers = HashSet::new();
            let mut notable = Vec::new();
            let mut trades_by_person: HashMap<String, Vec<PersonTrade>> = HashMap::new();

            for t in &window_trades {
                if t.transaction_type.contains("purchase") || t.transaction_type == "p" || t.transaction_type == "buy" {
                    total_buy += t.value;
                    buyers.insert(t.name.clone());
                    trades_by_person
                        .entry(t.name.clone())
                        .or_default()
                        .push(PersonTrade { direction: "buy", value: t.value, title: t.title.clone() });

                    let time_desc = NaiveDate::parse_from_str(&t.date, "%Y-%m-%d")
                        .ok()
                        .map(|trade_dt| {
                            let days_diff = (filing_dt - trade_dt).num_days();
                            match days_diff.cmp(&0) {
                                std::cmp::Ordering::Greater => format!("{days_diff}d before filing"),
                                std::cmp::Ordering::Less => format!("{}d after filing", -days_diff),
                                std::cmp::Ordering::Equal => "same day as filing".to_string(),
                            }
                        })
                        .unwrap_or_default();

                    let label = if !t.title.is_empty() {
                        t.title.split(',').next().unwrap_or(&t.title).trim().to_string()
                    } else {
                        t.name.split(' ').next_back().unwrap_or(&t.name).to_string()
                    };

                    if t.value >= 10_000.0 {
                        notable.push(format!("{label} bought ${:.0} {time_desc}", t.value));
                    }
                } else if t.transaction_type.contains("sale") || t.transaction_type == "s" || t.transaction_type == "sell" {
                    total_sell += t.value;
                    sellers.insert(t.name.clone());
                    trades_by_person
                        .entry(t.name.clone())
                        .or_default()
                        .push(PersonTrade { direction: "sell", value: t.value, title: t.title.clone() });
                }
            }

            let direction = if total_buy > total_sell * 1.5 {
                "buying"
            } else if total_sell > total_buy * 1.5 {
                "selling"
            } else if total_buy > 0.0 || total_sell > 0.0 {
                "mixed"
            } else {
                "none"
            };

            let cluster = buyers.len() >= 3 || sellers.len() >= 3;
            notable.truncate(5);
            let mut person_matches = match_persons(&signal.persons_mentioned, &trades_by_person);
            person_matches.truncate(5);

            contexts.insert(
                key,
                InsiderContext {
                    net_direction: direction.to_string(),
                    total_buy_value: total_buy,
                    total_sell_value: total_sell,
                    notable_trades: notable,
                    cluster_activity: cluster,
                    trade_count: window_trades.len(),
                    person_matches,
                },
            );
        }

        Ok(contexts)
    }

    /// Reads stored 8-K M&A-signal events from the last `days` days,
    /// classifies and ranks them, enriches with insider context, and
    /// returns the top `limit` filtered to at least `min_level`.
    pub async fn get_feed(&self, days: i64, limit: usize, min_level: &str) -> Result<Vec<SignalItem>, PipelineError> {
        let since_date = (Utc::now().date_naive() - Duration::days(days)).format("%Y-%m-%d").to_string();

        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company)-[:FILED_EVENT]->(e:Event)
                 WHERE e.is_ma_signal = true AND e.filing_date >= $since_date
                 RETURN c.name AS company_name, c.cik AS cik, c.tickers AS tickers,
                        e.filing_date AS filing_date, e.item_number AS item_number,
                        e.item_name AS item_name, e.persons_mentioned AS persons_mentioned,
                        e.accession_number AS accession_number, e.raw_text AS raw_text
                 ORDER BY e.filing_date DESC",
                vec![("since_date", BoltType::from(since_date))],
            )
            .await?;

        struct Grouped {
            company_name: String,
            cik: String,
            ticker: Option<String>,
            filing_date: String,
            items: Vec<String>,
            item_names: Vec<String>,
            persons_mentioned: Vec<String>,
            accession_number: String,
            raw_texts: Vec<String>,
        }

        let mut grouped: HashMap<(String, String, String), Grouped> = HashMap::new();
        for row in rows {
            let cik: String = row.get("cik").unwrap_or_default();
            let filing_date: String = row.get("filing_date").unwrap_or_default();
            let accession_number: String = row.get("accession_number").unwrap_or_default();
            let key = (cik.clone(), filing_date.clone(), accession_number.clone());

            let tickers: Option<Vec<String>> = row.get("tickers").ok();
            let entry = grouped.entry(key).or_insert_with(|| Grouped {
                company_name: row.get("company_name").unwrap_or_default(),
                cik,
                ticker: crate::party_linker::pick_ticker(tickers.as_deref()),
                filing_date,
                items: Vec::new(),
                item_names: Vec::new(),
                persons_mentioned: Vec::new(),
                accession_number,
                raw_texts: Vec::new(),
            });

            entry.items.push(row.get("item_number").unwrap_or_default());
            if let Ok(item_name) = row.get::<String>("item_name") {
                if !item_name.is_empty() {
                    entry.item_names.push(item_name);
                }
            }
            if let Ok(persons) = row.get::<Vec<String>>("persons_mentioned") {
                entry.persons_mentioned.extend(persons);
            }
            if let Ok(raw_text) = row.get::<String>("raw_text") {
                if !raw_text.is_empty() {
                    entry.raw_texts.push(raw_text);
                }
            }
        }

        let min_order = level_order(min_level);
        let mut signals = Vec::new();
        for data in grouped.into_values() {
            let (level, summary) = classify_signal_level(&data.items, &data.raw_texts);
            if level_order(level) > min_order {
                continue;
            }

            signals.push(SignalItem {
                company_name: data.company_name,
                cik: data.cik,
                ticker: data.ticker,
                filing_date: data.filing_date,
                signal_level: level.to_string(),
                signal_summary: summary.to_string(),
                items: dedup(data.items),
                item_names: dedup(data.item_names),
                persons_mentioned: dedup(data.persons_mentioned),
                accession_number: data.accession_number,
                combined_signal_level: None,
                insider_context: None,
            });
        }

        match self.get_insider_context_batch(&signals).await {
            Ok(contexts) => {
                for s in &mut signals {
                    let key = format!("{}|{}|{}", s.cik, s.filing_date, s.accession_number);
                    if let Some(ctx) = contexts.get(&key) {
                        s.combined_signal_level = Some(compute_combined_signal(&s.signal_level, Some(ctx)).to_string());
                        s.insider_context = Some(ctx.clone());
                    } else {
                        s.combined_signal_level = Some(s.signal_level.clone());
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to enrich signals with insider context");
                for s in &mut signals {
                    s.combined_signal_level = Some(s.signal_level.clone());
                }
            }
        }

        signals.sort_by(|a, b| b.filing_date.cmp(&a.filing_date));
        signals.sort_by_key(|s| combined_order(s.combined_signal_level.as_deref().unwrap_or(&s.signal_level)));
        signals.truncate(limit);
        Ok(signals)
    }

    /// Companies with the most insider trading activity in the last `days`
    /// days, ranked by trade count.
    pub async fn get_top_insider_activity(&self, days: i64, limit: i64) -> Result<Vec<TopInsiderActivity>, PipelineError> {
        let since_date = (Utc::now().date_naive() - Duration::days(days)).format("%Y-%m-%d").to_string();

        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company)-[:INSIDER_TRADE_OF]->(t:InsiderTransaction)<-[:TRADED_BY]-(p:Person)
                 WHERE t.transaction_date >= $since_date
                 WITH c, t, p,
                      CASE WHEN t.transaction_code = 'P' THEN t.total_value ELSE 0 END AS buy_val,
                      CASE WHEN t.transaction_code = 'S' THEN t.total_value ELSE 0 END AS sell_val
                 WITH c.cik AS cik, c.name AS company_name, c.tickers AS tickers,
                      count(t) AS trade_count, count(DISTINCT p) AS unique_insiders,
                      sum(buy_val) AS total_buy_value, sum(sell_val) AS total_sell_value
                 ORDER BY trade_count DESC
                 LIMIT $limit
                 RETURN cik, company_name, tickers, trade_count, unique_insiders, total_buy_value, total_sell_value",
                vec![("since_date", BoltType::from(since_date)), ("limit", BoltType::from(limit))],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let tickers: Option<Vec<String>> = row.get("tickers").ok();
                let total_buy_value: f64 = row.get("total_buy_value").unwrap_or(0.0);
                let total_sell_value: f64 = row.get("total_sell_value").unwrap_or(0.0);
                let net_direction = if total_buy_value > total_sell_value * 1.5 {
                    "buying"
                } else if total_sell_value > total_buy_value * 1.5 {
                    "selling"
                } else {
                    "mixed"
                };
                TopInsiderActivity {
                    cik: row.get("cik").unwrap_or_default(),
                    company_name: row.get("company_name").unwrap_or_default(),
                    ticker: crate::party_linker::pick_ticker(tickers.as_deref()),
                    trade_count: row.get("trade_count").unwrap_or(0),
                    unique_insiders: row.get("unique_insiders").unwrap_or(0),
                    total_buy_value,
                    total_sell_value,
                    net_direction: net_direction.to_string(),
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
pub struct TopInsiderActivity {
    pub cik: String,
    pub company_name: String,
    pub ticker: Option<String>,
    pub trade_count: i64,
    pub unique_insiders: i64,
    pub total_buy_value: f64,
    pub total_sell_value: f64,
    pub net_direction: String,
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|i| seen.insert(i.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_name_keywords_ignoring_suffixes_and_short_words() {
        let kws = name_keywords("RUSCKOWSKI STEPHEN H JR.");
        assert!(kws.contains("RUSCKOWSKI"));
        assert!(kws.contains("STEPHEN"));
        assert!(!kws.contains("H"));
        assert!(!kws.contains("JR"));
    }

    #[test]
    fn matches_person_to_their_trades_by_keyword_overlap() {
        let mut trades = HashMap::new();
        trades.insert(
            "RUSCKOWSKI STEPHEN H".to_string(),
            vec![PersonTrade { direction: "sell", value: 1_234_567.0, title: "CEO".to_string() }],
        );
        let matches = match_persons(&["Stephen Rusckowski".to_string()], &trades);
        assert_eq!(matches.len(), 1);
        assert!(matches[0].contains("sold $1234567"));
    }
}
