//! Retroactive scoring of insider-cluster signals: did the cluster actually
//! precede a price move or an 8-K?
//!
//! [`compute_price_outcomes`] and [`proof_score`] are pure functions over
//! price data a caller already fetched — this module never calls out to a
//! market-data API itself. [`PriceProvider`] is the seam a caller plugs a
//! real client into; [`AccuracyEngine`] only calls it once per distinct CIK
//! per scoring run; the 8-K/insider-continuation follow-up queries are
//! batched across the whole candidate set the same way, mirroring
//! [`crate::signals::cluster::InsiderClusterEngine::detect_clusters`]'s
//! single-query-then-group-in-memory shape.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use neo4rs::BoltType;

use crate::error::PipelineError;
use crate::graph::GraphStore;
use crate::signals::cluster::InsiderClusterSignal;

const CACHE_TTL: Duration = Duration::from_secs(4 * 60 * 60);
const LOOKBACK_TOLERANCE_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy)]
pub struct PriceClose {
    pub date: chrono::NaiveDate,
    pub close: f64,
}

/// Seam for a market-data backend. Implementors fetch once per CIK per call;
/// [`AccuracyEngine`] never calls this more than once per distinct CIK in a
/// single `score_signals` run.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    async fn closes(&self, cik: &str, from: chrono::NaiveDate, to: chrono::NaiveDate) -> Result<Vec<PriceClose>, PipelineError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Hit,
    PartialHit,
    Miss,
    Pending,
    NoData,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Hit => "hit",
            Verdict::PartialHit => "partial_hit",
            Verdict::Miss => "miss",
            Verdict::Pending => "pending",
            Verdict::NoData => "no_data",
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PriceOutcomes {
    pub signal_close: Option<f64>,
    pub return_30d: Option<f64>,
    pub return_60d: Option<f64>,
    pub return_90d: Option<f64>,
}

impl PriceOutcomes {
    pub fn best_return(&self) -> Option<f64> {
        [self.return_30d, self.return_60d, self.return_90d]
            .into_iter()
            .flatten()
            .fold(None, |acc, r| Some(acc.map_or(r, |a: f64| a.max(r))))
    }
}

/// Finds the close nearest `target` within [`LOOKBACK_TOLERANCE_DAYS`] days
/// on either side, preferring the smallest absolute distance.
fn nearest_close(closes: &[PriceClose], target: chrono::NaiveDate) -> Option<f64> {
    closes
        .iter()
        .filter(|c| (c.date - target).num_days().abs() <= LOOKBACK_TOLERANCE_DAYS)
        .min_by_key(|c| (c.date - target).num_days().abs())
        .map(|c| c.close)
}

/// Computes signal-day, +30d, +60d, and +90d closes and the percentage
/// returns off the signal-day close.
pub fn compute_price_outcomes(closes: &[PriceClose], signal_date: chrono::NaiveDate) -> PriceOutcomes {
    let signal_close = nearest_close(closes, signal_date);
    let Some(base) = signal_close else {
        return PriceOutcomes::default();
    };

    let pct = |days: i64| -> Option<f64> {
        nearest_close(closes, signal_date + chrono::Duration::days(days)).map(|c| (c - base) / base * 100.0)
    };

    PriceOutcomes {
        signal_close: Some(base),
        return_30d: pct(30),
        return_60d: pct(60),
        return_90d: pct(90),
    }
}

/// `hit` if an 8-K followed within the window or the best return is at
/// least 10%; `partial_hit` for any non-negative return under 10%; `miss`
/// for a negative return; `pending` when the window hasn't elapsed yet;
/// `no_data` when no price data was ever found.
pub fn compute_verdict(outcomes: &PriceOutcomes, followed_by_8k: bool, window_elapsed: bool) -> Verdict {
    let Some(best) = outcomes.best_return() else {
        return if window_elapsed { Verdict::NoData } else { Verdict::Pending };
    };

    if followed_by_8k || best >= 10.0 {
        Verdict::Hit
    } else if best >= 0.0 {
        Verdict::PartialHit
    } else {
        Verdict::Miss
    }
}

/// `0.40 * min(best_return,150)/150 + 0.25 * min(log10(max(buy_value,1))/8,1.0)
/// + 0.15 * min(buyer_count/5.0,1.0) + 0.10 * (followed_by_8k?1.0:0.0)
/// + 0.10 * {high:1.0, medium:0.5, low:0.2}[level]`
pub fn proof_score(best_return: f64, buy_value: f64, buyer_count: usize, followed_by_8k: bool, level: &str) -> f64 {
    let return_component = 0.40 * (best_return.max(0.0).min(150.0) / 150.0);
    let value_component = 0.25 * ((buy_value.max(1.0)).log10() / 8.0).min(1.0);
    let buyer_component = 0.15 * (buyer_count as f64 / 5.0).min(1.0);
    let event_component = 0.10 * if followed_by_8k { 1.0 } else { 0.0 };
    let level_weight = match level {
        "high" => 1.0,
        "medium" => 0.5,
        "low" => 0.2,
        _ => 0.0,
    };
    let level_component = 0.10 * level_weight;

    return_component + value_component + buyer_component + event_component + level_component
}

#[derive(Debug, Clone)]
pub struct ScoredSignal {
    pub cik: String,
    pub company_name: String,
    pub ticker: Option<String>,
    pub window_end: String,
    pub signal_level: String,
    pub num_buyers: usize,
    pub total_buy_value: f64,
    pub outcomes: PriceOutcomes,
    pub followed_by_8k: bool,
    pub verdict: Verdict,
    pub proof_score: f64,
}

#[derive(Debug, Clone)]
pub struct AccuracySummary {
    pub total_signals: usize,
    pub hits: usize,
    pub partial_hits: usize,
    pub misses: usize,
    pub pending: usize,
    pub no_data: usize,
    pub hit_rate: f64,
    pub avg_return_30d: Option<f64>,
    pub avg_return_60d: Option<f64>,
    pub avg_return_90d: Option<f64>,
    pub eight_k_follow_rate: f64,
    pub by_level: Vec<LevelSummary>,
}

/// Per-`signal_level` breakdown of the same counts and averages that
/// [`AccuracySummary`] reports overall.
#[derive(Debug, Clone)]
pub struct LevelSummary {
    pub level: String,
    pub count: usize,
    pub hit_rate: f64,
    pub avg_return_30d: Option<f64>,
    pub avg_return_60d: Option<f64>,
    pub avg_return_90d: Option<f64>,
    pub eight_k_follow_rate: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let values: Vec<f64> = values.collect();
    if values.is_empty() { None } else { Some(values.iter().sum::<f64>() / values.len() as f64) }
}

fn eight_k_follow_rate(signals: &[ScoredSignal]) -> f64 {
    if signals.is_empty() {
        0.0
    } else {
        signals.iter().filter(|s| s.followed_by_8k).count() as f64 / signals.len() as f64
    }
}

fn summarize_slice(signals: &[ScoredSignal]) -> (usize, usize, usize, usize, usize, usize, f64) {
    let total_signals = signals.len();
    let hits = signals.iter().filter(|s| s.verdict == Verdict::Hit).count();
    let partial_hits = signals.iter().filter(|s| s.verdict == Verdict::PartialHit).count();
    let misses = signals.iter().filter(|s| s.verdict == Verdict::Miss).count();
    let pending = signals.iter().filter(|s| s.verdict == Verdict::Pending).count();
    let no_data = signals.iter().filter(|s| s.verdict == Verdict::NoData).count();
    let scored = total_signals - pending - no_data;
    let hit_rate = if scored == 0 { 0.0 } else { hits as f64 / scored as f64 };
    (total_signals, hits, partial_hits, misses, pending, no_data, hit_rate)
}

/// Aggregates counts, hit rate, average 30/60/90-day returns, and the 8-K
/// follow rate overall and per `signal_level`.
fn summarize(signals: &[ScoredSignal]) -> AccuracySummary {
    let (total_signals, hits, partial_hits, misses, pending, no_data, hit_rate) = summarize_slice(signals);

    let mut levels: Vec<String> = signals.iter().map(|s| s.signal_level.clone()).collect();
    levels.sort();
    levels.dedup();
    let by_level = levels
        .into_iter()
        .map(|level| {
            let subset: Vec<ScoredSignal> = signals.iter().filter(|s| s.signal_level == level).cloned().collect();
            let (count, _, _, _, _, _, level_hit_rate) = summarize_slice(&subset);
            LevelSummary {
                level,
                count,
                hit_rate: level_hit_rate,
                avg_return_30d: mean(subset.iter().filter_map(|s| s.outcomes.return_30d)),
                avg_return_60d: mean(subset.iter().filter_map(|s| s.outcomes.return_60d)),
                avg_return_90d: mean(subset.iter().filter_map(|s| s.outcomes.return_90d)),
                eight_k_follow_rate: eight_k_follow_rate(&subset),
            }
        })
        .collect();

    AccuracySummary {
        total_signals,
        hits,
        partial_hits,
        misses,
        pending,
        no_data,
        hit_rate,
        avg_return_30d: mean(signals.iter().filter_map(|s| s.outcomes.return_30d)),
        avg_return_60d: mean(signals.iter().filter_map(|s| s.outcomes.return_60d)),
        avg_return_90d: mean(signals.iter().filter_map(|s| s.outcomes.return_90d)),
        eight_k_follow_rate: eight_k_follow_rate(signals),
        by_level,
    }
}

/// In-memory TTL cache keyed on the scoring run's parameters, so repeated
/// dashboard polls within the same window don't re-run price lookups.
pub struct AccuracyCache {
    entries: Mutex<HashMap<String, (Instant, AccuracySummary)>>,
}

impl AccuracyCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    pub fn key(lookback_days: i64, min_signal_age_days: i64, min_level: &str) -> String {
        format!("{lookback_days}_{min_signal_age_days}_{min_level}")
    }

    pub fn get(&self, key: &str) -> Option<AccuracySummary> {
        let entries = self.entries.lock().unwrap();
        entries.get(key).and_then(|(stamped, summary)| {
            if stamped.elapsed() < CACHE_TTL { Some(summary.clone()) } else { None }
        })
    }

    pub fn put(&self, key: String, summary: AccuracySummary) {
        self.entries.lock().unwrap().insert(key, (Instant::now(), summary));
    }
}

impl Default for AccuracyCache {
    fn default() -> Self {
        Self::new()
    }
}

pub struct AccuracyEngine<'a> {
    graph: &'a GraphStore,
    prices: &'a dyn PriceProvider,
}

impl<'a> AccuracyEngine<'a> {
    pub fn new(graph: &'a GraphStore, prices: &'a dyn PriceProvider) -> Self {
        Self { graph, prices }
    }

    /// Scores every signal in `signals` against price data and subsequent
    /// 8-K filings. Issues exactly one batched 8-K query across the full
    /// candidate CIK set, not one per signal.
    pub async fn score_signals(&self, signals: &[InsiderClusterSignal]) -> Result<Vec<ScoredSignal>, PipelineError> {
        if signals.is_empty() {
            return Ok(Vec::new());
        }

        let eight_k_dates = self.subsequent_8k_dates(signals).await?;
        let today = chrono::Utc::now().date_naive();
        let mut scored = Vec::with_capacity(signals.len());

        for signal in signals {
            let Ok(window_end) = chrono::NaiveDate::parse_from_str(&signal.window_end, "%Y-%m-%d") else { continue };
            let from = window_end - chrono::Duration::days(LOOKBACK_TOLERANCE_DAYS);
            let to = window_end + chrono::Duration::days(90 + LOOKBACK_TOLERANCE_DAYS);
            let closes = self.prices.closes(&signal.cik, from, to).await?;
            let outcomes = compute_price_outcomes(&closes, window_end);

            let followed_by_8k = eight_k_dates
                .get(&signal.cik)
                .map(|dates| dates.iter().any(|d| *d >= window_end && (*d - window_end).num_days() <= 90))
                .unwrap_or(false);

            let window_elapsed = (today - window_end).num_days() >= 90;
            let verdict = compute_verdict(&outcomes, followed_by_8k, window_elapsed);
            let best_return = outcomes.best_return().unwrap_or(0.0);
            let score = proof_score(best_return, signal.total_buy_value, signal.num_buyers, followed_by_8k, &signal.signal_level);

            scored.push(ScoredSignal {
                cik: signal.cik.clone(),
                company_name: signal.company_name.clone(),
                ticker: signal.ticker.clone(),
                window_end: signal.window_end.clone(),
                signal_level: signal.signal_level.clone(),
                num_buyers: signal.num_buyers,
                total_buy_value: signal.total_buy_value,
                outcomes,
                followed_by_8k,
                verdict,
                proof_score: score,
            });
        }

        Ok(scored)
    }

    /// One query across every CIK in `signals`, grouping 8-K filing dates in
    /// memory rather than issuing a per-signal lookup.
    async fn subsequent_8k_dates(&self, signals: &[InsiderClusterSignal]) -> Result<HashMap<String, Vec<chrono::NaiveDate>>, PipelineError> {
        let ciks: Vec<String> = signals.iter().map(|s| s.cik.clone()).collect();
        let rows = self
            .graph
            .execute_query(
                "MATCH (c:Company)-[:FILED]->(f:Filing)
                 WHERE c.cik IN $ciks AND f.form_type = '8-K'
                 RETURN c.cik AS cik, f.filing_date AS filing_date",
                vec![("ciks", BoltType::from(ciks))],
            )
            .await?;

        let mut by_cik: HashMap<String, Vec<chrono::NaiveDate>> = HashMap::new();
        for row in rows {
            let cik: String = row.get("cik").unwrap_or_default();
            let date: String = row.get("filing_date").unwrap_or_default();
            if let Ok(date) = chrono::NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
                by_cik.entry(cik).or_default().push(date);
            }
        }
        Ok(by_cik)
    }

    /// `hit` verdicts with a positive return, sorted by `proof_score` desc.
    pub fn get_top_hits(scored: &[ScoredSignal], limit: usize) -> Vec<ScoredSignal> {
        let mut hits: Vec<ScoredSignal> = scored
            .iter()
            .filter(|s| s.verdict == Verdict::Hit && s.outcomes.best_return().unwrap_or(0.0) > 0.0)
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.proof_score.partial_cmp(&a.proof_score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        hits
    }

    pub fn get_accuracy_summary(scored: &[ScoredSignal]) -> AccuracySummary {
        summarize(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn close(date: &str, price: f64) -> PriceClose {
        PriceClose { date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(), close: price }
    }

    #[test]
    fn compute_price_outcomes_finds_nearest_close_within_tolerance() {
        let closes = vec![close("2025-01-01", 10.0), close("2025-01-29", 11.0), close("2025-03-03", 15.0)];
        let signal_date = NaiveDate::parse_from_str("2025-01-01", "%Y-%m-%d").unwrap();
        let outcomes = compute_price_outcomes(&closes, signal_date);
        assert_eq!(outcomes.signal_close, Some(10.0));
        assert_eq!(outcomes.return_30d, Some(10.0));
        assert_eq!(outcomes.return_60d, Some(50.0));
    }

    #[test]
    fn verdict_is_hit_when_followed_by_8k_even_with_flat_return() {
        let outcomes = PriceOutcomes { signal_close: Some(10.0), return_30d: Some(0.0), return_60d: None, return_90d: None };
        assert_eq!(compute_verdict(&outcomes, true, true), Verdict::Hit);
    }

    #[test]
    fn verdict_is_miss_on_negative_return_without_8k() {
        let outcomes = PriceOutcomes { signal_close: Some(10.0), return_30d: Some(-5.0), return_60d: None, return_90d: None };
        assert_eq!(compute_verdict(&outcomes, false, true), Verdict::Miss);
    }

    #[test]
    fn verdict_is_pending_before_window_elapses_with_no_data_yet() {
        let outcomes = PriceOutcomes::default();
        assert_eq!(compute_verdict(&outcomes, false, false), Verdict::Pending);
        assert_eq!(compute_verdict(&outcomes, false, true), Verdict::NoData);
    }

    #[test]
    fn proof_score_ranks_higher_conviction_signal_above_weaker_one() {
        // Scenario: signal A has a larger return, larger buy value, more
        // buyers, an 8-K follow-up, and high signal level; signal B is
        // weaker on every axis. A's proof_score must exceed B's.
        let a = proof_score(45.0, 2_000_000.0, 5, true, "high");
        let b = proof_score(5.0, 50_000.0, 1, false, "low");
        assert!(a > b);
    }

    #[test]
    fn cache_put_then_get_returns_the_same_summary_within_ttl() {
        let cache = AccuracyCache::new();
        let key = AccuracyCache::key(90, 7, "medium");
        let summary = AccuracySummary {
            total_signals: 3,
            hits: 1,
            partial_hits: 1,
            misses: 1,
            pending: 0,
            no_data: 0,
            hit_rate: 0.5,
            avg_return_30d: Some(12.0),
            avg_return_60d: None,
            avg_return_90d: None,
            eight_k_follow_rate: 0.33,
            by_level: Vec::new(),
        };
        cache.put(key.clone(), summary);
        assert!(cache.get(&key).is_some());
        assert!(cache.get("missing_key").is_none());
    }

    #[test]
    fn summarize_breaks_down_by_level_and_averages_returns() {
        let mut high = ScoredSignal {
            cik: "0001234567".to_string(),
            company_name: "Acme Corp".to_string(),
            ticker: Some("ACME".to_string()),
            window_end: "2025-01-01".to_string(),
            signal_level: "high".to_string(),
            num_buyers: 3,
            total_buy_value: 1_000_000.0,
            outcomes: PriceOutcomes { signal_close: Some(10.0), return_30d: Some(20.0), return_60d: Some(30.0), return_90d: None },
            followed_by_8k: true,
            verdict: Verdict::Hit,
            proof_score: 0.8,
        };
        let medium = ScoredSignal {
            signal_level: "medium".to_string(),
            outcomes: PriceOutcomes { signal_close: Some(5.0), return_30d: Some(-10.0), return_60d: None, return_90d: None },
            followed_by_8k: false,
            verdict: Verdict::Miss,
            ..high.clone()
        };
        high.signal_level = "high".to_string();
        let summary = summarize(&[high, medium]);

        assert_eq!(summary.total_signals, 2);
        assert_eq!(summary.avg_return_30d, Some(5.0));
        assert_eq!(summary.eight_k_follow_rate, 0.5);
        assert_eq!(summary.by_level.len(), 2);
        let high_level = summary.by_level.iter().find(|l| l.level == "high").unwrap();
        assert_eq!(high_level.count, 1);
        assert_eq!(high_level.avg_return_30d, Some(20.0));
    }
}
