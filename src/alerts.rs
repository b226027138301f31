//! Graph-backed alert store: surfaces insider-cluster and large-purchase
//! signals as durable, deduplicated [`Alert`] nodes a dashboard or scanner
//! loop can poll.
//!
//! Deduplication rides the same MERGE-on-natural-key idiom as every other
//! loader in this crate — [`Alert::dedup_key`] is the natural key, so
//! running the same detection twice in one day never creates a duplicate
//! alert, it only refreshes one.

use neo4rs::BoltType;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::graph::GraphStore;
use crate::model::{Alert, AlertSeverity};

fn severity_str(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Low => "low",
        AlertSeverity::Medium => "medium",
        AlertSeverity::High => "high",
    }
}

fn severity_from_str(s: &str) -> AlertSeverity {
    match s {
        "high" => AlertSeverity::High,
        "medium" => AlertSeverity::Medium,
        _ => AlertSeverity::Low,
    }
}

/// The fields a caller supplies when raising an alert; `id`, `created_at`,
/// and the acknowledgement fields are the store's own concern.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub company_cik: String,
    pub company_name: String,
    pub ticker: Option<String>,
    pub title: String,
    pub description: String,
    pub date: String,
}

/// Filters for [`AlertStore::get_alerts`]; every field left `None` is
/// unconstrained.
#[derive(Debug, Clone, Default)]
pub struct AlertFilters {
    pub company_cik: Option<String>,
    pub alert_type: Option<String>,
    pub min_severity: Option<AlertSeverity>,
    pub acknowledged: Option<bool>,
}

fn severity_rank(s: AlertSeverity) -> u8 {
    match s {
        AlertSeverity::Low => 0,
        AlertSeverity::Medium => 1,
        AlertSeverity::High => 2,
    }
}

pub struct AlertStore<'a> {
    graph: &'a GraphStore,
}

impl<'a> AlertStore<'a> {
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// MERGEs on `{cik}_{alert_type}_{date}`: a repeated detection on the
    /// same day refreshes the existing alert's title/description instead of
    /// creating a second one, and never resets `acknowledged`.
    pub async fn create_alert(&self, alert: NewAlert) -> Result<Uuid, PipelineError> {
        let id = Uuid::new_v4();
        let dedup_key = Alert::dedup_key(&alert.company_cik, &alert.alert_type, &alert.date);
        let now = chrono::Utc::now().to_rfc3339();

        self.graph
            .execute_write(
                "MERGE (a:Alert {dedup_key: $dedup_key})
                 ON CREATE SET a.id = $id, a.created_at = $now, a.acknowledged = false
                 SET a.alert_type = $alert_type, a.severity = $severity, a.company_cik = $company_cik,
                     a.company_name = $company_name, a.ticker = $ticker, a.title = $title,
                     a.description = $description",
                vec![
                    ("dedup_key", BoltType::from(dedup_key)),
                    ("id", BoltType::from(id.to_string())),
                    ("now", BoltType::from(now)),
                    ("alert_type", BoltType::from(alert.alert_type)),
                    ("severity", BoltType::from(severity_str(alert.severity).to_string())),
                    ("company_cik", BoltType::from(alert.company_cik)),
                    ("company_name", BoltType::from(alert.company_name)),
                    ("ticker", alert.ticker.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("title", BoltType::from(alert.title)),
                    ("description", BoltType::from(alert.description)),
                ],
            )
            .await?;

        Ok(id)
    }

    /// Lists alerts matching `filters`, newest first, capped at `limit`.
    /// `min_severity` is applied in memory since Cypher has no built-in
    /// ordering over the severity enum's string form.
    pub async fn get_alerts(&self, filters: &AlertFilters, limit: usize) -> Result<Vec<Alert>, PipelineError> {
        let mut clauses = Vec::new();
        let mut params: Vec<(&str, BoltType)> = Vec::new();

        if let Some(cik) = &filters.company_cik {
            clauses.push("a.company_cik = $company_cik".to_string());
            params.push(("company_cik", BoltType::from(cik.clone())));
        }
        if let Some(alert_type) = &filters.alert_type {
            clauses.push("a.alert_type = $alert_type".to_string());
            params.push(("alert_type", BoltType::from(alert_type.clone())));
        }
        if let Some(acknowledged) = filters.acknowledged {
            clauses.push("a.acknowledged = $acknowledged".to_string());
            params.push(("acknowledged", BoltType::from(acknowledged)));
        }

        let where_clause = if clauses.is_empty() { String::new() } else { format!("WHERE {}", clauses.join(" AND ")) };
        let cypher = format!(
            "MATCH (a:Alert) {where_clause}
             RETURN a.id AS id, a.dedup_key AS dedup_key, a.alert_type AS alert_type, a.severity AS severity,
                    a.company_cik AS company_cik, a.company_name AS company_name, a.ticker AS ticker,
                    a.title AS title, a.description AS description, a.created_at AS created_at,
                    a.acknowledged AS acknowledged, a.acknowledged_at AS acknowledged_at
             ORDER BY a.created_at DESC"
        );

        let rows = self.graph.execute_query(&cypher, params).await?;

        let mut alerts: Vec<Alert> = rows
            .into_iter()
            .map(|row| Alert {
                id: row.get::<String>("id").ok().and_then(|s| Uuid::parse_str(&s).ok()).unwrap_or_else(Uuid::new_v4),
                dedup_key: row.get("dedup_key").unwrap_or_default(),
                alert_type: row.get("alert_type").unwrap_or_default(),
                severity: severity_from_str(&row.get::<String>("severity").unwrap_or_default()),
                company_cik: row.get("company_cik").unwrap_or_default(),
                company_name: row.get("company_name").unwrap_or_default(),
                ticker: row.get("ticker").ok(),
                title: row.get("title").unwrap_or_default(),
                description: row.get("description").unwrap_or_default(),
                created_at: row.get("created_at").unwrap_or_default(),
                acknowledged: row.get("acknowledged").unwrap_or(false),
                acknowledged_at: row.get("acknowledged_at").ok(),
            })
            .collect();

        if let Some(min_severity) = filters.min_severity {
            alerts.retain(|a| severity_rank(a.severity) >= severity_rank(min_severity));
        }
        alerts.truncate(limit);
        Ok(alerts)
    }

    /// Marks an alert acknowledged, stamping `acknowledged_at`. Idempotent:
    /// acknowledging an already-acknowledged alert just refreshes the
    /// timestamp.
    pub async fn acknowledge(&self, id: Uuid) -> Result<(), PipelineError> {
        let now = chrono::Utc::now().to_rfc3339();
        self.graph
            .execute_write(
                "MATCH (a:Alert {id: $id})
                 SET a.acknowledged = true, a.acknowledged_at = $now",
                vec![("id", BoltType::from(id.to_string())), ("now", BoltType::from(now))],
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_is_stable_across_repeated_detections_on_the_same_day() {
        let k1 = Alert::dedup_key("0000320193", "insider_cluster", "2025-06-01");
        let k2 = Alert::dedup_key("0000320193", "insider_cluster", "2025-06-01");
        assert_eq!(k1, k2);
        assert_eq!(k1, "0000320193_insider_cluster_2025-06-01");
    }

    #[test]
    fn severity_rank_orders_high_above_medium_above_low() {
        assert!(severity_rank(AlertSeverity::High) > severity_rank(AlertSeverity::Medium));
        assert!(severity_rank(AlertSeverity::Medium) > severity_rank(AlertSeverity::Low));
    }

    #[test]
    fn severity_str_round_trips() {
        assert_eq!(severity_from_str(severity_str(AlertSeverity::High)), AlertSeverity::High);
        assert_eq!(severity_from_str(severity_str(AlertSeverity::Low)), AlertSeverity::Low);
    }
}
