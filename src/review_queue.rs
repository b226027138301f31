//! Embedded SQLite-backed store for failed and low-confidence extractions.
//!
//! Every extractor in [`crate::extractors`] enqueues here instead of surfacing a
//! hard error: a human reviews the item later via `Approve`/`Reject`. The storage
//! engine itself (SQLite) is an external collaborator — this module owns the
//! schema, status-transition logic, and query shapes that sit on top of it.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PipelineError, ReviewQueueError};

/// The kind of record an extractor was attempting to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionType {
    Ownership,
    Subsidiary,
    Officer,
}

impl ExtractionType {
    fn as_str(&self) -> &'static str {
        match self {
            ExtractionType::Ownership => "ownership",
            ExtractionType::Subsidiary => "subsidiary",
            ExtractionType::Officer => "officer",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        match s {
            "ownership" => Some(ExtractionType::Ownership),
            "subsidiary" => Some(ExtractionType::Subsidiary),
            "officer" => Some(ExtractionType::Officer),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    Approved,
    Rejected,
    Modified,
}

impl ReviewStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Modified => "modified",
        }
    }

    fn from_str(s: &str) -> Self {
        match s {
            "approved" => ReviewStatus::Approved,
            "rejected" => ReviewStatus::Rejected,
            "modified" => ReviewStatus::Modified,
            _ => ReviewStatus::Pending,
        }
    }
}

/// A new item being enqueued. Exactly one of `failure_reason`/`confidence` is
/// normally set, matching `add_failed_extraction` vs `add_low_confidence`.
#[derive(Debug, Clone)]
pub struct NewReviewItem {
    pub filing_accession: String,
    pub filing_type: String,
    pub company_cik: String,
    pub company_name: String,
    pub extraction_type: ExtractionType,
    pub raw_text: String,
    pub attempted_extraction: String,
    pub failure_reason: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub id: String,
    pub filing_accession: String,
    pub filing_type: String,
    pub company_cik: String,
    pub company_name: String,
    pub extraction_type: ExtractionType,
    pub raw_text: String,
    pub attempted_extraction: String,
    pub failure_reason: Option<String>,
    pub confidence: Option<f64>,
    pub status: ReviewStatus,
    pub created_at: String,
    pub reviewed_at: Option<String>,
    pub reviewed_by: Option<String>,
    pub corrected_data: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewQueueStats {
    pub pending: u64,
    pub approved: u64,
    pub rejected: u64,
    pub modified: u64,
    pub total: u64,
}

/// Maximum `raw_text` length stored per item; longer text is truncated before
/// insertion by the caller.
pub const MAX_RAW_TEXT_BYTES: usize = 100 * 1024;

/// Thin wrapper over a single SQLite connection, shared behind a mutex so
/// multiple async callers can use it concurrently.
#[derive(Clone)]
pub struct ReviewQueue {
    conn: Arc<Mutex<Connection>>,
}

impl ReviewQueue {
    pub fn open(db_path: &str) -> Result<Self, PipelineError> {
        let conn = Connection::open(db_path).map_err(ReviewQueueError::Storage)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(ReviewQueueError::Storage)?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS review_queue (
                id TEXT PRIMARY KEY,
                filing_accession TEXT NOT NULL,
                filing_type TEXT NOT NULL,
                company_cik TEXT NOT NULL,
                company_name TEXT NOT NULL,
                extraction_type TEXT NOT NULL,
                raw_text TEXT NOT NULL,
                attempted_extraction TEXT NOT NULL,
                failure_reason TEXT,
                confidence REAL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                reviewed_at TEXT,
                reviewed_by TEXT,
                corrected_data TEXT
            )",
            [],
        )
        .map_err(ReviewQueueError::Storage)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_review_queue_status ON review_queue(status)",
            [],
        )
        .map_err(ReviewQueueError::Storage)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_review_queue_cik ON review_queue(company_cik)",
            [],
        )
        .map_err(ReviewQueueError::Storage)?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_review_queue_accession ON review_queue(filing_accession)",
            [],
        )
        .map_err(ReviewQueueError::Storage)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory queue, used by tests.
    pub fn open_in_memory() -> Result<Self, PipelineError> {
        Self::open(":memory:")
    }

    fn truncate_raw_text(raw_text: &str) -> String {
        if raw_text.len() <= MAX_RAW_TEXT_BYTES {
            raw_text.to_string()
        } else {
            raw_text.chars().take(MAX_RAW_TEXT_BYTES).collect()
        }
    }

    pub fn add(&self, item: NewReviewItem) -> Result<String, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let created_at = Utc::now().to_rfc3339();
        let raw_text = Self::truncate_raw_text(&item.raw_text);

        let conn = self.conn.lock().expect("review queue mutex poisoned");
        conn.execute(
            "INSERT INTO review_queue (
                id, filing_accession, filing_type, company_cik, company_name,
                extraction_type, raw_text, attempted_extraction, failure_reason,
                confidence, status, created_at, reviewed_at, reviewed_by, corrected_data
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 'pending', ?11, NULL, NULL, NULL)",
            params![
                id,
                item.filing_accession,
                item.filing_type,
                item.company_cik,
                item.company_name,
                item.extraction_type.as_str(),
                raw_text,
                item.attempted_extraction,
                item.failure_reason,
                item.confidence,
                created_at,
            ],
        )
        .map_err(ReviewQueueError::Storage)?;

        Ok(id)
    }

    /// Thin wrapper over `add`: sets `failure_reason`, leaves `confidence` null.
    pub fn add_failed_extraction(
        &self,
        mut item: NewReviewItem,
        failure_reason: impl Into<String>,
    ) -> Result<String, PipelineError> {
        item.failure_reason = Some(failure_reason.into());
        item.confidence = None;
        self.add(item)
    }

    /// Thin wrapper over `add`: sets `confidence`, leaves `failure_reason` null.
    pub fn add_low_confidence(
        &self,
        mut item: NewReviewItem,
        confidence: f64,
    ) -> Result<String, PipelineError> {
        item.confidence = Some(confidence);
        item.failure_reason = None;
        self.add(item)
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<ReviewItem> {
        let extraction_type_str: String = row.get("extraction_type")?;
        let status_str: String = row.get("status")?;
        Ok(ReviewItem {
            id: row.get("id")?,
            filing_accession: row.get("filing_accession")?,
            filing_type: row.get("filing_type")?,
            company_cik: row.get("company_cik")?,
            company_name: row.get("company_name")?,
            extraction_type: ExtractionType::from_str(&extraction_type_str)
                .unwrap_or(ExtractionType::Ownership),
            raw_text: row.get("raw_text")?,
            attempted_extraction: row.get("attempted_extraction")?,
            failure_reason: row.get("failure_reason")?,
            confidence: row.get("confidence")?,
            status: ReviewStatus::from_str(&status_str),
            created_at: row.get("created_at")?,
            reviewed_at: row.get("reviewed_at")?,
            reviewed_by: row.get("reviewed_by")?,
            corrected_data: row.get("corrected_data")?,
        })
    }

    pub fn get_pending(&self, limit: u32) -> Result<Vec<ReviewItem>, PipelineError> {
        let conn = self.conn.lock().expect("review queue mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT * FROM review_queue WHERE status = 'pending'
                 ORDER BY created_at DESC LIMIT ?1",
            )
            .map_err(ReviewQueueError::Storage)?;
        let rows = stmt
            .query_map(params![limit], Self::row_to_item)
            .map_err(ReviewQueueError::Storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| PipelineError::from(ReviewQueueError::Storage(e)))
    }

    pub fn get_by_id(&self, id: &str) -> Result<Option<ReviewItem>, PipelineError> {
        let conn = self.conn.lock().expect("review queue mutex poisoned");
        conn.query_row(
            "SELECT * FROM review_queue WHERE id = ?1",
            params![id],
            Self::row_to_item,
        )
        .optional()
        .map_err(|e| PipelineError::from(ReviewQueueError::Storage(e)))
    }

    pub fn get_by_company(&self, cik: &str, limit: u32) -> Result<Vec<ReviewItem>, PipelineError> {
        let conn = self.conn.lock().expect("review queue mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT * FROM review_queue WHERE company_cik = ?1
                 ORDER BY created_at DESC LIMIT ?2",
            )
            .map_err(ReviewQueueError::Storage)?;
        let rows = stmt
            .query_map(params![cik, limit], Self::row_to_item)
            .map_err(ReviewQueueError::Storage)?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| PipelineError::from(ReviewQueueError::Storage(e)))
    }

    /// Sets `status = modified` when `corrections` is supplied, else `approved`.
    pub fn approve(
        &self,
        id: &str,
        reviewer: &str,
        corrections: Option<String>,
    ) -> Result<(), PipelineError> {
        let status = if corrections.is_some() {
            ReviewStatus::Modified
        } else {
            ReviewStatus::Approved
        };
        let reviewed_at = Utc::now().to_rfc3339();

        let conn = self.conn.lock().expect("review queue mutex poisoned");
        let affected = conn
            .execute(
                "UPDATE review_queue SET status = ?1, reviewed_at = ?2, reviewed_by = ?3,
                 corrected_data = ?4 WHERE id = ?5",
                params![status.as_str(), reviewed_at, reviewer, corrections, id],
            )
            .map_err(ReviewQueueError::Storage)?;

        if affected == 0 {
            return Err(ReviewQueueError::NotFound(id.to_string()).into());
        }
        Ok(())
    }

    pub fn reject(&self, id: &str, reviewer: &str) -> Result<(), PipelineError> {
        let reviewed_at = Utc::now().to_rfc3339();
        let conn = self.conn.lock().expect("review queue mutex poisoned");
        let affected = conn
            .execute(
                "UPDATE review_queue SET status = 'rejected', reviewed_at = ?1,
                 reviewed_by = ?2 WHERE id = ?3",
                params![reviewed_at, reviewer, id],
            )
            .map_err(ReviewQueueError::Storage)?;

        if affected == 0 {
            return Err(ReviewQueueError::NotFound(id.to_string()).into());
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<ReviewQueueStats, PipelineError> {
        let conn = self.conn.lock().expect("review queue mutex poisoned");
        let mut stmt = conn
            .prepare("SELECT status, COUNT(*) FROM review_queue GROUP BY status")
            .map_err(ReviewQueueError::Storage)?;
        let rows = stmt
            .query_map([], |row| {
                let status: String = row.get(0)?;
                let count: u64 = row.get(1)?;
                Ok((status, count))
            })
            .map_err(ReviewQueueError::Storage)?;

        let mut stats = ReviewQueueStats::default();
        for row in rows {
            let (status, count) = row.map_err(ReviewQueueError::Storage)?;
            match status.as_str() {
                "pending" => stats.pending = count,
                "approved" => stats.approved = count,
                "rejected" => stats.rejected = count,
                "modified" => stats.modified = count,
                _ => {}
            }
            stats.total += count;
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_item() -> NewReviewItem {
        NewReviewItem {
            filing_accession: "0001234567-25-000001".to_string(),
            filing_type: "DEF 14A".to_string(),
            company_cik: "0001234567".to_string(),
            company_name: "Acme Corp".to_string(),
            extraction_type: ExtractionType::Officer,
            raw_text: "raw snippet".to_string(),
            attempted_extraction: "{}".to_string(),
            failure_reason: None,
            confidence: None,
        }
    }

    #[test]
    fn add_and_get_pending() {
        let queue = ReviewQueue::open_in_memory().unwrap();
        let id = queue.add_failed_extraction(sample_item(), "no records found").unwrap();
        let pending = queue.get_pending(10).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, id);
        assert_eq!(pending[0].status, ReviewStatus::Pending);
        assert_eq!(pending[0].failure_reason.as_deref(), Some("no records found"));
    }

    #[test]
    fn approve_with_correction_sets_modified() {
        let queue = ReviewQueue::open_in_memory().unwrap();
        let id = queue.add_low_confidence(sample_item(), 0.7).unwrap();

        queue
            .approve(&id, "reviewer@example.com", Some("{\"name\": \"Fixed Name\"}".to_string()))
            .unwrap();

        let item = queue.get_by_id(&id).unwrap().unwrap();
        assert_eq!(item.status, ReviewStatus::Modified);
        assert_eq!(item.reviewed_by.as_deref(), Some("reviewer@example.com"));
        assert!(item.reviewed_at.is_some());
        assert!(item.corrected_data.is_some());
    }

    #[test]
    fn reject_sets_status_and_audit_fields() {
        let queue = ReviewQueue::open_in_memory().unwrap();
        let id = queue.add_failed_extraction(sample_item(), "nothing found").unwrap();
        queue.reject(&id, "reviewer@example.com").unwrap();

        let item = queue.get_by_id(&id).unwrap().unwrap();
        assert_eq!(item.status, ReviewStatus::Rejected);
    }

    #[test]
    fn stats_groups_by_status() {
        let queue = ReviewQueue::open_in_memory().unwrap();
        let a = queue.add_failed_extraction(sample_item(), "x").unwrap();
        let b = queue.add_failed_extraction(sample_item(), "y").unwrap();
        queue.approve(&a, "r", None).unwrap();
        queue.reject(&b, "r").unwrap();

        let stats = queue.stats().unwrap();
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.total, 2);
    }
}
