//! Thin client over the property graph backing the pipeline's entity model.
//!
//! [`GraphStore`] wraps a single [`neo4rs::Graph`] connection pool and exposes
//! `execute_query`/`execute_write` as the two primitives every loader and
//! analysis service in this crate builds on — parameterized Cypher in,
//! [`Row`]s or a write summary out. Nothing above this module constructs its
//! own `neo4rs::Graph`.

use neo4rs::{BoltType, Graph, Query, Row};
use tracing::{debug, info};

use crate::error::{GraphError, PipelineError};

/// The fixed set of indexes the pipeline relies on, created idempotently at
/// startup by [`GraphStore::create_indexes`].
const INDEX_STATEMENTS: &[&str] = &[
    "CREATE INDEX company_cik IF NOT EXISTS FOR (c:Company) ON (c.cik)",
    "CREATE INDEX company_normalized_name IF NOT EXISTS FOR (c:Company) ON (c.normalized_name)",
    "CREATE INDEX person_normalized_name IF NOT EXISTS FOR (p:Person) ON (p.normalized_name)",
    "CREATE INDEX sanctioned_entity_ofac_uid IF NOT EXISTS FOR (s:SanctionedEntity) ON (s.ofac_uid)",
    "CREATE INDEX filing_accession_number IF NOT EXISTS FOR (f:Filing) ON (f.accession_number)",
    "CREATE INDEX event_accession_item IF NOT EXISTS FOR (e:Event) ON (e.accession_number, e.item_number)",
    "CREATE INDEX alert_dedup_key IF NOT EXISTS FOR (a:Alert) ON (a.dedup_key)",
    "CREATE INDEX address_normalized_text IF NOT EXISTS FOR (a:Address) ON (a.normalized_text)",
];

pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, PipelineError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(GraphError::Driver)?;
        Ok(Self { graph })
    }

    /// Runs a read query, collecting every row into memory. Callers that need
    /// streaming should go straight to `neo4rs` — nothing in this pipeline's
    /// result sets is large enough to warrant it.
    pub async fn execute_query(
        &self,
        cypher: &str,
        params: Vec<(&str, BoltType)>,
    ) -> Result<Vec<Row>, PipelineError> {
        debug!(cypher, "executing graph query");
        let query = build_query(cypher, params);
        let mut stream = self.graph.execute(query).await.map_err(GraphError::Driver)?;
        let mut rows = Vec::new();
        while let Some(row) = stream.next().await.map_err(GraphError::Driver)? {
            rows.push(row);
        }
        Ok(rows)
    }

    /// Runs a write query (MERGE/CREATE/SET/DELETE) and discards any
    /// returned rows, reporting only whether the statement ran.
    pub async fn execute_write(
        &self,
        cypher: &str,
        params: Vec<(&str, BoltType)>,
    ) -> Result<(), PipelineError> {
        debug!(cypher, "executing graph write");
        let query = build_query(cypher, params);
        self.graph.run(query).await.map_err(GraphError::Driver)?;
        Ok(())
    }

    /// Creates the fixed index set. Safe to call on every startup: every
    /// statement is `IF NOT EXISTS`.
    pub async fn create_indexes(&self) -> Result<(), PipelineError> {
        for stmt in INDEX_STATEMENTS {
            self.graph.run(Query::new(stmt.to_string())).await.map_err(GraphError::Driver)?;
        }
        info!(count = INDEX_STATEMENTS.len(), "graph indexes ensured");
        Ok(())
    }

    /// Detach-deletes `SANCTIONED_AS` relationships, then deletes
    /// `SanctionedEntity` nodes — in that order, so no relationship is left
    /// pointing at an already-deleted node mid-transaction.
    pub async fn clear_sdn_data(&self) -> Result<(), PipelineError> {
        self.graph
            .run(Query::new(
                "MATCH ()-[r:SANCTIONED_AS]->() DELETE r".to_string(),
            ))
            .await
            .map_err(GraphError::Driver)?;
        self.graph
            .run(Query::new("MATCH (s:SanctionedEntity) DELETE s".to_string()))
            .await
            .map_err(GraphError::Driver)?;
        Ok(())
    }
}

fn build_query(cypher: &str, params: Vec<(&str, BoltType)>) -> Query {
    let mut query = Query::new(cypher.to_string());
    for (key, value) in params {
        query = query.param(key, value);
    }
    query
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_statements_are_idempotent_if_not_exists() {
        assert!(INDEX_STATEMENTS.iter().all(|s| s.contains("IF NOT EXISTS")));
        assert_eq!(INDEX_STATEMENTS.len(), 8);
    }
}
