//! Shortest-path and multi-layer connection queries between two entities.
//!
//! Every result here carries its justification rather than a bare boolean —
//! built on top of [`crate::evidence`], the same toolkit `risk` and
//! `sanctions` use. Name resolution mirrors `party_linker`'s
//! shortest-match-wins approach: a caller with a company or person name
//! rather than a graph id gets the same fuzzy lookup `PartyLinker` uses for
//! event counterparties.

use neo4rs::BoltType;

use crate::error::PipelineError;
use crate::evidence::{self, EvidenceChain, PathSegment};
use crate::graph::GraphStore;
use crate::model::normalize_name;

const DEFAULT_MAX_HOPS: u32 = 6;

#[derive(Debug, Clone)]
pub struct DirectConnection {
    pub other_id: String,
    pub other_name: String,
    pub rel_type: String,
    pub evidence: EvidenceChain,
}

#[derive(Debug, Clone)]
pub struct SharedConnection {
    pub via_id: String,
    pub via_name: String,
    pub rel_a: String,
    pub rel_b: String,
}

#[derive(Debug, Clone, Default)]
pub struct MultiLayerConnection {
    pub board_interlocks: Vec<String>,
    pub executive_overlaps: Vec<String>,
    pub ownership_paths: Vec<String>,
    pub shared_subsidiaries: Vec<String>,
    pub connection_strength: &'static str,
}

impl MultiLayerConnection {
    fn total_signals(&self) -> usize {
        self.board_interlocks.len() + self.executive_overlaps.len() + self.ownership_paths.len() + self.shared_subsidiaries.len()
    }
}

/// `none` (0 signals) < `weak` (≤ 2) < `moderate` (≤ 5) < `strong` (> 5).
pub fn bucket_strength(total_signals: usize) -> &'static str {
    match total_signals {
        0 => "none",
        1..=2 => "weak",
        3..=5 => "moderate",
        _ => "strong",
    }
}

pub struct ConnectionService<'a> {
    graph: &'a GraphStore,
}

impl<'a> ConnectionService<'a> {
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// Resolves a name to an entity id the same way [`crate::party_linker`]
    /// resolves a party name to a company: case-insensitive
    /// `normalized_name` containment, shortest match wins.
    async fn resolve_entity_by_name(&self, name: &str) -> Result<Option<String>, PipelineError> {
        let normalized = normalize_name(name);
        let rows = self
            .graph
            .execute_query(
                "MATCH (n) WHERE (n:Company OR n:Person) AND n.normalized_name CONTAINS $normalized
                 RETURN n.id AS id, n.normalized_name AS normalized_name
                 LIMIT 20",
                vec![("normalized", BoltType::from(normalized))],
            )
            .await?;

        let mut best: Option<(String, String)> = None;
        for row in rows {
            let id: String = row.get("id").unwrap_or_default();
            let nn: String = row.get("normalized_name").unwrap_or_default();
            if best.as_ref().map(|(_, n)| nn.len() < n.len()).unwrap_or(true) {
                best = Some((id, nn));
            }
        }
        Ok(best.map(|(id, _)| id))
    }

    /// Shortest path between two entities, unrolled into an [`EvidenceChain`]
    /// whose `overall_confidence` is the minimum confidence across every hop.
    pub async fn find_connection_with_evidence(
        &self,
        a_id: &str,
        b_id: &str,
        max_hops: u32,
    ) -> Result<Option<EvidenceChain>, PipelineError> {
        let max_hops = max_hops.clamp(1, DEFAULT_MAX_HOPS);
        // Hop bounds can't be parameterized in Cypher's variable-length path
        // syntax; `max_hops` is a small internal u32; interpolating it is
        // safe and is the only way to express the bound at all.
        let cypher = format!(
            "MATCH (a {{id: $a_id}}), (b {{id: $b_id}})
             MATCH path = shortestPath((a)-[*1..{max_hops}]-(b))
             RETURN [n IN nodes(path) | coalesce(n.name, n.normalized_name)] AS names,
                    [r IN relationships(path) | type(r)] AS rel_types,
                    [r IN relationships(path) | r.percentage] AS percentages,
                    [r IN relationships(path) | r.title] AS titles,
                    [r IN relationships(path) | r.confidence] AS confidences,
                    [r IN relationships(path) | r.raw_text] AS raw_texts,
                    [r IN relationships(path) | r.source_section] AS sections,
                    [r IN relationships(path) | r.extraction_method] AS methods
             LIMIT 1"
        );

        let rows = self
            .graph
            .execute_query(
                &cypher,
                vec![("a_id", BoltType::from(a_id.to_string())), ("b_id", BoltType::from(b_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };

        let names: Vec<String> = row.get("names").unwrap_or_default();
        if names.len() < 2 {
            return Ok(None);
        }
        let rel_types: Vec<String> = row.get("rel_types").unwrap_or_default();
        let percentages: Vec<Option<f64>> = row.get("percentages").unwrap_or_default();
        let titles: Vec<Option<String>> = row.get("titles").unwrap_or_default();
        let confidences: Vec<Option<f64>> = row.get("confidences").unwrap_or_default();
        let raw_texts: Vec<Option<String>> = row.get("raw_texts").unwrap_or_default();
        let sections: Vec<Option<String>> = row.get("sections").unwrap_or_default();
        let methods: Vec<Option<String>> = row.get("methods").unwrap_or_default();

        let mut segments = Vec::with_capacity(rel_types.len());
        for (i, rel_type) in rel_types.into_iter().enumerate() {
            let from_name = names.get(i).cloned().unwrap_or_default();
            let to_name = names.get(i + 1).cloned().unwrap_or_default();
            let percentage = percentages.get(i).cloned().flatten();
            let title = titles.get(i).cloned().flatten();
            let fact = evidence::relationship_to_fact(&from_name, &to_name, &rel_type, percentage, title.as_deref());

            segments.push(PathSegment {
                from_name,
                to_name,
                rel_type,
                fact,
                source_type: "filing".to_string(),
                raw_text: raw_texts.get(i).cloned().flatten().unwrap_or_default(),
                confidence: confidences.get(i).cloned().flatten(),
                source_section: sections.get(i).cloned().flatten(),
                extraction_method: methods.get(i).cloned().flatten(),
                ..Default::default()
            });
        }

        let a_name = names.first().cloned().unwrap_or_default();
        let b_name = names.last().cloned().unwrap_or_default();
        Ok(Some(evidence::build_connection_evidence(&a_name, &b_name, &segments)))
    }

    /// As [`Self::find_connection_with_evidence`], but resolves both
    /// endpoints from names first. Returns `None` if either name fails to
    /// resolve.
    pub async fn find_connection_by_name(&self, name_a: &str, name_b: &str, max_hops: u32) -> Result<Option<EvidenceChain>, PipelineError> {
        let Some(a_id) = self.resolve_entity_by_name(name_a).await? else {
            return Ok(None);
        };
        let Some(b_id) = self.resolve_entity_by_name(name_b).await? else {
            return Ok(None);
        };
        self.find_connection_with_evidence(&a_id, &b_id, max_hops).await
    }

    /// Pairs of edges `(a)-[r1]-(x)-[r2]-(b)` through an intermediate entity.
    pub async fn find_shared_connections(&self, a_id: &str, b_id: &str, limit: u32) -> Result<Vec<SharedConnection>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (a {id: $a_id})-[r1]-(x)-[r2]-(b {id: $b_id})
                 WHERE x.id <> $a_id AND x.id <> $b_id
                 RETURN DISTINCT x.id AS via_id, coalesce(x.name, x.normalized_name) AS via_name,
                        type(r1) AS rel_a, type(r2) AS rel_b
                 LIMIT $limit",
                vec![
                    ("a_id", BoltType::from(a_id.to_string())),
                    ("b_id", BoltType::from(b_id.to_string())),
                    ("limit", BoltType::from(limit as i64)),
                ],
            )
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| SharedConnection {
                via_id: row.get("via_id").unwrap_or_default(),
                via_name: row.get("via_name").unwrap_or_default(),
                rel_a: row.get("rel_a").unwrap_or_default(),
                rel_b: row.get("rel_b").unwrap_or_default(),
            })
            .collect())
    }

    /// Every direct (1-hop) relationship an entity has, each already carrying
    /// its evidence sentence and source citation.
    pub async fn get_entity_connections_with_evidence(&self, id: &str, limit: u32) -> Result<Vec<DirectConnection>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (n {id: $id})-[r]-(other)
                 RETURN other.id AS other_id, coalesce(other.name, other.normalized_name) AS other_name,
                        type(r) AS rel_type, r.percentage AS percentage, r.title AS title,
                        r.raw_text AS raw_text, r.source_section AS source_section,
                        r.confidence AS confidence, r.extraction_method AS extraction_method,
                        r.filing_url AS filing_url, r.filing_type AS filing_type,
                        r.filing_accession AS filing_accession, r.filing_date AS filing_date
                 LIMIT $limit",
                vec![("id", BoltType::from(id.to_string())), ("limit", BoltType::from(limit as i64))],
            )
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let other_id: String = row.get("other_id").unwrap_or_default();
            let other_name: String = row.get("other_name").unwrap_or_default();
            let rel_type: String = row.get("rel_type").unwrap_or_default();
            let percentage: Option<f64> = row.get("percentage").ok();
            let title: Option<String> = row.get("title").ok();
            let raw_text: String = row.get("raw_text").unwrap_or_default();
            let confidence: f64 = row.get("confidence").unwrap_or(0.9);
            let fact = evidence::relationship_to_fact("this entity", &other_name, &rel_type, percentage, title.as_deref());

            let chain = evidence::build_direct_evidence(
                &fact,
                "filing",
                &raw_text,
                row.get("filing_url").ok(),
                row.get("filing_type").ok(),
                row.get("filing_accession").ok(),
                row.get("filing_date").ok(),
                row.get("source_section").ok(),
                confidence,
                row.get("extraction_method").ok(),
            );

            out.push(DirectConnection { other_id, other_name, rel_type, evidence: chain });
        }
        Ok(out)
    }

    /// Four independent queries aggregated into a connection-strength
    /// summary: shared directors, executive overlaps, ownership paths up to
    /// 4 hops, and shared subsidiaries.
    pub async fn find_multi_layer_connections(&self, name_a: &str, name_b: &str) -> Result<Option<MultiLayerConnection>, PipelineError> {
        let Some(a_id) = self.resolve_entity_by_name(name_a).await? else {
            return Ok(None);
        };
        let Some(b_id) = self.resolve_entity_by_name(name_b).await? else {
            return Ok(None);
        };

        let board_interlocks = self.shared_directors(&a_id, &b_id).await?;
        let executive_overlaps = self.executive_overlaps(&a_id, &b_id).await?;
        let ownership_paths = self.ownership_paths(&a_id, &b_id).await?;
        let shared_subsidiaries = self.shared_subsidiaries(&a_id, &b_id).await?;

        let mut result = MultiLayerConnection {
            board_interlocks,
            executive_overlaps,
            ownership_paths,
            shared_subsidiaries,
            connection_strength: "none",
        };
        result.connection_strength = bucket_strength(result.total_signals());
        Ok(Some(result))
    }

    async fn shared_directors(&self, a_id: &str, b_id: &str) -> Result<Vec<String>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (p:Person)-[:DIRECTOR_OF]->(a:Company {id: $a_id})
                 MATCH (p)-[:DIRECTOR_OF]->(b:Company {id: $b_id})
                 RETURN DISTINCT p.name AS name",
                vec![("a_id", BoltType::from(a_id.to_string())), ("b_id", BoltType::from(b_id.to_string()))],
            )
            .await?;
        Ok(rows.into_iter().filter_map(|r| r.get::<String>("name").ok()).collect())
    }

    async fn executive_overlaps(&self, a_id: &str, b_id: &str) -> Result<Vec<String>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (p:Person)-[:OFFICER_OF|DIRECTOR_OF]->(a:Company {id: $a_id})
                 MATCH (p)-[:OFFICER_OF|DIRECTOR_OF]->(b:Company {id: $b_id})
                 RETURN DISTINCT p.name AS name",
                vec![("a_id", BoltType::from(a_id.to_string())), ("b_id", BoltType::from(b_id.to_string()))],
            )
            .await?;
        Ok(rows.into_iter().filter_map(|r| r.get::<String>("name").ok()).collect())
    }

    async fn ownership_paths(&self, a_id: &str, b_id: &str) -> Result<Vec<String>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (a:Company {id: $a_id}), (b:Company {id: $b_id})
                 MATCH path = (a)-[:OWNS*1..4]-(b)
                 RETURN [n IN nodes(path) | coalesce(n.name, n.normalized_name)] AS names
                 LIMIT 10",
                vec![("a_id", BoltType::from(a_id.to_string())), ("b_id", BoltType::from(b_id.to_string()))],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|r| r.get::<Vec<String>>("names").ok())
            .map(|names| names.join(" -> "))
            .collect())
    }

    async fn shared_subsidiaries(&self, a_id: &str, b_id: &str) -> Result<Vec<String>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (a:Company {id: $a_id})-[:OWNS]->(s:Company)<-[:OWNS]-(b:Company {id: $b_id})
                 RETURN DISTINCT s.name AS name",
                vec![("a_id", BoltType::from(a_id.to_string())), ("b_id", BoltType::from(b_id.to_string()))],
            )
            .await?;
        Ok(rows.into_iter().filter_map(|r| r.get::<String>("name").ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_strength_matches_the_spec_thresholds() {
        assert_eq!(bucket_strength(0), "none");
        assert_eq!(bucket_strength(2), "weak");
        assert_eq!(bucket_strength(5), "moderate");
        assert_eq!(bucket_strength(6), "strong");
    }

    #[test]
    fn multi_layer_connection_totals_across_all_four_categories() {
        let conn = MultiLayerConnection {
            board_interlocks: vec!["A".to_string()],
            executive_overlaps: vec!["B".to_string(), "C".to_string()],
            ownership_paths: vec![],
            shared_subsidiaries: vec!["D".to_string()],
            connection_strength: "none",
        };
        assert_eq!(conn.total_signals(), 4);
        assert_eq!(bucket_strength(conn.total_signals()), "moderate");
    }
}
