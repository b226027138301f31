//! Graph-traversal risk scoring: seven independent factor detectors against
//! an entity, each contributing a weight and an [`evidence::EvidenceStep`] if
//! triggered.
//!
//! Circular-ownership detection (`(c)-[:OWNS*2..6]->(c)`) is a bounded graph
//! traversal the driver's own variable-length path syntax expresses
//! directly — no hand-rolled cycle detection needed.

use neo4rs::BoltType;

use crate::error::PipelineError;
use crate::evidence::{self, ClaimType, EvidenceStep};
use crate::graph::GraphStore;

const FACTOR_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct RiskFactor {
    pub name: &'static str,
    pub weight: u32,
    pub step: EvidenceStep,
}

#[derive(Debug, Clone)]
pub struct RiskAssessment {
    pub entity_id: String,
    pub risk_score: u32,
    pub risk_level: &'static str,
    pub factor_count: usize,
    pub factors: Vec<RiskFactor>,
    pub overall_confidence: f64,
}

/// `≤20 LOW, ≤50 MEDIUM, ≤75 HIGH, ≥76 CRITICAL`.
pub fn bucket_risk_level(score: u32) -> &'static str {
    match score {
        0..=20 => "low",
        21..=50 => "medium",
        51..=75 => "high",
        _ => "critical",
    }
}

fn step(fact: String, confidence: f64) -> EvidenceStep {
    EvidenceStep {
        step: 1,
        fact,
        claim_type: ClaimType::Inferred,
        source_type: "graph".to_string(),
        filing_url: None,
        filing_type: None,
        filing_accession: None,
        filing_date: None,
        source_section: None,
        raw_text: String::new(),
        raw_text_hash: evidence::hash_text(""),
        confidence,
        extraction_method: None,
    }
}

pub struct RiskEngine<'a> {
    graph: &'a GraphStore,
}

impl<'a> RiskEngine<'a> {
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// Runs all seven factor detectors against `entity_id` and aggregates
    /// them into a weighted, bucketed [`RiskAssessment`].
    pub async fn assess(&self, entity_id: &str) -> Result<RiskAssessment, PipelineError> {
        let mut factors = Vec::new();
        if let Some(f) = self.secrecy_jurisdiction(entity_id).await? {
            factors.push(f);
        }
        if let Some(f) = self.mass_registration_address(entity_id).await? {
            factors.push(f);
        }
        if let Some(f) = self.circular_ownership(entity_id).await? {
            factors.push(f);
        }
        if let Some(f) = self.long_ownership_chain(entity_id).await? {
            factors.push(f);
        }
        if let Some(f) = self.nominee_director(entity_id).await? {
            factors.push(f);
        }
        if let Some(f) = self.pep_connection(entity_id).await? {
            factors.push(f);
        }
        if let Some(f) = self.sanctioned_connection(entity_id).await? {
            factors.push(f);
        }

        let risk_score: u32 = factors.iter().map(|f| f.weight).sum();
        let overall_confidence = if factors.is_empty() {
            1.0
        } else {
            factors.iter().map(|f| f.step.confidence).sum::<f64>() / factors.len() as f64
        };

        Ok(RiskAssessment {
            entity_id: entity_id.to_string(),
            risk_score,
            risk_level: bucket_risk_level(risk_score),
            factor_count: factors.len(),
            overall_confidence,
            factors,
        })
    }

    /// `INCORPORATED_IN` a jurisdiction flagged secret, or with
    /// `secrecy_score ≥ 50` (weight 20, 30 if `≥ 70`).
    async fn secrecy_jurisdiction(&self, entity_id: &str) -> Result<Option<RiskFactor>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (c {id: $id})-[:INCORPORATED_IN]->(j:Jurisdiction)
                 WHERE j.is_secrecy_jurisdiction = true OR j.secrecy_score >= 50
                 RETURN j.name AS name, j.secrecy_score AS secrecy_score
                 LIMIT 1",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else { return Ok(None) };
        let name: String = row.get("name").unwrap_or_default();
        let score: i64 = row.get("secrecy_score").unwrap_or(0);
        let weight = if score >= 70 { 30 } else { 20 };
        Ok(Some(RiskFactor {
            name: "secrecy_jurisdiction",
            weight,
            step: step(format!("Incorporated in {name}, a secrecy jurisdiction (score {score})"), FACTOR_CONFIDENCE),
        }))
    }

    /// `REGISTERED_AT` an address shared by more than 50 other entities.
    async fn mass_registration_address(&self, entity_id: &str) -> Result<Option<RiskFactor>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (c {id: $id})-[:REGISTERED_AT]->(addr:Address)
                 MATCH (addr)<-[:REGISTERED_AT]-(other)
                 WITH addr, count(DISTINCT other) AS registrant_count
                 WHERE registrant_count > 50
                 RETURN addr.raw_text AS raw_text, registrant_count
                 ORDER BY registrant_count DESC
                 LIMIT 1",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else { return Ok(None) };
        let raw_text: String = row.get("raw_text").unwrap_or_default();
        let count: i64 = row.get("registrant_count").unwrap_or(0);
        Ok(Some(RiskFactor {
            name: "mass_registration_address",
            weight: 15,
            step: step(format!("Registered at an address shared by {count} entities ({raw_text})"), FACTOR_CONFIDENCE),
        }))
    }

    /// `(c)-[:OWNS*2..6]->(c)` — a cycle in the ownership graph reachable
    /// from the entity back to itself.
    async fn circular_ownership(&self, entity_id: &str) -> Result<Option<RiskFactor>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH path = (c {id: $id})-[:OWNS*2..6]->(c)
                 RETURN length(path) AS hops
                 LIMIT 1",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else { return Ok(None) };
        let hops: i64 = row.get("hops").unwrap_or(0);
        Ok(Some(RiskFactor {
            name: "circular_ownership",
            weight: 25,
            step: step(format!("Ownership cycle of length {hops} back to this entity"), FACTOR_CONFIDENCE),
        }))
    }

    /// Any incoming ownership path longer than 4 hops.
    async fn long_ownership_chain(&self, entity_id: &str) -> Result<Option<RiskFactor>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH path = (owner)-[:OWNS*5..10]->(c {id: $id})
                 RETURN length(path) AS hops
                 ORDER BY hops DESC
                 LIMIT 1",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else { return Ok(None) };
        let hops: i64 = row.get("hops").unwrap_or(0);
        Ok(Some(RiskFactor {
            name: "long_ownership_chain",
            weight: 10,
            step: step(format!("Ownership chain of {hops} hops leads to this entity"), FACTOR_CONFIDENCE),
        }))
    }

    /// A director of this entity sits on 10 or more boards.
    async fn nominee_director(&self, entity_id: &str) -> Result<Option<RiskFactor>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (p:Person)-[:DIRECTOR_OF]->(c {id: $id})
                 MATCH (p)-[:DIRECTOR_OF]->(other:Company)
                 WITH p, count(DISTINCT other) AS board_count
                 WHERE board_count >= 10
                 RETURN p.name AS name, board_count
                 ORDER BY board_count DESC
                 LIMIT 1",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else { return Ok(None) };
        let name: String = row.get("name").unwrap_or_default();
        let board_count: i64 = row.get("board_count").unwrap_or(0);
        Ok(Some(RiskFactor {
            name: "nominee_director",
            weight: 15,
            step: step(format!("Director {name} sits on {board_count} boards"), FACTOR_CONFIDENCE),
        }))
    }

    /// Any `OWNS|OFFICER_OF|DIRECTOR_OF` neighbor flagged as a politically
    /// exposed person.
    async fn pep_connection(&self, entity_id: &str) -> Result<Option<RiskFactor>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (p:Person)-[:OWNS|OFFICER_OF|DIRECTOR_OF]->(c {id: $id})
                 WHERE p.is_pep = true
                 RETURN p.name AS name
                 LIMIT 1",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else { return Ok(None) };
        let name: String = row.get("name").unwrap_or_default();
        Ok(Some(RiskFactor {
            name: "pep_connection",
            weight: 20,
            step: step(format!("Politically exposed person {name} connected to this entity"), FACTOR_CONFIDENCE),
        }))
    }

    /// Any `OWNS|OFFICER_OF|DIRECTOR_OF` neighbor flagged as sanctioned.
    async fn sanctioned_connection(&self, entity_id: &str) -> Result<Option<RiskFactor>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (p)-[:OWNS|OFFICER_OF|DIRECTOR_OF]->(c {id: $id})
                 WHERE p.is_sanctioned = true
                 RETURN coalesce(p.name, p.normalized_name) AS name
                 LIMIT 1",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else { return Ok(None) };
        let name: String = row.get("name").unwrap_or_default();
        Ok(Some(RiskFactor {
            name: "sanctioned_connection",
            weight: 40,
            step: step(format!("Sanctioned entity {name} connected to this entity"), FACTOR_CONFIDENCE),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_risk_level_matches_the_spec_thresholds() {
        assert_eq!(bucket_risk_level(0), "low");
        assert_eq!(bucket_risk_level(20), "low");
        assert_eq!(bucket_risk_level(21), "medium");
        assert_eq!(bucket_risk_level(50), "medium");
        assert_eq!(bucket_risk_level(51), "high");
        assert_eq!(bucket_risk_level(75), "high");
        assert_eq!(bucket_risk_level(76), "critical");
    }

    #[test]
    fn scenario_secrecy_plus_nominee_plus_sanctioned_is_critical() {
        // Company C: INCORPORATED_IN jurisdiction(secrecy_score=75), one
        // director on 12 boards, one sanctioned officer.
        let factors = vec![
            RiskFactor { name: "secrecy_jurisdiction", weight: 30, step: step("x".to_string(), 0.9) },
            RiskFactor { name: "nominee_director", weight: 15, step: step("y".to_string(), 0.9) },
            RiskFactor { name: "sanctioned_connection", weight: 40, step: step("z".to_string(), 0.9) },
        ];
        let score: u32 = factors.iter().map(|f| f.weight).sum();
        assert_eq!(score, 85);
        assert_eq!(bucket_risk_level(score), "critical");
        assert_eq!(factors.len(), 3);
    }
}
