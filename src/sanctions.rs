//! Sanctions screening: an offline OFAC SDN matcher over [`SdnEntry`] lists,
//! plus a graph-backed [`SanctionsEngine`] for direct/indirect sanctions
//! exposure once a match has been linked into the graph.
//!
//! The two halves are deliberately separate. Matching against the SDN list
//! is a pure, graph-free computation over whatever entries
//! [`crate::ofac::OfacClient`] last cached; exposure is a traversal over
//! edges [`crate::entity_loader::EntityLoader::create_sanction_link`] has
//! already written. Keeping them apart means the matcher can be unit tested
//! with no graph at all.

use strsim::jaro_winkler;

use crate::error::PipelineError;
use crate::graph::GraphStore;
use crate::model::normalize_name;
use crate::ofac::SdnEntry;

pub const EXACT_MATCH_CONFIDENCE: f64 = 1.0;
pub const ALIAS_MATCH_CONFIDENCE: f64 = 0.95;
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.9;
pub const FUZZY_MATCH_CONFIDENCE: f64 = 0.8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Exact,
    Alias,
    Fuzzy,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::Exact => "exact",
            MatchType::Alias => "alias",
            MatchType::Fuzzy => "fuzzy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SdnMatch<'a> {
    pub entry: &'a SdnEntry,
    pub match_type: MatchType,
    pub matched_on: String,
    pub confidence: f64,
    pub requires_review: bool,
}

/// Screens `name` against `entries`: exact name match first, then an alias
/// match, then a Jaro-Winkler fuzzy match above [`FUZZY_MATCH_THRESHOLD`].
/// Fuzzy matches always set `requires_review = true` regardless of score.
pub fn find_matches<'a>(name: &str, entries: &'a [SdnEntry]) -> Vec<SdnMatch<'a>> {
    let normalized = normalize_name(name);
    let mut matches = Vec::new();

    for entry in entries {
        if normalize_name(&entry.name) == normalized {
            matches.push(SdnMatch {
                entry,
                match_type: MatchType::Exact,
                matched_on: entry.name.clone(),
                confidence: EXACT_MATCH_CONFIDENCE,
                requires_review: false,
            });
            continue;
        }

        if let Some(alias) = entry.aka_list.iter().find(|a| normalize_name(a) == normalized) {
            matches.push(SdnMatch {
                entry,
                match_type: MatchType::Alias,
                matched_on: alias.clone(),
                confidence: ALIAS_MATCH_CONFIDENCE,
                requires_review: false,
            });
            continue;
        }

        let score = jaro_winkler(&normalized, &normalize_name(&entry.name));
        if score >= FUZZY_MATCH_THRESHOLD {
            matches.push(SdnMatch {
                entry,
                match_type: MatchType::Fuzzy,
                matched_on: entry.name.clone(),
                confidence: FUZZY_MATCH_CONFIDENCE,
                requires_review: true,
            });
        }
    }

    matches
}

/// Whether a match is trustworthy enough to link into the graph without a
/// human review step. Fuzzy matches never auto-link.
pub fn auto_link(m: &SdnMatch) -> bool {
    m.confidence >= ALIAS_MATCH_CONFIDENCE && !m.requires_review
}

#[derive(Debug, Clone)]
pub struct SdnStats {
    pub total_entries: usize,
    pub individuals: usize,
    pub entities: usize,
    pub program_counts: Vec<(String, usize)>,
}

/// Aggregate counts over a cached SDN snapshot, for status/dashboard display.
pub fn get_sdn_stats(entries: &[SdnEntry]) -> SdnStats {
    use std::collections::HashMap;
    use crate::ofac::EntityType;

    let mut program_counts: HashMap<String, usize> = HashMap::new();
    let mut individuals = 0;
    let mut entities = 0;

    for entry in entries {
        match entry.entity_type {
            EntityType::Individual => individuals += 1,
            EntityType::Entity => entities += 1,
        }
        for program in &entry.programs {
            *program_counts.entry(program.clone()).or_insert(0) += 1;
        }
    }

    let mut program_counts: Vec<(String, usize)> = program_counts.into_iter().collect();
    program_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

    SdnStats {
        total_entries: entries.len(),
        individuals,
        entities,
        program_counts,
    }
}

/// Free-text search over names and aliases, case-insensitive substring match.
pub fn search_sanctioned_entities<'a>(query: &str, entries: &'a [SdnEntry]) -> Vec<&'a SdnEntry> {
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|e| {
            e.name.to_lowercase().contains(&needle) || e.aka_list.iter().any(|a| a.to_lowercase().contains(&needle))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SanctionsRiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl SanctionsRiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SanctionsRiskLevel::None => "none",
            SanctionsRiskLevel::Low => "low",
            SanctionsRiskLevel::Medium => "medium",
            SanctionsRiskLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndirectSanctionPath {
    pub sanctioned_name: String,
    pub hops: u32,
}

#[derive(Debug, Clone)]
pub struct SanctionsExposure {
    pub entity_id: String,
    pub is_directly_sanctioned: bool,
    pub direct_ids: Vec<String>,
    pub sanctioned_owners: Vec<String>,
    pub sanctioned_directors: Vec<String>,
    pub indirect_paths: Vec<IndirectSanctionPath>,
    pub risk_level: SanctionsRiskLevel,
}

pub struct SanctionsEngine<'a> {
    graph: &'a GraphStore,
}

impl<'a> SanctionsEngine<'a> {
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    async fn is_directly_sanctioned(&self, entity_id: &str) -> Result<bool, PipelineError> {
        use neo4rs::BoltType;
        let rows = self
            .graph
            .execute_query(
                "MATCH (e {id: $id}) WHERE e.is_sanctioned = true RETURN e.id AS id LIMIT 1",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;
        Ok(!rows.is_empty())
    }

    async fn sanctioned_owners(&self, entity_id: &str) -> Result<Vec<String>, PipelineError> {
        use neo4rs::BoltType;
        let rows = self
            .graph
            .execute_query(
                "MATCH (owner)-[:OWNS]->(c {id: $id})
                 WHERE owner.is_sanctioned = true
                 RETURN coalesce(owner.name, owner.normalized_name) AS name",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;
        Ok(rows.into_iter().filter_map(|r| r.get::<String>("name").ok()).collect())
    }

    async fn sanctioned_directors(&self, entity_id: &str) -> Result<Vec<String>, PipelineError> {
        use neo4rs::BoltType;
        let rows = self
            .graph
            .execute_query(
                "MATCH (p:Person)-[:DIRECTOR_OF|OFFICER_OF]->(c {id: $id})
                 WHERE p.is_sanctioned = true
                 RETURN DISTINCT p.name AS name",
                vec![("id", BoltType::from(entity_id.to_string()))],
            )
            .await?;
        Ok(rows.into_iter().filter_map(|r| r.get::<String>("name").ok()).collect())
    }

    /// Shortest paths (2..6 hops) from `entity_id` to any sanctioned node.
    async fn indirect_paths(&self, entity_id: &str, max_hops: u32) -> Result<Vec<IndirectSanctionPath>, PipelineError> {
        use neo4rs::BoltType;
        let max_hops = max_hops.clamp(2, 6);
        let cypher = format!(
            "MATCH (e {{id: $id}}), (s) WHERE s.is_sanctioned = true AND s.id <> $id
             MATCH path = shortestPath((e)-[:OWNS|OFFICER_OF|DIRECTOR_OF*2..{max_hops}]-(s))
             RETURN coalesce(s.name, s.normalized_name) AS name, length(path) AS hops
             ORDER BY hops ASC"
        );
        let rows = self
            .graph
            .execute_query(&cypher, vec![("id", BoltType::from(entity_id.to_string()))])
            .await?;

        Ok(rows
            .into_iter()
            .map(|r| IndirectSanctionPath {
                sanctioned_name: r.get("name").unwrap_or_default(),
                hops: r.get::<i64>("hops").unwrap_or(0) as u32,
            })
            .collect())
    }

    /// Full exposure computation: direct status, 1-hop owners/directors, and
    /// indirect paths beyond 1 hop with the direct set excluded so an owner
    /// counted at layer 1 doesn't also appear in the indirect layer.
    pub async fn get_sanctions_exposure(&self, entity_id: &str) -> Result<SanctionsExposure, PipelineError> {
        let is_directly_sanctioned = self.is_directly_sanctioned(entity_id).await?;
        let sanctioned_owners = self.sanctioned_owners(entity_id).await?;
        let sanctioned_directors = self.sanctioned_directors(entity_id).await?;

        let mut direct_ids: Vec<String> = Vec::new();
        direct_ids.extend(sanctioned_owners.iter().cloned());
        direct_ids.extend(sanctioned_directors.iter().cloned());

        let indirect_paths: Vec<IndirectSanctionPath> = self
            .indirect_paths(entity_id, 6)
            .await?
            .into_iter()
            .filter(|p| p.hops > 1 && !direct_ids.contains(&p.sanctioned_name))
            .collect();

        let risk_level = if is_directly_sanctioned {
            SanctionsRiskLevel::High
        } else if !sanctioned_owners.is_empty() || !sanctioned_directors.is_empty() {
            SanctionsRiskLevel::High
        } else if let Some(min_hops) = indirect_paths.iter().map(|p| p.hops).min() {
            if min_hops <= 2 { SanctionsRiskLevel::Medium } else { SanctionsRiskLevel::Low }
        } else {
            SanctionsRiskLevel::None
        };

        Ok(SanctionsExposure {
            entity_id: entity_id.to_string(),
            is_directly_sanctioned,
            direct_ids,
            sanctioned_owners,
            sanctioned_directors,
            indirect_paths,
            risk_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ofac::EntityType;

    fn entry(uid: &str, name: &str, aka: &[&str]) -> SdnEntry {
        SdnEntry {
            uid: uid.to_string(),
            name: name.to_string(),
            entity_type: EntityType::Entity,
            programs: vec!["SDGT".to_string()],
            aka_list: aka.iter().map(|s| s.to_string()).collect(),
            addresses: Vec::new(),
            nationality: None,
            date_of_birth: None,
            id_numbers: Vec::new(),
            remarks: None,
        }
    }

    #[test]
    fn exact_match_has_full_confidence_and_auto_links() {
        let entries = vec![entry("1", "Acme Holdings", &[])];
        let matches = find_matches("acme holdings", &entries);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Exact);
        assert_eq!(matches[0].confidence, EXACT_MATCH_CONFIDENCE);
        assert!(auto_link(&matches[0]));
    }

    #[test]
    fn alias_match_auto_links() {
        let entries = vec![entry("1", "Acme Holdings", &["Acme Trading Co"])];
        let matches = find_matches("Acme Trading Co", &entries);
        assert_eq!(matches[0].match_type, MatchType::Alias);
        assert!(auto_link(&matches[0]));
    }

    #[test]
    fn fuzzy_match_never_auto_links_even_above_threshold() {
        let entries = vec![entry("1", "Vladimir Petrovich Ivanov", &[])];
        let matches = find_matches("Vladimir Petrovic Ivanov", &entries);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].match_type, MatchType::Fuzzy);
        assert!(matches[0].confidence >= FUZZY_MATCH_THRESHOLD || matches[0].confidence == FUZZY_MATCH_CONFIDENCE);
        assert!(matches[0].requires_review);
        assert!(!auto_link(&matches[0]));
    }

    #[test]
    fn no_match_below_fuzzy_threshold() {
        let entries = vec![entry("1", "Totally Unrelated Corp", &[])];
        let matches = find_matches("Zzyzx Nominee Ltd", &entries);
        assert!(matches.is_empty());
    }

    #[test]
    fn sdn_stats_counts_by_entity_type_and_program() {
        let entries = vec![entry("1", "A", &[]), entry("2", "B", &[])];
        let stats = get_sdn_stats(&entries);
        assert_eq!(stats.total_entries, 2);
        assert_eq!(stats.entities, 2);
        assert_eq!(stats.program_counts[0], ("SDGT".to_string(), 2));
    }
}
