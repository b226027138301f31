//! Evidence chains: the citation-preserving shape every graph-analysis
//! service (`connections`, `risk`, `sanctions`) returns a claim in, rather
//! than a bare score or boolean.
//!
//! A claim is only as credible as the text it's built from — every
//! [`EvidenceStep`] carries the exact source snippet plus a truncated hash
//! so a caller can verify the quote wasn't altered downstream of extraction.

use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimType {
    Direct,
    Computed,
    Inferred,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Direct => "direct",
            ClaimType::Computed => "computed",
            ClaimType::Inferred => "inferred",
        }
    }
}

/// SHA-256 of `text`, truncated to 16 hex chars — enough to detect
/// tampering without carrying a full digest through every response.
pub fn hash_text(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    hex_prefix(&digest, 8)
}

fn hex_prefix(bytes: &[u8], n: usize) -> String {
    bytes.iter().take(n).map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone)]
pub struct EvidenceStep {
    pub step: u32,
    pub fact: String,
    pub claim_type: ClaimType,
    pub source_type: String,
    pub filing_url: Option<String>,
    pub filing_type: Option<String>,
    pub filing_accession: Option<String>,
    pub filing_date: Option<String>,
    pub source_section: Option<String>,
    pub raw_text: String,
    pub raw_text_hash: String,
    pub confidence: f64,
    pub extraction_method: Option<String>,
}

/// Path segment data pulled off a Cypher row, before being turned into an
/// [`EvidenceStep`].
#[derive(Debug, Clone, Default)]
pub struct PathSegment {
    pub from_name: String,
    pub to_name: String,
    pub rel_type: String,
    pub fact: String,
    pub source_type: String,
    pub filing_url: Option<String>,
    pub filing_type: Option<String>,
    pub filing_accession: Option<String>,
    pub filing_date: Option<String>,
    pub source_section: Option<String>,
    pub raw_text: String,
    pub confidence: Option<f64>,
    pub extraction_method: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EvidenceChain {
    pub claim: String,
    pub claim_type: ClaimType,
    pub overall_confidence: f64,
    pub evidence_steps: Vec<EvidenceStep>,
    pub graph_path: Option<String>,
}

impl EvidenceChain {
    pub fn step_count(&self) -> usize {
        self.evidence_steps.len()
    }

    pub fn has_source_text(&self) -> bool {
        self.evidence_steps.iter().any(|s| !s.raw_text.is_empty())
    }
}

const MAX_RAW_TEXT_CHARS: usize = 1000;

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// A single direct fact sourced from one document.
pub fn build_direct_evidence(
    fact: &str,
    source_type: &str,
    raw_text: &str,
    filing_url: Option<String>,
    filing_type: Option<String>,
    filing_accession: Option<String>,
    filing_date: Option<String>,
    source_section: Option<String>,
    confidence: f64,
    extraction_method: Option<String>,
) -> EvidenceChain {
    let truncated = truncate(raw_text, MAX_RAW_TEXT_CHARS);
    let step = EvidenceStep {
        step: 1,
        fact: fact.to_string(),
        claim_type: ClaimType::Direct,
        source_type: source_type.to_string(),
        filing_url,
        filing_type,
        filing_accession,
        filing_date,
        source_section,
        raw_text_hash: hash_text(&truncated),
        raw_text: truncated,
        confidence,
        extraction_method,
    };

    EvidenceChain {
        claim: fact.to_string(),
        claim_type: ClaimType::Direct,
        overall_confidence: confidence,
        evidence_steps: vec![step],
        graph_path: None,
    }
}

/// Chains path segments from a graph traversal into one inferred claim —
/// the chain's confidence is the minimum across every hop, since a claim is
/// only as strong as its weakest link.
pub fn build_connection_evidence(entity_a_name: &str, entity_b_name: &str, path_segments: &[PathSegment]) -> EvidenceChain {
    let mut steps = Vec::new();
    let mut path_parts = Vec::new();
    let mut min_confidence = 1.0_f64;

    for (i, segment) in path_segments.iter().enumerate() {
        let confidence = segment.confidence.unwrap_or(0.9);
        let truncated = truncate(&segment.raw_text, MAX_RAW_TEXT_CHARS);

        steps.push(EvidenceStep {
            step: (i + 1) as u32,
            fact: segment.fact.clone(),
            claim_type: ClaimType::Direct,
            source_type: segment.source_type.clone(),
            filing_url: segment.filing_url.clone(),
            filing_type: segment.filing_type.clone(),
            filing_accession: segment.filing_accession.clone(),
            filing_date: segment.filing_date.clone(),
            source_section: segment.source_section.clone(),
            raw_text_hash: hash_text(&truncated),
            raw_text: truncated,
            confidence,
            extraction_method: segment.extraction_method.clone(),
        });

        min_confidence = min_confidence.min(confidence);
        path_parts.push(format!("{} -[{}]-> {}", segment.from_name, segment.rel_type, segment.to_name));
    }

    EvidenceChain {
        claim: format!("{entity_a_name} is connected to {entity_b_name}"),
        claim_type: ClaimType::Inferred,
        overall_confidence: min_confidence,
        evidence_steps: steps,
        graph_path: Some(path_parts.join(" | ")),
    }
}

/// Renders a relationship edge into a human-readable sentence for evidence
/// display — falls back to a generic "is connected to" for edge types this
/// pipeline doesn't have a template for.
pub fn relationship_to_fact(from_name: &str, to_name: &str, rel_type: &str, percentage: Option<f64>, title: Option<&str>) -> String {
    match rel_type {
        "OWNS" => {
            let pct = percentage.map(|p| format!("{p}%")).unwrap_or_else(|| "an unknown percentage".to_string());
            format!("{from_name} owns {pct} of {to_name}")
        }
        "OFFICER_OF" => format!("{from_name} is {} of {to_name}", title.unwrap_or("an officer")),
        "DIRECTOR_OF" => format!("{from_name} is a director of {to_name}"),
        "REGISTERED_AT" => format!("{from_name} is registered at {to_name}"),
        "INCORPORATED_IN" => format!("{from_name} is incorporated in {to_name}"),
        "SUBSIDIARY_OF" => format!("{from_name} is a subsidiary of {to_name}"),
        "FILED" => format!("{from_name} filed {to_name}"),
        _ => format!("{from_name} is connected to {to_name}"),
    }
}

/// Picks a single connection-type label for a path from the distinct
/// relationship types it crosses, in priority order (ownership first).
pub fn determine_connection_type(rel_types: &[String]) -> &'static str {
    let set: std::collections::HashSet<&str> = rel_types.iter().map(String::as_str).collect();
    if set.contains("OWNS") {
        "ownership"
    } else if set.contains("DIRECTOR_OF") {
        "directorship"
    } else if set.contains("OFFICER_OF") {
        "executive"
    } else if set.contains("REGISTERED_AT") {
        "address"
    } else if set.contains("INCORPORATED_IN") {
        "jurisdiction"
    } else {
        "indirect"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_text_is_stable_and_truncated() {
        let h1 = hash_text("hello");
        let h2 = hash_text("hello");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16);
    }

    #[test]
    fn relationship_to_fact_uses_percentage_template_for_owns() {
        let fact = relationship_to_fact("Acme", "Widget Co", "OWNS", Some(51.0), None);
        assert_eq!(fact, "Acme owns 51% of Widget Co");
    }

    #[test]
    fn connection_type_prefers_ownership_over_directorship() {
        let types = vec!["DIRECTOR_OF".to_string(), "OWNS".to_string()];
        assert_eq!(determine_connection_type(&types), "ownership");
    }

    #[test]
    fn connection_evidence_confidence_is_the_weakest_hop() {
        let segments = vec![
            PathSegment { confidence: Some(0.95), ..Default::default() },
            PathSegment { confidence: Some(0.6), ..Default::default() },
        ];
        let chain = build_connection_evidence("A", "B", &segments);
        assert_eq!(chain.overall_confidence, 0.6);
        assert_eq!(chain.step_count(), 2);
    }
}
