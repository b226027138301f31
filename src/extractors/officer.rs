//! Extracts officer and director records from DEF 14A proxy statement HTML.
//!
//! Table rows are the primary, highest-confidence source (`RULE_BASED_CONFIDENCE`).
//! When a filing's table layout doesn't yield at least one officer and one
//! director, a narrative scan over paragraph/bold text within recognized
//! section headers supplements the table pass, and if that still comes up
//! short the `TextAnalyzer` fallback runs over the officer/director section
//! text and any LLM-found records are merged in (`Hybrid`) rather than
//! replacing the rule-based ones. Name validation is delegated to
//! [`crate::name_validator`] rather than re-implemented here.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::Serialize;

use super::{ExtractionMetadata, ExtractionMethod, ExtractionResult, TextAnalyzer, truncate_snippet};
use crate::error::PipelineError;
use crate::name_validator::is_valid_name;
use crate::review_queue::{ExtractionType, NewReviewItem, ReviewQueue};

const RULE_BASED_CONFIDENCE: f64 = 0.95;
const MAX_SNIPPET_LENGTH: usize = 300;

const EXECUTIVE_TITLES: &[&str] = &[
    "chief executive officer", "ceo", "chief financial officer", "cfo",
    "chief operating officer", "coo", "chief technology officer", "cto",
    "chief information officer", "cio", "chief marketing officer", "cmo",
    "chief legal officer", "clo", "chief human resources officer", "chro",
    "chief strategy officer", "cso", "president", "executive vice president",
    "evp", "senior vice president", "svp", "general counsel", "treasurer",
    "controller", "secretary",
];

const DIRECTOR_INDICATORS: &[&str] = &[
    "director", "board member", "chairman", "chair", "lead independent",
    "independent director", "non-executive",
];

static SECTION_HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(executive\s*officers?|directors?\s*and\s*executive\s*officers?|board\s*of\s*directors?|our\s*directors?|named\s*executive\s*officers?|management|directors?\s*nominees?|election\s*of\s*directors?|nominees?\s*for\s*director|director\s*nominees?|continuing\s*directors?|independent\s*directors?|non-employee\s*directors?|members?\s*of\s*the\s*board|biographical\s*information)",
    )
    .unwrap()
});

static AGE_INLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*([A-Z][a-zA-Z.]+(?:\s+[A-Z][a-zA-Z.]+){1,3}),?\s*(?:age\s*)?(\d{2})[,\s]").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static FOOTNOTE_REF_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\(\d+\)").unwrap());

fn word_match(term: &str, text: &str) -> bool {
    if term.len() <= 4 {
        let pattern = format!(r"(?i)\b{}\b", regex::escape(term));
        Regex::new(&pattern).map(|re| re.is_match(text)).unwrap_or(false)
    } else {
        text.to_lowercase().contains(&term.to_lowercase())
    }
}

fn classify_role(title: &str) -> (bool, bool, bool) {
    if title.is_empty() {
        return (false, false, false);
    }
    let title_lower = title.to_lowercase();
    let is_director = DIRECTOR_INDICATORS.iter().any(|t| word_match(t, &title_lower));
    let is_executive = EXECUTIVE_TITLES.iter().any(|t| word_match(t, &title_lower));
    let is_officer = is_executive
        || ["vice president", "vp", "officer", "counsel", "secretary", "treasurer"]
            .iter()
            .any(|t| word_match(t, &title_lower));
    (is_director, is_officer, is_executive)
}

fn clean_text(text: &str) -> String {
    let text = WHITESPACE_RE.replace_all(text.trim(), " ");
    let text = FOOTNOTE_REF_RE.replace_all(&text, "");
    text.trim().to_string()
}

#[derive(Debug, Clone, Serialize)]
pub struct Officer {
    pub name: String,
    pub title: Option<String>,
    pub is_director: bool,
    pub is_officer: bool,
    pub is_executive: bool,
    pub age: Option<u32>,
}

fn parse_age(text: &str) -> Option<u32> {
    let trimmed = text.trim();
    let age: u32 = trimmed.parse().ok()?;
    if (30..=95).contains(&age) { Some(age) } else { None }
}

/// Finds the relevant section name for a table by scanning the header text
/// that precedes it in document order. `element_index` is the position of the
/// table within the flattened `"h1,h2,h3,h4,p,table"` selection.
fn section_name_for(header_stack: &[String]) -> Option<String> {
    header_stack.last().cloned()
}

pub struct OfficerParser;

impl Default for OfficerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OfficerParser {
    pub fn new() -> Self {
        Self
    }

    /// Rule-based pass only. A caller (typically `extract`) decides whether
    /// the result needs LLM supplementation.
    fn parse_tables(&self, html: &Html) -> Vec<Officer> {
        let mut records = Vec::new();
        let mut seen = std::collections::HashSet::new();

        let table_sel = Selector::parse("table").unwrap();
        let row_sel = Selector::parse("tr").unwrap();
        let cell_sel = Selector::parse("th,td").unwrap();

        for table in html.select(&table_sel) {
            let table_text = table.text().collect::<String>().to_lowercase();
            if !SECTION_HEADER_RE.is_match(&table_text) {
                continue;
            }
            let section_name = SECTION_HEADER_RE
                .find(&table_text)
                .map(|m| m.as_str().trim().chars().take(100).collect::<String>());

            let rows: Vec<ElementRef> = table.select(&row_sel).collect();
            if rows.len() < 2 {
                continue;
            }

            let header_cells: Vec<String> = rows[0]
                .select(&cell_sel)
                .map(|c| c.text().collect::<String>().trim().to_lowercase())
                .collect();

            let mut name_col = None;
            let mut title_col = None;
            let mut age_col = None;
            for (i, h) in header_cells.iter().enumerate() {
                if ["name", "director", "officer"].iter().any(|w| h.contains(w)) {
                    name_col = Some(i);
                }
                if ["title", "position", "office"].iter().any(|w| h.contains(w)) {
                    title_col = Some(i);
                }
                if h.contains("age") {
                    age_col = Some(i);
                }
            }
            if name_col.is_none() && header_cells.len() >= 2 {
                name_col = Some(0);
                title_col = Some(1);
            }
            let Some(name_col) = name_col else { continue };

            for row in &rows[1..] {
                let cells: Vec<ElementRef> = row.select(&cell_sel).collect();
                if cells.len() <= name_col {
                    continue;
                }
                let raw_name = clean_text(&cells[name_col].text().collect::<String>());
                if !is_valid_name(&raw_name) {
                    continue;
                }
                let title = title_col
                    .and_then(|c| cells.get(c))
                    .map(|c| clean_text(&c.text().collect::<String>()))
                    .filter(|t| !t.is_empty());
                let age = age_col
                    .and_then(|c| cells.get(c))
                    .and_then(|c| parse_age(&c.text().collect::<String>()));

                let (mut is_director, mut is_officer, mut is_executive) =
                    title.as_deref().map(classify_role).unwrap_or((false, false, false));
                if !(is_director || is_officer || is_executive) {
                    if let Some(section) = &section_name {
                        let section_lower = section.to_lowercase();
                        if ["board of director", "director nominee", "our director", "election of director"]
                            .iter()
                            .any(|kw| section_lower.contains(kw))
                        {
                            is_director = true;
                        } else if ["executive officer", "named executive", "management"]
                            .iter()
                            .any(|kw| section_lower.contains(kw))
                        {
                            is_officer = true;
                            is_executive = true;
                        }
                    }
                }

                if seen.insert(raw_name.to_lowercase()) {
                    records.push(Officer {
                        name: raw_name,
                        title,
                        is_director,
                        is_officer,
                        is_executive,
                        age,
                    });
                }
            }
        }

        records
    }

    /// Narrative fallback: scans paragraph and bold-tag text for "Name, Age
    /// NN, Title" shapes within recognized officer/director sections, tracked
    /// via the most recently seen header in document order.
    fn parse_narrative(&self, html: &Html, seen: &mut std::collections::HashSet<String>) -> Vec<Officer> {
        let mut records = Vec::new();
        let sel = Selector::parse("h1,h2,h3,h4,p,b,strong").unwrap();
        let mut header_stack: Vec<String> = Vec::new();
        let mut in_section = false;

        for el in html.select(&sel) {
            let tag = el.value().name();
            let text = el.text().collect::<String>();
            let lower = text.to_lowercase();

            if matches!(tag, "h1" | "h2" | "h3" | "h4") {
                if SECTION_HEADER_RE.is_match(&lower) {
                    header_stack.push(text.trim().chars().take(100).collect());
                    in_section = true;
                } else {
                    in_section = false;
                }
                continue;
            }

            if !in_section {
                continue;
            }

            let trimmed = text.trim();
            if trimmed.len() < 10 {
                continue;
            }
            let snippet = truncate_snippet(trimmed, MAX_SNIPPET_LENGTH);

            if let Some(caps) = AGE_INLINE_RE.captures(trimmed) {
                let raw_name = caps[1].trim().to_string();
                if is_valid_name(&raw_name) && seen.insert(raw_name.to_lowercase()) {
                    let age = caps[2].parse::<u32>().ok().filter(|a| (30..=95).contains(a));
                    let title = trimmed
                        .get(caps.get(0).unwrap().end()..)
                        .map(|rest| rest.split('.').next().unwrap_or("").trim().to_string())
                        .filter(|t| !t.is_empty());
                    let (is_director, is_officer, is_executive) =
                        title.as_deref().map(classify_role).unwrap_or((false, false, false));
                    records.push(Officer {
                        name: raw_name,
                        title,
                        is_director,
                        is_officer,
                        is_executive,
                        age,
                    });
                    let _ = &snippet;
                    let _ = section_name_for(&header_stack);
                }
            }
        }

        records
    }

    /// Full extraction pipeline: rule-based tables, then narrative
    /// supplementation, then (if still short) the LLM fallback merged in as
    /// `Hybrid`. Enqueues to `review_queue` on outright failure or low
    /// confidence, matching every other extractor in this module.
    pub async fn extract(
        &self,
        html: &str,
        filing_accession: &str,
        company_cik: &str,
        company_name: &str,
        analyzer: Option<&dyn TextAnalyzer>,
        review_queue: &ReviewQueue,
    ) -> Result<ExtractionResult<Officer>, PipelineError> {
        let doc = Html::parse_document(html);
        let mut seen: std::collections::HashSet<String> =
            std::collections::HashSet::new();

        let mut records = self.parse_tables(&doc);
        for r in &records {
            seen.insert(r.name.to_lowercase());
        }
        records.extend(self.parse_narrative(&doc, &mut seen));

        let has_officers = records.iter().any(|r| r.is_officer || r.is_executive);
        let has_directors = records.iter().any(|r| r.is_director);

        let needs_llm = records.is_empty()
            || (has_officers && !has_directors)
            || records.len() < 3;

        let mut warnings = Vec::new();
        let (method, confidence) = if !needs_llm {
            (ExtractionMethod::RuleBased, RULE_BASED_CONFIDENCE)
        } else if let Some(analyzer) = analyzer {
            let prompt = format!(
                "Extract officers and directors (name, title, is_director, is_officer, is_executive, age) as JSON from this DEF 14A excerpt:\n\n{}",
                truncate_snippet(html, 30_000)
            );
            match analyzer.analyze(&prompt).await {
                Ok(value) => {
                    let llm_records = parse_llm_officers(&value);
                    if llm_records.is_empty() {
                        if records.is_empty() {
                            enqueue_failure(review_queue, filing_accession, company_cik, company_name, html)?;
                            warnings.push("extraction failed - added to review queue".to_string());
                            (ExtractionMethod::RuleBased, 0.0)
                        } else {
                            warnings.push("partial extraction only (LLM found nothing additional)".to_string());
                            (ExtractionMethod::RuleBased, 0.7)
                        }
                    } else if records.is_empty() {
                        records = llm_records;
                        warnings.push("used LLM extraction (rule-based failed)".to_string());
                        (ExtractionMethod::Llm, 0.8)
                    } else {
                        for llm_record in llm_records {
                            if seen.insert(llm_record.name.to_lowercase()) {
                                records.push(llm_record);
                            }
                        }
                        warnings.push("used hybrid extraction".to_string());
                        (ExtractionMethod::Hybrid, 0.90)
                    }
                }
                Err(_) => {
                    if records.is_empty() {
                        enqueue_failure(review_queue, filing_accession, company_cik, company_name, html)?;
                        warnings.push("extraction failed - added to review queue".to_string());
                        (ExtractionMethod::RuleBased, 0.0)
                    } else {
                        warnings.push("partial extraction only (LLM call failed)".to_string());
                        (ExtractionMethod::RuleBased, 0.7)
                    }
                }
            }
        } else if records.is_empty() {
            enqueue_failure(review_queue, filing_accession, company_cik, company_name, html)?;
            warnings.push("extraction failed - added to review queue".to_string());
            (ExtractionMethod::RuleBased, 0.0)
        } else {
            warnings.push("partial extraction only (no LLM analyzer configured)".to_string());
            (ExtractionMethod::RuleBased, 0.7)
        };

        if !records.is_empty() && confidence < super::LLM_CONFIDENCE_THRESHOLD {
            let attempted = serde_json::to_string(&records).unwrap_or_default();
            review_queue.add_low_confidence(
                NewReviewItem {
                    filing_accession: filing_accession.to_string(),
                    filing_type: "DEF 14A".to_string(),
                    company_cik: company_cik.to_string(),
                    company_name: company_name.to_string(),
                    extraction_type: ExtractionType::Officer,
                    raw_text: truncate_snippet(html, 50_000),
                    attempted_extraction: attempted,
                    failure_reason: None,
                    confidence: None,
                },
                confidence,
            )?;
            warnings.push(format!("low confidence ({confidence:.2}) - added to review queue"));
        }

        Ok(ExtractionResult {
            records,
            metadata: ExtractionMetadata {
                method,
                confidence,
                source_filing_id: Some(filing_accession.to_string()),
                source_url: None,
                section_name: None,
                table_name: None,
            },
            warnings,
            filing_date: None,
            filing_url: None,
        })
    }
}

fn enqueue_failure(
    review_queue: &ReviewQueue,
    filing_accession: &str,
    company_cik: &str,
    company_name: &str,
    html: &str,
) -> Result<(), PipelineError> {
    review_queue.add_failed_extraction(
        NewReviewItem {
            filing_accession: filing_accession.to_string(),
            filing_type: "DEF 14A".to_string(),
            company_cik: company_cik.to_string(),
            company_name: company_name.to_string(),
            extraction_type: ExtractionType::Officer,
            raw_text: truncate_snippet(html, 50_000),
            attempted_extraction: "[]".to_string(),
            failure_reason: None,
            confidence: None,
        },
        "both rule-based and LLM extraction failed",
    )?;
    Ok(())
}

fn parse_llm_officers(value: &serde_json::Value) -> Vec<Officer> {
    let Some(arr) = value.as_array().or_else(|| value.get("officers").and_then(|v| v.as_array()))
    else {
        return Vec::new();
    };

    arr.iter()
        .filter_map(|item| {
            let name = item.get("name")?.as_str()?.to_string();
            if !is_valid_name(&name) {
                return None;
            }
            let title = item.get("title").and_then(|v| v.as_str()).map(str::to_string);
            let age = item.get("age").and_then(|v| v.as_u64()).map(|a| a as u32);
            let (is_director, is_officer, is_executive) = match (
                item.get("is_director").and_then(|v| v.as_bool()),
                item.get("is_officer").and_then(|v| v.as_bool()),
                item.get("is_executive").and_then(|v| v.as_bool()),
            ) {
                (Some(d), Some(o), Some(e)) if d || o || e => (d, o, e),
                _ => title.as_deref().map(classify_role).unwrap_or((false, false, false)),
            };
            Some(Officer { name, title, is_director, is_officer, is_executive, age })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubAnalyzer;

    #[async_trait::async_trait]
    impl TextAnalyzer for StubAnalyzer {
        async fn analyze(&self, _prompt: &str) -> Result<serde_json::Value, PipelineError> {
            Ok(serde_json::json!([]))
        }
    }

    #[test]
    fn classify_role_recognizes_cfo_and_director() {
        let (is_director, is_officer, is_executive) = classify_role("Chief Financial Officer");
        assert!(!is_director);
        assert!(is_officer);
        assert!(is_executive);

        let (is_director, _, _) = classify_role("Independent Director");
        assert!(is_director);
    }

    #[test]
    fn word_match_respects_boundaries_for_short_abbreviations() {
        assert!(!word_match("cto", "director"));
        assert!(word_match("cto", "serves as CTO of the company"));
    }

    #[tokio::test]
    async fn parses_officer_table_into_records() {
        let html = r#"
            <html><body>
            <h2>Executive Officers</h2>
            <table>
                <tr><th>Name</th><th>Title</th><th>Age</th></tr>
                <tr><td>Jane Doe</td><td>Chief Executive Officer</td><td>52</td></tr>
                <tr><td>John Smith</td><td>Director</td><td>61</td></tr>
            </table>
            </body></html>
        "#;
        let parser = OfficerParser::new();
        let queue = ReviewQueue::open_in_memory().unwrap();
        let result = parser
            .extract(html, "0001234567-26-000001", "0001234567", "Acme Corp", Some(&StubAnalyzer), &queue)
            .await
            .unwrap();
        assert_eq!(result.records.len(), 2);
        assert!(result.records.iter().any(|o| o.name == "Jane Doe" && o.is_executive));
        assert!(result.records.iter().any(|o| o.name == "John Smith" && o.is_director));
    }

    #[tokio::test]
    async fn empty_filing_enqueues_failed_extraction() {
        let html = "<html><body><p>Nothing relevant here.</p></body></html>";
        let parser = OfficerParser::new();
        let queue = ReviewQueue::open_in_memory().unwrap();
        let result = parser
            .extract(html, "0001234567-26-000002", "0001234567", "Acme Corp", Some(&StubAnalyzer), &queue)
            .await
            .unwrap();
        assert!(result.records.is_empty());
        assert_eq!(queue.stats().unwrap().pending, 1);
    }
}
