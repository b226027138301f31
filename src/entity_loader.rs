//! Loads extracted records into the property graph.
//!
//! Every primitive here is a parameterized `MERGE` on the entity's natural
//! key with `ON CREATE SET` / `ON MATCH SET` — repeating a load with the same
//! inputs never duplicates a node or clobbers stored provenance, matching
//! §3.4's upsert-don't-overwrite lifecycle. [`EntityLoader::ensure_person`]
//! is the one primitive that can legitimately no-op: a name that fails
//! [`crate::name_validator::is_valid_name`] is rejected before it ever
//! reaches the graph, and callers get [`EnsurePersonOutcome::Rejected`] back
//! instead of an id to link against.

use chrono::Utc;
use neo4rs::BoltType;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::graph::GraphStore;
use crate::model::{ExtractionMethod, InsiderTransaction, ScanStatus, ScannerState, normalize_address, normalize_cik, normalize_name};
use crate::name_validator::is_valid_name;

fn scan_status_str(status: ScanStatus) -> &'static str {
    match status {
        ScanStatus::Success => "success",
        ScanStatus::PartialSuccess => "partial_success",
        ScanStatus::Error => "error",
        ScanStatus::SkippedWeekend => "skipped_weekend",
    }
}

fn scan_status_from_str(s: &str) -> Option<ScanStatus> {
    match s {
        "success" => Some(ScanStatus::Success),
        "partial_success" => Some(ScanStatus::PartialSuccess),
        "error" => Some(ScanStatus::Error),
        "skipped_weekend" => Some(ScanStatus::SkippedWeekend),
        _ => None,
    }
}

/// Result of [`EntityLoader::ensure_person`]: either the (possibly
/// newly-created) node id, or an explicit rejection — never a silently
/// dropped call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsurePersonOutcome {
    Linked(Uuid),
    Rejected,
}

/// Provenance fields common to every sourced edge this loader writes.
#[derive(Debug, Clone)]
pub struct EdgeProvenance {
    pub source_filing: Option<Uuid>,
    pub raw_text: String,
    pub source_section: Option<String>,
    pub source_table: Option<String>,
    pub extraction_method: ExtractionMethod,
    pub confidence: f64,
}

fn method_str(method: ExtractionMethod) -> &'static str {
    match method {
        ExtractionMethod::RuleBased => "rule_based",
        ExtractionMethod::Llm => "llm",
        ExtractionMethod::Hybrid => "hybrid",
        ExtractionMethod::Manual => "manual",
    }
}

pub struct EntityLoader<'a> {
    graph: &'a GraphStore,
}

impl<'a> EntityLoader<'a> {
    pub fn new(graph: &'a GraphStore) -> Self {
        Self { graph }
    }

    /// MERGEs a Company by `cik` when available, else by `normalized_name`.
    pub async fn ensure_company(
        &self,
        cik: Option<&str>,
        name: &str,
        jurisdiction: Option<&str>,
    ) -> Result<Uuid, PipelineError> {
        let id = Uuid::new_v4();
        let normalized = normalize_name(name);
        let now = Utc::now().to_rfc3339();

        if let Some(cik) = cik {
            let cik = normalize_cik(cik);
            self.graph
                .execute_write(
                    "MERGE (c:Company {cik: $cik})
                     ON CREATE SET c.id = $id, c.name = $name, c.normalized_name = $normalized_name,
                         c.jurisdiction = $jurisdiction, c.is_sanctioned = false, c.source = 'edgar',
                         c.created_at = $now, c.updated_at = $now
                     ON MATCH SET c.name = $name, c.normalized_name = $normalized_name,
                         c.jurisdiction = coalesce($jurisdiction, c.jurisdiction), c.updated_at = $now
                     RETURN c.id AS id",
                    vec![
                        ("cik", BoltType::from(cik)),
                        ("id", BoltType::from(id.to_string())),
                        ("name", BoltType::from(name.to_string())),
                        ("normalized_name", BoltType::from(normalized)),
                        ("jurisdiction", jurisdiction.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull)),
                        ),
                        ("now", BoltType::from(now)),
                    ],
                )
                .await?;
        } else {
            self.graph
                .execute_write(
                    "MERGE (c:Company {normalized_name: $normalized_name})
                     ON CREATE SET c.id = $id, c.name = $name, c.jurisdiction = $jurisdiction,
                         c.is_sanctioned = false, c.source = 'edgar', c.created_at = $now, c.updated_at = $now
                     ON MATCH SET c.updated_at = $now",
                    vec![
                        ("normalized_name", BoltType::from(normalize_name(name))),
                        ("id", BoltType::from(id.to_string())),
                        ("name", BoltType::from(name.to_string())),
                        ("jurisdiction", jurisdiction.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull)),
                        ),
                        ("now", BoltType::from(now)),
                    ],
                )
                .await?;
        }

        Ok(id)
    }

    /// MERGEs a Person by `normalized_name`, after validating it. Returns
    /// [`EnsurePersonOutcome::Rejected`] for anything [`is_valid_name`]
    /// rejects, without touching the graph.
    pub async fn ensure_person(&self, name: &str) -> Result<EnsurePersonOutcome, PipelineError> {
        if !is_valid_name(name) {
            return Ok(EnsurePersonOutcome::Rejected);
        }

        let id = Uuid::new_v4();
        let normalized = normalize_name(name);
        self.graph
            .execute_write(
                "MERGE (p:Person {normalized_name: $normalized_name})
                 ON CREATE SET p.id = $id, p.name = $name, p.is_pep = false, p.is_sanctioned = false
                 ON MATCH SET p.name = $name",
                vec![
                    ("normalized_name", BoltType::from(normalized)),
                    ("id", BoltType::from(id.to_string())),
                    ("name", BoltType::from(name.to_string())),
                ],
            )
            .await?;

        Ok(EnsurePersonOutcome::Linked(id))
    }

    /// MERGEs a Filing by `accession_number` and creates `(:Company)-[:FILED]->(:Filing)`.
    pub async fn ensure_filing(
        &self,
        accession: &str,
        form: &str,
        company_id: Uuid,
        method: ExtractionMethod,
        date: Option<&str>,
        url: Option<&str>,
    ) -> Result<Uuid, PipelineError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();

        self.graph
            .execute_write(
                "MERGE (f:Filing {accession_number: $accession})
                 ON CREATE SET f.id = $id, f.form_type = $form, f.filing_date = $date,
                     f.filing_url = $url, f.extraction_method = $method, f.extracted_at = $now
                 WITH f
                 MATCH (c:Company {id: $company_id})
                 MERGE (c)-[:FILED]->(f)",
                vec![
                    ("accession", BoltType::from(accession.to_string())),
                    ("id", BoltType::from(id.to_string())),
                    ("form", BoltType::from(form.to_string())),
                    ("date", date.map(|d| BoltType::from(d.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("url", url.map(|u| BoltType::from(u.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("method", BoltType::from(method_str(method).to_string())),
                    ("now", BoltType::from(now)),
                    ("company_id", BoltType::from(company_id.to_string())),
                ],
            )
            .await?;

        Ok(id)
    }

    /// MERGEs an Event by `(accession_number, item_number)` and creates
    /// `(:Company)-[:FILED_EVENT]->(:Event)`. Only the rule-based fields are
    /// set here; per §3.4 an Event's LLM analyzer fields (`llm_summary` and
    /// friends) are written once by the analyzer's own pass and are left
    /// untouched on replay of this primitive.
    pub async fn ensure_event(
        &self,
        accession: &str,
        item_number: &str,
        company_id: Uuid,
        filing_date: &str,
        item_name: &str,
        signal_type: &str,
        is_ma_signal: bool,
        persons_mentioned: &[String],
        raw_text: &str,
    ) -> Result<Uuid, PipelineError> {
        let id = Uuid::new_v4();
        self.graph
            .execute_write(
                "MERGE (e:Event {accession_number: $accession, item_number: $item_number})
                 ON CREATE SET e.id = $id, e.filing_date = $filing_date, e.item_name = $item_name,
                     e.signal_type = $signal_type, e.is_ma_signal = $is_ma_signal,
                     e.persons_mentioned = $persons_mentioned, e.raw_text = $raw_text
                 WITH e
                 MATCH (c:Company {id: $company_id})
                 MERGE (c)-[:FILED_EVENT]->(e)",
                vec![
                    ("accession", BoltType::from(accession.to_string())),
                    ("item_number", BoltType::from(item_number.to_string())),
                    ("id", BoltType::from(id.to_string())),
                    ("filing_date", BoltType::from(filing_date.to_string())),
                    ("item_name", BoltType::from(item_name.to_string())),
                    ("signal_type", BoltType::from(signal_type.to_string())),
                    ("is_ma_signal", BoltType::from(is_ma_signal)),
                    ("persons_mentioned", BoltType::from(persons_mentioned.to_vec())),
                    ("raw_text", BoltType::from(raw_text.to_string())),
                    ("company_id", BoltType::from(company_id.to_string())),
                ],
            )
            .await?;
        Ok(id)
    }

    /// MERGEs an `OWNS` edge from `owner_id` (Person or Company) to `company_id`.
    pub async fn create_ownership(
        &self,
        owner_id: Uuid,
        company_id: Uuid,
        percentage: Option<f64>,
        shares: Option<f64>,
        is_beneficial: bool,
        is_direct: bool,
        prov: EdgeProvenance,
    ) -> Result<(), PipelineError> {
        self.graph
            .execute_write(
                "MATCH (owner {id: $owner_id}), (c:Company {id: $company_id})
                 MERGE (owner)-[r:OWNS]->(c)
                 ON CREATE SET r.created_at = $now
                 SET r.percentage = $percentage, r.shares = $shares, r.is_beneficial = $is_beneficial,
                     r.is_direct = $is_direct, r.source_filing = $source_filing, r.raw_text = $raw_text,
                     r.source_section = $source_section, r.source_table = $source_table,
                     r.extraction_method = $method, r.confidence = $confidence, r.updated_at = $now",
                ownership_params(owner_id, company_id, percentage, shares, is_beneficial, is_direct, false, &prov),
            )
            .await
    }

    /// MERGEs a subsidiary `OWNS` edge (Company → Company), additionally
    /// setting `is_wholly_owned`.
    pub async fn create_subsidiary(
        &self,
        parent_id: Uuid,
        subsidiary_id: Uuid,
        percentage: Option<f64>,
        is_wholly_owned: bool,
        prov: EdgeProvenance,
    ) -> Result<(), PipelineError> {
        self.graph
            .execute_write(
                "MATCH (parent:Company {id: $owner_id}), (sub:Company {id: $company_id})
                 MERGE (parent)-[r:OWNS]->(sub)
                 ON CREATE SET r.created_at = $now
                 SET r.percentage = $percentage, r.is_wholly_owned = $is_wholly_owned,
                     r.is_beneficial = $is_beneficial, r.is_direct = $is_direct,
                     r.source_filing = $source_filing, r.raw_text = $raw_text,
                     r.source_section = $source_section, r.source_table = $source_table,
                     r.extraction_method = $method, r.confidence = $confidence, r.updated_at = $now",
                ownership_params(parent_id, subsidiary_id, percentage, None, true, true, is_wholly_owned, &prov),
            )
            .await
    }

    /// MERGEs an `OFFICER_OF` or `DIRECTOR_OF` edge depending on the flags
    /// set on the officer record (a person may get both).
    pub async fn create_officer(
        &self,
        person_id: Uuid,
        company_id: Uuid,
        title: Option<&str>,
        is_officer: bool,
        is_director: bool,
        is_executive: bool,
        prov: EdgeProvenance,
    ) -> Result<(), PipelineError> {
        let now = Utc::now().to_rfc3339();
        let title_value = title.map(|t| BoltType::from(t.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull));
        let source_filing = prov
            .source_filing
            .map(|id| BoltType::from(id.to_string()))
            .unwrap_or(BoltType::Null(neo4rs::BoltNull));
        let source_section = prov
            .source_section
            .clone()
            .map(BoltType::from)
            .unwrap_or(BoltType::Null(neo4rs::BoltNull));
        let source_table = prov
            .source_table
            .clone()
            .map(BoltType::from)
            .unwrap_or(BoltType::Null(neo4rs::BoltNull));

        if is_officer {
            self.graph
                .execute_write(
                    "MATCH (p:Person {id: $person_id}), (c:Company {id: $company_id})
                     MERGE (p)-[r:OFFICER_OF]->(c)
                     ON CREATE SET r.created_at = $now
                     SET r.title = $title, r.is_executive = $is_executive, r.source_filing = $source_filing,
                         r.raw_text = $raw_text, r.source_section = $source_section, r.source_table = $source_table,
                         r.extraction_method = $method, r.confidence = $confidence, r.updated_at = $now",
                    vec![
                        ("person_id", BoltType::from(person_id.to_string())),
                        ("company_id", BoltType::from(company_id.to_string())),
                        ("now", BoltType::from(now.clone())),
                        ("title", title_value.clone()),
                        ("is_executive", BoltType::from(is_executive)),
                        ("source_filing", source_filing.clone()),
                        ("raw_text", BoltType::from(prov.raw_text.clone())),
                        ("source_section", source_section.clone()),
                        ("source_table", source_table.clone()),
                        ("method", BoltType::from(method_str(prov.extraction_method).to_string())),
                        ("confidence", BoltType::from(prov.confidence)),
                    ],
                )
                .await?;
        }

        if is_director {
            self.graph
                .execute_write(
                    "MATCH (p:Person {id: $person_id}), (c:Company {id: $company_id})
                     MERGE (p)-[r:DIRECTOR_OF]->(c)
                     ON CREATE SET r.created_at = $now
                     SET r.source_filing = $source_filing, r.raw_text = $raw_text,
                         r.source_section = $source_section, r.source_table = $source_table,
                         r.extraction_method = $method, r.confidence = $confidence, r.updated_at = $now",
                    vec![
                        ("person_id", BoltType::from(person_id.to_string())),
                        ("company_id", BoltType::from(company_id.to_string())),
                        ("now", BoltType::from(now)),
                        ("source_filing", source_filing),
                        ("raw_text", BoltType::from(prov.raw_text)),
                        ("source_section", source_section),
                        ("source_table", source_table),
                        ("method", BoltType::from(method_str(prov.extraction_method).to_string())),
                        ("confidence", BoltType::from(prov.confidence)),
                    ],
                )
                .await?;
        }

        Ok(())
    }

    /// MERGEs a `SanctionedEntity` overlay node on `ofac_uid`, always
    /// (re)setting `normalized_name = upper(trim(name))` and
    /// `is_sanctioned = true` on both the create and match branches.
    pub async fn ensure_sanctioned_entity(
        &self,
        ofac_uid: &str,
        name: &str,
        aliases: &[String],
        sanction_programs: &[String],
    ) -> Result<Uuid, PipelineError> {
        let id = Uuid::new_v4();
        let now = Utc::now().to_rfc3339();
        self.graph
            .execute_write(
                "MERGE (s:SanctionedEntity {ofac_uid: $ofac_uid})
                 ON CREATE SET s.id = $id, s.created_at = $now
                 SET s.normalized_name = $normalized_name, s.is_sanctioned = true,
                     s.aliases = $aliases, s.sanction_programs = $sanction_programs, s.updated_at = $now",
                vec![
                    ("ofac_uid", BoltType::from(ofac_uid.to_string())),
                    ("id", BoltType::from(id.to_string())),
                    ("now", BoltType::from(now)),
                    ("normalized_name", BoltType::from(normalize_name(name))),
                    ("aliases", BoltType::from(aliases.to_vec())),
                    ("sanction_programs", BoltType::from(sanction_programs.to_vec())),
                ],
            )
            .await?;
        Ok(id)
    }

    /// MERGEs a `SANCTIONED_AS` edge from a Person or Company node to a
    /// `SanctionedEntity` overlay node, and sets `is_sanctioned = true` on
    /// the linked node so [`crate::risk`]'s traversal queries see it without
    /// a join through `SanctionedEntity`.
    pub async fn create_sanction_link(
        &self,
        entity_id: Uuid,
        sanctioned_entity_id: Uuid,
        match_type: &str,
        confidence: f64,
    ) -> Result<(), PipelineError> {
        let now = Utc::now().to_rfc3339();
        self.graph
            .execute_write(
                "MATCH (e {id: $entity_id}), (s:SanctionedEntity {id: $sanctioned_entity_id})
                 MERGE (e)-[r:SANCTIONED_AS]->(s)
                 ON CREATE SET r.created_at = $now
                 SET r.match_type = $match_type, r.confidence = $confidence, r.updated_at = $now,
                     e.is_sanctioned = true",
                vec![
                    ("entity_id", BoltType::from(entity_id.to_string())),
                    ("sanctioned_entity_id", BoltType::from(sanctioned_entity_id.to_string())),
                    ("now", BoltType::from(now)),
                    ("match_type", BoltType::from(match_type.to_string())),
                    ("confidence", BoltType::from(confidence)),
                ],
            )
            .await
    }

    /// MERGEs an Address by its normalized text.
    pub async fn ensure_address(
        &self,
        raw_text: &str,
        city: Option<&str>,
        state: Option<&str>,
        country: Option<&str>,
    ) -> Result<Uuid, PipelineError> {
        let id = Uuid::new_v4();
        let normalized = normalize_address(raw_text);
        self.graph
            .execute_write(
                "MERGE (a:Address {normalized_text: $normalized_text})
                 ON CREATE SET a.id = $id, a.raw_text = $raw_text, a.city = $city,
                     a.state = $state, a.country = $country",
                vec![
                    ("normalized_text", BoltType::from(normalized)),
                    ("id", BoltType::from(id.to_string())),
                    ("raw_text", BoltType::from(raw_text.to_string())),
                    ("city", city.map(|c| BoltType::from(c.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("state", state.map(|s| BoltType::from(s.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("country", country.map(|c| BoltType::from(c.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                ],
            )
            .await?;
        Ok(id)
    }

    /// MERGEs a `REGISTERED_AT` edge from `company_id` to an Address,
    /// creating the Address node first if needed.
    pub async fn create_registered_at(
        &self,
        company_id: Uuid,
        raw_text: &str,
        city: Option<&str>,
        state: Option<&str>,
        country: Option<&str>,
        prov: EdgeProvenance,
    ) -> Result<Uuid, PipelineError> {
        let address_id = self.ensure_address(raw_text, city, state, country).await?;
        let now = Utc::now().to_rfc3339();
        self.graph
            .execute_write(
                "MATCH (c:Company {id: $company_id}), (a:Address {id: $address_id})
                 MERGE (c)-[r:REGISTERED_AT]->(a)
                 ON CREATE SET r.created_at = $now
                 SET r.source_filing = $source_filing, r.raw_text = $raw_text,
                     r.source_section = $source_section, r.source_table = $source_table,
                     r.extraction_method = $method, r.confidence = $confidence, r.updated_at = $now",
                vec![
                    ("company_id", BoltType::from(company_id.to_string())),
                    ("address_id", BoltType::from(address_id.to_string())),
                    ("now", BoltType::from(now)),
                    (
                        "source_filing",
                        prov.source_filing.map(|id| BoltType::from(id.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull)),
                    ),
                    ("raw_text", BoltType::from(prov.raw_text)),
                    ("source_section", prov.source_section.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("source_table", prov.source_table.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("method", BoltType::from(method_str(prov.extraction_method).to_string())),
                    ("confidence", BoltType::from(prov.confidence)),
                ],
            )
            .await?;
        Ok(address_id)
    }

    /// MERGEs an `InsiderTransaction` by [`InsiderTransaction::natural_key`]
    /// and links it `(:Company)-[:INSIDER_TRADE_OF]->(:InsiderTransaction)<-[:TRADED_BY]-(:Person)`
    /// — the same shape [`crate::signals::cluster::InsiderClusterEngine`]
    /// reads back out.
    pub async fn create_insider_transaction(
        &self,
        company_id: Uuid,
        person_id: Uuid,
        txn: &InsiderTransaction,
    ) -> Result<(), PipelineError> {
        let id = Uuid::new_v4();
        let ownership_type = txn.ownership_type.map(|t| match t {
            crate::model::OwnershipType::D => "D",
            crate::model::OwnershipType::I => "I",
        });

        self.graph
            .execute_write(
                "MERGE (t:InsiderTransaction {natural_key: $natural_key})
                 ON CREATE SET t.id = $id
                 SET t.accession_number = $accession_number, t.transaction_date = $transaction_date,
                     t.transaction_code = $transaction_code, t.transaction_type = $transaction_type,
                     t.security_title = $security_title, t.shares = $shares,
                     t.price_per_share = $price_per_share, t.total_value = $total_value,
                     t.shares_after_transaction = $shares_after_transaction, t.ownership_type = $ownership_type,
                     t.is_derivative = $is_derivative, t.insider_name = $insider_name, t.insider_title = $insider_title
                 WITH t
                 MATCH (c:Company {id: $company_id}), (p:Person {id: $person_id})
                 MERGE (c)-[:INSIDER_TRADE_OF]->(t)
                 MERGE (p)-[:TRADED_BY]->(t)",
                vec![
                    ("natural_key", BoltType::from(txn.natural_key())),
                    ("id", BoltType::from(id.to_string())),
                    ("accession_number", BoltType::from(txn.accession_number.clone())),
                    ("transaction_date", BoltType::from(txn.transaction_date.clone())),
                    ("transaction_code", BoltType::from(txn.transaction_code.to_string())),
                    ("transaction_type", BoltType::from(txn.transaction_type.clone())),
                    ("security_title", txn.security_title.clone().map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("shares", txn.shares.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("price_per_share", txn.price_per_share.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("total_value", txn.total_value.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("shares_after_transaction", txn.shares_after_transaction.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("ownership_type", ownership_type.map(|s| BoltType::from(s.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("is_derivative", BoltType::from(txn.is_derivative)),
                    ("insider_name", BoltType::from(txn.insider_name.clone())),
                    ("insider_title", txn.insider_title.clone().map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                    ("company_id", BoltType::from(company_id.to_string())),
                    ("person_id", BoltType::from(person_id.to_string())),
                ],
            )
            .await
    }

    /// Reads the persisted checkpoint for `scanner_id`, or `None` if this
    /// scanner has never run before.
    pub async fn get_scanner_state(&self, scanner_id: &str) -> Result<Option<ScannerState>, PipelineError> {
        let rows = self
            .graph
            .execute_query(
                "MATCH (s:ScannerState {scanner_id: $scanner_id})
                 RETURN s.last_checkpoint AS last_checkpoint, s.last_run_at AS last_run_at,
                        s.last_status AS last_status, s.total_runs AS total_runs,
                        s.total_errors AS total_errors, s.last_error AS last_error
                 LIMIT 1",
                vec![("scanner_id", BoltType::from(scanner_id.to_string()))],
            )
            .await?;

        let Some(row) = rows.into_iter().next() else { return Ok(None) };
        Ok(Some(ScannerState {
            scanner_id: scanner_id.to_string(),
            last_checkpoint: row.get("last_checkpoint").unwrap_or_default(),
            last_run_at: row.get("last_run_at").ok(),
            last_status: row.get::<String>("last_status").ok().and_then(|s| scan_status_from_str(&s)),
            total_runs: row.get::<i64>("total_runs").unwrap_or(0) as u64,
            total_errors: row.get::<i64>("total_errors").unwrap_or(0) as u64,
            last_error: row.get("last_error").ok(),
        }))
    }

    /// Advances the checkpoint for `scanner_id`. `checkpoint` is only
    /// written when `status` is [`ScanStatus::Success`] or
    /// [`ScanStatus::PartialSuccess`] — a failed run's checkpoint stays put
    /// so the next run retries the same window instead of skipping past it.
    pub async fn save_scanner_checkpoint(
        &self,
        scanner_id: &str,
        checkpoint: &str,
        status: ScanStatus,
        error: Option<&str>,
    ) -> Result<(), PipelineError> {
        let now = Utc::now().to_rfc3339();
        let advances = matches!(status, ScanStatus::Success | ScanStatus::PartialSuccess);
        let is_error = matches!(status, ScanStatus::Error);

        self.graph
            .execute_write(
                "MERGE (s:ScannerState {scanner_id: $scanner_id})
                 ON CREATE SET s.last_checkpoint = $checkpoint, s.total_runs = 0, s.total_errors = 0
                 SET s.last_run_at = $now, s.last_status = $status,
                     s.last_checkpoint = CASE WHEN $advances THEN $checkpoint ELSE s.last_checkpoint END,
                     s.total_runs = coalesce(s.total_runs, 0) + 1,
                     s.total_errors = coalesce(s.total_errors, 0) + CASE WHEN $is_error THEN 1 ELSE 0 END,
                     s.last_error = $error",
                vec![
                    ("scanner_id", BoltType::from(scanner_id.to_string())),
                    ("checkpoint", BoltType::from(checkpoint.to_string())),
                    ("now", BoltType::from(now)),
                    ("status", BoltType::from(scan_status_str(status).to_string())),
                    ("advances", BoltType::from(advances)),
                    ("is_error", BoltType::from(is_error)),
                    ("error", error.map(|e| BoltType::from(e.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
                ],
            )
            .await
    }

    /// Issues the fixed index creation set via [`GraphStore::create_indexes`].
    pub async fn create_indexes(&self) -> Result<(), PipelineError> {
        self.graph.create_indexes().await
    }

    /// Two-phase SDN reset: detach-delete `SANCTIONED_AS` edges, then delete
    /// `SanctionedEntity` nodes.
    pub async fn clear_sdn_data(&self) -> Result<(), PipelineError> {
        self.graph.clear_sdn_data().await
    }
}

#[allow(clippy::too_many_arguments)]
fn ownership_params(
    owner_id: Uuid,
    company_id: Uuid,
    percentage: Option<f64>,
    shares: Option<f64>,
    is_beneficial: bool,
    is_direct: bool,
    is_wholly_owned: bool,
    prov: &EdgeProvenance,
) -> Vec<(&'static str, BoltType)> {
    let now = Utc::now().to_rfc3339();
    vec![
        ("owner_id", BoltType::from(owner_id.to_string())),
        ("company_id", BoltType::from(company_id.to_string())),
        ("percentage", percentage.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
        ("shares", shares.map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull))),
        ("is_beneficial", BoltType::from(is_beneficial)),
        ("is_direct", BoltType::from(is_direct)),
        ("is_wholly_owned", BoltType::from(is_wholly_owned)),
        (
            "source_filing",
            prov.source_filing.map(|id| BoltType::from(id.to_string())).unwrap_or(BoltType::Null(neo4rs::BoltNull)),
        ),
        ("raw_text", BoltType::from(prov.raw_text.clone())),
        (
            "source_section",
            prov.source_section.clone().map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull)),
        ),
        (
            "source_table",
            prov.source_table.clone().map(BoltType::from).unwrap_or(BoltType::Null(neo4rs::BoltNull)),
        ),
        ("method", BoltType::from(method_str(prov.extraction_method).to_string())),
        ("confidence", BoltType::from(prov.confidence)),
        ("now", BoltType::from(now)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_person_names_before_touching_the_graph() {
        assert!(!is_valid_name("Name"));
    }

    #[test]
    fn method_str_matches_snake_case_convention() {
        assert_eq!(method_str(ExtractionMethod::RuleBased), "rule_based");
        assert_eq!(method_str(ExtractionMethod::Manual), "manual");
    }
}
