// 📥 Bulk Loader - full rebuild of every index from the source dumps
//
// Entity types are loaded one after another in a fixed order. Documents are
// streamed into fixed-size batches; a rejected document is counted and the run
// goes on. Only a connectivity failure of the index stops the run.

use chrono::{DateTime, Local, Utc};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::db::{DocumentIndex, IndexDocument, RunRecord, KNOWN_INDEXES};
use crate::entities::CleaningContext;
use crate::error::{IndexError, LoadError};
use crate::locations::LocationTable;
use crate::persons::PersonDeduplicator;
use crate::shareholders::aggregate_shareholders;
use crate::sources::{cleaned_entities, SourceKind};

pub const PERSONS_INDEX: &str = "persons";
pub const SHAREHOLDERS_INDEX: &str = "corporate_shareholders";

// ============================================================================
// SUMMARIES
// ============================================================================

/// Counts for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub index: String,
    pub processed: usize,
    pub indexed: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub types: Vec<LoadSummary>,
}

impl LoadReport {
    pub fn summary(&self, index: &str) -> Option<&LoadSummary> {
        self.types.iter().find(|s| s.index == index)
    }
}

// ============================================================================
// BATCH WRITER
// ============================================================================

/// Buffers documents for one index and submits them `batch_size` at a time.
struct BatchWriter<'i, I: DocumentIndex> {
    index: &'i mut I,
    batch_size: usize,
    buffer: Vec<IndexDocument>,
    batches: usize,
    summary: LoadSummary,
}

impl<'i, I: DocumentIndex> BatchWriter<'i, I> {
    fn new(index: &'i mut I, name: &str, batch_size: usize) -> Self {
        BatchWriter {
            index,
            batch_size: batch_size.max(1),
            buffer: Vec::with_capacity(batch_size.max(1)),
            batches: 0,
            summary: LoadSummary {
                index: name.to_string(),
                ..Default::default()
            },
        }
    }

    fn push(&mut self, document: IndexDocument) -> Result<(), IndexError> {
        self.summary.processed += 1;
        self.buffer.push(document);
        if self.buffer.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    /// A record that never became a document.
    fn reject(&mut self) {
        self.summary.processed += 1;
        self.summary.errors += 1;
    }

    fn flush(&mut self) -> Result<(), IndexError> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let batch = std::mem::take(&mut self.buffer);
        let outcome = self.index.bulk(&self.summary.index, &batch)?;
        self.batches += 1;

        self.summary.indexed += outcome.indexed;
        self.summary.errors += outcome.failures.len();
        for failure in &outcome.failures {
            warn!(
                index = %self.summary.index,
                id = %failure.id,
                reason = %failure.reason,
                "document rejected by index"
            );
        }
        debug!(
            index = %self.summary.index,
            batch = self.batches,
            indexed = outcome.indexed,
            failed = outcome.failures.len(),
            "batch submitted"
        );
        Ok(())
    }

    fn finish(mut self) -> Result<LoadSummary, IndexError> {
        self.flush()?;
        info!(
            index = %self.summary.index,
            processed = self.summary.processed,
            indexed = self.summary.indexed,
            errors = self.summary.errors,
            batches = self.batches,
            "index loaded"
        );
        Ok(self.summary)
    }
}

// ============================================================================
// LOADER
// ============================================================================

pub struct Loader<'a, I: DocumentIndex> {
    index: &'a mut I,
    config: &'a PipelineConfig,
    ctx: CleaningContext<'a>,
}

impl<'a, I: DocumentIndex> Loader<'a, I> {
    pub fn new(index: &'a mut I, config: &'a PipelineConfig, ctx: CleaningContext<'a>) -> Self {
        Loader { index, config, ctx }
    }

    /// Drop and rebuild every index.
    pub fn run(&mut self) -> Result<LoadReport, LoadError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let timer = Instant::now();
        info!(run_id = %run_id, "load run started");

        self.index.ping()?;
        for name in KNOWN_INDEXES {
            self.index.recreate(name)?;
        }

        let mut types = Vec::new();
        for kind in SourceKind::ALL {
            types.push(self.load_entities(kind)?);
        }
        types.push(self.load_persons()?);
        types.push(self.load_shareholders()?);

        let finished_at = Utc::now();
        let report = LoadReport {
            run_id,
            started_at,
            finished_at,
            elapsed_ms: timer.elapsed().as_millis() as i64,
            types,
        };

        self.index.record_run(&RunRecord {
            run_id: report.run_id.clone(),
            started_at: report.started_at,
            finished_at: report.finished_at,
            elapsed_ms: report.elapsed_ms,
            summary: serde_json::to_value(&report.types).unwrap_or_default(),
        })?;

        info!(run_id = %report.run_id, elapsed_ms = report.elapsed_ms, "load run finished");
        Ok(report)
    }

    fn load_entities(&mut self, kind: SourceKind) -> Result<LoadSummary, IndexError> {
        let ctx = self.ctx;
        let config = self.config;
        let root = config.source_root(kind);
        let mut writer = BatchWriter::new(&mut *self.index, kind.index_name(), config.batch_size);

        let root = match root {
            Some(root) => root,
            None => {
                info!(source = kind.name(), "no source configured, skipping");
                return writer.finish();
            }
        };

        for result in cleaned_entities(kind, root, ctx) {
            let entity = match result {
                Ok(entity) => entity,
                Err(e) => {
                    warn!(source = kind.name(), error = %e, "skipping record");
                    writer.reject();
                    continue;
                }
            };

            match entity.to_json() {
                Ok(body) => writer.push(IndexDocument::new(entity.id(), body))?,
                Err(e) => {
                    warn!(record = entity.id(), error = %e, "could not serialize record");
                    writer.reject();
                }
            }
        }

        writer.finish()
    }

    /// Second walk over every source: one document per (identity, role, record).
    fn load_persons(&mut self) -> Result<LoadSummary, IndexError> {
        let ctx = self.ctx;
        let config = self.config;
        let roots: Vec<(SourceKind, &Path)> = SourceKind::ALL
            .iter()
            .filter_map(|kind| config.source_root(*kind).map(|root| (*kind, root)))
            .collect();

        let mut writer = BatchWriter::new(&mut *self.index, PERSONS_INDEX, config.batch_size);
        let mut dedup = PersonDeduplicator::new();

        for (kind, root) in roots {
            // Failures were already reported by the entity pass
            for entity in cleaned_entities(kind, root, ctx).filter_map(Result::ok) {
                for person in dedup.extract(&entity) {
                    match serde_json::to_value(&person) {
                        Ok(body) => writer.push(IndexDocument::new(person.id.clone(), body))?,
                        Err(e) => {
                            warn!(id = %person.id, error = %e, "could not serialize person");
                            writer.reject();
                        }
                    }
                }
            }
        }

        debug!(
            emitted = dedup.emitted,
            duplicates = dedup.duplicates,
            "person extraction finished"
        );
        writer.finish()
    }

    fn load_shareholders(&mut self) -> Result<LoadSummary, IndexError> {
        let ctx = self.ctx;
        let config = self.config;
        let aggregates = config
            .companies
            .as_deref()
            .map(|root| aggregate_shareholders(root, &ctx))
            .unwrap_or_default();

        let mut writer = BatchWriter::new(&mut *self.index, SHAREHOLDERS_INDEX, config.batch_size);
        for aggregate in aggregates {
            match aggregate.to_json() {
                Ok(body) => writer.push(IndexDocument::new(aggregate.id.clone(), body))?,
                Err(e) => {
                    warn!(id = %aggregate.id, error = %e, "could not serialize shareholder");
                    writer.reject();
                }
            }
        }
        writer.finish()
    }
}

/// Build the cleaning context from `config` and run a full load into `index`.
pub fn run_load<I: DocumentIndex>(
    config: &PipelineConfig,
    index: &mut I,
) -> Result<LoadReport, LoadError> {
    let locations = match &config.postcodes {
        Some(path) => LocationTable::from_csv_path(path)?,
        None => {
            warn!("no postcode table configured, identifiers will not resolve to locations");
            LocationTable::new()
        }
    };
    let today = Local::now().date_naive();
    let ctx = CleaningContext::new(&locations, &config.nationality, today);

    Loader::new(index, config, ctx).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{count_documents, get_document, BulkFailure, BulkOutcome, SqliteIndex};
    use crate::entities::tests::context;
    use serde_json::{json, Value};
    use std::collections::{BTreeMap, HashMap, HashSet};
    use std::fs;
    use std::path::PathBuf;

    /// In-memory index that can reject ids or lose connectivity on demand.
    #[derive(Default)]
    struct MemoryIndex {
        docs: HashMap<String, BTreeMap<String, Value>>,
        reject: HashSet<String>,
        unreachable_index: Option<&'static str>,
        bulk_calls: HashMap<String, usize>,
        runs: Vec<RunRecord>,
    }

    impl DocumentIndex for MemoryIndex {
        fn ping(&self) -> Result<(), IndexError> {
            Ok(())
        }

        fn recreate(&mut self, index: &str) -> Result<(), IndexError> {
            self.docs.insert(index.to_string(), BTreeMap::new());
            Ok(())
        }

        fn bulk(&mut self, index: &str, documents: &[IndexDocument]) -> Result<BulkOutcome, IndexError> {
            if self.unreachable_index == Some(index) {
                return Err(IndexError::Connectivity("connection refused".into()));
            }
            *self.bulk_calls.entry(index.to_string()).or_default() += 1;

            let mut outcome = BulkOutcome::default();
            let stored = self.docs.entry(index.to_string()).or_default();
            for doc in documents {
                if self.reject.contains(&doc.id) {
                    outcome.failures.push(BulkFailure {
                        id: doc.id.clone(),
                        reason: "mapper_parsing_exception".into(),
                    });
                } else {
                    stored.insert(doc.id.clone(), doc.body.clone());
                    outcome.indexed += 1;
                }
            }
            Ok(outcome)
        }

        fn record_run(&mut self, run: &RunRecord) -> Result<(), IndexError> {
            self.runs.push(run.clone());
            Ok(())
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        config: PipelineConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        for sub in ["companies", "business_names", "tax_payers"] {
            fs::create_dir(root.join(sub)).unwrap();
        }

        fs::write(
            root.join("companies/2023.json"),
            json!({
                "c1": {
                    "company_name": "Kilimo Bora Ltd",
                    "incorporation_number": "INC-1",
                    "authorised_share_capital": 1000,
                    "number_of_shares": 100,
                    "directors": [{"first_name": "Jane", "last_name": "Doe", "national_id": "19900515-11101-00001-23", "phone": "0712345678"}],
                    "shareholders": {
                        "Shareholder 1 - ACME HOLDINGS LTD": {"registration_number": "C-0042", "natural_person": "no"},
                        "Shareholder 2 - Jane Doe": {"first_name": "Jane", "last_name": "Doe", "national_id": "19900515-11101-00001-23", "natural_person": "yes"}
                    },
                    "share_table": "<tr><td>C-0042</td><td>Acme</td><td>Ordinary</td><td>40</td></tr>"
                },
                "c2": {
                    "company_name": "Pwani Traders Ltd",
                    "shareholders": [{"name": "ACME HOLDINGS LTD", "registration_number": "C-0042", "natural_person": false}]
                },
                "c3": {"directors": []}
            })
            .to_string(),
        )
        .unwrap();

        fs::write(
            root.join("business_names/bn.json"),
            json!([
                {"id": "bn-1", "business_name": "Duka la Mama", "owners": [{"name": "Mama Neema", "nida_number": "19750101-11101-00002-11"}]}
            ])
            .to_string(),
        )
        .unwrap();

        fs::write(
            root.join("tax_payers/tin.json"),
            json!({"t1": {"tin": "100-200-300", "name": "Jane Doe", "national_id": "19900515-11101-00001-23"}})
                .to_string(),
        )
        .unwrap();

        fs::write(
            root.join("wabunge.csv"),
            "NAME,PHONE1,CONSTITUENCY\nJohn Doe,0712 345 678,Ilala\nNeema Said,+255713000000,Kinondoni\n",
        )
        .unwrap();

        fs::write(root.join("postcodes.csv"), "postcode,region,district,ward\n11101,Dar es Salaam,Ilala,Kariakoo\n").unwrap();

        let config = PipelineConfig {
            database: root.join("index.db"),
            companies: Some(root.join("companies")),
            business_names: Some(root.join("business_names")),
            tax_payers: Some(root.join("tax_payers")),
            wabunge: Some(root.join("wabunge.csv")),
            postcodes: Some(root.join("postcodes.csv")),
            batch_size: 2,
            ..Default::default()
        };

        Fixture { _dir: dir, config }
    }

    #[test]
    fn test_end_to_end_into_sqlite() {
        let fx = fixture();
        let mut index = SqliteIndex::open(&fx.config.database).unwrap();

        let report = run_load(&fx.config, &mut index).unwrap();

        let order: Vec<&str> = report.types.iter().map(|s| s.index.as_str()).collect();
        assert_eq!(
            order,
            vec!["companies", "business_names", "tax_payers", "wabunge", "persons", "corporate_shareholders"]
        );

        let companies = report.summary("companies").unwrap();
        assert_eq!((companies.processed, companies.indexed, companies.errors), (3, 2, 1));
        assert_eq!(report.summary("wabunge").unwrap().indexed, 2);

        let conn = index.connection();
        let member = get_document(conn, "wabunge", "wabunge-1").unwrap().unwrap();
        assert_eq!(member["phone1"], "+255712345678");

        // Jane: director + natural shareholder of c1, taxpayer of t1; Mama Neema: owner
        assert_eq!(count_documents(conn, "persons").unwrap(), 4);
        let director = get_document(conn, "persons", "19900515-11101-00001-23_director_companies_c1")
            .unwrap()
            .unwrap();
        assert_eq!(director["registrationType"], "Company");
        assert_eq!(director["details"]["phone"], "+255712345678");
        assert_eq!(director["details"]["derived"]["region"], "Dar es Salaam");

        let acme = get_document(conn, "corporate_shareholders", "C-0042").unwrap().unwrap();
        assert_eq!(acme["shareholdingCount"], 2);
        assert_eq!(acme["shareholdings"][0]["sharesCount"], 40);
        assert_eq!(acme["shareholdings"][0]["shareValue"], 400.0);

        let runs = index.recent_runs(1).unwrap();
        assert_eq!(runs[0].run_id, report.run_id);
    }

    #[test]
    fn test_rerun_rebuilds_instead_of_accumulating() {
        let fx = fixture();
        let mut index = SqliteIndex::open_in_memory().unwrap();

        run_load(&fx.config, &mut index).unwrap();
        let second = run_load(&fx.config, &mut index).unwrap();

        for summary in &second.types {
            assert_eq!(
                index.count(&summary.index).unwrap(),
                summary.indexed as i64,
                "index {}",
                summary.index
            );
        }
        assert_eq!(index.recent_runs(10).unwrap().len(), 2);
    }

    #[test]
    fn test_rejected_documents_are_counted_and_run_continues() {
        let fx = fixture();
        let mut index = MemoryIndex {
            reject: ["c1".to_string(), "wabunge-2".to_string()].into_iter().collect(),
            ..Default::default()
        };

        let report = run_load(&fx.config, &mut index).unwrap();

        let companies = report.summary("companies").unwrap();
        assert_eq!((companies.processed, companies.indexed, companies.errors), (3, 1, 2));
        let wabunge = report.summary("wabunge").unwrap();
        assert_eq!((wabunge.indexed, wabunge.errors), (1, 1));
        // Later types still loaded
        assert_eq!(report.summary("persons").unwrap().indexed, 4);
        assert_eq!(index.runs.len(), 1);
    }

    #[test]
    fn test_connectivity_failure_aborts_run() {
        let fx = fixture();
        let mut index = MemoryIndex {
            unreachable_index: Some("tax_payers"),
            ..Default::default()
        };

        let result = run_load(&fx.config, &mut index);

        assert!(matches!(
            result,
            Err(LoadError::Index(IndexError::Connectivity(_)))
        ));
        assert!(index.runs.is_empty());
        assert!(!index.bulk_calls.contains_key("persons"));
    }

    #[test]
    fn test_documents_are_batched() {
        let fx = fixture();
        let mut index = MemoryIndex::default();

        run_load(&fx.config, &mut index).unwrap();

        // 2 companies with batch size 2 -> one batch; 4 persons -> two
        assert_eq!(index.bulk_calls["companies"], 1);
        assert_eq!(index.bulk_calls["persons"], 2);
        assert_eq!(index.bulk_calls["business_names"], 1);
    }

    #[test]
    fn test_unconfigured_sources_are_empty() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let config = PipelineConfig {
            database: PathBuf::from(":memory:"),
            ..Default::default()
        };
        let mut index = MemoryIndex::default();

        let report = Loader::new(&mut index, &config, ctx).run().unwrap();

        assert_eq!(report.types.len(), 6);
        assert!(report.types.iter().all(|s| s.processed == 0 && s.indexed == 0));
        assert!(index.bulk_calls.is_empty());
    }
}
