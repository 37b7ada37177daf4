// 📂 Source files - lazy record iteration over registry dumps
//
// JSON sources are directory trees; each file is either an object keyed by
// record id or a list of objects. The legislator source is a CSV file.
// Records are yielded one file at a time; a directory is never loaded whole.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::entities::{clean_record, CleanedEntity, CleaningContext};
use crate::error::{LoadError, RecordError};
use crate::normalize::value_as_text;

// ============================================================================
// SOURCE KIND
// ============================================================================

/// SourceKind - which registry a record comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Company,
    BusinessName,
    TaxPayer,
    Legislator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Csv,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [
        SourceKind::Company,
        SourceKind::BusinessName,
        SourceKind::TaxPayer,
        SourceKind::Legislator,
    ];

    /// Human-readable name, also stored as `registrationType` on person documents
    pub fn name(&self) -> &'static str {
        match self {
            SourceKind::Company => "Company",
            SourceKind::BusinessName => "Business Name",
            SourceKind::TaxPayer => "Tax Payer",
            SourceKind::Legislator => "Wabunge",
        }
    }

    /// Index the cleaned documents are written to
    pub fn index_name(&self) -> &'static str {
        match self {
            SourceKind::Company => "companies",
            SourceKind::BusinessName => "business_names",
            SourceKind::TaxPayer => "tax_payers",
            SourceKind::Legislator => "wabunge",
        }
    }

    pub fn format(&self) -> SourceFormat {
        match self {
            SourceKind::Legislator => SourceFormat::Csv,
            _ => SourceFormat::Json,
        }
    }
}

// ============================================================================
// RAW RECORDS
// ============================================================================

/// One undecoded record and where it came from.
#[derive(Debug, Clone)]
pub struct RawRecord {
    pub record_id: String,
    pub value: Value,
    pub source_file: PathBuf,
}

/// All files under `root` with one of `extensions`, sorted for a stable order.
///
/// `root` may also be a single file.
pub fn source_files(root: &Path, extensions: &[&str]) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(root = %root.display(), error = %e, "skipping unreadable path");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
                .unwrap_or(false)
        })
        .collect();
    files.sort();
    files
}

/// Read every record of one JSON file.
pub fn read_json_records(path: &Path) -> Result<Vec<RawRecord>, LoadError> {
    let source_error = |reason: String| LoadError::SourceFile {
        path: path.to_path_buf(),
        reason,
    };

    let file = File::open(path).map_err(|e| source_error(e.to_string()))?;
    let json: Value = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| source_error(e.to_string()))?;

    match json {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(record_id, value)| RawRecord {
                record_id,
                value,
                source_file: path.to_path_buf(),
            })
            .collect()),
        Value::Array(items) => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("record")
                .to_string();
            Ok(items
                .into_iter()
                .map(|value| {
                    let record_id = list_record_id(&stem, &value);
                    RawRecord {
                        record_id,
                        value,
                        source_file: path.to_path_buf(),
                    }
                })
                .collect())
        }
        other => Err(source_error(format!(
            "expected an object or a list at top level, found {}",
            match other {
                Value::Null => "null",
                Value::Bool(_) => "a boolean",
                Value::Number(_) => "a number",
                _ => "a string",
            }
        ))),
    }
}

/// Id of a record inside a JSON list: its own `id` field, else a content
/// fingerprint so reloading the same file yields the same id.
fn list_record_id(stem: &str, value: &Value) -> String {
    if let Some(id) = ["id", "_id", "record_id"]
        .iter()
        .find_map(|key| value.get(*key).and_then(value_as_text))
    {
        return id;
    }

    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(value).unwrap_or_default());
    let digest = format!("{:x}", hasher.finalize());
    format!("{}-{}", stem, &digest[..16])
}

/// Lazily read rows from the legislator CSV(s). Row `i` (zero-based, across
/// all files) gets id `{prefix}-{i + 1}`; malformed rows are skipped but keep
/// their position.
pub fn csv_records(root: &Path, prefix: &'static str) -> impl Iterator<Item = RawRecord> {
    source_files(root, &["csv"])
        .into_iter()
        .flat_map(|path| {
            let rows: Box<dyn Iterator<Item = (PathBuf, Option<Value>)>> =
                match csv::ReaderBuilder::new()
                    .has_headers(true)
                    .flexible(true)
                    .trim(csv::Trim::All)
                    .from_path(&path)
                {
                    Ok(mut reader) => {
                        let headers = match reader.headers() {
                            Ok(headers) => headers.clone(),
                            Err(e) => {
                                warn!(path = %path.display(), error = %e, "skipping CSV without headers");
                                return Box::new(std::iter::empty())
                                    as Box<dyn Iterator<Item = (PathBuf, Option<Value>)>>;
                            }
                        };
                        let file = path.clone();
                        Box::new(reader.into_records().map(move |row| match row {
                            Ok(record) => {
                                let map = headers
                                    .iter()
                                    .zip(record.iter())
                                    .map(|(h, v)| (h.to_string(), Value::String(v.to_string())))
                                    .collect::<serde_json::Map<_, _>>();
                                (file.clone(), Some(Value::Object(map)))
                            }
                            Err(e) => {
                                warn!(path = %file.display(), error = %e, "skipping malformed CSV row");
                                (file.clone(), None)
                            }
                        }))
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping unreadable CSV file");
                        Box::new(std::iter::empty())
                    }
                };
            rows
        })
        .enumerate()
        .filter_map(move |(index, (source_file, value))| {
            value.map(|value| RawRecord {
                record_id: format!("{}-{}", prefix, index + 1),
                value,
                source_file,
            })
        })
}

/// Lazily yield raw records of a source kind.
pub fn raw_records(kind: SourceKind, root: &Path) -> Box<dyn Iterator<Item = RawRecord>> {
    match kind.format() {
        SourceFormat::Csv => Box::new(csv_records(root, "wabunge")),
        SourceFormat::Json => Box::new(source_files(root, &["json"]).into_iter().flat_map(
            |path| match read_json_records(&path) {
                Ok(records) => {
                    debug!(path = %path.display(), records = records.len(), "read source file");
                    records
                }
                Err(e) => {
                    warn!(error = %e, "skipping source file");
                    Vec::new()
                }
            },
        )),
    }
}

/// Lazily clean every record of one source. Failures are yielded, not
/// logged; the entity pass counts them and later passes skip them.
pub fn cleaned_entities<'a>(
    kind: SourceKind,
    root: &Path,
    ctx: CleaningContext<'a>,
) -> impl Iterator<Item = Result<CleanedEntity, RecordError>> + 'a {
    raw_records(kind, root)
        .map(move |record| clean_record(kind, &record.record_id, &record.value, &ctx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::context;
    use std::fs;

    #[test]
    fn test_json_object_and_list_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("2023")).unwrap();
        fs::write(
            dir.path().join("2023/a.json"),
            r#"{"100": {"company_name": "A"}, "101": {"company_name": "B"}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("b.json"),
            r#"[{"id": 7, "company_name": "C"}, {"company_name": "D"}]"#,
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let records: Vec<RawRecord> = raw_records(SourceKind::Company, dir.path()).collect();
        let ids: Vec<&str> = records.iter().map(|r| r.record_id.as_str()).collect();

        assert_eq!(records.len(), 4);
        assert_eq!(&ids[..2], &["100", "101"]);
        assert_eq!(ids[2], "7");
        assert!(ids[3].starts_with("b-"));

        // Fingerprinted ids are stable across reads
        let again: Vec<RawRecord> = raw_records(SourceKind::Company, dir.path()).collect();
        assert_eq!(again[3].record_id, records[3].record_id);
    }

    #[test]
    fn test_malformed_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{ not json").unwrap();
        fs::write(dir.path().join("scalar.json"), "42").unwrap();
        fs::write(dir.path().join("good.json"), r#"{"1": {"company_name": "Ok"}}"#).unwrap();

        let records: Vec<RawRecord> = raw_records(SourceKind::Company, dir.path()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record_id, "1");

        let err = read_json_records(&dir.path().join("scalar.json")).unwrap_err();
        assert!(matches!(err, LoadError::SourceFile { .. }));
    }

    #[test]
    fn test_csv_row_ids_are_one_based() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wabunge.csv");
        let mut rows = String::from("NAME,PHONE1\n");
        for i in 0..5 {
            rows.push_str(&format!("Member {},07120000{:02}\n", i, i));
        }
        rows.push_str("John Doe,0712 345 678\n");
        fs::write(&path, rows).unwrap();

        let records: Vec<RawRecord> = csv_records(&path, "wabunge").collect();

        assert_eq!(records.len(), 6);
        assert_eq!(records[5].record_id, "wabunge-6");
        assert_eq!(records[5].value["NAME"], "John Doe");
    }

    #[test]
    fn test_cleaned_entities_yields_failures_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("biz.json"),
            r#"{"1": {"business_name": "Duka"}, "2": {"owners": []}, "3": "oops"}"#,
        )
        .unwrap();
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);

        let results: Vec<Result<CleanedEntity, RecordError>> =
            cleaned_entities(SourceKind::BusinessName, dir.path(), ctx).collect();
        assert_eq!(results.len(), 3);
        assert!(matches!(results[1], Err(RecordError::MissingField { .. })));
        assert!(matches!(results[2], Err(RecordError::NotAnObject { .. })));

        let entities: Vec<CleanedEntity> = results.into_iter().filter_map(Result::ok).collect();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id(), "1");
        assert_eq!(entities[0].kind(), SourceKind::BusinessName);
    }
}
