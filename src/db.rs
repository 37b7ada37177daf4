// 🗄️ Document index - SQLite + FTS5
//
// Every logical index (companies, persons, ...) lives in one `documents`
// table keyed by (index_name, id); the FTS5 table shares its rowid and holds
// the flattened searchable text. Load runs are logged in `load_runs`.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::IndexError;

/// Indexes a load run writes to.
pub const KNOWN_INDEXES: &[&str] = &[
    "companies",
    "business_names",
    "tax_payers",
    "wabunge",
    "persons",
    "corporate_shareholders",
];

pub fn is_known_index(name: &str) -> bool {
    KNOWN_INDEXES.contains(&name)
}

// ============================================================================
// DOCUMENTS & OUTCOMES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDocument {
    pub id: String,
    pub body: Value,
}

impl IndexDocument {
    pub fn new(id: impl Into<String>, body: Value) -> Self {
        IndexDocument {
            id: id.into(),
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Result of one batch: how many documents landed, and which were rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BulkOutcome {
    pub indexed: usize,
    pub failures: Vec<BulkFailure>,
}

/// One row of the `load_runs` log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub elapsed_ms: i64,
    pub summary: Value,
}

// ============================================================================
// INDEX TRAIT
// ============================================================================

/// A search index the bulk loader can write to.
///
/// `bulk` reports rejected documents in its outcome; an `Err` means the index
/// itself is unusable and the run must stop.
pub trait DocumentIndex {
    fn ping(&self) -> Result<(), IndexError>;

    /// Drop every document of `index` so the run starts from empty.
    fn recreate(&mut self, index: &str) -> Result<(), IndexError>;

    fn bulk(&mut self, index: &str, documents: &[IndexDocument]) -> Result<BulkOutcome, IndexError>;

    fn record_run(&mut self, _run: &RunRecord) -> Result<(), IndexError> {
        Ok(())
    }
}

// ============================================================================
// SQLITE INDEX
// ============================================================================

pub struct SqliteIndex {
    conn: Connection,
}

impl SqliteIndex {
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path)?;
        setup_database(&conn)?;
        Ok(SqliteIndex { conn })
    }

    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        setup_database(&conn)?;
        Ok(SqliteIndex { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn count(&self, index: &str) -> Result<i64, IndexError> {
        count_documents(&self.conn, index).map_err(IndexError::from)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>, IndexError> {
        get_recent_runs(&self.conn, limit).map_err(IndexError::from)
    }
}

impl DocumentIndex for SqliteIndex {
    fn ping(&self) -> Result<(), IndexError> {
        self.conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }

    fn recreate(&mut self, index: &str) -> Result<(), IndexError> {
        if !is_known_index(index) {
            return Err(IndexError::UnknownIndex(index.to_string()));
        }

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM documents_fts
             WHERE rowid IN (SELECT doc_key FROM documents WHERE index_name = ?1)",
            [index],
        )?;
        tx.execute("DELETE FROM documents WHERE index_name = ?1", [index])?;
        tx.commit()?;
        Ok(())
    }

    fn bulk(&mut self, index: &str, documents: &[IndexDocument]) -> Result<BulkOutcome, IndexError> {
        if !is_known_index(index) {
            return Err(IndexError::UnknownIndex(index.to_string()));
        }

        let mut outcome = BulkOutcome::default();
        let indexed_at = Utc::now().to_rfc3339();
        let mut tx = self.conn.transaction()?;

        for doc in documents {
            if let Some(reason) = rejection_reason(doc) {
                outcome.failures.push(BulkFailure {
                    id: doc.id.clone(),
                    reason,
                });
                continue;
            }

            let sp = tx.savepoint()?;
            match upsert_document(&sp, index, doc, &indexed_at) {
                Ok(()) => {
                    sp.commit()?;
                    outcome.indexed += 1;
                }
                Err(rusqlite::Error::SqliteFailure(err, msg))
                    if err.code == rusqlite::ErrorCode::ConstraintViolation
                        || err.code == rusqlite::ErrorCode::TooBig =>
                {
                    // Savepoint rolls back on drop
                    outcome.failures.push(BulkFailure {
                        id: doc.id.clone(),
                        reason: msg.unwrap_or_else(|| err.to_string()),
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn record_run(&mut self, run: &RunRecord) -> Result<(), IndexError> {
        insert_run(&self.conn, run).map_err(IndexError::from)
    }
}

fn rejection_reason(doc: &IndexDocument) -> Option<String> {
    if doc.id.trim().is_empty() {
        return Some("document id is empty".to_string());
    }
    if !doc.body.is_object() {
        return Some("document body is not a JSON object".to_string());
    }
    None
}

fn upsert_document(
    conn: &Connection,
    index: &str,
    doc: &IndexDocument,
    indexed_at: &str,
) -> rusqlite::Result<()> {
    let body = doc.body.to_string();

    let doc_key: i64 = conn.query_row(
        "INSERT INTO documents (index_name, id, body, indexed_at)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(index_name, id) DO UPDATE SET body = excluded.body, indexed_at = excluded.indexed_at
         RETURNING doc_key",
        params![index, doc.id, body, indexed_at],
        |row| row.get(0),
    )?;

    conn.execute("DELETE FROM documents_fts WHERE rowid = ?1", [doc_key])?;
    conn.execute(
        "INSERT INTO documents_fts (rowid, content) VALUES (?1, ?2)",
        params![doc_key, searchable_text(&doc.body)],
    )?;

    Ok(())
}

/// Flatten every scalar leaf of a document into one space-separated string.
pub fn searchable_text(body: &Value) -> String {
    fn collect(value: &Value, out: &mut Vec<String>) {
        match value {
            Value::String(s) if !s.is_empty() => out.push(s.clone()),
            Value::Number(n) => out.push(n.to_string()),
            Value::Array(items) => items.iter().for_each(|item| collect(item, out)),
            Value::Object(map) => map.values().for_each(|item| collect(item, out)),
            _ => {}
        }
    }

    let mut parts = Vec::new();
    collect(body, &mut parts);
    parts.join(" ")
}

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> rusqlite::Result<()> {
    // WAL lets the search server read while a load is running
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS documents (
            doc_key INTEGER PRIMARY KEY,
            index_name TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            indexed_at TEXT NOT NULL,
            UNIQUE (index_name, id)
        );

        CREATE VIRTUAL TABLE IF NOT EXISTS documents_fts USING fts5(
            content,
            tokenize = 'unicode61 remove_diacritics 2'
        );

        CREATE TABLE IF NOT EXISTS load_runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id TEXT UNIQUE NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT NOT NULL,
            elapsed_ms INTEGER NOT NULL,
            summary TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_documents_index ON documents(index_name, id);",
    )?;

    Ok(())
}

pub fn count_documents(conn: &Connection, index: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM documents WHERE index_name = ?1",
        [index],
        |row| row.get(0),
    )
}

pub fn get_document(conn: &Connection, index: &str, id: &str) -> rusqlite::Result<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE index_name = ?1 AND id = ?2",
            [index, id],
            |row| row.get(0),
        )
        .optional()?;

    Ok(body.and_then(|b| serde_json::from_str(&b).ok()))
}

pub fn insert_run(conn: &Connection, run: &RunRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO load_runs (run_id, started_at, finished_at, elapsed_ms, summary)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            run.run_id,
            run.started_at.to_rfc3339(),
            run.finished_at.to_rfc3339(),
            run.elapsed_ms,
            run.summary.to_string(),
        ],
    )?;
    Ok(())
}

pub fn get_recent_runs(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<RunRecord>> {
    let mut stmt = conn.prepare(
        "SELECT run_id, started_at, finished_at, elapsed_ms, summary
         FROM load_runs
         ORDER BY id DESC
         LIMIT ?1",
    )?;

    let runs = stmt
        .query_map([limit as i64], |row| {
            let started: String = row.get(1)?;
            let finished: String = row.get(2)?;
            let summary: String = row.get(4)?;
            Ok(RunRecord {
                run_id: row.get(0)?,
                started_at: parse_timestamp(&started),
                finished_at: parse_timestamp(&finished),
                elapsed_ms: row.get(3)?,
                summary: serde_json::from_str(&summary).unwrap_or(Value::Null),
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(runs)
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
