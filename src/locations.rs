// 📍 Location lookup - postcode → region / district / ward
//
// National identifiers embed a 5-character location code. The mapping comes
// from a CSV with header `postcode,region,district,ward`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub region: String,
    pub district: String,
    pub ward: String,
}

#[derive(Debug, Deserialize)]
struct LocationRow {
    postcode: String,
    region: String,
    district: String,
    ward: String,
}

/// In-memory postcode table, read once per run.
#[derive(Debug, Clone, Default)]
pub struct LocationTable {
    entries: HashMap<String, Location>,
}

impl LocationTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the table from a CSV file.
    ///
    /// Rows that fail to deserialize are skipped; an unreadable file is an error.
    pub fn from_csv_path(path: &Path) -> Result<Self, LoadError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| LoadError::LocationTable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut table = LocationTable::new();
        let mut skipped = 0usize;

        for result in reader.deserialize::<LocationRow>() {
            match result {
                Ok(row) => table.insert(
                    &row.postcode,
                    Location {
                        region: row.region,
                        district: row.district,
                        ward: row.ward,
                    },
                ),
                Err(_) => skipped += 1,
            }
        }

        tracing::info!(
            path = %path.display(),
            entries = table.len(),
            skipped,
            "loaded location table"
        );

        Ok(table)
    }

    pub fn insert(&mut self, postcode: &str, location: Location) {
        self.entries.insert(postcode.trim().to_string(), location);
    }

    pub fn lookup(&self, postcode: &str) -> Option<&Location> {
        self.entries.get(postcode.trim())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
