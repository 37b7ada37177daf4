// 🏦 Corporate Shareholder Aggregator
//
// Companies that hold shares in other companies get one roll-up document
// listing every holding across all filings. Built in a single pass over the
// raw company files, then written once.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::entities::company::{
    find_holding, share_value, AUTHORISED_SHARE, COMPANY_NAME, NUMBER_OF_SHARES, SHAREHOLDERS,
    SHARE_TABLE,
};
use crate::entities::{
    clean_person_block, normalize_identity, pick_amount, pick_text, pick_value, CleaningContext,
    PersonRecord,
};
use crate::share_table::parse_share_table;
use crate::sources::{raw_records, RawRecord, SourceKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareholdingEntry {
    pub company_id: String,
    pub company_name: String,
    pub shares_class: Option<String>,
    pub shares_count: i64,
    pub share_value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareholderAggregate {
    pub id: String,
    pub identity: String,
    pub name: Option<String>,
    pub nationality: Option<String>,
    pub registration_number: Option<String>,
    pub shareholdings: Vec<ShareholdingEntry>,
    pub shareholding_count: usize,
}

/// Identity of a non-natural shareholder: the usual identity key, then its
/// registration number, then its uppercased name.
pub fn shareholder_identity(person: &PersonRecord) -> Option<String> {
    person
        .identity_key()
        .or_else(|| {
            person
                .registration_number
                .as_deref()
                .and_then(normalize_identity)
        })
        .or_else(|| person.full_name().map(|name| name.to_uppercase()))
}

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Run-scoped identity → aggregate map. `finish` consumes it, so nothing can
/// touch the aggregates after they are sealed.
#[derive(Debug, Default)]
pub struct ShareholderAccumulator {
    aggregates: BTreeMap<String, ShareholderAggregate>,
}

impl ShareholderAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, identity: String, person: &PersonRecord, entry: ShareholdingEntry) {
        let aggregate = self
            .aggregates
            .entry(identity.clone())
            .or_insert_with(|| ShareholderAggregate {
                id: identity.clone(),
                identity,
                name: None,
                nationality: None,
                registration_number: None,
                shareholdings: Vec::new(),
                shareholding_count: 0,
            });

        if aggregate.name.is_none() {
            aggregate.name = person.full_name();
        }
        if aggregate.nationality.is_none() {
            aggregate.nationality = person.nationality.clone();
        }
        if aggregate.registration_number.is_none() {
            aggregate.registration_number = person.registration_number.clone();
        }

        // A filing seen twice replaces its earlier entry
        match aggregate
            .shareholdings
            .iter_mut()
            .find(|existing| existing.company_id == entry.company_id)
        {
            Some(existing) => *existing = entry,
            None => aggregate.shareholdings.push(entry),
        }
    }

    /// Scan one raw company filing.
    pub fn scan_filing(&mut self, record: &RawRecord, ctx: &CleaningContext) {
        let raw = match record.value.as_object() {
            Some(raw) => raw,
            None => return,
        };

        let company_name =
            pick_text(raw, COMPANY_NAME).unwrap_or_else(|| record.record_id.clone());
        let authorised = pick_amount(raw, AUTHORISED_SHARE).unwrap_or(0.0);
        let number_of_shares = pick_amount(raw, NUMBER_OF_SHARES)
            .map(|n| n as i64)
            .unwrap_or(0);
        let holdings = pick_text(raw, SHARE_TABLE)
            .map(|table| parse_share_table(&table))
            .unwrap_or_default();

        for person in clean_person_block(pick_value(raw, SHAREHOLDERS), ctx) {
            if !person.is_non_natural() {
                continue;
            }
            let identity = match shareholder_identity(&person) {
                Some(identity) => identity,
                None => {
                    debug!(record = %record.record_id, "corporate shareholder without identity");
                    continue;
                }
            };

            let cell = find_holding(&person, &holdings);
            let shares_count = cell.map(|c| c.shares_count).unwrap_or(0);
            let entry = ShareholdingEntry {
                company_id: record.record_id.clone(),
                company_name: company_name.clone(),
                shares_class: cell.and_then(|c| c.shares_class.clone()),
                shares_count,
                share_value: share_value(shares_count, authorised, number_of_shares),
            };

            self.add(identity, &person, entry);
        }
    }

    pub fn len(&self) -> usize {
        self.aggregates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aggregates.is_empty()
    }

    /// Seal the aggregates: set `shareholding_count` and hand them out.
    pub fn finish(self) -> Vec<ShareholderAggregate> {
        self.aggregates
            .into_values()
            .map(|mut aggregate| {
                aggregate.shareholding_count = aggregate.shareholdings.len();
                aggregate
            })
            .collect()
    }
}

/// Build all corporate shareholder aggregates from the company source tree.
pub fn aggregate_shareholders(root: &Path, ctx: &CleaningContext) -> Vec<ShareholderAggregate> {
    let mut accumulator = ShareholderAccumulator::new();
    let mut filings = 0usize;

    for record in raw_records(SourceKind::Company, root) {
        accumulator.scan_filing(&record, ctx);
        filings += 1;
    }

    let aggregates = accumulator.finish();
    info!(
        filings,
        shareholders = aggregates.len(),
        "aggregated corporate shareholders"
    );
    aggregates
}

impl ShareholderAggregate {
    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::context;
    use serde_json::json;
    use std::fs;
    use std::path::PathBuf;

    fn record(id: &str, value: Value) -> RawRecord {
        RawRecord {
            record_id: id.to_string(),
            value,
            source_file: PathBuf::from("test.json"),
        }
    }

    fn filing(name: &str, table: &str) -> Value {
        json!({
            "company_name": name,
            "authorised_share_capital": 100000,
            "number_of_shares": 100,
            "shareholders": {
                "Shareholder 1 - ACME HOLDINGS LTD": {"registration_number": "c-0042", "natural_person": "No"},
                "Shareholder 2 - Jane Doe": {"first_name": "Jane", "national_id": "19900515", "natural_person": true},
                "Shareholder 3 - Mystery Corp": {"shareholder_type": "Legal Entity"}
            },
            "share_table": table
        })
    }

    #[test]
    fn test_aggregates_across_filings() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let mut acc = ShareholderAccumulator::new();

        acc.scan_filing(
            &record("c1", filing("Alpha Ltd", "<tr><td>C-0042</td><td>Acme</td><td>Ordinary</td><td>30</td></tr>")),
            &ctx,
        );
        acc.scan_filing(&record("c2", filing("Beta Ltd", "")), &ctx);

        let aggregates = acc.finish();
        assert_eq!(aggregates.len(), 2);

        let acme = aggregates.iter().find(|a| a.identity == "C-0042").unwrap();
        assert_eq!(acme.name.as_deref(), Some("ACME HOLDINGS LTD"));
        assert_eq!(acme.shareholding_count, 2);
        assert_eq!(acme.shareholdings[0].company_name, "Alpha Ltd");
        assert_eq!(acme.shareholdings[0].shares_count, 30);
        assert_eq!(acme.shareholdings[0].share_value, 30_000.0);
        assert_eq!(acme.shareholdings[1].shares_count, 0);
        assert_eq!(acme.shareholdings[1].share_value, 0.0);

        let mystery = aggregates.iter().find(|a| a.identity == "MYSTERY CORP").unwrap();
        assert_eq!(mystery.shareholding_count, 2);

        assert!(aggregates.iter().all(|a| a.shareholding_count == a.shareholdings.len()));
    }

    #[test]
    fn test_rescanning_a_filing_does_not_duplicate() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let mut acc = ShareholderAccumulator::new();

        let filing = record("c1", filing("Alpha Ltd", ""));
        acc.scan_filing(&filing, &ctx);
        acc.scan_filing(&filing, &ctx);

        for aggregate in acc.finish() {
            assert_eq!(aggregate.shareholding_count, 1);
        }
    }

    #[test]
    fn test_aggregate_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        let files = json!({
            "c1": filing("Alpha Ltd", ""),
            "c2": filing("Beta Ltd", ""),
            "c3": {"company_name": "Gamma Ltd", "shareholders": [{"name": "Solo Person", "natural_person": "yes"}]}
        });
        fs::write(dir.path().join("companies.json"), files.to_string()).unwrap();
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);

        let aggregates = aggregate_shareholders(dir.path(), &ctx);

        assert_eq!(aggregates.len(), 2);
        assert!(aggregates.iter().all(|a| a.shareholding_count == a.shareholdings.len()));
        assert!(aggregates.iter().all(|a| a.shareholding_count == 2));
    }
}
