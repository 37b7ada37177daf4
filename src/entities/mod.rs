// Entity Cleaners - one per registry source
//
// Each cleaner is a pure transform: raw JSON record → canonical document.
// The set of source types is closed; dispatch happens on `SourceKind`.

pub mod business_name;
pub mod company;
pub mod legislator;
pub mod person;
pub mod tax_payer;

pub use business_name::BusinessName;
pub use company::Company;
pub use legislator::Legislator;
pub use person::{clean_person_block, label_from_key, normalize_identity, PersonRecord};
pub use tax_payer::TaxPayer;

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::RecordError;
use crate::locations::LocationTable;
use crate::normalize::{value_as_text, NationalityPolicy};
use crate::sources::SourceKind;

// ============================================================================
// CLEANING CONTEXT
// ============================================================================

/// Read-only inputs shared by all cleaners during one run.
#[derive(Debug, Clone, Copy)]
pub struct CleaningContext<'a> {
    pub locations: &'a LocationTable,
    pub nationality: &'a NationalityPolicy,
    /// Reference date for age computation.
    pub today: NaiveDate,
}

impl<'a> CleaningContext<'a> {
    pub fn new(
        locations: &'a LocationTable,
        nationality: &'a NationalityPolicy,
        today: NaiveDate,
    ) -> Self {
        CleaningContext {
            locations,
            nationality,
            today,
        }
    }
}

// ============================================================================
// ROLES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Director,
    Shareholder,
    Applicant,
    Secretary,
    Owner,
    AuthorizedPerson,
    BankOperator,
    Taxpayer,
    Associate,
    Legislator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Director => "director",
            Role::Shareholder => "shareholder",
            Role::Applicant => "applicant",
            Role::Secretary => "secretary",
            Role::Owner => "owner",
            Role::AuthorizedPerson => "authorized_person",
            Role::BankOperator => "bank_operator",
            Role::Taxpayer => "taxpayer",
            Role::Associate => "associate",
            Role::Legislator => "legislator",
        }
    }
}

// ============================================================================
// CLEANED ENTITY
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CleanedEntity {
    Company(Company),
    BusinessName(BusinessName),
    TaxPayer(TaxPayer),
    Legislator(Legislator),
}

impl CleanedEntity {
    pub fn id(&self) -> &str {
        match self {
            CleanedEntity::Company(c) => &c.id,
            CleanedEntity::BusinessName(b) => &b.id,
            CleanedEntity::TaxPayer(t) => &t.id,
            CleanedEntity::Legislator(l) => &l.id,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            CleanedEntity::Company(_) => SourceKind::Company,
            CleanedEntity::BusinessName(_) => SourceKind::BusinessName,
            CleanedEntity::TaxPayer(_) => SourceKind::TaxPayer,
            CleanedEntity::Legislator(_) => SourceKind::Legislator,
        }
    }

    /// Stable external number used to group a person's roles across filings
    /// of the same legal entity; falls back to the record id.
    pub fn registration_id(&self) -> &str {
        let external = match self {
            CleanedEntity::Company(c) => c.incorporation_number.as_deref(),
            CleanedEntity::BusinessName(b) => b.registration_number.as_deref(),
            CleanedEntity::TaxPayer(t) => Some(t.tin.as_str()),
            CleanedEntity::Legislator(_) => None,
        };
        external.unwrap_or_else(|| self.id())
    }

    pub fn approval_status(&self) -> Option<&str> {
        match self {
            CleanedEntity::Company(c) => Some(&c.approval_status),
            CleanedEntity::BusinessName(b) => Some(&b.approval_status),
            CleanedEntity::TaxPayer(t) => Some(&t.approval_status),
            CleanedEntity::Legislator(_) => None,
        }
    }

    /// Role → people mapping for person extraction.
    pub fn roles(&self) -> Vec<(Role, &[PersonRecord])> {
        match self {
            CleanedEntity::Company(c) => vec![
                (Role::Director, c.directors.as_slice()),
                (Role::Shareholder, c.shareholders.as_slice()),
                (Role::Applicant, c.applicants.as_slice()),
                (Role::Secretary, c.secretaries.as_slice()),
            ],
            CleanedEntity::BusinessName(b) => vec![
                (Role::Owner, b.owners.as_slice()),
                (Role::AuthorizedPerson, b.authorized_persons.as_slice()),
                (Role::BankOperator, b.bank_operators.as_slice()),
                (Role::Applicant, b.applicants.as_slice()),
            ],
            CleanedEntity::TaxPayer(t) => vec![
                (Role::Taxpayer, std::slice::from_ref(&t.taxpayer)),
                (Role::Associate, t.associates.as_slice()),
            ],
            CleanedEntity::Legislator(l) => match &l.member {
                Some(member) => vec![(Role::Legislator, std::slice::from_ref(member))],
                None => Vec::new(),
            },
        }
    }

    pub fn to_json(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Clean one raw record of the given source type.
pub fn clean_record(
    kind: SourceKind,
    record_id: &str,
    raw: &Value,
    ctx: &CleaningContext,
) -> Result<CleanedEntity, RecordError> {
    let map = as_object(record_id, raw)?;
    Ok(match kind {
        SourceKind::Company => CleanedEntity::Company(company::clean(record_id, map, ctx)?),
        SourceKind::BusinessName => {
            CleanedEntity::BusinessName(business_name::clean(record_id, map, ctx)?)
        }
        SourceKind::TaxPayer => CleanedEntity::TaxPayer(tax_payer::clean(record_id, map, ctx)?),
        SourceKind::Legislator => {
            CleanedEntity::Legislator(legislator::clean(record_id, map, ctx)?)
        }
    })
}

// ============================================================================
// RAW FIELD HELPERS
// ============================================================================

pub(crate) fn as_object<'v>(
    record_id: &str,
    raw: &'v Value,
) -> Result<&'v Map<String, Value>, RecordError> {
    raw.as_object().ok_or_else(|| RecordError::NotAnObject {
        record_id: record_id.to_string(),
        found: match raw {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        },
    })
}

/// First non-blank text value among several key spellings.
pub(crate) fn pick_text(raw: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|key| raw.get(*key).and_then(value_as_text))
}

pub(crate) fn pick_value<'v>(raw: &'v Map<String, Value>, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().find_map(|key| raw.get(*key)).filter(|v| !v.is_null())
}

pub(crate) fn require_text(
    record_id: &str,
    raw: &Map<String, Value>,
    keys: &[&str],
    field: &'static str,
) -> Result<String, RecordError> {
    pick_text(raw, keys).ok_or_else(|| RecordError::MissingField {
        record_id: record_id.to_string(),
        field,
    })
}

/// Parse an amount that may be a number or a string like `"1,000,000.00"`.
pub(crate) fn pick_amount(raw: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    match pick_value(raw, keys)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s.chars().filter(|c| !matches!(c, ',' | ' ' | '_')).collect();
            cleaned.parse::<f64>().ok()
        }
        _ => None,
    }
}
