// 🏛️ Legislator contact list (Wabunge) - one CSV row per member
//
// Columns vary between exports, so every column is kept under its lowercased
// header name. Phone-like columns are normalized in place.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{require_text, CleaningContext, PersonRecord};
use crate::error::RecordError;
use crate::normalize::{derive_identity, normalize_phone, value_as_text, DerivedIdentity};

const IDENTIFIER_COLUMNS: &[&str] = &["nida", "nida_number", "national_id"];

lazy_static! {
    // phone, phone1, phone_2, mobile_number, tel, telephone; not "telegram"
    static ref PHONE_COLUMN: Regex =
        Regex::new(r"^(?:phone|mobile|simu|tel|telephone)(?:_?\d+|_[a-z0-9_]*)?$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Legislator {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedIdentity>,
    /// Person view of the row, present only when the export carries an identifier.
    #[serde(skip)]
    pub member: Option<PersonRecord>,
}

/// `"Phone 1 "` → `"phone_1"`, `"PHONE1"` → `"phone1"`.
pub fn normalize_header(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

fn is_phone_column(key: &str) -> bool {
    PHONE_COLUMN.is_match(key)
}

pub fn clean(
    record_id: &str,
    raw: &Map<String, Value>,
    ctx: &CleaningContext,
) -> Result<Legislator, RecordError> {
    let row: Map<String, Value> = raw
        .iter()
        .map(|(key, value)| (normalize_header(key), value.clone()))
        .collect();

    let name = require_text(record_id, &row, &["name", "full_name", "jina"], "name")?;

    let mut fields = BTreeMap::new();
    for (key, value) in &row {
        if key == "name" || key == "id" || key.is_empty() {
            continue;
        }
        if is_phone_column(key) {
            let phone = value_as_text(value)
                .as_deref()
                .and_then(normalize_phone)
                .map(Value::String)
                .unwrap_or(Value::Null);
            fields.insert(key.clone(), phone);
        } else if let Some(text) = value_as_text(value) {
            fields.insert(key.clone(), Value::String(text));
        }
    }

    let has_identifier = IDENTIFIER_COLUMNS
        .iter()
        .any(|column| row.get(*column).and_then(value_as_text).is_some());

    let (member, derived) = if has_identifier {
        let mut member = PersonRecord::from_raw(&row, None, ctx);
        member.extra.clear();
        if member.phone.is_none() {
            member.phone = fields
                .iter()
                .filter(|(key, _)| is_phone_column(key))
                .find_map(|(_, value)| value.as_str().map(str::to_string));
        }
        let derived = member.derived.clone().or_else(|| {
            member
                .identity_key()
                .map(|id| derive_identity(&id, ctx.locations, ctx.today))
        });
        (Some(member), derived)
    } else {
        (None, None)
    };

    Ok(Legislator {
        id: record_id.to_string(),
        name,
        fields,
        derived,
        member,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::context;
    use serde_json::json;

    #[test]
    fn test_clean_row_normalizes_phone_columns() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({
            "NAME": "John Doe",
            "PHONE1": "0712 345 678",
            "PHONE2": "n/a",
            "CONSTITUENCY": "Ilala",
            "PARTY": ""
        });

        let member = clean("wabunge-6", raw.as_object().unwrap(), &ctx).unwrap();
        let doc = serde_json::to_value(&member).unwrap();

        assert_eq!(doc["id"], "wabunge-6");
        assert_eq!(doc["name"], "John Doe");
        assert_eq!(doc["phone1"], "+255712345678");
        assert_eq!(doc["phone2"], Value::Null);
        assert_eq!(doc["constituency"], "Ilala");
        assert!(doc.get("party").is_none());
        assert!(member.member.is_none());
    }

    #[test]
    fn test_row_with_identifier_has_member() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({"Name": "Neema Said", "NIDA": "19700704-11101-00009-01", "Phone 1": "0713000000"});

        let member = clean("wabunge-1", raw.as_object().unwrap(), &ctx).unwrap();

        let person = member.member.as_ref().unwrap();
        assert_eq!(person.identity_key().as_deref(), Some("19700704-11101-00009-01"));
        assert_eq!(person.phone.as_deref(), Some("+255713000000"));
        assert_eq!(member.derived.as_ref().unwrap().region.as_deref(), Some("Dar es Salaam"));
        assert_eq!(member.fields["phone_1"], "+255713000000");
    }

    #[test]
    fn test_missing_name() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({"PHONE1": "0712345678"});
        assert!(clean("wabunge-1", raw.as_object().unwrap(), &ctx).is_err());
    }

    #[test]
    fn test_normalize_header() {
        assert_eq!(normalize_header(" Phone 1 "), "phone_1");
        assert_eq!(normalize_header("PHONE1"), "phone1");
    }

    #[test]
    fn test_phone_columns_are_matched_by_name() {
        for key in ["phone", "phone1", "phone_2", "mobile_number", "tel", "telephone", "simu_1"] {
            assert!(is_phone_column(key), "{}", key);
        }
        for key in ["telegram", "telecom_provider", "phones_note", "mobiles"] {
            assert!(!is_phone_column(key), "{}", key);
        }

        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({"Name": "Amina Ali", "Telegram": "@amina_ali", "Tel": "0714 000 111"});

        let doc = serde_json::to_value(clean("wabunge-3", raw.as_object().unwrap(), &ctx).unwrap()).unwrap();
        assert_eq!(doc["telegram"], "@amina_ali");
        assert_eq!(doc["tel"], "+255714000111");
    }
}
