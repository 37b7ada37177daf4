// 👤 Person sub-records - directors, shareholders, owners, applicants...
//
// Every entity type embeds people. They all go through the same cleaner so
// the invariant holds everywhere: a normalized `phone` field (possibly null),
// and a `derived` block whenever a national identifier is present.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{pick_text, CleaningContext};
use crate::normalize::{
    clean_nationality, derive_identity, is_placeholder, normalize_bool, normalize_phone,
    DerivedIdentity,
};

// Raw key spellings seen across the registry dumps, first match wins.
const FIRST_NAME: &[&str] = &["first_name", "firstName", "First Name", "fname"];
const MIDDLE_NAME: &[&str] = &["middle_name", "middleName", "Middle Name", "mname"];
const LAST_NAME: &[&str] = &["last_name", "lastName", "Last Name", "surname", "lname"];
const NAME: &[&str] = &["name", "full_name", "fullName", "Name", "entity_name"];
const NATIONAL_ID: &[&str] = &["national_id", "nationalId", "National ID", "id_number"];
const NIDA_NUMBER: &[&str] = &["nida_number", "nida", "nidaNumber", "NIDA"];
const PASSPORT: &[&str] = &["passport_number", "passport", "passportNumber", "Passport"];
const REGISTRATION: &[&str] = &["registration_number", "incorporation_number", "reg_no"];
const NATIONALITY: &[&str] = &["nationality", "Nationality", "citizenship"];
const GENDER: &[&str] = &["gender", "sex", "Gender"];
const EMAIL: &[&str] = &["email", "email_address", "Email"];
const ADDRESS: &[&str] = &["address", "postal_address", "physical_address", "Address"];
const PHONE: &[&str] = &["phone", "phone_number", "mobile", "telephone", "Phone"];
const NATURAL_PERSON: &[&str] = &["natural_person", "is_natural_person", "naturalPerson"];
const SHAREHOLDER_TYPE: &[&str] = &["shareholder_type", "shareholderType", "type"];

/// Keys consumed by the cleaner; anything else is carried in `extra`.
fn is_known_key(key: &str) -> bool {
    [
        FIRST_NAME, MIDDLE_NAME, LAST_NAME, NAME, NATIONAL_ID, NIDA_NUMBER, PASSPORT,
        REGISTRATION, NATIONALITY, GENDER, EMAIL, ADDRESS, PHONE, NATURAL_PERSON,
        SHAREHOLDER_TYPE,
    ]
    .iter()
    .any(|keys| keys.contains(&key))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub middle_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nida_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registration_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nationality: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Canonical phone; serialized as `null` when missing or invalid.
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub natural_person: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shareholder_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shares_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub derived: Option<DerivedIdentity>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl PersonRecord {
    /// Clean one raw person mapping.
    pub fn from_raw(raw: &Map<String, Value>, label: Option<String>, ctx: &CleaningContext) -> Self {
        let national_id = pick_text(raw, NATIONAL_ID);
        let nida_number = pick_text(raw, NIDA_NUMBER);

        let derived = national_id
            .as_deref()
            .or(nida_number.as_deref())
            .map(|id| derive_identity(id, ctx.locations, ctx.today));

        let raw_nationality = pick_text(raw, NATIONALITY);
        let nationality =
            clean_nationality(raw_nationality.as_deref(), derived.as_ref(), ctx.nationality);

        let natural_person = NATURAL_PERSON
            .iter()
            .find_map(|key| raw.get(*key))
            .and_then(normalize_bool);

        let extra = raw
            .iter()
            .filter(|(key, value)| !is_known_key(key) && !value.is_null())
            .filter(|(_, value)| !matches!(value, Value::String(s) if is_placeholder(s)))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        PersonRecord {
            label,
            first_name: pick_text(raw, FIRST_NAME),
            middle_name: pick_text(raw, MIDDLE_NAME),
            last_name: pick_text(raw, LAST_NAME),
            name: pick_text(raw, NAME),
            national_id,
            nida_number,
            passport_number: pick_text(raw, PASSPORT),
            registration_number: pick_text(raw, REGISTRATION),
            nationality,
            gender: pick_text(raw, GENDER),
            email: pick_text(raw, EMAIL).map(|e| e.to_lowercase()),
            address: pick_text(raw, ADDRESS),
            phone: pick_text(raw, PHONE).as_deref().and_then(normalize_phone),
            natural_person,
            shareholder_type: pick_text(raw, SHAREHOLDER_TYPE),
            shares_class: None,
            shares_count: None,
            derived,
            extra,
        }
    }

    /// Exact-match identity: national id, then NIDA number, then passport.
    pub fn identity_key(&self) -> Option<String> {
        [&self.national_id, &self.nida_number, &self.passport_number]
            .into_iter()
            .find_map(|candidate| candidate.as_deref().and_then(normalize_identity))
    }

    /// Display name from trimmed name parts, falling back to `name`, then the
    /// label taken from the raw mapping key.
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .filter_map(|part| part.as_deref())
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect();

        if !parts.is_empty() {
            return Some(parts.join(" "));
        }

        self.name.clone().or_else(|| self.label.clone())
    }

    /// True when the record describes a company or other legal entity.
    pub fn is_non_natural(&self) -> bool {
        if let Some(natural) = self.natural_person {
            return !natural;
        }
        self.shareholder_type
            .as_deref()
            .map(|t| {
                let t = t.to_lowercase();
                t.contains("legal") || t.contains("corporate") || t.contains("company")
            })
            .unwrap_or(false)
    }
}

/// Trim, drop inner whitespace and uppercase an identifier.
pub fn normalize_identity(raw: &str) -> Option<String> {
    if is_placeholder(raw) {
        return None;
    }
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();
    if compact.is_empty() {
        None
    } else {
        Some(compact)
    }
}

/// Label embedded in a raw mapping key: `"Shareholder 1 - ACME LTD"` → `"ACME LTD"`.
pub fn label_from_key(key: &str) -> Option<String> {
    let tail = key
        .rsplit_once(" - ")
        .map(|(_, tail)| tail)
        .or_else(|| key.rsplit_once(':').map(|(_, tail)| tail))
        .unwrap_or(key);
    crate::normalize::clean_text(tail)
}

fn looks_like_person(map: &Map<String, Value>) -> bool {
    map.keys().any(|key| is_known_key(key))
}

/// Clean a block of people. Accepts a list of objects, a single object, or an
/// object keyed by label (`{"Director 1 - Jane": {...}}`).
pub fn clean_person_block(block: Option<&Value>, ctx: &CleaningContext) -> Vec<PersonRecord> {
    match block {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_object)
            .map(|raw| PersonRecord::from_raw(raw, None, ctx))
            .collect(),
        Some(Value::Object(map)) if looks_like_person(map) => {
            vec![PersonRecord::from_raw(map, None, ctx)]
        }
        Some(Value::Object(map)) => map
            .iter()
            .filter_map(|(key, value)| value.as_object().map(|raw| (key, raw)))
            .map(|(key, raw)| PersonRecord::from_raw(raw, label_from_key(key), ctx))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::context;
    use serde_json::json;

    #[test]
    fn test_person_cleaning_applies_normalizers() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({
            "first_name": " Jane ",
            "last_name": "Doe",
            "national_id": "19900515-11101-00001-23",
            "phone": "0712 345 678",
            "nationality": "",
            "occupation": "Engineer",
            "remarks": "N/A"
        });

        let person = PersonRecord::from_raw(raw.as_object().unwrap(), None, &ctx);

        assert_eq!(person.phone.as_deref(), Some("+255712345678"));
        let derived = person.derived.as_ref().unwrap();
        assert_eq!(derived.birth_date.unwrap().to_string(), "1990-05-15");
        assert_eq!(derived.region.as_deref(), Some("Dar es Salaam"));
        assert_eq!(person.nationality.as_deref(), Some("Tanzanian"));
        assert_eq!(person.full_name().as_deref(), Some("Jane Doe"));
        assert_eq!(person.extra.get("occupation"), Some(&json!("Engineer")));
        assert!(!person.extra.contains_key("remarks"));
    }

    #[test]
    fn test_phone_field_always_serialized() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({"name": "No Phone"});
        let person = PersonRecord::from_raw(raw.as_object().unwrap(), None, &ctx);

        let value = serde_json::to_value(&person).unwrap();
        assert_eq!(value.get("phone"), Some(&Value::Null));
        assert!(value.get("derived").is_none());
    }

    #[test]
    fn test_identity_key_precedence() {
        let mut person = PersonRecord {
            nida_number: Some("1990 0515".to_string()),
            passport_number: Some("AB123".to_string()),
            ..PersonRecord::default()
        };
        assert_eq!(person.identity_key().as_deref(), Some("19900515"));

        person.national_id = Some("  n/a ".to_string());
        assert_eq!(person.identity_key().as_deref(), Some("19900515"));

        person.nida_number = None;
        assert_eq!(person.identity_key().as_deref(), Some("AB123"));

        person.passport_number = Some("   ".to_string());
        assert_eq!(person.identity_key(), None);
    }

    #[test]
    fn test_keyed_block_uses_label() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let block = json!({
            "Shareholder 1 - ACME HOLDINGS LTD": {"registration_number": "C-0042", "natural_person": "No"},
            "Shareholder 2: John Doe": {"first_name": "John", "last_name": "Doe"}
        });

        let people = clean_person_block(Some(&block), &ctx);

        assert_eq!(people.len(), 2);
        let acme = people.iter().find(|p| p.registration_number.is_some()).unwrap();
        assert_eq!(acme.full_name().as_deref(), Some("ACME HOLDINGS LTD"));
        assert!(acme.is_non_natural());
        let john = people.iter().find(|p| p.first_name.is_some()).unwrap();
        assert_eq!(john.label.as_deref(), Some("John Doe"));
        assert!(!john.is_non_natural());
    }

    #[test]
    fn test_block_shapes() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);

        let list = json!([{"name": "A"}, "junk", {"name": "B"}]);
        assert_eq!(clean_person_block(Some(&list), &ctx).len(), 2);

        let single = json!({"name": "Solo", "phone": "0712345678"});
        assert_eq!(clean_person_block(Some(&single), &ctx).len(), 1);

        assert!(clean_person_block(None, &ctx).is_empty());
        assert!(clean_person_block(Some(&json!("text")), &ctx).is_empty());
    }
}
