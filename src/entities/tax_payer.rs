// 🧾 Tax-identifier records
//
// A TIN record is itself about a person (or entity): the record's own name and
// identifier fields form the `taxpayer`, and `associates` lists related people.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{clean_person_block, pick_text, pick_value, require_text, CleaningContext, PersonRecord};
use crate::error::RecordError;
use crate::normalize::normalize_status;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxPayer {
    pub id: String,
    pub tin: String,
    pub taxpayer_name: Option<String>,
    pub taxpayer_type: Option<String>,
    pub tax_office: Option<String>,
    pub registration_date: Option<String>,
    pub approval_status: String,
    pub taxpayer: PersonRecord,
    pub associates: Vec<PersonRecord>,
}

pub fn clean(
    record_id: &str,
    raw: &Map<String, Value>,
    ctx: &CleaningContext,
) -> Result<TaxPayer, RecordError> {
    let tin = require_text(record_id, raw, &["tin", "TIN", "tin_number"], "tin")?;

    let mut taxpayer = match pick_value(raw, &["taxpayer", "taxpayer_details"]) {
        Some(Value::Object(nested)) => PersonRecord::from_raw(nested, None, ctx),
        _ => PersonRecord::from_raw(raw, None, ctx),
    };
    // Record-level attributes are not person attributes.
    taxpayer.extra.clear();

    let taxpayer_name = pick_text(raw, &["taxpayer_name", "name"]).or_else(|| taxpayer.full_name());

    Ok(TaxPayer {
        id: record_id.to_string(),
        tin,
        taxpayer_name,
        taxpayer_type: pick_text(raw, &["taxpayer_type", "type"]),
        tax_office: pick_text(raw, &["tax_office", "region_office"]),
        registration_date: pick_text(raw, &["registration_date", "date_registered"]),
        approval_status: normalize_status(pick_text(raw, &["approval_status", "status"]).as_deref()),
        taxpayer,
        associates: clean_person_block(pick_value(raw, &["associates", "associated_persons"]), ctx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::context;
    use serde_json::json;

    #[test]
    fn test_clean_tax_payer_from_flat_record() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({
            "tin": "100-200-300",
            "first_name": "Baraka",
            "last_name": "Mushi",
            "national_id": "19780101-11101-00003-55",
            "phone": "0788 000 111",
            "tax_office": "Ilala",
            "status": "No results"
        });

        let tax = clean("tin-1", raw.as_object().unwrap(), &ctx).unwrap();

        assert_eq!(tax.tin, "100-200-300");
        assert_eq!(tax.taxpayer_name.as_deref(), Some("Baraka Mushi"));
        assert_eq!(tax.approval_status, "Unknown");
        assert_eq!(tax.taxpayer.phone.as_deref(), Some("+255788000111"));
        assert!(tax.taxpayer.extra.is_empty());
        assert!(tax.associates.is_empty());
    }

    #[test]
    fn test_missing_tin_is_error() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({"name": "No Tin"});
        assert!(clean("tin-2", raw.as_object().unwrap(), &ctx).is_err());
    }
}
