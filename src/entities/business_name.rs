// 🏪 Business-name filings - sole traders and partnerships

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{clean_person_block, pick_text, pick_value, require_text, CleaningContext, PersonRecord};
use crate::error::RecordError;
use crate::normalize::{normalize_phone, normalize_status};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BusinessName {
    pub id: String,
    pub business_name: String,
    pub registration_number: Option<String>,
    pub business_type: Option<String>,
    pub nature_of_business: Option<String>,
    pub registration_date: Option<String>,
    pub approval_status: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub owners: Vec<PersonRecord>,
    pub authorized_persons: Vec<PersonRecord>,
    pub bank_operators: Vec<PersonRecord>,
    pub applicants: Vec<PersonRecord>,
}

pub fn clean(
    record_id: &str,
    raw: &Map<String, Value>,
    ctx: &CleaningContext,
) -> Result<BusinessName, RecordError> {
    let business_name = require_text(
        record_id,
        raw,
        &["business_name", "businessName", "name"],
        "business_name",
    )?;

    Ok(BusinessName {
        id: record_id.to_string(),
        business_name,
        registration_number: pick_text(raw, &["registration_number", "registrationNumber"]),
        business_type: pick_text(raw, &["business_type", "type"]),
        nature_of_business: pick_text(raw, &["nature_of_business", "business_activity"]),
        registration_date: pick_text(raw, &["registration_date"]),
        approval_status: normalize_status(
            pick_text(raw, &["approval_status", "status"]).as_deref(),
        ),
        email: pick_text(raw, &["email"]).map(|e| e.to_lowercase()),
        phone: pick_text(raw, &["phone", "phone_number"])
            .as_deref()
            .and_then(normalize_phone),
        address: pick_text(raw, &["address", "physical_address"]),
        owners: clean_person_block(pick_value(raw, &["owners", "owner"]), ctx),
        authorized_persons: clean_person_block(
            pick_value(raw, &["authorized_persons", "authorised_persons"]),
            ctx,
        ),
        bank_operators: clean_person_block(pick_value(raw, &["bank_operators"]), ctx),
        applicants: clean_person_block(pick_value(raw, &["applicants", "applicant"]), ctx),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::tests::context;
    use serde_json::json;

    #[test]
    fn test_clean_business_name() {
        let (locations, policy, today) = context();
        let ctx = CleaningContext::new(&locations, &policy, today);
        let raw = json!({
            "business_name": "Mama Ntilie Foods",
            "registration_number": "BN-5521",
            "approval_status": "Approved",
            "owners": [{"first_name": "Asha", "last_name": "Juma", "nida_number": "19851120-11101-00002-11", "phone": "255 655 000 111"}],
            "authorised_persons": [{"name": "Ali", "passport_number": "TZ998"}],
            "applicant": {"name": "Asha Juma", "nida_number": "19851120-11101-00002-11"}
        });

        let business = clean("bn-1", raw.as_object().unwrap(), &ctx).unwrap();

        assert_eq!(business.registration_number.as_deref(), Some("BN-5521"));
        assert_eq!(business.approval_status, "Approved");
        assert_eq!(business.owners[0].phone.as_deref(), Some("+255655000111"));
        assert_eq!(business.owners[0].derived.as_ref().unwrap().age, Some(38));
        assert_eq!(business.authorized_persons.len(), 1);
        assert_eq!(business.applicants.len(), 1);
        assert!(business.bank_operators.is_empty());
    }
}
