// 🏢 Company filings - corporate registry records
//
// A filing carries the company's own fields, four person blocks, and an
// embedded HTML share register that assigns a class and count per shareholder.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::{
    clean_person_block, pick_amount, pick_text, pick_value, require_text, CleaningContext,
    PersonRecord,
};
use crate::error::RecordError;
use crate::normalize::{normalize_phone, normalize_status};
use crate::share_table::{parse_share_table, ShareCell};

pub(crate) const SHARE_TABLE: &[&str] = &["share_table", "shares_table", "shareholding_table"];
pub(crate) const SHAREHOLDERS: &[&str] = &["shareholders", "shareholder_details"];
pub(crate) const COMPANY_NAME: &[&str] = &["company_name", "companyName", "name"];
pub(crate) const INCORPORATION_NUMBER: &[&str] =
    &["incorporation_number", "incorporationNumber", "certificate_number"];
pub(crate) const AUTHORISED_SHARE: &[&str] =
    &["authorised_share_capital", "authorized_share_capital", "authorised_share"];
pub(crate) const NUMBER_OF_SHARES: &[&str] = &["number_of_shares", "numberOfShares", "total_shares"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub id: String,
    pub company_name: String,
    pub incorporation_number: Option<String>,
    pub company_type: Option<String>,
    pub registration_date: Option<String>,
    pub approval_status: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub authorised_share_capital: f64,
    pub number_of_shares: i64,
    pub directors: Vec<PersonRecord>,
    pub shareholders: Vec<PersonRecord>,
    pub applicants: Vec<PersonRecord>,
    pub secretaries: Vec<PersonRecord>,
}

impl Company {
    /// Monetary value of a holding: count × (authorised capital / shares issued).
    pub fn share_value(&self, shares_count: i64) -> f64 {
        share_value(shares_count, self.authorised_share_capital, self.number_of_shares)
    }
}

pub fn share_value(shares_count: i64, authorised_share: f64, number_of_shares: i64) -> f64 {
    if number_of_shares > 0 {
        shares_count as f64 * (authorised_share / number_of_shares as f64)
    } else {
        0.0
    }
}

pub fn clean(
    record_id: &str,
    raw: &Map<String, Value>,
    ctx: &CleaningContext,
) -> Result<Company, RecordError> {
    let company_name = require_text(record_id, raw, COMPANY_NAME, "company_name")?;

    let mut shareholders = clean_person_block(pick_value(raw, SHAREHOLDERS), ctx);
    if let Some(table) = pick_text(raw, SHARE_TABLE) {
        let holdings = parse_share_table(&table);
        attach_holdings(&mut shareholders, &holdings);
    }

    Ok(Company {
        id: record_id.to_string(),
        company_name,
        incorporation_number: pick_text(raw, INCORPORATION_NUMBER),
        company_type: pick_text(raw, &["company_type", "companyType", "type"]),
        registration_date: pick_text(raw, &["registration_date", "incorporation_date"]),
        approval_status: normalize_status(
            pick_text(raw, &["approval_status", "status"]).as_deref(),
        ),
        email: pick_text(raw, &["email"]).map(|e| e.to_lowercase()),
        phone: pick_text(raw, &["phone", "phone_number"])
            .as_deref()
            .and_then(normalize_phone),
        address: pick_text(raw, &["address", "physical_address"]),
        authorised_share_capital: pick_amount(raw, AUTHORISED_SHARE).unwrap_or(0.0),
        number_of_shares: pick_amount(raw, NUMBER_OF_SHARES)
            .map(|n| n as i64)
            .unwrap_or(0),
        directors: clean_person_block(pick_value(raw, &["directors"]), ctx),
        shareholders,
        applicants: clean_person_block(pick_value(raw, &["applicants", "applicant"]), ctx),
        secretaries: clean_person_block(pick_value(raw, &["secretaries", "secretary"]), ctx),
    })
}

/// Look up a shareholder's row in the parsed share register, by identity key
/// first and by name second.
pub(crate) fn find_holding<'h>(
    person: &PersonRecord,
    holdings: &'h BTreeMap<String, ShareCell>,
) -> Option<&'h ShareCell> {
    let by_identity = person
        .identity_key()
        .or_else(|| {
            person
                .registration_number
                .as_deref()
                .and_then(super::normalize_identity)
        })
        .and_then(|key| {
            holdings
                .iter()
                .find(|(identity, _)| super::normalize_identity(identity).as_deref() == Some(key.as_str()))
                .map(|(_, cell)| cell)
        });

    by_identity.or_else(|| {
        let name = person.full_name()?.to_uppercase();
        holdings
            .iter()
            .find(|(identity, _)| identity.to_uppercase() == name)
            .map(|(_, cell)| cell)
    })
}

fn attach_holdings(shareholders: &mut [PersonRecord], holdings: &BTreeMap<String, ShareCell>) {
    if holdings.is_empty() {
        return;
    }
    for shareholder in shareholders.iter_mut() {
        let cell = find_holding(shareholder, holdings);
        shareholder.shares_class = cell.and_then(|c| c.shares_class.clone());
        shareholder.shares_count = Some(cell.map(|c| c.shares_count).unwrap_or(0));
    }
}
