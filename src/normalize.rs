// 🧹 Field Normalizers - pure functions shared by every entity cleaner
//
// Phone numbers, identifier-derived fields (birth date, age, location),
// booleans, nationality and free text.

use chrono::{Datelike, NaiveDate};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::locations::LocationTable;

/// Country calling code used for canonical phone numbers.
pub const COUNTRY_CODE: &str = "255";

/// Digits in a national subscriber number (without trunk prefix).
const NATIONAL_DIGITS: usize = 9;

/// Placeholder strings that mean "no value" in the registry dumps.
const PLACEHOLDERS: &[&str] = &[
    "-", "--", "n/a", "na", "none", "null", "nil", "unknown", "not provided", "not available",
];

/// Approval-status values meaning "the registry had nothing to say".
const NO_RESULT_SENTINELS: &[&str] = &[
    "no result",
    "no results",
    "no result found",
    "no results found",
    "no record found",
    "-",
];

pub const UNKNOWN_STATUS: &str = "Unknown";

lazy_static! {
    static ref MARKUP: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

// ============================================================================
// TEXT
// ============================================================================

pub fn is_placeholder(value: &str) -> bool {
    let lower = value.trim().to_lowercase();
    lower.is_empty() || PLACEHOLDERS.contains(&lower.as_str())
}

/// Trim, collapse inner whitespace, and map placeholders to `None`.
pub fn clean_text(value: &str) -> Option<String> {
    let collapsed = WHITESPACE.replace_all(value.trim(), " ");
    if is_placeholder(&collapsed) {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Render a scalar JSON value as cleaned text. Registry dumps store numbers
/// (phones, counts, ids) as either strings or numbers.
pub fn value_as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => clean_text(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Remove embedded markup tags and decode the handful of entities the
/// registry HTML uses.
pub fn strip_markup(value: &str) -> String {
    let without_tags = MARKUP.replace_all(value, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Normalize an approval status, mapping "no result" sentinels to `Unknown`.
pub fn normalize_status(value: Option<&str>) -> String {
    match value.map(str::trim) {
        None => UNKNOWN_STATUS.to_string(),
        Some(s) if s.is_empty() => UNKNOWN_STATUS.to_string(),
        Some(s) if NO_RESULT_SENTINELS.contains(&s.to_lowercase().as_str()) => {
            UNKNOWN_STATUS.to_string()
        }
        Some(s) => s.to_string(),
    }
}

// ============================================================================
// BOOLEANS
// ============================================================================

pub fn normalize_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Some(false),
            Some(1) => Some(true),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "t" | "yes" | "y" | "1" => Some(true),
            "false" | "f" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ============================================================================
// PHONE NUMBERS
// ============================================================================

/// Canonicalize a phone number to `+255XXXXXXXXX`.
///
/// Cells listing several numbers (`a / b`, `a, b`) yield the first valid one.
/// Returns `None` for anything that is not a recognizable number.
pub fn normalize_phone(raw: &str) -> Option<String> {
    raw.split(|c| c == '/' || c == ',' || c == ';')
        .find_map(normalize_single_phone)
}

fn normalize_single_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let has_plus = trimmed.starts_with('+');
    let mut digits = String::with_capacity(trimmed.len());
    for (i, c) in trimmed.chars().enumerate() {
        match c {
            '0'..='9' => digits.push(c),
            '+' if i == 0 => {}
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return None,
        }
    }

    let national = match digits.len() {
        12 if digits.starts_with(COUNTRY_CODE) => &digits[3..],
        _ if has_plus => return None,
        14 if digits.starts_with("00255") => &digits[5..],
        10 if digits.starts_with('0') => &digits[1..],
        NATIONAL_DIGITS => digits.as_str(),
        _ => return None,
    };

    if national.len() != NATIONAL_DIGITS || national.starts_with('0') {
        return None;
    }

    Some(format!("+{}{}", COUNTRY_CODE, national))
}

// ============================================================================
// IDENTIFIER-DERIVED FIELDS
// ============================================================================

/// Fields decoded from a national identifier.
///
/// Each field is absent when it could not be decoded; a date is never partial.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedIdentity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub birth_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub age: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ward: Option<String>,
}

impl DerivedIdentity {
    pub fn has_location(&self) -> bool {
        self.region.is_some()
    }
}

/// Decode birth date, age and location from a national identifier.
///
/// Layout (separators ignored): `YYYYMMDD` then a 5-character location code.
pub fn derive_identity(
    identifier: &str,
    locations: &LocationTable,
    today: NaiveDate,
) -> DerivedIdentity {
    let compact: String = identifier
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();

    let mut derived = DerivedIdentity::default();

    if compact.len() >= 13 {
        if let Some(location) = locations.lookup(&compact[8..13]) {
            derived.region = Some(location.region.clone());
            derived.district = Some(location.district.clone());
            derived.ward = Some(location.ward.clone());
        }
    }

    if compact.len() >= 8 {
        if let Some(birth_date) = parse_birth_date(&compact[..8], today) {
            derived.birth_date = Some(birth_date);
            derived.age = Some(age_on(birth_date, today));
        }
    }

    derived
}

fn parse_birth_date(yyyymmdd: &str, today: NaiveDate) -> Option<NaiveDate> {
    if !yyyymmdd.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let year: i32 = yyyymmdd[0..4].parse().ok()?;
    let month: u32 = yyyymmdd[4..6].parse().ok()?;
    let day: u32 = yyyymmdd[6..8].parse().ok()?;

    if !(1900..=today.year()).contains(&year) || !(1..=12).contains(&month) || !(1..=31).contains(&day)
    {
        return None;
    }

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    if date > today {
        return None;
    }
    Some(date)
}

/// Whole years elapsed between `birth_date` and `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> u32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age.max(0) as u32
}

// ============================================================================
// NATIONALITY
// ============================================================================

/// Whether a successfully decoded identifier location implies nationality.
///
/// Holding an identifier issued by a country is not the same as being its
/// national, so this stays switchable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationalityPolicy {
    #[serde(default = "default_infer")]
    pub infer_from_identifier: bool,
    #[serde(default = "default_label")]
    pub default_label: String,
}

fn default_infer() -> bool {
    true
}

fn default_label() -> String {
    "Tanzanian".to_string()
}

impl Default for NationalityPolicy {
    fn default() -> Self {
        NationalityPolicy {
            infer_from_identifier: default_infer(),
            default_label: default_label(),
        }
    }
}

pub fn clean_nationality(
    raw: Option<&str>,
    derived: Option<&DerivedIdentity>,
    policy: &NationalityPolicy,
) -> Option<String> {
    if let Some(value) = raw.and_then(clean_text) {
        return Some(value);
    }

    match derived {
        Some(d) if policy.infer_from_identifier && d.has_location() => {
            Some(policy.default_label.clone())
        }
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================
