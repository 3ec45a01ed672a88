//! Phone number normalization and validation.

use std::sync::OnceLock;

use regex::Regex;

use super::{Sheet, PHONE_COL};

fn mobile_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(03|05|07|08|09)\d{8}$").expect("static regex"))
}

/// Strip whitespace, require digits only, and restore the leading zero that
/// spreadsheets drop from numeric cells. Returns None unless the result has 10 digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() || !compact.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let phone = if compact.starts_with('0') {
        compact
    } else {
        format!("0{compact}")
    };
    (phone.len() == 10).then_some(phone)
}

/// True if `raw` normalizes to a 10-digit mobile number with a known prefix.
pub fn is_valid_phone(raw: &str) -> bool {
    normalize_phone(raw).is_some_and(|p| mobile_prefix().is_match(&p))
}

/// Pre-run count over non-empty phone cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhoneCount {
    pub valid: u64,
    pub invalid: u64,
}

pub fn count_phones(sheet: &Sheet) -> PhoneCount {
    let mut count = PhoneCount::default();
    for row in 0..sheet.len() {
        let raw = sheet.cell(row, PHONE_COL);
        if raw.trim().is_empty() {
            continue;
        }
        if is_valid_phone(raw) {
            count.valid += 1;
        } else {
            count.invalid += 1;
        }
    }
    count
}
