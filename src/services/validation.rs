use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::utils::{ClinicError, Result};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());
static CRM_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^CRM/[A-Z]{2}\s\d{6,8}$").unwrap());
static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\(\d{2}\)\s\d{4,5}-?\d{4}$").unwrap());

/// Fail with the list of fields that are absent, null or blank
pub fn require_fields(data: &Value, fields: &[&str]) -> Result<()> {
    let object = data
        .as_object()
        .ok_or_else(|| ClinicError::Validation("Expected a JSON object".into()))?;

    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|field| match object.get(*field) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ClinicError::Validation(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

pub fn is_valid_crm(crm: &str) -> bool {
    CRM_RE.is_match(crm)
}

/// `(00) 00000-0000` or `(00) 0000-0000`, dash optional
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE_RE.is_match(phone)
}

pub fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Brazilian CPF with both check digits verified; punctuation is ignored
pub fn is_valid_cpf(cpf: &str) -> bool {
    let digits: Vec<u32> = digits_only(cpf)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();
    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let check_digit = |len: usize| -> u32 {
        let sum: u32 = digits[..len]
            .iter()
            .enumerate()
            .map(|(i, d)| d * (len as u32 + 1 - i as u32))
            .sum();
        let remainder = 11 - (sum % 11);
        if remainder >= 10 {
            0
        } else {
            remainder
        }
    };

    check_digit(9) == digits[9] && check_digit(10) == digits[10]
}

/// `12345678909` → `123.456.789-09`; anything else is returned unchanged
pub fn format_cpf(cpf: &str) -> String {
    let digits = digits_only(cpf);
    if digits.len() != 11 {
        return cpf.to_string();
    }
    format!(
        "{}.{}.{}-{}",
        &digits[..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..]
    )
}

/// Ten or eleven digits → `(00) 0000-0000` / `(00) 00000-0000`
pub fn format_phone(phone: &str) -> String {
    let digits = digits_only(phone);
    match digits.len() {
        11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
        10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        _ => phone.to_string(),
    }
}

/// Validate `field` with `check` when it is present as a non-empty string
pub(crate) fn check_optional(
    data: &Value,
    field: &str,
    check: fn(&str) -> bool,
    message: &str,
) -> Result<()> {
    match data.get(field).and_then(Value::as_str) {
        Some(value) if !value.is_empty() && !check(value) => {
            Err(ClinicError::Validation(message.to_string()))
        },
        _ => Ok(()),
    }
}

pub(crate) fn require_id(id: &str, what: &str) -> Result<()> {
    if id.trim().is_empty() {
        Err(ClinicError::Validation(format!("{what} id not provided")))
    } else {
        Ok(())
    }
}
