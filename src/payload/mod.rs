// SPDX-License-Identifier: PMPL-1.0-or-later

//! IPS payload text: `K:PR|V:01|C:1|R:...|N:...|I:RSD100,00|SF:289`.
//!
//! Building checks presence and shape of the fields locally so obviously
//! broken forms never reach the bank's API. The authoritative validation
//! stays with the API.

use crate::types::PaymentFields;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Canonical field order. Unknown codes follow, sorted.
pub const FIELD_ORDER: [&str; 10] = ["K", "V", "C", "R", "N", "I", "P", "SF", "S", "RO"];

/// Codes that must be present to build a payload.
pub const REQUIRED_FIELDS: [&str; 7] = ["K", "V", "C", "R", "N", "I", "SF"];

const DELIMITER: char = '|';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("field {code}: {reason}")]
    InvalidField { code: String, reason: String },

    #[error("malformed segment {0:?} (expected KEY:VALUE)")]
    MalformedSegment(String),

    #[error("field {0} appears more than once")]
    DuplicateField(String),

    #[error("payload ends with a delimiter")]
    TrailingDelimiter,

    #[error("payload contains characters not representable in {0}")]
    Unencodable(&'static str),
}

/// Character set selected by the `C` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Charset {
    /// `C:1`
    Utf8,
    /// `C:2`, legacy single-byte Central European set
    Windows1250,
}

impl Charset {
    pub fn from_field(value: &str) -> Option<Self> {
        match value.trim() {
            "1" => Some(Charset::Utf8),
            "2" => Some(Charset::Windows1250),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Windows1250 => "windows-1250",
        }
    }
}

/// Build payload text from form fields.
///
/// Empty values are dropped, account separators are stripped, line breaks
/// inside values become CRLF, and the result never ends with a delimiter.
/// With `C:2` the text must be representable in windows-1250.
pub fn build(fields: &PaymentFields) -> Result<String, PayloadError> {
    for code in REQUIRED_FIELDS {
        if present(fields, code).is_none() {
            return Err(PayloadError::MissingField(code));
        }
    }
    for (code, value) in fields {
        check_field(code, value.trim())?;
    }
    let charset = match present(fields, "C") {
        Some(value) => Charset::from_field(value)
            .ok_or_else(|| invalid("C", "expected 1 (UTF-8) or 2 (windows-1250)"))?,
        None => Charset::Utf8,
    };

    let mut ordered: Vec<&str> = FIELD_ORDER
        .iter()
        .copied()
        .filter(|code| fields.contains_key(*code))
        .collect();
    ordered.extend(
        fields
            .keys()
            .map(String::as_str)
            .filter(|code| !FIELD_ORDER.contains(code)),
    );

    let segments: Vec<String> = ordered
        .into_iter()
        .filter_map(|code| {
            present(fields, code).map(|value| {
                let value = if code == "R" {
                    normalize_account(value)
                } else {
                    normalize_line_breaks(value)
                };
                format!("{}:{}", code, value)
            })
        })
        .collect();
    let text = segments.join("|");
    encode(&text, charset)?;
    Ok(text)
}

/// Split payload text back into fields.
pub fn parse(text: &str) -> Result<PaymentFields, PayloadError> {
    let text = text.trim();
    if text.ends_with(DELIMITER) {
        return Err(PayloadError::TrailingDelimiter);
    }
    let mut fields = PaymentFields::new();
    for segment in text.split(DELIMITER) {
        let (code, value) = segment
            .split_once(':')
            .filter(|(code, _)| !code.trim().is_empty())
            .ok_or_else(|| PayloadError::MalformedSegment(segment.to_string()))?;
        let code = code.trim().to_string();
        if fields.contains_key(&code) {
            return Err(PayloadError::DuplicateField(code));
        }
        fields.insert(code, value.to_string());
    }
    Ok(fields)
}

/// Character set named by the `C` segment of payload text, UTF-8 when absent
/// or unknown.
pub fn charset_of(text: &str) -> Charset {
    text.split(DELIMITER)
        .find_map(|segment| segment.trim().strip_prefix("C:"))
        .and_then(Charset::from_field)
        .unwrap_or(Charset::Utf8)
}

/// Encode payload text in the character set its `C` field selects.
pub fn encode(text: &str, charset: Charset) -> Result<Vec<u8>, PayloadError> {
    match charset {
        Charset::Utf8 => Ok(text.as_bytes().to_vec()),
        Charset::Windows1250 => {
            let (bytes, _, had_errors) = encoding_rs::WINDOWS_1250.encode(text);
            if had_errors {
                Err(PayloadError::Unencodable(charset.label()))
            } else {
                Ok(bytes.into_owned())
            }
        }
    }
}

/// Turn every `\n`, `\r` or `\r\n` into `\r\n`.
pub fn normalize_line_breaks(value: &str) -> String {
    value.replace("\r\n", "\n").replace('\r', "\n").replace('\n', "\r\n")
}

/// Strip the separators people type into account numbers.
pub fn normalize_account(value: &str) -> String {
    value.chars().filter(|c| !matches!(c, '-' | ' ')).collect()
}

/// Trimmed value of `code`, if non-empty.
fn present<'a>(fields: &'a PaymentFields, code: &str) -> Option<&'a str> {
    fields
        .get(code)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
}

fn check_field(code: &str, value: &str) -> Result<(), PayloadError> {
    if code.is_empty() || code.contains([DELIMITER, ':']) {
        return Err(invalid(code, "invalid field code"));
    }
    if value.contains(DELIMITER) {
        return Err(invalid(code, "value must not contain '|'"));
    }
    if value.is_empty() {
        return Ok(());
    }
    match code {
        "R" if !account_re().is_match(&normalize_account(value)) => {
            Err(invalid(code, "account must have 18 digits"))
        }
        "I" if !amount_re().is_match(value) => {
            Err(invalid(code, "amount must look like RSD1234,56"))
        }
        "SF" if !purpose_re().is_match(value) => {
            Err(invalid(code, "purpose code must have 3 digits"))
        }
        _ => Ok(()),
    }
}

fn invalid(code: &str, reason: &str) -> PayloadError {
    PayloadError::InvalidField {
        code: code.to_string(),
        reason: reason.to_string(),
    }
}

fn account_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{18}$").unwrap())
}

fn amount_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^RSD\d+(,\d{1,2})?$").unwrap())
}

fn purpose_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{3}$").unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bill() -> PaymentFields {
        [
            ("K", "PR"),
            ("V", "01"),
            ("C", "1"),
            ("R", "845000000040484987"),
            ("N", "JP EPS BEOGRAD\nBALKANSKA 13"),
            ("I", "RSD3596,13"),
            ("SF", "189"),
            ("S", "UPLATA PO RAČUNU ZA EL. ENERGIJU"),
            ("RO", "97163220000111111111000"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn builds_in_canonical_order_with_crlf() {
        let text = build(&bill()).unwrap();
        assert_eq!(
            text,
            "K:PR|V:01|C:1|R:845000000040484987|N:JP EPS BEOGRAD\r\nBALKANSKA 13|\
             I:RSD3596,13|SF:189|S:UPLATA PO RAČUNU ZA EL. ENERGIJU|RO:97163220000111111111000"
        );
        assert!(!text.ends_with('|'));
    }

    #[test]
    fn empty_optional_fields_are_dropped() {
        let mut fields = bill();
        fields.insert("P".to_string(), "  ".to_string());
        fields.remove("RO");
        fields.insert("S".to_string(), String::new());
        let text = build(&fields).unwrap();
        assert!(text.ends_with("SF:189"));
        assert!(!text.contains("P:"));
    }

    #[test]
    fn unknown_codes_follow_known_ones() {
        let mut fields = bill();
        fields.insert("ZZ".to_string(), "x".to_string());
        fields.insert("AA".to_string(), "y".to_string());
        let text = build(&fields).unwrap();
        assert!(text.ends_with("|AA:y|ZZ:x"));
    }

    #[test]
    fn missing_required_field_is_reported() {
        let mut fields = bill();
        fields.remove("SF");
        assert_eq!(build(&fields), Err(PayloadError::MissingField("SF")));
    }

    #[test]
    fn field_shapes_are_checked() {
        let mut fields = bill();
        fields.insert("R".to_string(), "845-0000000404849-87".to_string());
        assert!(build(&fields).unwrap().contains("|R:845000000040484987|"));

        fields.insert("R".to_string(), "12345".to_string());
        assert!(matches!(build(&fields), Err(PayloadError::InvalidField { code, .. }) if code == "R"));

        let mut fields = bill();
        fields.insert("I".to_string(), "100.00".to_string());
        assert!(matches!(build(&fields), Err(PayloadError::InvalidField { code, .. }) if code == "I"));

        let mut fields = bill();
        fields.insert("S".to_string(), "a|b".to_string());
        assert!(matches!(build(&fields), Err(PayloadError::InvalidField { code, .. }) if code == "S"));

        let mut fields = bill();
        fields.insert("C".to_string(), "7".to_string());
        assert!(matches!(build(&fields), Err(PayloadError::InvalidField { code, .. }) if code == "C"));
    }

    #[test]
    fn parse_splits_on_first_colon() {
        let fields = parse("K:PR|V:01|S:Racun: mart").unwrap();
        assert_eq!(fields.get("S").map(String::as_str), Some("Racun: mart"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn parse_rejects_bad_text() {
        assert_eq!(parse("K:PR|"), Err(PayloadError::TrailingDelimiter));
        assert!(matches!(parse("K:PR|oops"), Err(PayloadError::MalformedSegment(_))));
        assert!(matches!(parse("K:PR|K:PT"), Err(PayloadError::DuplicateField(_))));
    }

    #[test]
    fn windows_1250_encodes_serbian_latin() {
        let bytes = encode("Šabac Čačak", Charset::Windows1250).unwrap();
        assert_eq!(bytes.len(), "Šabac Čačak".chars().count());
        assert_eq!(
            encode("Београд", Charset::Windows1250),
            Err(PayloadError::Unencodable("windows-1250"))
        );
        assert_eq!(encode("Београд", Charset::Utf8).unwrap(), "Београд".as_bytes());
    }

    #[test]
    fn windows_1250_payload_rejects_cyrillic() {
        let mut fields = bill();
        fields.insert("C".to_string(), "2".to_string());
        fields.insert("N".to_string(), "ЈП ЕПС Београд".to_string());
        fields.insert("S".to_string(), "UPLATA".to_string());
        assert_eq!(build(&fields), Err(PayloadError::Unencodable("windows-1250")));

        fields.insert("N".to_string(), "JP EPS Beograd, Čika Ljubina".to_string());
        let text = build(&fields).unwrap();
        assert_eq!(charset_of(&text), Charset::Windows1250);

        fields.insert("C".to_string(), "1".to_string());
        fields.insert("N".to_string(), "ЈП ЕПС Београд".to_string());
        let text = build(&fields).unwrap();
        assert_eq!(charset_of(&text), Charset::Utf8);
    }

    #[test]
    fn line_breaks_normalize_to_crlf() {
        assert_eq!(normalize_line_breaks("a\nb\r\nc\rd"), "a\r\nb\r\nc\r\nd");
    }
}
