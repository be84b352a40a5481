// SPDX-License-Identifier: PMPL-1.0-or-later

//! JSON bodies returned by the NBS QR API.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `s` block present in every JSON response. `code == 0` means success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiStatus {
    pub code: i64,
    #[serde(default)]
    pub desc: String,
}

impl ApiStatus {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Response of `/generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub s: ApiStatus,
    /// Payload text as the service normalized it
    #[serde(default)]
    pub t: Option<String>,
    /// Parsed fields echoed back
    #[serde(default)]
    pub n: Option<Value>,
    /// Base64 PNG
    #[serde(default)]
    pub i: Option<String>,
}

impl GenerateResponse {
    /// Decoded PNG bytes, if the response carried an image.
    pub fn image(&self) -> Result<Option<Vec<u8>>, base64::DecodeError> {
        self.i
            .as_deref()
            .map(|encoded| {
                // Some gateways prefix a data URL.
                let raw = encoded
                    .split_once("base64,")
                    .map(|(_, data)| data)
                    .unwrap_or(encoded);
                STANDARD.decode(raw.trim())
            })
            .transpose()
    }
}

/// Response of `/validate` and `/upload`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub s: ApiStatus,
    #[serde(default)]
    pub t: Option<String>,
    #[serde(default)]
    pub n: Option<Value>,
    /// Field-level problems reported by the service
    #[serde(default)]
    pub e: Option<Value>,
}

impl ValidationResponse {
    pub fn is_valid(&self) -> bool {
        self.s.is_ok()
    }

    /// Flatten `e` into readable lines, whatever shape the service used.
    pub fn problems(&self) -> Vec<String> {
        match &self.e {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => vec![s.clone()],
            Some(Value::Array(items)) => items.iter().map(value_text).collect(),
            Some(Value::Object(map)) => map
                .iter()
                .map(|(field, reason)| format!("{}: {}", field, value_text(reason)))
                .collect(),
            Some(other) => vec![other.to_string()],
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generate_response_decodes_image() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "s": {"code": 0, "desc": "OK"},
            "t": "K:PR|V:01",
            "i": "iVBORw0KGgo="
        }))
        .unwrap();
        assert!(response.s.is_ok());
        let png = response.image().unwrap().unwrap();
        assert_eq!(&png[1..4], b"PNG");
    }

    #[test]
    fn data_url_prefix_is_ignored() {
        let response = GenerateResponse {
            s: ApiStatus { code: 0, desc: String::new() },
            t: None,
            n: None,
            i: Some("data:image/png;base64,iVBORw0KGgo=".to_string()),
        };
        assert_eq!(&response.image().unwrap().unwrap()[1..4], b"PNG");
    }

    #[test]
    fn validation_problems_flatten() {
        let response: ValidationResponse = serde_json::from_value(json!({
            "s": {"code": 1, "desc": "Validation error"},
            "e": {"R": "Invalid account", "I": ["bad", "amount"]}
        }))
        .unwrap();
        assert!(!response.is_valid());
        assert_eq!(
            response.problems(),
            vec!["I: [\"bad\",\"amount\"]".to_string(), "R: Invalid account".to_string()]
        );
    }
}
