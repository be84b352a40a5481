// SPDX-License-Identifier: PMPL-1.0-or-later

//! Core type definitions for nbs-qr
//!
//! The template record and the shapes that travel with it: endpoint
//! identifiers, partial updates, import/export documents and statistics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Payment form fields keyed by IPS field code.
///
/// Known codes: `K` payment type, `V` version, `C` character set, `R`
/// account, `N` payee, `I` amount, `P` payer, `SF` purpose code, `S`
/// description, `RO` reference. Unknown codes are carried through untouched.
pub type PaymentFields = BTreeMap<String, String>;

/// Default HTTP verb recorded on new templates.
pub const DEFAULT_METHOD: &str = "POST";

/// Logical operation of the NBS QR API a template is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Endpoint {
    /// Structured fields in, PNG out
    #[serde(rename = "/gen", alias = "gen")]
    Gen,
    /// Payload text in, JSON with embedded image out
    #[serde(rename = "/generate", alias = "generate")]
    Generate,
    #[serde(rename = "/validate", alias = "validate")]
    Validate,
    /// Image in, validation JSON out
    #[serde(rename = "/upload", alias = "upload")]
    Upload,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Gen => "/gen",
            Endpoint::Generate => "/generate",
            Endpoint::Validate => "/validate",
            Endpoint::Upload => "/upload",
        }
    }

    /// Parse a path or bare name (`"/gen"`, `"gen"`, case-insensitive).
    pub fn from_path(value: &str) -> Option<Self> {
        let trimmed = value.trim().trim_start_matches('/');
        match trimmed.to_ascii_lowercase().as_str() {
            "gen" => Some(Endpoint::Gen),
            "generate" => Some(Endpoint::Generate),
            "validate" => Some(Endpoint::Validate),
            "upload" => Some(Endpoint::Upload),
            _ => None,
        }
    }

    pub fn all() -> &'static [Endpoint] {
        &[
            Endpoint::Gen,
            Endpoint::Generate,
            Endpoint::Validate,
            Endpoint::Upload,
        ]
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// A named, reusable payment form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub data: PaymentFields,
    pub endpoint: Endpoint,
    #[serde(default = "default_method")]
    pub method: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u64,
    /// Older stores wrote an empty string instead of null.
    #[serde(default, deserialize_with = "deserialize_last_used")]
    pub last_used: Option<DateTime<Utc>>,
}

fn default_method() -> String {
    DEFAULT_METHOD.to_string()
}

fn deserialize_last_used<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => DateTime::parse_from_rfc3339(value)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom),
    }
}

/// Partial field set applied by `TemplateManager::update`.
///
/// `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PaymentFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl TemplateUpdate {
    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.data.is_none()
            && self.endpoint.is_none()
            && self.method.is_none()
    }
}

/// Portable document produced by export and consumed by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub version: String,
    pub export_date: DateTime<Utc>,
    pub templates: Vec<Template>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
    /// Replace description/data/method of `(name, endpoint)` duplicates
    /// instead of skipping them.
    pub overwrite: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateStats {
    pub total: usize,
    #[serde(rename = "perEndpointCounts")]
    pub per_endpoint: BTreeMap<Endpoint, usize>,
    pub total_usage: u64,
    pub average_usage: f64,
}
