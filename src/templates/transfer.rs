// SPDX-License-Identifier: PMPL-1.0-or-later

//! Template export and import.
//!
//! Import is lenient per entry: once the document parses, every entry is
//! validated on its own and a bad entry never aborts the rest. Duplicates are
//! detected on `(name, endpoint)`, not on `id`.

use super::manager::{normalize_method, TemplateManager};
use super::{TemplateError, TemplateResult, Unsaved};
use crate::types::{
    Endpoint, ExportDocument, ImportOptions, ImportSummary, PaymentFields, Template,
    DEFAULT_METHOD,
};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// Schema tag written into exports. Not checked on import.
pub const EXPORT_VERSION: &str = "1.0";

/// An import entry that passed shape validation.
struct ImportEntry {
    id: Option<String>,
    name: String,
    description: String,
    data: PaymentFields,
    endpoint: Endpoint,
    method: String,
    created_at: Option<DateTime<Utc>>,
    usage_count: u64,
    last_used: Option<DateTime<Utc>>,
}

impl TemplateManager {
    pub fn export(&self) -> ExportDocument {
        ExportDocument {
            version: EXPORT_VERSION.to_string(),
            export_date: Utc::now(),
            templates: self.templates.clone(),
        }
    }

    pub fn export_to_file(&self, path: &Path) -> TemplateResult<()> {
        let json = serde_json::to_string_pretty(&self.export())?;
        fs::write(path, json).map_err(|source| TemplateError::File {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(path = %path.display(), count = self.templates.len(), "templates exported");
        Ok(())
    }

    /// Import templates from an export document.
    ///
    /// Fails as a whole only if `payload` is not JSON or has no `templates`
    /// list. Malformed entries are counted as skipped and described in
    /// `errors`.
    pub fn import(&mut self, payload: &str, options: ImportOptions) -> TemplateResult<ImportSummary> {
        let document: Value = serde_json::from_str(payload)?;
        let entries = document
            .get("templates")
            .and_then(Value::as_array)
            .ok_or_else(|| TemplateError::InvalidImport("\"templates\" is not a list".to_string()))?;

        let mut summary = ImportSummary::default();
        for (index, raw) in entries.iter().enumerate() {
            let entry = match validate_entry(raw) {
                Ok(entry) => entry,
                Err(reason) => {
                    summary.skipped += 1;
                    summary.errors.push(format!("entry {}: {}", index + 1, reason));
                    continue;
                }
            };

            let existing = self
                .templates
                .iter_mut()
                .find(|t| t.name == entry.name && t.endpoint == entry.endpoint);
            match existing {
                Some(template) if options.overwrite => {
                    template.description = entry.description;
                    template.data = entry.data;
                    template.method = entry.method;
                    template.updated_at = Utc::now();
                    summary.imported += 1;
                }
                Some(_) => summary.skipped += 1,
                None => {
                    let template = self.materialize(entry)?;
                    self.templates.push(template);
                    summary.imported += 1;
                }
            }
        }

        tracing::info!(
            imported = summary.imported,
            skipped = summary.skipped,
            errors = summary.errors.len(),
            overwrite = options.overwrite,
            "templates imported"
        );
        if summary.imported > 0 {
            if let Err(err) = self.persist() {
                return Err(err.with_unsaved(Unsaved::Imported(summary)));
            }
        }
        Ok(summary)
    }

    /// Read and import a user-supplied `.json` file.
    pub fn import_file(&mut self, path: &Path, options: ImportOptions) -> TemplateResult<ImportSummary> {
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
        if !is_json {
            return Err(TemplateError::NotJson(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| TemplateError::File {
            path: path.to_path_buf(),
            source,
        })?;
        self.import(&content, options)
    }

    /// Turn a validated entry into a stored template, keeping its id and
    /// usage history when the id is free.
    fn materialize(&self, entry: ImportEntry) -> TemplateResult<Template> {
        let now = Utc::now();
        let id = match entry.id {
            Some(id) if !self.templates.iter().any(|t| t.id == id) => id,
            _ => self.generate_id(now)?,
        };
        Ok(Template {
            id,
            name: entry.name,
            description: entry.description,
            data: entry.data,
            endpoint: entry.endpoint,
            method: entry.method,
            created_at: entry.created_at.unwrap_or(now),
            updated_at: now,
            usage_count: entry.usage_count,
            last_used: entry.last_used,
        })
    }
}

fn validate_entry(raw: &Value) -> Result<ImportEntry, String> {
    let obj = raw.as_object().ok_or("not an object")?;

    let name = obj
        .get("name")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or("missing or empty \"name\"")?
        .to_string();

    let endpoint_raw = obj
        .get("endpoint")
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{:?} has no \"endpoint\" string", name))?;
    let endpoint = Endpoint::from_path(endpoint_raw)
        .ok_or_else(|| format!("{:?} has unknown endpoint {:?}", name, endpoint_raw))?;

    let data = match obj.get("data") {
        None | Some(Value::Null) => return Err(format!("{:?} has no \"data\"", name)),
        Some(Value::Object(map)) => data_fields(map).map_err(|e| format!("{:?}: {}", name, e))?,
        Some(_) => return Err(format!("{:?} has non-object \"data\"", name)),
    };

    let description = obj
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let method = obj
        .get("method")
        .and_then(Value::as_str)
        .map(normalize_method)
        .unwrap_or_else(|| DEFAULT_METHOD.to_string());

    Ok(ImportEntry {
        id: obj
            .get("id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string),
        name,
        description,
        data,
        endpoint,
        method,
        created_at: timestamp(obj.get("createdAt")),
        usage_count: obj.get("usageCount").and_then(Value::as_u64).unwrap_or(0),
        last_used: timestamp(obj.get("lastUsed")),
    })
}

/// Field values are strings; numbers and booleans written by hand-edited
/// files are accepted in their JSON text form.
fn data_fields(map: &Map<String, Value>) -> Result<PaymentFields, String> {
    map.iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            Value::Number(n) => Ok((key.clone(), n.to_string())),
            Value::Bool(b) => Ok((key.clone(), b.to_string())),
            _ => Err(format!("field {:?} is not a scalar", key)),
        })
        .collect()
}

fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn manager() -> TemplateManager {
        TemplateManager::load(Arc::new(MemoryStore::new())).unwrap()
    }

    fn data(pairs: &[(&str, &str)]) -> PaymentFields {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn export_wraps_collection_with_version() {
        let mut mgr = manager();
        mgr.add("A", "", data(&[("K", "PR")]), Endpoint::Gen, "POST")
            .unwrap();
        let doc = mgr.export();
        assert_eq!(doc.version, EXPORT_VERSION);
        assert_eq!(doc.templates, mgr.list());

        let value = serde_json::to_value(&doc).unwrap();
        assert!(value.get("exportDate").is_some());
        assert!(value["templates"].is_array());
    }

    #[test]
    fn export_then_import_into_empty_store_reproduces_collection() {
        let mut source = manager();
        let a = source
            .add("Electric Bill", "EPS", data(&[("K", "PR"), ("N", "JP EPS BEOGRAD")]), Endpoint::Gen, "POST")
            .unwrap();
        source
            .add("Check", "", data(&[("K", "PR")]), Endpoint::Validate, "post")
            .unwrap();
        source.increment_usage(&a.id).unwrap();
        let payload = serde_json::to_string(&source.export()).unwrap();

        let mut target = manager();
        let summary = target.import(&payload, ImportOptions::default()).unwrap();
        assert_eq!(summary, ImportSummary { imported: 2, skipped: 0, errors: vec![] });

        let original = source.list();
        let imported = target.list();
        assert_eq!(imported.len(), original.len());
        for (o, i) in original.iter().zip(imported.iter()) {
            assert_eq!(o.name, i.name);
            assert_eq!(o.description, i.description);
            assert_eq!(o.data, i.data);
            assert_eq!(o.endpoint, i.endpoint);
            assert_eq!(o.method, i.method);
            assert_eq!(o.usage_count, i.usage_count);
            assert_eq!(o.id, i.id);
        }
    }

    #[test]
    fn reimport_without_overwrite_skips_duplicates() {
        let mut mgr = manager();
        mgr.add("Rent", "", data(&[("I", "RSD1,00")]), Endpoint::Generate, "POST")
            .unwrap();
        let payload = serde_json::to_string(&mgr.export()).unwrap();

        let summary = mgr.import(&payload, ImportOptions::default()).unwrap();
        assert_eq!(summary.imported, 0);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors.is_empty());
        assert_eq!(mgr.len(), 1);
    }

    #[test]
    fn overwrite_merges_into_existing_record_by_name_and_endpoint() {
        let mut mgr = manager();
        let original = mgr
            .add("Rent", "old", data(&[("I", "RSD1,00")]), Endpoint::Generate, "POST")
            .unwrap();

        let payload = json!({
            "version": "1.0",
            "templates": [{
                "id": "some-other-id",
                "name": "Rent",
                "endpoint": "/generate",
                "description": "new",
                "data": {"I": "RSD2,00"},
                "method": "put"
            }]
        })
        .to_string();

        let summary = mgr.import(&payload, ImportOptions { overwrite: true }).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(mgr.len(), 1);

        let merged = mgr.get(&original.id).expect("original id kept");
        assert_eq!(merged.description, "new");
        assert_eq!(merged.data, data(&[("I", "RSD2,00")]));
        assert_eq!(merged.method, "PUT");
        assert_eq!(merged.created_at, original.created_at);
    }

    #[test]
    fn one_valid_and_one_malformed_entry() {
        let mut mgr = manager();
        let payload = json!({
            "templates": [
                {"name": "Good", "endpoint": "/gen", "data": {"K": "PR"}},
                {"name": "Bad", "endpoint": "/gen"}
            ]
        })
        .to_string();

        let summary = mgr.import(&payload, ImportOptions::default()).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.errors.len(), 1);
        assert!(summary.errors[0].contains("entry 2"));
        assert!(summary.errors[0].contains("data"));
    }

    #[test]
    fn failed_save_still_reports_the_summary() {
        let mut mgr = TemplateManager::load(Arc::new(MemoryStore::with_quota(10))).unwrap();
        let payload = json!({
            "templates": [
                {"name": "Good", "endpoint": "/gen", "data": {"K": "PR"}},
                {"name": "Bad", "endpoint": "/gen"}
            ]
        })
        .to_string();

        let err = mgr.import(&payload, ImportOptions::default()).unwrap_err();
        let TemplateError::Persist { unsaved, .. } = err else {
            panic!("expected a persistence failure, got {:?}", err);
        };
        let Unsaved::Imported(summary) = unsaved else {
            panic!("expected the import summary, got {:?}", unsaved);
        };
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 1);
        assert!(summary.errors[0].contains("entry 2"));
        assert_eq!(mgr.len(), 1);
        assert!(mgr.is_dirty());
    }

    #[test]
    fn malformed_entries_are_described() {
        let mut mgr = manager();
        let payload = json!({
            "templates": [
                42,
                {"endpoint": "/gen", "data": {}},
                {"name": "No endpoint", "data": {}},
                {"name": "Odd endpoint", "endpoint": "/qr", "data": {}},
                {"name": "Nested", "endpoint": "/gen", "data": {"K": {"x": 1}}},
                {"name": "Numbers", "endpoint": "gen", "data": {"I": 100}}
            ]
        })
        .to_string();

        let summary = mgr.import(&payload, ImportOptions::default()).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(summary.skipped, 5);
        assert_eq!(summary.errors.len(), 5);
        assert!(summary.errors[0].contains("not an object"));
        assert!(summary.errors[1].contains("name"));
        assert!(summary.errors[2].contains("endpoint"));
        assert!(summary.errors[3].contains("unknown endpoint"));
        assert!(summary.errors[4].contains("not a scalar"));

        let numbers = &mgr.list()[0];
        assert_eq!(numbers.data.get("I").map(String::as_str), Some("100"));
        assert_eq!(numbers.method, "POST");
    }

    #[test]
    fn unparseable_payload_aborts() {
        let mut mgr = manager();
        assert!(matches!(
            mgr.import("{oops", ImportOptions::default()),
            Err(TemplateError::Json(_))
        ));
        assert!(matches!(
            mgr.import(r#"{"templates": {}}"#, ImportOptions::default()),
            Err(TemplateError::InvalidImport(_))
        ));
        assert!(matches!(
            mgr.import("[]", ImportOptions::default()),
            Err(TemplateError::InvalidImport(_))
        ));
    }

    #[test]
    fn import_file_requires_json_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("templates.txt");
        fs::write(&path, r#"{"templates": []}"#).unwrap();

        let mut mgr = manager();
        assert!(matches!(
            mgr.import_file(&path, ImportOptions::default()),
            Err(TemplateError::NotJson(_))
        ));
    }

    #[test]
    fn export_to_file_then_import_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("backup.JSON");

        let mut source = manager();
        source
            .add("Phone", "", data(&[("K", "PR")]), Endpoint::Upload, "POST")
            .unwrap();
        source.export_to_file(&path).unwrap();

        let mut target = manager();
        let summary = target.import_file(&path, ImportOptions::default()).unwrap();
        assert_eq!(summary.imported, 1);
        assert_eq!(target.list()[0].endpoint, Endpoint::Upload);
    }
}
