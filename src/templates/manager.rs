// SPDX-License-Identifier: PMPL-1.0-or-later

//! CRUD, search and usage tracking over the persisted template collection.

use super::{TemplateError, TemplateResult, Unsaved};
use crate::storage::{KeyValueStore, StorageError, TEMPLATES_KEY};
use crate::types::{Endpoint, PaymentFields, Template, TemplateStats, TemplateUpdate};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

pub struct TemplateManager {
    store: Arc<dyn KeyValueStore>,
    pub(super) templates: Vec<Template>,
    dirty: bool,
}

impl TemplateManager {
    /// Rehydrate the collection from `store`.
    ///
    /// Malformed data yields an empty collection. A store that cannot be read
    /// is an error, so an unreadable file is never overwritten by the next
    /// save.
    pub fn load(store: Arc<dyn KeyValueStore>) -> TemplateResult<Self> {
        let raw = store.get(TEMPLATES_KEY).map_err(TemplateError::Load)?;
        let templates = match raw {
            Some(raw) => match serde_json::from_str::<Vec<Template>>(&raw) {
                Ok(list) => dedupe_ids(list),
                Err(err) => {
                    tracing::warn!(error = %err, "stored templates are malformed, starting empty");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        tracing::debug!(count = templates.len(), "templates loaded");

        Ok(Self {
            store,
            templates,
            dirty: false,
        })
    }

    /// Create and persist a new template.
    ///
    /// On a persistence error the template is still part of the collection.
    pub fn add(
        &mut self,
        name: &str,
        description: &str,
        data: PaymentFields,
        endpoint: Endpoint,
        method: &str,
    ) -> TemplateResult<Template> {
        let name = normalize_name(name)?;
        let now = Utc::now();
        let template = Template {
            id: self.generate_id(now)?,
            name,
            description: description.to_string(),
            data,
            endpoint,
            method: normalize_method(method),
            created_at: now,
            updated_at: now,
            usage_count: 0,
            last_used: None,
        };
        self.templates.push(template.clone());
        tracing::debug!(id = %template.id, name = %template.name, "template added");
        match self.persist() {
            Ok(()) => Ok(template),
            Err(err) => Err(err.with_unsaved(Unsaved::Added(Box::new(template)))),
        }
    }

    /// Merge `fields` into the template with `id`.
    ///
    /// Returns `Ok(None)` when no such template exists.
    pub fn update(&mut self, id: &str, fields: TemplateUpdate) -> TemplateResult<Option<Template>> {
        let name = fields.name.as_deref().map(normalize_name).transpose()?;
        let Some(template) = self.templates.iter_mut().find(|t| t.id == id) else {
            return Ok(None);
        };

        if let Some(name) = name {
            template.name = name;
        }
        if let Some(description) = fields.description {
            template.description = description;
        }
        if let Some(data) = fields.data {
            template.data = data;
        }
        if let Some(endpoint) = fields.endpoint {
            template.endpoint = endpoint;
        }
        if let Some(method) = fields.method {
            template.method = normalize_method(&method);
        }
        template.updated_at = Utc::now();

        let updated = template.clone();
        self.persist()?;
        Ok(Some(updated))
    }

    pub fn delete(&mut self, id: &str) -> TemplateResult<bool> {
        let before = self.templates.len();
        self.templates.retain(|t| t.id != id);
        if self.templates.len() == before {
            return Ok(false);
        }
        tracing::debug!(id, "template deleted");
        self.persist()?;
        Ok(true)
    }

    pub fn get(&self, id: &str) -> Option<Template> {
        self.templates.iter().find(|t| t.id == id).cloned()
    }

    /// Snapshot of every template in insertion order.
    pub fn list(&self) -> Vec<Template> {
        self.templates.clone()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// Case-insensitive substring match on name, description and endpoint.
    pub fn search(&self, query: &str) -> Vec<Template> {
        let needle = query.to_lowercase();
        self.templates
            .iter()
            .filter(|t| {
                t.name.to_lowercase().contains(&needle)
                    || t.description.to_lowercase().contains(&needle)
                    || t.endpoint.path().contains(&needle)
            })
            .cloned()
            .collect()
    }

    pub fn filter_by_endpoint(&self, endpoint: Endpoint) -> Vec<Template> {
        self.templates
            .iter()
            .filter(|t| t.endpoint == endpoint)
            .cloned()
            .collect()
    }

    /// Record that a template was loaded into a form. Unknown ids are ignored.
    pub fn increment_usage(&mut self, id: &str) -> TemplateResult<()> {
        let Some(template) = self.templates.iter_mut().find(|t| t.id == id) else {
            return Ok(());
        };
        template.usage_count += 1;
        template.last_used = Some(Utc::now());
        self.persist()
    }

    /// Templates with at least one use, most used first.
    pub fn most_used(&self, limit: usize) -> Vec<Template> {
        let mut used: Vec<Template> = self
            .templates
            .iter()
            .filter(|t| t.usage_count > 0)
            .cloned()
            .collect();
        used.sort_by(|a, b| b.usage_count.cmp(&a.usage_count));
        used.truncate(limit);
        used
    }

    /// Templates that have been used, latest first.
    pub fn recently_used(&self, limit: usize) -> Vec<Template> {
        let mut used: Vec<Template> = self
            .templates
            .iter()
            .filter(|t| t.last_used.is_some())
            .cloned()
            .collect();
        used.sort_by(|a, b| b.last_used.cmp(&a.last_used));
        used.truncate(limit);
        used
    }

    pub fn clear(&mut self) -> TemplateResult<()> {
        self.templates.clear();
        tracing::debug!("templates cleared");
        self.persist()
    }

    pub fn statistics(&self) -> TemplateStats {
        let mut per_endpoint = BTreeMap::new();
        let mut total_usage = 0u64;
        for template in &self.templates {
            *per_endpoint.entry(template.endpoint).or_insert(0) += 1;
            total_usage += template.usage_count;
        }
        let total = self.templates.len();
        let average_usage = if total == 0 {
            0.0
        } else {
            total_usage as f64 / total as f64
        };
        TemplateStats {
            total,
            per_endpoint,
            total_usage,
            average_usage,
        }
    }

    /// True when the last write to the store failed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the current collection again, e.g. after a quota error.
    pub fn flush(&mut self) -> TemplateResult<()> {
        self.persist()
    }

    pub(super) fn persist(&mut self) -> TemplateResult<()> {
        let written = serde_json::to_string(&self.templates)
            .map_err(StorageError::from)
            .and_then(|serialized| self.store.set(TEMPLATES_KEY, &serialized));
        match written {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                tracing::warn!(error = %err, "template changes kept in memory only");
                Err(TemplateError::Persist {
                    source: err,
                    unsaved: Unsaved::Nothing,
                })
            }
        }
    }

    /// `<base36 millis>-<6 hex chars>`, retried until unique in the collection.
    pub(super) fn generate_id(&self, now: DateTime<Utc>) -> TemplateResult<String> {
        let stamp = to_base36(now.timestamp_millis().max(0) as u64);
        loop {
            let mut suffix = [0u8; 3];
            getrandom::getrandom(&mut suffix).map_err(|e| TemplateError::Random(e.to_string()))?;
            let id = format!("{}-{}", stamp, hex::encode(suffix));
            if !self.templates.iter().any(|t| t.id == id) {
                return Ok(id);
            }
        }
    }
}

pub(super) fn normalize_name(name: &str) -> TemplateResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        Err(TemplateError::EmptyName)
    } else {
        Ok(trimmed.to_string())
    }
}

pub(super) fn normalize_method(method: &str) -> String {
    let trimmed = method.trim();
    if trimmed.is_empty() {
        crate::types::DEFAULT_METHOD.to_string()
    } else {
        trimmed.to_ascii_uppercase()
    }
}

fn dedupe_ids(list: Vec<Template>) -> Vec<Template> {
    let mut seen = HashSet::new();
    let before = list.len();
    let unique: Vec<Template> = list
        .into_iter()
        .filter(|t| seen.insert(t.id.clone()))
        .collect();
    if unique.len() != before {
        tracing::warn!(
            dropped = before - unique.len(),
            "stored templates contained duplicate ids"
        );
    }
    unique
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
