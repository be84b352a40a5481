// SPDX-License-Identifier: PMPL-1.0-or-later

//! Serialization helpers for printed listings

use anyhow::Result;
use clap::ValueEnum;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable, localized
    #[default]
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    /// Serialize for the structured formats; `None` for `Text`, which the
    /// formatter renders instead.
    pub fn serialize<T: Serialize>(&self, value: &T) -> Result<Option<String>> {
        match self {
            OutputFormat::Text => Ok(None),
            OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
            OutputFormat::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn structured_formats_serialize() {
        let mut value = BTreeMap::new();
        value.insert("K", "PR");
        assert_eq!(OutputFormat::Text.serialize(&value).unwrap(), None);
        assert!(OutputFormat::Json
            .serialize(&value)
            .unwrap()
            .unwrap()
            .contains("\"K\": \"PR\""));
        assert_eq!(OutputFormat::Yaml.serialize(&value).unwrap().unwrap(), "K: PR\n");
    }
}
