// SPDX-License-Identifier: PMPL-1.0-or-later

//! Translation catalog for nbs-qr.
//!
//! All user-facing strings live in compile-time static tables, one per
//! language. Lookup is a linear scan; the tables are small and lookups
//! happen per rendered label, not in a loop.
//!
//! ## Adding a new key
//!
//! 1. Add the English entry to `EN`
//! 2. Add the Serbian entry to `SR` (missing keys fall back to English)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lang {
    Sr,
    En,
}

impl Lang {
    /// ISO 639-1 two-letter code for this language.
    pub fn code(&self) -> &'static str {
        match self {
            Lang::Sr => "sr",
            Lang::En => "en",
        }
    }

    /// Parse a language code or tag into a supported language.
    ///
    /// Only the primary subtag counts, so `sr-Latn` and `sr_RS` both map to
    /// Serbian. Case-insensitive. Returns `None` for unsupported languages.
    pub fn from_code(code: &str) -> Option<Lang> {
        let primary = code
            .trim()
            .split(['-', '_'])
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();
        match primary.as_str() {
            "sr" => Some(Lang::Sr),
            "en" => Some(Lang::En),
            _ => None,
        }
    }

    /// All supported languages, in display order.
    pub fn all() -> &'static [Lang] {
        &[Lang::Sr, Lang::En]
    }

    /// Name of the language written in that language.
    pub fn native_name(&self) -> &'static str {
        match self {
            Lang::Sr => "Srpski",
            Lang::En => "English",
        }
    }
}

impl Default for Lang {
    fn default() -> Self {
        Lang::Sr
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ─── Translation Lookup ─────────────────────────────────────────────

/// Look up a translation key in the specified language.
///
/// Falls back to English, then to `""` for keys nobody defines.
///
/// # Examples
///
/// ```
/// use nbs_qr::i18n::{t, Lang};
/// assert_eq!(t(Lang::En, "qr.valid"), "QR code is valid");
/// assert_eq!(t(Lang::Sr, "qr.valid"), "QR kod je ispravan");
/// ```
pub fn t(lang: Lang, key: &str) -> &'static str {
    if let Some(value) = lookup(catalog_for(lang), key) {
        return value;
    }
    if lang != Lang::En {
        if let Some(value) = lookup(EN, key) {
            return value;
        }
    }
    ""
}

/// Like [`t`] but returns the key itself when no translation exists.
pub fn t_or_key<'a>(lang: Lang, key: &'a str) -> &'a str {
    let result = t(lang, key);
    if result.is_empty() {
        key
    } else {
        result
    }
}

fn lookup(catalog: &'static [(&'static str, &'static str)], key: &str) -> Option<&'static str> {
    catalog.iter().find(|&&(k, _)| k == key).map(|&(_, v)| v)
}

fn catalog_for(lang: Lang) -> &'static [(&'static str, &'static str)] {
    match lang {
        Lang::Sr => SR,
        Lang::En => EN,
    }
}

// ─── English (all keys defined here) ────────────────────────────────

const EN: &[(&str, &str)] = &[
    // Language switching
    ("lang.changed", "Language changed to English"),
    ("lang.current", "Current language"),
    ("lang.available", "Available languages"),
    // Templates
    ("template.title", "Templates"),
    ("template.saved", "Template saved"),
    ("template.updated", "Template updated"),
    ("template.deleted", "Template deleted"),
    ("template.not_found", "Template not found"),
    ("template.loaded", "Template loaded"),
    ("template.cleared", "All templates deleted"),
    ("template.empty", "No saved templates"),
    ("template.exported", "Templates exported"),
    ("template.imported", "Imported"),
    ("template.skipped", "Skipped"),
    ("template.errors", "Errors"),
    ("template.storage_failed", "Changes could not be saved to storage"),
    ("template.confirm_clear", "Pass --yes to delete all templates"),
    // Statistics
    ("stats.title", "Template statistics"),
    ("stats.total", "Total templates"),
    ("stats.total_usage", "Total uses"),
    ("stats.average_usage", "Average uses"),
    ("stats.most_used", "Most used"),
    ("stats.recently_used", "Recently used"),
    // Fields
    ("field.name", "Name"),
    ("field.description", "Description"),
    ("field.endpoint", "Endpoint"),
    ("field.method", "Method"),
    ("field.usage", "Uses"),
    ("field.last_used", "Last used"),
    ("field.created", "Created"),
    // QR operations
    ("qr.generated", "QR code generated"),
    ("qr.saved_to", "Saved to"),
    ("qr.valid", "QR code is valid"),
    ("qr.invalid", "QR code is not valid"),
    ("qr.timeout", "The QR service did not respond in time"),
    ("qr.network", "Cannot reach the QR service"),
    ("qr.status", "Status"),
    ("qr.payload", "Payload"),
    // Common
    ("common.never", "never"),
    ("common.none", "none"),
];

// ─── Serbian (Latin) ────────────────────────────────────────────────

const SR: &[(&str, &str)] = &[
    ("lang.changed", "Jezik je promenjen na srpski"),
    ("lang.current", "Trenutni jezik"),
    ("lang.available", "Dostupni jezici"),
    ("template.title", "Šabloni"),
    ("template.saved", "Šablon je sačuvan"),
    ("template.updated", "Šablon je izmenjen"),
    ("template.deleted", "Šablon je obrisan"),
    ("template.not_found", "Šablon nije pronađen"),
    ("template.loaded", "Šablon je učitan"),
    ("template.cleared", "Svi šabloni su obrisani"),
    ("template.empty", "Nema sačuvanih šablona"),
    ("template.exported", "Šabloni su izvezeni"),
    ("template.imported", "Uvezeno"),
    ("template.skipped", "Preskočeno"),
    ("template.errors", "Greške"),
    ("template.storage_failed", "Izmene nije bilo moguće sačuvati"),
    ("template.confirm_clear", "Dodajte --yes da obrišete sve šablone"),
    ("stats.title", "Statistika šablona"),
    ("stats.total", "Ukupno šablona"),
    ("stats.total_usage", "Ukupno korišćenja"),
    ("stats.average_usage", "Prosečno korišćenja"),
    ("stats.most_used", "Najčešće korišćeni"),
    ("stats.recently_used", "Nedavno korišćeni"),
    ("field.name", "Naziv"),
    ("field.description", "Opis"),
    ("field.endpoint", "Operacija"),
    ("field.method", "Metod"),
    ("field.usage", "Korišćenja"),
    ("field.last_used", "Poslednje korišćenje"),
    ("field.created", "Kreiran"),
    ("qr.generated", "QR kod je generisan"),
    ("qr.saved_to", "Sačuvano u"),
    ("qr.valid", "QR kod je ispravan"),
    ("qr.invalid", "QR kod nije ispravan"),
    ("qr.timeout", "QR servis nije odgovorio na vreme"),
    ("qr.network", "QR servis nije dostupan"),
    ("qr.status", "Status"),
    ("qr.payload", "Sadržaj"),
    ("common.never", "nikad"),
    ("common.none", "nema"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn english_keys_all_resolve() {
        for &(key, _) in EN {
            assert!(!t(Lang::En, key).is_empty(), "EN key '{}' should resolve", key);
        }
    }

    #[test]
    fn serbian_translations_used() {
        assert_eq!(t(Lang::Sr, "template.saved"), "Šablon je sačuvan");
        assert_eq!(t(Lang::Sr, "lang.changed"), "Jezik je promenjen na srpski");
    }

    #[test]
    fn unknown_key_returns_empty() {
        assert_eq!(t(Lang::Sr, "nonexistent.key"), "");
        assert_eq!(t_or_key(Lang::Sr, "nonexistent.key"), "nonexistent.key");
    }

    #[test]
    fn codes_parse_by_primary_subtag() {
        assert_eq!(Lang::from_code("sr"), Some(Lang::Sr));
        assert_eq!(Lang::from_code("sr-Latn"), Some(Lang::Sr));
        assert_eq!(Lang::from_code("sr_RS"), Some(Lang::Sr));
        assert_eq!(Lang::from_code("EN"), Some(Lang::En));
        assert_eq!(Lang::from_code("de"), None);
        assert_eq!(Lang::from_code(""), None);
    }

    #[test]
    fn lang_roundtrip() {
        for lang in Lang::all() {
            assert_eq!(Lang::from_code(lang.code()), Some(*lang));
        }
    }

    #[test]
    fn catalogs_share_every_key() {
        assert_eq!(SR.len(), EN.len(), "SR catalog key count mismatch");
        for &(key, _) in EN {
            assert!(lookup(SR, key).is_some(), "SR is missing '{}'", key);
        }
    }
}
