// SPDX-License-Identifier: PMPL-1.0-or-later

//! Interface languages for nbs-qr.
//!
//! ## Supported languages
//!
//! | Code | Language | Native name |
//! |------|----------|-------------|
//! | sr   | Serbian  | Srpski      |
//! | en   | English  | English     |
//!
//! Translation keys use dotted namespaces: `"template.saved"`,
//! `"qr.valid"`. Lookups fall back to English when a key is missing in the
//! requested language, and to an empty string when English lacks it too.
//!
//! The active language is owned by [`LanguageCoordinator`]; nothing else keeps
//! a copy. Components either ask it for [`LanguageCoordinator::current`] or
//! subscribe to [`LanguageChanged`] events.

mod catalog;
mod coordinator;

pub use catalog::{t, t_or_key, Lang};
pub use coordinator::{
    ChangeOutcome, CoordinatorState, LanguageChanged, LanguageCoordinator, LanguageError,
    LogNotifier, Notifier, LANGUAGE_CHANGE_DEBOUNCE,
};
