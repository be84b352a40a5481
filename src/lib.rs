// SPDX-License-Identifier: PMPL-1.0-or-later

//! NBS IPS QR payments: reusable payment templates, payload text building
//! and a client for the National Bank of Serbia QR service.
//!
//! Templates are kept by [`templates::TemplateManager`] and mirrored to a
//! [`storage::KeyValueStore`]. The interface language is owned by
//! [`i18n::LanguageCoordinator`], which debounces changes and notifies once
//! per accepted switch.

pub mod api;
pub mod config;
pub mod i18n;
pub mod payload;
pub mod report;
pub mod storage;
pub mod templates;
pub mod types;
