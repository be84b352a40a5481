// SPDX-License-Identifier: PMPL-1.0-or-later

//! Active-language ownership and change coordination.
//!
//! A change runs `Idle -> Changing -> Idle`. While `Changing`, or within
//! [`LANGUAGE_CHANGE_DEBOUNCE`] of the previous change settling, further
//! requests are rejected as [`ChangeOutcome::Debounced`]. Each accepted change
//! re-renders every registered label, produces exactly one notification, and
//! sends one [`LanguageChanged`] event to every live subscriber.

use super::catalog::{t, t_or_key, Lang};
use crate::storage::{KeyValueStore, StorageError, LANGUAGE_KEY};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Minimum time between two accepted language changes.
pub const LANGUAGE_CHANGE_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("unsupported language: {0:?}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Changing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// The language switched. `persisted` is false when the preference could
    /// not be written; the switch still applies for this session.
    Changed { from: Lang, to: Lang, persisted: bool },
    /// Requested language is already active.
    Unchanged,
    /// Another change is running or settled too recently.
    Debounced,
}

/// Broadcast to subscribers after a change is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageChanged {
    pub previous: Lang,
    pub current: Lang,
}

/// Destination for the one user-visible confirmation per change.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Notifier that only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// A rendered label tied to a translation key.
#[derive(Debug, Clone)]
struct Label {
    key: String,
    text: String,
}

struct Inner {
    current: Lang,
    last_settled: Option<Instant>,
    labels: BTreeMap<String, Label>,
    subscribers: Vec<Sender<LanguageChanged>>,
}

pub struct LanguageCoordinator {
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    changing: AtomicBool,
    inner: Mutex<Inner>,
}

/// Returns the coordinator to `Idle` however the change ends.
struct ChangingGuard<'a>(&'a AtomicBool);

impl Drop for ChangingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl LanguageCoordinator {
    /// Build a coordinator, restoring the persisted preference when it names
    /// a supported language and using `fallback` otherwise.
    pub fn new(store: Arc<dyn KeyValueStore>, notifier: Arc<dyn Notifier>, fallback: Lang) -> Self {
        let current = restore_preference(store.as_ref()).unwrap_or(fallback);
        tracing::debug!(lang = %current, "interface language restored");
        Self {
            store,
            notifier,
            changing: AtomicBool::new(false),
            inner: Mutex::new(Inner {
                current,
                last_settled: None,
                labels: BTreeMap::new(),
                subscribers: Vec::new(),
            }),
        }
    }

    pub fn current(&self) -> Lang {
        self.lock().current
    }

    pub fn state(&self) -> CoordinatorState {
        if self.changing.load(Ordering::Acquire) {
            CoordinatorState::Changing
        } else {
            CoordinatorState::Idle
        }
    }

    /// Receive a [`LanguageChanged`] for every future change.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<LanguageChanged> {
        let (tx, rx) = mpsc::channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Tag a label for translation and render it in the current language.
    pub fn register_label(&self, id: &str, key: &str) -> String {
        let mut inner = self.lock();
        let text = t_or_key(inner.current, key).to_string();
        inner.labels.insert(
            id.to_string(),
            Label {
                key: key.to_string(),
                text: text.clone(),
            },
        );
        text
    }

    /// Current rendering of a registered label.
    pub fn label(&self, id: &str) -> Option<String> {
        self.lock().labels.get(id).map(|label| label.text.clone())
    }

    pub fn change_language(&self, code: &str) -> Result<ChangeOutcome, LanguageError> {
        self.change_language_at(code, Instant::now())
    }

    /// [`change_language`](Self::change_language) with an explicit clock
    /// reading for the debounce check.
    pub fn change_language_at(&self, code: &str, now: Instant) -> Result<ChangeOutcome, LanguageError> {
        let target = Lang::from_code(code).ok_or_else(|| LanguageError::Unsupported(code.to_string()))?;

        if self.lock().current == target {
            return Ok(ChangeOutcome::Unchanged);
        }
        if self
            .changing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(lang = %target, "language change already in flight");
            return Ok(ChangeOutcome::Debounced);
        }
        let _guard = ChangingGuard(&self.changing);

        {
            let inner = self.lock();
            if inner.current == target {
                return Ok(ChangeOutcome::Unchanged);
            }
            if let Some(settled) = inner.last_settled {
                if now.saturating_duration_since(settled) < LANGUAGE_CHANGE_DEBOUNCE {
                    tracing::debug!(lang = %target, "language change debounced");
                    return Ok(ChangeOutcome::Debounced);
                }
            }
        }

        // The in-flight flag keeps other changers out; the store is written
        // without holding the state lock.
        let persisted = match self.persist(target) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(error = %err, lang = %target, "language preference not saved");
                false
            }
        };

        let previous = {
            let mut inner = self.lock();
            let previous = inner.current;
            inner.current = target;
            for label in inner.labels.values_mut() {
                label.text = t_or_key(target, &label.key).to_string();
            }
            inner.last_settled = Some(now);
            previous
        };

        // Outside the lock so a notifier may read `current()`; a nested
        // change request still sees the in-flight flag.
        self.notifier.notify(t(target, "lang.changed"));

        let event = LanguageChanged {
            previous,
            current: target,
        };
        self.lock().subscribers.retain(|tx| tx.send(event).is_ok());
        tracing::info!(from = %previous, to = %target, "interface language changed");

        Ok(ChangeOutcome::Changed {
            from: previous,
            to: target,
            persisted,
        })
    }

    fn persist(&self, lang: Lang) -> Result<(), StorageError> {
        let value = serde_json::to_string(lang.code())?;
        self.store.set(LANGUAGE_KEY, &value)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // Inner holds plain data; recover from poisoning.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn restore_preference(store: &dyn KeyValueStore) -> Option<Lang> {
    let raw = match store.get(LANGUAGE_KEY) {
        Ok(raw) => raw?,
        Err(err) => {
            tracing::warn!(error = %err, "cannot read language preference");
            return None;
        }
    };
    let code: String = serde_json::from_str(&raw).unwrap_or(raw);
    let lang = Lang::from_code(&code);
    if lang.is_none() {
        tracing::warn!(stored = %code, "ignoring unsupported stored language");
    }
    lang
}
