// SPDX-License-Identifier: PMPL-1.0-or-later

use nbs_qr::i18n::{ChangeOutcome, Lang, LanguageChanged, LanguageCoordinator, Notifier};
use nbs_qr::storage::{FileStore, KeyValueStore, LANGUAGE_KEY};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tempfile::TempDir;

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl Notifier for Recorder {
    fn notify(&self, message: &str) {
        self.0.lock().unwrap().push(message.to_string());
    }
}

#[test]
fn test_preference_survives_restart() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(FileStore::new(dir.path()));
    let notes = Arc::new(Recorder::default());

    let first = LanguageCoordinator::new(store.clone(), notes.clone(), Lang::Sr);
    assert_eq!(first.current(), Lang::Sr);
    let outcome = first.change_language("en").unwrap();
    assert_eq!(
        outcome,
        ChangeOutcome::Changed {
            from: Lang::Sr,
            to: Lang::En,
            persisted: true
        }
    );
    assert_eq!(store.get(LANGUAGE_KEY).unwrap().as_deref(), Some("\"en\""));

    let second = LanguageCoordinator::new(store, notes.clone(), Lang::Sr);
    assert_eq!(second.current(), Lang::En);
    assert_eq!(notes.0.lock().unwrap().as_slice(), ["Language changed to English"]);
}

#[test]
fn test_rapid_toggling_settles_on_first_change() {
    let dir = TempDir::new().unwrap();
    let coordinator = LanguageCoordinator::new(
        Arc::new(FileStore::new(dir.path())),
        Arc::new(Recorder::default()),
        Lang::Sr,
    );
    let events = coordinator.subscribe();
    coordinator.register_label("title", "template.title");

    let start = Instant::now();
    assert!(matches!(
        coordinator.change_language_at("en", start).unwrap(),
        ChangeOutcome::Changed { .. }
    ));
    for step in 1..5 {
        let at = start + Duration::from_millis(step * 50);
        assert_eq!(
            coordinator.change_language_at("sr", at).unwrap(),
            ChangeOutcome::Debounced
        );
    }

    assert_eq!(coordinator.current(), Lang::En);
    assert_eq!(coordinator.label("title").as_deref(), Some("Templates"));
    assert_eq!(
        events.try_recv().unwrap(),
        LanguageChanged {
            previous: Lang::Sr,
            current: Lang::En
        }
    );
    assert!(events.try_recv().is_err());

    let later = start + Duration::from_millis(400);
    coordinator.change_language_at("sr", later).unwrap();
    assert_eq!(coordinator.label("title").as_deref(), Some("Šabloni"));
}
