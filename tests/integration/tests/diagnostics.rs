//! Warnings emitted for recoverable problems.

use std::fs;
use std::sync::{Arc, Mutex};

use filestamp_checksum::{ChecksumCache, ChecksumConfig};
use filestamp_manifest::{Manifest, ManifestEntry};
use tracing_subscriber::prelude::*;

#[derive(Clone, Default)]
struct WarningLog(Arc<Mutex<Vec<String>>>);

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarningLog {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        if *event.metadata().level() > tracing::Level::WARN {
            return;
        }
        let mut visitor = MessageVisitor(String::new());
        event.record(&mut visitor);
        self.0.lock().unwrap().push(visitor.0);
    }
}

struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            use std::fmt::Write;
            let _ = write!(self.0, "{:?}", value);
        }
    }
}

fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<String>) {
    let log = WarningLog::default();
    let subscriber = tracing_subscriber::registry().with(log.clone());
    let result = tracing::subscriber::with_default(subscriber, f);
    let messages = log.0.lock().unwrap().clone();
    (result, messages)
}

#[test]
fn rooted_entry_path_is_reported() {
    let (entry, warnings) = capture(|| ManifestEntry::new("app", "/opt/app/bin", "", 0));

    assert_eq!(entry.file_path(), "opt/app/bin");
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("must be relative"));
}

#[test]
fn relative_entry_path_is_silent() {
    let (_, warnings) = capture(|| ManifestEntry::new("app", "opt\\app", "", 0));
    assert!(warnings.is_empty());
}

#[test]
fn corrupt_cache_file_is_ignored_with_a_warning() {
    let dir = tempfile::tempdir().unwrap();
    let cache_file = dir.path().join("checksums.json");
    fs::write(&cache_file, "[{\"path\": 42}]").unwrap();

    let (cache, warnings) =
        capture(|| ChecksumCache::new(ChecksumConfig::new().with_cache_file(&cache_file)));

    assert!(cache.is_empty());
    assert!(warnings.iter().any(|w| w.contains("Ignoring checksum cache")));
}

#[test]
fn manifest_parse_failure_is_logged() {
    let (result, warnings) = capture(|| Manifest::from_portable_text("not json"));
    assert!(result.is_err());
    assert!(warnings.iter().any(|w| w.contains("Failed to read manifest")));
}
