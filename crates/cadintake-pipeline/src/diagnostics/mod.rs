//! Append-only, observable record of every detection, parse and
//! conversion attempt.
//!
//! Observers either register a synchronous callback with
//! [`DiagnosticsLog::subscribe`] or take an async feed with
//! [`DiagnosticsLog::subscribe_feed`]. Events are queued in sequence order
//! under the entry lock and delivered one at a time by whichever recording
//! thread holds the dispatch lock, so every observer sees them in that
//! order. An event recorded from inside a callback is delivered after the
//! one being handled.

pub mod journal;
pub mod trace;

use std::collections::VecDeque;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use cadintake_core::config::diagnostics::DiagnosticsConfig;

use crate::models::FailureCategory;

use self::journal::Journal;

pub use self::trace::{call_site_trace, stack_trace_of};

/// File name recorded when the caller supplies a blank one.
pub const UNKNOWN_FILE_NAME: &str = "unknown";

/// One recorded attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepParsingDiagnosticEntry {
    /// Monotonic append index; gives the total order of entries.
    pub sequence: u64,
    /// When the entry was appended.
    pub recorded_utc: DateTime<Utc>,
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub is_success: bool,
    pub error_code: Option<String>,
    pub failure_category: Option<FailureCategory>,
    pub message: String,
    pub diagnostic_details: String,
    pub stack_trace: Option<String>,
    /// Subsystem that made the attempt, e.g. `step-parse` or `preview`.
    pub source: String,
}

/// The caller-supplied half of an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptRecord {
    pub file_name: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub is_success: bool,
    pub error_code: Option<String>,
    pub failure_category: Option<FailureCategory>,
    pub message: String,
    pub diagnostic_details: String,
    pub stack_trace: Option<String>,
    pub source: String,
}

impl AttemptRecord {
    /// A successful attempt on `file_name`.
    pub fn success(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            is_success: true,
            ..Default::default()
        }
    }

    /// A failed attempt on `file_name` with an outcome code.
    pub fn failure(file_name: impl Into<String>, error_code: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            is_success: false,
            error_code: Some(error_code.into()),
            ..Default::default()
        }
    }

    pub fn with_path(mut self, file_path: impl Into<String>) -> Self {
        self.file_path = file_path.into();
        self
    }

    pub fn with_size(mut self, file_size_bytes: u64) -> Self {
        self.file_size_bytes = file_size_bytes;
        self
    }

    pub fn with_category(mut self, category: FailureCategory) -> Self {
        self.failure_category = Some(category);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.diagnostic_details = details.into();
        self
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }
}

/// Change notifications published by the log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticEvent {
    /// An entry was appended.
    EntryAdded(StepParsingDiagnosticEntry),
    /// All entries were removed.
    Cleared,
}

type Callback = Arc<dyn Fn(&DiagnosticEvent) + Send + Sync>;
type Registry = Mutex<Vec<(u64, Callback)>>;

struct LogState {
    entries: Vec<StepParsingDiagnosticEntry>,
    next_sequence: u64,
    /// Events not yet delivered, in sequence order.
    pending: VecDeque<DiagnosticEvent>,
}

struct Inner {
    state: Mutex<LogState>,
    /// Held while delivering; at most one thread dispatches at a time.
    dispatch: Mutex<()>,
    subscribers: Arc<Registry>,
    next_subscriber: AtomicU64,
    feed: broadcast::Sender<DiagnosticEvent>,
    journal: Option<Journal>,
    default_source: String,
}

/// Thread-safe diagnostics log. Clones share the same entries.
#[derive(Clone)]
pub struct DiagnosticsLog {
    inner: Arc<Inner>,
}

impl fmt::Debug for DiagnosticsLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiagnosticsLog")
            .field("entries", &self.len())
            .field("journal", &self.inner.journal)
            .field("default_source", &self.inner.default_source)
            .finish_non_exhaustive()
    }
}

impl DiagnosticsLog {
    /// An in-memory log with default settings.
    pub fn new() -> Self {
        Self::from_config(&DiagnosticsConfig::default())
    }

    /// Build a log from configuration, loading the journal when one is set.
    ///
    /// A journal that cannot be opened is logged and skipped.
    pub fn from_config(config: &DiagnosticsConfig) -> Self {
        let (journal, entries) = match &config.journal_path {
            Some(path) => match Journal::open(path) {
                Ok((journal, entries)) => (Some(journal), entries),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to open diagnostics journal");
                    (None, Vec::new())
                }
            },
            None => (None, Vec::new()),
        };

        let next_sequence = entries.iter().map(|e| e.sequence + 1).max().unwrap_or(0);
        let (feed, _) = broadcast::channel(config.channel_capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(LogState {
                    entries,
                    next_sequence,
                    pending: VecDeque::new(),
                }),
                dispatch: Mutex::new(()),
                subscribers: Arc::new(Mutex::new(Vec::new())),
                next_subscriber: AtomicU64::new(0),
                feed,
                journal,
                default_source: config.default_source.clone(),
            }),
        }
    }

    /// Append an attempt and notify observers. Never fails.
    pub fn record_attempt(&self, attempt: AttemptRecord) -> StepParsingDiagnosticEntry {
        let entry = {
            let mut state = lock(&self.inner.state);
            let entry = StepParsingDiagnosticEntry {
                sequence: state.next_sequence,
                recorded_utc: Utc::now(),
                file_name: non_blank_or(attempt.file_name, UNKNOWN_FILE_NAME),
                file_path: attempt.file_path,
                file_size_bytes: attempt.file_size_bytes,
                is_success: attempt.is_success,
                error_code: attempt.error_code,
                failure_category: attempt.failure_category,
                message: attempt.message,
                diagnostic_details: attempt.diagnostic_details,
                stack_trace: attempt.stack_trace,
                source: non_blank_or(attempt.source, &self.inner.default_source),
            };
            state.next_sequence += 1;
            state.entries.push(entry.clone());
            state
                .pending
                .push_back(DiagnosticEvent::EntryAdded(entry.clone()));

            // Appended under the lock so the journal keeps sequence order.
            if let Some(journal) = &self.inner.journal {
                if let Err(e) = journal.append(&entry) {
                    warn!(error = %e, "Failed to append diagnostics journal entry");
                }
            }
            entry
        };

        debug!(
            sequence = entry.sequence,
            file = %entry.file_name,
            success = entry.is_success,
            code = ?entry.error_code,
            "Recorded diagnostics entry"
        );

        self.dispatch_pending();
        entry
    }

    /// Snapshot of all entries in append order.
    pub fn get_entries(&self) -> Vec<StepParsingDiagnosticEntry> {
        lock(&self.inner.state).entries.clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        lock(&self.inner.state).entries.len()
    }

    /// Whether the log has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove every entry and notify observers. Sequence numbers keep counting.
    pub fn clear(&self) {
        {
            let mut state = lock(&self.inner.state);
            state.entries.clear();
            state.pending.push_back(DiagnosticEvent::Cleared);
            if let Some(journal) = &self.inner.journal {
                if let Err(e) = journal.truncate() {
                    warn!(error = %e, "Failed to truncate diagnostics journal");
                }
            }
        }
        self.dispatch_pending();
    }

    /// Register a synchronous observer. It stays attached until the
    /// returned [`Subscription`] is dropped or detached.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&DiagnosticEvent) + Send + Sync + 'static,
    {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.subscribers).push((id, Arc::new(callback)));
        Subscription {
            id,
            registry: Arc::downgrade(&self.inner.subscribers),
        }
    }

    /// A bounded async feed of events. Slow receivers observe `Lagged`.
    pub fn subscribe_feed(&self) -> broadcast::Receiver<DiagnosticEvent> {
        self.inner.feed.subscribe()
    }

    /// Deliver queued events unless another thread is already doing so.
    fn dispatch_pending(&self) {
        loop {
            let dispatching = match self.inner.dispatch.try_lock() {
                Ok(guard) => guard,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            while let Some(event) = self.next_pending() {
                self.deliver(event);
            }
            drop(dispatching);

            // An event queued between the last pop and the unlock was left
            // for this thread to deliver.
            if lock(&self.inner.state).pending.is_empty() {
                return;
            }
        }
    }

    fn next_pending(&self) -> Option<DiagnosticEvent> {
        lock(&self.inner.state).pending.pop_front()
    }

    fn deliver(&self, event: DiagnosticEvent) {
        let callbacks: Vec<Callback> = lock(&self.inner.subscribers)
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();

        for callback in callbacks {
            if catch_unwind(AssertUnwindSafe(|| callback(&event))).is_err() {
                warn!("Diagnostics subscriber panicked; continuing");
            }
        }

        // No receivers is not an error.
        let _ = self.inner.feed.send(event);
    }
}

impl Default for DiagnosticsLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a registered observer. Detaches on drop.
#[must_use = "dropping a Subscription detaches the observer"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Detach the observer now.
    pub fn detach(self) {}
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            lock(&registry).retain(|(id, _)| *id != self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn non_blank_or(value: String, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_record_normalizes_blank_fields() {
        let log = DiagnosticsLog::new();
        let entry = log.record_attempt(AttemptRecord::failure("  ", "invalid-step-header"));
        assert_eq!(entry.file_name, "unknown");
        assert_eq!(entry.source, "step-parse");
        assert_eq!(entry.error_code.as_deref(), Some("invalid-step-header"));
    }

    #[test]
    fn test_fields_are_stored_verbatim() {
        let log = DiagnosticsLog::new();
        let entry = log.record_attempt(
            AttemptRecord::success("bracket.step")
                .with_path("/uploads/bracket.step")
                .with_size(2048)
                .with_message("STEP structure validated.")
                .with_details("entities=3")
                .with_source("preview"),
        );
        assert_eq!(entry.file_path, "/uploads/bracket.step");
        assert_eq!(entry.file_size_bytes, 2048);
        assert_eq!(entry.source, "preview");
        assert!(entry.error_code.is_none());
        assert_eq!(log.get_entries(), vec![entry]);
    }

    #[test]
    fn test_sequence_is_monotonic_across_clear() {
        let log = DiagnosticsLog::new();
        let a = log.record_attempt(AttemptRecord::success("a"));
        log.clear();
        let b = log.record_attempt(AttemptRecord::success("b"));
        assert!(b.sequence > a.sequence);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_subscribers_see_adds_and_clears() {
        let log = DiagnosticsLog::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let _sub = log.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        let entry = log.record_attempt(AttemptRecord::success("part.step"));
        log.clear();

        let seen = events.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[0], DiagnosticEvent::EntryAdded(entry));
        assert_eq!(seen[1], DiagnosticEvent::Cleared);
    }

    #[test]
    fn test_dropped_subscription_detaches() {
        let log = DiagnosticsLog::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let sub = log.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        log.record_attempt(AttemptRecord::success("a"));
        sub.detach();
        log.record_attempt(AttemptRecord::success("b"));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_panicking_subscriber_is_isolated() {
        let log = DiagnosticsLog::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let _bad = log.subscribe(|_| panic!("observer bug"));
        let _good = log.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        log.record_attempt(AttemptRecord::success("a"));
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_subscriber_may_read_the_log() {
        let log = DiagnosticsLog::new();
        let reader = log.clone();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_cb = Arc::clone(&seen);
        let _sub = log.subscribe(move |_| {
            seen_in_cb.store(reader.len(), Ordering::SeqCst);
        });

        log.record_attempt(AttemptRecord::success("a"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_events_arrive_in_sequence_order() {
        let log = DiagnosticsLog::new();
        let sequences = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&sequences);
        let _sub = log.subscribe(move |event| {
            if let DiagnosticEvent::EntryAdded(entry) = event {
                sink.lock().unwrap().push(entry.sequence);
            }
        });

        let writers: Vec<_> = (0..8)
            .map(|t| {
                let log = log.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        log.record_attempt(AttemptRecord::success(format!("t{t}-{i}.step")));
                    }
                })
            })
            .collect();
        for writer in writers {
            writer.join().unwrap();
        }

        let seen = sequences.lock().unwrap();
        assert_eq!(seen.len(), 400);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn test_replaying_events_matches_final_log() {
        let log = DiagnosticsLog::new();
        let mirror = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&mirror);
        let _sub = log.subscribe(move |event| {
            let mut mirror = sink.lock().unwrap();
            match event {
                DiagnosticEvent::EntryAdded(entry) => mirror.push(entry.sequence),
                DiagnosticEvent::Cleared => mirror.clear(),
            }
        });

        let recorder = {
            let log = log.clone();
            std::thread::spawn(move || {
                for i in 0..200 {
                    log.record_attempt(AttemptRecord::success(format!("{i}.step")));
                }
            })
        };
        let clearer = {
            let log = log.clone();
            std::thread::spawn(move || {
                for _ in 0..20 {
                    log.clear();
                    std::thread::yield_now();
                }
            })
        };
        recorder.join().unwrap();
        clearer.join().unwrap();

        let expected: Vec<u64> = log.get_entries().iter().map(|e| e.sequence).collect();
        assert_eq!(*mirror.lock().unwrap(), expected);
    }

    #[test]
    fn test_recording_from_a_callback_is_delivered_next() {
        let log = DiagnosticsLog::new();
        let writer = log.clone();
        let _chain = log.subscribe(move |event| {
            if let DiagnosticEvent::EntryAdded(entry) = event {
                if entry.file_name == "first.step" {
                    writer.record_attempt(AttemptRecord::success("second.step"));
                }
            }
        });
        let names = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&names);
        let _watch = log.subscribe(move |event| {
            if let DiagnosticEvent::EntryAdded(entry) = event {
                sink.lock().unwrap().push(entry.file_name.clone());
            }
        });

        log.record_attempt(AttemptRecord::success("first.step"));

        assert_eq!(log.len(), 2);
        assert_eq!(*names.lock().unwrap(), vec!["first.step", "second.step"]);
    }

    #[tokio::test]
    async fn test_feed_receives_events() {
        let log = DiagnosticsLog::new();
        let mut feed = log.subscribe_feed();
        log.record_attempt(AttemptRecord::failure("x.step", "unsupported-step-entities"));

        match feed.recv().await.expect("event") {
            DiagnosticEvent::EntryAdded(entry) => assert_eq!(entry.file_name, "x.step"),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_journal_round_trip() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = DiagnosticsConfig {
            journal_path: Some(temp.path().join("diag").join("journal.jsonl")),
            ..Default::default()
        };

        let log = DiagnosticsLog::from_config(&config);
        log.record_attempt(AttemptRecord::success("a.step"));
        log.record_attempt(AttemptRecord::failure("b.step", "converter-timeout"));
        drop(log);

        let reloaded = DiagnosticsLog::from_config(&config);
        let entries = reloaded.get_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].error_code.as_deref(), Some("converter-timeout"));

        let next = reloaded.record_attempt(AttemptRecord::success("c.step"));
        assert_eq!(next.sequence, 2);

        reloaded.clear();
        assert!(DiagnosticsLog::from_config(&config).is_empty());
    }
}
