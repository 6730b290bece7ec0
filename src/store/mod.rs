//! Per-user persisted state containers.
//!
//! Every store keeps its state in memory and persists it, write-behind, under
//! `<prefix>-<namespace key>`. Switching users re-points the store at another
//! key and reloads from there.

mod progress;
mod treatments;
mod writer;

pub use progress::*;
pub use treatments::*;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::db::KeyValueStore;
use crate::models::{Namespace, ProgressMetrics};
use writer::WriteBehind;

/// State that can be persisted by a [`PersistedStore`].
pub trait Persist: Serialize + DeserializeOwned + Default + Send + 'static {
    /// Storage key prefix, e.g. `keepr-store`.
    const PREFIX: &'static str;
    /// Blob version written alongside the state.
    const VERSION: u32;

    /// Recompute derived views after a reload.
    fn after_rehydrate(&mut self) {}
}

#[derive(Serialize)]
struct BlobRef<'a, S> {
    state: &'a S,
    version: u32,
}

#[derive(Deserialize)]
struct Blob {
    state: serde_json::Value,
    version: u32,
}

struct Slot<S> {
    namespace: Namespace,
    state: S,
    /// Bumped by every rehydrate; stale loads are discarded
    generation: u64,
}

/// Namespaced, write-behind persisted state.
pub struct PersistedStore<S: Persist> {
    storage: Arc<dyn KeyValueStore>,
    writer: WriteBehind,
    slot: Mutex<Slot<S>>,
}

impl<S: Persist> PersistedStore<S> {
    /// Create an empty store bound to `namespace`. Call
    /// [`rehydrate`](Self::rehydrate) to load what is stored there.
    pub fn new(storage: Arc<dyn KeyValueStore>, namespace: Namespace) -> Self {
        let writer = WriteBehind::spawn(storage.clone(), S::PREFIX);
        Self {
            storage,
            writer,
            slot: Mutex::new(Slot {
                namespace,
                state: S::default(),
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<S>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Namespace the store currently reads from and writes to.
    pub fn namespace(&self) -> Namespace {
        self.lock().namespace.clone()
    }

    /// Run `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.lock().state)
    }

    /// Mutate the state and queue it for persistence.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        let mut slot = self.lock();
        let out = f(&mut slot.state);
        self.persist(&slot);
        out
    }

    fn persist(&self, slot: &Slot<S>) {
        let key = slot.namespace.storage_key(S::PREFIX);
        let blob = BlobRef {
            state: &slot.state,
            version: S::VERSION,
        };
        match serde_json::to_string(&blob) {
            Ok(value) => self.writer.enqueue(key, value),
            Err(e) => tracing::warn!(key = %key, "Failed to serialize state: {}", e),
        }
    }

    /// Re-target the store at `namespace` and reload its state.
    ///
    /// Returns `false` when a newer rehydrate superseded this one, in which
    /// case the loaded data was discarded.
    pub async fn rehydrate(&self, namespace: Namespace) -> bool {
        let generation = {
            let mut slot = self.lock();
            slot.generation += 1;
            slot.generation
        };

        // Pending writes may target the namespace we are about to read.
        self.writer.flush().await;
        let mut state = self.load(&namespace).await;
        state.after_rehydrate();

        let mut slot = self.lock();
        if slot.generation != generation {
            tracing::debug!(
                prefix = S::PREFIX,
                namespace = %namespace,
                "Discarding superseded rehydrate"
            );
            return false;
        }
        tracing::info!(prefix = S::PREFIX, namespace = %namespace, "Store rehydrated");
        slot.namespace = namespace;
        slot.state = state;
        true
    }

    async fn load(&self, namespace: &Namespace) -> S {
        let key = namespace.storage_key(S::PREFIX);
        let raw = match self.storage.get(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return S::default(),
            Err(e) => {
                tracing::warn!(key = %key, "Failed to read state, starting empty: {}", e);
                return S::default();
            }
        };

        let blob: Blob = match serde_json::from_str(&raw) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(key = %key, "Unreadable state blob, starting empty: {}", e);
                return S::default();
            }
        };
        if blob.version > S::VERSION {
            tracing::warn!(
                key = %key,
                version = blob.version,
                "State blob is newer than supported, starting empty"
            );
            return S::default();
        }

        serde_json::from_value(blob.state).unwrap_or_else(|e| {
            tracing::warn!(key = %key, "Unreadable state, starting empty: {}", e);
            S::default()
        })
    }

    /// Wait until every queued write has been attempted.
    pub async fn flush(&self) {
        self.writer.flush().await;
    }
}

/// Headline numbers across both stores.
pub fn progress_metrics(treatments: &TreatmentStore, progress: &ProgressStore) -> ProgressMetrics {
    let today = treatments.today_progress();
    let this_week = progress.current_week();
    ProgressMetrics {
        streak_days: treatments.streak_days(),
        done_today: today.done,
        total_today: today.total,
        adherence_pct: today.adherence_pct,
        photo_count: progress.photo_count(),
        checked_in_this_week: progress.check_for_week(this_week).is_some(),
    }
}

/// `base`, or `base-<n>` with the smallest `n` that is not taken.
pub(crate) fn unique_id(base: String, taken: impl Fn(&str) -> bool) -> String {
    if !taken(&base) {
        return base;
    }
    (1u32..)
        .map(|n| format!("{}-{}", base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Counter {
        value: u32,
        #[serde(skip)]
        reloaded: bool,
    }

    impl Persist for Counter {
        const PREFIX: &'static str = "test-counter";
        const VERSION: u32 = 1;

        fn after_rehydrate(&mut self) {
            self.reloaded = true;
        }
    }

    fn user(id: &str) -> Namespace {
        Namespace::User(id.to_string())
    }

    #[tokio::test]
    async fn test_update_persists_under_namespace_key() {
        let storage = Arc::new(MemoryStore::new());
        let store = PersistedStore::<Counter>::new(storage.clone(), user("a"));

        store.update(|c| c.value = 7);
        store.flush().await;

        let raw = storage.get("test-counter-user-a").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["state"]["value"], 7);
        assert_eq!(value["version"], 1);
    }

    #[tokio::test]
    async fn test_rehydrate_switches_namespace() {
        let storage = Arc::new(MemoryStore::new());
        let store = PersistedStore::<Counter>::new(storage.clone(), user("a"));
        store.update(|c| c.value = 3);

        assert!(store.rehydrate(user("b")).await);
        assert_eq!(store.namespace(), user("b"));
        assert_eq!(store.read(|c| c.value), 0);
        assert!(store.read(|c| c.reloaded));

        store.update(|c| c.value = 9);
        assert!(store.rehydrate(user("a")).await);
        assert_eq!(store.read(|c| c.value), 3);
    }

    #[tokio::test]
    async fn test_unreadable_or_newer_blobs_start_empty() {
        let storage = Arc::new(MemoryStore::new());
        storage.set("test-counter-anon", "not json").await.unwrap();
        storage
            .set("test-counter-user-x", r#"{"state":{"value":5},"version":2}"#)
            .await
            .unwrap();

        let store = PersistedStore::<Counter>::new(storage.clone(), Namespace::Anonymous);
        assert!(store.rehydrate(Namespace::Anonymous).await);
        assert_eq!(store.read(|c| c.value), 0);

        assert!(store.rehydrate(user("x")).await);
        assert_eq!(store.read(|c| c.value), 0);
        // Left untouched until the next mutation.
        assert!(storage
            .get("test-counter-user-x")
            .await
            .unwrap()
            .unwrap()
            .contains("\"version\":2"));
    }

    #[tokio::test]
    async fn test_last_rehydrate_wins() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set("test-counter-user-a", r#"{"state":{"value":1},"version":1}"#)
            .await
            .unwrap();
        storage
            .set("test-counter-user-b", r#"{"state":{"value":2},"version":1}"#)
            .await
            .unwrap();
        let store = PersistedStore::<Counter>::new(storage, Namespace::Anonymous);

        let (first, second) = tokio::join!(store.rehydrate(user("a")), store.rehydrate(user("b")));

        assert!(!first);
        assert!(second);
        assert_eq!(store.namespace(), user("b"));
        assert_eq!(store.read(|c| c.value), 2);
    }

    #[tokio::test]
    async fn test_progress_metrics() {
        use crate::models::{CheckAnswers, NewTreatment};
        use crate::rollover::ManualClock;

        let storage = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(
            chrono::NaiveDate::from_ymd_opt(2026, 10, 17).unwrap(),
        ));
        let treatments = TreatmentStore::new(storage.clone(), clock.clone(), Namespace::Anonymous);
        let progress = ProgressStore::new(storage, clock, Namespace::Anonymous);

        let a = treatments.add(NewTreatment::daily("A", "07:00"));
        treatments.add(NewTreatment::daily("B", "08:00"));
        treatments.toggle_today(&a.id);
        progress.upsert_check(progress.current_week(), CheckAnswers::default());

        assert_eq!(
            progress_metrics(&treatments, &progress),
            ProgressMetrics {
                streak_days: 0,
                done_today: 1,
                total_today: 2,
                adherence_pct: 50,
                photo_count: 0,
                checked_in_this_week: true,
            }
        );
    }

    #[test]
    fn test_unique_id() {
        let taken = ["p-1", "p-1-1"];
        assert_eq!(unique_id("p-2".into(), |id| taken.contains(&id)), "p-2");
        assert_eq!(unique_id("p-1".into(), |id| taken.contains(&id)), "p-1-2");
    }
}
