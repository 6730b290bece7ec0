//! Treatment store: the canonical treatment list, the derived today view and
//! the streak counter.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{unique_id, Persist, PersistedStore};
use crate::db::KeyValueStore;
use crate::models::{
    Namespace, NewTreatment, TodayItem, TodayProgress, Treatment, TreatmentSnapshot,
};
use crate::rollover::Clock;

/// Persisted state of the treatment store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TreatmentState {
    #[serde(default)]
    pub treatments: Vec<Treatment>,
    #[serde(default)]
    pub today: Vec<TodayItem>,
    #[serde(default)]
    pub streak_days: u32,
    #[serde(default)]
    pub streak_marked_for: Option<NaiveDate>,
}

impl TreatmentState {
    /// Regenerate today from the treatment list with every item undone.
    fn rebuild_today(&mut self) {
        self.today = self
            .treatments
            .iter()
            .map(|t| TodayItem {
                id: t.id.clone(),
                done: false,
                time: t.time.clone(),
            })
            .collect();
    }

    /// Flip one item and settle the streak credit for `date`.
    fn toggle(&mut self, id: &str, date: NaiveDate) -> Option<TodayItem> {
        let item = self.today.iter_mut().find(|item| item.id == id)?;
        item.done = !item.done;
        let toggled = item.clone();

        let all_done = !self.today.is_empty() && self.today.iter().all(|item| item.done);
        let credited_today = self.streak_marked_for == Some(date);

        if all_done && !credited_today {
            self.streak_days += 1;
            self.streak_marked_for = Some(date);
        } else if !all_done && credited_today {
            self.streak_days = self.streak_days.saturating_sub(1);
            self.streak_marked_for = None;
        }

        Some(toggled)
    }
}

impl Persist for TreatmentState {
    const PREFIX: &'static str = "keepr-store";
    const VERSION: u32 = 1;

    fn after_rehydrate(&mut self) {
        self.rebuild_today();
    }
}

/// Treatments, today's checklist and streak for the current user.
pub struct TreatmentStore {
    inner: PersistedStore<TreatmentState>,
    clock: Arc<dyn Clock>,
}

impl TreatmentStore {
    pub fn new(
        storage: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        namespace: Namespace,
    ) -> Self {
        Self {
            inner: PersistedStore::new(storage, namespace),
            clock,
        }
    }

    pub fn namespace(&self) -> Namespace {
        self.inner.namespace()
    }

    pub fn snapshot(&self) -> TreatmentSnapshot {
        self.inner.read(|s| TreatmentSnapshot {
            treatments: s.treatments.clone(),
            today: s.today.clone(),
            streak_days: s.streak_days,
            streak_marked_for: s.streak_marked_for,
        })
    }

    pub fn treatments(&self) -> Vec<Treatment> {
        self.inner.read(|s| s.treatments.clone())
    }

    pub fn today(&self) -> Vec<TodayItem> {
        self.inner.read(|s| s.today.clone())
    }

    pub fn streak_days(&self) -> u32 {
        self.inner.read(|s| s.streak_days)
    }

    pub fn today_progress(&self) -> TodayProgress {
        self.inner.read(|s| TodayProgress::from_items(&s.today))
    }

    /// Add a treatment at the front of the list and rebuild today.
    pub fn add(&self, new: NewTreatment) -> Treatment {
        let millis = self.clock.now_millis();
        let treatment = self.inner.update(|s| {
            let name = if new.name.is_empty() {
                "custom"
            } else {
                new.name.as_str()
            };
            let base = format!("{}-{}-{}", name, new.time, millis);
            let id = unique_id(base, |id| s.treatments.iter().any(|t| t.id == id));

            let treatment = Treatment {
                id,
                name: new.name,
                time: new.time,
                dose: new.dose,
                frequency: new.frequency,
                days: new.days,
                reminder: new.reminder,
            };
            s.treatments.insert(0, treatment.clone());
            s.rebuild_today();
            treatment
        });

        tracing::debug!(id = %treatment.id, "Treatment added");
        treatment
    }

    /// Remove a treatment and rebuild today. Returns whether it existed.
    /// Unknown ids change nothing and write nothing.
    pub fn remove(&self, id: &str) -> bool {
        let exists = self.inner.read(|s| s.treatments.iter().any(|t| t.id == id));
        if !exists {
            tracing::debug!(id, "Treatment remove skipped, unknown id");
            return false;
        }

        self.inner.update(|s| {
            s.treatments.retain(|t| t.id != id);
            s.rebuild_today();
        });
        tracing::debug!(id, "Treatment removed");
        true
    }

    /// Flip a today item. Returns the item after the flip, or `None` when no
    /// item has that id (nothing changes then).
    pub fn toggle_today(&self, id: &str) -> Option<TodayItem> {
        let date = self.clock.today();
        let exists = self.inner.read(|s| s.today.iter().any(|item| item.id == id));
        if !exists {
            return None;
        }
        self.inner.update(|s| s.toggle(id, date))
    }

    /// Regenerate today from the treatment list, leaving the streak alone.
    pub fn rebuild_today(&self) {
        self.inner.update(TreatmentState::rebuild_today);
    }

    /// Drop every treatment and reset the streak.
    pub fn clear_all(&self) {
        self.inner.update(|s| *s = TreatmentState::default());
        tracing::info!(namespace = %self.namespace(), "Treatments cleared");
    }

    /// Re-point at `namespace`, reload and rebuild today.
    pub async fn rehydrate_for(&self, namespace: Namespace) -> bool {
        self.inner.rehydrate(namespace).await
    }

    pub async fn flush(&self) {
        self.inner.flush().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::DoseUnit;
    use crate::rollover::ManualClock;
    use std::collections::HashSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn setup() -> (TreatmentStore, Arc<ManualClock>, Arc<MemoryStore>) {
        let storage = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(date(2026, 10, 17)));
        let store = TreatmentStore::new(storage.clone(), clock.clone(), Namespace::Anonymous);
        (store, clock, storage)
    }

    fn assert_today_mirrors_treatments(store: &TreatmentStore) {
        let snapshot = store.snapshot();
        let treatment_ids: Vec<_> = snapshot.treatments.iter().map(|t| t.id.clone()).collect();
        let today_ids: Vec<_> = snapshot.today.iter().map(|i| i.id.clone()).collect();
        assert_eq!(treatment_ids, today_ids);
        assert!(snapshot.today.iter().all(|item| !item.done));
    }

    #[tokio::test]
    async fn test_streak_scenario() {
        let (store, clock, _) = setup();

        let minoxidil = store.add(NewTreatment::daily("Minoxidil", "08:00"));
        assert_eq!(
            store.today(),
            vec![TodayItem {
                id: minoxidil.id.clone(),
                done: false,
                time: "08:00".into()
            }]
        );

        let item = store.toggle_today(&minoxidil.id).unwrap();
        assert!(item.done);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.streak_days, 1);
        assert_eq!(snapshot.streak_marked_for, Some(clock.today()));

        let item = store.toggle_today(&minoxidil.id).unwrap();
        assert!(!item.done);
        let snapshot = store.snapshot();
        assert_eq!(snapshot.streak_days, 0);
        assert_eq!(snapshot.streak_marked_for, None);

        store.add(NewTreatment::daily("Finasteride", "21:00"));
        let snapshot = store.snapshot();
        assert_eq!(snapshot.today.len(), 2);
        assert!(snapshot.today.iter().all(|item| !item.done));
        assert_eq!(snapshot.streak_days, 0);
        assert_eq!(snapshot.today[0].time, "21:00");
    }

    #[tokio::test]
    async fn test_today_mirrors_treatments_after_every_mutation() {
        let (store, _, _) = setup();

        let a = store.add(NewTreatment::daily("A", "07:00"));
        assert_today_mirrors_treatments(&store);
        let b = store.add(NewTreatment::daily("B", "08:00"));
        store.toggle_today(&a.id);
        let c = store.add(NewTreatment::daily("C", "09:00"));
        assert_today_mirrors_treatments(&store);
        store.toggle_today(&c.id);
        assert!(store.remove(&b.id));
        assert_today_mirrors_treatments(&store);
        store.toggle_today(&c.id);
        let before = store.snapshot();
        assert!(!store.remove(&b.id));
        assert_eq!(store.snapshot(), before);
        store.toggle_today(&c.id);
        assert!(store.remove(&a.id));
        assert!(store.remove(&c.id));
        assert_today_mirrors_treatments(&store);
        assert!(store.today().is_empty());
    }

    #[tokio::test]
    async fn test_credit_is_idempotent_within_a_day() {
        let (store, _, _) = setup();
        let a = store.add(NewTreatment::daily("A", "07:00"));
        let b = store.add(NewTreatment::daily("B", "08:00"));

        store.toggle_today(&a.id);
        assert_eq!(store.streak_days(), 0);
        store.toggle_today(&b.id);
        assert_eq!(store.streak_days(), 1);

        store.toggle_today(&a.id);
        assert_eq!(store.streak_days(), 0);
        store.toggle_today(&a.id);
        assert_eq!(store.streak_days(), 1);
        store.toggle_today(&b.id);
        store.toggle_today(&b.id);
        assert_eq!(store.streak_days(), 1);
    }

    #[tokio::test]
    async fn test_rollover_keeps_credit_and_counts_next_day() {
        let (store, clock, _) = setup();
        let a = store.add(NewTreatment::daily("A", "07:00"));

        store.toggle_today(&a.id);
        assert_eq!(store.streak_days(), 1);

        clock.advance_days(1);
        store.rebuild_today();
        let snapshot = store.snapshot();
        assert!(snapshot.today.iter().all(|item| !item.done));
        assert_eq!(snapshot.streak_days, 1);
        assert_eq!(snapshot.streak_marked_for, Some(date(2026, 10, 17)));

        store.toggle_today(&a.id);
        assert_eq!(store.streak_days(), 2);
        store.toggle_today(&a.id);
        assert_eq!(store.streak_days(), 1);
    }

    #[tokio::test]
    async fn test_missed_day_does_not_reset_streak() {
        let (store, clock, _) = setup();
        let a = store.add(NewTreatment::daily("A", "07:00"));
        store.toggle_today(&a.id);

        clock.advance_days(2);
        store.rebuild_today();
        assert_eq!(store.streak_days(), 1);
    }

    #[tokio::test]
    async fn test_toggle_unknown_id_is_noop() {
        let (store, _, _) = setup();
        let a = store.add(NewTreatment::daily("A", "07:00"));
        store.toggle_today(&a.id);
        store.remove(&a.id);

        assert_eq!(store.toggle_today("missing"), None);
        assert_eq!(store.streak_days(), 1);
    }

    #[tokio::test]
    async fn test_remove_unknown_id_keeps_today_and_storage() {
        let (store, _, storage) = setup();
        let minoxidil = store.add(NewTreatment::daily("Minoxidil", "08:00"));
        store.toggle_today(&minoxidil.id);
        store.flush().await;
        let key = Namespace::Anonymous.storage_key(TreatmentState::PREFIX);
        let stored = storage.get(&key).await.unwrap();

        let before = store.snapshot();
        assert!(!store.remove("missing"));
        store.flush().await;

        assert_eq!(store.snapshot(), before);
        assert!(store.today()[0].done);
        assert_eq!(store.streak_days(), 1);
        assert_eq!(storage.get(&key).await.unwrap(), stored);
    }

    #[tokio::test]
    async fn test_ids_are_unique_with_a_frozen_clock() {
        let (store, clock, _) = setup();
        clock.freeze_millis(1_000);

        let ids: HashSet<_> = (0..5)
            .map(|_| store.add(NewTreatment::daily("Minoxidil", "08:00")).id)
            .collect();
        assert_eq!(ids.len(), 5);
        assert!(ids.contains("Minoxidil-08:00-1000"));
        assert!(ids.contains("Minoxidil-08:00-1000-1"));

        let unnamed = store.add(NewTreatment::daily("", "09:00"));
        assert_eq!(unnamed.id, "custom-09:00-1000");
    }

    #[tokio::test]
    async fn test_namespace_round_trip_is_lossless() {
        let (store, _, _) = setup();
        let a = Namespace::User("a".into());
        let b = Namespace::User("b".into());

        store.rehydrate_for(a.clone()).await;
        store.add(NewTreatment::daily("Minoxidil", "08:00"));
        store.add(NewTreatment::daily("Finasteride", "21:00").with_dose(1.0, DoseUnit::Mg));
        let before = store.treatments();

        store.rehydrate_for(b.clone()).await;
        assert!(store.treatments().is_empty());
        assert_eq!(store.namespace(), b);

        store.rehydrate_for(a.clone()).await;
        assert_eq!(store.treatments(), before);
        assert_today_mirrors_treatments(&store);
    }

    #[tokio::test]
    async fn test_rehydrate_resets_today_but_keeps_streak() {
        let (store, _, storage) = setup();
        let a = store.add(NewTreatment::daily("A", "07:00"));
        store.toggle_today(&a.id);
        store.flush().await;

        let raw = storage.get("keepr-store-anon").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["state"]["streakDays"], 1);
        assert_eq!(value["state"]["streakMarkedFor"], "2026-10-17");
        assert_eq!(value["state"]["today"][0]["done"], true);

        store.rehydrate_for(Namespace::Anonymous).await;
        assert_eq!(store.streak_days(), 1);
        assert!(store.today().iter().all(|item| !item.done));
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (store, _, _) = setup();
        let a = store.add(NewTreatment::daily("A", "07:00"));
        store.toggle_today(&a.id);

        store.clear_all();
        assert_eq!(store.snapshot(), TreatmentSnapshot {
            treatments: vec![],
            today: vec![],
            streak_days: 0,
            streak_marked_for: None,
        });
    }

    #[tokio::test]
    async fn test_today_progress() {
        let (store, _, _) = setup();
        let a = store.add(NewTreatment::daily("A", "07:00"));
        store.add(NewTreatment::daily("B", "08:00"));
        store.toggle_today(&a.id);

        let progress = store.today_progress();
        assert_eq!((progress.done, progress.total, progress.adherence_pct), (1, 2, 50));
    }
}
