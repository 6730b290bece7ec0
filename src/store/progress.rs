//! Progress store: photo timeline and weekly check-ins.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{unique_id, Persist, PersistedStore};
use crate::db::KeyValueStore;
use crate::errors::AppError;
use crate::models::{
    CheckAnswers, Namespace, NewPhoto, ProgressPhoto, ProgressSnapshot, WeekLabel, WeeklyCheck,
};
use crate::picker::{ImagePicker, PickResult, PHOTO_PERMISSION_MESSAGE};
use crate::rollover::Clock;

/// Persisted state of the progress store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    #[serde(default)]
    pub photos: Vec<ProgressPhoto>,
    #[serde(default)]
    pub checks: Vec<WeeklyCheck>,
}

impl Persist for ProgressState {
    const PREFIX: &'static str = "keepr-progress";
    const VERSION: u32 = 1;
}

/// What happened when adding a photo through the picker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhotoPickOutcome {
    Added(ProgressPhoto),
    Cancelled,
    /// Nothing was added; `message` is meant for the user
    Denied { message: String },
}

/// Photos and weekly checks for the current user.
pub struct ProgressStore {
    inner: PersistedStore<ProgressState>,
    clock: Arc<dyn Clock>,
}

impl ProgressStore {
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

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.inner.read(|s| ProgressSnapshot {
            photos: s.photos.clone(),
            checks: s.checks.clone(),
        })
    }

    pub fn photo_count(&self) -> usize {
        self.inner.read(|s| s.photos.len())
    }

    /// Week label for the clock's current date.
    pub fn current_week(&self) -> WeekLabel {
        WeekLabel::of(self.clock.today())
    }

    /// Prepend a photo. The date defaults to today.
    pub fn add_photo(&self, new: NewPhoto) -> ProgressPhoto {
        let millis = self.clock.now_millis();
        let date = new.date.unwrap_or_else(|| self.clock.today());

        let photo = self.inner.update(|s| {
            let id = unique_id(format!("p-{}", millis), |id| {
                s.photos.iter().any(|p| p.id == id)
            });
            let photo = ProgressPhoto {
                id,
                uri: new.uri,
                date,
                note: new.note,
            };
            s.photos.insert(0, photo.clone());
            photo
        });

        tracing::debug!(id = %photo.id, "Photo added");
        photo
    }

    /// Ask the picker for an image and add it as today's photo.
    pub async fn add_photo_from_picker(
        &self,
        picker: &dyn ImagePicker,
        note: Option<String>,
    ) -> Result<PhotoPickOutcome, AppError> {
        match picker.pick_image().await? {
            PickResult::Picked(uri) => Ok(PhotoPickOutcome::Added(self.add_photo(NewPhoto {
                uri,
                date: None,
                note,
            }))),
            PickResult::Cancelled => Ok(PhotoPickOutcome::Cancelled),
            PickResult::PermissionDenied => {
                tracing::info!("Photo library permission denied");
                Ok(PhotoPickOutcome::Denied {
                    message: PHOTO_PERMISSION_MESSAGE.to_string(),
                })
            }
        }
    }

    /// Remove a photo. Returns whether it existed.
    pub fn remove_photo(&self, id: &str) -> bool {
        if !self.inner.read(|s| s.photos.iter().any(|p| p.id == id)) {
            return false;
        }
        self.inner.update(|s| s.photos.retain(|p| p.id != id));
        true
    }

    /// Insert or replace the check for `week_of`. An existing record keeps its
    /// id and position; a new one goes first.
    pub fn upsert_check(&self, week_of: WeekLabel, answers: CheckAnswers) -> WeeklyCheck {
        self.inner.update(|s| {
            if let Some(existing) = s.checks.iter_mut().find(|c| c.week_of == week_of) {
                existing.answers = answers;
                return existing.clone();
            }
            let check = WeeklyCheck {
                id: format!("w-{}", week_of),
                week_of,
                answers,
            };
            s.checks.insert(0, check.clone());
            check
        })
    }

    pub fn check_for_week(&self, week_of: WeekLabel) -> Option<WeeklyCheck> {
        self.inner
            .read(|s| s.checks.iter().find(|c| c.week_of == week_of).cloned())
    }

    /// Drop every photo and check.
    pub fn clear_all(&self) {
        self.inner.update(|s| *s = ProgressState::default());
        tracing::info!(namespace = %self.namespace(), "Progress cleared");
    }

    /// Re-point at `namespace` and reload.
    pub async fn rehydrate_for(&self, namespace: Namespace) -> bool {
        self.inner.rehydrate(namespace).await
    }

    pub async fn flush(&self) {
        self.inner.flush().await;
    }
}
