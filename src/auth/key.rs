//! Auth-key resolver: the namespace every persisted store is keyed by.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::db::KeyValueStore;
use crate::models::Namespace;

/// Storage key holding the last namespace key.
pub const AUTH_KEY_STORAGE_KEY: &str = "keepr-auth-key";

type Callback = Arc<dyn Fn(&Namespace) + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    entries: Vec<(u64, Callback)>,
}

/// Owns the current namespace and tells subscribers when it changes.
pub struct AuthKeyResolver {
    storage: Arc<dyn KeyValueStore>,
    current: Mutex<Option<Namespace>>,
    subscribers: Arc<Mutex<Subscribers>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AuthKeyResolver {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self {
            storage,
            current: Mutex::new(None),
            subscribers: Arc::new(Mutex::new(Subscribers::default())),
        }
    }

    /// The cached namespace, without touching storage.
    pub fn current(&self) -> Option<Namespace> {
        lock(&self.current).clone()
    }

    /// The cached namespace, else the persisted one, else anonymous.
    pub async fn resolve(&self) -> Namespace {
        if let Some(namespace) = self.current() {
            return namespace;
        }

        let loaded = match self.storage.get(AUTH_KEY_STORAGE_KEY).await {
            Ok(Some(key)) => Namespace::from_key(&key).unwrap_or_else(|| {
                tracing::warn!(key = %key, "Ignoring unrecognised auth key");
                Namespace::Anonymous
            }),
            Ok(None) => Namespace::Anonymous,
            Err(e) => {
                tracing::warn!("Failed to load auth key, using anonymous: {}", e);
                Namespace::Anonymous
            }
        };

        // A concurrent set_user wins over what we just read.
        lock(&self.current).get_or_insert(loaded).clone()
    }

    /// Switch to `user_id` (or anonymous), persist it best-effort and notify
    /// every subscriber.
    pub async fn set_user(&self, user_id: Option<&str>) -> Namespace {
        let next = Namespace::for_user(user_id);
        *lock(&self.current) = Some(next.clone());
        tracing::info!(namespace = %next, "Auth namespace set");

        if let Err(e) = self.storage.set(AUTH_KEY_STORAGE_KEY, &next.key()).await {
            tracing::warn!("Failed to persist auth key: {}", e);
        }

        let callbacks: Vec<Callback> = lock(&self.subscribers)
            .entries
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(&next);
        }

        next
    }

    /// Register `callback` for namespace changes. The subscription ends when
    /// the returned handle is dropped.
    ///
    /// This is the hook for an embedding UI shell: the [`AuthBridge`] reloads
    /// the stores itself, and a shell subscribes through
    /// `AppState::auth_key` to refresh its own views on every switch.
    ///
    /// [`AuthBridge`]: super::AuthBridge
    pub fn subscribe<F>(&self, callback: F) -> AuthKeySubscription
    where
        F: Fn(&Namespace) + Send + Sync + 'static,
    {
        let mut subscribers = lock(&self.subscribers);
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.entries.push((id, Arc::new(callback)));

        AuthKeySubscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).entries.len()
    }
}

/// Handle returned by [`AuthKeyResolver::subscribe`].
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct AuthKeySubscription {
    id: u64,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl AuthKeySubscription {
    pub fn unsubscribe(self) {}
}

impl Drop for AuthKeySubscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            lock(&subscribers).entries.retain(|(id, _)| *id != self.id);
        }
    }
}
