//! Subscriber registry
//!
//! Maps a resource id to the callbacks registered for it, in registration
//! order. Dispatch iterates a snapshot taken under the lock and runs the
//! callbacks with the lock released, so a callback may subscribe or
//! unsubscribe freely. Each subscriber carries an active flag that removal
//! clears: a callback removed mid-dispatch is skipped for the rest of that
//! dispatch and never invoked again.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::websocket::PushMessage;

/// Callback invoked for each push on a subscribed resource
pub type Callback = Arc<dyn Fn(&PushMessage) + Send + Sync>;

/// Identifies one registered callback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What `remove` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Nothing registered under that id
    NotFound,
    /// Removed; other callbacks remain for the resource
    Removed,
    /// Removed the last callback for the resource
    Last,
}

struct Subscriber {
    id: SubscriptionId,
    active: AtomicBool,
    callback: Callback,
}

#[derive(Default)]
pub struct SubscriberRegistry {
    entries: Mutex<HashMap<String, Vec<Arc<Subscriber>>>>,
    // Never reset, so handles from before a `clear` cannot match new entries
    next_id: AtomicU64,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<Arc<Subscriber>>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a callback for a resource
    ///
    /// Returns its id and whether it is the first callback for the resource.
    pub fn register(&self, resource: &str, callback: Callback) -> (SubscriptionId, bool) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let subscriber = Arc::new(Subscriber {
            id,
            active: AtomicBool::new(true),
            callback,
        });

        let mut entries = self.entries();
        let list = entries.entry(resource.to_string()).or_default();
        list.push(subscriber);
        (id, list.len() == 1)
    }

    /// Remove one callback, leaving the others for the resource in place
    pub fn remove(&self, resource: &str, id: SubscriptionId) -> Removal {
        let mut entries = self.entries();
        let Some(list) = entries.get_mut(resource) else {
            return Removal::NotFound;
        };
        let Some(index) = list.iter().position(|s| s.id == id) else {
            return Removal::NotFound;
        };

        let subscriber = list.remove(index);
        subscriber.active.store(false, Ordering::SeqCst);

        if list.is_empty() {
            entries.remove(resource);
            Removal::Last
        } else {
            Removal::Removed
        }
    }

    /// Invoke every active callback for the message's resource, in order
    ///
    /// Returns the number of callbacks invoked.
    pub fn dispatch(&self, message: &PushMessage) -> usize {
        let snapshot: Vec<Arc<Subscriber>> = match self.entries().get(&message.resource) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut invoked = 0;
        for subscriber in snapshot {
            if subscriber.active.load(Ordering::SeqCst) {
                (subscriber.callback)(message);
                invoked += 1;
            }
        }
        invoked
    }

    /// Drop every registration; returns the resources that had subscribers
    pub fn clear(&self) -> Vec<String> {
        let drained: Vec<(String, Vec<Arc<Subscriber>>)> = self.entries().drain().collect();
        drained
            .into_iter()
            .map(|(resource, list)| {
                for subscriber in list {
                    subscriber.active.store(false, Ordering::SeqCst);
                }
                resource
            })
            .collect()
    }

    /// Resources with at least one callback
    pub fn resources(&self) -> Vec<String> {
        let mut resources: Vec<String> = self.entries().keys().cloned().collect();
        resources.sort();
        resources
    }

    pub fn subscriber_count(&self, resource: &str) -> usize {
        self.entries().get(resource).map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl fmt::Debug for SubscriberRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriberRegistry")
            .field("resources", &self.resources())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::User;
    use crate::websocket::Event;
    use chrono::Utc;
    use std::sync::Mutex as StdMutex;

    fn push(resource: &str) -> PushMessage {
        PushMessage::new(
            resource,
            Event::UserCreated(User {
                id: 1,
                name: "Test User".to_string(),
                created_at: Utc::now(),
            }),
        )
    }

    fn recorder(log: &Arc<StdMutex<Vec<&'static str>>>, tag: &'static str) -> Callback {
        let log = Arc::clone(log);
        Arc::new(move |_: &PushMessage| log.lock().unwrap().push(tag))
    }

    #[test]
    fn test_two_callbacks_in_registration_order() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let (_, first) = registry.register("users:1", recorder(&log, "a"));
        let (_, second) = registry.register("users:1", recorder(&log, "b"));
        assert!(first);
        assert!(!second);

        assert_eq!(registry.dispatch(&push("users:1")), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_dispatch_other_resource_is_noop() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        registry.register("users:1", recorder(&log, "a"));

        assert_eq!(registry.dispatch(&push("users:2")), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_remove_only_that_callback() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let (a, _) = registry.register("users:1", recorder(&log, "a"));
        let (b, _) = registry.register("users:1", recorder(&log, "b"));

        assert_eq!(registry.remove("users:1", a), Removal::Removed);
        assert_eq!(registry.remove("users:1", a), Removal::NotFound);
        registry.dispatch(&push("users:1"));
        assert_eq!(*log.lock().unwrap(), vec!["b"]);

        assert_eq!(registry.remove("users:1", b), Removal::Last);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unsubscribe_during_dispatch() {
        let registry = Arc::new(SubscriberRegistry::new());
        let log = Arc::new(StdMutex::new(Vec::new()));
        let victim: Arc<StdMutex<Option<SubscriptionId>>> = Arc::new(StdMutex::new(None));

        // First callback removes the third one
        let remover = {
            let registry = Arc::clone(&registry);
            let victim = Arc::clone(&victim);
            let log = Arc::clone(&log);
            Arc::new(move |_: &PushMessage| {
                log.lock().unwrap().push("remover");
                if let Some(id) = victim.lock().unwrap().take() {
                    registry.remove("users:1", id);
                }
            }) as Callback
        };
        registry.register("users:1", remover);
        registry.register("users:1", recorder(&log, "middle"));
        let (third, _) = registry.register("users:1", recorder(&log, "third"));
        *victim.lock().unwrap() = Some(third);

        assert_eq!(registry.dispatch(&push("users:1")), 2);
        assert_eq!(*log.lock().unwrap(), vec!["remover", "middle"]);

        log.lock().unwrap().clear();
        registry.dispatch(&push("users:1"));
        assert_eq!(*log.lock().unwrap(), vec!["remover", "middle"]);
    }

    #[test]
    fn test_subscribe_during_dispatch_waits_for_next_push() {
        let registry = Arc::new(SubscriberRegistry::new());
        let log = Arc::new(StdMutex::new(Vec::new()));

        let adder = {
            let registry = Arc::clone(&registry);
            let log = Arc::clone(&log);
            Arc::new(move |_: &PushMessage| {
                let log = Arc::clone(&log);
                registry.register(
                    "users:1",
                    Arc::new(move |_: &PushMessage| log.lock().unwrap().push("late")),
                );
            }) as Callback
        };
        registry.register("users:1", adder);

        registry.dispatch(&push("users:1"));
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(registry.subscriber_count("users:1"), 2);
    }

    #[test]
    fn test_clear_deactivates_everything() {
        let registry = SubscriberRegistry::new();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let (old, _) = registry.register("users:1", recorder(&log, "a"));
        registry.register("sets:2", recorder(&log, "b"));

        let mut cleared = registry.clear();
        cleared.sort();
        assert_eq!(cleared, vec!["sets:2", "users:1"]);
        assert_eq!(registry.dispatch(&push("users:1")), 0);

        // Ids keep counting after a clear
        let (new, _) = registry.register("users:1", recorder(&log, "c"));
        assert_ne!(old, new);
        assert_eq!(registry.remove("users:1", old), Removal::NotFound);
    }
}
