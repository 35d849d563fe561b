use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info, warn};

use crate::membership::MembershipService;
use crate::metrics;
use crate::models::{MembershipNotification, ReservationReminder};
use crate::persist::Storage;

/// Storage key for the persisted reminder collection.
pub const REMINDER_STORAGE_KEY: &str = "reservation_reminders";

const REMINDER_STORAGE_VERSION: u32 = 1;

/// Anything a notification store can hold: identified, timestamped, with a
/// monotonic read flag.
pub trait NotificationRecord: Clone + Send + Sync + 'static {
    fn id(&self) -> &str;
    fn is_read(&self) -> bool;
    fn set_read(&mut self);
    fn timestamp(&self) -> DateTime<Utc>;
}

impl NotificationRecord for MembershipNotification {
    fn id(&self) -> &str {
        &self.id
    }
    fn is_read(&self) -> bool {
        self.read
    }
    fn set_read(&mut self) {
        self.read = true;
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl NotificationRecord for ReservationReminder {
    fn id(&self) -> &str {
        &self.id
    }
    fn is_read(&self) -> bool {
        self.read
    }
    fn set_read(&mut self) {
        self.read = true;
    }
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Change notification pushed to subscribers after each effective mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Loaded { count: usize },
    Added { id: String },
    MarkedRead,
    Deleted { id: String },
    Cleared,
}

/// In-memory ordered collection with read/delete/clear mutations and an
/// observer interface. Locks are held only for the duration of a mutation,
/// never across an await point.
pub struct StoreCore<T: NotificationRecord> {
    items: Mutex<Vec<T>>,
    subscribers: Mutex<Vec<UnboundedSender<StoreEvent>>>,
}

impl<T: NotificationRecord> StoreCore<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.items.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn unread_count(&self) -> usize {
        self.items
            .lock()
            .unwrap()
            .iter()
            .filter(|item| !item.is_read())
            .count()
    }

    /// Register an observer. The receiver sees every subsequent effective
    /// mutation; dropped receivers are pruned on the next notify.
    pub fn subscribe(&self) -> UnboundedReceiver<StoreEvent> {
        let (sender, receiver) = mpsc::unbounded_channel();
        self.subscribers.lock().unwrap().push(sender);
        receiver
    }

    fn notify(&self, event: StoreEvent) {
        self.subscribers
            .lock()
            .unwrap()
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Replace the collection with a fresh snapshot, keeping the local read
    /// flag for any item that was already read. Mutations issued while a
    /// fetch was in flight are merged per id rather than discarded.
    pub fn replace_preserving_read(&self, incoming: Vec<T>) -> usize {
        let count = incoming.len();
        {
            let mut items = self.items.lock().unwrap();
            let mut merged = incoming;
            for item in merged.iter_mut() {
                if !item.is_read()
                    && items
                        .iter()
                        .any(|local| local.id() == item.id() && local.is_read())
                {
                    item.set_read();
                }
            }
            *items = merged;
        }
        self.notify(StoreEvent::Loaded { count });
        count
    }

    pub fn replace_all(&self, incoming: Vec<T>) -> usize {
        let count = incoming.len();
        *self.items.lock().unwrap() = incoming;
        self.notify(StoreEvent::Loaded { count });
        count
    }

    pub fn add(&self, item: T) {
        let id = item.id().to_string();
        self.items.lock().unwrap().push(item);
        self.notify(StoreEvent::Added { id });
    }

    /// Mark the given ids read; absent ids are silently ignored. Returns the
    /// ids that actually changed.
    pub fn mark_read(&self, ids: &[String]) -> Vec<String> {
        let changed: Vec<String> = {
            let mut items = self.items.lock().unwrap();
            items
                .iter_mut()
                .filter(|item| !item.is_read() && ids.iter().any(|id| id.as_str() == item.id()))
                .map(|item| {
                    item.set_read();
                    item.id().to_string()
                })
                .collect()
        };
        if !changed.is_empty() {
            self.notify(StoreEvent::MarkedRead);
        }
        changed
    }

    /// Mark everything read. Returns how many items changed.
    pub fn mark_all_read(&self) -> usize {
        let changed = {
            let mut items = self.items.lock().unwrap();
            let unread: Vec<&mut T> = items.iter_mut().filter(|item| !item.is_read()).collect();
            let count = unread.len();
            for item in unread {
                item.set_read();
            }
            count
        };
        if changed > 0 {
            self.notify(StoreEvent::MarkedRead);
        }
        changed
    }

    /// Remove the item with the given id. No-op when absent.
    pub fn delete(&self, id: &str) -> bool {
        let removed = {
            let mut items = self.items.lock().unwrap();
            let before = items.len();
            items.retain(|item| item.id() != id);
            items.len() < before
        };
        if removed {
            self.notify(StoreEvent::Deleted { id: id.to_string() });
        }
        removed
    }

    /// Empty the collection. Returns how many items were removed.
    pub fn clear(&self) -> usize {
        let removed = {
            let mut items = self.items.lock().unwrap();
            let count = items.len();
            items.clear();
            count
        };
        if removed > 0 {
            self.notify(StoreEvent::Cleared);
        }
        removed
    }
}

impl<T: NotificationRecord> Default for StoreCore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Mirror of the remote membership-notification collection. Local state is
/// the source of truth for responsiveness; every effective mutation also
/// dispatches the corresponding remote write fire-and-forget.
pub struct MembershipStore {
    core: StoreCore<MembershipNotification>,
    service: Arc<dyn MembershipService>,
    user_id: String,
}

impl MembershipStore {
    pub fn new(service: Arc<dyn MembershipService>, user_id: impl Into<String>) -> Self {
        Self {
            core: StoreCore::new(),
            service,
            user_id: user_id.into(),
        }
    }

    /// Fetch the remote collection and merge it per id into the local
    /// snapshot. A failed fetch keeps whatever is already loaded.
    pub async fn load(&self) {
        match self.service.fetch(&self.user_id).await {
            Ok(remote) => {
                let count = self.core.replace_preserving_read(remote);
                debug!(count, "Loaded membership notifications");
            }
            Err(e) => {
                warn!(error = %e, "Membership notification fetch failed, keeping local snapshot");
            }
        }
    }

    pub fn items(&self) -> Vec<MembershipNotification> {
        self.core.items()
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn unread_count(&self) -> usize {
        self.core.unread_count()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<StoreEvent> {
        self.core.subscribe()
    }

    pub fn mark_read(&self, ids: &[String]) {
        let changed = self.core.mark_read(ids);
        if changed.is_empty() {
            return;
        }
        let service = Arc::clone(&self.service);
        tokio::spawn(async move {
            let results =
                futures::future::join_all(changed.iter().map(|id| service.mark_read(id))).await;
            for (id, result) in changed.iter().zip(results) {
                if let Err(e) = result {
                    metrics::MEMBERSHIP_SYNC_FAILURES.inc();
                    warn!(id = %id, error = %e, "Remote mark-read failed");
                }
            }
        });
    }

    pub fn mark_all_read(&self) {
        if self.core.mark_all_read() == 0 {
            return;
        }
        let service = Arc::clone(&self.service);
        let user_id = self.user_id.clone();
        tokio::spawn(async move {
            if let Err(e) = service.mark_all_read(&user_id).await {
                metrics::MEMBERSHIP_SYNC_FAILURES.inc();
                warn!(error = %e, "Remote mark-all-read failed");
            }
        });
    }

    pub fn delete(&self, id: &str) {
        if !self.core.delete(id) {
            return;
        }
        let service = Arc::clone(&self.service);
        let id = id.to_string();
        tokio::spawn(async move {
            if let Err(e) = service.delete(&id).await {
                metrics::MEMBERSHIP_SYNC_FAILURES.inc();
                warn!(id = %id, error = %e, "Remote delete failed");
            }
        });
    }

    pub fn clear(&self) {
        if self.core.clear() == 0 {
            return;
        }
        let service = Arc::clone(&self.service);
        let user_id = self.user_id.clone();
        tokio::spawn(async move {
            if let Err(e) = service.clear(&user_id).await {
                metrics::MEMBERSHIP_SYNC_FAILURES.inc();
                warn!(error = %e, "Remote clear failed");
            }
        });
    }
}

/// Versioned envelope around the persisted reminder collection. A bare array
/// (the legacy shape) is still accepted on load.
#[derive(Serialize, Deserialize)]
struct StoredReminders {
    version: u32,
    reminders: Vec<ReservationReminder>,
}

/// Client-generated reservation reminders, persisted through the storage
/// layer under a single key. Reminders have no backend counterpart: deletes
/// and clears stay local.
pub struct ReminderStore {
    core: StoreCore<ReservationReminder>,
    storage: Arc<dyn Storage>,
}

impl ReminderStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        let store = Self {
            core: StoreCore::new(),
            storage,
        };
        store.load();
        store
    }

    /// Reload from storage. Malformed or version-mismatched content degrades
    /// to an empty collection with a warning.
    pub fn load(&self) {
        let Some(raw) = self.storage.get(REMINDER_STORAGE_KEY) else {
            self.core.replace_all(Vec::new());
            return;
        };

        let reminders = match serde_json::from_str::<StoredReminders>(&raw) {
            Ok(stored) if stored.version == REMINDER_STORAGE_VERSION => stored.reminders,
            Ok(stored) => {
                warn!(
                    version = stored.version,
                    "Unknown reminder storage version, starting empty"
                );
                Vec::new()
            }
            // Collections written before the envelope existed are a bare array
            Err(_) => match serde_json::from_str::<Vec<ReservationReminder>>(&raw) {
                Ok(reminders) => reminders,
                Err(e) => {
                    warn!(error = %e, "Persisted reminders malformed, starting empty");
                    Vec::new()
                }
            },
        };

        let count = self.core.replace_all(reminders);
        if count > 0 {
            info!(count, "Restored persisted reservation reminders");
        }
    }

    fn persist(&self) {
        let stored = StoredReminders {
            version: REMINDER_STORAGE_VERSION,
            reminders: self.core.items(),
        };
        match serde_json::to_string(&stored) {
            Ok(serialized) => self.storage.set(REMINDER_STORAGE_KEY, &serialized),
            Err(e) => warn!(error = %e, "Failed to serialize reminders"),
        }
    }

    pub fn items(&self) -> Vec<ReservationReminder> {
        self.core.items()
    }

    pub fn len(&self) -> usize {
        self.core.len()
    }

    pub fn unread_count(&self) -> usize {
        self.core.unread_count()
    }

    pub fn subscribe(&self) -> UnboundedReceiver<StoreEvent> {
        self.core.subscribe()
    }

    pub fn add(&self, reminder: ReservationReminder) {
        self.core.add(reminder);
        self.persist();
    }

    pub fn mark_read(&self, ids: &[String]) {
        if !self.core.mark_read(ids).is_empty() {
            self.persist();
        }
    }

    pub fn mark_all_read(&self) {
        if self.core.mark_all_read() > 0 {
            self.persist();
        }
    }

    pub fn delete(&self, id: &str) {
        if self.core.delete(id) {
            self.persist();
        }
    }

    pub fn clear(&self) {
        if self.core.clear() > 0 {
            self.persist();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifyError;
    use crate::models::{
        NotificationCategory, NotificationPriority, ReminderKind, ReservationSnapshot,
    };
    use crate::persist::MemoryStorage;
    use async_trait::async_trait;
    use chrono::{NaiveDate, NaiveTime, TimeZone};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    fn notification(id: &str, read: bool) -> MembershipNotification {
        MembershipNotification {
            id: id.to_string(),
            title: format!("Notification {id}"),
            message: "Your membership is due for renewal".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            read,
            category: NotificationCategory::Membership,
            priority: NotificationPriority::Medium,
            action_url: None,
            action_label: None,
            metadata: Default::default(),
        }
    }

    fn reminder(id: &str) -> ReservationReminder {
        ReservationReminder {
            id: id.to_string(),
            kind: ReminderKind::Reminder,
            title: "Upcoming reservation".to_string(),
            message: "Your Padel reservation starts in about 2 hours".to_string(),
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap(),
            read: false,
            reservation: ReservationSnapshot {
                reservation_id: format!("res-{id}"),
                activity_type: "Padel".to_string(),
                scheduled_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
                start_time: NaiveTime::from_hms_opt(12, 0, 0).unwrap(),
                end_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap(),
            },
        }
    }

    #[derive(Default)]
    struct MockMembershipService {
        remote: StdMutex<Vec<MembershipNotification>>,
        fetch_calls: AtomicUsize,
        mark_read_calls: AtomicUsize,
        mark_all_read_calls: AtomicUsize,
        delete_calls: AtomicUsize,
        clear_calls: AtomicUsize,
    }

    #[async_trait]
    impl MembershipService for MockMembershipService {
        async fn fetch(&self, _user_id: &str) -> Result<Vec<MembershipNotification>, NotifyError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.remote.lock().unwrap().clone())
        }
        async fn mark_read(&self, _id: &str) -> Result<(), NotifyError> {
            self.mark_read_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn mark_all_read(&self, _user_id: &str) -> Result<(), NotifyError> {
            self.mark_all_read_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn delete(&self, _id: &str) -> Result<(), NotifyError> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn clear(&self, _user_id: &str) -> Result<(), NotifyError> {
            self.clear_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    // Lets spawned fire-and-forget remote writes run to completion.
    async fn drain_spawned() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[test]
    fn unread_count_tracks_mutations() {
        let core: StoreCore<ReservationReminder> = StoreCore::new();
        core.add(reminder("a"));
        core.add(reminder("b"));
        core.add(reminder("c"));
        assert_eq!(core.unread_count(), 3);

        core.mark_read(&["a".to_string()]);
        assert_eq!(core.unread_count(), 2);

        // Marking the same id again changes nothing
        let changed = core.mark_read(&["a".to_string()]);
        assert!(changed.is_empty());
        assert_eq!(core.unread_count(), 2);

        core.delete("b");
        assert_eq!(core.unread_count(), 1);

        assert_eq!(core.mark_all_read(), 1);
        assert_eq!(core.unread_count(), 0);
    }

    #[test]
    fn delete_absent_id_is_a_noop() {
        let core: StoreCore<ReservationReminder> = StoreCore::new();
        core.add(reminder("a"));
        core.add(reminder("b"));
        core.add(reminder("c"));

        assert!(!core.delete("nonexistent-id"));
        assert_eq!(core.len(), 3);

        assert!(core.delete("b"));
        assert_eq!(core.len(), 2);
    }

    #[test]
    fn subscribers_observe_mutations() {
        let core: StoreCore<ReservationReminder> = StoreCore::new();
        let mut events = core.subscribe();

        core.add(reminder("a"));
        core.mark_all_read();
        core.clear();

        assert_eq!(
            events.try_recv().unwrap(),
            StoreEvent::Added {
                id: "a".to_string()
            }
        );
        assert_eq!(events.try_recv().unwrap(), StoreEvent::MarkedRead);
        assert_eq!(events.try_recv().unwrap(), StoreEvent::Cleared);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn membership_load_and_mark_all_read() {
        // Scenario A: 3 notifications, 2 unread
        let service = Arc::new(MockMembershipService::default());
        *service.remote.lock().unwrap() = vec![
            notification("n1", false),
            notification("n2", false),
            notification("n3", true),
        ];

        let store = MembershipStore::new(service.clone(), "user-1");
        store.load().await;
        assert_eq!(store.unread_count(), 2);

        store.mark_all_read();
        assert_eq!(store.unread_count(), 0);

        drain_spawned().await;
        assert_eq!(service.mark_all_read_calls.load(Ordering::SeqCst), 1);

        // A second call finds nothing unread and stays local
        store.mark_all_read();
        drain_spawned().await;
        assert_eq!(service.mark_all_read_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn membership_reload_keeps_local_read_flag() {
        let service = Arc::new(MockMembershipService::default());
        *service.remote.lock().unwrap() = vec![notification("n1", false), notification("n2", false)];

        let store = MembershipStore::new(service.clone(), "user-1");
        store.load().await;

        // Read locally; the remote copy is still unread
        store.mark_read(&["n1".to_string()]);
        drain_spawned().await;
        assert_eq!(service.mark_read_calls.load(Ordering::SeqCst), 1);

        store.load().await;
        let n1 = store.items().into_iter().find(|n| n.id == "n1").unwrap();
        assert!(n1.read, "local read flag must survive a reload");
        assert_eq!(store.unread_count(), 1);
    }

    #[tokio::test]
    async fn membership_delete_dispatches_remote_write() {
        let service = Arc::new(MockMembershipService::default());
        *service.remote.lock().unwrap() = vec![notification("n1", false)];

        let store = MembershipStore::new(service.clone(), "user-1");
        store.load().await;

        store.delete("n1");
        assert_eq!(store.len(), 0);

        // Deleting an absent id stays a local no-op
        store.delete("n1");

        drain_spawned().await;
        assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn membership_fetch_failure_degrades_to_empty() {
        struct FailingService;

        #[async_trait]
        impl MembershipService for FailingService {
            async fn fetch(
                &self,
                _user_id: &str,
            ) -> Result<Vec<MembershipNotification>, NotifyError> {
                Err(NotifyError::Parse(
                    serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
                ))
            }
            async fn mark_read(&self, _id: &str) -> Result<(), NotifyError> {
                Ok(())
            }
            async fn mark_all_read(&self, _user_id: &str) -> Result<(), NotifyError> {
                Ok(())
            }
            async fn delete(&self, _id: &str) -> Result<(), NotifyError> {
                Ok(())
            }
            async fn clear(&self, _user_id: &str) -> Result<(), NotifyError> {
                Ok(())
            }
        }

        let store = MembershipStore::new(Arc::new(FailingService), "user-1");
        store.load().await;
        assert_eq!(store.len(), 0);
        assert_eq!(store.unread_count(), 0);
    }

    #[test]
    fn reminders_round_trip_through_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());

        let store = ReminderStore::new(storage.clone());
        store.add(reminder("r1"));
        store.add(reminder("r2"));
        store.mark_read(&["r1".to_string()]);

        // A second store over the same storage sees the identical collection
        let reloaded = ReminderStore::new(storage);
        assert_eq!(reloaded.items(), store.items());
        assert_eq!(reloaded.unread_count(), 1);
    }

    #[test]
    fn invalid_persisted_json_degrades_to_empty() {
        // Scenario B
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        storage.set(REMINDER_STORAGE_KEY, "{ this is not json");

        let store = ReminderStore::new(storage.clone());
        assert_eq!(store.len(), 0);

        store.add(reminder("r1"));
        let reloaded = ReminderStore::new(storage);
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn legacy_bare_array_is_accepted() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let legacy = serde_json::to_string(&vec![reminder("r1")]).unwrap();
        storage.set(REMINDER_STORAGE_KEY, &legacy);

        let store = ReminderStore::new(storage);
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].id, "r1");
    }

    #[test]
    fn unknown_storage_version_starts_empty() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let future_version = format!(
            r#"{{"version":99,"reminders":{}}}"#,
            serde_json::to_string(&vec![reminder("r1")]).unwrap()
        );
        storage.set(REMINDER_STORAGE_KEY, &future_version);

        let store = ReminderStore::new(storage);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn reminder_clear_empties_store_and_storage() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let store = ReminderStore::new(storage.clone());
        store.add(reminder("r1"));
        store.add(reminder("r2"));

        store.clear();
        assert_eq!(store.len(), 0);

        let reloaded = ReminderStore::new(storage);
        assert_eq!(reloaded.len(), 0);
    }
}
