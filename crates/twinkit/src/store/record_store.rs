//! Generic record store backing a twin resource.

use super::pagination::{paginate, Page};
use super::StoreError;
use crate::ids::IdSequence;
use crate::metrics;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

struct StoreInner<T> {
    records: HashMap<String, T>,
    /// Pagination order. Insertion order, or ascending ID after a snapshot load.
    order: Vec<String>,
}

impl<T> StoreInner<T> {
    fn new() -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.records.clear();
        self.order.clear();
    }
}

/// Keyed, ordered, thread-safe container for one resource type.
///
/// All state sits behind a single `RwLock`: reads share it, writes take it
/// exclusively. Every listing is a copy taken under one acquisition, so callers
/// never observe a half-applied write.
pub struct RecordStore<T> {
    /// Resource name used in logs and metric labels, e.g. `customers`.
    resource: String,
    ids: IdSequence,
    inner: RwLock<StoreInner<T>>,
}

impl<T> RecordStore<T> {
    /// A store whose resource name is its ID prefix.
    pub fn new(prefix: impl Into<String>) -> Self {
        let prefix = prefix.into();
        Self::named(prefix.clone(), prefix)
    }

    /// A store for `resource` issuing IDs like `{prefix}_000001`.
    pub fn named(resource: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            ids: IdSequence::new(prefix),
            inner: RwLock::new(StoreInner::new()),
        }
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn prefix(&self) -> &str {
        self.ids.prefix()
    }

    /// Reserve a fresh ID without inserting anything.
    pub fn next_id(&self) -> String {
        self.ids.next_id()
    }

    /// Insert or overwrite. Overwrites keep their original position.
    pub fn set(&self, id: impl Into<String>, record: T) {
        let id = id.into();
        let mut inner = self.inner.write();
        if inner.records.insert(id.clone(), record).is_none() {
            inner.order.push(id);
        }
    }

    /// Reserve an ID, build the record from it and store it.
    pub fn create(&self, build: impl FnOnce(&str) -> T) -> (String, T)
    where
        T: Clone,
    {
        let id = self.next_id();
        let record = build(&id);
        self.set(id.clone(), record.clone());
        (id, record)
    }

    /// Mutate a record in place. Returns false when the ID is unknown.
    pub fn update(&self, id: &str, f: impl FnOnce(&mut T)) -> bool {
        let mut inner = self.inner.write();
        match inner.records.get_mut(id) {
            Some(record) => {
                f(record);
                true
            }
            None => false,
        }
    }

    /// Remove a record. Unknown IDs are ignored.
    pub fn delete(&self, id: &str) -> Option<T> {
        let mut inner = self.inner.write();
        let removed = inner.records.remove(id);
        if removed.is_some() {
            inner.order.retain(|existing| existing != id);
        }
        removed
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().records.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.inner.read().order.clone()
    }

    /// Clear all records and rewind the ID sequence.
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.clear();
        self.ids.reset();
        metrics::STORE_RESETS_TOTAL
            .with_label_values(&[self.resource()])
            .inc();
        debug!("Store '{}' reset", self.resource());
    }

    /// Replace all contents with `snapshot`. The new order is ascending by ID.
    ///
    /// The ID sequence is moved past every loaded ID it could have issued, so
    /// later `next_id` calls never collide with restored records.
    pub fn load_snapshot(&self, snapshot: impl IntoIterator<Item = (String, T)>) {
        let records: HashMap<String, T> = snapshot.into_iter().collect();
        let mut order: Vec<String> = records.keys().cloned().collect();
        order.sort();

        let highest = order.iter().filter_map(|id| self.ids.parse(id)).max();

        let mut inner = self.inner.write();
        inner.records = records;
        inner.order = order;
        if let Some(n) = highest {
            self.ids.advance_past(n);
        }
        info!(
            "Store '{}' loaded {} records from snapshot",
            self.resource(),
            inner.records.len()
        );
    }
}

impl<T: Clone> RecordStore<T> {
    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.read().records.get(id).cloned()
    }

    /// All records in pagination order.
    pub fn list(&self) -> Vec<T> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| inner.records.get(id).cloned())
            .collect()
    }

    /// Records matching `predicate`, in pagination order.
    pub fn filter(&self, predicate: impl Fn(&str, &T) -> bool) -> Vec<T> {
        let inner = self.inner.read();
        inner
            .order
            .iter()
            .filter_map(|id| {
                inner
                    .records
                    .get(id)
                    .filter(|record| predicate(id.as_str(), *record))
                    .cloned()
            })
            .collect()
    }

    /// One page after `cursor` (see `pagination` for the cursor rules).
    pub fn paginate(&self, cursor: &str, limit: usize) -> Page<T> {
        let inner = self.inner.read();
        paginate(&inner.order, cursor, limit, inner.records.len(), |id| {
            inner.records.get(id).cloned()
        })
    }

    /// Independent copy of the whole ID to record mapping.
    pub fn snapshot(&self) -> BTreeMap<String, T> {
        let inner = self.inner.read();
        inner
            .records
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }
}

impl<T: Clone + Serialize> RecordStore<T> {
    /// Snapshot encoded as a JSON object of ID to record.
    pub fn snapshot_json(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(&self.snapshot()).map_err(StoreError::Encode)
    }

    pub fn snapshot_value(&self) -> Result<serde_json::Value, StoreError> {
        serde_json::to_value(self.snapshot()).map_err(StoreError::Encode)
    }
}

impl<T: DeserializeOwned> RecordStore<T> {
    /// Decode a JSON snapshot without touching the store.
    pub fn decode_snapshot(bytes: &[u8]) -> Result<HashMap<String, T>, StoreError> {
        serde_json::from_slice(bytes).map_err(StoreError::Decode)
    }

    pub fn decode_value(value: serde_json::Value) -> Result<HashMap<String, T>, StoreError> {
        serde_json::from_value(value).map_err(StoreError::Decode)
    }

    /// Decode fully, then replace contents. On error the store is unchanged.
    pub fn load_state(&self, bytes: &[u8]) -> Result<usize, StoreError> {
        let records = Self::decode_snapshot(bytes)?;
        let count = records.len();
        self.load_snapshot(records);
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::thread;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Customer {
        id: String,
        email: String,
    }

    fn customer(id: &str, email: &str) -> Customer {
        Customer {
            id: id.to_string(),
            email: email.to_string(),
        }
    }

    #[test]
    fn test_set_get_delete() {
        let store = RecordStore::new("cus");
        let id = store.next_id();
        store.set(id.clone(), customer(&id, "a@example.com"));

        assert_eq!(store.get(&id), Some(customer(&id, "a@example.com")));
        assert_eq!(store.count(), 1);

        assert!(store.delete(&id).is_some());
        assert_eq!(store.get(&id), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_delete_unknown_is_noop() {
        let store: RecordStore<Customer> = RecordStore::new("cus");
        assert!(store.delete("cus_000404").is_none());
        assert_eq!(store.count(), 0);
    }

    #[test]
    fn test_next_id_does_not_insert() {
        let store: RecordStore<Customer> = RecordStore::new("cus");
        assert_eq!(store.next_id(), "cus_000001");
        assert_eq!(store.count(), 0);
        assert!(store.list_ids().is_empty());
    }

    #[test]
    fn test_overwrite_keeps_position() {
        let store = RecordStore::new("cus");
        store.set("cus_000001", customer("cus_000001", "one@example.com"));
        store.set("cus_000002", customer("cus_000002", "two@example.com"));
        store.set("cus_000001", customer("cus_000001", "uno@example.com"));

        assert_eq!(store.list_ids(), vec!["cus_000001", "cus_000002"]);
        assert_eq!(store.list()[0].email, "uno@example.com");
    }

    #[test]
    fn test_insertion_order_not_lexical() {
        let store = RecordStore::new("x");
        store.set("b", 2);
        store.set("a", 1);
        store.set("c", 3);
        assert_eq!(store.list(), vec![2, 1, 3]);
    }

    #[test]
    fn test_create_uses_reserved_id() {
        let store = RecordStore::new("cus");
        let (id, record) = store.create(|id| customer(id, "self@example.com"));
        assert_eq!(id, "cus_000001");
        assert_eq!(record.id, id);
        assert_eq!(store.get(&id), Some(record));
    }

    #[test]
    fn test_update_in_place() {
        let store = RecordStore::new("cus");
        let (id, _) = store.create(|id| customer(id, "old@example.com"));
        assert!(store.update(&id, |c| c.email = "new@example.com".to_string()));
        assert!(!store.update("cus_999999", |c| c.email.clear()));
        assert_eq!(store.get(&id).unwrap().email, "new@example.com");
    }

    #[test]
    fn test_filter_preserves_order() {
        let store = RecordStore::new("n");
        for i in 0..10 {
            store.set(format!("n_{i}"), i);
        }
        let even = store.filter(|_, n| n % 2 == 0);
        assert_eq!(even, vec![0, 2, 4, 6, 8]);
        let by_id = store.filter(|id, _| id.ends_with('3'));
        assert_eq!(by_id, vec![3]);
    }

    #[test]
    fn test_list_is_detached_copy() {
        let store = RecordStore::new("cus");
        store.set("cus_000001", customer("cus_000001", "a@example.com"));
        let mut listed = store.list();
        listed[0].email = "mutated@example.com".to_string();
        listed.clear();
        assert_eq!(store.get("cus_000001").unwrap().email, "a@example.com");
    }

    #[test]
    fn test_snapshot_is_detached_copy() {
        let store = RecordStore::new("cus");
        store.set("cus_000001", customer("cus_000001", "a@example.com"));
        let mut snap = store.snapshot();
        snap.insert("cus_000099".to_string(), customer("cus_000099", "x"));
        snap.get_mut("cus_000001").unwrap().email.clear();
        assert_eq!(store.count(), 1);
        assert_eq!(store.get("cus_000001").unwrap().email, "a@example.com");
    }

    #[test]
    fn test_paginate_scenario() {
        let store = RecordStore::new("cus");
        let id1 = store.next_id();
        assert_eq!(id1, "cus_000001");
        store.set(id1.clone(), customer(&id1, "r1"));
        let id2 = store.next_id();
        assert_eq!(id2, "cus_000002");
        store.set(id2.clone(), customer(&id2, "r2"));

        let first = store.paginate("", 1);
        assert_eq!(first.data, vec![customer("cus_000001", "r1")]);
        assert!(first.has_more);
        assert_eq!(first.cursor, "cus_000001");
        assert_eq!(first.total, 2);

        let second = store.paginate(&first.cursor, 1);
        assert_eq!(second.data, vec![customer("cus_000002", "r2")]);
        assert!(!second.has_more);
        assert_eq!(second.cursor, "cus_000002");
        assert_eq!(second.total, 2);
    }

    #[test]
    fn test_paginate_deleted_cursor_restarts() {
        let store = RecordStore::new("cus");
        for _ in 0..3 {
            store.create(|id| customer(id, "x"));
        }
        store.delete("cus_000002");
        let page = store.paginate("cus_000002", 10);
        assert_eq!(page.len(), 2);
        assert_eq!(page.data[0].id, "cus_000001");
        assert_eq!(page.total, 2);
    }

    #[test]
    fn test_reset_rewinds_ids() {
        let store = RecordStore::new("cus");
        store.create(|id| customer(id, "a"));
        store.create(|id| customer(id, "b"));
        store.reset();
        assert!(store.is_empty());
        assert!(store.list_ids().is_empty());
        assert_eq!(store.next_id(), "cus_000001");
    }

    #[test]
    fn test_reset_metric_labelled_by_resource_name() {
        let store: RecordStore<Customer> = RecordStore::named("subscriptions", "sub");
        assert_eq!(store.resource(), "subscriptions");
        assert_eq!(store.prefix(), "sub");
        store.create(|id| customer(id, "a"));
        store.reset();

        let resets = metrics::STORE_RESETS_TOTAL.with_label_values(&["subscriptions"]);
        assert_eq!(resets.get(), 1.0);
        assert_eq!(
            metrics::STORE_RESETS_TOTAL.with_label_values(&["sub"]).get(),
            0.0
        );
        let text = metrics::gather_metrics();
        assert!(text.contains(r#"twinkit_store_resets_total{resource="subscriptions"}"#));
        assert_eq!(store.next_id(), "sub_000001");
    }

    #[test]
    fn test_load_snapshot_sorts_ids() {
        let store = RecordStore::new("cus");
        store.set("cus_000009", customer("cus_000009", "late"));
        store.set("cus_000001", customer("cus_000001", "early"));
        assert_eq!(store.list_ids(), vec!["cus_000009", "cus_000001"]);

        store.load_snapshot(store.snapshot());
        assert_eq!(store.list_ids(), vec!["cus_000001", "cus_000009"]);
    }

    #[test]
    fn test_load_snapshot_advances_sequence() {
        let store: RecordStore<Customer> = RecordStore::new("cus");
        let mut snap = HashMap::new();
        snap.insert("cus_000007".to_string(), customer("cus_000007", "a"));
        snap.insert("legacy".to_string(), customer("legacy", "b"));
        store.load_snapshot(snap);
        assert_eq!(store.next_id(), "cus_000008");
    }

    #[test]
    fn test_load_state_malformed_leaves_store_intact() {
        let store = RecordStore::new("cus");
        store.set("cus_000001", customer("cus_000001", "keep@example.com"));

        let err = store.load_state(br#"{"cus_000002": {"id": 42}}"#).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
        let err = store.load_state(b"not json").unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));

        assert_eq!(store.count(), 1);
        assert_eq!(store.get("cus_000001").unwrap().email, "keep@example.com");
    }

    #[test]
    fn test_snapshot_json_roundtrip_through_load_state() {
        let store = RecordStore::new("cus");
        store.create(|id| customer(id, "a"));
        store.create(|id| customer(id, "b"));
        let bytes = store.snapshot_json().unwrap();

        let restored: RecordStore<Customer> = RecordStore::new("cus");
        assert_eq!(restored.load_state(&bytes).unwrap(), 2);
        assert_eq!(restored.list(), store.list());
    }

    #[test]
    fn test_concurrent_writers_and_paginators() {
        let store = Arc::new(RecordStore::new("evt"));
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..200 {
                        store.create(|id| id.to_string());
                    }
                })
            })
            .collect();

        let reader = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for _ in 0..50 {
                    let page = store.paginate("", 100);
                    let mut seen = std::collections::HashSet::new();
                    for id in &page.data {
                        assert!(seen.insert(id.clone()), "duplicate within a page");
                    }
                    assert!(page.data.len() <= page.total);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();
        assert_eq!(store.count(), 800);
    }
}
