//! Composition root for a twin.
//!
//! A `Twin` owns the stores, the optional webhook dispatcher and the clock of
//! one simulated service, and implements the admin contract over them:
//! snapshot, load, reset and flush.

use crate::clock::SimClock;
use crate::dispatch::{DispatchError, Dispatcher, FlushReport};
use crate::metrics;
use crate::store::{RecordStore, StoreError};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// A store the admin contract can snapshot, load and reset.
pub trait StateProvider: Send + Sync {
    /// Resource name used in logs and metric labels.
    fn resource(&self) -> &str;

    fn snapshot_value(&self) -> Result<Value, StoreError>;

    /// Check that `value` would load, without loading it.
    fn check_state(&self, value: &Value) -> Result<(), StoreError>;

    /// Replace contents with `value`. Contents are unchanged on error.
    fn load_value(&self, value: Value) -> Result<(), StoreError>;

    fn reset(&self);
}

impl<T> StateProvider for RecordStore<T>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync,
{
    fn resource(&self) -> &str {
        RecordStore::resource(self)
    }

    fn snapshot_value(&self) -> Result<Value, StoreError> {
        RecordStore::snapshot_value(self)
    }

    fn check_state(&self, value: &Value) -> Result<(), StoreError> {
        Self::decode_value(value.clone()).map(|_| ())
    }

    fn load_value(&self, value: Value) -> Result<(), StoreError> {
        let records = Self::decode_value(value)?;
        self.load_snapshot(records);
        Ok(())
    }

    fn reset(&self) {
        RecordStore::reset(self)
    }
}

#[async_trait]
pub trait WebhookFlusher: Send + Sync {
    /// Deliver everything queued, returning per-outcome counts.
    async fn flush_webhooks(&self) -> Result<FlushReport, DispatchError>;
}

#[async_trait]
impl WebhookFlusher for Dispatcher {
    async fn flush_webhooks(&self) -> Result<FlushReport, DispatchError> {
        Ok(self.flush().await)
    }
}

pub struct TwinBuilder {
    name: String,
    stores: BTreeMap<String, Arc<dyn StateProvider>>,
    dispatcher: Option<Dispatcher>,
    clock: Option<Arc<SimClock>>,
}

impl TwinBuilder {
    /// Register a store under `resource`. A later registration with the same
    /// name replaces the earlier one.
    pub fn store(mut self, resource: impl Into<String>, store: Arc<dyn StateProvider>) -> Self {
        self.stores.insert(resource.into(), store);
        self
    }

    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Clock for the twin. Defaults to the dispatcher's clock, or a new one.
    pub fn clock(mut self, clock: Arc<SimClock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Twin {
        let clock = self
            .clock
            .or_else(|| self.dispatcher.as_ref().map(|d| d.clock().clone()))
            .unwrap_or_else(|| Arc::new(SimClock::new()));

        if let Some(dispatcher) = &self.dispatcher {
            if !Arc::ptr_eq(dispatcher.clock(), &clock) {
                warn!(
                    "Twin '{}' and its dispatcher use different clocks; webhook timestamps will not follow admin time changes",
                    self.name
                );
            }
        }

        Twin {
            name: self.name,
            stores: self.stores,
            dispatcher: self.dispatcher,
            clock,
        }
    }
}

pub struct Twin {
    name: String,
    stores: BTreeMap<String, Arc<dyn StateProvider>>,
    dispatcher: Option<Dispatcher>,
    clock: Arc<SimClock>,
}

impl std::fmt::Debug for Twin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Twin")
            .field("name", &self.name)
            .field("resources", &self.stores.keys().collect::<Vec<_>>())
            .field("dispatcher", &self.dispatcher.is_some())
            .finish()
    }
}

impl Twin {
    pub fn builder(name: impl Into<String>) -> TwinBuilder {
        TwinBuilder {
            name: name.into(),
            stores: BTreeMap::new(),
            dispatcher: None,
            clock: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn clock(&self) -> &Arc<SimClock> {
        &self.clock
    }

    pub fn dispatcher(&self) -> Option<&Dispatcher> {
        self.dispatcher.as_ref()
    }

    pub fn resources(&self) -> Vec<&str> {
        self.stores.keys().map(String::as_str).collect()
    }

    pub fn store(&self, resource: &str) -> Option<&Arc<dyn StateProvider>> {
        self.stores.get(resource)
    }

    /// `{ resource: { id: record } }` for every registered store.
    pub fn snapshot(&self) -> Result<Value, StoreError> {
        let mut document = Map::new();
        for (resource, store) in &self.stores {
            document.insert(resource.clone(), store.snapshot_value()?);
        }
        Ok(Value::Object(document))
    }

    /// Replace the state of every store from a JSON document.
    ///
    /// Every section is checked before any store is touched, so a bad
    /// document changes nothing. Stores missing from the document are
    /// emptied.
    pub fn load_state(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let result = self.try_load_state(bytes);
        metrics::record_state_load(result.is_ok());
        if let Err(e) = &result {
            warn!("Rejected state load for twin '{}': {}", self.name, e);
        }
        result
    }

    fn try_load_state(&self, bytes: &[u8]) -> Result<(), StoreError> {
        let document: Value = serde_json::from_slice(bytes).map_err(StoreError::Decode)?;
        let Value::Object(mut sections) = document else {
            return Err(StoreError::InvalidShape(
                "expected a JSON object keyed by resource".to_string(),
            ));
        };

        for (resource, section) in &sections {
            let store = self
                .stores
                .get(resource)
                .ok_or_else(|| StoreError::UnknownResource(resource.clone()))?;
            store.check_state(section)?;
        }

        for (resource, store) in &self.stores {
            match sections.remove(resource) {
                Some(section) => store.load_value(section)?,
                None => store.reset(),
            }
        }

        info!(
            "Twin '{}' loaded state for {} resources",
            self.name,
            self.stores.len()
        );
        Ok(())
    }

    /// Empty every store and the dispatcher, and zero the clock offset.
    pub fn reset(&self) {
        for store in self.stores.values() {
            store.reset();
        }
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.reset();
        }
        self.clock.reset();
        info!("Twin '{}' reset", self.name);
    }

    pub async fn flush_webhooks(&self) -> Result<FlushReport, DispatchError> {
        match &self.dispatcher {
            Some(dispatcher) => dispatcher.flush_webhooks().await,
            None => Ok(FlushReport::default()),
        }
    }
}
