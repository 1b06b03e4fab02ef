use crate::error::StoreError;
use crate::models::StateKey;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use uuid::Uuid;

/// One indicator instance's state for one series
///
/// Holds an opaque JSON blob owned by the host. Decoding never fails loudly:
/// a blob that does not match the requested type reads as empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSlot {
    value: Option<Value>,
}

impl StateSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a raw blob, e.g. one written by an older plugin version
    pub fn from_raw(value: Value) -> Self {
        Self { value: Some(value) }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Decode the slot, treating malformed content as absent
    pub fn load<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.value.as_ref()?;

        match T::deserialize(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                tracing::warn!("Discarding malformed indicator state: {}", e);
                None
            }
        }
    }

    pub fn store<T: Serialize>(&mut self, state: &T) -> Result<(), StoreError> {
        self.value = Some(serde_json::to_value(state)?);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.value = None;
    }
}

/// In-memory state store for indicator instances
///
/// Slots are keyed by instance and series, so two charts showing the same
/// symbol never share smoothing state. Lives for one session only.
#[derive(Clone, Default)]
pub struct StateStore {
    slots: Arc<RwLock<HashMap<StateKey, Value>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy out the slot for a key (empty if nothing stored)
    pub fn slot(&self, key: &StateKey) -> Result<StateSlot, StoreError> {
        let slots = self.slots.read()?;
        Ok(StateSlot {
            value: slots.get(key).cloned(),
        })
    }

    /// Write a slot back; an empty slot removes the key
    pub fn commit(&self, key: &StateKey, slot: StateSlot) -> Result<(), StoreError> {
        let mut slots = self.slots.write()?;
        match slot.value {
            Some(value) => {
                slots.insert(key.clone(), value);
            }
            None => {
                slots.remove(key);
            }
        }
        Ok(())
    }

    pub fn clear(&self, key: &StateKey) -> Result<(), StoreError> {
        let mut slots = self.slots.write()?;
        slots.remove(key);
        Ok(())
    }

    /// Drop every slot of an instance (indicator unloaded)
    ///
    /// Returns the number of slots removed
    pub fn clear_instance(&self, instance: Uuid) -> Result<usize, StoreError> {
        let mut slots = self.slots.write()?;
        let before = slots.len();
        slots.retain(|key, _| key.instance != instance);
        Ok(before - slots.len())
    }

    pub fn keys_for_instance(&self, instance: Uuid) -> Result<Vec<StateKey>, StoreError> {
        let slots = self.slots.read()?;
        Ok(slots
            .keys()
            .filter(|key| key.instance == instance)
            .cloned()
            .collect())
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        Ok(self.slots.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.slots.read()?.is_empty())
    }

    pub fn clear_all(&self) -> Result<(), StoreError> {
        self.slots.write()?.clear();
        Ok(())
    }
}
