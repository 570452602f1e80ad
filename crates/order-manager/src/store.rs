//! Order Record Store
//!
//! Passive registry of the OCO sets this process created. Sets are indexed
//! by group id, by each leg's local id and by each leg's exchange order id
//! once known. Every entry lives behind its own `DashMap` shard lock, so
//! independent sets are read and replaced without a global lock.

use dashmap::DashMap;
use log::{debug, info};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::oco::OcoOrderSet;

#[derive(Debug, Default)]
pub struct OrderRecordStore {
    sets: DashMap<Uuid, OcoOrderSet>,
    by_leg: DashMap<Uuid, Uuid>,
    by_exchange_id: DashMap<String, Uuid>,
}

impl OrderRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new set; returns its group id
    pub fn register(&self, set: OcoOrderSet) -> Result<Uuid> {
        let group_id = set.group_id;
        if self.sets.contains_key(&group_id) {
            return Err(Error::InvariantViolation(format!(
                "OCO {group_id} is already registered"
            )));
        }
        self.index(&set);
        self.sets.insert(group_id, set);
        debug!("Registered OCO {}", group_id);
        Ok(group_id)
    }

    /// Replace a known set with a newer snapshot
    pub fn update(&self, set: OcoOrderSet) -> Result<()> {
        let group_id = set.group_id;
        match self.sets.get_mut(&group_id) {
            Some(mut entry) => {
                self.index(&set);
                *entry = set;
                Ok(())
            }
            None => Err(Error::NotFound(format!("OCO {group_id}"))),
        }
    }

    pub fn lookup_by_group_id(&self, group_id: Uuid) -> Result<OcoOrderSet> {
        self.sets
            .get(&group_id)
            .map(|entry| entry.clone())
            .ok_or_else(|| Error::NotFound(format!("OCO {group_id}")))
    }

    /// Find the set owning the leg with this local id
    pub fn lookup_by_local_id(&self, local_id: Uuid) -> Result<OcoOrderSet> {
        let group_id = self
            .by_leg
            .get(&local_id)
            .map(|entry| *entry)
            .ok_or_else(|| Error::NotFound(format!("leg {local_id}")))?;
        self.lookup_by_group_id(group_id)
    }

    /// Find the set owning the leg with this exchange order id
    pub fn lookup_by_exchange_id(&self, exchange_order_id: &str) -> Result<OcoOrderSet> {
        let group_id = self
            .by_exchange_id
            .get(exchange_order_id)
            .map(|entry| *entry)
            .ok_or_else(|| Error::NotFound(format!("exchange order {exchange_order_id}")))?;
        self.lookup_by_group_id(group_id)
    }

    /// Every set, oldest first
    pub fn all(&self) -> Vec<OcoOrderSet> {
        let mut sets: Vec<OcoOrderSet> = self.sets.iter().map(|e| e.value().clone()).collect();
        sets.sort_by_key(|set| set.created_at);
        sets
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    fn index(&self, set: &OcoOrderSet) {
        for leg in set.legs() {
            self.by_leg.insert(leg.local_id, set.group_id);
            if let Some(id) = &leg.exchange_order_id {
                self.by_exchange_id.insert(id.clone(), set.group_id);
            }
        }
    }

    /// Write every set to `path` as JSON keyed by group id
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let snapshot: BTreeMap<Uuid, OcoOrderSet> = self
            .sets
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        let json = serde_json::to_string_pretty(&snapshot)?;

        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!("Saved {} OCO sets to {}", snapshot.len(), path.display());
        Ok(())
    }

    /// Load a store previously written by [`save_to`](Self::save_to);
    /// a missing file yields an empty store
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let store = Self::new();
        if !path.exists() {
            return Ok(store);
        }

        let json = fs::read_to_string(path)?;
        let snapshot: BTreeMap<Uuid, OcoOrderSet> = serde_json::from_str(&json)?;
        for (group_id, set) in snapshot {
            if group_id != set.group_id {
                return Err(Error::Persistence(format!(
                    "entry {group_id} holds set {}",
                    set.group_id
                )));
            }
            store.register(set)?;
        }
        info!("Loaded {} OCO sets from {}", store.len(), path.display());
        Ok(store)
    }
}
