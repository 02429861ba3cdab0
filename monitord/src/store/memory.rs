use super::Store;
use crate::errors::StoreError;
use dashmap::DashMap;
use std::collections::{BTreeSet, HashMap};

/// In-process store for local runs and tests.
///
/// Per-key atomicity comes from dashmap's shard locks, which is enough within
/// one process but offers nothing across service instances.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: DashMap<String, u64>,
    records: DashMap<String, HashMap<String, String>>,
    sets: DashMap<String, BTreeSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.counters.get(key).map(|v| *v).unwrap_or(0)
    }

    pub fn fields(&self, key: &str) -> Option<HashMap<String, String>> {
        self.records.get(key).map(|r| r.clone())
    }

    pub fn members(&self, key: &str) -> BTreeSet<String> {
        self.sets.get(key).map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Store for MemoryStore {
    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut value = self.counters.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn write_fields(&self, key: &str, fields: &[(String, String)]) -> Result<(), StoreError> {
        let mut record = self.records.entry(key.to_string()).or_default();
        for (name, value) in fields {
            record.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }
}
