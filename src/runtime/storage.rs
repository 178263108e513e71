use async_trait::async_trait;
use anyhow::Result;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use crate::runtime::variables::Variable;

/// Everything a save slot holds: the active-list batch plus global variables.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SaveSlot {
    pub active_lists: String,
    #[serde(default)]
    pub global_variables: Vec<Variable>,
}

#[async_trait]
pub trait SaveStore: Send + Sync {
    async fn write(&self, slot: &str, data: &SaveSlot) -> Result<()>;
    async fn read(&self, slot: &str) -> Result<Option<SaveSlot>>;
    /// Returns whether the slot existed.
    async fn delete(&self, slot: &str) -> Result<bool>;
    async fn slots(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Default)]
pub struct InMemorySaveStore {
    slots: DashMap<String, SaveSlot>,
}

impl InMemorySaveStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SaveStore for InMemorySaveStore {
    async fn write(&self, slot: &str, data: &SaveSlot) -> Result<()> {
        self.slots.insert(slot.to_string(), data.clone());
        Ok(())
    }

    async fn read(&self, slot: &str) -> Result<Option<SaveSlot>> {
        Ok(self.slots.get(slot).map(|s| s.value().clone()))
    }

    async fn delete(&self, slot: &str) -> Result<bool> {
        Ok(self.slots.remove(slot).is_some())
    }

    async fn slots(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.slots.iter().map(|s| s.key().clone()).collect();
        names.sort();
        Ok(names)
    }
}
