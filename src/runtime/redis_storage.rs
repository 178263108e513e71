use async_trait::async_trait;
use anyhow::Result;
use redis::AsyncCommands;
use crate::runtime::storage::{SaveSlot, SaveStore};

pub const DEFAULT_SAVE_KEY: &str = "cutscript:saves";

/// Save slots kept as JSON fields of one Redis hash.
pub struct RedisSaveStore {
    client: redis::Client,
    key: String,
}

impl RedisSaveStore {
    pub fn new(client: redis::Client) -> Self {
        Self::with_key(client, DEFAULT_SAVE_KEY)
    }

    pub fn with_key(client: redis::Client, key: impl Into<String>) -> Self {
        Self { client, key: key.into() }
    }

    pub fn open(url: &str) -> Result<Self> {
        Ok(Self::new(redis::Client::open(url)?))
    }
}

#[async_trait]
impl SaveStore for RedisSaveStore {
    async fn write(&self, slot: &str, data: &SaveSlot) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let serialized = serde_json::to_string(data)?;
        let _: () = conn.hset(&self.key, slot, serialized).await?;
        Ok(())
    }

    async fn read(&self, slot: &str) -> Result<Option<SaveSlot>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.hget(&self.key, slot).await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, slot: &str) -> Result<bool> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let removed: usize = conn.hdel(&self.key, slot).await?;
        Ok(removed > 0)
    }

    async fn slots(&self) -> Result<Vec<String>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let mut names: Vec<String> = conn.hkeys(&self.key).await?;
        names.sort();
        Ok(names)
    }
}
