//! Health records for background subsystems (currently only `"aprs"`).

use std::{collections::HashMap, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub status: HealthStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthRecord {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: HealthStatus::Healthy,
            message: message.into(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn unhealthy(message: impl Into<String>, error: impl ToString) -> Self {
        Self {
            status: HealthStatus::Unhealthy,
            message: message.into(),
            error: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }
}

/// Somewhere to put health records, keyed by subsystem name.
#[async_trait]
pub trait HealthSink: Send + Sync {
    async fn update_health(&self, subsystem: &str, record: HealthRecord) -> Result<()>;
}

/// In-memory health sink. optionally mirrors every update to a JSON file
#[derive(Debug, Default)]
pub struct HealthRegistry {
    records: RwLock<HashMap<String, HealthRecord>>,
    persist_to: Option<PathBuf>,
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// write the full set of records to `path` (pretty JSON) after each update
    pub fn persisted(path: PathBuf) -> Self {
        Self {
            records: RwLock::default(),
            persist_to: Some(path),
        }
    }

    pub async fn get(&self, subsystem: &str) -> Option<HealthRecord> {
        self.records.read().await.get(subsystem).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, HealthRecord> {
        self.records.read().await.clone()
    }

    /// healthy, and checked within `max_age`
    pub async fn is_healthy(&self, subsystem: &str, max_age: chrono::Duration) -> bool {
        match self.get(subsystem).await {
            Some(record) => {
                record.status == HealthStatus::Healthy && Utc::now() - record.timestamp <= max_age
            }
            None => false,
        }
    }
}

#[async_trait]
impl HealthSink for HealthRegistry {
    async fn update_health(&self, subsystem: &str, record: HealthRecord) -> Result<()> {
        let serialized = {
            let mut records = self.records.write().await;
            records.insert(subsystem.to_string(), record);
            match &self.persist_to {
                Some(_) => Some(serde_json::to_string_pretty(&*records)?),
                None => None,
            }
        };
        if let (Some(path), Some(serialized)) = (&self.persist_to, serialized) {
            tokio::fs::write(path, serialized.as_bytes()).await?;
        }
        Ok(())
    }
}
