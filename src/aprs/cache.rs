use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::Reading;

/// Latest reading for each transmitting station.
///
/// The set of stations is fixed at construction, one slot each. Cloning shares
/// the same slots.
#[derive(Debug, Clone, Default)]
pub struct CurrentReadings {
    slots: Arc<HashMap<String, RwLock<Option<Reading>>>>,
}

impl CurrentReadings {
    pub fn new<I, S>(stations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            slots: Arc::new(
                stations
                    .into_iter()
                    .map(|name| (name.into(), RwLock::new(None)))
                    .collect(),
            ),
        }
    }

    /// replace the slot for `reading.station_name`.
    /// returns false (and stores nothing) for stations without a slot
    pub async fn store(&self, reading: Reading) -> bool {
        match self.slots.get(&reading.station_name) {
            Some(slot) => {
                *slot.write().await = Some(reading);
                true
            }
            None => false,
        }
    }

    pub async fn latest(&self, station: &str) -> Option<Reading> {
        match self.slots.get(station) {
            Some(slot) => slot.read().await.clone(),
            None => None,
        }
    }

    pub fn stations(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod test {
    use chrono::{Duration, Utc};

    use super::*;

    #[tokio::test]
    async fn one_slot_per_station() {
        let cache = CurrentReadings::new(["backyard", "ridge"]);
        assert_eq!(cache.latest("backyard").await, None);

        let first = Reading::new("backyard", Utc::now() - Duration::minutes(1));
        let second = Reading::new("backyard", Utc::now());
        assert!(cache.store(first).await);
        assert!(cache.store(second.clone()).await);
        assert_eq!(cache.latest("backyard").await, Some(second));
        assert_eq!(cache.latest("ridge").await, None);

        assert!(!cache.store(Reading::new("garage", Utc::now())).await);
        assert_eq!(cache.latest("garage").await, None);
    }
}
