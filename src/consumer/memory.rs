//! In-memory rain store. Keeps raw incremental rain per station plus
//! 5-minute aggregates, which is all the rain calculations need.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    sync::Arc,
};

use anyhow::Result;
use chrono::{DateTime, Duration, TimeZone, Utc};
use flume::Receiver;
use tokio::sync::RwLock;

use crate::{
    calc::{PeriodRain, RainQuery},
    shutdown::{Shutdown, ShutdownHandle},
    Reading,
};

use super::{drain_queue, StorageBackend};

const BUCKET_SECONDS: i64 = 5 * 60;

#[derive(Debug, Default)]
struct StationRain {
    /// (recorded at, incremental rain), in arrival order
    raw: VecDeque<(DateTime<Utc>, f32)>,
    /// bucket end -> rain in (end - 5min, end]
    buckets: BTreeMap<DateTime<Utc>, f32>,
    /// newest timestamp seen, never later than the wall clock
    newest: Option<DateTime<Utc>>,
}

impl StationRain {
    /// drop rows from the front of the deque and the oldest buckets. a late
    /// row behind a newer one stays until it reaches the front, queries
    /// filter by time anyway
    fn prune(&mut self, oldest: DateTime<Utc>) {
        while self.raw.front().is_some_and(|(at, _)| *at < oldest) {
            self.raw.pop_front();
        }
        while let Some(bucket) = self.buckets.first_entry() {
            if *bucket.key() >= oldest {
                break;
            }
            bucket.remove();
        }
    }
}

/// Clones share the same data.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    stations: Arc<RwLock<HashMap<String, StationRain>>>,
    retention: Duration,
}

impl MemoryStore {
    pub fn new(retention: Duration) -> Self {
        Self {
            stations: Arc::default(),
            retention,
        }
    }

    pub async fn record(&self, reading: &Reading) -> Result<()> {
        let bucket = bucket_end(reading.timestamp)?;
        let mut stations = self.stations.write().await;
        let station = stations.entry(reading.station_name.clone()).or_default();
        station
            .raw
            .push_back((reading.timestamp, reading.rain_incremental));
        *station.buckets.entry(bucket).or_default() += reading.rain_incremental;

        // a station clock running ahead must not expire the history
        let seen = reading.timestamp.min(Utc::now());
        if station.newest.map_or(true, |newest| seen > newest) {
            station.newest = Some(seen);
            station.prune(seen - self.retention);
        }
        Ok(())
    }

    /// number of raw rows held for `station`
    pub async fn len(&self, station: &str) -> usize {
        self.stations
            .read()
            .await
            .get(station)
            .map(|s| s.raw.len())
            .unwrap_or(0)
    }
}

/// end of the 5-minute bucket holding `at`. buckets are (end - 5min, end]
fn bucket_end(at: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let secs = at.timestamp();
    let on_boundary = secs.rem_euclid(BUCKET_SECONDS) == 0 && at.timestamp_subsec_nanos() == 0;
    let mut end = secs.div_euclid(BUCKET_SECONDS) * BUCKET_SECONDS;
    if !on_boundary {
        end += BUCKET_SECONDS;
    }
    Utc.timestamp_opt(end, 0)
        .single()
        .ok_or_else(|| anyhow!("Reading timestamp {at} is out of range"))
}

#[async_trait]
impl RainQuery for MemoryStore {
    async fn period_rain(
        &self,
        station: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PeriodRain> {
        let stations = self.stations.read().await;
        let Some(data) = stations.get(station) else {
            return Ok(PeriodRain::default());
        };
        let first_end = since + Duration::seconds(BUCKET_SECONDS);
        if first_end > until {
            return Ok(PeriodRain::default());
        }
        Ok(data
            .buckets
            .range(first_end..=until)
            .fold(PeriodRain::default(), |acc, (&end, &rain)| PeriodRain {
                total: acc.total + rain,
                last_bucket: Some(end),
            }))
    }

    async fn incremental_rain(
        &self,
        station: &str,
        after: Option<DateTime<Utc>>,
        not_before: DateTime<Utc>,
    ) -> Result<f32> {
        let stations = self.stations.read().await;
        let Some(data) = stations.get(station) else {
            return Ok(0.0);
        };
        Ok(data
            .raw
            .iter()
            .filter(|(at, _)| after.map(|after| *at > after).unwrap_or(true))
            .filter(|(at, _)| *at >= not_before)
            .map(|(_, rain)| rain)
            .sum())
    }
}

/// Storage backend feeding a [`MemoryStore`]
pub struct MemoryBackend {
    store: MemoryStore,
    shutdown: Option<Shutdown>,
}

impl MemoryBackend {
    pub fn new(store: MemoryStore) -> Self {
        Self {
            store,
            shutdown: None,
        }
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn start_consuming(
        &mut self,
        queue: Receiver<Reading>,
        shutdown: ShutdownHandle,
    ) -> Result<()> {
        let local = Shutdown::nested(shutdown);
        let store = self.store.clone();
        tokio::spawn(drain_queue(
            self.name(),
            queue,
            local.handle(),
            move |reading: Reading| {
                let store = store.clone();
                async move { store.record(&reading).await }
            },
        ));
        self.shutdown = Some(local);
        Ok(())
    }

    async fn close(mut self: Box<Self>) {
        if let Some(mut shutdown) = self.shutdown.take() {
            shutdown.trigger_shutdown();
            shutdown.wait_for_completion().await;
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration as StdDuration;

    use tracing_test::traced_test;

    use super::*;
    use crate::calc::daily_rainfall_between;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, h, m, s).unwrap()
    }

    fn rain(station: &str, when: DateTime<Utc>, inches: f32) -> Reading {
        let mut r = Reading::new(station, when);
        r.rain_incremental = inches;
        r
    }

    #[test]
    fn buckets_are_labelled_by_their_end() {
        assert_eq!(bucket_end(at(12, 0, 0)).unwrap(), at(12, 0, 0));
        assert_eq!(bucket_end(at(12, 0, 1)).unwrap(), at(12, 5, 0));
        assert_eq!(bucket_end(at(12, 4, 59)).unwrap(), at(12, 5, 0));
    }

    #[tokio::test]
    #[traced_test]
    async fn daily_total_matches_raw_rows() {
        let store = MemoryStore::new(Duration::hours(48));
        // yesterday, must not count
        store
            .record(&rain("backyard", at(0, 0, 0) - Duration::seconds(30), 0.5))
            .await
            .unwrap();
        let mut expected = 0.0;
        for minute in 0..92 {
            let when = at(0, 0, 30) + Duration::minutes(minute);
            store.record(&rain("backyard", when, 0.01)).await.unwrap();
            expected += 0.01;
        }
        store.record(&rain("ridge", at(0, 10, 0), 3.0)).await.unwrap();

        let now = at(1, 32, 10);
        let buckets = store.period_rain("backyard", at(0, 0, 0), now).await.unwrap();
        assert_eq!(buckets.last_bucket, Some(at(1, 30, 0)));

        let total = daily_rainfall_between(&store, "backyard", at(0, 0, 0), now)
            .await
            .unwrap();
        assert!((total - expected).abs() < 1e-4, "{total} != {expected}");
    }

    #[tokio::test]
    async fn unknown_station_is_empty() {
        let store = MemoryStore::new(Duration::hours(1));
        let period = store.period_rain("nowhere", at(0, 0, 0), at(1, 0, 0)).await.unwrap();
        assert_eq!(period, PeriodRain::default());
        assert_eq!(
            store.incremental_rain("nowhere", None, at(0, 0, 0)).await.unwrap(),
            0.0
        );
    }

    #[tokio::test]
    async fn old_rows_are_pruned() {
        let store = MemoryStore::new(Duration::hours(1));
        store.record(&rain("backyard", at(0, 0, 30), 0.1)).await.unwrap();
        store.record(&rain("backyard", at(0, 30, 30), 0.1)).await.unwrap();
        store.record(&rain("backyard", at(1, 10, 30), 0.1)).await.unwrap();
        assert_eq!(store.len("backyard").await, 2);
        let period = store.period_rain("backyard", at(0, 0, 0), at(2, 0, 0)).await.unwrap();
        assert!((period.total - 0.2).abs() < 1e-6);
    }

    #[tokio::test]
    async fn future_timestamp_keeps_history() {
        let store = MemoryStore::new(Duration::hours(1));
        let now = Utc::now();
        store
            .record(&rain("backyard", now - Duration::minutes(30), 0.1))
            .await
            .unwrap();
        store
            .record(&rain("backyard", now + Duration::days(365), 0.1))
            .await
            .unwrap();
        assert_eq!(store.len("backyard").await, 2);

        // late rows are kept until newer rows push them out
        store
            .record(&rain("backyard", now - Duration::minutes(20), 0.1))
            .await
            .unwrap();
        assert_eq!(store.len("backyard").await, 3);
    }

    #[tokio::test]
    #[traced_test]
    async fn backend_records_from_queue() {
        let store = MemoryStore::new(Duration::hours(48));
        let mut backend = Box::new(MemoryBackend::new(store.clone()));
        let mut shutdown = Shutdown::new();
        let (tx, rx) = flume::bounded(4);
        backend.start_consuming(rx, shutdown.handle()).await.unwrap();

        tx.send_async(rain("backyard", Utc::now(), 0.02)).await.unwrap();
        tokio::time::timeout(StdDuration::from_secs(1), async {
            while store.len("backyard").await == 0 {
                tokio::time::sleep(StdDuration::from_millis(5)).await;
            }
        })
        .await
        .expect("reading never reached the store");

        backend.close().await;
        shutdown.trigger_shutdown();
        shutdown.wait_for_completion().await;
    }
}
