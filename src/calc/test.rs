use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use tracing_test::traced_test;

use super::*;

/// stands in for the time series database: one fixed aggregate answer and a
/// list of raw rows that get filtered like the real query would
struct Fixture {
    aggregate: PeriodRain,
    raw: Vec<(DateTime<Utc>, f32)>,
}

#[async_trait]
impl RainQuery for Fixture {
    async fn period_rain(
        &self,
        _station: &str,
        _since: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<PeriodRain> {
        Ok(self.aggregate)
    }

    async fn incremental_rain(
        &self,
        _station: &str,
        after: Option<DateTime<Utc>>,
        not_before: DateTime<Utc>,
    ) -> Result<f32> {
        Ok(self
            .raw
            .iter()
            .filter(|(t, _)| after.map(|after| *t > after).unwrap_or(true))
            .filter(|(t, _)| *t >= not_before)
            .map(|(_, rain)| rain)
            .sum())
    }
}

fn at(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, h, m, 0).unwrap()
}

#[test]
fn wind_chill_not_applicable() {
    assert_eq!(wind_chill(60.0, 10.0), 0.0);
    assert_eq!(wind_chill(51.0, 20.0), 0.0);
    assert_eq!(wind_chill(30.0, 2.9), 0.0);
}

#[test]
fn wind_chill_matches_nws_table() {
    // NWS wind chill chart: 30°F @ 10 mph => 21°F, 0°F @ 15 mph => -19°F
    assert!((wind_chill(30.0, 10.0) - 21.25).abs() < 0.1);
    assert!((wind_chill(0.0, 15.0) - (-19.4)).abs() < 0.1);
    assert!((wind_chill(50.0, 3.0) - 49.68).abs() < 0.1);
}

#[test]
fn heat_index_not_applicable() {
    assert_eq!(heat_index(75.0, 90.0), 0.0);
    assert_eq!(heat_index(79.9, 100.0), 0.0);
}

#[test]
fn heat_index_matches_nws_table() {
    // NWS heat index chart: 90°F @ 70% => 106°F, 100°F @ 50% => 118°F
    assert!((heat_index(90.0, 70.0) - 105.92).abs() < 0.1);
    assert!((heat_index(100.0, 50.0) - 118.32).abs() < 0.1);
}

#[tokio::test]
#[traced_test]
async fn daily_rainfall_combines_buckets_and_recent_rows() {
    let db = Fixture {
        aggregate: PeriodRain {
            total: 0.50,
            last_bucket: Some(at(14, 0)),
        },
        raw: vec![
            // already inside the aggregate
            (at(13, 55), 0.10),
            // after the last bucket, but more than an hour before "now"
            (at(14, 10), 0.02),
            (at(14, 45), 0.03),
            (at(15, 20), 0.02),
        ],
    };
    let total = daily_rainfall_between(&db, "backyard", at(0, 0), at(15, 30))
        .await
        .unwrap();
    assert!((total - 0.55).abs() < 1e-5, "got {total}");
}

#[tokio::test]
#[traced_test]
async fn daily_rainfall_without_buckets_uses_bounded_rows() {
    let db = Fixture {
        aggregate: PeriodRain::default(),
        raw: vec![(at(0, 20), 0.05), (at(0, 40), 0.01), (at(0, 50), 0.02)],
    };
    let total = daily_rainfall_between(&db, "backyard", at(0, 0), at(1, 30))
        .await
        .unwrap();
    assert!((total - 0.03).abs() < 1e-5, "got {total}");
}

#[tokio::test]
#[traced_test]
async fn daily_rainfall_no_data_is_zero() {
    let db = Fixture {
        aggregate: PeriodRain::default(),
        raw: vec![],
    };
    let total = daily_rainfall_between(&db, "backyard", at(0, 0), at(12, 0))
        .await
        .unwrap();
    assert_eq!(total, 0.0);
}

#[tokio::test]
#[traced_test]
async fn rain_rate_extrapolates_ten_minutes() {
    let db = Fixture {
        aggregate: PeriodRain::default(),
        raw: vec![(at(11, 45), 0.30), (at(11, 52), 0.01), (at(11, 58), 0.02)],
    };
    let rate = rain_rate_at(&db, "backyard", at(12, 0)).await.unwrap();
    assert!((rate - 0.18).abs() < 1e-5, "got {rate}");

    let empty = Fixture {
        aggregate: PeriodRain::default(),
        raw: vec![],
    };
    assert_eq!(rain_rate_at(&empty, "backyard", at(12, 0)).await.unwrap(), 0.0);
}

#[test]
fn midnight_in_fixed_offset() {
    let tz = chrono::FixedOffset::west_opt(7 * 3600).unwrap();
    let now = tz.with_ymd_and_hms(2024, 6, 1, 15, 30, 0).unwrap();
    assert_eq!(local_midnight(&now), at(7, 0));
}
