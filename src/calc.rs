//! Derived weather metrics: rain totals, rain rate, wind chill and heat index.
//!
//! Wind chill and heat index use `0.0` as their "not applicable" answer, so a
//! genuine result of exactly 0°F cannot be told apart from N/A.

use anyhow::Result;
use chrono::{DateTime, Duration, Local, TimeZone, Utc};

#[cfg(test)]
mod test;

/// Result of summing pre-aggregated (bucketed) rain.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PeriodRain {
    /// inches
    pub total: f32,
    /// end of the latest bucket included in `total`, if any were
    pub last_bucket: Option<DateTime<Utc>>,
}

/// Aggregate queries over stored observations.
#[async_trait]
pub trait RainQuery: Send + Sync {
    /// sum the period rain of every bucket of `station` that starts at or after
    /// `since` and ends at or before `until`
    async fn period_rain(
        &self,
        station: &str,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<PeriodRain>;

    /// sum raw incremental rain of `station` recorded strictly after `after`
    /// (when given) and no earlier than `not_before`
    async fn incremental_rain(
        &self,
        station: &str,
        after: Option<DateTime<Utc>>,
        not_before: DateTime<Utc>,
    ) -> Result<f32>;
}

/// the incremental part of the daily total never looks further back than this
const INCREMENTAL_LOOKBACK_MINUTES: i64 = 60;
const RAIN_RATE_WINDOW_MINUTES: i64 = 10;

/// Rain since local midnight, in inches.
pub async fn daily_rainfall(db: &dyn RainQuery, station: &str) -> Result<f32> {
    let now = Local::now();
    daily_rainfall_between(db, station, local_midnight(&now), now.with_timezone(&Utc)).await
}

/// Rain between `midnight` and `now`.
///
/// Bucketed totals cover everything up to the last bucket, raw rows fill in the
/// rest (bounded to the trailing hour). With no buckets at all, only the
/// bounded raw sum is used.
pub async fn daily_rainfall_between(
    db: &dyn RainQuery,
    station: &str,
    midnight: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<f32> {
    let aggregated = db.period_rain(station, midnight, now).await?;
    let not_before = now - Duration::minutes(INCREMENTAL_LOOKBACK_MINUTES);
    let incremental = db
        .incremental_rain(station, aggregated.last_bucket, not_before.max(midnight))
        .await?;
    let total = aggregated.total + incremental;
    debug!(
        station,
        "Daily rainfall: {total:.2} (aggregated: {:.2}, incremental: {incremental:.2})",
        aggregated.total
    );
    Ok(total)
}

/// Current rain rate in inches/hour, extrapolated from the last 10 minutes.
pub async fn rain_rate(db: &dyn RainQuery, station: &str) -> Result<f32> {
    rain_rate_at(db, station, Utc::now()).await
}

pub async fn rain_rate_at(db: &dyn RainQuery, station: &str, now: DateTime<Utc>) -> Result<f32> {
    let window_start = now - Duration::minutes(RAIN_RATE_WINDOW_MINUTES);
    let last_10_min = db.incremental_rain(station, None, window_start).await?;
    let rate = last_10_min * (60 / RAIN_RATE_WINDOW_MINUTES) as f32;
    debug!(station, "Rain rate: {rate:.2} in/hr (10-min total: {last_10_min:.2} in)");
    Ok(rate)
}

/// NWS wind chill. `0.0` when above 50°F or below 3 mph.
pub fn wind_chill(temp_f: f32, wind_mph: f32) -> f32 {
    if temp_f > 50.0 || wind_mph < 3.0 {
        return 0.0;
    }
    let t = temp_f as f64;
    let v16 = (wind_mph as f64).powf(0.16);
    (35.74 + 0.6215 * t - 35.75 * v16 + 0.4275 * t * v16) as f32
}

/// NWS (Rothfusz) heat index. `0.0` below 80°F.
pub fn heat_index(temp_f: f32, humidity: f32) -> f32 {
    if temp_f < 80.0 {
        return 0.0;
    }
    const C1: f64 = -42.379;
    const C2: f64 = 2.04901523;
    const C3: f64 = 10.14333127;
    const C4: f64 = -0.22475541;
    const C5: f64 = -0.00683783;
    const C6: f64 = -0.05481717;
    const C7: f64 = 0.00122874;
    const C8: f64 = 0.00085282;
    const C9: f64 = -0.00000199;

    let t = temp_f as f64;
    let h = humidity as f64;
    (C1 + C2 * t
        + C3 * h
        + C4 * t * h
        + C5 * t * t
        + C6 * h * h
        + C7 * t * t * h
        + C8 * t * h * h
        + C9 * t * t * h * h) as f32
}

/// start of the local day containing `now`, in UTC
pub fn local_midnight<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| now.timezone().from_local_datetime(&midnight).earliest())
        .map(|midnight| midnight.with_timezone(&Utc))
        // midnight skipped by a DST change: only the bounded raw sum applies
        .unwrap_or_else(|| now.with_timezone(&Utc))
}
