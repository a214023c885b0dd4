use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calc;

/// One observation snapshot from a station.
///
/// Readings are immutable once handed to the distributor; every backend gets
/// its own copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub station_name: String,
    #[serde(default)]
    pub station_type: String,
    /// degrees F
    #[serde(default)]
    pub out_temp: f32,
    /// percent
    #[serde(default)]
    pub out_humidity: f32,
    /// mph
    #[serde(default)]
    pub wind_speed: f32,
    /// degrees
    #[serde(default)]
    pub wind_dir: f32,
    /// inHg
    #[serde(default)]
    pub barometer: f32,
    /// inches since local midnight, as reported by the station
    #[serde(default)]
    pub day_rain: f32,
    /// inches fallen since the previous reading
    #[serde(default)]
    pub rain_incremental: f32,
    /// 0 = not applicable
    #[serde(default)]
    pub wind_chill: f32,
    /// 0 = not applicable
    #[serde(default)]
    pub heat_index: f32,
    #[serde(default)]
    pub battery_voltage: Option<f32>,
    #[serde(default)]
    pub in_temp: Option<f32>,
    #[serde(default)]
    pub in_humidity: Option<f32>,
    #[serde(default)]
    pub wind_speed_10: Option<f32>,
    #[serde(default)]
    pub rain_rate: Option<f32>,
    #[serde(default)]
    pub storm_rain: Option<f32>,
    #[serde(default)]
    pub month_rain: Option<f32>,
    #[serde(default)]
    pub year_rain: Option<f32>,
    #[serde(default)]
    pub solar_watts: Option<f32>,
    #[serde(default)]
    pub uv: Option<f32>,
    #[serde(default)]
    pub extra_temps: Vec<f32>,
    #[serde(default)]
    pub soil_temps: Vec<f32>,
    #[serde(default)]
    pub extra_humidities: Vec<f32>,
}

impl Reading {
    /// an empty reading for `station_name`, all sensors zeroed / absent
    pub fn new(station_name: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            station_name: station_name.into(),
            station_type: String::new(),
            out_temp: 0.0,
            out_humidity: 0.0,
            wind_speed: 0.0,
            wind_dir: 0.0,
            barometer: 0.0,
            day_rain: 0.0,
            rain_incremental: 0.0,
            wind_chill: 0.0,
            heat_index: 0.0,
            battery_voltage: None,
            in_temp: None,
            in_humidity: None,
            wind_speed_10: None,
            rain_rate: None,
            storm_rain: None,
            month_rain: None,
            year_rain: None,
            solar_watts: None,
            uv: None,
            extra_temps: vec![],
            soil_temps: vec![],
            extra_humidities: vec![],
        }
    }

    /// fill in wind chill and heat index if the producer did not provide them
    pub fn with_derived_metrics(mut self) -> Self {
        if self.wind_chill == 0.0 {
            self.wind_chill = calc::wind_chill(self.out_temp, self.wind_speed);
        }
        if self.heat_index == 0.0 {
            self.heat_index = calc::heat_index(self.out_temp, self.out_humidity);
        }
        self
    }
}

#[cfg(test)]
#[test]
fn derived_metrics_fill_unset_values() {
    let mut r = Reading::new("backyard", Utc::now());
    r.out_temp = 30.0;
    r.wind_speed = 10.0;
    let r = r.with_derived_metrics();
    assert!((r.wind_chill - 21.2).abs() < 0.1);
    assert_eq!(r.heat_index, 0.0);

    let mut provided = Reading::new("backyard", Utc::now());
    provided.out_temp = 30.0;
    provided.wind_speed = 10.0;
    provided.wind_chill = 19.0;
    assert_eq!(provided.with_derived_metrics().wind_chill, 19.0);
}

#[cfg(test)]
#[test]
fn deserialize_sparse_json() {
    let r: Reading = serde_json::from_str(
        r#"{"timestamp":"2024-06-01T14:00:00Z","station_name":"backyard","out_temp":71.5,"uv":3.0}"#,
    )
    .unwrap();
    assert_eq!(r.station_name, "backyard");
    assert_eq!(r.out_temp, 71.5);
    assert_eq!(r.uv, Some(3.0));
    assert_eq!(r.barometer, 0.0);
    assert!(r.extra_temps.is_empty());
}
