use std::{net::SocketAddr, path::PathBuf};

use anyhow::Result;
use serde::Deserialize;

#[cfg(test)]
#[test]
fn load_example_config() {
    let cfg = from_str(include_str!("../config.example.toml")).unwrap();
    assert_eq!(cfg.distributor.queue_size, 20);
    assert_eq!(cfg.aprs.as_ref().unwrap().server, "rotate.aprs2.net:14580");
    assert_eq!(cfg.stations.len(), 2);
    let backyard = cfg.stations[0].aprs.as_ref().unwrap();
    assert!(backyard.enabled);
    assert_eq!(backyard.symbol_table, "/");
    assert_eq!(backyard.passcode, None);
    assert!(cfg.stations[1].aprs.is_none());
    println!("{cfg:#?}");
}

#[cfg(test)]
#[test]
fn defaults_fill_in() {
    let cfg = from_str(
        r#"
        [directory]
        run = "/tmp/remoteweather"

        [aprs]
        server = "localhost:14580"

        [[stations]]
        name = "backyard"
        "#,
    )
    .unwrap();
    assert_eq!(cfg.ingest.listen, None);
    assert_eq!(cfg.distributor.backend_queue_size, 10);
    assert!(!cfg.backends.log);
    assert_eq!(cfg.backends.memory.retention_hours, 48);
    let aprs = cfg.aprs.as_ref().unwrap();
    assert_eq!(aprs.initial_delay_secs, 15);
    assert_eq!(aprs.report_interval_secs, 300);
    assert_eq!(aprs.health_interval_secs, 90);
    assert_eq!(aprs.transmit_timeout_secs, 3);
    assert_eq!(aprs.health_timeout_secs, 10);
    assert!(!aprs.compute_day_rain);
}

#[cfg(test)]
#[test]
fn aprs_is_optional() {
    let cfg = from_str(
        r#"
        [directory]
        run = "/tmp/remoteweather"

        [[stations]]
        name = "backyard"
        "#,
    )
    .unwrap();
    assert_eq!(cfg.aprs, None);
    assert_eq!(cfg.stations.len(), 1);
    assert!(cfg.stations[0].aprs.is_none());
}

pub fn from_str(config_file: &str) -> Result<self::Config> {
    let settings = config::Config::builder()
        .add_source(config::File::from_str(
            config_file,
            config::FileFormat::Toml,
        ))
        .build()?
        .try_deserialize()?;
    Ok(settings)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// directories to store various things
    pub directory: Directories,
    /// where readings come in from
    #[serde(default)]
    pub ingest: Ingest,
    #[serde(default)]
    pub distributor: Distributor,
    /// which storage backends to run (APRS is configured separately)
    #[serde(default)]
    pub backends: Backends,
    /// APRS-IS reporting. nothing is reported without this section
    #[serde(default)]
    pub aprs: Option<Aprs>,
    #[serde(default)]
    pub stations: Vec<Station>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Directories {
    /// the directory to store runtime information (must be
    /// able to delete this *between* server runs, with no consequence)
    ///
    /// e.g. log files, health.json
    pub run: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Ingest {
    /// UDP address to receive JSON readings on. no ingest if unset
    #[serde(default)]
    pub listen: Option<SocketAddr>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Distributor {
    /// capacity of the incoming reading queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,
    /// capacity of each backend's queue
    #[serde(default = "default_backend_queue_size")]
    pub backend_queue_size: usize,
}

impl Default for Distributor {
    fn default() -> Self {
        Self {
            queue_size: default_queue_size(),
            backend_queue_size: default_backend_queue_size(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct Backends {
    /// log every reading
    #[serde(default)]
    pub log: bool,
    #[serde(default)]
    pub memory: MemoryBackend,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MemoryBackend {
    /// how long to keep rain observations
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Aprs {
    /// APRS-IS server, `host:port`
    pub server: String,
    /// delay before the first report, so the cache can fill
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: u64,
    #[serde(default = "default_health_interval")]
    pub health_interval_secs: u64,
    /// deadline for each network operation while transmitting
    #[serde(default = "default_transmit_timeout")]
    pub transmit_timeout_secs: u64,
    /// deadline for each network operation during health checks
    #[serde(default = "default_health_timeout")]
    pub health_timeout_secs: u64,
    /// report day-rain summed from stored observations instead of the
    /// station's own counter. only accurate once the memory backend has
    /// held data since local midnight
    #[serde(default)]
    pub compute_day_rain: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Station {
    /// must match `station_name` of incoming readings
    pub name: String,
    #[serde(default)]
    pub aprs: Option<StationAprs>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StationAprs {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub callsign: String,
    /// derived from the callsign when not given
    #[serde(default)]
    pub passcode: Option<String>,
    #[serde(default)]
    pub latitude: f64,
    #[serde(default)]
    pub longitude: f64,
    #[serde(default = "default_symbol_table")]
    pub symbol_table: String,
    #[serde(default = "default_symbol_code")]
    pub symbol_code: String,
    /// appended to every report
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_queue_size() -> usize {
    20
}

fn default_backend_queue_size() -> usize {
    10
}

fn default_retention_hours() -> u32 {
    48
}

fn default_initial_delay() -> u64 {
    15
}

fn default_report_interval() -> u64 {
    300
}

fn default_health_interval() -> u64 {
    90
}

fn default_transmit_timeout() -> u64 {
    3
}

fn default_health_timeout() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

fn default_symbol_table() -> String {
    "/".into()
}

fn default_symbol_code() -> String {
    "_".into()
}
