//! APRS-IS weather reporting.
//!
//! [`AprsBackend`] is a storage backend like any other: it consumes readings
//! from its distributor queue, but instead of storing them it keeps the latest
//! one per station and periodically reports it to APRS-IS. A health monitor
//! checks that the configured server accepts our login.

use std::{sync::Arc, time::Duration};

use anyhow::Result;
use flume::Receiver;

use crate::{
    calc::RainQuery,
    config,
    consumer::{drain_queue, StorageBackend},
    health::HealthSink,
    shutdown::{Shutdown, ShutdownHandle},
    Error, Reading, SOFTWARE, VERSION,
};

pub mod cache;
pub mod encode;
pub mod health;
pub mod report;
pub mod session;
pub mod transmit;


pub use cache::CurrentReadings;
pub use health::HealthMonitor;
pub use session::{Login, Session, SessionState, Verification};
pub use transmit::Transmitter;

/// A station that reports to APRS-IS
#[derive(Debug, Clone, PartialEq)]
pub struct Station {
    /// the name readings from this station carry
    pub name: String,
    /// uppercased
    pub callsign: String,
    pub passcode: u16,
    pub latitude: f64,
    pub longitude: f64,
    pub symbol_table: char,
    pub symbol_code: char,
    pub comment: Option<String>,
}

impl Station {
    /// `Ok(None)` for stations that do not report to APRS-IS
    pub fn from_config(station: &config::Station) -> Result<Option<Self>, Error> {
        let Some(aprs) = station.aprs.as_ref().filter(|aprs| aprs.enabled) else {
            return Ok(None);
        };
        let callsign = aprs.callsign.trim().to_ascii_uppercase();
        if callsign.is_empty() {
            return Err(Error::Configuration(format!(
                "station {:?}: an APRS callsign is required",
                station.name
            )));
        }
        if aprs.latitude == 0.0 && aprs.longitude == 0.0 {
            return Err(Error::Configuration(format!(
                "station {:?}: a latitude and longitude are required for APRS",
                station.name
            )));
        }
        let passcode = match aprs.passcode.as_deref().map(str::trim) {
            None | Some("") => encode::passcode(&callsign),
            Some(configured) => configured.parse::<u16>().map_err(|_| {
                Error::Configuration(format!(
                    "station {:?}: APRS-IS passcode {configured:?} is not a number",
                    station.name
                ))
            })?,
        };
        Ok(Some(Self {
            name: station.name.clone(),
            callsign,
            passcode,
            latitude: aprs.latitude,
            longitude: aprs.longitude,
            symbol_table: aprs.symbol_table.chars().next().unwrap_or('/'),
            symbol_code: aprs.symbol_code.chars().next().unwrap_or('_'),
            comment: aprs.comment.clone().filter(|c| !c.trim().is_empty()),
        }))
    }

    pub fn login(&self) -> Login {
        Login {
            callsign: self.callsign.clone(),
            passcode: self.passcode,
            software: SOFTWARE.to_string(),
            version: VERSION.to_string(),
        }
    }
}

/// Server and timing settings shared by every transmitter and the health monitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// `host:port`
    pub server: String,
    pub initial_delay: Duration,
    pub report_interval: Duration,
    pub health_interval: Duration,
    pub transmit_timeout: Duration,
    pub health_timeout: Duration,
}

impl Settings {
    pub fn from_config(cfg: &config::Aprs) -> Result<Self, Error> {
        if cfg.server.trim().is_empty() {
            return Err(Error::Configuration(
                "an APRS-IS server (host:port) is required".into(),
            ));
        }
        Ok(Self {
            server: cfg.server.trim().to_string(),
            initial_delay: Duration::from_secs(cfg.initial_delay_secs),
            report_interval: Duration::from_secs(cfg.report_interval_secs),
            health_interval: Duration::from_secs(cfg.health_interval_secs),
            transmit_timeout: Duration::from_secs(cfg.transmit_timeout_secs),
            health_timeout: Duration::from_secs(cfg.health_timeout_secs),
        })
    }
}

/// every APRS-enabled station in `stations`, validated
pub fn stations_from_config(stations: &[config::Station]) -> Result<Vec<Station>, Error> {
    let mut enabled = vec![];
    for station in stations {
        if let Some(station) = Station::from_config(station)? {
            enabled.push(station);
        }
    }
    Ok(enabled)
}

pub struct AprsBackend {
    settings: Arc<Settings>,
    stations: Vec<Arc<Station>>,
    cache: CurrentReadings,
    rain: Option<Arc<dyn RainQuery>>,
    health: Arc<dyn HealthSink>,
    shutdown: Option<Shutdown>,
}

impl AprsBackend {
    pub fn new(
        settings: Settings,
        stations: Vec<Station>,
        health: Arc<dyn HealthSink>,
    ) -> Result<Self, Error> {
        if stations.is_empty() {
            return Err(Error::Configuration(
                "at least one station must have APRS enabled, with a callsign and location".into(),
            ));
        }
        let cache = CurrentReadings::new(stations.iter().map(|s| s.name.clone()));
        Ok(Self {
            settings: Arc::new(settings),
            stations: stations.into_iter().map(Arc::new).collect(),
            cache,
            rain: None,
            health,
            shutdown: None,
        })
    }

    pub fn from_config(
        cfg: &config::Aprs,
        stations: &[config::Station],
        health: Arc<dyn HealthSink>,
    ) -> Result<Self, Error> {
        Self::new(
            Settings::from_config(cfg)?,
            stations_from_config(stations)?,
            health,
        )
    }

    /// compute the reported day-rain from stored observations instead of
    /// trusting the station's own counter
    pub fn with_rain_source(mut self, rain: Arc<dyn RainQuery>) -> Self {
        self.rain = Some(rain);
        self
    }

    pub fn cache(&self) -> CurrentReadings {
        self.cache.clone()
    }
}

#[async_trait]
impl StorageBackend for AprsBackend {
    fn name(&self) -> &'static str {
        "aprs"
    }

    async fn start_consuming(
        &mut self,
        queue: Receiver<Reading>,
        shutdown: ShutdownHandle,
    ) -> Result<()> {
        if self.shutdown.is_some() {
            bail!("APRS backend is already running");
        }
        info!("starting APRS-IS storage backend");
        let local = Shutdown::nested(shutdown);

        let cache = self.cache.clone();
        tokio::spawn(drain_queue(
            self.name(),
            queue,
            local.handle(),
            move |reading: Reading| {
                let cache = cache.clone();
                async move {
                    if !cache.store(reading).await {
                        trace!("reading is from a station that does not report to APRS-IS");
                    }
                    Ok(())
                }
            },
        ));

        for station in &self.stations {
            info!(
                station = %station.name,
                callsign = %station.callsign,
                "Starting APRS reporting"
            );
            let transmitter = Transmitter::new(
                station.clone(),
                self.settings.clone(),
                self.cache.clone(),
                self.rain.clone(),
            );
            tokio::spawn(transmitter.run(local.handle()));
        }

        let monitor = HealthMonitor::new(
            self.settings.clone(),
            self.stations.clone(),
            self.health.clone(),
        );
        tokio::spawn(monitor.run(local.handle()));

        self.shutdown = Some(local);
        Ok(())
    }

    async fn close(mut self: Box<Self>) {
        if let Some(mut shutdown) = self.shutdown.take() {
            shutdown.trigger_shutdown();
            shutdown.wait_for_completion().await;
        }
        info!("APRS-IS storage backend stopped");
    }
}
