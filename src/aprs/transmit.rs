use std::sync::Arc;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use super::{report, session, CurrentReadings, Settings, Station, Verification};
use crate::{calc, calc::RainQuery, shutdown::ShutdownHandle, Error, Reading};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transmission {
    Sent,
    /// nothing has been received from the station yet
    NoReading,
}

/// Periodically reports the latest reading of one station to APRS-IS
pub struct Transmitter {
    station: Arc<Station>,
    settings: Arc<Settings>,
    cache: CurrentReadings,
    rain: Option<Arc<dyn RainQuery>>,
}

impl Transmitter {
    pub fn new(
        station: Arc<Station>,
        settings: Arc<Settings>,
        cache: CurrentReadings,
        rain: Option<Arc<dyn RainQuery>>,
    ) -> Self {
        Self {
            station,
            settings,
            cache,
            rain,
        }
    }

    /// one report shortly after start, then one every report interval
    pub async fn run(self, mut shutdown: ShutdownHandle) {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => return,
            _ = sleep(self.settings.initial_delay) => {}
        }
        self.tick().await;

        let period = self.settings.report_interval;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => break,
                _ = interval.tick() => self.tick().await,
            }
        }
        debug!(station = %self.station.name, "APRS reporting stopped");
    }

    async fn tick(&self) {
        match self.report().await {
            Ok(Transmission::Sent) => {}
            Ok(Transmission::NoReading) => debug!(
                station = %self.station.name,
                "No reading received yet, skipping APRS report"
            ),
            Err(e) => error!(
                station = %self.station.name,
                callsign = %self.station.callsign,
                "Failed to send APRS report: {e:#}"
            ),
        }
    }

    /// Send the latest reading, if there is one, over a fresh connection
    pub async fn report(&self) -> Result<Transmission, Error> {
        let Some(reading) = self.cache.latest(&self.station.name).await else {
            return Ok(Transmission::NoReading);
        };
        let day_rain = self.day_rain(&reading).await;
        let line = report::weather_report(&self.station, &reading, day_rain);

        let mut session = session::handshake(
            &self.settings.server,
            &self.station.login(),
            self.settings.transmit_timeout,
            Verification::CaseSensitive,
        )
        .await?;
        debug!(callsign = %self.station.callsign, "Sending APRS packet: {line}");
        session.send_line(&line).await?;
        info!(
            station = %self.station.name,
            callsign = %self.station.callsign,
            "Sent APRS report"
        );
        Ok(Transmission::Sent)
    }

    /// computed daily total when a rain source is attached, else the
    /// station's own counter
    async fn day_rain(&self, reading: &Reading) -> f32 {
        let Some(rain) = &self.rain else {
            return reading.day_rain;
        };
        match calc::daily_rainfall(rain.as_ref(), &self.station.name).await {
            Ok(total) => total,
            Err(e) => {
                warn!(
                    station = %self.station.name,
                    "Failed to calculate daily rainfall, using the station's value: {e:#}"
                );
                reading.day_rain
            }
        }
    }
}
