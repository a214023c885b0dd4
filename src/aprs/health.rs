use std::sync::Arc;

use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{session, Settings, Station, Verification};
use crate::{
    health::{HealthRecord, HealthSink, HealthStatus},
    shutdown::ShutdownHandle,
    Error,
};

/// health records are stored under this subsystem name
pub const SUBSYSTEM: &str = "aprs";

/// Checks that the APRS-IS server accepts our login, without sending anything
pub struct HealthMonitor {
    settings: Arc<Settings>,
    stations: Vec<Arc<Station>>,
    sink: Arc<dyn HealthSink>,
}

impl HealthMonitor {
    pub fn new(
        settings: Arc<Settings>,
        stations: Vec<Arc<Station>>,
        sink: Arc<dyn HealthSink>,
    ) -> Self {
        Self {
            settings,
            stations,
            sink,
        }
    }

    /// check immediately, then every health interval
    pub async fn run(self, mut shutdown: ShutdownHandle) {
        self.update().await;
        let period = self.settings.health_interval;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => break,
                _ = interval.tick() => {
                    self.update().await;
                }
            }
        }
        debug!("APRS health monitor stopped");
    }

    /// run one check and record the result
    pub async fn update(&self) -> HealthRecord {
        let record = self.check().await;
        match record.status {
            HealthStatus::Healthy => debug!("{}", record.message),
            HealthStatus::Unhealthy => warn!(
                "{}: {}",
                record.message,
                record.error.as_deref().unwrap_or("unknown error")
            ),
        }
        if let Err(e) = self.sink.update_health(SUBSYSTEM, record.clone()).await {
            error!("Failed to record APRS health: {e:#}");
        }
        record
    }

    /// log in as the first station and disconnect
    pub async fn check(&self) -> HealthRecord {
        let count = self.stations.len();
        let Some(station) = self.stations.first() else {
            return HealthRecord {
                status: HealthStatus::Unhealthy,
                message: "No APRS-enabled stations found".into(),
                error: None,
                timestamp: chrono::Utc::now(),
            };
        };
        match self.test_login(station).await {
            Ok(()) => HealthRecord::healthy(format!(
                "APRS-IS login test successful ({count} enabled station(s))"
            )),
            Err(e) => HealthRecord::unhealthy(
                format!("APRS-IS login test failed ({count} enabled station(s))"),
                e,
            ),
        }
    }

    async fn test_login(&self, station: &Station) -> Result<(), Error> {
        let mut session = session::handshake(
            &self.settings.server,
            &station.login(),
            self.settings.health_timeout,
            Verification::CaseInsensitive,
        )
        .await?;
        session.close().await;
        Ok(())
    }
}
