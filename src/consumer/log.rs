use anyhow::Result;
use flume::Receiver;

use crate::{
    shutdown::{Shutdown, ShutdownHandle},
    Reading,
};

use super::{drain_queue, StorageBackend};

/// Writes a one-line summary of every reading to the log
#[derive(Default)]
pub struct LogBackend {
    shutdown: Option<Shutdown>,
}

impl LogBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for LogBackend {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn start_consuming(
        &mut self,
        queue: Receiver<Reading>,
        shutdown: ShutdownHandle,
    ) -> Result<()> {
        let local = Shutdown::nested(shutdown);
        tokio::spawn(drain_queue(
            self.name(),
            queue,
            local.handle(),
            |r: Reading| async move {
                info!(
                    station = %r.station_name,
                    at = %r.timestamp,
                    "temp {:.1}F hum {:.0}% wind {:.1}mph @ {:.0} baro {:.2}inHg day rain {:.2}in",
                    r.out_temp,
                    r.out_humidity,
                    r.wind_speed,
                    r.wind_dir,
                    r.barometer,
                    r.day_rain,
                );
                Ok(())
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
