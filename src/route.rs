use anyhow::Result;
use flume::{Receiver, Sender};
use futures::future::join_all;

use crate::{consumer::StorageBackend, shutdown::ShutdownHandle, Reading};

#[cfg(test)]
mod test;

struct Route {
    name: &'static str,
    queue: Sender<Reading>,
    backend: Box<dyn StorageBackend>,
}

/// Fans every reading out to all storage backends.
///
/// Each backend gets its own bounded queue. A full queue blocks distribution
/// (and with it the incoming queue) until the backend catches up.
pub struct Distributor {
    routes: Vec<Route>,
    backend_queue_size: usize,
    properly_dropped: bool,
}

impl Distributor {
    pub fn new(backend_queue_size: usize) -> Self {
        Self {
            routes: vec![],
            backend_queue_size: backend_queue_size.max(1),
            properly_dropped: false,
        }
    }

    /// create a queue for `backend` and start it consuming
    pub async fn with_backend<B: StorageBackend + 'static>(
        &mut self,
        mut backend: B,
        shutdown: ShutdownHandle,
    ) -> Result<&mut Self> {
        let (queue, rx) = flume::bounded(self.backend_queue_size);
        backend.start_consuming(rx, shutdown).await?;
        info!(backend = backend.name(), "Storage backend started");
        self.routes.push(Route {
            name: backend.name(),
            queue,
            backend: Box::new(backend),
        });
        Ok(self)
    }

    pub fn backends(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.routes.iter().map(|route| route.name)
    }

    /// Hand a copy of `reading` to every backend, in registration order.
    /// Returns how many backends accepted it.
    pub async fn distribute(&self, reading: &Reading) -> usize {
        if self.routes.is_empty() {
            trace!(station = %reading.station_name, "No storage backends, dropping reading");
            return 0;
        }
        let mut delivered = 0;
        for route in &self.routes {
            match route.queue.send_async(reading.clone()).await {
                Ok(()) => delivered += 1,
                Err(_) => warn!(
                    backend = route.name,
                    station = %reading.station_name,
                    "Storage backend is no longer consuming, reading not delivered"
                ),
            }
        }
        delivered
    }

    /// distribute everything from `incoming` until shutdown, or until every
    /// sender is gone
    pub async fn run(&self, incoming: Receiver<Reading>, mut shutdown: ShutdownHandle) {
        loop {
            tokio::select! {
                _ = shutdown.wait_for_shutdown() => break,
                next = incoming.recv_async() => match next {
                    Ok(reading) => {
                        self.distribute(&reading).await;
                    }
                    Err(_) => {
                        debug!("Incoming reading queue closed");
                        break;
                    }
                }
            }
        }
        info!("Reading distribution stopped");
    }

    /// Close every backend.
    ///
    /// this MUST be called, you may NOT just drop the Distributor
    pub async fn close(mut self) {
        let backends = self
            .routes
            .drain(..)
            .map(|route| {
                drop(route.queue);
                debug!(backend = route.name, "Closing storage backend");
                route.backend.close()
            })
            .collect::<Vec<_>>();
        join_all(backends).await;
        self.properly_dropped = true;
    }
}

impl Drop for Distributor {
    fn drop(&mut self) {
        if !self.properly_dropped {
            error!("Distributor may NOT be dropped except through `close`");
        }
    }
}
