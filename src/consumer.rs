use anyhow::Result;
use flume::Receiver;
use futures::Future;

use crate::{shutdown::ShutdownHandle, Reading};

pub mod log;
pub mod memory;

/// A destination for readings, fed through its own bounded queue by the
/// [`Distributor`](crate::route::Distributor).
#[async_trait]
pub trait StorageBackend: Send {
    fn name(&self) -> &'static str;

    /// start background work consuming `queue`. must return promptly
    async fn start_consuming(
        &mut self,
        queue: Receiver<Reading>,
        shutdown: ShutdownHandle,
    ) -> Result<()>;

    /// stop all background work and wait for it to finish
    async fn close(self: Box<Self>);
}

/// Feed every reading from `queue` to `handle`, until shutdown or until every
/// sender is gone. Errors from `handle` are logged and the loop continues.
pub async fn drain_queue<F, Fut>(
    backend: &'static str,
    queue: Receiver<Reading>,
    mut shutdown: ShutdownHandle,
    mut handle: F,
) where
    F: FnMut(Reading) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => {
                debug!(backend, "Shutdown requested, stopping reading consumer");
                break;
            }
            next = queue.recv_async() => match next {
                Ok(reading) => {
                    let station = reading.station_name.clone();
                    if let Err(e) = handle(reading).await {
                        error!(backend, %station, "Error handling reading: {e:#}");
                    }
                }
                Err(flume::RecvError::Disconnected) => {
                    debug!(backend, "Reading queue closed, stopping reading consumer");
                    break;
                }
            }
        }
    }
}
