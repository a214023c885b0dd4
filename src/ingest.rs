//! UDP ingest: one JSON [`Reading`] per datagram.

use std::net::SocketAddr;

use anyhow::Result;
use flume::Sender;
use tokio::net::UdpSocket;

use crate::{shutdown::ShutdownHandle, Reading};

/// readings larger than this are dropped
const MAX_DATAGRAM: usize = 64 * 1024;

pub async fn bind(addr: SocketAddr) -> Result<UdpSocket> {
    let sock = UdpSocket::bind(addr).await?;
    info!("Listening for readings on {}", sock.local_addr()?);
    Ok(sock)
}

/// Receive readings on `sock` and queue them for distribution until shutdown.
///
/// Derived metrics the station left unset are filled in before queueing.
/// Malformed datagrams are logged and dropped.
pub async fn udp_ingest(
    sock: UdpSocket,
    queue: Sender<Reading>,
    mut shutdown: ShutdownHandle,
) -> Result<()> {
    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        tokio::select! {
            _ = shutdown.wait_for_shutdown() => break,
            recv = sock.recv_from(&mut buf) => {
                let (len, from) = recv?;
                let Some(reading) = parse(&buf[..len], from) else {
                    continue;
                };
                if queue.send_async(reading).await.is_err() {
                    warn!("Reading queue closed, stopping ingest");
                    break;
                }
            }
        }
    }
    debug!("Ingest stopped");
    Ok(())
}

fn parse(datagram: &[u8], from: SocketAddr) -> Option<Reading> {
    match serde_json::from_slice::<Reading>(datagram) {
        Ok(reading) => {
            trace!(%from, station = %reading.station_name, "received reading");
            Some(reading.with_derived_metrics())
        }
        Err(e) => {
            warn!("reading from {from} was malformed (failed to deserialize)\nerror: {e:?}");
            None
        }
    }
}
