use std::time::Duration;

use chrono::Utc;
use flume::{Receiver, Sender};
use tokio::time::timeout;
use tracing_test::traced_test;

use super::*;
use crate::shutdown::Shutdown;

/// hands its queue back to the test instead of consuming it
struct Tap {
    name: &'static str,
    out: Sender<Receiver<Reading>>,
}

#[async_trait]
impl StorageBackend for Tap {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn start_consuming(
        &mut self,
        queue: Receiver<Reading>,
        _shutdown: ShutdownHandle,
    ) -> Result<()> {
        self.out.send_async(queue).await?;
        Ok(())
    }

    async fn close(self: Box<Self>) {}
}

async fn tapped(
    names: &[&'static str],
    queue_size: usize,
    shutdown: &Shutdown,
) -> (Distributor, Vec<Receiver<Reading>>) {
    let (out, taps) = flume::unbounded();
    let mut distributor = Distributor::new(queue_size);
    for &name in names {
        distributor
            .with_backend(
                Tap {
                    name,
                    out: out.clone(),
                },
                shutdown.handle(),
            )
            .await
            .unwrap();
    }
    let queues = taps.drain().collect();
    (distributor, queues)
}

fn reading(station: &str, temp: f32) -> Reading {
    let mut r = Reading::new(station, Utc::now());
    r.out_temp = temp;
    r
}

#[tokio::test]
#[traced_test]
async fn every_backend_sees_every_reading_in_order() {
    let shutdown = Shutdown::new();
    let (distributor, queues) = tapped(&["a", "b", "c"], 10, &shutdown).await;
    assert_eq!(distributor.backends().collect::<Vec<_>>(), ["a", "b", "c"]);

    for i in 0..5 {
        assert_eq!(distributor.distribute(&reading("backyard", i as f32)).await, 3);
    }
    for queue in &queues {
        let temps = queue.drain().map(|r| r.out_temp).collect::<Vec<_>>();
        assert_eq!(temps, [0.0, 1.0, 2.0, 3.0, 4.0]);
    }
    distributor.close().await;
}

#[tokio::test]
#[traced_test]
async fn full_queue_blocks_distribution() {
    let shutdown = Shutdown::new();
    let (distributor, queues) = tapped(&["slow"], 1, &shutdown).await;

    distributor.distribute(&reading("backyard", 1.0)).await;
    // the queue holds one reading, the second must wait for the backend
    assert!(
        timeout(
            Duration::from_millis(50),
            distributor.distribute(&reading("backyard", 2.0))
        )
        .await
        .is_err(),
        "distribution did not block on a full queue"
    );

    let queue = queues[0].clone();
    let drain = tokio::spawn(async move {
        let first = queue.recv_async().await.unwrap();
        let second = queue.recv_async().await.unwrap();
        (first.out_temp, second.out_temp)
    });
    assert_eq!(distributor.distribute(&reading("backyard", 3.0)).await, 1);
    // the timed out send never happened
    assert_eq!(drain.await.unwrap(), (1.0, 3.0));
    distributor.close().await;
}

#[tokio::test]
#[traced_test]
async fn no_backends_is_a_noop() {
    let distributor = Distributor::new(10);
    assert_eq!(distributor.distribute(&reading("backyard", 1.0)).await, 0);
    distributor.close().await;
}

#[tokio::test]
#[traced_test]
async fn closed_backend_is_skipped() {
    let shutdown = Shutdown::new();
    let (distributor, mut queues) = tapped(&["gone", "alive"], 4, &shutdown).await;
    drop(queues.remove(0));
    assert_eq!(distributor.distribute(&reading("backyard", 1.0)).await, 1);
    assert!(logs_contain("no longer consuming"));
    assert_eq!(queues[0].len(), 1);
    distributor.close().await;
}

#[tokio::test]
#[traced_test]
async fn run_stops_on_shutdown() {
    let shutdown = Shutdown::new();
    let (distributor, queues) = tapped(&["a"], 4, &shutdown).await;
    let (tx, rx) = flume::bounded(4);
    tx.send_async(reading("backyard", 7.0)).await.unwrap();

    let handle = shutdown.handle();
    let run = async {
        distributor.run(rx, handle).await;
    };
    let check = async {
        let got = queues[0].recv_async().await.unwrap();
        assert_eq!(got.out_temp, 7.0);
        shutdown.trigger_shutdown();
    };
    timeout(Duration::from_secs(1), futures::future::join(run, check))
        .await
        .expect("distributor did not stop on shutdown");
    distributor.close().await;
}
