use tokio::{select, signal::ctrl_c};

use super::ShutdownHandle;

/// trigger `handle` on ctrl+c. the listener gives up quietly if something else
/// triggers shutdown first
pub async fn trap_ctrl_c(mut handle: ShutdownHandle) {
    debug!("Trapping ctrl+c");
    tokio::spawn(async move {
        select! {
            res = ctrl_c() => {
                if let Err(e) = res {
                    error!("Failed to listen for ctrl_c signal - triggering shutdown: {e}");
                }
                info!("shutdown triggered");
                handle.trigger_shutdown();
            }
            _ = handle.wait_for_shutdown() => {}
        }
    });
}
