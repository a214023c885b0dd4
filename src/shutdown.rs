use tokio::sync::{mpsc, watch};

pub mod util;

/// A clonable view of the shared shutdown signal.
///
/// Holding a handle also keeps [`Shutdown::wait_for_completion`] from
/// returning, so every long running task should own one and drop it on exit.
#[derive(Debug)]
pub struct ShutdownHandle {
    #[allow(unused)]
    inner: mpsc::Sender<()>,
    listener: watch::Receiver<bool>,
    trigger: watch::Sender<bool>,
}

impl ShutdownHandle {
    /// resolves once shutdown has been triggered (immediately, if it already was)
    pub async fn wait_for_shutdown(&mut self) {
        // an error means the `Shutdown` itself is gone, which is as good as a shutdown
        let _ = self.listener.wait_for(|triggered| *triggered).await;
    }

    pub fn is_shutdown(&self) -> bool {
        *self.listener.borrow()
    }

    pub fn trigger_shutdown(&self) {
        self.trigger.send_replace(true);
    }
}

impl Clone for ShutdownHandle {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            listener: self.listener.clone(),
            trigger: self.trigger.clone(),
        }
    }
}

pub struct Shutdown {
    tx: Option<mpsc::Sender<()>>,
    rx: mpsc::Receiver<()>,
    trigger: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        let (trigger, _) = watch::channel(false);
        Self {
            tx: Some(tx),
            rx,
            trigger,
        }
    }

    /// A `Shutdown` that is also triggered by `parent`, for subsystems that
    /// must be stoppable on their own.
    ///
    /// `parent` is held (keeping the parent's completion waiting) until either
    /// side triggers. Must be called within a tokio runtime.
    pub fn nested(mut parent: ShutdownHandle) -> Self {
        let child = Self::new();
        let mut local = child.handle();
        tokio::spawn(async move {
            tokio::select! {
                _ = parent.wait_for_shutdown() => local.trigger_shutdown(),
                _ = local.wait_for_shutdown() => {}
            }
        });
        child
    }

    /// # Panics
    /// if called after [`Shutdown::wait_for_completion`]
    pub fn handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            inner: self
                .tx
                .clone()
                .expect("Shutdown::handle called after wait_for_completion"),
            listener: self.trigger.subscribe(),
            trigger: self.trigger.clone(),
        }
    }

    /// wait for every outstanding [`ShutdownHandle`] to be dropped
    pub async fn wait_for_completion(&mut self) {
        drop(self.tx.take());
        self.rx.recv().await;
    }

    pub fn trigger_shutdown(&self) {
        self.trigger.send_replace(true);
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
