// ABOUTME: Interrupt flag shared by an orchestrator run and the process signal handler.
// ABOUTME: SIGINT/SIGTERM set the flag; waits observe it between poll iterations.

use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Read side of the abort flag.
#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

/// Write side of the abort flag.
#[derive(Debug, Clone)]
pub struct InterruptTrigger {
    tx: watch::Sender<bool>,
}

impl Interrupt {
    pub fn channel() -> (InterruptTrigger, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (InterruptTrigger { tx }, Interrupt { rx })
    }

    /// A flag nothing will ever set.
    pub fn never() -> Interrupt {
        let (trigger, interrupt) = Self::channel();
        // Dropping the sender leaves the value false forever.
        drop(trigger);
        interrupt
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set. Pends forever if the trigger side is gone
    /// without having fired.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|set| *set).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl InterruptTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Listens for SIGINT and SIGTERM for as long as it is alive.
#[derive(Debug)]
pub struct SignalGuard {
    interrupt: Interrupt,
    task: JoinHandle<()>,
}

impl SignalGuard {
    /// Install the handlers. Must be called inside a tokio runtime.
    pub fn install() -> Self {
        let (trigger, interrupt) = Interrupt::channel();
        let task = tokio::spawn(async move {
            let signal = wait_for_signal().await;
            tracing::warn!(signal, "received signal, aborting after the current step");
            trigger.trigger();
        });
        Self { interrupt, task }
    }

    pub fn interrupt(&self) -> Interrupt {
        self.interrupt.clone()
    }
}

impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = sigterm.recv() => "SIGTERM",
            }
        }
        Err(e) => {
            tracing::debug!(error = %e, "SIGTERM handler unavailable, listening for ctrl-c only");
            let _ = tokio::signal::ctrl_c().await;
            "SIGINT"
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "SIGINT"
}
