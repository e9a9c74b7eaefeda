/// External interrupt handling
///
/// SIGINT/SIGTERM do not kill the process outright. They flip a watch flag
/// that the orchestrators race against each step, so the step's future is
/// dropped (helper processes die with it) and the cleanup path still runs.

use std::future::Future;
use tokio::sync::watch;
use tracing::warn;

use crate::core::error::{EngineError, EngineResult};

/// Resolves once SIGINT or SIGTERM arrives
pub async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Sending half, used by tests and by the signal listener
#[derive(Debug, Clone)]
pub struct InterruptTrigger {
    tx: watch::Sender<bool>,
}

impl InterruptTrigger {
    pub fn fire(&self) {
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct Interrupt {
    rx: watch::Receiver<bool>,
}

impl Interrupt {
    pub fn manual() -> (InterruptTrigger, Interrupt) {
        let (tx, rx) = watch::channel(false);
        (InterruptTrigger { tx }, Interrupt { rx })
    }

    /// Never fires
    pub fn never() -> Self {
        Self::manual().1
    }

    /// Fires on SIGINT/SIGTERM. Must be called inside a tokio runtime.
    pub fn from_signals() -> Self {
        let (trigger, interrupt) = Self::manual();
        tokio::spawn(async move {
            shutdown_signal().await;
            warn!("interrupt received, stopping after cleanup");
            trigger.fire();
        });
        interrupt
    }

    pub fn is_set(&self) -> bool {
        *self.rx.borrow()
    }

    /// Run `step` unless an interrupt arrives first
    pub async fn guard<T, F>(&self, step: F) -> EngineResult<T>
    where
        F: Future<Output = EngineResult<T>>,
    {
        if self.is_set() {
            return Err(EngineError::Interrupted);
        }

        let mut rx = self.rx.clone();
        let fired = async move {
            // A dropped sender (trigger gone) means no interrupt can come
            if rx.wait_for(|set| *set).await.is_err() {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = step => result,
            _ = fired => Err(EngineError::Interrupted),
        }
    }
}
