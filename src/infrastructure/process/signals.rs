//! Shutdown propagation.
//!
//! A [`ShutdownToken`] pairs a cancellation token with the signal that
//! caused it, so supervisors can forward the same signal to their process
//! groups before escalating.

use std::sync::{Arc, OnceLock};

use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{info, warn};

use crate::domain::errors::DomainResult;

/// Cancellation handle shared by the fleet, its supervisors and the signal
/// forwarder.
#[derive(Debug, Clone, Default)]
pub struct ShutdownToken {
    token: CancellationToken,
    signal: Arc<OnceLock<Signal>>,
    inherited: Option<Arc<OnceLock<Signal>>>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel, recording `signal` unless an earlier one was recorded.
    pub fn trigger(&self, signal: Signal) {
        let _ = self.signal.set(signal);
        self.token.cancel();
    }

    /// The signal to forward: the one recorded here or on the parent, or
    /// SIGTERM.
    pub fn signal(&self) -> Signal {
        self.signal
            .get()
            .or_else(|| self.inherited.as_ref().and_then(|parent| parent.get()))
            .copied()
            .unwrap_or(Signal::SIGTERM)
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    /// A token cancelled with this one, that can also be cancelled alone
    /// without affecting the parent.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            signal: Arc::new(OnceLock::new()),
            inherited: Some(Arc::clone(&self.signal)),
        }
    }
}

/// Translate the first SIGINT or SIGTERM into `shutdown`.
pub fn spawn_signal_forwarder(shutdown: ShutdownToken) -> DomainResult<JoinHandle<()>> {
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;

    Ok(tokio::spawn(async move {
        let received = tokio::select! {
            _ = interrupt.recv() => Signal::SIGINT,
            _ = terminate.recv() => Signal::SIGTERM,
            () = shutdown.cancelled() => return,
        };
        warn!(signal = %received, "shutdown requested, stopping attempts");
        shutdown.trigger(received);
        info!("shutdown token cancelled");
    }))
}
