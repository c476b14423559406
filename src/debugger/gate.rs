use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::error::SessionError;

/// Fires once when the client sends `configurationDone`.
#[derive(Debug)]
pub struct ConfigurationSignal {
    tx: SyncSender<()>,
}

/// Held by the session; `launch` blocks on it.
#[derive(Debug)]
pub struct ConfigurationWaiter {
    rx: Receiver<()>,
}

/// Create a linked one-shot signal/waiter pair.
pub fn configuration_gate() -> (ConfigurationSignal, ConfigurationWaiter) {
    let (tx, rx) = sync_channel(1);
    (ConfigurationSignal { tx }, ConfigurationWaiter { rx })
}

impl ConfigurationSignal {
    pub fn fire(self) {
        // The waiter may already be gone if the session ended first.
        let _ = self.tx.send(());
    }
}

impl ConfigurationWaiter {
    /// Block until the signal fires. Fails if the signal is dropped unfired.
    pub fn wait(self) -> Result<(), SessionError> {
        self.rx.recv().map_err(|_| SessionError::ConfigurationAborted)
    }
}
