//! Firmware update adapter.
//!
//! Implements [`OtaPort`].  Update commands are decoded where they arrive
//! (the MQTT event task) and handed over through a bounded inbox; every
//! [`poll`](OtaPort::poll) applies at most one of them, so flash writes
//! happen on the main loop in step-sized pieces.

use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use log::warn;

use crate::app::ports::{OtaPort, OtaProgress};
use crate::error::OtaError;
use crate::ota::{OtaCommand, OtaManager};

/// Commands buffered between the network task and the main loop.
pub const OTA_INBOX_DEPTH: usize = 4;

/// Sending half of the update inbox, owned by the transport.
pub type OtaSender = SyncSender<OtaCommand>;

/// Decode one update message and queue it.  Returns `false` when the
/// message was dropped; the sender notices the gap at the next chunk.
pub fn deliver(inbox: &OtaSender, verb: &str, payload: &[u8]) -> bool {
    let command = match OtaCommand::decode(verb, payload) {
        Ok(command) => command,
        Err(e) => {
            warn!("OTA: dropping '{}' message: {}", verb, e);
            return false;
        }
    };
    match inbox.try_send(command) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!("OTA: inbox full, dropping '{}'", verb);
            false
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

pub struct OtaUpdater {
    manager: OtaManager,
    inbox: Receiver<OtaCommand>,
}

impl OtaUpdater {
    /// The updater and the sender the transport feeds it through.
    pub fn new() -> (Self, OtaSender) {
        let (tx, rx) = mpsc::sync_channel(OTA_INBOX_DEPTH);
        let updater = Self {
            manager: OtaManager::new(),
            inbox: rx,
        };
        (updater, tx)
    }

    pub fn manager(&self) -> &OtaManager {
        &self.manager
    }

    #[cfg(target_os = "espidf")]
    pub fn reboot(&self) -> ! {
        self.manager.reboot()
    }
}

impl OtaPort for OtaUpdater {
    fn poll(&mut self) -> Result<OtaProgress, OtaError> {
        if let Ok(command) = self.inbox.try_recv() {
            self.manager.apply(&command)?;
        }
        Ok(self.manager.progress())
    }
}
