//! Firmware update over the network, backed by the `esp-ota` crate.
//!
//! Flow: Begin → N × Chunk → Finalize → reboot
//!
//! Commands arrive as MQTT messages under `<prefix>/ota/`:
//!
//! | Verb       | Payload                                   |
//! |------------|-------------------------------------------|
//! | `begin`    | image size (u32 LE) ‖ SHA-256 (32 bytes)  |
//! | `chunk`    | byte offset (u32 LE) ‖ 1..=512 image bytes |
//! | `finalize` | empty                                     |
//! | `abort`    | empty                                     |
//!
//! The image digest is computed while the chunks are written and checked
//! before the partition is marked bootable.

use hmac_sha256::Hash;
use log::{info, warn};

use crate::app::ports::OtaProgress;
use crate::error::OtaError;

/// Largest image slice one `chunk` message may carry.
pub const OTA_CHUNK_MAX: usize = 512;

pub type ChunkData = heapless::Vec<u8, OTA_CHUNK_MAX>;

// ── Commands ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OtaCommand {
    Begin { size: u32, sha256: [u8; 32] },
    Chunk { offset: u32, data: ChunkData },
    Finalize,
    Abort,
}

impl OtaCommand {
    /// Decode one message.  `verb` is the topic level after `ota/`.
    pub fn decode(verb: &str, payload: &[u8]) -> Result<Self, OtaError> {
        match verb {
            "begin" => {
                let (size, rest) = split_u32(payload)?;
                let sha256 = rest.try_into().map_err(|_| OtaError::Malformed)?;
                Ok(Self::Begin { size, sha256 })
            }
            "chunk" => {
                let (offset, rest) = split_u32(payload)?;
                if rest.is_empty() {
                    return Err(OtaError::Malformed);
                }
                let data = ChunkData::from_slice(rest).map_err(|_| OtaError::Overflow)?;
                Ok(Self::Chunk { offset, data })
            }
            "finalize" => Ok(Self::Finalize),
            "abort" => Ok(Self::Abort),
            _ => Err(OtaError::Malformed),
        }
    }
}

fn split_u32(payload: &[u8]) -> Result<(u32, &[u8]), OtaError> {
    let (head, rest) = payload.split_first_chunk::<4>().ok_or(OtaError::Malformed)?;
    Ok((u32::from_le_bytes(*head), rest))
}

// ── Sessions ──────────────────────────────────────────────────

/// Largest image `begin` accepts: one 4 MiB app slot.
const IMAGE_SIZE_MAX: u32 = 0x40_0000;

/// One image transfer between `begin` and `finalize`.
struct Session {
    total: u32,
    written: u32,
    digest: [u8; 32],
    hasher: Hash,
    /// Open handle on the inactive app slot; dropping it discards the image.
    #[cfg(target_os = "espidf")]
    slot: esp_ota::OtaUpdate,
}

/// Receives an image into the inactive app slot and stages it for boot.
///
/// Off-device only the bookkeeping and the digest check run.
#[derive(Default)]
pub struct OtaManager {
    session: Option<Session>,
    staged: bool,
}

impl OtaManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self) -> OtaProgress {
        match (&self.session, self.staged) {
            (Some(s), _) => OtaProgress::Receiving {
                written: s.written,
                total: s.total,
            },
            (None, true) => OtaProgress::ReadyToReboot,
            (None, false) => OtaProgress::Idle,
        }
    }

    /// Apply one decoded command.  Any rejection drops the transfer in
    /// flight; the sender restarts from `begin`.
    pub fn apply(&mut self, command: &OtaCommand) -> Result<(), OtaError> {
        let result = match command {
            OtaCommand::Begin { size, sha256 } => self.begin(*size, sha256),
            OtaCommand::Chunk { offset, data } => self.write(*offset, data).map(drop),
            OtaCommand::Finalize => self.finalize(),
            OtaCommand::Abort => {
                self.abort();
                Ok(())
            }
        };
        if let Err(e) = &result {
            if self.session.take().is_some() {
                warn!("ota: transfer dropped ({})", e);
            }
        }
        result
    }

    pub fn begin(&mut self, size: u32, sha256: &[u8; 32]) -> Result<(), OtaError> {
        if self.session.is_some() || self.staged {
            return Err(OtaError::AlreadyInProgress);
        }
        if !(1..=IMAGE_SIZE_MAX).contains(&size) {
            return Err(OtaError::InvalidSize);
        }

        #[cfg(target_os = "espidf")]
        let slot = esp_ota::OtaUpdate::begin().map_err(|e| {
            warn!("ota: cannot open app slot: {:?}", e);
            OtaError::BeginFailed
        })?;

        self.session = Some(Session {
            total: size,
            written: 0,
            digest: *sha256,
            hasher: Hash::new(),
            #[cfg(target_os = "espidf")]
            slot,
        });
        info!("ota: receiving {} byte image", size);
        Ok(())
    }

    /// Append `data` at `offset`, which must equal the bytes written so
    /// far.  Returns the new total.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<u32, OtaError> {
        let session = self.session.as_mut().ok_or(OtaError::NotReceiving)?;
        if offset != session.written {
            return Err(OtaError::NonSequential);
        }
        let end = u32::try_from(data.len())
            .ok()
            .and_then(|len| session.written.checked_add(len))
            .filter(|end| *end <= session.total)
            .ok_or(OtaError::Overflow)?;

        #[cfg(target_os = "espidf")]
        session.slot.write(data).map_err(|e| {
            warn!("ota: slot write at {} failed: {:?}", offset, e);
            OtaError::WriteFailed
        })?;

        session.hasher.update(data);
        session.written = end;
        Ok(end)
    }

    /// Verify the digest and make the new image the boot target.
    pub fn finalize(&mut self) -> Result<(), OtaError> {
        match &self.session {
            None => return Err(OtaError::NotReceiving),
            Some(s) if s.written < s.total => return Err(OtaError::IncompleteTransfer),
            Some(_) => {}
        }
        let Some(session) = self.session.take() else {
            return Err(OtaError::NotReceiving);
        };

        if session.hasher.finalize() != session.digest {
            warn!("ota: image digest mismatch");
            return Err(OtaError::VerifyFailed);
        }

        #[cfg(target_os = "espidf")]
        {
            let mut image = session.slot.finalize().map_err(|e| {
                warn!("ota: image rejected by bootloader check: {:?}", e);
                OtaError::VerifyFailed
            })?;
            image.set_as_boot_partition().map_err(|e| {
                warn!("ota: cannot select new boot slot: {:?}", e);
                OtaError::BootSetFailed
            })?;
        }

        self.staged = true;
        info!("ota: image verified and staged");
        Ok(())
    }

    /// Discard any transfer or staged image.
    pub fn abort(&mut self) {
        if self.session.take().is_some() || self.staged {
            warn!("ota: update cancelled");
        }
        self.staged = false;
    }

    #[cfg(target_os = "espidf")]
    pub fn reboot(&self) -> ! {
        info!("ota: restarting into staged image");
        esp_ota::restart()
    }
}

// ── Rollback ──────────────────────────────────────────────────

/// Tell the bootloader the running image came up; otherwise it rolls
/// back to the previous slot on a later reset.
#[cfg(target_os = "espidf")]
pub fn confirm_running_image() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("ota: running image confirmed"),
        Err(e) => warn!("ota: could not confirm running image: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn confirm_running_image() {
    info!("ota: no rollback slot in simulation");
}
