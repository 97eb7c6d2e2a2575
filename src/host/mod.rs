mod block;
mod cmd;
mod range;

use range::RangeOp;

use bitflags::bitflags;
use log::{debug, info, warn};

use crate::bus::SpiBusOps;
use crate::card::csd::CsdRegister;
use crate::card::{CardInfo, CardType};
use crate::config::SdConfig;
use crate::constants::*;
use crate::response::R1Status;

/// Driver-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SdHostError {
    /// No valid response within the retry budget. Fatal during bring-up,
    /// an I/O failure during block transfers.
    Timeout,
    /// The card reported unexpected R1 flags.
    CommandError,
    /// Data-response token after a written block was not the accept pattern.
    WriteRejected,
    /// No start-of-block token within the read budget.
    MissingStartToken,
    /// Request outside `[0, capacity)`; checked before any device access.
    OutOfBounds,
    /// Operation attempted before a successful `init`.
    NotInitialized,
    /// Reset, version probe or register decode did not recognise the card.
    UnsupportedCard,
}

pub type SdHostResult<T = ()> = Result<T, SdHostError>;

/// A byte-range failure carrying the bytes moved before the fault.
///
/// The mapper is not transactional: completed blocks stay written and the
/// partial count is reported alongside the cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdIoError {
    pub transferred: u64,
    pub cause: SdHostError,
}

impl SdIoError {
    fn rejected(cause: SdHostError) -> Self {
        SdIoError {
            transferred: 0,
            cause,
        }
    }
}

bitflags! {
    /// Facade status flags, derived from session state only.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DeviceStatus: u32 {
        const NOT_INITIALIZED = 1 << 0;
    }
}

/// SPI-mode SD/MMC device facade.
///
/// Owns the bus capability, the retry budgets and the single live session.
/// All operations are synchronous and run to completion or budget
/// exhaustion; chip select is released on every exit path.
pub struct SdHost<T: SpiBusOps> {
    bus: T,
    config: SdConfig,
    card: CardInfo,
}

impl<T: SpiBusOps> SdHost<T> {
    /// Create an uninitialized session over the given bus.
    pub fn new(bus: T, config: SdConfig) -> Self {
        SdHost {
            bus,
            config,
            card: CardInfo::new(),
        }
    }

    pub fn bus(&self) -> &T {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut T {
        &mut self.bus
    }

    pub fn card(&self) -> &CardInfo {
        &self.card
    }

    fn card_mut(&mut self) -> &mut CardInfo {
        &mut self.card
    }

    /// Bring the card up and latch its geometry.
    ///
    /// Runs the reset/probe/init state machine, captures and decodes the
    /// CSD, then pins the block length with CMD16. On any failure the
    /// session remains uninitialized and every operation is rejected.
    pub fn init(&mut self) -> SdHostResult {
        info!("sd card initialization started");
        self.card = CardInfo::new();

        let card_type = self.bring_up()?;
        self.card_mut().set_card_type(card_type);

        let csd = self.read_csd()?;
        let geometry = csd.decode().ok_or(SdHostError::UnsupportedCard)?;
        self.card_mut().set_sector_count(geometry.sector_count);
        // The register layout re-derives the addressing unit; keep it in
        // step with what bring-up chose.
        self.card_mut().set_addr_divisor(geometry.addr_divisor);

        // CMD16 is only meaningful for standard capacity cards but the
        // protocol wants it either way.
        let r1 = self.command(CMD_SET_BLOCKLEN, BLOCK_SIZE as u32)?;
        if !r1.is_ready() {
            warn!("set block length rejected: {:?}", r1);
            return Err(SdHostError::CommandError);
        }

        self.card_mut().set_initialized(true);
        info!(
            "sd card initialization complete: {:?}, {} sectors",
            self.card.card_type(),
            self.card.sector_count()
        );
        Ok(())
    }

    // Reset the card into SPI mode and drive it out of idle. Returns the
    // detected generation; the addressing divisor is set as a side effect.
    fn bring_up(&mut self) -> SdHostResult<CardType> {
        // Startup clocks with the card deselected.
        self.bus.set_select(false);
        for _ in 0..POWER_UP_FILL_BYTES {
            self.bus.transfer_byte(FILL);
        }

        // Cards may answer the first resets with garbage; repeat CMD0
        // unconditionally before checking one for a clean idle.
        for _ in 0..RESET_PREAMBLE_COMMANDS {
            let _ = self.command(CMD_GO_IDLE_STATE, 0);
        }
        let r1 = self.command(CMD_GO_IDLE_STATE, 0)?;
        if r1 != R1Status::IDLE {
            warn!("no card, or reset did not reach idle: {:?}", r1);
            return Err(SdHostError::UnsupportedCard);
        }

        // CMD8 tells v2 cards apart: v1 cards reject it as illegal.
        let probe = self.send_if_cond()?;
        if probe == R1Status::IDLE {
            self.bring_up_v2()
        } else if probe == (R1Status::IDLE | R1Status::ILLEGAL_COMMAND) {
            self.bring_up_v1()
        } else {
            warn!("not in idle state after interface probe: {:?}", probe);
            Err(SdHostError::UnsupportedCard)
        }
    }

    fn bring_up_v1(&mut self) -> SdHostResult<CardType> {
        for _ in 0..self.config.init_attempts {
            let _ = self.command(CMD_APP_CMD, 0);
            if let Ok(r1) = self.command(ACMD_SD_SEND_OP_COND, 0) {
                if r1.is_ready() {
                    self.card_mut().set_addr_divisor(BLOCK_SIZE as u32);
                    info!("card initialized: sd v1, byte addressing");
                    return Ok(CardType::SdV1);
                }
            }
        }

        warn!("timeout waiting for v1 card");
        Err(SdHostError::Timeout)
    }

    fn bring_up_v2(&mut self) -> SdHostResult<CardType> {
        for _ in 0..self.config.init_attempts {
            self.bus.wait_ms(self.config.v2_retry_wait_ms);
            // Drains card state; the value is not needed yet.
            let _ = self.read_ocr();
            let _ = self.command(CMD_APP_CMD, 0);
            if let Ok(r1) = self.command(ACMD_SD_SEND_OP_COND, OCR_HCS) {
                if r1.is_ready() {
                    // One more read to latch capacity mode.
                    if let Ok((_, ocr)) = self.read_ocr() {
                        debug!("ocr after init: {:#010x}", ocr);
                    }
                    self.card_mut().set_addr_divisor(1);
                    info!("card initialized: sd v2, block addressing");
                    return Ok(CardType::SdV2);
                }
            }
        }

        warn!("timeout waiting for v2 card");
        Err(SdHostError::Timeout)
    }

    // CMD9, then the 16-byte register payload while still selected.
    fn read_csd(&mut self) -> SdHostResult<CsdRegister> {
        let r1 = self.command_keep_selected(CMD_SEND_CSD, 0)?;
        if !r1.is_ready() {
            self.release_bus();
            warn!("csd request rejected: {:?}", r1);
            return Err(SdHostError::CommandError);
        }

        let mut raw = [0u8; 16];
        self.read_payload(&mut raw)?;
        Ok(CsdRegister(raw))
    }

    /// Read `dest.len()` bytes starting at `offset`.
    pub fn read(&mut self, offset: u64, dest: &mut [u8]) -> Result<u64, SdIoError> {
        self.apply_range(offset, RangeOp::Read(dest))
    }

    /// Write `src` starting at `offset`, merging partial blocks.
    pub fn write(&mut self, offset: u64, src: &[u8]) -> Result<u64, SdIoError> {
        self.apply_range(offset, RangeOp::Write(src))
    }

    /// Fill `[offset, offset + size)` with `0xFF`, merging partial blocks.
    pub fn erase(&mut self, offset: u64, size: u64) -> Result<u64, SdIoError> {
        self.apply_range(offset, RangeOp::Erase(size))
    }

    /// Current capacity in bytes, re-read from the card.
    ///
    /// Captures and decodes the register on every call rather than serving
    /// the value latched at init; returns 0 when the card no longer
    /// responds or reports an unknown register layout.
    pub fn capacity(&mut self) -> u64 {
        match self.read_csd() {
            Ok(csd) => csd.decode().map_or(0, |geometry| geometry.capacity_bytes),
            Err(e) => {
                warn!("capacity query failed: {:?}", e);
                0
            }
        }
    }

    /// Sector count latched at init.
    pub fn sector_count(&self) -> u64 {
        self.card.sector_count()
    }

    /// Fixed block size in bytes.
    pub fn block_size(&self) -> u64 {
        BLOCK_SIZE as u64
    }

    /// Ready/not-ready flags from the session state; no live card probe.
    pub fn status(&self) -> DeviceStatus {
        if self.card.is_initialized() {
            DeviceStatus::empty()
        } else {
            DeviceStatus::NOT_INITIALIZED
        }
    }
}
