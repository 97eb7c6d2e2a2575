//! Single-block data transfers.
//!
//! Payloads are framed by the 0xFE start token and trailed by two checksum
//! bytes that go unchecked while CRC is disabled. The same payload
//! primitives move 512-byte data blocks and the 16-byte CSD register.

use log::trace;

use crate::bus::SpiBusOps;
use crate::constants::*;
use crate::host::{SdHost, SdHostError, SdHostResult};

impl<T: SpiBusOps> SdHost<T> {
    /// Receive one framed payload into `buffer`.
    pub(crate) fn read_payload(&mut self, buffer: &mut [u8]) -> SdHostResult {
        self.bus.set_select(true);

        let mut started = false;
        for _ in 0..self.config.read_token_attempts {
            if self.bus.transfer_byte(FILL) == TOKEN_START_BLOCK {
                started = true;
                break;
            }
        }
        if !started {
            self.release_bus();
            return Err(SdHostError::MissingStartToken);
        }

        for byte in buffer.iter_mut() {
            *byte = self.bus.transfer_byte(FILL);
        }
        // Checksum, discarded.
        self.bus.transfer_byte(FILL);
        self.bus.transfer_byte(FILL);

        self.release_bus();
        Ok(())
    }

    /// Send one framed payload from `buffer` and wait out the busy window.
    pub(crate) fn write_payload(&mut self, buffer: &[u8]) -> SdHostResult {
        self.bus.set_select(true);

        self.bus.transfer_byte(TOKEN_START_BLOCK);
        for &byte in buffer {
            self.bus.transfer_byte(byte);
        }
        // Checksum bytes; CRC is disabled so filler is accepted.
        self.bus.transfer_byte(FILL);
        self.bus.transfer_byte(FILL);

        let token = self.bus.transfer_byte(FILL);
        if token & DATA_RESP_MASK != DATA_RESP_ACCEPTED {
            self.release_bus();
            trace!("data response token {:#04x}: block rejected", token);
            return Err(SdHostError::WriteRejected);
        }

        // The card holds the line at zero until the write finishes.
        let mut ready = false;
        for _ in 0..self.config.write_busy_attempts {
            if self.bus.transfer_byte(FILL) != 0 {
                ready = true;
                break;
            }
        }
        self.release_bus();

        if !ready {
            return Err(SdHostError::Timeout);
        }
        Ok(())
    }

    /// Read whole blocks into `buffer`, one CMD17 per 512-byte chunk.
    ///
    /// `buffer.len()` must be a multiple of the block size. The command
    /// argument is the block index scaled by the session's addressing
    /// divisor: byte addresses for standard capacity cards, block addresses
    /// for high capacity cards.
    pub(crate) fn read_blocks(&mut self, block: u64, buffer: &mut [u8]) -> SdHostResult {
        debug_assert!(buffer.len() % BLOCK_SIZE == 0);

        for (i, chunk) in buffer.chunks_mut(BLOCK_SIZE).enumerate() {
            let addr = self.card.block_address(block + i as u64);
            trace!("read block {} (addr {:#x})", block + i as u64, addr);

            let r1 = self.command(CMD_READ_SINGLE_BLOCK, addr)?;
            if !r1.is_ready() {
                return Err(SdHostError::CommandError);
            }
            self.read_payload(chunk)?;
        }
        Ok(())
    }

    /// Write whole blocks from `buffer`, one CMD24 per 512-byte chunk.
    pub(crate) fn write_blocks(&mut self, block: u64, buffer: &[u8]) -> SdHostResult {
        debug_assert!(buffer.len() % BLOCK_SIZE == 0);

        for (i, chunk) in buffer.chunks(BLOCK_SIZE).enumerate() {
            let addr = self.card.block_address(block + i as u64);
            trace!("write block {} (addr {:#x})", block + i as u64, addr);

            let r1 = self.command(CMD_WRITE_BLOCK, addr)?;
            if !r1.is_ready() {
                return Err(SdHostError::CommandError);
            }
            self.write_payload(chunk)?;
        }
        Ok(())
    }
}
