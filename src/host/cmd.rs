//! Command framing and response polling.
//!
//! Commands are 6 bytes: `0x40 | index`, the 32-bit argument big-endian, and
//! a closing byte. CRC checking stays disabled, so the closer is the fixed
//! CMD0 value for everything except CMD8, which is CRC-checked even in SPI
//! mode. The card answers with an R1 byte (bit 7 clear) after up to a few
//! filler bytes.

use log::trace;

use crate::bus::SpiBusOps;
use crate::constants::*;
use crate::host::{SdHost, SdHostError, SdHostResult};
use crate::response::R1Status;

impl<T: SpiBusOps> SdHost<T> {
    fn send_frame(&mut self, cmd: u8, arg: u32, crc: u8) {
        self.bus.set_select(true);
        self.bus.transfer_byte(0x40 | cmd);
        self.bus.transfer_byte((arg >> 24) as u8);
        self.bus.transfer_byte((arg >> 16) as u8);
        self.bus.transfer_byte((arg >> 8) as u8);
        self.bus.transfer_byte(arg as u8);
        self.bus.transfer_byte(crc);
    }

    // Clock filler bytes until a byte with bit 7 clear comes back.
    fn poll_r1(&mut self) -> Option<R1Status> {
        for _ in 0..self.config.command_attempts {
            let byte = self.bus.transfer_byte(FILL);
            if byte & 0x80 == 0 {
                return Some(R1Status::from_bits_truncate(byte));
            }
        }
        None
    }

    // Deassert select and clock one trailing filler byte so the card
    // releases the data line.
    pub(crate) fn release_bus(&mut self) {
        self.bus.set_select(false);
        self.bus.transfer_byte(FILL);
    }

    /// Run one command/response exchange, releasing the bus afterwards.
    pub(crate) fn command(&mut self, cmd: u8, arg: u32) -> SdHostResult<R1Status> {
        self.send_frame(cmd, arg, CMD_CRC_STUB);
        let response = self.poll_r1();
        self.release_bus();

        match response {
            Some(r1) => {
                trace!("cmd{}: {:?}", cmd, r1);
                Ok(r1)
            }
            None => {
                trace!("cmd{}: no response", cmd);
                Err(SdHostError::Timeout)
            }
        }
    }

    /// Like [`command`], but on success leaves select asserted for callers
    /// that must keep reading immediately (the CMD9 register payload). On
    /// timeout the bus is still released.
    ///
    /// [`command`]: SdHost::command
    pub(crate) fn command_keep_selected(&mut self, cmd: u8, arg: u32) -> SdHostResult<R1Status> {
        self.send_frame(cmd, arg, CMD_CRC_STUB);
        match self.poll_r1() {
            Some(r1) => {
                trace!("cmd{} (selected): {:?}", cmd, r1);
                Ok(r1)
            }
            None => {
                self.release_bus();
                Err(SdHostError::Timeout)
            }
        }
    }

    /// CMD8 with the voltage-range/check-pattern argument. Only the leading
    /// status byte drives the version branch; the 4 trailing reply bytes are
    /// read and discarded.
    pub(crate) fn send_if_cond(&mut self) -> SdHostResult<R1Status> {
        self.send_frame(CMD_SEND_IF_COND, IF_COND_CHECK_ARG, CMD8_CRC);
        let response = self.poll_r1();
        if response.is_some() {
            for _ in 0..4 {
                self.bus.transfer_byte(FILL);
            }
        }
        self.release_bus();
        response.ok_or(SdHostError::Timeout)
    }

    /// CMD58: read the 32-bit operating conditions register.
    pub(crate) fn read_ocr(&mut self) -> SdHostResult<(R1Status, u32)> {
        self.send_frame(CMD_READ_OCR, 0, CMD_CRC_STUB);
        match self.poll_r1() {
            Some(r1) => {
                let mut ocr = 0u32;
                for _ in 0..4 {
                    ocr = ocr << 8 | self.bus.transfer_byte(FILL) as u32;
                }
                self.release_bus();
                Ok((r1, ocr))
            }
            None => {
                self.release_bus();
                Err(SdHostError::Timeout)
            }
        }
    }
}
