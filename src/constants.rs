//! Protocol constants for SPI-mode card access.

/// Fixed data block size. Standard capacity cards have variable block sizes,
/// high capacity cards fix it at 512; CMD16 pins both to 512.
pub const BLOCK_SIZE: usize = 512;

// Command indices (transmitted as 0x40 | index).
pub const CMD_GO_IDLE_STATE: u8 = 0; /* reset, enter SPI mode */
pub const CMD_SEND_IF_COND: u8 = 8; /* voltage probe, distinguishes v1/v2 */
pub const CMD_SEND_CSD: u8 = 9; /* card-specific data register */
pub const CMD_SET_BLOCKLEN: u8 = 16;
pub const CMD_READ_SINGLE_BLOCK: u8 = 17;
pub const CMD_WRITE_BLOCK: u8 = 24;
pub const CMD_APP_CMD: u8 = 55; /* prefix for application commands */
pub const CMD_READ_OCR: u8 = 58;
pub const ACMD_SD_SEND_OP_COND: u8 = 41;

/// Closing byte of the 6-byte frame. Valid CRC only for CMD0; every other
/// command runs with CRC checking disabled and reuses the same value.
pub const CMD_CRC_STUB: u8 = 0x95;
/// Closing byte for CMD8, which is CRC-checked even in SPI mode.
pub const CMD8_CRC: u8 = 0x87;
/// CMD8 argument: 2.7-3.6V range plus the 0xAA check pattern.
pub const IF_COND_CHECK_ARG: u32 = 0x0000_01AA;
/// High-capacity-support bit in the ACMD41 argument.
pub const OCR_HCS: u32 = 0x4000_0000;

/// Filler byte clocked out whenever the host only wants to read.
pub const FILL: u8 = 0xFF;
/// Start-of-block token framing every data payload.
pub const TOKEN_START_BLOCK: u8 = 0xFE;
/// Data-response token: low 5 bits of the byte returned after a written block.
pub const DATA_RESP_MASK: u8 = 0x1F;
pub const DATA_RESP_ACCEPTED: u8 = 0b0_0101;

/// Startup clocks sent with select deasserted before the reset sequence.
pub const POWER_UP_FILL_BYTES: usize = 16;
/// Unconditional CMD0s before the one whose response is checked; cards may
/// answer the first attempts with garbage.
pub const RESET_PREAMBLE_COMMANDS: usize = 5;
