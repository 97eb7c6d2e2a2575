//! Hardware capability consumed by the driver.

/// Byte-serial bus operations the driver is built on.
///
/// The driver issues these deterministically; correctness depends only on
/// byte-for-byte fidelity, not on timing precision beyond [`wait_ms`] during
/// the v2 bring-up loop. Chip select is asserted and released by the driver
/// around every command and block transfer.
///
/// [`wait_ms`]: SpiBusOps::wait_ms
pub trait SpiBusOps {
    /// Shift one byte out and return the byte shifted in.
    fn transfer_byte(&mut self, tx: u8) -> u8;

    /// Drive the chip-select line; `true` selects the card.
    fn set_select(&mut self, selected: bool);

    /// Stall bus activity for `ms` milliseconds.
    fn wait_ms(&mut self, ms: u32);
}
