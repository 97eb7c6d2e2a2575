pub mod csd;

use crate::constants::BLOCK_SIZE;

/// Card generation detected during bring-up.
///
/// v1 cards (and MMC) address in bytes; v2 cards taking the high-capacity
/// init path address in blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardType {
    Unknown,
    SdV1,
    SdV2,
}

/// The live session owned by the device facade.
///
/// Created once, mutated only by bring-up and the capacity-refresh path.
/// The card generation is carried both as [`CardType`] and as the addressing
/// divisor the card expects: block index times divisor is the command
/// argument for block transfers (divisor 512 for byte-addressed standard
/// capacity cards, 1 for block-addressed high capacity cards).
#[derive(Debug, Clone, Copy)]
pub struct CardInfo {
    card_type: CardType,
    initialized: bool,
    addr_divisor: u32,
    sector_count: u64,
}

impl CardInfo {
    pub fn new() -> Self {
        CardInfo {
            card_type: CardType::Unknown,
            initialized: false,
            addr_divisor: BLOCK_SIZE as u32,
            sector_count: 0,
        }
    }

    pub fn card_type(&self) -> CardType {
        self.card_type
    }

    pub fn set_card_type(&mut self, card_type: CardType) {
        self.card_type = card_type;
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn set_initialized(&mut self, initialized: bool) {
        self.initialized = initialized;
    }

    pub fn addr_divisor(&self) -> u32 {
        self.addr_divisor
    }

    pub fn set_addr_divisor(&mut self, divisor: u32) {
        self.addr_divisor = divisor;
    }

    pub fn sector_count(&self) -> u64 {
        self.sector_count
    }

    pub fn set_sector_count(&mut self, sectors: u64) {
        self.sector_count = sectors;
    }

    /// Usable capacity in bytes, from the sector count latched at init.
    pub fn capacity_bytes(&self) -> u64 {
        self.sector_count * BLOCK_SIZE as u64
    }

    /// Command argument addressing the given block.
    pub fn block_address(&self, block: u64) -> u32 {
        (block * self.addr_divisor as u64) as u32
    }
}

impl Default for CardInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn addressing_follows_divisor() {
        let mut info = CardInfo::new();
        // Standard capacity: byte addresses.
        info.set_addr_divisor(BLOCK_SIZE as u32);
        assert_eq!(info.block_address(3), 3 * 512);
        // High capacity: block addresses.
        info.set_addr_divisor(1);
        assert_eq!(info.block_address(3), 3);
    }

    #[test]
    fn capacity_tracks_sector_count() {
        let mut info = CardInfo::new();
        assert_eq!(info.capacity_bytes(), 0);
        info.set_sector_count(4096);
        assert_eq!(info.capacity_bytes(), 4096 * 512);
    }
}
