//! CSD register capture and capacity decoding.
//!
//! The CSD is a 128-bit register transferred as a 16-byte block. Bit 0 is
//! the least significant bit of the last transmitted byte, so bit `p` lives
//! in byte `15 - (p >> 3)`, bit `p & 7`.

use log::debug;

use crate::card::CardType;
use crate::constants::BLOCK_SIZE;

/// Extract the inclusive bit range `[lsb, msb]` from a 16-byte register.
///
/// `msb >= lsb`, range width at most 32. Bit 0 of the result corresponds to
/// `lsb`.
pub fn ext_bits(data: &[u8; 16], msb: u32, lsb: u32) -> u32 {
    debug_assert!(msb >= lsb);
    debug_assert!(msb - lsb < 32);
    debug_assert!(msb <= 127);

    let mut bits = 0u32;
    for i in 0..=(msb - lsb) {
        let position = lsb + i;
        let byte = 15 - (position >> 3) as usize;
        let bit = position & 0x7;
        let value = (data[byte] >> bit) & 1;
        bits |= (value as u32) << i;
    }
    bits
}

/// Geometry decoded from a captured CSD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsdGeometry {
    pub sector_count: u64,
    pub capacity_bytes: u64,
    /// Addressing unit implied by the register layout: block size for
    /// byte-addressed cards, 1 for block-addressed cards.
    pub addr_divisor: u32,
}

impl CsdGeometry {
    pub fn card_type(&self) -> CardType {
        if self.addr_divisor == 1 {
            CardType::SdV2
        } else {
            CardType::SdV1
        }
    }
}

/// A captured 128-bit card-specific data register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsdRegister(pub [u8; 16]);

impl CsdRegister {
    /// Structure version field, bits [127:126].
    pub fn structure_version(&self) -> u32 {
        ext_bits(&self.0, 127, 126)
    }

    /// Decode capacity. `None` for unknown structure versions.
    pub fn decode(&self) -> Option<CsdGeometry> {
        match self.structure_version() {
            0 => {
                // Standard capacity: byte addressing.
                let c_size = ext_bits(&self.0, 73, 62) as u64;
                let c_size_mult = ext_bits(&self.0, 49, 47);
                let read_bl_len = ext_bits(&self.0, 83, 80);

                let block_len = 1u64 << read_bl_len;
                let mult = 1u64 << (c_size_mult + 2);
                let block_count = (c_size + 1) * mult;
                let capacity_bytes = block_count * block_len;
                let sector_count = capacity_bytes / BLOCK_SIZE as u64;

                debug!(
                    "csd v0: c_size {} mult {} block_len {} -> {} sectors",
                    c_size, mult, block_len, sector_count
                );

                Some(CsdGeometry {
                    sector_count,
                    capacity_bytes,
                    addr_divisor: BLOCK_SIZE as u32,
                })
            }
            1 => {
                // High capacity: block addressing, 512 KiB granules.
                let hc_c_size = ext_bits(&self.0, 69, 48) as u64;
                let sector_count = (hc_c_size + 1) * 1024;

                debug!("csd v1: hc_c_size {} -> {} sectors", hc_c_size, sector_count);

                Some(CsdGeometry {
                    sector_count,
                    capacity_bytes: sector_count * BLOCK_SIZE as u64,
                    addr_divisor: 1,
                })
            }
            other => {
                debug!("unsupported csd structure {}", other);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Bit p of the register maps to bit p of the value when the 16 bytes are
    // read as one big-endian integer, which gives an independent reference
    // for ext_bits.
    fn reference_bits(value: u128, msb: u32, lsb: u32) -> u32 {
        let width = msb - lsb + 1;
        let mask = if width == 32 {
            u32::MAX as u128
        } else {
            (1u128 << width) - 1
        };
        ((value >> lsb) & mask) as u32
    }

    #[test]
    fn ext_bits_matches_big_integer_reference() {
        let patterns: [u128; 4] = [
            0,
            u128::MAX,
            0x0123_4567_89AB_CDEF_0123_4567_89AB_CDEF,
            0x8000_0000_0000_0000_0000_0000_0000_0001,
        ];
        for value in patterns {
            let raw = value.to_be_bytes();
            for lsb in (0u32..128).step_by(7) {
                for width in [1u32, 3, 8, 12, 22, 32] {
                    let msb = lsb + width - 1;
                    if msb > 127 {
                        continue;
                    }
                    assert_eq!(
                        ext_bits(&raw, msb, lsb),
                        reference_bits(value, msb, lsb),
                        "value {value:#x} range [{msb}:{lsb}]"
                    );
                }
            }
        }
    }

    fn csd_from_value(value: u128) -> CsdRegister {
        CsdRegister(value.to_be_bytes())
    }

    #[test]
    fn decodes_standard_capacity_layout() {
        // 1 GiB card: 512-byte blocks, c_size 4095, c_size_mult 7.
        let value: u128 = (4095u128 << 62) | (7u128 << 47) | (9u128 << 80);
        let geom = csd_from_value(value).decode().unwrap();

        assert_eq!(geom.addr_divisor, 512);
        assert_eq!(geom.card_type(), CardType::SdV1);
        assert_eq!(geom.capacity_bytes, 1 << 30);
        assert_eq!(geom.sector_count, (1 << 30) / 512);
    }

    #[test]
    fn decodes_high_capacity_layout() {
        let hc_c_size: u128 = 0x1000;
        let value: u128 = (1u128 << 126) | (hc_c_size << 48);
        let geom = csd_from_value(value).decode().unwrap();

        assert_eq!(geom.addr_divisor, 1);
        assert_eq!(geom.card_type(), CardType::SdV2);
        assert_eq!(geom.sector_count, (0x1000 + 1) * 1024);
        assert_eq!(geom.capacity_bytes, geom.sector_count * 512);
    }

    #[test]
    fn rejects_unknown_structure_version() {
        for version in [2u128, 3] {
            let value = version << 126;
            assert_eq!(csd_from_value(value).decode(), None);
        }
    }
}
