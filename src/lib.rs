//! SPI-mode SD/MMC block device driver.
//!
//! Drives an SD or MMC card over a raw byte-serial bus and exposes it as a
//! byte-addressable device with fixed 512-byte blocks. The hardware seam is
//! the [`SpiBusOps`] capability (byte transfer, chip select, wait). Everything
//! above it lives in this crate: command framing, the two-branch bring-up
//! sequence, CSD capacity decoding, single-block transfers and the unaligned
//! byte-range merge.
//!
//! The driver is fully synchronous and assumes exclusive ownership of the bus
//! for the duration of each call. Callers serialize access to the one live
//! [`SdHost`] session.

#![cfg_attr(not(test), no_std)]

mod bus;
mod card;
mod config;
mod constants;
mod host;
mod response;

pub use bus::SpiBusOps;
pub use card::csd::{CsdGeometry, CsdRegister, ext_bits};
pub use card::{CardInfo, CardType};
pub use config::SdConfig;
pub use constants::BLOCK_SIZE;
pub use host::{DeviceStatus, SdHost, SdHostError, SdHostResult, SdIoError};
pub use response::R1Status;
