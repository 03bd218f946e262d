//! 16-bit CRC engines.
//!
//! Two fixed parameter sets sharing polynomial 0x1021:
//! - [`CRC16_CCITT`]: init 0x0000, no reflection, no final XOR. Used by XMODEM-CRC.
//! - [`CRC16_KERMIT`]: init 0xFFFF, reflected in/out, final XOR 0xFFFF. Used by HDLC-lite framing.

use crc::{Algorithm, Crc};
use thiserror::Error;

/// Checksum function handed to the block transfer engine.
pub type ChecksumFn = fn(&[u8]) -> u16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("Unsupported CRC width: {width} bits (expected 16)")]
    UnsupportedWidth { width: u8 },
}

/// CCITT-style CRC-16 (same parameters as CRC-16/XMODEM).
pub const CRC16_CCITT: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0x0000,
    refin: false,
    refout: false,
    xorout: 0x0000,
    check: 0x31C3,
    residue: 0x0000,
};

/// Kermit-style CRC-16 (reflected, inverted).
pub const CRC16_KERMIT: Algorithm<u16> = Algorithm {
    width: 16,
    poly: 0x1021,
    init: 0xFFFF,
    refin: true,
    refout: true,
    xorout: 0xFFFF,
    check: 0x906E,
    residue: 0xF0B8,
};

const CCITT: Crc<u16> = Crc::<u16>::new(&CRC16_CCITT);
const KERMIT: Crc<u16> = Crc::<u16>::new(&CRC16_KERMIT);

/// A validated 16-bit CRC calculator.
pub struct Crc16 {
    algorithm: &'static Algorithm<u16>,
    crc: Crc<u16>,
}

impl Crc16 {
    /// Build a calculator, rejecting anything that is not a 16-bit algorithm.
    pub fn new(algorithm: &'static Algorithm<u16>) -> Result<Self, ChecksumError> {
        if algorithm.width != 16 {
            return Err(ChecksumError::UnsupportedWidth {
                width: algorithm.width,
            });
        }
        Ok(Self {
            algorithm,
            crc: Crc::<u16>::new(algorithm),
        })
    }

    pub fn checksum(&self, data: &[u8]) -> u16 {
        self.crc.checksum(data)
    }

    pub fn algorithm(&self) -> &'static Algorithm<u16> {
        self.algorithm
    }
}

impl std::fmt::Debug for Crc16 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Crc16")
            .field("poly", &format_args!("0x{:04X}", self.algorithm.poly))
            .field("init", &format_args!("0x{:04X}", self.algorithm.init))
            .field("refin", &self.algorithm.refin)
            .field("refout", &self.algorithm.refout)
            .field("xorout", &format_args!("0x{:04X}", self.algorithm.xorout))
            .finish()
    }
}

/// CRC used by XMODEM-CRC packets.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    CCITT.checksum(data)
}

/// CRC used by HDLC-lite frames.
pub fn crc16_kermit(data: &[u8]) -> u16 {
    KERMIT.checksum(data)
}
