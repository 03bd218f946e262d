//! XMODEM-128/CRC packet framing.

use byteorder::{BigEndian, ByteOrder, ReadBytesExt};
use std::io::Cursor;
use thiserror::Error;

use super::constants::{BLOCK_SIZE, PACKET_SIZE, SOH};
use crate::checksum::ChecksumFn;

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Buffer too small: expected {expected}, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },
    #[error("Invalid start of header: 0x{actual:02X}")]
    InvalidHeader { actual: u8 },
    #[error("Sequence complement mismatch: seq 0x{number:02X}, complement 0x{complement:02X}")]
    ComplementMismatch { number: u8, complement: u8 },
    #[error("Checksum mismatch: expected 0x{expected:04X}, got 0x{actual:04X}")]
    ChecksumMismatch { expected: u16, actual: u16 },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One 128-byte block on the wire (133 bytes serialized).
///
/// Layout: `SOH | seq | 0xFF - seq | payload[128] | crc16 (BE)`
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    number: u8,
    payload: [u8; BLOCK_SIZE],
    crc: u16,
}

impl Packet {
    pub const SIZE: usize = PACKET_SIZE;

    pub fn new(number: u8, payload: [u8; BLOCK_SIZE], checksum: ChecksumFn) -> Self {
        Self {
            number,
            crc: checksum(&payload),
            payload,
        }
    }

    /// Packet for the 0-based block `index`; numbering starts at 1 and wraps at 256.
    pub fn for_block(index: usize, block: &[u8; BLOCK_SIZE], checksum: ChecksumFn) -> Self {
        Self::new(((index + 1) & 0xFF) as u8, *block, checksum)
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    pub fn complement(&self) -> u8 {
        0xFF - self.number
    }

    pub fn payload(&self) -> &[u8; BLOCK_SIZE] {
        &self.payload
    }

    pub fn crc(&self) -> u16 {
        self.crc
    }

    pub fn to_bytes(&self) -> [u8; PACKET_SIZE] {
        let mut buf = [0u8; PACKET_SIZE];
        buf[0] = SOH;
        buf[1] = self.number;
        buf[2] = self.complement();
        buf[3..3 + BLOCK_SIZE].copy_from_slice(&self.payload);
        BigEndian::write_u16(&mut buf[3 + BLOCK_SIZE..], self.crc);
        buf
    }

    /// Parse and validate a serialized packet, recomputing the CRC with `checksum`.
    pub fn from_bytes(data: &[u8], checksum: ChecksumFn) -> Result<Self, PacketError> {
        if data.len() < PACKET_SIZE {
            return Err(PacketError::BufferTooSmall {
                expected: PACKET_SIZE,
                actual: data.len(),
            });
        }

        let mut cursor = Cursor::new(data);
        let header = cursor.read_u8()?;
        if header != SOH {
            return Err(PacketError::InvalidHeader { actual: header });
        }

        let number = cursor.read_u8()?;
        let complement = cursor.read_u8()?;
        if complement != 0xFF - number {
            return Err(PacketError::ComplementMismatch { number, complement });
        }

        let mut payload = [0u8; BLOCK_SIZE];
        std::io::Read::read_exact(&mut cursor, &mut payload)?;

        let crc = cursor.read_u16::<BigEndian>()?;
        let expected = checksum(&payload);
        if crc != expected {
            return Err(PacketError::ChecksumMismatch {
                expected,
                actual: crc,
            });
        }

        Ok(Self {
            number,
            payload,
            crc,
        })
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Packet(#{} crc=0x{:04X})", self.number, self.crc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::crc16_ccitt;

    fn block(fill: u8) -> [u8; BLOCK_SIZE] {
        [fill; BLOCK_SIZE]
    }

    #[test]
    fn test_serialized_layout() {
        let payload: [u8; BLOCK_SIZE] = std::array::from_fn(|i| i as u8);
        let packet = Packet::for_block(0, &payload, crc16_ccitt);
        let bytes = packet.to_bytes();

        assert_eq!(bytes.len(), 133);
        assert_eq!(bytes[0], SOH);
        assert_eq!(bytes[1], 1);
        assert_eq!(bytes[2], 0xFE);
        assert_eq!(&bytes[3..131], payload.as_slice());

        let crc = crc16_ccitt(&payload);
        assert_eq!(bytes[131], (crc >> 8) as u8);
        assert_eq!(bytes[132], (crc & 0xFF) as u8);
    }

    #[test]
    fn test_embedded_crc_matches_recomputation() {
        let packet = Packet::for_block(4, &block(0xA5), crc16_ccitt);
        let bytes = packet.to_bytes();
        let embedded = u16::from_be_bytes([bytes[131], bytes[132]]);
        assert_eq!(embedded, crc16_ccitt(&bytes[3..131]));
    }

    #[test]
    fn test_sequence_wraps() {
        assert_eq!(Packet::for_block(254, &block(0), crc16_ccitt).number(), 255);
        let wrapped = Packet::for_block(255, &block(0), crc16_ccitt);
        assert_eq!(wrapped.number(), 0);
        assert_eq!(wrapped.complement(), 0xFF);
        assert_eq!(Packet::for_block(256, &block(0), crc16_ccitt).number(), 1);
    }

    #[test]
    fn test_from_bytes_accepts_valid_packet() {
        let packet = Packet::for_block(9, &block(0x3C), crc16_ccitt);
        let parsed = Packet::from_bytes(&packet.to_bytes(), crc16_ccitt).unwrap();
        assert_eq!(parsed, packet);
    }

    #[test]
    fn test_from_bytes_rejects_corruption() {
        let mut bytes = Packet::for_block(0, &block(0x11), crc16_ccitt).to_bytes();
        bytes[50] ^= 0x01;
        assert!(matches!(
            Packet::from_bytes(&bytes, crc16_ccitt),
            Err(PacketError::ChecksumMismatch { .. })
        ));

        let mut bytes = Packet::for_block(0, &block(0x11), crc16_ccitt).to_bytes();
        bytes[2] = 0x00;
        assert!(matches!(
            Packet::from_bytes(&bytes, crc16_ccitt),
            Err(PacketError::ComplementMismatch { .. })
        ));

        assert!(matches!(
            Packet::from_bytes(&[SOH, 1, 0xFE], crc16_ccitt),
            Err(PacketError::BufferTooSmall { .. })
        ));
    }
}
