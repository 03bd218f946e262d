//! XMODEM control symbols and framing constants.

/// Payload bytes per packet.
pub const BLOCK_SIZE: usize = 128;

/// SOH + seq + complement + payload + CRC16.
pub const PACKET_SIZE: usize = 3 + BLOCK_SIZE + 2;

/// Default number of NAK retries per packet before giving up.
pub const DEFAULT_MAX_FAILURES: usize = 3;

/// Receiver ready, CRC mode.
pub const HANDSHAKE_CRC: u8 = b'C';

// Control symbols
pub const SOH: u8 = 0x01; // Start of Header
pub const EOT: u8 = 0x04; // End of Transmission
pub const ACK: u8 = 0x06; // Acknowledge
pub const NAK: u8 = 0x15; // Not Acknowledge
pub const ETB: u8 = 0x17; // End of Transmission Block
pub const CAN: u8 = 0x18; // Cancel
