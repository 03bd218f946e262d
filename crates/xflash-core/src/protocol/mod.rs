//! Protocol module - XMODEM-128/CRC definitions.

pub mod constants;
pub mod packet;
pub mod response;

pub use constants::*;
pub use packet::{Packet, PacketError};
pub use response::Response;
