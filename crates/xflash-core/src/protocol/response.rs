//! Single-byte receiver responses.

use std::fmt;

use super::constants::{ACK, CAN, NAK};

/// Classified response to a packet or EOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    /// Block accepted.
    Ack,
    /// Block rejected, resend it.
    Nak,
    /// Receiver aborted the transfer.
    Cancel,
    /// Anything else; the line is considered desynchronized.
    Unexpected(u8),
}

impl Response {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            ACK => Response::Ack,
            NAK => Response::Nak,
            CAN => Response::Cancel,
            other => Response::Unexpected(other),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Ack => write!(f, "ACK"),
            Response::Nak => write!(f, "NAK"),
            Response::Cancel => write!(f, "CAN"),
            Response::Unexpected(b) => write!(f, "0x{:02X}", b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::*;

    #[test]
    fn test_classification() {
        assert_eq!(Response::from_byte(ACK), Response::Ack);
        assert_eq!(Response::from_byte(NAK), Response::Nak);
        assert_eq!(Response::from_byte(CAN), Response::Cancel);
        assert_eq!(Response::from_byte(ETB), Response::Unexpected(ETB));
        assert_eq!(Response::from_byte(HANDSHAKE_CRC), Response::Unexpected(b'C'));
    }

    #[test]
    fn test_display() {
        assert_eq!(Response::Nak.to_string(), "NAK");
        assert_eq!(Response::Unexpected(0x43).to_string(), "0x43");
    }
}
