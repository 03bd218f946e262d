//! Simulated XMODEM-CRC receiver for integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use xflash_core::crc16_ccitt;
use xflash_core::protocol::{ACK, CAN, EOT, HANDSHAKE_CRC, NAK, PACKET_SIZE, SOH};
use xflash_core::Packet;

/// How the simulated device treats incoming packets.
#[derive(Debug, Default, Clone)]
pub struct ReceiverBehavior {
    /// Sequence numbers to NAK on their first delivery.
    pub nak_once: Vec<u8>,
    /// Sequence number to answer with CAN.
    pub cancel_at: Option<u8>,
}

/// Outcome of a simulated receive.
#[derive(Debug, PartialEq, Eq)]
pub enum Received {
    Complete(Vec<u8>),
    Cancelled(Vec<u8>),
}

/// Act as the device side: send `C` until the first packet shows up, then
/// ACK/NAK packets until EOT. The stream stays open; the caller decides when
/// the device hangs up.
pub async fn run_receiver<S>(stream: &mut S, behavior: ReceiverBehavior) -> std::io::Result<Received>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    tokio::time::sleep(Duration::from_millis(20)).await;

    let mut head = [0u8; 1];
    let mut handshakes = 0;
    loop {
        stream.write_all(&[HANDSHAKE_CRC]).await?;
        handshakes += 1;
        match tokio::time::timeout(Duration::from_millis(200), stream.read_exact(&mut head)).await {
            Ok(result) => {
                result?;
                break;
            }
            Err(_) if handshakes < 10 => continue,
            Err(_) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "sender never started",
                ));
            }
        }
    }

    let mut received = Vec::new();
    let mut naked = HashSet::new();
    let mut expected: u8 = 1;

    loop {
        match head[0] {
            EOT => {
                stream.write_all(&[ACK]).await?;
                return Ok(Received::Complete(received));
            }
            SOH => {
                let mut frame = vec![SOH; PACKET_SIZE];
                stream.read_exact(&mut frame[1..]).await?;

                let reply = match Packet::from_bytes(&frame, crc16_ccitt) {
                    Err(_) => NAK,
                    Ok(packet) if behavior.cancel_at == Some(packet.number()) => {
                        stream.write_all(&[CAN]).await?;
                        return Ok(Received::Cancelled(received));
                    }
                    Ok(packet)
                        if behavior.nak_once.contains(&packet.number())
                            && naked.insert(packet.number()) =>
                    {
                        NAK
                    }
                    Ok(packet) => {
                        assert_eq!(packet.number(), expected, "out of order packet");
                        received.extend_from_slice(packet.payload());
                        expected = expected.wrapping_add(1);
                        ACK
                    }
                };
                stream.write_all(&[reply]).await?;
            }
            other => panic!("unexpected byte from sender: 0x{:02X}", other),
        }

        stream.read_exact(&mut head).await?;
    }
}

/// Deterministic test image.
pub fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 256) as u8).collect()
}
