//! XMODEM-128/CRC sender.
//!
//! The sender takes over the inbound side of a [`Transport`] for the duration
//! of a transfer, waits for the receiver's `C` handshake, then pushes 128-byte
//! packets one at a time, each acknowledged before the next is sent:
//!
//! ```text
//! receiver: C                ACK               NAK               ACK           ACK
//! sender:     SOH 01 FE ...      SOH 02 FD ...     SOH 02 FD ...     EOT
//! ```
//!
//! Every packet (and the final EOT) is retried on NAK at most `max_failures`
//! times. CAN aborts immediately; any other response byte is fatal.

mod reader;

use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::checksum::ChecksumFn;
use crate::protocol::{BLOCK_SIZE, EOT, HANDSHAKE_CRC, Packet, Response};
use crate::transport::{ConsumerSwap, Transport, TransportError};
use reader::{ByteReader, byte_stream};

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Data length must be divisible by {block_size}: {len}")]
    InvalidInput { len: usize, block_size: usize },

    #[error("Received {attempts} consecutive failures")]
    TooManyFailures { attempts: usize },

    #[error("Transfer cancelled by receiver")]
    ReceiverCancelled,

    #[error("Invalid response: 0x{byte:02X}")]
    ProtocolViolation { byte: u8 },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Progress callback: `(bytes_sent, total_bytes)`.
pub type Progress<'a> = &'a mut (dyn FnMut(usize, usize) + Send);

/// Whole blocks of `data`. Length is checked by the caller, so no tail is dropped.
fn blocks(data: &[u8]) -> impl Iterator<Item = &[u8; BLOCK_SIZE]> {
    data.chunks_exact(BLOCK_SIZE)
        .filter_map(|chunk| chunk.try_into().ok())
}

/// Send one frame until it is acknowledged.
async fn send_frame<T: Transport + ?Sized>(
    frame: &[u8],
    transport: &T,
    reader: &mut ByteReader,
    max_failures: usize,
) -> Result<(), TransferError> {
    for attempt in 0..=max_failures {
        debug!(len = frame.len(), attempt, "Sending frame");
        transport.write(frame).await?;

        let response = Response::from_byte(reader.read_byte().await?);
        debug!(response = %response, "Got response");

        match response {
            Response::Ack => return Ok(()),
            Response::Nak => warn!(attempt, "Got a NAK, retrying"),
            Response::Cancel => return Err(TransferError::ReceiverCancelled),
            Response::Unexpected(byte) => return Err(TransferError::ProtocolViolation { byte }),
        }
    }

    Err(TransferError::TooManyFailures {
        attempts: max_failures + 1,
    })
}

/// Send `data` to an XMODEM-128/CRC receiver over `transport`.
///
/// `data` must be a whole number of 128-byte blocks. The transport's current
/// consumer is restored on every exit path, including the returned future
/// being dropped before completion.
#[instrument(skip_all, fields(len = data.len(), max_failures = max_failures))]
pub async fn send_xmodem128_crc<T: Transport + ?Sized>(
    data: &[u8],
    transport: &T,
    checksum: ChecksumFn,
    max_failures: usize,
    mut progress: Option<Progress<'_>>,
) -> Result<(), TransferError> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(TransferError::InvalidInput {
            len: data.len(),
            block_size: BLOCK_SIZE,
        });
    }

    let total = data.len();
    let (consumer, mut reader) = byte_stream();
    let _swap = ConsumerSwap::install(transport, Box::new(consumer));

    let skipped = reader.read_until(HANDSHAKE_CRC).await?;
    info!(skipped = skipped.len() - 1, "Receiver ready");

    if let Some(cb) = progress.as_deref_mut() {
        cb(0, total);
    }

    // Best effort: receivers repeat `C` until they see a packet, so drop any
    // repeats that have already arrived. Later ones are not caught here.
    let discarded = reader.clear();
    if discarded > 0 {
        debug!(discarded, "Discarded bytes after handshake");
    }

    for (index, block) in blocks(data).enumerate() {
        let packet = Packet::for_block(index, block, checksum);
        send_frame(&packet.to_bytes(), transport, &mut reader, max_failures).await?;

        let sent = (index + 1) * BLOCK_SIZE;
        debug!(number = packet.number(), sent, total, "Block acknowledged");
        if let Some(cb) = progress.as_deref_mut() {
            cb(sent, total);
        }
    }

    send_frame(&[EOT], transport, &mut reader, max_failures).await?;
    info!(blocks = total / BLOCK_SIZE, "Transfer complete");

    Ok(())
}
