//! Byte transport abstraction.
//!
//! A [`Transport`] is a connected duplex byte channel. Outbound bytes are
//! written through the transport; inbound bytes are pushed to whichever
//! [`Consumer`] is currently installed. Protocol layers temporarily take over
//! the inbound side by swapping the consumer (see [`ConsumerSwap`]).
//!
//! [`ConsumerSwap`]: super::ConsumerSwap

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Failed to connect to {address}: {message}")]
    ConnectFailed { address: String, message: String },

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Link disconnected")]
    Disconnected,

    #[error("Timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxed future returned by [`Transport::write`].
pub type WriteFuture<'a> = Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>>;

/// Receiver of inbound bytes.
pub trait Consumer: Send {
    /// Called with each chunk of bytes read from the link, in order.
    fn data_received(&mut self, data: &[u8]);

    /// Called once when the link stops delivering data.
    fn connection_lost(&mut self) {}
}

/// Consumer that discards everything.
pub struct NullConsumer;

impl Consumer for NullConsumer {
    fn data_received(&mut self, _data: &[u8]) {
        // Do nothing
    }
}

/// Abstract duplex byte channel.
///
/// The trait is object-safe so it can be used as `&dyn Transport`.
pub trait Transport: Send + Sync {
    /// Write `data` and wait until it has been flushed to the link.
    fn write<'a>(&'a self, data: &'a [u8]) -> WriteFuture<'a>;

    /// Install `consumer` for inbound bytes, returning the one it replaces.
    fn replace_consumer(&self, consumer: Box<dyn Consumer>) -> Box<dyn Consumer>;
}
