//! xflash-core: XMODEM-128/CRC firmware push over async byte links.
//!
//! The crate is organized into layers:
//!
//! - **Checksum**: the two CRC-16 variants (CCITT and Kermit style)
//! - **Protocol**: control symbols, packet framing, response classification
//! - **State**: named-state machine with async waiters
//! - **Transport**: duplex byte links with consumer hand-off (tokio stream, mock)
//! - **XMODEM**: the block transfer sender
//! - **Events**: Observer pattern for UI decoupling
//! - **Session**: High-level orchestrator
//!
//! # Example
//!
//! ```no_run
//! use xflash_core::session::{FlashSession, SessionConfig};
//!
//! # async fn flash() -> anyhow::Result<()> {
//! let config = SessionConfig {
//!     firmware_path: Some("firmware.gbl".to_string()),
//!     address: Some("192.168.1.20:6638".to_string()),
//!     ..Default::default()
//! };
//!
//! FlashSession::new(config).run().await?;
//! # Ok(())
//! # }
//! ```

pub mod checksum;
pub mod events;
pub mod payload;
pub mod protocol;
pub mod session;
pub mod state;
pub mod transport;
pub mod xmodem;

// Re-exports for convenience
pub use checksum::{ChecksumFn, Crc16, crc16_ccitt, crc16_kermit};
pub use events::{NullObserver, TracingObserver, TransferEvent, TransferObserver, TransferPhase};
pub use payload::pad_to_multiple;
pub use protocol::{BLOCK_SIZE, Packet, Response};
pub use session::{FlashSession, SessionConfig};
pub use state::{StateError, StateMachine};
pub use transport::{
    Consumer, ConsumerSwap, LinkState, MockTransport, StreamLink, Transport, TransportError,
};
pub use xmodem::{TransferError, send_xmodem128_crc};
