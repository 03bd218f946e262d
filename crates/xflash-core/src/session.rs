//! Flash session - high-level orchestrator for pushing an image to a device.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::checksum::crc16_ccitt;
use crate::events::{TracingObserver, TransferEvent, TransferObserver, TransferPhase};
use crate::payload::pad_to_multiple;
use crate::protocol::{BLOCK_SIZE, DEFAULT_MAX_FAILURES};
use crate::transport::{NullConsumer, StreamLink, Transport, TransportError};
use crate::xmodem::{TransferError, send_xmodem128_crc};

fn transfer_timed_out(secs: u64) -> TransferError {
    TransferError::Transport(TransportError::Timeout {
        timeout_ms: secs.saturating_mul(1000),
    })
}

/// Configuration for a flash session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Path to the firmware image.
    pub firmware_path: Option<String>,
    /// `host:port` of the byte-stream bridge in front of the device.
    pub address: Option<String>,
    /// NAK retries per packet.
    pub max_failures: usize,
    /// Link connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Overall transfer timeout in seconds, handshake included.
    pub transfer_timeout_secs: Option<u64>,
    /// Pad the image up to a whole number of blocks.
    pub pad_image: bool,
    /// Fill byte used for padding.
    pub pad_byte: u8,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            firmware_path: None,
            address: None,
            max_failures: DEFAULT_MAX_FAILURES,
            connect_timeout_ms: 1000,
            transfer_timeout_secs: None,
            pad_image: true,
            pad_byte: 0xFF,
        }
    }
}

impl SessionConfig {
    /// Load configuration from a TOML file
    pub fn load_from_file<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SessionConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<std::path::Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// Flash session - connects, then streams the image with XMODEM-CRC.
pub struct FlashSession<O: TransferObserver> {
    config: SessionConfig,
    observer: Arc<O>,
}

impl FlashSession<TracingObserver> {
    /// Create a new session with default tracing observer.
    pub fn new(config: SessionConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }
}

impl<O: TransferObserver + 'static> FlashSession<O> {
    /// Create a new session with a custom observer.
    pub fn with_observer(config: SessionConfig, observer: Arc<O>) -> Self {
        Self { config, observer }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    fn emit(&self, event: TransferEvent) {
        self.observer.on_event(&event);
    }

    fn load_image(&self) -> Result<Vec<u8>> {
        let path = self
            .config
            .firmware_path
            .as_deref()
            .ok_or_else(|| anyhow!("No firmware image configured"))?;

        info!(path = %path, "Loading firmware image");
        let image = std::fs::read(path).with_context(|| format!("Failed to read {}", path))?;
        self.prepare(image)
    }

    /// Apply the configured padding to a raw image.
    pub fn prepare(&self, image: Vec<u8>) -> Result<Vec<u8>> {
        if !self.config.pad_image {
            return Ok(image);
        }

        let padded = pad_to_multiple(&image, BLOCK_SIZE, self.config.pad_byte)?;
        if padded.len() != image.len() {
            debug!(
                original = image.len(),
                padded = padded.len(),
                "Padded image to block size"
            );
        }
        Ok(padded)
    }

    /// Run the complete session: load, connect, transfer, disconnect.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<()> {
        let data = self.load_image()?;
        let address = self
            .config
            .address
            .as_deref()
            .ok_or_else(|| anyhow!("No link address configured"))?;

        info!(address = %address, "Opening link");
        let link = StreamLink::connect(
            address,
            Duration::from_millis(self.config.connect_timeout_ms),
            Box::new(NullConsumer),
        )
        .await
        .with_context(|| format!("Failed to open link to {}", address))?;

        self.emit(TransferEvent::Connected {
            address: address.to_string(),
        });

        let result = self.transfer(&data, &link).await;

        link.close().await;
        self.emit(TransferEvent::Disconnected);

        result
    }

    /// Push `data` over an already connected transport.
    pub async fn transfer<T: Transport + ?Sized>(&self, data: &[u8], transport: &T) -> Result<()> {
        self.emit(TransferEvent::PhaseChanged {
            from: TransferPhase::Connecting,
            to: TransferPhase::Handshake,
        });

        let started = AtomicBool::new(false);
        let observer = &self.observer;
        let mut progress = |current: usize, total: usize| {
            if !started.swap(true, Ordering::Relaxed) {
                observer.on_event(&TransferEvent::PhaseChanged {
                    from: TransferPhase::Handshake,
                    to: TransferPhase::Transfer,
                });
            }
            observer.on_event(&TransferEvent::Progress {
                current: current as u64,
                total: total as u64,
            });
        };

        let send = send_xmodem128_crc(
            data,
            transport,
            crc16_ccitt,
            self.config.max_failures,
            Some(&mut progress),
        );

        let result = match self.config.transfer_timeout_secs {
            Some(secs) => match tokio::time::timeout(Duration::from_secs(secs), send).await {
                Ok(result) => result,
                Err(_) => Err(transfer_timed_out(secs)),
            },
            None => send.await,
        };

        match result {
            Ok(()) => {
                self.emit(TransferEvent::PhaseChanged {
                    from: TransferPhase::Transfer,
                    to: TransferPhase::Complete,
                });
                self.emit(TransferEvent::Complete);
                Ok(())
            }
            Err(e) => {
                let from = if started.load(Ordering::Relaxed) {
                    TransferPhase::Transfer
                } else {
                    TransferPhase::Handshake
                };
                self.emit(TransferEvent::PhaseChanged {
                    from,
                    to: TransferPhase::Error,
                });
                self.emit(TransferEvent::Error {
                    message: e.to_string(),
                });
                Err(e.into())
            }
        }
    }
}
