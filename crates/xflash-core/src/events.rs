//! Event system for UI decoupling.
//!
//! Allows the CLI (or any other front end) to follow a flashing session
//! without coupling to the transfer engine.

use std::fmt;

/// Session phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    /// Opening the link.
    Connecting,
    /// Waiting for the receiver's `C`.
    Handshake,
    /// Packets in flight.
    Transfer,
    /// All blocks and EOT acknowledged.
    Complete,
    /// Error state.
    Error,
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferPhase::Connecting => write!(f, "Connecting"),
            TransferPhase::Handshake => write!(f, "Handshake"),
            TransferPhase::Transfer => write!(f, "Transfer"),
            TransferPhase::Complete => write!(f, "Complete"),
            TransferPhase::Error => write!(f, "Error"),
        }
    }
}

/// Events emitted by a flashing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferEvent {
    /// Link opened.
    Connected { address: String },
    /// Link closed.
    Disconnected,
    /// Phase changed.
    PhaseChanged {
        from: TransferPhase,
        to: TransferPhase,
    },
    /// Bytes acknowledged so far.
    Progress { current: u64, total: u64 },
    /// Session failed.
    Error { message: String },
    /// Image fully transferred.
    Complete,
}

/// Observer trait for receiving session events.
///
/// Implement this trait in your UI layer to receive updates.
pub trait TransferObserver: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: &TransferEvent);
}

/// No-op observer that discards all events.
pub struct NullObserver;

impl TransferObserver for NullObserver {
    fn on_event(&self, _event: &TransferEvent) {
        // Do nothing
    }
}

/// Observer that logs events using tracing.
pub struct TracingObserver;

impl TransferObserver for TracingObserver {
    fn on_event(&self, event: &TransferEvent) {
        match event {
            TransferEvent::Connected { address } => {
                tracing::info!(address = %address, "Connected");
            }
            TransferEvent::Disconnected => {
                tracing::info!("Disconnected");
            }
            TransferEvent::PhaseChanged { from, to } => {
                tracing::info!(from = %from, to = %to, "Phase changed");
            }
            TransferEvent::Progress { current, total } => {
                let pct = if *total > 0 {
                    (*current * 100) / *total
                } else {
                    100
                };
                tracing::info!(current, total, progress = %format!("{}%", pct), "Progress");
            }
            TransferEvent::Error { message } => {
                tracing::error!("Error: {}", message);
            }
            TransferEvent::Complete => {
                tracing::info!("Operation complete");
            }
        }
    }
}
