//! Transport over any tokio byte stream (TCP, serial bridges, in-memory pipes).

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use super::traits::{Consumer, Transport, TransportError, WriteFuture};
use crate::state::StateMachine;

const READ_BUFFER_SIZE: usize = 4096;

/// Connection lifecycle of a [`StreamLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Connected,
    Closing,
    Closed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkState::Connected => write!(f, "connected"),
            LinkState::Closing => write!(f, "closing"),
            LinkState::Closed => write!(f, "closed"),
        }
    }
}

/// The installed consumer and whether it has been told the link is gone.
struct ConsumerSlot {
    consumer: Box<dyn Consumer>,
    lost: bool,
}

impl ConsumerSlot {
    fn notify_lost(&mut self) {
        if !self.lost {
            self.consumer.connection_lost();
            self.lost = true;
        }
    }
}

/// Wraps a consumer handed back after it was notified, so reinstalling it on
/// a closed link does not notify it twice.
struct AlreadyLost(Box<dyn Consumer>);

impl Consumer for AlreadyLost {
    fn data_received(&mut self, data: &[u8]) {
        self.0.data_received(data);
    }

    fn connection_lost(&mut self) {}
}

type SharedConsumer = Arc<Mutex<ConsumerSlot>>;

fn lock_consumer(consumer: &SharedConsumer) -> MutexGuard<'_, ConsumerSlot> {
    consumer.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Duplex link backed by a tokio stream.
///
/// A background task reads the stream and forwards every chunk to the
/// installed consumer. When the stream ends the consumer is told the
/// connection was lost and the link moves to [`LinkState::Closed`].
pub struct StreamLink {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    consumer: SharedConsumer,
    state: Arc<StateMachine<LinkState>>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl StreamLink {
    /// Wrap a connected stream, delivering inbound bytes to `consumer`.
    pub fn new<S>(stream: S, consumer: Box<dyn Consumer>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let consumer: SharedConsumer = Arc::new(Mutex::new(ConsumerSlot {
            consumer,
            lost: false,
        }));
        let state = Arc::new(lifecycle());

        let reader_task = tokio::spawn(read_loop(reader, consumer.clone(), state.clone()));

        Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            consumer,
            state,
            reader_task: Mutex::new(Some(reader_task)),
        }
    }

    /// Open a TCP connection (e.g. to a serial-over-TCP bridge).
    #[instrument(level = "info", skip(consumer))]
    pub async fn connect(
        address: &str,
        timeout: Duration,
        consumer: Box<dyn Consumer>,
    ) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(address))
            .await
            .map_err(|_| TransportError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| TransportError::ConnectFailed {
                address: address.to_string(),
                message: e.to_string(),
            })?;
        stream.set_nodelay(true)?;

        info!(address = %address, "Link connected");
        Ok(Self::new(stream, consumer))
    }

    pub fn state(&self) -> LinkState {
        self.state.state()
    }

    /// Resolve once the link has fully closed.
    pub async fn wait_closed(&self) {
        self.state.wait_for(LinkState::Closed).await
    }

    /// Shut down the write side and stop reading.
    pub async fn close(&self) {
        if self.state() == LinkState::Closed {
            return;
        }

        let task = self
            .reader_task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(task) = task {
            // The reader task is the only other writer of the state, so it is
            // stopped before this side takes over transitions.
            task.abort();
            let _ = task.await;
        }

        if self.state() != LinkState::Closed {
            let _ = self.state.transition(LinkState::Closing);
            if let Err(e) = self.writer.lock().await.shutdown().await {
                debug!(error = %e, "Shutdown failed");
            }
            shut_down(&self.consumer, &self.state);
        }
        info!("Link closed");
    }
}

fn lifecycle() -> StateMachine<LinkState> {
    StateMachine::new(
        [LinkState::Connected, LinkState::Closing, LinkState::Closed],
        LinkState::Connected,
    )
    .expect("initial link state is declared")
}

async fn read_loop<R>(mut reader: R, consumer: SharedConsumer, state: Arc<StateMachine<LinkState>>)
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => {
                debug!("Peer closed the stream");
                break;
            }
            Ok(n) => {
                trace!(len = n, "RX");
                lock_consumer(&consumer).consumer.data_received(&buf[..n]);
            }
            Err(e) => {
                warn!(error = %e, "Read failed");
                break;
            }
        }
    }

    shut_down(&consumer, &state);
}

/// Tell the consumer and move to `Closed` under the consumer lock, so a
/// consumer installed concurrently either sees the loss or sees `Closed`.
fn shut_down(consumer: &SharedConsumer, state: &StateMachine<LinkState>) {
    let mut slot = lock_consumer(consumer);
    slot.notify_lost();
    let _ = state.transition(LinkState::Closed);
}

impl Transport for StreamLink {
    fn write<'a>(&'a self, data: &'a [u8]) -> WriteFuture<'a> {
        Box::pin(async move {
            if self.state() != LinkState::Connected {
                return Err(TransportError::Disconnected);
            }

            let mut writer = self.writer.lock().await;
            writer.write_all(data).await?;
            writer.flush().await?;
            trace!(len = data.len(), "TX");
            Ok(())
        })
    }

    fn replace_consumer(&self, consumer: Box<dyn Consumer>) -> Box<dyn Consumer> {
        let mut slot = lock_consumer(&self.consumer);
        let previous = std::mem::replace(&mut slot.consumer, consumer);
        let previous: Box<dyn Consumer> = if std::mem::take(&mut slot.lost) {
            Box::new(AlreadyLost(previous))
        } else {
            previous
        };

        if self.state() == LinkState::Closed {
            slot.notify_lost();
        }
        previous
    }
}

impl Drop for StreamLink {
    fn drop(&mut self) {
        if let Some(task) = self
            .reader_task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
