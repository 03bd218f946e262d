//! Buffered byte reader fed by a transport consumer.

use std::collections::VecDeque;

use tokio::sync::mpsc;

use crate::transport::{Consumer, TransportError};

/// Consumer half: forwards inbound chunks into the reader's channel.
pub(crate) struct StreamConsumer {
    tx: Option<mpsc::UnboundedSender<Vec<u8>>>,
}

impl Consumer for StreamConsumer {
    fn data_received(&mut self, data: &[u8]) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(data.to_vec());
        }
    }

    fn connection_lost(&mut self) {
        // Closing the channel wakes the reader with `Disconnected`.
        self.tx = None;
    }
}

/// Reader half.
pub(crate) struct ByteReader {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    buffer: VecDeque<u8>,
}

/// Create a connected consumer/reader pair.
pub(crate) fn byte_stream() -> (StreamConsumer, ByteReader) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        StreamConsumer { tx: Some(tx) },
        ByteReader {
            rx,
            buffer: VecDeque::new(),
        },
    )
}

impl ByteReader {
    async fn fill(&mut self) -> Result<(), TransportError> {
        match self.rx.recv().await {
            Some(chunk) => {
                self.buffer.extend(chunk);
                Ok(())
            }
            None => Err(TransportError::Disconnected),
        }
    }

    /// Read up to and including the first `delimiter`.
    pub(crate) async fn read_until(&mut self, delimiter: u8) -> Result<Vec<u8>, TransportError> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == delimiter) {
                return Ok(self.buffer.drain(..=pos).collect());
            }
            self.fill().await?;
        }
    }

    pub(crate) async fn read_exact(&mut self, len: usize) -> Result<Vec<u8>, TransportError> {
        while self.buffer.len() < len {
            self.fill().await?;
        }
        Ok(self.buffer.drain(..len).collect())
    }

    pub(crate) async fn read_byte(&mut self) -> Result<u8, TransportError> {
        let bytes = self.read_exact(1).await?;
        Ok(bytes[0])
    }

    /// Drop everything buffered or already queued, returning how many bytes
    /// were discarded. Bytes that arrive later are not affected.
    pub(crate) fn clear(&mut self) -> usize {
        let mut discarded = self.buffer.len();
        self.buffer.clear();
        while let Ok(chunk) = self.rx.try_recv() {
            discarded += chunk.len();
        }
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_until_spans_chunks() {
        let (mut consumer, mut reader) = byte_stream();
        consumer.data_received(b"xx");
        consumer.data_received(b"yC");
        consumer.data_received(b"rest");

        assert_eq!(reader.read_until(b'C').await.unwrap(), b"xxyC");
        assert_eq!(reader.read_exact(2).await.unwrap(), b"re");
    }

    #[tokio::test]
    async fn test_clear_discards_buffered_and_queued() {
        let (mut consumer, mut reader) = byte_stream();
        consumer.data_received(b"CCC");
        consumer.data_received(b"CC");

        assert_eq!(reader.read_byte().await.unwrap(), b'C');
        assert_eq!(reader.clear(), 4);

        consumer.data_received(&[0x06]);
        assert_eq!(reader.read_byte().await.unwrap(), 0x06);
    }

    #[tokio::test]
    async fn test_connection_lost_surfaces_disconnect() {
        let (mut consumer, mut reader) = byte_stream();
        consumer.data_received(b"a");
        consumer.connection_lost();

        assert_eq!(reader.read_byte().await.unwrap(), b'a');
        assert!(matches!(
            reader.read_byte().await,
            Err(TransportError::Disconnected)
        ));
    }
}
