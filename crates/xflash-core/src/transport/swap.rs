//! Scoped consumer hand-off.

use tracing::trace;

use super::traits::{Consumer, Transport};

/// Installs a consumer on a transport for the lifetime of the guard.
///
/// The previous consumer is put back when the guard is dropped, which covers
/// early returns, `?` propagation, and the enclosing future being dropped
/// mid-await.
pub struct ConsumerSwap<'a, T: Transport + ?Sized> {
    transport: &'a T,
    previous: Option<Box<dyn Consumer>>,
}

impl<'a, T: Transport + ?Sized> ConsumerSwap<'a, T> {
    pub fn install(transport: &'a T, consumer: Box<dyn Consumer>) -> Self {
        let previous = transport.replace_consumer(consumer);
        trace!("Consumer installed");
        Self {
            transport,
            previous: Some(previous),
        }
    }
}

impl<T: Transport + ?Sized> Drop for ConsumerSwap<'_, T> {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            drop(self.transport.replace_consumer(previous));
            trace!("Consumer restored");
        }
    }
}
