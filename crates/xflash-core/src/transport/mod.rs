//! Transport layer module.

pub mod mock;
pub mod stream;
pub mod swap;
pub mod traits;

pub use mock::{MockTransport, RecordingConsumer};
pub use stream::{LinkState, StreamLink};
pub use swap::ConsumerSwap;
pub use traits::{Consumer, NullConsumer, Transport, TransportError, WriteFuture};
