//! Session transports
//!
//! - [`sse`]: event-stream variant, stream and messages on separate
//!   connections, correlated by session id
//! - [`streamable`]: unified variant, one request carries one exchange

pub mod sse;
pub mod streamable;

pub use sse::{SessionStream, SseTransport};
pub use streamable::{ExchangeReply, StreamableTransport};
