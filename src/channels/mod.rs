//! Push channel: WebSocket supervision and event decoding.

pub mod events;
pub mod push;

pub use events::{EventDecoder, RawEvent};
pub use push::{ConnectionState, Connector, FrameStream, PushListener, WsConnector};
