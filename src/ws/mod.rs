//! WebSocket transport: upgrade handling, per-connection loops, and the hub

pub mod handler;
pub mod hub;
pub mod protocol;

pub use handler::{connect, ws_handler, MAX_MESSAGE_SIZE, OUTBOUND_QUEUE_CAPACITY, WRITE_WAIT};
pub use hub::{ConnectionHub, Hub, HubClosed, HubEvent, HubHandle};
