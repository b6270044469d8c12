//! Arena Server - real-time state-synchronization core
//!
//! Bridges many concurrent WebSocket connections to a single authoritative
//! simulation advanced at a fixed tick rate:
//! - one inbound and one outbound task per connection
//! - a hub task that serializes connect/disconnect/message events
//! - a tick driver that is the simulation's only logical caller
//!
//! No locks anywhere in the core; everything crosses task boundaries through
//! bounded channels.

pub mod app;
pub mod config;
pub mod game;
pub mod http;
pub mod util;
pub mod ws;
