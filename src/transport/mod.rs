//! # Transport Module
//!
//! The persistent duplex channel between a client and the chat server.
//!
//! ## Components
//!
//! - [`messages`] - JSON wire schema and inbound decoding
//! - [`DuplexChannel`] - outbound frame sink
//! - [`WsChannel`] - WebSocket client, bearer token at connect time
//! - [`MemoryChannel`] - in-process channel for tests and local peers
//! - [`Registry`] - per-id handler table; unregistering cancels locally

pub mod messages;

mod channel;
mod registry;
mod websocket;

pub use channel::{DuplexChannel, MemoryChannel};
pub use messages::{InboundMessage, WireMessage};
pub use registry::Registry;
pub use websocket::{WsChannel, TOKEN_HEADER};
