//! # Key Exchange Module
//!
//! The Diffie-Hellman handshake between two users, carried by a remote
//! handshake service.
//!
//! ## Protocol
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        HANDSHAKE PROTOCOL                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Alice (initiator)        Handshake Service          Bob (responder)    │
//! │  ─────────────────        ─────────────────          ───────────────    │
//! │                                                                         │
//! │  initiate(bob, g, p, A) ─────►  status = 1                             │
//! │                                 initiatorPublic = A                    │
//! │                                                                         │
//! │  sleep ─► queryStatus           ◄───── queryStatus(alice)              │
//! │           (status 1)            ─────► status 1, A                     │
//! │                                                                         │
//! │                                 ◄───── complete(alice, B)              │
//! │                                 status = 2                  s = A^b    │
//! │                                 responderPublic = B                    │
//! │                                                                         │
//! │  sleep ─► queryStatus                                                  │
//! │           (status 2, B)                                                │
//! │  s = B^a                                                               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Components
//!
//! - [`KeyExchangeService`] - remote calls: initiate, complete, query status
//! - [`KeyExchangeCoordinator`] - per-peer state machine with bounded polling
//! - [`HandshakeSession`] - one peer's handshake state
//! - [`RemoteExchange`] - the service contract as JSON over a [`ServiceTransport`]
//! - [`LoopbackExchange`] - in-process service for local peers and tests

mod coordinator;
mod loopback;
mod service;
mod session;

pub use coordinator::{HandshakeOutcome, KeyExchangeCoordinator};
pub use loopback::{LoopbackClient, LoopbackExchange};
pub use service::{
    methods, AcceptedResponse, CompleteRequest, HandshakeState, InitiateRequest,
    KeyExchangeService, RemoteExchange, RemoteStatus, ServiceTransport, StatusRequest,
    StatusResponse,
};
pub use session::HandshakeSession;
