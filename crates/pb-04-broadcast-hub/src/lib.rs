//! # Broadcast Hub Subsystem (PB-04)
//!
//! Fans status-change messages out to any number of connected observers with
//! bounded memory. No observer can stall the producer or other observers.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `BroadcastMessage`, transport `Frame`,
//!   `HubConfig`, observer records and errors
//! - **Ports Layer** (`ports/`): `Broadcaster` (driving) and the frame
//!   sink/stream the pumps talk to (driven)
//! - **Service Layer** (`service.rs`): the coordinating `Hub` loop and its
//!   cloneable `HubHandle`
//! - **Connection** (`connection.rs`): reader and writer pumps for one
//!   observer
//! - **Adapters** (`adapters/`): axum WebSocket upgrade
//!
//! ## Coordinating Loop
//!
//! ```text
//!   register ───┐
//!   unregister ─┼─▶ control (awaited) ──┐
//!               │                       ├──▶ Hub loop ──try_send──▶ observer buffers (256)
//!   broadcast ──┴─▶ intake (try_send) ──┘        │                        │
//!                   full: drop + count           └── buffer full: evict   ▼
//!                                                                    writer pump ──▶ transport
//! ```
//!
//! Only the loop mutates the observer set. A read-only snapshot behind a
//! narrow `RwLock` serves `connection_count()`.
//!
//! ## Observer Lifecycle
//!
//! ```text
//!  Connecting ──▶ Registered ──▶ Active ⇄ ping
//!                      │            │
//!                      └────────────┴──▶ Disconnected
//! ```
//!
//! Transport error, close frame, eviction and hub shutdown all end in
//! `unregister`.

pub mod adapters;
pub mod connection;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::websocket::{hub_router, REQUEST_ID_HEADER};
pub use connection::{read_pump, serve_connection, write_pump};
pub use domain::config::HubConfig;
pub use domain::errors::HubError;
pub use domain::frame::Frame;
pub use domain::message::BroadcastMessage;
pub use domain::observer::{ObserverId, ObserverInfo, ObserverState};
pub use ports::inbound::Broadcaster;
pub use service::{Hub, HubCounters, HubHandle, Registration};
