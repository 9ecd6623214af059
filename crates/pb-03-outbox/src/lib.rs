//! # Outbox Subsystem (PB-03)
//!
//! Couples every committed state change with a guaranteed announcement on the
//! message bus, without distributed transactions.
//!
//! ## Architecture
//!
//! - **Domain Layer** (`domain/`): `WriteBatch`, `OutboxEntry`, the wire
//!   `OutboxEnvelope` and error types
//! - **Ports Layer** (`ports/`): `OutboxStore` (driven) and
//!   `OutboxPublisherApi` (driving)
//! - **Adapters** (`adapters/`): in-memory store, RocksDB store behind the
//!   `rocksdb` feature
//! - **Service Layer** (`service.rs`): `OutboxPublisher`, the scan loop
//!
//! ## Flow
//!
//! ```text
//!   caller ──commit(WriteBatch)──▶ ┌───────────────────────┐
//!                                  │ state rows + outbox   │  one atomic write
//!                                  └──────────┬────────────┘
//!                                             │ fetch_unpublished
//!                                  ┌──────────▼────────────┐
//!                                  │   OutboxPublisher     │──publish──▶ bus
//!                                  └──────────┬────────────┘
//!                                             │ mark_published (once)
//!                                             ▼
//! ```
//!
//! A crash between publish and mark yields a duplicate on the next scan.
//! Consumers dedupe on the bus message key, which is the entry id.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export public API
pub use adapters::memory::InMemoryOutboxStore;
#[cfg(feature = "rocksdb")]
pub use adapters::rocksdb_adapter::{RocksDbOutboxConfig, RocksDbOutboxStore};
pub use domain::entry::{OutboxEntry, OutboxEnvelope, OutboxEvent, UnpublishedStats, WriteBatch};
pub use domain::errors::{PublishError, StoreError};
pub use ports::inbound::OutboxPublisherApi;
pub use ports::outbound::OutboxStore;
pub use service::{OutboxPublisher, PublisherConfig, PublisherCounters, ScanReport};
