//! # Beacon Test Suite
//!
//! Cross-crate flows that need more than one subsystem running together.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Criterion benchmarks (envelope signing, canonical form)
//! └── src/integration/
//!     ├── e2e_job_flow.rs   # submit → negotiate → aggregate → broadcast → anchor
//!     ├── flows.rs          # outbox → bus → relay → hub delivery
//!     └── http_surface.rs   # node HTTP routes, roles and error bodies
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pb-tests
//! cargo test -p pb-tests integration::e2e_job_flow
//! cargo bench -p pb-tests
//! ```

#![allow(dead_code)]

pub mod integration;
