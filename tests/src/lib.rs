//! # NAV Connector Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Signing and codec throughput
//! └── src/
//!     ├── fake_service.rs   # In-memory reporting service (Transport)
//!     └── integration/      # Connector flows against the fake service
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p nav-tests
//!
//! # Benchmarks
//! cargo bench -p nav-tests
//! ```

#![allow(dead_code)]

pub mod fake_service;

pub use fake_service::{FakeAccount, FakeInvoiceService, FakeTaxpayer};
