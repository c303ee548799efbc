//! # Mirror EVM Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # End-to-end flows through the service and engine
//!     ├── fixtures.rs   # Snapshot, schedule and request builders
//!     ├── self_destruct.rs
//!     ├── pricing.rs
//!     ├── codec.rs
//!     ├── frames.rs
//!     ├── versions.rs
//!     └── token_service.rs
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p mirror-evm-tests
//!
//! # By flow
//! cargo test -p mirror-evm-tests integration::pricing::
//!
//! # Benchmarks
//! cargo bench -p mirror-evm-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
