//! # Logsync Testkit
//!
//! Testing utilities for logsync.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed inputs with the exact wire text they must produce
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A device store and a server store wired together
//!
//! ## Golden Vectors
//!
//! ```rust
//! use logsync_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, actual) in verify_all_vectors() {
//!     println!("{}: {} ({})", name, matches, actual);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use logsync_core::LogEvent;
//! use logsync_testkit::generators::log_event;
//!
//! proptest! {
//!     #[test]
//!     fn event_line_round_trips(event in log_event()) {
//!         prop_assert_eq!(LogEvent::decode(&event.encode()).unwrap(), event);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust,ignore
//! use logsync_sync::SyncConfig;
//! use logsync_testkit::fixtures::SyncFixture;
//!
//! let fixture = SyncFixture::new();
//! fixture.seed_device("device-7", 1, &[1, 2, 3]).await?;
//! fixture.session(SyncConfig::default()).run().await?;
//! assert!(fixture.converged().await?);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{FixtureSession, SyncFixture};
pub use generators::{events_for, log_event};
pub use vectors::{
    codec_vectors, descriptor_vectors, diff_vectors, event_vectors, verify_all_vectors,
    CodecVector, DescriptorVector, DiffVector, EventVector,
};
