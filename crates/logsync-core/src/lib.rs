//! # Logsync Core
//!
//! Pure primitives for log delta synchronization: ranges, sparse range sets,
//! the escaping codec, and the line encodings of events and descriptors.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Range`] - Inclusive interval of sequence numbers
//! - [`SortedRangeSet`] - Coalesced set of ranges; which ids exist
//! - [`LogEvent`] - One immutable log entry
//! - [`Descriptor`] - `(owner, log, range set)` summary of one log
//!
//! ## Wire formats
//!
//! ```text
//! range       5 | 2-6
//! range set   1-4,6,8,10-20
//! descriptor  <owner>,<log_id>,<range set>
//! event       <owner>,<log_id>,<id>,<time>,<type>[,<key>,<value>]*
//! ```
//!
//! Strings that may contain `,` or line breaks go through [`codec`].

pub mod codec;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod range;
pub mod range_set;
pub mod types;

pub use descriptor::Descriptor;
pub use error::{CoreError, Result};
pub use event::LogEvent;
pub use range::Range;
pub use range_set::{SortedRangeSet, FULL_SET};
pub use types::LogKey;
