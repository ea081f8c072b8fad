//! Recursive dynamic value model for the Proteus configuration engine.
//!
//! This crate provides the two building blocks every other Proteus component
//! works in terms of:
//!
//! - [`Value`] — a tagged variant type (null, bool, int, float, string,
//!   sequence, mapping) so code can match exhaustively on what a path holds.
//! - [`Bag`] — a nested string-keyed mapping of values, addressed with
//!   dotted paths such as `"db.pool.max"`.
//!
//! Values parsed from heterogeneous formats (JSON, YAML, environment
//! variables) are normalized once at parse time: mapping keys are
//! lower-cased, non-string keys are stringified, and whole-number floats
//! collapse to integers. That guarantees the same logical document compares
//! equal no matter which format produced it.
//!
//! # Example
//!
//! ```
//! use proteus_bag::{Bag, Value};
//!
//! let mut defaults = Bag::new();
//! defaults.set("server.addr", "0.0.0.0:8080").unwrap();
//! defaults.set("server.workers", 4).unwrap();
//!
//! let mut overrides = Bag::new();
//! overrides.set("server.workers", 16).unwrap();
//!
//! defaults.merge(&overrides);
//! assert_eq!(defaults.get_int("server.workers", 0), 16);
//! assert_eq!(defaults.get_string("server.addr", ""), "0.0.0.0:8080");
//! ```
//!
//! A `Bag` performs no locking of its own; whatever owns one (a source, the
//! config façade) guards it with its own lock.

#![warn(missing_docs)]

mod bag;
mod error;
mod value;

pub use bag::Bag;
pub use error::{BagError, BagResult};
pub use value::Value;
