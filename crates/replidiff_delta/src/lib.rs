//! # Replidiff Delta
//!
//! Structural diff/patch engine over id-keyed JSON snapshots.
//!
//! This crate provides the delta capability the sync protocol consumes:
//! - [`DeltaEngine`] - the two-operation diff/patch contract
//! - [`JsonDeltaEngine`] - the default engine over `serde_json::Value`
//! - [`Delta`] / [`ValueDelta`] - the serializable change encoding
//!
//! ## Design Principles
//!
//! - Snapshots are diffed in id-keyed form so reordering is never an edit
//! - Deltas are opaque to the protocol and serializable for transport
//! - `patch` never mutates its inputs, even on failure
//! - Updating a record absent from the base is an error; the snapshot
//!   layer upstream decides whether to resurrect and retry

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod delta;
mod engine;
mod error;

pub use delta::{Delta, KeyedSnapshot, ValueDelta};
pub use engine::{DeltaEngine, DeltaOptions, JsonDeltaEngine};
pub use error::{DeltaError, DeltaResult};
