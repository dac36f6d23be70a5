//! # Replidiff Protocol
//!
//! Shared types and helpers for the differential sync protocol.
//!
//! This crate provides:
//! - The [`Record`] contract (stable unique string id, diffable payload)
//! - Wire/version types: [`Edit`], [`EditsMessage`], [`Shadow`],
//!   [`ClientDocument`]
//! - Snapshot keying and the resurrect-from-history recovery policy
//! - A CBOR wire codec for [`EditsMessage`]
//!
//! ## Key Invariants
//!
//! - `local_version` grows by exactly 1 per staged outbound edit
//! - `remote_version` grows by exactly 1 per accepted peer edit
//! - An edit is acceptable iff it targets the receiver shadow's exact
//!   version pair; anything else is stale or duplicate and is dropped
//! - A shadow copy always equals the last mutually-exchanged state

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod messages;
mod record;
mod shadow;
mod snapshot;
mod wire;

pub use error::{ProtocolError, ProtocolResult};
pub use messages::{Edit, EditsMessage};
pub use record::Record;
pub use shadow::{ClientDocument, Shadow};
pub use snapshot::{diff_snapshots, from_keyed, patch_snapshot, to_keyed};
pub use wire::{decode_message, encode_message};
