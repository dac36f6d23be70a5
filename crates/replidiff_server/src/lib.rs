//! # Replidiff Server
//!
//! Server-side engine for the differential sync protocol.
//!
//! This crate provides:
//! - [`ServerEngine`] - reconciles one client message per `sync` call
//! - [`Persistence`] - the seam for shadow and record storage
//! - [`MemoryPersistence`] - the in-memory reference implementation
//! - Record-granular store reconciliation ([`StoreOp`], [`classify`])
//!
//! ## Key Invariants
//!
//! - One shadow per client replica, persisted independently
//! - An incoming edit is applied iff it targets the shadow's exact
//!   version pair; anything else is dropped with a warning
//! - The store is updated record by record, never bulk-replaced
//! - A patch failure aborts the call without rolling back store
//!   mutations already issued (at-least-once delivery)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod persistence;
mod reconcile;

pub use config::ServerConfig;
pub use engine::ServerEngine;
pub use error::{ServerError, ServerResult};
pub use persistence::{MemoryPersistence, Persistence};
pub use reconcile::{classify, StoreOp};
