//! # Replidiff Client
//!
//! Client-side engine for the differential sync protocol.
//!
//! This crate provides:
//! - [`SyncClient`] - working copy, shadow and the single-flight sync cycle
//! - [`SyncTransport`] / [`LocalStore`] - the injected capability seams
//! - [`HttpTransport`] - a CBOR-framed byte transport adapter
//! - [`ChangePublisher`] / [`Subscription`] - replay-latest change feed
//! - [`SyncScheduler`] - periodic sync on a fixed delay
//!
//! ## Architecture
//!
//! A sync cycle stages the diff between working copy and shadow as a
//! version-tagged edit, sends the whole pending queue to the server and
//! applies the server's response. Edits stay queued until a response
//! confirms the exact local version the client held when it sent them,
//! so delivery is at-least-once and survives lost responses.
//!
//! ## Key Invariants
//!
//! - At most one sync cycle runs at a time per client; concurrent calls
//!   are rejected, never queued
//! - Version counters never decrease
//! - The only suspension points are the injected transport and store
//!   calls

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
mod http;
mod scheduler;
mod store;
mod transport;
mod watch;

pub use config::ClientConfig;
pub use engine::SyncClient;
pub use error::{ClientError, ClientResult};
pub use http::{HttpClient, HttpTransport, LoopbackClient, LoopbackServer};
pub use scheduler::SyncScheduler;
pub use store::{FileStore, LocalStore, MemoryStore};
pub use transport::{MockTransport, SyncTransport};
pub use watch::{ChangePublisher, Subscription};
