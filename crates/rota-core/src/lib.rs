//! Core types and trait definitions for the Rota schedule reconciler.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! slot identity, overlap detection, the base/override merge, batch
//! classification for the upsert writer, and the publish/version protocol.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod access;
pub mod batch;
pub mod entry;
pub mod error;
pub mod ingest;
pub mod local;
pub mod merge;
pub mod normalize;
pub mod overlap;
pub mod session;
pub mod store;
pub mod version;

pub use error::{Error, Result};
