//! # Assist Harness Core
//!
//! Pure client-side state for Assist Harness: session identity, message
//! history, streaming aggregation, composition staging, the ingestion
//! catalog, and feedback reconciliation.
//!
//! This crate contains no tokio, no transport, and no filesystem I/O. Every
//! type here is a plain owned value mutated through its own operations; the
//! native `assist-harness` crate wires them to a backend and an event pump.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`ids`] | Smallest-unused session id allocation |
//! | [`models`] | Sessions, messages, feedback records, ingest files |
//! | [`session`] | Session store: create, select, rename, remove, append |
//! | [`stream`] | Streaming aggregator state machine |
//! | [`compose`] | Draft prompt, query intent, attachment staging |
//! | [`catalog`] | Ingestion catalog: de-dup, progress, outcomes, cancel |
//! | [`feedback`] | Feedback document reconciliation |
//! | [`events`] | Backend event values and upload outcome parsing |

pub mod catalog;
pub mod compose;
pub mod events;
pub mod feedback;
pub mod ids;
pub mod models;
pub mod session;
pub mod stream;
