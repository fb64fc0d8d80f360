//! # Assist Harness
//!
//! Client-side state engine for a conversational assistant backed by a
//! document knowledge base.
//!
//! The engine keeps chat sessions and their message histories, turns a
//! streamed reply into one finalized message, stages attachments for the next
//! prompt, tracks documents through upload and removal, and links feedback
//! documents back to the exchanges they rate.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────────────────────┐
//!   user action ─▶│            Engine             │◀─ BackendEvent
//!                 │  ┌────────────┐ ┌───────────┐ │   (pump / next_event)
//!                 │  │ChatService │ │IngestSvc  │ │
//!                 │  └─────┬──────┘ └─────┬─────┘ │
//!                 └────────┼──────────────┼───────┘
//!                          ▼              ▼
//!                    ┌───────────────────────────┐
//!                    │     dyn Backend (calls)   │
//!                    └───────────────────────────┘
//! ```
//!
//! The pure state machines (session store, stream aggregator, composer,
//! catalog, reconciler) live in `assist-harness-core`; this crate adds the
//! backend surface, configuration, path resolution, and the services that
//! drive them.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`engine`] | Owner of all state; event routing |
//! | [`chat`] | Sessions, sending, streamed replies |
//! | [`ingest`] | Upload rounds, removal, listing refresh |
//! | [`backend`] | Backend trait and event bus |
//! | [`memory_backend`] | Scriptable in-memory backend |
//! | [`resolve`] | Paths to ingestion candidates |
//! | [`history`] | Session age buckets |
//! | [`config`] | TOML configuration parsing |
//! | [`progress`] | Upload progress reporting |
//! | [`error`] | Engine error type |

pub mod backend;
pub mod chat;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod ingest;
pub mod memory_backend;
pub mod progress;
pub mod resolve;
