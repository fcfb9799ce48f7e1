//! # Task Recall
//!
//! Retrieval-augmented answers over a user's ongoing and completed tasks.
//!
//! A query is embedded, the closest task vectors are looked up, the matching
//! task rows are fetched and sanitized, and the result is rendered into a
//! numbered context block that grounds a chat completion.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────┐   ┌──────────┐   ┌───────────┐   ┌──────────┐   ┌────────────┐
//! │  query  │──▶│  embed   │──▶│ retrieve  │──▶│ assemble │──▶│ completion │
//! └─────────┘   │ (codec)  │   │ index+rows│   │ context  │   └─────┬──────┘
//!               └──────────┘   └─────┬─────┘   └──────────┘         ▼
//!                                    ▼                    answer or sentinel
//!                               ┌──────────┐
//!                               │  SQLite  │
//!                               └──────────┘
//! ```
//!
//! Every collaborator sits behind a trait ([`embedding::EmbeddingProvider`],
//! [`store::VectorIndex`], [`store::RecordStore`],
//! [`completion::CompletionProvider`]) so the pipeline runs unchanged over
//! SQLite, the in-memory store, or test doubles.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`embedding`] | Embedding providers and the vector codec |
//! | [`sanitize`] | Field sanitizer |
//! | [`store`] | Vector index and record store traits |
//! | [`retrieve`] | Vector retrieval engine |
//! | [`context`] | Context assembler |
//! | [`completion`] | Completion providers |
//! | [`respond`] | Response orchestrator |
//! | [`sqlite_store`] | SQLite-backed stores |
//! | [`index_cmd`] | Task embedding indexer |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod completion;
pub mod config;
pub mod context;
pub mod db;
pub mod embedding;
pub mod index_cmd;
pub mod migrate;
pub mod models;
pub mod respond;
pub mod retrieve;
pub mod sanitize;
pub mod server;
pub mod sqlite_store;
pub mod store;
