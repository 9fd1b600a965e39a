//! # Docshelf
//!
//! A semantic document shelf: short text and PDF documents stored in a
//! relational store, their embeddings in a separate vector index, kept in
//! step by a [`document_store::DocumentStore`] orchestrator, with k-means
//! topic clustering and any number of independent databases.
//!
//! ## Architecture
//!
//! ```text
//!                ┌──────────────┐
//!                │   Registry   │  registry.json, active database
//!                └──────┬───────┘
//!                       ▼
//!                ┌──────────────┐     ┌──────────────────┐
//!                │DocumentStore │────▶│ EmbeddingProvider│
//!                └──┬────────┬──┘     └──────────────────┘
//!                   ▼        ▼
//!          ┌──────────┐  ┌──────────┐
//!          │documents │  │ vectors  │   two SQLite files,
//!          │ .sqlite  │  │ .sqlite  │   no shared transaction
//!          └──────────┘  └──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`embedding`] | Concrete embedding providers |
//! | [`sqlite_store`] | SQLite relational store and vector index |
//! | [`document_store`] | Dual-store orchestrator, reconcile, clustering |
//! | [`registry`] | Multi-database registry |
//! | [`extract`] | PDF / text import |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//!
//! The remaining modules implement the `shelf` commands.

pub mod cluster_cmd;
pub mod config;
pub mod databases;
pub mod db;
pub mod document_store;
pub mod edit;
pub mod embed_cmd;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod get;
pub mod logging;
pub mod migrate;
pub mod registry;
pub mod search;
pub mod sqlite_store;
pub mod stats;

pub use docshelf_core::{ShelfError, ShelfResult};
