//! # docshelf core
//!
//! Shared, runtime-free logic for docshelf: data models, the error
//! taxonomy, store abstractions, search ranking, the embedding trait,
//! and the cluster engine.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or other
//! native-only dependencies. Everything that talks to a disk, a network,
//! or an async runtime lives in the `docshelf` app crate.

pub mod cluster;
pub mod embedding;
pub mod error;
pub mod models;
pub mod search;
pub mod store;

pub use error::{ShelfError, ShelfResult};
