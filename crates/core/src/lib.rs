//! Shared domain types for the easel gateway.
//!
//! Everything the other workspace crates agree on lives here: the error
//! taxonomy, the node-graph model, progress events, asset references,
//! and the executor contract. This crate has no I/O of its own.

pub mod assets;
pub mod error;
pub mod events;
pub mod executor;
pub mod graph;
pub mod types;
