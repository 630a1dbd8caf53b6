//! farmtrace: a traceability ledger for physical goods.
//!
//! Items are harvested, processed, shipped to a new owner, and received, in
//! that order and never backwards. Each step is recorded in an append-only,
//! hash-chained history and announced as a [`model::TransitionEvent`].
//!
//! [`lifecycle::Lifecycle`] is the entry point for callers; [`storage::Storage`]
//! is the `SQLite` ledger underneath it.

pub mod cli;
pub mod config;
pub mod identity;
pub mod lifecycle;
pub mod model;
pub mod storage;
