//! Morph L2 address transaction monitor: polls the explorer for new
//! transactions touching a single address, classifies each one against the
//! configured base/quote token pair, keeps running statistics in a shared
//! aggregate with a durable JSON snapshot, and serves them over a small
//! read-only query API.

pub mod api;
pub mod classifier;
pub mod config;
pub mod explorer;
pub mod monitor;
pub mod stats;
