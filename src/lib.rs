// ABOUTME: Remote operations console library; the binary lives in main.rs.
// ABOUTME: Exposes the session adapter, registry, pipeline, batch and store modules.

pub mod batch;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod ops;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod registry;
pub mod runtime;
pub mod ssh;
pub mod store;
pub mod types;
