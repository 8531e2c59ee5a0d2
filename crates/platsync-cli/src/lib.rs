//! platsync library - release pipeline for platform modules
//!
//! Exposes the pipeline pieces so they can be driven from tests with
//! substitute toolchains and release stores.

pub mod build;
pub mod commands;
pub mod common;
pub mod errors;
pub mod naming;
pub mod publish;
pub mod sync;

pub use common::GlobalOpts;
pub use errors::{StoreError, SyncError};
pub use platsync_config as config;
pub use platsync_logger as logger;
pub use platsync_manifest as manifest;
pub use sync::{Orchestrator, SyncOptions, SyncReport};
