//! Core types and traits for ferryfile.
//!
//! This crate provides the pieces the operation engine is built on: the
//! [`Entry`] capability and its local-filesystem implementation, the halt
//! taxonomy and user responses, engine configuration, and file name rules.

mod config;
mod entry;
mod error;
mod fs_entry;
mod naming;
mod response;

pub use config::{DEFAULT_CHUNK_SIZE, EngineConfig, EngineConfigBuilder, EngineConfigBuilderError, PresetResponse};
pub use entry::Entry;
pub use error::EntryError;
pub use fs_entry::FsEntry;
pub use naming::{NameError, suggest_free_name, validate_file_name};
pub use response::{HaltReason, UserResponse};
