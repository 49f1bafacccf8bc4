//! Core domain types for PINOVARA's ODK attachment sync.
//!
//! This crate defines the data model shared by the other crates:
//! - Attachment kinds and their remote ODK table layouts
//! - Local file name derivation
//! - Sync reports returned to callers
//! - Configuration

pub mod attachment;
pub mod config;
pub mod error;
pub mod file_name;
pub mod hash;
pub mod report;

pub use attachment::{AttachmentKind, RemoteLayout};
pub use error::{Error, Result};
pub use hash::ContentHash;
pub use report::{ItemStatus, SyncItem, SyncReport};
