//! ODK blob sync for PINOVARA organizations.
//!
//! Copies document, photo and signature blobs from the legacy ODK
//! PostgreSQL database into the local upload directories, indexing each
//! new file in the metadata store. The remote side is read-only.

pub mod connection;
pub mod error;
pub mod remote;
pub mod sync;

pub use connection::{RemoteConnection, resolve_connection};
pub use error::{SyncError, SyncResult};
pub use remote::{PgRemoteSource, RemoteAttachment, RemoteSession, RemoteSource};
pub use sync::{OdkSync, SYNC_OBSERVATION};
