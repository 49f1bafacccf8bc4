//! Repository traits for metadata operations.

pub mod attachments;
pub mod connections;
pub mod organizations;

pub use attachments::AttachmentRepo;
pub use connections::ConnectionRepo;
pub use organizations::OrganizationRepo;
