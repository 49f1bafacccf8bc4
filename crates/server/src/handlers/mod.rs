//! HTTP request handlers.

pub mod attachments;
pub mod health;
pub mod sync;

pub use attachments::*;
pub use health::*;
pub use sync::*;
