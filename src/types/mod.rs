// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod id;
mod image_ref;
mod subdomain;

pub use id::{AppId, ContainerId, DeploymentId, Id, ImageId, NetworkId, RecordId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use subdomain::{Subdomain, SubdomainError};
