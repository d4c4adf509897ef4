//! Cloud control-plane boundary.
//!
//! Everything behind the [`Provision`] trait is an external collaborator:
//! the REST client owns transport, authentication, and retry/backoff for
//! transient provider failures; the provisioner maps resolved declarations
//! onto typed API calls. The graph executor only sees the trait.

mod client;
mod provisioner;
mod types;

pub use client::{CloudClient, DEFAULT_API_URL};
pub use provisioner::CloudProvisioner;
pub use types::{CreateResourceRequest, OutputMap, ResourceKind, ResourceRecord, fields};

use async_trait::async_trait;

use crate::error::Result;

/// The provisioning runtime boundary.
///
/// One call per resource operation; the implementation owns retry policy
/// for transient failures. The evaluator never retries.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Provision: Send + Sync {
    /// Issues the creation (or read, for data sources) of one resource and
    /// returns its output properties.
    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        properties: &serde_json::Value,
    ) -> Result<OutputMap>;

    /// Deletes one resource. Deleting a resource that no longer exists is
    /// not an error.
    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<()>;
}
