//! Wire types for the cloud control-plane API.
//!
//! Resource kinds are a small closed set of variants, not a mirror of the
//! vendor SDK's class hierarchy. Each kind maps to one API path segment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Output properties returned by the provider for one resource.
pub type OutputMap = BTreeMap<String, serde_json::Value>;

/// The resource kinds this engine can provision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// Container for all other resources of a deployment.
    ResourceGroup,
    /// Virtual network with address spaces and inline subnets.
    VirtualNetwork,
    /// Standalone subnet within a virtual network.
    Subnet,
    /// Public IP address allocation.
    PublicIp,
    /// Network interface binding a subnet and a public IP.
    NetworkInterface,
    /// Virtual machine.
    VirtualMachine,
    /// Read-only lookup of an allocated public IP address.
    PublicIpLookup,
}

impl ResourceKind {
    /// Stable lowercase identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ResourceGroup => "resource-group",
            Self::VirtualNetwork => "virtual-network",
            Self::Subnet => "subnet",
            Self::PublicIp => "public-ip",
            Self::NetworkInterface => "network-interface",
            Self::VirtualMachine => "virtual-machine",
            Self::PublicIpLookup => "public-ip-lookup",
        }
    }

    /// API path segment for this kind.
    #[must_use]
    pub const fn api_segment(self) -> &'static str {
        match self {
            Self::ResourceGroup => "resource-groups",
            Self::VirtualNetwork => "virtual-networks",
            Self::Subnet => "subnets",
            Self::PublicIp | Self::PublicIpLookup => "public-ips",
            Self::NetworkInterface => "network-interfaces",
            Self::VirtualMachine => "virtual-machines",
        }
    }

    /// True for kinds that only read provider state and create nothing.
    #[must_use]
    pub const fn is_data_source(self) -> bool {
        matches!(self, Self::PublicIpLookup)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known output field names.
pub mod fields {
    /// Provider-assigned opaque identity.
    pub const ID: &str = "id";
    /// Resource name, echoed by the provider.
    pub const NAME: &str = "name";
    /// Allocated IP address of a public IP.
    pub const IP_ADDRESS: &str = "ip_address";
}

/// Body of a create/update request.
#[derive(Debug, Clone, Serialize)]
pub struct CreateResourceRequest {
    /// Resource name.
    pub name: String,
    /// Fully resolved property values.
    pub properties: serde_json::Value,
}

/// Provider record for one resource, as returned by create and read calls.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRecord {
    /// Provider-assigned opaque identity.
    pub id: String,
    /// Resource name.
    pub name: String,
    /// Output properties produced by the provider.
    #[serde(default)]
    pub outputs: OutputMap,
}
