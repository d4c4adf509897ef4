//! Resource provisioner over the control-plane client.
//!
//! Routes each resource kind to its API operation and shapes the output
//! properties downstream consumers read. Declared inputs are echoed into
//! the outputs alongside provider-assigned values, so a dependent can
//! project any property of its producer without caring which side
//! supplied it.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result, StratusError};

use super::client::CloudClient;
use super::types::{OutputMap, ResourceKind, ResourceRecord, fields};
use super::Provision;

/// Provisioner mapping resource declarations to control-plane calls.
#[derive(Debug)]
pub struct CloudProvisioner {
    /// Control-plane API client.
    client: CloudClient,
}

impl CloudProvisioner {
    /// Creates a new provisioner.
    #[must_use]
    pub const fn new(client: CloudClient) -> Self {
        Self { client }
    }

    /// Gets the underlying client reference.
    #[must_use]
    pub const fn client(&self) -> &CloudClient {
        &self.client
    }

    /// Merges a provider record with the declared inputs into the output
    /// map exposed to dependents.
    fn build_outputs(properties: &serde_json::Value, record: ResourceRecord) -> OutputMap {
        let mut outputs = OutputMap::new();

        if let Some(object) = properties.as_object() {
            for (key, value) in object {
                outputs.insert(key.clone(), value.clone());
            }
        }
        // Provider-assigned values win over echoed inputs.
        for (key, value) in record.outputs {
            outputs.insert(key, value);
        }
        outputs.insert(String::from(fields::ID), serde_json::Value::String(record.id));
        outputs.insert(String::from(fields::NAME), serde_json::Value::String(record.name));

        outputs
    }

    /// Performs the public IP lookup backing the read-only resource kind.
    async fn lookup_public_ip(
        &self,
        name: &str,
        properties: &serde_json::Value,
    ) -> Result<OutputMap> {
        let ip_name = properties
            .get("public_ip_name")
            .and_then(|value| value.as_str())
            .ok_or_else(|| {
                StratusError::internal(format!(
                    "lookup '{name}' requires property 'public_ip_name'"
                ))
            })?;

        debug!("Looking up public IP '{ip_name}' for '{name}'");
        let record = self.client.get_resource(ResourceKind::PublicIp, ip_name).await?;

        if !record.outputs.contains_key(fields::IP_ADDRESS) {
            return Err(StratusError::Provider(ProviderError::MissingOutput {
                field: String::from(fields::IP_ADDRESS),
                resource: ip_name.to_string(),
            }));
        }

        Ok(Self::build_outputs(properties, record))
    }
}

#[async_trait]
impl Provision for CloudProvisioner {
    async fn create(
        &self,
        kind: ResourceKind,
        name: &str,
        properties: &serde_json::Value,
    ) -> Result<OutputMap> {
        if kind.is_data_source() {
            return self.lookup_public_ip(name, properties).await;
        }

        info!("Creating {kind} '{name}'");
        let record = self.client.put_resource(kind, name, properties).await?;
        info!("Created {kind} '{name}' (ID: {})", record.id);

        Ok(Self::build_outputs(properties, record))
    }

    async fn delete(&self, kind: ResourceKind, name: &str) -> Result<()> {
        if kind.is_data_source() {
            debug!("'{name}' is a lookup, nothing to delete");
            return Ok(());
        }

        info!("Deleting {kind} '{name}'");
        match self.client.delete_resource(kind, name).await {
            Ok(()) => {
                info!("Deleted {kind} '{name}'");
                Ok(())
            }
            Err(StratusError::Provider(ProviderError::NotFound { .. })) => {
                warn!("{kind} '{name}' was already deleted");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
