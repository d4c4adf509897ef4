//! Stack configuration types.
//!
//! [`StackFile`] maps to the `stratus.stack.yaml` file; [`StackConfig`] is
//! its resolved form, produced once all required values (location, admin
//! credentials) have been supplied. The stack file is declarative and
//! carries no secrets: the admin password only ever comes from the
//! environment.

use serde::{Deserialize, Serialize};

/// The root structure of a stack configuration file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StackFile {
    /// Project-level configuration.
    pub project: ProjectSection,
    /// Provider region to deploy into. Required, but resolvable from the
    /// environment.
    #[serde(default)]
    pub location: Option<String>,
    /// Admin account configuration.
    #[serde(default)]
    pub admin: AdminSection,
    /// Network layout.
    #[serde(default)]
    pub network: NetworkSection,
    /// Virtual machine shape.
    #[serde(default)]
    pub vm: VmSection,
    /// Engine settings.
    #[serde(default)]
    pub settings: SettingsSection,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectSection {
    /// Unique name for the project.
    pub name: String,
    /// Environment (e.g., "dev", "staging", "prod").
    #[serde(default = "default_environment")]
    pub environment: String,
}

/// Admin account configuration. The password is never stored in the file;
/// only the name of the environment variable holding it is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdminSection {
    /// Admin username.
    #[serde(default)]
    pub username: Option<String>,
    /// Environment variable the password is read from.
    #[serde(default = "default_password_env")]
    pub password_env: String,
}

/// Network layout for the deployment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NetworkSection {
    /// Address spaces of the virtual network.
    #[serde(default = "default_address_spaces")]
    pub address_spaces: Vec<String>,
    /// Subnet declared inline on the virtual network.
    #[serde(default)]
    pub inline_subnet: InlineSubnetSection,
    /// Address prefixes of the standalone subnet.
    #[serde(default = "default_subnet_prefixes")]
    pub subnet_prefixes: Vec<String>,
}

/// Subnet declared inline on the virtual network.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InlineSubnetSection {
    /// Subnet name.
    #[serde(default = "default_inline_subnet_name")]
    pub name: String,
    /// Address prefix.
    #[serde(default = "default_inline_subnet_prefix")]
    pub address_prefix: String,
}

/// Virtual machine shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VmSection {
    /// VM size identifier.
    #[serde(default = "default_vm_size")]
    pub size: String,
    /// Computer name inside the OS.
    #[serde(default = "default_computer_name")]
    pub computer_name: String,
    /// OS image reference.
    #[serde(default)]
    pub image: ImageSection,
    /// Boot-time shell script; the built-in web-server script when absent.
    #[serde(default)]
    pub boot_script: Option<String>,
}

/// OS image reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageSection {
    /// Image publisher.
    pub publisher: String,
    /// Image offer.
    pub offer: String,
    /// Image SKU.
    pub sku: String,
    /// Image version.
    pub version: String,
}

/// Engine settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettingsSection {
    /// Bound on concurrent provider operations.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Control-plane API base URL override.
    #[serde(default)]
    pub api_url: Option<String>,
}

/// A secret value that never appears in debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wraps a secret value.
    #[must_use]
    pub const fn new(value: String) -> Self {
        Self(value)
    }

    /// Exposes the wrapped value.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Resolved admin credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    /// Admin username.
    pub username: String,
    /// Admin password, environment-sourced.
    pub password: Secret,
}

/// A fully resolved stack configuration: every required value present.
#[derive(Debug, Clone)]
pub struct StackConfig {
    /// Project-level configuration.
    pub project: ProjectSection,
    /// Provider region to deploy into.
    pub location: String,
    /// Resolved admin credentials.
    pub admin: AdminCredentials,
    /// Network layout.
    pub network: NetworkSection,
    /// Virtual machine shape.
    pub vm: VmSection,
    /// Engine settings.
    pub settings: SettingsSection,
}

impl StackConfig {
    /// Returns the fully qualified project name including environment.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        format!("{}-{}", self.project.name, self.project.environment)
    }
}

// Default value functions

fn default_environment() -> String {
    String::from("dev")
}

fn default_password_env() -> String {
    String::from("STRATUS_ADMIN_PASSWORD")
}

fn default_address_spaces() -> Vec<String> {
    vec![String::from("10.0.0.0/16")]
}

fn default_inline_subnet_name() -> String {
    String::from("default")
}

fn default_inline_subnet_prefix() -> String {
    String::from("10.0.1.0/24")
}

fn default_subnet_prefixes() -> Vec<String> {
    vec![String::from("10.0.2.0/24")]
}

fn default_vm_size() -> String {
    String::from("Standard_A0")
}

fn default_computer_name() -> String {
    String::from("hostname")
}

const fn default_concurrency() -> usize {
    4
}

impl Default for AdminSection {
    fn default() -> Self {
        Self {
            username: None,
            password_env: default_password_env(),
        }
    }
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            address_spaces: default_address_spaces(),
            inline_subnet: InlineSubnetSection::default(),
            subnet_prefixes: default_subnet_prefixes(),
        }
    }
}

impl Default for InlineSubnetSection {
    fn default() -> Self {
        Self {
            name: default_inline_subnet_name(),
            address_prefix: default_inline_subnet_prefix(),
        }
    }
}

impl Default for VmSection {
    fn default() -> Self {
        Self {
            size: default_vm_size(),
            computer_name: default_computer_name(),
            image: ImageSection::default(),
            boot_script: None,
        }
    }
}

impl Default for ImageSection {
    fn default() -> Self {
        Self {
            publisher: String::from("canonical"),
            offer: String::from("UbuntuServer"),
            sku: String::from("16.04-LTS"),
            version: String::from("latest"),
        }
    }
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            api_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_debug_is_redacted() {
        let secret = Secret::from(String::from("hunter2"));
        assert_eq!(format!("{secret:?}"), "Secret(***)");
        assert_eq!(secret.expose(), "hunter2");
    }

    #[test]
    fn defaults_match_the_reference_deployment() {
        let network = NetworkSection::default();
        assert_eq!(network.address_spaces, vec!["10.0.0.0/16"]);
        assert_eq!(network.inline_subnet.address_prefix, "10.0.1.0/24");
        assert_eq!(network.subnet_prefixes, vec!["10.0.2.0/24"]);

        let vm = VmSection::default();
        assert_eq!(vm.size, "Standard_A0");
        assert_eq!(vm.image.offer, "UbuntuServer");
    }
}
