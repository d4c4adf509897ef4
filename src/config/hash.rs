//! Declaration fingerprinting.
//!
//! Deterministic hashing of stack configurations and resource
//! declarations, used to identify a plan and to detect whether two
//! invocations describe the same deployment.

use sha2::{Digest, Sha256};

use super::spec::StackConfig;

/// Hasher for stack and declaration fingerprints.
#[derive(Debug, Default)]
pub struct SpecHasher;

impl SpecHasher {
    /// Creates a new hasher.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes a fingerprint of a stack configuration.
    ///
    /// Credentials never enter the fingerprint.
    #[must_use]
    pub fn hash_stack(&self, config: &StackConfig) -> String {
        let mut hasher = Sha256::new();

        hasher.update(config.project.name.as_bytes());
        hasher.update(config.project.environment.as_bytes());
        hasher.update(config.location.as_bytes());

        for space in &config.network.address_spaces {
            hasher.update(space.as_bytes());
        }
        hasher.update(config.network.inline_subnet.name.as_bytes());
        hasher.update(config.network.inline_subnet.address_prefix.as_bytes());
        for prefix in &config.network.subnet_prefixes {
            hasher.update(prefix.as_bytes());
        }

        hasher.update(config.vm.size.as_bytes());
        hasher.update(config.vm.computer_name.as_bytes());
        hasher.update(config.vm.image.publisher.as_bytes());
        hasher.update(config.vm.image.offer.as_bytes());
        hasher.update(config.vm.image.sku.as_bytes());
        hasher.update(config.vm.image.version.as_bytes());
        if let Some(script) = &config.vm.boot_script {
            hasher.update(script.as_bytes());
        }

        hex::encode(hasher.finalize())
    }

    /// Computes a fingerprint for a single resource declaration.
    ///
    /// The property representation must be deterministic; deferred values
    /// are represented by their projection chain, not their resolved value.
    #[must_use]
    pub fn hash_resource(&self, kind: &str, name: &str, properties: &serde_json::Value) -> String {
        let mut hasher = Sha256::new();

        hasher.update(kind.as_bytes());
        hasher.update([0u8]);
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(properties.to_string().as_bytes());

        hex::encode(hasher.finalize())
    }

    /// Combines per-declaration fingerprints into one plan fingerprint.
    #[must_use]
    pub fn combine(&self, hashes: &[String]) -> String {
        let mut hasher = Sha256::new();
        for hash in hashes {
            hasher.update(hash.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Computes a short hash (first 8 characters) for display purposes.
    #[must_use]
    pub fn short_hash(&self, hash: &str) -> String {
        hash.chars().take(8).collect()
    }

    /// Compares two hashes for equality in constant time.
    #[must_use]
    pub fn hashes_match(hash1: &str, hash2: &str) -> bool {
        if hash1.len() != hash2.len() {
            return false;
        }

        hash1
            .bytes()
            .zip(hash2.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::spec::{
        AdminCredentials, NetworkSection, ProjectSection, Secret, SettingsSection, VmSection,
    };
    use serde_json::json;

    fn test_config(name: &str) -> StackConfig {
        StackConfig {
            project: ProjectSection {
                name: name.to_string(),
                environment: String::from("dev"),
            },
            location: String::from("westus"),
            admin: AdminCredentials {
                username: String::from("webmaster"),
                password: Secret::from(String::from("a-long-password")),
            },
            network: NetworkSection::default(),
            vm: VmSection::default(),
            settings: SettingsSection::default(),
        }
    }

    #[test]
    fn stack_hash_is_deterministic() {
        let hasher = SpecHasher::new();
        let config = test_config("web-server");

        assert_eq!(hasher.hash_stack(&config), hasher.hash_stack(&config));
    }

    #[test]
    fn different_stacks_hash_differently() {
        let hasher = SpecHasher::new();
        assert_ne!(
            hasher.hash_stack(&test_config("alpha")),
            hasher.hash_stack(&test_config("bravo"))
        );
    }

    #[test]
    fn credentials_do_not_affect_the_hash() {
        let hasher = SpecHasher::new();
        let mut config = test_config("web-server");
        let before = hasher.hash_stack(&config);

        config.admin.password = Secret::from(String::from("rotated-password"));
        assert_eq!(before, hasher.hash_stack(&config));
    }

    #[test]
    fn resource_hash_covers_kind_name_and_properties() {
        let hasher = SpecHasher::new();
        let base = hasher.hash_resource("subnet", "server-subnet", &json!({"prefix": "10.0.2.0/24"}));

        assert_ne!(
            base,
            hasher.hash_resource("subnet", "other", &json!({"prefix": "10.0.2.0/24"}))
        );
        assert_ne!(
            base,
            hasher.hash_resource("subnet", "server-subnet", &json!({"prefix": "10.0.3.0/24"}))
        );
    }

    #[test]
    fn test_short_hash() {
        let hasher = SpecHasher::new();
        assert_eq!(hasher.short_hash("abcdef1234567890"), "abcdef12");
    }

    #[test]
    fn test_hashes_match() {
        assert!(SpecHasher::hashes_match("abc123", "abc123"));
        assert!(!SpecHasher::hashes_match("abc123", "abc124"));
        assert!(!SpecHasher::hashes_match("abc123", "abc12"));
    }
}
