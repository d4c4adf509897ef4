//! Stack configuration validation.
//!
//! Structural checks on the resolved configuration, run before any graph
//! is built: naming conventions, address ranges, credential constraints,
//! and engine settings.

use crate::error::{ConfigError, Result, StratusError};
use std::collections::HashSet;
use tracing::debug;

use super::spec::StackConfig;

/// Validator for resolved stack configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator {
    /// Admin usernames rejected by the provider.
    reserved_usernames: HashSet<String>,
}

/// Admin usernames most providers refuse to provision.
const RESERVED_USERNAMES: &[&str] = &[
    "admin",
    "administrator",
    "actuser",
    "adm",
    "backup",
    "console",
    "guest",
    "owner",
    "root",
    "server",
    "sql",
    "support",
    "sys",
    "test",
    "user",
];

/// Minimum admin password length accepted by the provider.
const MIN_PASSWORD_LEN: usize = 6;

/// Validation result containing all errors found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ConfigValidator {
    /// Creates a new validator with the default reserved username list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reserved_usernames: RESERVED_USERNAMES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Validates a resolved stack configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn validate(&self, config: &StackConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_project(config, &mut result);
        self.validate_admin(config, &mut result);
        Self::validate_network(config, &mut result);
        Self::validate_vm(config, &mut result);
        Self::validate_settings(config, &mut result);

        if result.errors.is_empty() {
            debug!("Stack validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(StratusError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates project configuration.
    fn validate_project(config: &StackConfig, result: &mut ValidationResult) {
        if config.project.name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: String::from("Project name cannot be empty"),
            });
        } else if !is_valid_name(&config.project.name) {
            result.errors.push(ValidationError {
                field: String::from("project.name"),
                message: format!(
                    "Project name '{}' is invalid. Must be lowercase alphanumeric with hyphens.",
                    config.project.name
                ),
            });
        }

        if config.project.environment.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("project.environment"),
                message: String::from("Environment cannot be empty"),
            });
        }

        if config.location.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("location"),
                message: String::from("Location cannot be empty"),
            });
        }
    }

    /// Validates admin credentials.
    fn validate_admin(&self, config: &StackConfig, result: &mut ValidationResult) {
        let username = &config.admin.username;

        if username.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("admin.username"),
                message: String::from("Admin username cannot be empty"),
            });
        } else if self.reserved_usernames.contains(&username.to_lowercase()) {
            result.errors.push(ValidationError {
                field: String::from("admin.username"),
                message: format!("Admin username '{username}' is reserved by the provider"),
            });
        } else if username.contains(char::is_whitespace) {
            result.errors.push(ValidationError {
                field: String::from("admin.username"),
                message: String::from("Admin username cannot contain whitespace"),
            });
        }

        let password_len = config.admin.password.expose().len();
        if password_len < MIN_PASSWORD_LEN {
            result.errors.push(ValidationError {
                field: String::from("admin.password"),
                message: format!("Admin password must be at least {MIN_PASSWORD_LEN} characters"),
            });
        } else if password_len < 12 {
            result
                .warnings
                .push(String::from("admin.password: shorter than 12 characters"));
        }
    }

    /// Validates the network layout.
    fn validate_network(config: &StackConfig, result: &mut ValidationResult) {
        if config.network.address_spaces.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("network.address_spaces"),
                message: String::from("At least one address space is required"),
            });
        }

        for (i, space) in config.network.address_spaces.iter().enumerate() {
            if !is_valid_cidr(space) {
                result.errors.push(ValidationError {
                    field: format!("network.address_spaces[{i}]"),
                    message: format!("'{space}' is not a valid CIDR block"),
                });
            }
        }

        if !is_valid_cidr(&config.network.inline_subnet.address_prefix) {
            result.errors.push(ValidationError {
                field: String::from("network.inline_subnet.address_prefix"),
                message: format!(
                    "'{}' is not a valid CIDR block",
                    config.network.inline_subnet.address_prefix
                ),
            });
        }

        if config.network.subnet_prefixes.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("network.subnet_prefixes"),
                message: String::from("At least one subnet prefix is required"),
            });
        }

        for (i, prefix) in config.network.subnet_prefixes.iter().enumerate() {
            if !is_valid_cidr(prefix) {
                result.errors.push(ValidationError {
                    field: format!("network.subnet_prefixes[{i}]"),
                    message: format!("'{prefix}' is not a valid CIDR block"),
                });
            }
        }
    }

    /// Validates the virtual machine shape.
    fn validate_vm(config: &StackConfig, result: &mut ValidationResult) {
        if config.vm.size.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("vm.size"),
                message: String::from("VM size cannot be empty"),
            });
        }

        if config.vm.computer_name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("vm.computer_name"),
                message: String::from("Computer name cannot be empty"),
            });
        }

        let image = &config.vm.image;
        for (value, field) in [
            (&image.publisher, "vm.image.publisher"),
            (&image.offer, "vm.image.offer"),
            (&image.sku, "vm.image.sku"),
            (&image.version, "vm.image.version"),
        ] {
            if value.is_empty() {
                result.errors.push(ValidationError {
                    field: String::from(field),
                    message: String::from("Image reference field cannot be empty"),
                });
            }
        }
    }

    /// Validates engine settings.
    fn validate_settings(config: &StackConfig, result: &mut ValidationResult) {
        if config.settings.concurrency == 0 {
            result.errors.push(ValidationError {
                field: String::from("settings.concurrency"),
                message: String::from("Concurrency must be at least 1"),
            });
        } else if config.settings.concurrency > 16 {
            result.warnings.push(format!(
                "settings.concurrency: {} concurrent operations may hit provider rate limits",
                config.settings.concurrency
            ));
        }
    }
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens, starting with a letter.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }

    let mut chars = name.chars();

    if let Some(first) = chars.next()
        && !first.is_ascii_lowercase()
    {
        return false;
    }

    for c in chars {
        if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' {
            return false;
        }
    }

    if name.ends_with('-') {
        return false;
    }

    if name.contains("--") {
        return false;
    }

    true
}

/// Validates an IPv4 CIDR block such as "10.0.0.0/16".
fn is_valid_cidr(cidr: &str) -> bool {
    let Some((address, prefix)) = cidr.split_once('/') else {
        return false;
    };

    let Ok(prefix_len) = prefix.parse::<u8>() else {
        return false;
    };
    if prefix_len > 32 {
        return false;
    }

    let octets: Vec<&str> = address.split('.').collect();
    if octets.len() != 4 {
        return false;
    }

    octets.iter().all(|octet| {
        octet.parse::<u8>().is_ok() && !(octet.len() > 1 && octet.starts_with('0'))
    })
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
