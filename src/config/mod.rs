//! Stack configuration: loading, validation, and fingerprinting.
//!
//! The configuration boundary supplies required values (location, admin
//! credentials) by name before plan evaluation; a missing required value
//! fails plan construction naming the key.

mod hash;
mod parser;
mod spec;
mod validator;

pub use hash::SpecHasher;
pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use spec::{
    AdminCredentials, AdminSection, ImageSection, InlineSubnetSection, NetworkSection,
    ProjectSection, Secret, SettingsSection, StackConfig, StackFile, VmSection,
};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
