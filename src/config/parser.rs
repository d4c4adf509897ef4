//! Stack file loading and required-value resolution.
//!
//! Loads the YAML stack file, folds in `.env` and `STRATUS_*` environment
//! overrides, and resolves the values the plan cannot be built without:
//! the deployment location and the admin credentials. Any missing required
//! value fails plan construction with an error naming the key.

use std::path::Path;
use tracing::{debug, info};

use crate::error::{ConfigError, Result, StratusError};

use super::spec::{AdminCredentials, Secret, StackConfig, StackFile};

/// Parser for stack configuration files.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads and fully resolves a stack configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a
    /// required value is missing.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<StackConfig> {
        let mut file = self.load_file(path)?;
        Self::apply_env_overrides(&mut file);
        Self::resolve(file)
    }

    /// Loads a raw stack file from YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<StackFile> {
        let path = path.as_ref();
        info!("Loading stack file: {}", path.display());

        if !path.exists() {
            return Err(StratusError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            StratusError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses a stack file from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<StackFile> {
        debug!("Parsing YAML stack file");

        let file: StackFile = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            StratusError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!("Parsed stack file for project: {}", file.project.name);
        Ok(file)
    }

    /// Applies `STRATUS_*` environment overrides to a raw stack file.
    pub fn apply_env_overrides(file: &mut StackFile) {
        if let Ok(name) = std::env::var("STRATUS_PROJECT_NAME") {
            debug!("Overriding project.name from environment");
            file.project.name = name;
        }

        if let Ok(environment) = std::env::var("STRATUS_PROJECT_ENVIRONMENT") {
            debug!("Overriding project.environment from environment");
            file.project.environment = environment;
        }

        if let Ok(location) = std::env::var("STRATUS_LOCATION") {
            debug!("Overriding location from environment");
            file.location = Some(location);
        }

        if let Ok(username) = std::env::var("STRATUS_ADMIN_USERNAME") {
            debug!("Overriding admin.username from environment");
            file.admin.username = Some(username);
        }

        if let Ok(api_url) = std::env::var("STRATUS_API_URL") {
            debug!("Overriding settings.api_url from environment");
            file.settings.api_url = Some(api_url);
        }
    }

    /// Resolves a raw stack file into a complete configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingConfiguration`] naming the key for any
    /// required value that was not supplied.
    pub fn resolve(file: StackFile) -> Result<StackConfig> {
        Self::resolve_from(file, &|key| std::env::var(key).ok())
    }

    /// Resolution against an explicit environment lookup.
    fn resolve_from(
        file: StackFile,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<StackConfig> {
        let location = file
            .location
            .filter(|value| !value.is_empty())
            .ok_or_else(|| StratusError::Config(ConfigError::missing("location")))?;

        let username = file
            .admin
            .username
            .filter(|value| !value.is_empty())
            .ok_or_else(|| StratusError::Config(ConfigError::missing("admin.username")))?;

        let password = env(&file.admin.password_env)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                StratusError::Config(ConfigError::missing(file.admin.password_env.clone()))
            })?;

        Ok(StackConfig {
            project: file.project,
            location,
            admin: AdminCredentials {
                username,
                password: Secret::from(password),
            },
            network: file.network,
            vm: file.vm,
            settings: file.settings,
        })
    }

    /// Loads the .env file if present, then a user-level fallback.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing env file cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                StratusError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        // User-level fallback for credentials shared across stacks.
        if let Some(config_dir) = dirs::config_dir() {
            let user_env = config_dir.join("stratus").join("stratus.env");
            if user_env.exists() {
                info!("Loading environment from: {}", user_env.display());
                dotenvy::from_path(&user_env).map_err(|e| {
                    StratusError::Config(ConfigError::ParseError {
                        message: format!("Failed to load user env file: {e}"),
                        location: Some(user_env.display().to_string()),
                    })
                })?;
            }
        }

        Ok(())
    }

    /// Gets the control-plane API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is not set.
    pub fn get_api_key() -> Result<String> {
        std::env::var("STRATUS_API_KEY")
            .map_err(|_| StratusError::Config(ConfigError::missing("STRATUS_API_KEY")))
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &[
    "stratus.stack.yaml",
    "stratus.stack.yml",
    "stack.yaml",
    "stack.yml",
];

/// Finds the stack file in the given directory or its parents.
///
/// # Errors
///
/// Returns an error if no stack file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found stack file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(StratusError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(entries: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = entries
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn parse_minimal_stack() {
        let yaml = r"
project:
  name: web-server
location: westus
admin:
  username: webmaster
";
        let parser = ConfigParser::new();
        let file = parser.parse_yaml(yaml, None).expect("parse");

        assert_eq!(file.project.name, "web-server");
        assert_eq!(file.project.environment, "dev");
        assert_eq!(file.location.as_deref(), Some("westus"));
        assert_eq!(file.admin.password_env, "STRATUS_ADMIN_PASSWORD");
        assert_eq!(file.network.address_spaces, vec!["10.0.0.0/16"]);
    }

    #[test]
    fn missing_location_names_the_key() {
        let yaml = r"
project:
  name: web-server
admin:
  username: webmaster
";
        let parser = ConfigParser::new();
        let file = parser.parse_yaml(yaml, None).expect("parse");

        let err = ConfigParser::resolve_from(file, &lookup(&[("STRATUS_ADMIN_PASSWORD", "pw")]))
            .expect_err("must fail");
        assert!(matches!(
            err,
            StratusError::Config(ConfigError::MissingConfiguration { key }) if key == "location"
        ));
    }

    #[test]
    fn missing_password_names_the_env_var() {
        let yaml = r"
project:
  name: web-server
location: westus
admin:
  username: webmaster
  password_env: WEB_SERVER_PASSWORD
";
        let parser = ConfigParser::new();
        let file = parser.parse_yaml(yaml, None).expect("parse");

        let err = ConfigParser::resolve_from(file, &lookup(&[])).expect_err("must fail");
        assert!(matches!(
            err,
            StratusError::Config(ConfigError::MissingConfiguration { key })
                if key == "WEB_SERVER_PASSWORD"
        ));
    }

    #[test]
    fn resolves_complete_configuration() {
        let yaml = r"
project:
  name: web-server
  environment: prod
location: westus
admin:
  username: webmaster
";
        let parser = ConfigParser::new();
        let file = parser.parse_yaml(yaml, None).expect("parse");

        let config = ConfigParser::resolve_from(
            file,
            &lookup(&[("STRATUS_ADMIN_PASSWORD", "correct horse")]),
        )
        .expect("resolve");

        assert_eq!(config.qualified_name(), "web-server-prod");
        assert_eq!(config.admin.username, "webmaster");
        assert_eq!(config.admin.password.expose(), "correct horse");
    }

    #[test]
    fn load_file_reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        write!(
            file,
            "project:\n  name: web-server\nlocation: eastus\nadmin:\n  username: webmaster\n"
        )
        .expect("write");

        let parser = ConfigParser::new();
        let stack = parser.load_file(file.path()).expect("load");
        assert_eq!(stack.location.as_deref(), Some("eastus"));
    }

    #[test]
    fn load_file_missing_is_file_not_found() {
        let parser = ConfigParser::new();
        let err = parser
            .load_file("/nonexistent/stratus.stack.yaml")
            .expect_err("must fail");
        assert!(matches!(
            err,
            StratusError::Config(ConfigError::FileNotFound { .. })
        ));
    }
}
