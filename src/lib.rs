pub mod api;
pub mod error;
pub mod executor;
pub mod job;
pub mod logging;
pub mod queue;
pub mod settings;
pub mod signature;
pub mod webhook;

use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use error::ConfigError;

/// Endpoint table keyed by URL path, e.g. `/hooks/website`.
pub type HooksConfig = BTreeMap<String, EndpointConfig>;

/// Rules for one repository, served on one URL path.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct EndpointConfig {
    #[serde(rename = "reponame")]
    pub repo_name: String,
    #[serde(default)]
    pub secret: Option<String>,
    /// Command used when no per-ref command matches.
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub refs: HashMap<String, RefCommand>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct RefCommand {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
}

/// A program plus its argument list, borrowed from the endpoint config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLine<'a> {
    pub program: &'a str,
    pub args: &'a [String],
}

impl std::fmt::Display for CommandLine<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.program)?;
        for arg in self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

impl EndpointConfig {
    /// Returns the HMAC key, or `None` when signature checks are disabled.
    ///
    /// An endpoint without a secret accepts any correctly formatted
    /// signature. Operators opt into this by leaving `secret` unset.
    pub fn secret_bytes(&self) -> Option<Vec<u8>> {
        self.secret
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| s.as_bytes().to_vec())
    }

    /// Returns the per-repository command, if one is configured.
    pub fn default_command(&self) -> Option<CommandLine<'_>> {
        self.command
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|program| CommandLine {
                program,
                args: &self.args,
            })
    }

    /// Returns the command registered for exactly this ref.
    pub fn ref_command(&self, git_ref: &str) -> Option<CommandLine<'_>> {
        self.refs.get(git_ref).map(|c| CommandLine {
            program: &c.command,
            args: &c.args,
        })
    }

    fn validate(&self, path: &str) -> Result<(), ConfigError> {
        if !path.starts_with('/') {
            return Err(ConfigError::invalid(path, "path must start with '/'"));
        }
        if path.contains('{') || path.contains('}') {
            return Err(ConfigError::invalid(path, "path must not contain '{' or '}'"));
        }
        if path
            .split('/')
            .any(|segment| segment.starts_with(':') || segment.starts_with('*'))
        {
            return Err(ConfigError::invalid(
                path,
                "path segments must not start with ':' or '*'",
            ));
        }
        if self.repo_name.is_empty() {
            return Err(ConfigError::invalid(path, "reponame is empty"));
        }
        if let Some((git_ref, _)) = self.refs.iter().find(|(_, c)| c.command.is_empty()) {
            return Err(ConfigError::invalid(
                path,
                &format!("ref '{}' has an empty command", git_ref),
            ));
        }
        Ok(())
    }
}

/// Parse the endpoint table. YAML is used for `.yaml`/`.yml` files, TOML otherwise.
pub fn parse_config(contents: &str, path: &Path) -> Result<HooksConfig, ConfigError> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let config: HooksConfig = if is_yaml {
        serde_yaml_ng::from_str(contents)?
    } else {
        toml::from_str(contents)?
    };

    if config.is_empty() {
        return Err(ConfigError::NoEndpoints);
    }
    for (url_path, endpoint) in &config {
        endpoint.validate(url_path)?;
    }
    Ok(config)
}

/// Load and validate the configuration file
pub fn load_config(path: impl AsRef<Path>) -> Result<HooksConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&contents, path)
}
