//! Registry credential lookup

use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use tandem_core::config::NPM_REGISTRY;

/// Credential types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Credential {
    /// Bearer token (`_authToken`)
    Token(String),
    /// Pre-encoded basic auth (`_auth`)
    Basic(String),
}

impl Credential {
    /// The npm config key this credential is passed as
    pub fn config_key(&self) -> &'static str {
        match self {
            Self::Token(_) => "_authToken",
            Self::Basic(_) => "_auth",
        }
    }

    /// The secret value
    pub fn value(&self) -> &str {
        match self {
            Self::Token(v) | Self::Basic(v) => v,
        }
    }
}

/// Canonical registry URL with a trailing slash.
///
/// Unparsable input is returned unchanged.
pub fn normalize_registry(registry: &str) -> String {
    match Url::parse(registry.trim()) {
        Ok(url) => {
            let mut s = url.to_string();
            if !s.ends_with('/') {
                s.push('/');
            }
            s
        }
        Err(_) => registry.to_string(),
    }
}

/// The `//host/path/` form npm keys per-registry settings by
pub fn nerf_dart(registry: &str) -> String {
    match Url::parse(&normalize_registry(registry)) {
        Ok(url) => format!(
            "//{}{}{}",
            url.host_str().unwrap_or_default(),
            url.port().map(|p| format!(":{}", p)).unwrap_or_default(),
            url.path()
        ),
        Err(_) => registry.to_string(),
    }
}

/// Finds credentials for a registry in the environment and `.npmrc` files
pub struct CredentialProvider {
    /// Environment variable prefix for credentials
    env_prefix: String,
    /// Directory whose `.npmrc` is consulted before the user's
    project_dir: Option<PathBuf>,
    cache: HashMap<String, Option<Credential>>,
}

impl CredentialProvider {
    pub fn new() -> Self {
        Self {
            env_prefix: "TANDEM".to_string(),
            project_dir: None,
            cache: HashMap::new(),
        }
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Look at `<dir>/.npmrc` too
    pub fn with_project_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.project_dir = Some(dir.into());
        self
    }

    /// Get credentials for a registry
    #[instrument(skip(self))]
    pub fn get(&mut self, registry: &str) -> Option<Credential> {
        let registry = normalize_registry(registry);
        if let Some(cached) = self.cache.get(&registry) {
            return cached.clone();
        }

        let found = self.from_env(&registry).or_else(|| self.from_npmrc_files(&registry));
        match &found {
            Some(_) => debug!(registry = %registry, "credentials found"),
            None => debug!(registry = %registry, "no credentials found"),
        }
        self.cache.insert(registry, found.clone());
        found
    }

    fn from_env(&self, registry: &str) -> Option<Credential> {
        let prefixed = format!("{}_NPM_TOKEN", self.env_prefix);
        if let Ok(token) = env::var(&prefixed) {
            return Some(Credential::Token(token));
        }
        // the generic variables only ever apply to the public registry
        if registry == NPM_REGISTRY {
            for var in ["NPM_TOKEN", "NODE_AUTH_TOKEN"] {
                if let Ok(token) = env::var(var) {
                    return Some(Credential::Token(token));
                }
            }
        }
        None
    }

    fn from_npmrc_files(&self, registry: &str) -> Option<Credential> {
        let mut candidates = Vec::new();
        if let Some(dir) = &self.project_dir {
            candidates.push(dir.join(".npmrc"));
        }
        if let Some(home) = dirs::home_dir() {
            candidates.push(home.join(".npmrc"));
        }
        candidates
            .iter()
            .filter(|p| p.exists())
            .find_map(|p| read_npmrc(p, registry))
    }

    /// Check if credentials are available for a registry
    pub fn has_credentials(&mut self, registry: &str) -> bool {
        self.get(registry).is_some()
    }
}

impl Default for CredentialProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Read the credential scoped to `registry` from one `.npmrc` file
pub fn read_npmrc(path: &Path, registry: &str) -> Option<Credential> {
    let content = std::fs::read_to_string(path).ok()?;
    parse_npmrc(&content, registry)
}

fn parse_npmrc(content: &str, registry: &str) -> Option<Credential> {
    let scope = nerf_dart(registry);
    let scope_trimmed = scope.trim_end_matches('/');

    for line in content.lines() {
        let line = line.trim();
        if line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let Some((key_scope, setting)) = key.trim().rsplit_once(':') else {
            continue;
        };
        if key_scope.trim_end_matches('/') != scope_trimmed {
            continue;
        }
        let value = expand_env(value.trim())?;
        match setting {
            "_authToken" => return Some(Credential::Token(value)),
            "_auth" => return Some(Credential::Basic(value)),
            _ => {}
        }
    }
    None
}

/// Expand a whole-value `${VAR}` reference
fn expand_env(value: &str) -> Option<String> {
    match value.strip_prefix("${").and_then(|v| v.strip_suffix('}')) {
        Some(var) => env::var(var).ok(),
        None => Some(value.to_string()),
    }
}
