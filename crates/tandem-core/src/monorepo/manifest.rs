//! package.json handling
//!
//! The manifest is kept as the original JSON document so that unknown
//! fields and key order survive a read/modify/write cycle.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Result, TandemError};

/// Manifest file name inside each package
pub const MANIFEST_FILE: &str = "package.json";

/// Dependency fields that can hold a package specifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DependencyKind {
    /// `dependencies`
    Regular,
    /// `devDependencies`
    Dev,
    /// `optionalDependencies`
    Optional,
    /// `peerDependencies`
    Peer,
}

impl DependencyKind {
    /// Every kind, in manifest order
    pub const ALL: [DependencyKind; 4] = [Self::Regular, Self::Dev, Self::Optional, Self::Peer];

    /// JSON field name
    pub fn field(&self) -> &'static str {
        match self {
            Self::Regular => "dependencies",
            Self::Dev => "devDependencies",
            Self::Optional => "optionalDependencies",
            Self::Peer => "peerDependencies",
        }
    }
}

/// Publish settings declared in the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestPublishConfig {
    /// `publishConfig.tag`
    pub tag: Option<String>,
    /// `publishConfig.access`
    pub access: Option<String>,
    /// `publishConfig.registry`
    pub registry: Option<String>,
}

/// A parsed package.json
#[derive(Debug, Clone, PartialEq)]
pub struct PackageManifest {
    document: Map<String, Value>,
}

impl PackageManifest {
    /// Parse a manifest from JSON text
    pub fn parse(content: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(content)? {
            Value::Object(document) => Ok(Self { document }),
            _ => Err(TandemError::other("package.json must contain a JSON object")),
        }
    }

    /// Load a manifest from disk
    pub fn load(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "reading manifest");
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Write the manifest to disk, two-space indented with a trailing newline
    pub fn save(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "writing manifest");
        std::fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Render the document as it would be written
    pub fn to_json_string(&self) -> Result<String> {
        let mut content = serde_json::to_string_pretty(&self.document)?;
        content.push('\n');
        Ok(content)
    }

    /// Package name, empty when absent
    pub fn name(&self) -> &str {
        self.str_field("name").unwrap_or_default()
    }

    /// Raw version string
    pub fn version(&self) -> Option<&str> {
        self.str_field("version")
    }

    /// Whether `"private": true`
    pub fn is_private(&self) -> bool {
        self.document
            .get("private")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// License expression, if declared
    pub fn license(&self) -> Option<&str> {
        self.str_field("license")
    }

    /// `gitHead` annotation
    pub fn git_head(&self) -> Option<&str> {
        self.str_field("gitHead")
    }

    /// Publish settings from `publishConfig`
    pub fn publish_config(&self) -> ManifestPublishConfig {
        let Some(config) = self.document.get("publishConfig").and_then(Value::as_object) else {
            return ManifestPublishConfig::default();
        };
        let get = |key: &str| config.get(key).and_then(Value::as_str).map(str::to_string);
        ManifestPublishConfig {
            tag: get("tag"),
            access: get("access"),
            registry: get("registry"),
        }
    }

    /// Declared dependencies of one kind, in manifest order
    pub fn dependencies(&self, kind: DependencyKind) -> Vec<(String, String)> {
        self.document
            .get(kind.field())
            .and_then(Value::as_object)
            .map(|deps| {
                deps.iter()
                    .filter_map(|(name, spec)| spec.as_str().map(|s| (name.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// A single dependency specifier
    pub fn dependency(&self, kind: DependencyKind, name: &str) -> Option<&str> {
        self.document
            .get(kind.field())
            .and_then(Value::as_object)
            .and_then(|deps| deps.get(name))
            .and_then(Value::as_str)
    }

    /// Set the version field
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.document
            .insert("version".to_string(), Value::String(version.into()));
    }

    /// Set the `gitHead` annotation
    pub fn set_git_head(&mut self, sha: impl Into<String>) {
        self.document
            .insert("gitHead".to_string(), Value::String(sha.into()));
    }

    /// Replace an existing dependency specifier; returns false if the
    /// dependency is not declared under `kind`
    pub fn set_dependency(&mut self, kind: DependencyKind, name: &str, spec: impl Into<String>) -> bool {
        match self
            .document
            .get_mut(kind.field())
            .and_then(Value::as_object_mut)
            .and_then(|deps| deps.get_mut(name))
        {
            Some(slot) => {
                *slot = Value::String(spec.into());
                true
            }
            None => false,
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.document.get(key).and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
  "name": "@scope/pkg",
  "version": "1.0.0",
  "description": "keeps unknown fields",
  "dependencies": {
    "zeta": "^1.0.0",
    "alpha": "file:../alpha"
  },
  "peerDependencies": {
    "alpha": "^1.0.0"
  },
  "publishConfig": {
    "tag": "next",
    "access": "public"
  }
}"#;

    #[test]
    fn test_parse_fields() {
        let manifest = PackageManifest::parse(SAMPLE).unwrap();
        assert_eq!(manifest.name(), "@scope/pkg");
        assert_eq!(manifest.version(), Some("1.0.0"));
        assert!(!manifest.is_private());
        assert_eq!(manifest.publish_config().tag.as_deref(), Some("next"));
        assert_eq!(manifest.publish_config().access.as_deref(), Some("public"));
    }

    #[test]
    fn test_dependencies_keep_declaration_order() {
        let manifest = PackageManifest::parse(SAMPLE).unwrap();
        let deps = manifest.dependencies(DependencyKind::Regular);
        assert_eq!(deps[0].0, "zeta");
        assert_eq!(deps[1], ("alpha".to_string(), "file:../alpha".to_string()));
        assert!(manifest.dependencies(DependencyKind::Dev).is_empty());
    }

    #[test]
    fn test_set_dependency_only_touches_declared_entries() {
        let mut manifest = PackageManifest::parse(SAMPLE).unwrap();
        assert!(manifest.set_dependency(DependencyKind::Regular, "alpha", "^2.0.0"));
        assert!(!manifest.set_dependency(DependencyKind::Dev, "alpha", "^2.0.0"));
        assert_eq!(manifest.dependency(DependencyKind::Regular, "alpha"), Some("^2.0.0"));
        assert_eq!(manifest.dependency(DependencyKind::Peer, "alpha"), Some("^1.0.0"));
    }

    #[test]
    fn test_save_roundtrip_keeps_unknown_fields() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join(MANIFEST_FILE);

        let mut manifest = PackageManifest::parse(SAMPLE).unwrap();
        manifest.set_version("1.1.0");
        manifest.set_git_head("abc123");
        manifest.save(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.ends_with("}\n"));
        assert!(content.contains("keeps unknown fields"));
        let reloaded = PackageManifest::load(&path).unwrap();
        assert_eq!(reloaded.version(), Some("1.1.0"));
        assert_eq!(reloaded.git_head(), Some("abc123"));
    }

    #[test]
    fn test_non_object_rejected() {
        assert!(PackageManifest::parse("[1, 2]").is_err());
    }
}
