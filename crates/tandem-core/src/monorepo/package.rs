//! Package nodes owned by the dependency graph

use std::path::{Path, PathBuf};

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{Result, ValidationError};

use super::manifest::{DependencyKind, PackageManifest};
use super::specifier::WorkspaceRange;

/// How a dependency on a sibling package was declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalSpec {
    /// Relative path or `file:`/`link:` pointing at the sibling's directory
    Directory,
    /// `workspace:` protocol
    Workspace(WorkspaceRange),
    /// A registry range the sibling's current version satisfies
    Range,
}

/// A declared dependency that resolves to another package in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalDependency {
    /// Sibling package name
    pub name: String,
    /// Manifest field the declaration lives in
    pub kind: DependencyKind,
    /// Specifier as written in the manifest
    pub raw: String,
    /// Classification of the specifier
    pub spec: LocalSpec,
}

/// Tarball produced for a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedArtifact {
    /// Absolute path of the `.tgz`
    pub tarball_path: PathBuf,
    /// SHA-1 of the tarball
    pub shasum: String,
    /// Subresource integrity string, when reported
    pub integrity: Option<String>,
    /// Files contained in the tarball
    pub files: Vec<String>,
}

/// One unit of release
#[derive(Debug, Clone)]
pub struct PackageNode {
    name: String,
    version: Option<Version>,
    location: PathBuf,
    manifest_path: PathBuf,
    manifest: PackageManifest,
    local_dependencies: Vec<LocalDependency>,
    packed: Option<PackedArtifact>,
}

impl PackageNode {
    /// Create a node from a manifest read at `manifest_path`.
    ///
    /// A non-private package must carry a valid semver version.
    pub fn new(manifest_path: impl Into<PathBuf>, manifest: PackageManifest) -> Result<Self> {
        let manifest_path = manifest_path.into();
        let location = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let name = manifest.name().to_string();
        if name.is_empty() {
            return Err(ValidationError::Invalid(format!(
                "{} has no name field",
                manifest_path.display()
            ))
            .into());
        }

        let version = match manifest.version() {
            Some(raw) => match Version::parse(raw) {
                Ok(v) => Some(v),
                Err(e) if !manifest.is_private() => {
                    return Err(ValidationError::InvalidVersion {
                        package: name,
                        version: raw.to_string(),
                        reason: e.to_string(),
                    }
                    .into())
                }
                Err(_) => None,
            },
            None if manifest.is_private() => None,
            None => return Err(ValidationError::MissingVersion(name).into()),
        };

        Ok(Self {
            name,
            version,
            location,
            manifest_path,
            manifest,
            local_dependencies: Vec::new(),
            packed: None,
        })
    }

    /// Package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current version; only private packages may lack one
    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    /// Package directory
    pub fn location(&self) -> &Path {
        &self.location
    }

    /// Path of package.json
    pub fn manifest_path(&self) -> &Path {
        &self.manifest_path
    }

    /// In-memory manifest
    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    /// Whether the package is private
    pub fn is_private(&self) -> bool {
        self.manifest.is_private()
    }

    /// Dependencies on siblings
    pub fn local_dependencies(&self) -> &[LocalDependency] {
        &self.local_dependencies
    }

    /// Tarball produced for this package, if packed
    pub fn packed(&self) -> Option<&PackedArtifact> {
        self.packed.as_ref()
    }

    /// Set the version, in memory only
    pub fn set_version(&mut self, version: Version) {
        self.manifest.set_version(version.to_string());
        self.version = Some(version);
    }

    /// Rewrite one dependency specifier, in memory only
    pub fn set_dependency_spec(&mut self, kind: DependencyKind, name: &str, spec: &str) -> bool {
        self.manifest.set_dependency(kind, name, spec)
    }

    /// Annotate the manifest with the commit it was published from
    pub fn set_git_head(&mut self, sha: &str) {
        self.manifest.set_git_head(sha);
    }

    /// Record the packed tarball
    pub fn set_packed(&mut self, artifact: PackedArtifact) {
        self.packed = Some(artifact);
    }

    pub(crate) fn set_local_dependencies(&mut self, deps: Vec<LocalDependency>) {
        self.local_dependencies = deps;
    }

    /// Write the in-memory manifest to disk
    pub fn serialize(&self) -> Result<()> {
        self.manifest.save(&self.manifest_path)
    }

    /// Re-read the manifest from disk, picking up changes made by scripts.
    ///
    /// The version is re-parsed; an unparsable version keeps the previous one.
    pub fn refresh(&mut self) -> Result<()> {
        self.manifest = PackageManifest::load(&self.manifest_path)?;
        if let Some(version) = self.manifest.version().and_then(|v| Version::parse(v).ok()) {
            self.version = Some(version);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest(json: &str) -> PackageManifest {
        PackageManifest::parse(json).unwrap()
    }

    #[test]
    fn test_missing_version_on_public_package_fails() {
        let err = PackageNode::new("/r/a/package.json", manifest(r#"{"name":"a"}"#)).unwrap_err();
        assert!(err.to_string().contains("missing a version"));
    }

    #[test]
    fn test_private_package_may_omit_version() {
        let node = PackageNode::new(
            "/r/root/package.json",
            manifest(r#"{"name":"root","private":true}"#),
        )
        .unwrap();
        assert!(node.is_private());
        assert!(node.version().is_none());
        assert_eq!(node.location(), Path::new("/r/root"));
    }

    #[test]
    fn test_set_version_updates_manifest() {
        let mut node = PackageNode::new(
            "/r/a/package.json",
            manifest(r#"{"name":"a","version":"1.0.0"}"#),
        )
        .unwrap();
        node.set_version(Version::parse("1.1.0-alpha.0").unwrap());
        assert_eq!(node.manifest().version(), Some("1.1.0-alpha.0"));
        assert_eq!(node.version().unwrap().to_string(), "1.1.0-alpha.0");
    }

    #[test]
    fn test_refresh_picks_up_disk_changes() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("package.json");
        std::fs::write(&path, r#"{"name":"a","version":"1.0.0"}"#).unwrap();
        let mut node = PackageNode::new(&path, PackageManifest::load(&path).unwrap()).unwrap();

        std::fs::write(&path, r#"{"name":"a","version":"1.0.0","main":"dist/index.js"}"#).unwrap();
        node.refresh().unwrap();
        assert!(node
            .manifest()
            .to_json_string()
            .unwrap()
            .contains("dist/index.js"));
    }
}
