//! Core types for tandem

use serde::{Deserialize, Serialize};

/// Kind of version increment, using npm's keyword set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseType {
    /// Major version bump (breaking changes)
    Major,
    /// Minor version bump (new features)
    Minor,
    /// Patch version bump (bug fixes)
    Patch,
    /// Bump major and start a prerelease
    Premajor,
    /// Bump minor and start a prerelease
    Preminor,
    /// Bump patch and start a prerelease
    Prepatch,
    /// Advance the prerelease counter
    Prerelease,
}

impl ReleaseType {
    /// Returns the string representation of the release type
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Premajor => "premajor",
            Self::Preminor => "preminor",
            Self::Prepatch => "prepatch",
            Self::Prerelease => "prerelease",
        }
    }

    /// Whether the keyword starts with `pre`
    pub fn is_prerelease(&self) -> bool {
        matches!(
            self,
            Self::Premajor | Self::Preminor | Self::Prepatch | Self::Prerelease
        )
    }

    /// The `pre*` counterpart of a plain bump; prerelease kinds map to themselves
    pub fn to_prerelease(self) -> Self {
        match self {
            Self::Major => Self::Premajor,
            Self::Minor => Self::Preminor,
            Self::Patch => Self::Prepatch,
            other => other,
        }
    }
}

impl std::fmt::Display for ReleaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReleaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(Self::Major),
            "minor" => Ok(Self::Minor),
            "patch" => Ok(Self::Patch),
            "premajor" => Ok(Self::Premajor),
            "preminor" => Ok(Self::Preminor),
            "prepatch" => Ok(Self::Prepatch),
            "prerelease" | "pre" => Ok(Self::Prerelease),
            _ => Err(format!("Unknown release type: {}", s)),
        }
    }
}

/// Which dependency fields produce graph edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphType {
    /// Regular and optional dependencies
    #[default]
    Dependencies,
    /// Regular, optional and dev dependencies
    All,
}

impl std::str::FromStr for GraphType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dependencies" => Ok(Self::Dependencies),
            "all" => Ok(Self::All),
            _ => Err(format!("Unknown graph type: {} (expected dependencies or all)", s)),
        }
    }
}

/// A package that reached the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPackage {
    /// The package name
    pub name: String,
    /// Published version
    pub version: String,
}

impl PublishedPackage {
    /// Create a new published record
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for PublishedPackage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}
