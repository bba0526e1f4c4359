//! What a publish run hands back to its caller

use std::fmt::Write;

use tandem_core::types::PublishedPackage;

/// Why a run stopped without doing anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// The resolver selected no packages
    NoCandidates,
    /// The operator declined the confirmation prompt
    Declined,
}

/// End state of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every stage completed
    Published(Vec<PublishedPackage>),
    /// Nothing was changed
    Aborted(AbortReason),
}

impl PublishOutcome {
    /// Packages that reached the registry
    pub fn published(&self) -> &[PublishedPackage] {
        match self {
            Self::Published(packages) => packages,
            Self::Aborted(_) => &[],
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }

    /// Success listing, one ` - name@version` line per package
    pub fn summary(&self) -> Option<String> {
        let published = self.published();
        if published.is_empty() {
            return None;
        }
        let mut out = String::from("Successfully published:");
        for pkg in published {
            let _ = write!(out, "\n - {}@{}", pkg.name, pkg.version);
        }
        Some(out)
    }
}
