//! Temporary license copies for packages that ship without one

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use tandem_core::error::Result;

fn is_license_file(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    let stem = upper.split('.').next().unwrap_or_default();
    stem == "LICENSE" || stem == "LICENCE"
}

/// First license file directly inside `dir`, by name
pub fn find_license(dir: &Path) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|entry| is_license_file(&entry.file_name().to_string_lossy()))
        .map(|entry| entry.path())
        .collect();
    found.sort();
    found.into_iter().next()
}

/// License files copied into packages for the duration of packing.
///
/// Copies are removed by [`cleanup`](StagedLicenses::cleanup), or on drop
/// if the pipeline bails out before reaching it.
#[derive(Debug, Default)]
pub struct StagedLicenses {
    created: Vec<PathBuf>,
}

impl StagedLicenses {
    /// Copy the root license into every directory in `targets` that has
    /// none. `targets` are `(package, directory)` pairs.
    ///
    /// Packages stay unlicensed, with a warning, when the root has no
    /// license either or the copy fails.
    pub fn stage(root: &Path, targets: &[(String, PathBuf)]) -> Self {
        let missing: Vec<&(String, PathBuf)> = targets
            .iter()
            .filter(|(_, dir)| find_license(dir).is_none())
            .collect();
        if missing.is_empty() {
            return Self::default();
        }

        let Some(license) = find_license(root) else {
            let names: Vec<&str> = missing.iter().map(|(name, _)| name.as_str()).collect();
            warn!(packages = %names.join(", "), "packages are missing a license, and no root license was found");
            return Self::default();
        };

        let file_name = license.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("LICENSE"));
        let mut staged = Self::default();
        for (name, dir) in missing {
            let target = dir.join(&file_name);
            debug!(package = %name, path = %target.display(), "staging root license");
            match copy(&license, &target) {
                Ok(()) => staged.created.push(target),
                Err(e) => warn!(package = %name, error = %e, "could not copy root license, package is unlicensed"),
            }
        }
        staged
    }

    /// Files this run created
    pub fn paths(&self) -> &[PathBuf] {
        &self.created
    }

    /// Remove the copies; safe to call more than once
    pub fn cleanup(&mut self) {
        for path in self.created.drain(..) {
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "failed to remove staged license");
                }
            }
        }
    }
}

fn copy(from: &Path, to: &Path) -> Result<()> {
    if let Some(dir) = to.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::copy(from, to)?;
    Ok(())
}

impl Drop for StagedLicenses {
    fn drop(&mut self) {
        self.cleanup();
    }
}
