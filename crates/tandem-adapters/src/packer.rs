//! Tarball creation with `npm pack`

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, instrument};

use tandem_core::error::PackError;
use tandem_core::monorepo::PackedArtifact;
use tandem_core::traits::{PackRequest, Packer};

use crate::command::NpmCommand;

/// Packer backed by the npm CLI
#[derive(Debug, Clone)]
pub struct NpmPacker {
    npm: NpmCommand,
}

impl NpmPacker {
    pub fn new(npm: NpmCommand) -> Self {
        Self { npm }
    }
}

#[derive(Debug, Deserialize)]
struct PackEntry {
    filename: String,
    shasum: String,
    #[serde(default)]
    integrity: Option<String>,
    #[serde(default)]
    files: Vec<PackFile>,
}

#[derive(Debug, Deserialize)]
struct PackFile {
    path: String,
}

/// Parse `npm pack --json` output.
///
/// Lifecycle scripts may print before the JSON array, so parsing starts
/// at the first line that opens one.
pub fn parse_pack_output(package: &str, destination: &Path, stdout: &str) -> Result<PackedArtifact, PackError> {
    let start = stdout
        .match_indices('[')
        .map(|(i, _)| i)
        .find(|&i| i == 0 || stdout[..i].ends_with('\n'))
        .ok_or_else(|| PackError::InvalidOutput {
            package: package.to_string(),
            reason: "no JSON in npm pack output".to_string(),
        })?;

    let entries: Vec<PackEntry> =
        serde_json::from_str(stdout[start..].trim()).map_err(|e| PackError::InvalidOutput {
            package: package.to_string(),
            reason: e.to_string(),
        })?;
    let entry = entries.into_iter().next().ok_or_else(|| PackError::InvalidOutput {
        package: package.to_string(),
        reason: "npm pack reported no tarball".to_string(),
    })?;

    Ok(PackedArtifact {
        tarball_path: destination.join(&entry.filename),
        shasum: entry.shasum,
        integrity: entry.integrity,
        files: entry.files.into_iter().map(|f| f.path).collect(),
    })
}

#[async_trait]
impl Packer for NpmPacker {
    #[instrument(skip(self, request), fields(package = %request.name))]
    async fn pack(&self, request: &PackRequest) -> Result<PackedArtifact, PackError> {
        tokio::fs::create_dir_all(&request.destination).await?;

        let contents = request.contents.to_string_lossy().into_owned();
        let destination = request.destination.to_string_lossy().into_owned();
        let mut args = vec![
            "pack",
            contents.as_str(),
            "--json",
            "--pack-destination",
            destination.as_str(),
        ];
        if request.ignore_scripts {
            args.push("--ignore-scripts");
        }

        let output = self
            .npm
            .run(&args, Some(&request.location))
            .await
            .map_err(|e| PackError::Failed {
                package: request.name.clone(),
                reason: e.to_string(),
            })?;
        if !output.success {
            return Err(PackError::Failed {
                package: request.name.clone(),
                reason: output.stderr.trim().to_string(),
            });
        }

        let artifact = parse_pack_output(&request.name, &request.destination, &output.stdout)?;
        debug!(tarball = %artifact.tarball_path.display(), files = artifact.files.len(), "packed");
        Ok(artifact)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = r#"
> @scope/core@1.0.0 prepack
> tsc

[
  {
    "id": "@scope/core@1.0.0",
    "name": "@scope/core",
    "version": "1.0.0",
    "filename": "scope-core-1.0.0.tgz",
    "shasum": "0123456789abcdef0123456789abcdef01234567",
    "integrity": "sha512-abc",
    "files": [{"path": "LICENSE"}, {"path": "package.json"}, {"path": "dist/index.js"}]
  }
]
"#;

    #[test]
    fn test_parse_pack_output_skips_script_noise() {
        let artifact = parse_pack_output("@scope/core", Path::new("/tmp/out"), OUTPUT).unwrap();
        assert_eq!(artifact.tarball_path, Path::new("/tmp/out/scope-core-1.0.0.tgz"));
        assert_eq!(artifact.integrity.as_deref(), Some("sha512-abc"));
        assert_eq!(artifact.files, vec!["LICENSE", "package.json", "dist/index.js"]);
    }

    #[test]
    fn test_parse_pack_output_rejects_garbage() {
        assert!(parse_pack_output("a", Path::new("/tmp"), "nothing here").is_err());
        assert!(parse_pack_output("a", Path::new("/tmp"), "[]").is_err());
    }
}
