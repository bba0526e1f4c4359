//! npm registry client

use std::collections::HashMap;

use async_trait::async_trait;
use semver::Version;
use tracing::{debug, info, instrument, warn};

use tandem_core::error::{RegistryError, Result, ValidationError};
use tandem_core::traits::{PublishRequest, RegistryClient};

use crate::command::{classify_failure, error_code, NpmCommand};

/// Registry client backed by the npm CLI
#[derive(Debug, Clone)]
pub struct NpmRegistry {
    npm: NpmCommand,
}

impl NpmRegistry {
    pub fn new(npm: NpmCommand) -> Self {
        Self { npm }
    }
}

/// Name part of `name@version`, scoped names included
pub fn package_name(spec: &str) -> &str {
    match spec.rsplit_once('@') {
        Some((name, _)) if !name.is_empty() => name,
        _ => spec,
    }
}

/// Parse `npm access list packages --json`: package name to permission
pub fn parse_access_list(json: &str) -> std::result::Result<HashMap<String, String>, RegistryError> {
    if json.trim().is_empty() {
        return Ok(HashMap::new());
    }
    serde_json::from_str(json).map_err(|e| RegistryError::InvalidResponse(format!("access list: {}", e)))
}

/// Whether `npm profile get --json` reports writes gated by 2FA
pub fn parse_two_factor(json: &str) -> std::result::Result<bool, RegistryError> {
    let profile: serde_json::Value =
        serde_json::from_str(json).map_err(|e| RegistryError::InvalidResponse(format!("profile: {}", e)))?;
    Ok(profile
        .pointer("/tfa/mode")
        .and_then(|m| m.as_str())
        .map_or(false, |mode| mode == "auth-and-writes"))
}

#[async_trait]
impl RegistryClient for NpmRegistry {
    fn registry_url(&self) -> &str {
        self.npm.registry()
    }

    #[instrument(skip(self))]
    async fn username(&self) -> std::result::Result<Option<String>, RegistryError> {
        let output = self.npm.run_checked(&["whoami"], None).await?;
        let name = output.stdout.trim();
        Ok((!name.is_empty()).then(|| name.to_string()))
    }

    #[instrument(skip(self, packages))]
    async fn package_access(&self, packages: &[String], username: &str) -> Result<()> {
        let output = self
            .npm
            .run(&["access", "list", "packages", username, "--json"], None)
            .await?;
        if !output.success {
            match error_code(&output).as_deref() {
                // some registries do not implement the access endpoints
                Some("E500") | Some("E404") | Some("E405") => {
                    warn!("registry does not support access verification, skipping");
                    return Ok(());
                }
                _ => {
                    return Err(classify_failure("npm access list packages", self.npm.registry(), &output).into())
                }
            }
        }

        let permissions = parse_access_list(&output.stdout)?;
        for name in packages {
            match permissions.get(name).map(String::as_str) {
                None => debug!(package = %name, "not on the registry yet"),
                Some("read-write") => {}
                Some(_) => return Err(ValidationError::AccessDenied(name.clone()).into()),
            }
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn two_factor_required(&self) -> std::result::Result<bool, RegistryError> {
        let output = self.npm.run(&["profile", "get", "--json"], None).await?;
        if !output.success {
            // automation tokens cannot read the profile
            info!("unable to read the registry profile, assuming no 2FA");
            return Ok(false);
        }
        parse_two_factor(&output.stdout)
    }

    #[instrument(skip(self))]
    async fn is_published(&self, name: &str, version: &Version) -> std::result::Result<bool, RegistryError> {
        let spec = format!("{}@{}", name, version);
        let output = self.npm.run(&["view", &spec, "version", "--json"], None).await?;
        if output.success {
            return Ok(!output.stdout.trim().is_empty());
        }
        match classify_failure("npm view", self.npm.registry(), &output) {
            RegistryError::NotFound(_) => Ok(false),
            other => Err(other),
        }
    }

    #[instrument(skip(self, request, otp), fields(package = %request.name, version = %request.version, tag = %request.tag))]
    async fn publish(&self, request: &PublishRequest, otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        let tarball = request.tarball.to_string_lossy().into_owned();
        let mut args = vec!["publish", tarball.as_str(), "--tag", request.tag.as_str()];
        if let Some(access) = &request.access {
            args.push("--access");
            args.push(access);
        }
        if let Some(otp) = otp {
            args.push("--otp");
            args.push(otp);
        }
        self.npm.run_checked(&args, Some(&request.location)).await?;
        Ok(())
    }

    #[instrument(skip(self, otp))]
    async fn add_dist_tag(&self, spec: &str, tag: &str, otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        let mut args = vec!["dist-tag", "add", spec, tag];
        if let Some(otp) = otp {
            args.push("--otp");
            args.push(otp);
        }
        self.npm.run_checked(&args, None).await?;
        Ok(())
    }

    #[instrument(skip(self, otp))]
    async fn remove_dist_tag(&self, spec: &str, tag: &str, otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        let mut args = vec!["dist-tag", "rm", package_name(spec), tag];
        if let Some(otp) = otp {
            args.push("--otp");
            args.push(otp);
        }
        self.npm.run_checked(&args, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name() {
        assert_eq!(package_name("core@1.0.0"), "core");
        assert_eq!(package_name("@scope/core@1.0.0"), "@scope/core");
        assert_eq!(package_name("@scope/core"), "@scope/core");
        assert_eq!(package_name("core"), "core");
    }

    #[test]
    fn test_parse_access_list() {
        let map = parse_access_list(r#"{"@scope/a":"read-write","@scope/b":"read-only"}"#).unwrap();
        assert_eq!(map["@scope/a"], "read-write");
        assert_eq!(map["@scope/b"], "read-only");
        assert!(parse_access_list("").unwrap().is_empty());
        assert!(parse_access_list("not json").is_err());
    }

    #[test]
    fn test_parse_two_factor() {
        assert!(parse_two_factor(r#"{"name":"me","tfa":{"mode":"auth-and-writes"}}"#).unwrap());
        assert!(!parse_two_factor(r#"{"name":"me","tfa":{"mode":"auth-only"}}"#).unwrap());
        assert!(!parse_two_factor(r#"{"name":"me","tfa":false}"#).unwrap());
    }

    // a fake npm that echoes its arguments lets the command shape be checked
    #[cfg(unix)]
    #[tokio::test]
    async fn test_publish_arguments() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let script = temp.path().join("npm");
        std::fs::write(&script, "#!/bin/sh\necho \"$@\" > \"$PWD/args.txt\"\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let registry = NpmRegistry::new(NpmCommand::with_program(&script, "https://registry.npmjs.org"));
        let request = PublishRequest {
            name: "core".to_string(),
            version: Version::new(1, 0, 0),
            tarball: temp.path().join("core-1.0.0.tgz"),
            tag: "next".to_string(),
            access: Some("public".to_string()),
            location: temp.path().to_path_buf(),
        };
        registry.publish(&request, Some("123456")).await.unwrap();

        let args = std::fs::read_to_string(temp.path().join("args.txt")).unwrap();
        assert!(args.starts_with("publish "));
        assert!(args.contains("core-1.0.0.tgz --tag next --access public --otp 123456"));
        assert!(args.contains("--registry https://registry.npmjs.org/"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_eotp_maps_to_otp_required() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::TempDir::new().unwrap();
        let script = temp.path().join("npm");
        std::fs::write(&script, "#!/bin/sh\necho 'npm ERR! code EOTP' >&2\nexit 1\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let registry = NpmRegistry::new(NpmCommand::with_program(&script, "https://registry.npmjs.org"));
        let err = registry.add_dist_tag("core@1.0.0", "latest", None).await.unwrap_err();
        assert!(matches!(err, RegistryError::OtpRequired));
    }
}
