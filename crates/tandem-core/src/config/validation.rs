//! Configuration validation

use tracing::debug;

use crate::error::{ConfigError, Result};
use crate::hooks::HookStage;

use super::types::Config;

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    debug!("validating configuration");
    validate_version(config)?;
    validate_packages(config)?;
    validate_publish(config)?;
    validate_hooks(config)?;
    debug!("configuration validation passed");
    Ok(())
}

fn validate_version(config: &Config) -> Result<()> {
    if let Some(version) = config.fixed_version() {
        semver::Version::parse(version).map_err(|e| ConfigError::InvalidValue {
            field: "version".to_string(),
            message: format!("must be \"independent\" or a semver version: {}", e),
        })?;
    }
    Ok(())
}

fn validate_packages(config: &Config) -> Result<()> {
    if config.packages.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "packages".to_string(),
            message: "at least one package glob is required".to_string(),
        }
        .into());
    }

    for pattern in &config.packages {
        glob::Pattern::new(pattern).map_err(|e| ConfigError::InvalidValue {
            field: "packages".to_string(),
            message: format!("invalid glob '{}': {}", pattern, e),
        })?;
    }

    for pattern in &config.publish.local_links.preserve {
        globset::Glob::new(pattern).map_err(|e| ConfigError::InvalidValue {
            field: "publish.local_links.preserve".to_string(),
            message: format!("invalid glob '{}': {}", pattern, e),
        })?;
    }

    Ok(())
}

fn validate_publish(config: &Config) -> Result<()> {
    if config.publish.concurrency == Some(0) {
        return Err(ConfigError::InvalidValue {
            field: "publish.concurrency".to_string(),
            message: "must be at least 1".to_string(),
        }
        .into());
    }

    for (field, tag) in [
        ("publish.dist_tag", &config.publish.dist_tag),
        ("publish.pre_dist_tag", &config.publish.pre_dist_tag),
    ] {
        if let Some(tag) = tag {
            // npm refuses tags that parse as a version range
            if tag.is_empty() || semver::VersionReq::parse(tag).is_ok() {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    message: format!("'{}' is not a usable dist tag", tag),
                }
                .into());
            }
        }
    }

    if config.canary.preid.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: "canary.preid".to_string(),
            message: "cannot be empty".to_string(),
        }
        .into());
    }

    Ok(())
}

fn validate_hooks(config: &Config) -> Result<()> {
    for stage in config.hooks.stages.keys() {
        if HookStage::from_str(stage).is_none() {
            return Err(ConfigError::InvalidValue {
                field: format!("hooks.{}", stage),
                message: "unknown hook stage".to_string(),
            }
            .into());
        }
    }
    Ok(())
}
