//! npm-compatible version increments

use semver::{BuildMetadata, Prerelease, Version};

use tandem_core::error::{Result, ValidationError};
use tandem_core::types::ReleaseType;

/// Increment `version` the way npm's `semver.inc` does.
///
/// Build metadata is always dropped. `preid` names the prerelease
/// identifier for the `pre*` kinds; without it a bare counter is used.
pub fn increment(version: &Version, release: ReleaseType, preid: Option<&str>) -> Result<Version> {
    let mut next = Version::new(version.major, version.minor, version.patch);
    let was_prerelease = !version.pre.is_empty();

    match release {
        ReleaseType::Major => {
            if !(was_prerelease && version.minor == 0 && version.patch == 0) {
                next.major += 1;
            }
            next.minor = 0;
            next.patch = 0;
        }
        ReleaseType::Minor => {
            if !(was_prerelease && version.patch == 0) {
                next.minor += 1;
            }
            next.patch = 0;
        }
        ReleaseType::Patch => {
            if !was_prerelease {
                next.patch += 1;
            }
        }
        ReleaseType::Premajor => {
            next.major += 1;
            next.minor = 0;
            next.patch = 0;
            next.pre = first_prerelease(preid)?;
        }
        ReleaseType::Preminor => {
            next.minor += 1;
            next.patch = 0;
            next.pre = first_prerelease(preid)?;
        }
        ReleaseType::Prepatch => {
            next.patch += 1;
            next.pre = first_prerelease(preid)?;
        }
        ReleaseType::Prerelease => {
            if was_prerelease {
                next.pre = bump_prerelease(&version.pre, preid)?;
            } else {
                next.patch += 1;
                next.pre = first_prerelease(preid)?;
            }
        }
    }

    next.build = BuildMetadata::EMPTY;
    Ok(next)
}

fn first_prerelease(preid: Option<&str>) -> Result<Prerelease> {
    let text = match preid {
        Some(id) => format!("{}.0", id),
        None => "0".to_string(),
    };
    parse_prerelease(&text)
}

fn bump_prerelease(current: &Prerelease, preid: Option<&str>) -> Result<Prerelease> {
    let mut parts: Vec<String> = current.as_str().split('.').map(str::to_string).collect();

    if let Some(id) = preid {
        if parts.first().map(String::as_str) != Some(id) {
            return first_prerelease(Some(id));
        }
    }

    match parts.iter().rposition(|p| p.parse::<u64>().is_ok()) {
        Some(i) => {
            let n: u64 = parts[i].parse().unwrap_or(0);
            parts[i] = (n + 1).to_string();
        }
        None => parts.push("0".to_string()),
    }
    parse_prerelease(&parts.join("."))
}

fn parse_prerelease(text: &str) -> Result<Prerelease> {
    Prerelease::new(text).map_err(|e| {
        ValidationError::Invalid(format!("invalid prerelease identifier '{}': {}", text, e)).into()
    })
}
