//! `git describe` against release tags

use git2::{DescribeFormatOptions, DescribeOptions, ErrorClass, ErrorCode};
use regex::Regex;
use tracing::{debug, instrument};

use tandem_core::error::GitError;
use tandem_core::traits::DescribeResult;

use crate::repository::{GitRepo, Result};

/// Abbreviated object id length used for canary build metadata
const SHORT_SHA_LEN: usize = 7;

/// Parsed pieces of a long-format describe string (`<tag>-<count>-g<sha>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDescribe {
    /// Tag name
    pub tag: String,
    /// Text after the last `@` in the tag, or the whole tag
    pub version: String,
    /// Commits since the tag
    pub ref_count: u64,
    /// Abbreviated commit id
    pub sha: String,
}

/// Parse `git describe --long` output
pub fn parse_describe(output: &str) -> Option<ParsedDescribe> {
    let re = Regex::new(r"^(?P<tag>(?:.*@)?(?P<version>.*))-(?P<count>\d+)-g(?P<sha>[0-9a-f]+)(?:-dirty)?$").ok()?;
    let caps = re.captures(output.trim())?;
    Some(ParsedDescribe {
        tag: caps["tag"].to_string(),
        version: caps["version"].to_string(),
        ref_count: caps["count"].parse().ok()?,
        sha: caps["sha"].to_string(),
    })
}

impl GitRepo {
    /// Describe HEAD against the nearest tag matching `pattern`.
    ///
    /// Without a reachable tag, `ref_count` is the number of commits
    /// reachable from HEAD and the tag fields are empty.
    #[instrument(skip(self))]
    pub fn describe(&self, pattern: &str, include_merged_tags: bool) -> Result<DescribeResult> {
        let head = self.head_commit()?;
        let sha: String = head.id().to_string().chars().take(SHORT_SHA_LEN).collect();
        let is_dirty = !self.is_clean()?;

        let mut opts = DescribeOptions::new();
        opts.describe_tags()
            .pattern(pattern)
            .only_follow_first_parent(!include_merged_tags);

        match self.repo.describe(&opts) {
            Ok(describe) => {
                let mut format = DescribeFormatOptions::new();
                format
                    .always_use_long_format(true)
                    .abbreviated_size(SHORT_SHA_LEN as u32);
                let output = describe.format(Some(&format))?;
                debug!(output = %output, "described HEAD");

                let parsed = parse_describe(&output)
                    .ok_or_else(|| GitError::UnknownReference(output.clone()))?;
                Ok(DescribeResult {
                    last_tag_name: Some(parsed.tag),
                    last_version: Some(parsed.version),
                    ref_count: parsed.ref_count,
                    sha: parsed.sha,
                    is_dirty,
                })
            }
            // "cannot describe" comes back as a generic Describe class error
            Err(e) if e.code() == ErrorCode::NotFound || e.class() == ErrorClass::Describe => {
                let mut walk = self.repo.revwalk()?;
                walk.push(head.id())?;
                let ref_count = walk.count() as u64;
                debug!(pattern, ref_count, "no matching tag reachable from HEAD");
                Ok(DescribeResult {
                    last_tag_name: None,
                    last_version: None,
                    ref_count,
                    sha,
                    is_dirty,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::testing;

    #[test]
    fn test_parse_independent_tag() {
        let parsed = parse_describe("@scope/pkg@1.2.0-4-gabcd123").unwrap();
        assert_eq!(parsed.tag, "@scope/pkg@1.2.0");
        assert_eq!(parsed.version, "1.2.0");
        assert_eq!(parsed.ref_count, 4);
        assert_eq!(parsed.sha, "abcd123");
    }

    #[test]
    fn test_parse_fixed_tag_with_dashes() {
        let parsed = parse_describe("v1.0.0-beta.1-0-g1234567-dirty").unwrap();
        assert_eq!(parsed.tag, "v1.0.0-beta.1");
        assert_eq!(parsed.version, "v1.0.0-beta.1");
        assert_eq!(parsed.ref_count, 0);
    }

    #[test]
    fn test_describe_counts_commits_since_tag() {
        let (temp, repo) = testing::init();
        testing::commit_file(&repo, "a.txt", "1", "one");
        testing::tag(&repo, "v1.2.0");
        testing::commit_file(&repo, "a.txt", "2", "two");
        testing::commit_file(&repo, "a.txt", "3", "three");

        let git = GitRepo::discover(temp.path()).unwrap();
        let result = git.describe("v*.*.*", false).unwrap();
        assert_eq!(result.last_tag_name.as_deref(), Some("v1.2.0"));
        assert_eq!(result.last_version.as_deref(), Some("v1.2.0"));
        assert_eq!(result.ref_count, 2);
        assert_eq!(result.sha.len(), 7);
        assert!(!result.is_dirty);
    }

    #[test]
    fn test_describe_without_tags() {
        let (temp, repo) = testing::init();
        testing::commit_file(&repo, "a.txt", "1", "one");
        testing::commit_file(&repo, "a.txt", "2", "two");

        let git = GitRepo::discover(temp.path()).unwrap();
        let result = git.describe("*@*", false).unwrap();
        assert_eq!(result.last_tag_name, None);
        assert_eq!(result.ref_count, 2);
    }

    #[test]
    fn test_describe_unreleased_package_among_other_tags() {
        let (temp, repo) = testing::init();
        testing::commit_file(&repo, "a.txt", "1", "one");
        testing::tag(&repo, "core@1.0.0");
        testing::commit_file(&repo, "a.txt", "2", "two");

        let git = GitRepo::discover(temp.path()).unwrap();
        let result = git.describe("fresh@*", false).unwrap();
        assert_eq!(result.last_tag_name, None);
        assert_eq!(result.last_version, None);
        assert_eq!(result.ref_count, 2);

        let core = git.describe("core@*", false).unwrap();
        assert_eq!(core.last_version.as_deref(), Some("1.0.0"));
        assert_eq!(core.ref_count, 1);
    }
}
