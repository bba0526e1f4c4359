//! Default configuration values

/// Default configuration file name (TOML)
pub const DEFAULT_CONFIG_TOML: &str = "tandem.toml";

/// Default configuration file name (YAML)
pub const DEFAULT_CONFIG_YAML: &str = "tandem.yaml";

/// Default package location glob
pub const DEFAULT_PACKAGE_GLOB: &str = "packages/*";

/// Default fixed-mode tag prefix
pub const DEFAULT_TAG_VERSION_PREFIX: &str = "v";

/// Default canary prerelease identifier
pub const DEFAULT_CANARY_PREID: &str = "alpha";

/// Default dist tag
pub const DEFAULT_DIST_TAG: &str = "latest";

/// Temporary dist tag used before promotion
pub const TEMP_DIST_TAG: &str = "tandem-temp";

/// Public npm registry
pub const NPM_REGISTRY: &str = "https://registry.npmjs.org/";

/// Yarn's proxy of the npm registry
pub const YARN_REGISTRY: &str = "https://registry.yarnpkg.com";

/// Get list of config file names to search for
pub fn config_file_names() -> Vec<&'static str> {
    vec![
        DEFAULT_CONFIG_TOML,
        DEFAULT_CONFIG_YAML,
        ".tandem.toml",
        ".tandem.yaml",
    ]
}

/// Default configuration template
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# tandem configuration
version = "independent"
packages = ["packages/*"]

[publish]
tag_version_prefix = "v"
git_reset = true
verify_access = true

[canary]
preid = "alpha"
bump = "patch"
"#;
