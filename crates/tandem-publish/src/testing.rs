//! Recording collaborators for pipeline tests

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use semver::Version;
use tempfile::TempDir;

use tandem_core::config::{Config, NPM_REGISTRY};
use tandem_core::error::{GitError, PackError, RegistryError, Result};
use tandem_core::monorepo::{load_graph, DependencyGraph, PackedArtifact};
use tandem_core::traits::{
    Confirmer, DescribeResult, GitClient, OtpPrompter, PackRequest, Packer, PublishRequest, RegistryClient,
};

use crate::license::find_license;
use crate::pipeline::Collaborators;

/// Call log shared between fakes, in call order
#[derive(Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Package directories with real manifests under a temp root
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn with_root_license(self) -> Self {
        fs::write(self.root().join("LICENSE"), "MIT").unwrap();
        self
    }

    pub fn package(self, name: &str, version: &str, deps: &[(&str, &str)]) -> Self {
        let dir = self.package_dir(name);
        fs::create_dir_all(&dir).unwrap();
        let deps: serde_json::Map<String, serde_json::Value> = deps
            .iter()
            .map(|(dep, spec)| (dep.to_string(), serde_json::Value::String(spec.to_string())))
            .collect();
        let doc = serde_json::json!({
            "name": name,
            "version": version,
            "dependencies": deps,
        });
        fs::write(dir.join("package.json"), serde_json::to_string_pretty(&doc).unwrap()).unwrap();
        self
    }

    pub fn package_dir(&self, name: &str) -> PathBuf {
        self.root().join("packages").join(name)
    }

    pub fn manifest(&self, name: &str) -> serde_json::Value {
        let raw = fs::read_to_string(self.package_dir(name).join("package.json")).unwrap();
        serde_json::from_str(&raw).unwrap()
    }

    pub fn graph(&self) -> DependencyGraph {
        load_graph(self.root(), &Config::default()).unwrap()
    }
}

pub struct FakeGit {
    root: PathBuf,
    pub checkouts: Mutex<Vec<PathBuf>>,
}

impl FakeGit {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            checkouts: Mutex::new(Vec::new()),
        }
    }
}

impl GitClient for FakeGit {
    fn root(&self) -> &Path {
        &self.root
    }

    fn describe_ref(&self, _pattern: &str, _include_merged_tags: bool) -> std::result::Result<DescribeResult, GitError> {
        Ok(DescribeResult {
            last_tag_name: None,
            last_version: None,
            ref_count: 3,
            sha: "abcd123".to_string(),
            is_dirty: false,
        })
    }

    fn current_tags(&self, _pattern: &str) -> std::result::Result<Vec<String>, GitError> {
        Ok(Vec::new())
    }

    fn checkout(&self, paths: &[PathBuf]) -> std::result::Result<(), GitError> {
        self.checkouts.lock().unwrap().extend(paths.iter().cloned());
        Ok(())
    }

    fn current_sha(&self) -> std::result::Result<String, GitError> {
        Ok("deadbeefcafe".to_string())
    }

    fn ensure_clean(&self) -> std::result::Result<(), GitError> {
        Ok(())
    }

    fn files_changed_in_head(&self) -> std::result::Result<Vec<PathBuf>, GitError> {
        Ok(Vec::new())
    }

    fn files_changed_since(&self, _reference: &str) -> std::result::Result<Vec<PathBuf>, GitError> {
        Ok(Vec::new())
    }
}

/// Registry that logs every successful write
pub struct FakeRegistry {
    url: String,
    log: Log,
    /// `name@version` specs already on the registry
    pub published: HashSet<String>,
    /// Password every write must carry
    pub required_otp: Option<String>,
    pub two_factor: bool,
    /// Packages whose publish fails
    pub failing: HashSet<String>,
}

impl FakeRegistry {
    pub fn new(log: Log) -> Self {
        Self {
            url: NPM_REGISTRY.to_string(),
            log,
            published: HashSet::new(),
            required_otp: None,
            two_factor: false,
            failing: HashSet::new(),
        }
    }

    pub fn requiring_otp(otp: &str) -> Self {
        let mut registry = Self::new(Log::default());
        registry.required_otp = Some(otp.to_string());
        registry
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.url = url.to_string();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.entries()
    }

    fn check_otp(&self, otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        match &self.required_otp {
            Some(required) if otp != Some(required.as_str()) => Err(RegistryError::OtpRequired),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    fn registry_url(&self) -> &str {
        &self.url
    }

    async fn username(&self) -> std::result::Result<Option<String>, RegistryError> {
        self.log.push("whoami");
        Ok(Some("tester".to_string()))
    }

    async fn package_access(&self, _packages: &[String], _username: &str) -> Result<()> {
        Ok(())
    }

    async fn two_factor_required(&self) -> std::result::Result<bool, RegistryError> {
        Ok(self.two_factor)
    }

    async fn is_published(&self, name: &str, version: &Version) -> std::result::Result<bool, RegistryError> {
        Ok(self.published.contains(&format!("{}@{}", name, version)))
    }

    async fn publish(&self, request: &PublishRequest, otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        self.check_otp(otp)?;
        if self.failing.contains(&request.name) {
            return Err(RegistryError::CommandFailed {
                command: "npm publish".to_string(),
                reason: "E403".to_string(),
            });
        }
        self.log
            .push(format!("publish {}@{} {}", request.name, request.version, request.tag));
        Ok(())
    }

    async fn add_dist_tag(&self, spec: &str, tag: &str, otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        self.check_otp(otp)?;
        self.log.push(format!("dist-tag add {} {}", spec, tag));
        Ok(())
    }

    async fn remove_dist_tag(&self, spec: &str, tag: &str, otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        self.check_otp(otp)?;
        self.log.push(format!("dist-tag rm {} {}", spec, tag));
        Ok(())
    }
}

/// Packer that writes an empty tarball and notes whether a license was present
pub struct FakePacker {
    log: Log,
    pub failing: HashSet<String>,
}

impl FakePacker {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            failing: HashSet::new(),
        }
    }
}

#[async_trait]
impl Packer for FakePacker {
    async fn pack(&self, request: &PackRequest) -> std::result::Result<PackedArtifact, PackError> {
        if self.failing.contains(&request.name) {
            return Err(PackError::Failed {
                package: request.name.clone(),
                reason: "prepack script exited with 1".to_string(),
            });
        }
        let licensed = find_license(&request.contents).is_some();
        self.log.push(format!("pack {} licensed={}", request.name, licensed));

        let tarball = request.destination.join(format!("{}-1.0.0.tgz", request.name));
        fs::write(&tarball, b"")?;
        Ok(PackedArtifact {
            tarball_path: tarball,
            shasum: "da39a3ee5e6b4b0d3255bfef95601890afd80709".to_string(),
            integrity: None,
            files: vec!["package.json".to_string()],
        })
    }
}

pub struct CountingPrompter {
    otp: String,
    count: AtomicUsize,
}

impl CountingPrompter {
    pub fn new(otp: &str) -> Self {
        Self {
            otp: otp.to_string(),
            count: AtomicUsize::new(0),
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OtpPrompter for CountingPrompter {
    async fn request_otp(&self, _prompt: &str) -> Result<String> {
        self.count.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        Ok(self.otp.clone())
    }
}

pub struct ScriptedConfirmer {
    answer: bool,
    pub messages: Mutex<Vec<String>>,
}

impl ScriptedConfirmer {
    pub fn new(answer: bool) -> Self {
        Self {
            answer,
            messages: Mutex::new(Vec::new()),
        }
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, message: &str) -> Result<bool> {
        self.messages.lock().unwrap().push(message.to_string());
        Ok(self.answer)
    }
}

/// Fakes wired together around one workspace
pub struct Harness {
    pub log: Log,
    pub git: Arc<FakeGit>,
    pub registry: Arc<FakeRegistry>,
    pub packer: Arc<FakePacker>,
    pub prompter: Arc<CountingPrompter>,
    pub confirmer: Arc<ScriptedConfirmer>,
}

impl Harness {
    pub fn new(root: &Path) -> Self {
        let log = Log::default();
        Self {
            git: Arc::new(FakeGit::new(root)),
            registry: Arc::new(FakeRegistry::new(log.clone())),
            packer: Arc::new(FakePacker::new(log.clone())),
            prompter: Arc::new(CountingPrompter::new("123456")),
            confirmer: Arc::new(ScriptedConfirmer::new(true)),
            log,
        }
    }

    pub fn with_registry(mut self, configure: impl FnOnce(FakeRegistry) -> FakeRegistry) -> Self {
        self.registry = Arc::new(configure(FakeRegistry::new(self.log.clone())));
        self
    }

    pub fn with_packer(mut self, configure: impl FnOnce(FakePacker) -> FakePacker) -> Self {
        self.packer = Arc::new(configure(FakePacker::new(self.log.clone())));
        self
    }

    pub fn with_confirmer(mut self, answer: bool) -> Self {
        self.confirmer = Arc::new(ScriptedConfirmer::new(answer));
        self
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            git: self.git.clone(),
            registry: self.registry.clone(),
            packer: self.packer.clone(),
            prompter: self.prompter.clone(),
            confirmer: self.confirmer.clone(),
        }
    }
}
