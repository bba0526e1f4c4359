//! Hook System - Execute shell commands at publish lifecycle stages
//!
//! Hooks run per package around packing and publishing:
//! - pre-pack: Before a package tarball is produced
//! - post-pack: After a package tarball is produced
//! - pre-publish: Before a package is uploaded (and once at the root before the first upload)
//! - post-publish: After a package is uploaded (and once at the root after the last one)

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{HookEntry, HooksConfig};
use crate::error::{HookError, Result};

/// Hook lifecycle stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    /// Before packing
    PrePack,
    /// After packing
    PostPack,
    /// Before publishing
    PrePublish,
    /// After publishing
    PostPublish,
}

impl HookStage {
    /// Get the stage name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrePack => "pre-pack",
            Self::PostPack => "post-pack",
            Self::PrePublish => "pre-publish",
            Self::PostPublish => "post-publish",
        }
    }

    /// Parse stage from string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pre-pack" => Some(Self::PrePack),
            "post-pack" => Some(Self::PostPack),
            "pre-publish" => Some(Self::PrePublish),
            "post-publish" => Some(Self::PostPublish),
            _ => None,
        }
    }

    /// Get all stages in order
    pub fn all() -> &'static [HookStage] {
        &[
            Self::PrePack,
            Self::PostPack,
            Self::PrePublish,
            Self::PostPublish,
        ]
    }
}

/// A hook command to execute
#[derive(Debug, Clone)]
pub struct Hook {
    /// The command to run
    pub command: String,
    /// Whether to fail the release if hook fails
    pub fail_on_error: bool,
    /// Timeout in seconds
    pub timeout: Option<u64>,
}

impl Hook {
    /// Create a new hook with just a command
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            fail_on_error: true,
            timeout: None,
        }
    }

    /// Set whether to fail on error
    pub fn with_fail_on_error(mut self, fail: bool) -> Self {
        self.fail_on_error = fail;
        self
    }

    /// Set the timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = Some(seconds);
        self
    }
}

impl From<&HookEntry> for Hook {
    fn from(entry: &HookEntry) -> Self {
        match entry {
            HookEntry::Command(command) => Hook::new(command.clone()),
            HookEntry::Detailed {
                command,
                fail_on_error,
                timeout,
            } => Hook {
                command: command.clone(),
                fail_on_error: *fail_on_error,
                timeout: *timeout,
            },
        }
    }
}

/// Result of executing a hook
#[derive(Debug, Clone)]
pub struct HookResult {
    /// The stage that was executed
    pub stage: HookStage,
    /// The command that was run
    pub command: String,
    /// Whether execution succeeded
    pub success: bool,
    /// Exit code if available
    pub exit_code: Option<i32>,
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
    /// Execution time in milliseconds
    pub duration_ms: u64,
}

/// Variables exported to hook commands
#[derive(Debug, Clone, Default)]
pub struct HookContext {
    /// Package name; unset for root hooks
    pub package_name: Option<String>,
    /// Version being published
    pub version: Option<String>,
    /// Dist tag the version is published under
    pub dist_tag: Option<String>,
    /// Working directory for the command
    pub cwd: Option<PathBuf>,
}

impl HookContext {
    /// Create a new hook context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the package name
    pub fn with_package_name(mut self, name: impl Into<String>) -> Self {
        self.package_name = Some(name.into());
        self
    }

    /// Set the version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Set the dist tag
    pub fn with_dist_tag(mut self, tag: impl Into<String>) -> Self {
        self.dist_tag = Some(tag.into());
        self
    }

    /// Run the command from this directory
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Convert context to environment variables
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();

        if let Some(ref v) = self.package_name {
            env.insert("TANDEM_PACKAGE".to_string(), v.clone());
        }
        if let Some(ref v) = self.version {
            env.insert("TANDEM_VERSION".to_string(), v.clone());
        }
        if let Some(ref v) = self.dist_tag {
            env.insert("TANDEM_DIST_TAG".to_string(), v.clone());
        }

        env
    }
}

/// Hook runner for executing hooks at lifecycle stages
#[derive(Debug, Clone, Default)]
pub struct HookRunner {
    /// Registered hooks by stage
    hooks: HashMap<HookStage, Vec<Hook>>,
    /// Directory used when the context has no cwd
    base_dir: Option<PathBuf>,
}

impl HookRunner {
    /// Create a new hook runner
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a runner from configuration
    pub fn from_config(config: &HooksConfig, base_dir: &Path) -> Self {
        let mut runner = Self::new().with_base_dir(base_dir);
        for (stage_name, entries) in &config.stages {
            if let Some(stage) = HookStage::from_str(stage_name) {
                for entry in entries {
                    runner.register(stage, entry.into());
                }
            }
        }
        runner
    }

    /// Set the base directory
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// Register a hook for a stage
    pub fn register(&mut self, stage: HookStage, hook: Hook) {
        self.hooks.entry(stage).or_default().push(hook);
    }

    /// Get hooks for a stage
    pub fn get_hooks(&self, stage: HookStage) -> &[Hook] {
        self.hooks.get(&stage).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Check if there are any hooks for a stage
    pub fn has_hooks(&self, stage: HookStage) -> bool {
        !self.get_hooks(stage).is_empty()
    }

    /// Execute all hooks for a stage, stopping at the first failing hook
    /// that has `fail_on_error` set
    pub fn run(&self, stage: HookStage, context: &HookContext) -> Result<Vec<HookResult>> {
        let hooks = self.get_hooks(stage);
        if hooks.is_empty() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        let context_env = context.to_env();
        let cwd = context.cwd.as_deref().or(self.base_dir.as_deref());

        for hook in hooks {
            info!(stage = stage.as_str(), command = %hook.command, "running hook");
            let result = execute_hook(stage, hook, cwd, &context_env)?;
            let failed = !result.success && hook.fail_on_error;
            if !result.success && !failed {
                warn!(
                    stage = stage.as_str(),
                    command = %hook.command,
                    exit_code = ?result.exit_code,
                    "hook failed, continuing"
                );
            }
            results.push(result);

            if failed {
                return Err(HookError::ExecutionFailed {
                    stage: stage.as_str().to_string(),
                    command: hook.command.clone(),
                    message: "Hook failed with non-zero exit code".to_string(),
                }
                .into());
            }
        }

        Ok(results)
    }
}

fn execute_hook(
    stage: HookStage,
    hook: &Hook,
    cwd: Option<&Path>,
    context_env: &HashMap<String, String>,
) -> Result<HookResult> {
    let start = Instant::now();
    let exec_err = |message: String| HookError::ExecutionFailed {
        stage: stage.as_str().to_string(),
        command: hook.command.clone(),
        message,
    };

    let shell = if cfg!(windows) { "cmd" } else { "sh" };
    let shell_arg = if cfg!(windows) { "/C" } else { "-c" };

    let mut cmd = Command::new(shell);
    cmd.arg(shell_arg).arg(&hook.command);
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }
    cmd.envs(context_env);
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| exec_err(e.to_string()))?;

    let (status, stdout, stderr) = match hook.timeout {
        None => {
            let output = child
                .wait_with_output()
                .map_err(|e| exec_err(e.to_string()))?;
            (
                output.status,
                String::from_utf8_lossy(&output.stdout).to_string(),
                String::from_utf8_lossy(&output.stderr).to_string(),
            )
        }
        Some(secs) => {
            // pipes are drained while waiting so a chatty hook cannot fill them and stall
            let stdout = drain(child.stdout.take());
            let stderr = drain(child.stderr.take());
            let deadline = start + Duration::from_secs(secs);
            let status = loop {
                if let Some(status) = child.try_wait().map_err(|e| exec_err(e.to_string()))? {
                    break status;
                }
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(HookError::Timeout {
                        stage: stage.as_str().to_string(),
                        command: hook.command.clone(),
                        timeout_secs: secs,
                    }
                    .into());
                }
                std::thread::sleep(Duration::from_millis(25));
            };
            (status, collect(stdout), collect(stderr))
        }
    };

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(stage = stage.as_str(), duration_ms, success = status.success(), "hook finished");

    Ok(HookResult {
        stage,
        command: hook.command.clone(),
        success: status.success(),
        exit_code: status.code(),
        stdout,
        stderr,
        duration_ms,
    })
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<String>> {
    pipe.map(|mut pipe| {
        std::thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).to_string()
        })
    })
}

fn collect(reader: Option<JoinHandle<String>>) -> String {
    reader.and_then(|handle| handle.join().ok()).unwrap_or_default()
}
