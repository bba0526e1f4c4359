//! Invocation of the npm CLI

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, instrument};

use tandem_core::error::RegistryError;

use crate::credentials::{nerf_dart, normalize_registry, Credential};

/// Captured output of one npm call
#[derive(Debug, Clone)]
pub struct NpmOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// npm executable bound to one registry
#[derive(Debug, Clone)]
pub struct NpmCommand {
    program: PathBuf,
    registry: String,
    credential: Option<Credential>,
}

impl NpmCommand {
    /// Locate `npm` on `PATH`
    pub fn locate(registry: &str) -> Result<Self, RegistryError> {
        let program = which::which("npm").map_err(|e| RegistryError::CommandFailed {
            command: "npm".to_string(),
            reason: format!("npm not found on PATH: {}", e),
        })?;
        Ok(Self::with_program(program, registry))
    }

    pub fn with_program(program: impl Into<PathBuf>, registry: &str) -> Self {
        Self {
            program: program.into(),
            registry: normalize_registry(registry),
            credential: None,
        }
    }

    pub fn with_credential(mut self, credential: Option<Credential>) -> Self {
        self.credential = credential;
        self
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    /// Flags appended to every call
    fn common_args(&self) -> Vec<String> {
        let mut args = vec!["--registry".to_string(), self.registry.clone()];
        if let Some(credential) = &self.credential {
            args.push(format!(
                "--{}:{}={}",
                nerf_dart(&self.registry),
                credential.config_key(),
                credential.value()
            ));
        }
        args
    }

    /// Run `npm <args>` in `cwd`; a non-zero exit is reported in the output,
    /// not as an error
    #[instrument(skip(self, cwd), fields(registry = %self.registry))]
    pub async fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<NpmOutput, RegistryError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .args(self.common_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|e| RegistryError::CommandFailed {
            command: render(args),
            reason: e.to_string(),
        })?;

        let result = NpmOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(command = %render(args), success = result.success, "npm finished");
        Ok(result)
    }

    /// Run and turn a failure into a classified error
    pub async fn run_checked(&self, args: &[&str], cwd: Option<&Path>) -> Result<NpmOutput, RegistryError> {
        let output = self.run(args, cwd).await?;
        if output.success {
            Ok(output)
        } else {
            Err(classify_failure(&render(args), &self.registry, &output))
        }
    }
}

fn render(args: &[&str]) -> String {
    // never echo an --otp value
    let mut parts = vec!["npm".to_string()];
    let mut hide_next = false;
    for arg in args {
        if hide_next {
            parts.push("***".to_string());
            hide_next = false;
            continue;
        }
        hide_next = *arg == "--otp";
        parts.push(arg.to_string());
    }
    parts.join(" ")
}

/// npm error code (`E404`, `EOTP`, ...) reported in the output, if any
pub fn error_code(output: &NpmOutput) -> Option<String> {
    let text = format!("{}\n{}", output.stderr, output.stdout);
    for line in text.lines() {
        if let Some(rest) = line.trim().strip_prefix("npm ERR! code ") {
            return Some(rest.trim().to_string());
        }
        if let Some(rest) = line.trim().strip_prefix("npm error code ") {
            return Some(rest.trim().to_string());
        }
    }
    // `--json` failures carry the code in a JSON body
    let json_start = output.stdout.find('{')?;
    let value: serde_json::Value = serde_json::from_str(&output.stdout[json_start..]).ok()?;
    value
        .pointer("/error/code")
        .and_then(|c| c.as_str())
        .map(str::to_string)
}

/// Map a failed npm call to a registry error
pub fn classify_failure(command: &str, registry: &str, output: &NpmOutput) -> RegistryError {
    let code = error_code(output);
    let reason = output
        .stderr
        .lines()
        .rev()
        .find(|l| !l.trim().is_empty())
        .unwrap_or("npm exited with an error")
        .to_string();

    let lower = output.stderr.to_lowercase();
    match code.as_deref() {
        Some("EOTP") => RegistryError::OtpRequired,
        Some("E401") if lower.contains("one-time pass") => RegistryError::OtpRequired,
        Some("E401") | Some("ENEEDAUTH") => RegistryError::AuthenticationFailed {
            registry: registry.to_string(),
            reason,
        },
        Some("E404") => RegistryError::NotFound(reason),
        _ if lower.contains("one-time password") => RegistryError::OtpRequired,
        _ => RegistryError::CommandFailed {
            command: command.to_string(),
            reason,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(stderr: &str) -> NpmOutput {
        NpmOutput {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    #[test]
    fn test_otp_errors_are_distinguishable() {
        let out = failed("npm ERR! code EOTP\nnpm ERR! This operation requires a one-time password.");
        assert!(matches!(
            classify_failure("npm publish", "https://registry.npmjs.org/", &out),
            RegistryError::OtpRequired
        ));

        let out = failed("npm error code E401\nnpm error This operation requires a one-time password");
        assert!(matches!(
            classify_failure("npm publish", "https://registry.npmjs.org/", &out),
            RegistryError::OtpRequired
        ));
    }

    #[test]
    fn test_auth_and_not_found() {
        let out = failed("npm ERR! code ENEEDAUTH\nnpm ERR! need auth");
        assert!(matches!(
            classify_failure("npm whoami", "r", &out),
            RegistryError::AuthenticationFailed { .. }
        ));

        let out = failed("npm ERR! code E404\nnpm ERR! 404 Not Found - GET https://registry.npmjs.org/nope");
        assert!(matches!(classify_failure("npm view", "r", &out), RegistryError::NotFound(_)));
    }

    #[test]
    fn test_json_error_code() {
        let out = NpmOutput {
            success: false,
            stdout: r#"{"error":{"code":"E404","summary":"not found"}}"#.to_string(),
            stderr: String::new(),
        };
        assert_eq!(error_code(&out).as_deref(), Some("E404"));
    }

    #[test]
    fn test_render_hides_otp() {
        assert_eq!(
            render(&["publish", "a.tgz", "--otp", "123456"]),
            "npm publish a.tgz --otp ***"
        );
    }

    #[test]
    fn test_credential_flag_is_scoped() {
        let npm = NpmCommand::with_program("npm", "https://registry.npmjs.org")
            .with_credential(Some(Credential::Token("t0k".to_string())));
        assert_eq!(
            npm.common_args(),
            vec![
                "--registry".to_string(),
                "https://registry.npmjs.org/".to_string(),
                "--//registry.npmjs.org/:_authToken=t0k".to_string(),
            ]
        );
    }
}
