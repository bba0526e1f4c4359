//! One-time password handling shared by every registry write of a run

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info};

use tandem_core::error::{RegistryError, Result};
use tandem_core::traits::{OtpPrompter, PublishRequest, RegistryClient};
use tandem_tasks::ConcurrencyLimit;

/// Attempts with a fresh password before giving up
const MAX_OTP_ATTEMPTS: usize = 3;

/// The run's current one-time password.
///
/// Writers are serialized by the lock. A task that was rejected with the
/// password it used asks for a new one only if nobody replaced it in the
/// meantime, so concurrent rejections collapse into a single prompt.
pub struct OtpCache {
    current: Mutex<Option<String>>,
    prompter: Arc<dyn OtpPrompter>,
}

impl OtpCache {
    pub fn new(prompter: Arc<dyn OtpPrompter>, initial: Option<String>) -> Self {
        Self {
            current: Mutex::new(initial.filter(|otp| !otp.is_empty())),
            prompter,
        }
    }

    /// Current password, if any
    pub async fn get(&self) -> Option<String> {
        self.current.lock().await.clone()
    }

    /// Get a password to replace `stale`, prompting at most once across
    /// concurrent callers
    pub async fn refresh(&self, stale: Option<&str>) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(otp) = current.as_deref() {
            if Some(otp) != stale {
                debug!("reusing password entered by another task");
                return Ok(otp.to_string());
            }
        }
        let otp = self.prompter.request_otp("This operation requires a one-time password:").await?;
        *current = Some(otp.clone());
        Ok(otp)
    }

    /// Ask for a password up front unless one is cached
    pub async fn prime(&self) -> Result<()> {
        if self.get().await.is_none() {
            info!("account requires two-factor authentication");
            self.refresh(None).await?;
        }
        Ok(())
    }

    /// Run a registry write, retrying with a fresh password when the
    /// registry asks for one.
    ///
    /// The wait for operator input is taken out of the worker budget.
    pub async fn run(&self, registry: &dyn RegistryClient, op: &RegistryOp<'_>, limit: &ConcurrencyLimit) -> Result<()> {
        let mut attempts = 0;
        loop {
            let otp = self.get().await;
            match op.call(registry, otp.as_deref()).await {
                Ok(()) => return Ok(()),
                Err(RegistryError::OtpRequired) if attempts < MAX_OTP_ATTEMPTS => {
                    attempts += 1;
                    limit.suspend(self.refresh(otp.as_deref())).await?;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// A registry write that may need a one-time password
#[derive(Debug, Clone, Copy)]
pub enum RegistryOp<'a> {
    Publish(&'a PublishRequest),
    AddDistTag { spec: &'a str, tag: &'a str },
    RemoveDistTag { spec: &'a str, tag: &'a str },
}

impl RegistryOp<'_> {
    async fn call(&self, registry: &dyn RegistryClient, otp: Option<&str>) -> std::result::Result<(), RegistryError> {
        match *self {
            Self::Publish(request) => registry.publish(request, otp).await,
            Self::AddDistTag { spec, tag } => registry.add_dist_tag(spec, tag, otp).await,
            Self::RemoveDistTag { spec, tag } => registry.remove_dist_tag(spec, tag, otp).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{CountingPrompter, FakeRegistry};

    #[tokio::test]
    async fn test_concurrent_rejections_prompt_once() {
        let prompter = Arc::new(CountingPrompter::new("654321"));
        let cache = Arc::new(OtpCache::new(prompter.clone(), Some("expired".to_string())));

        let mut waiters = Vec::new();
        for _ in 0..4 {
            let cache = cache.clone();
            waiters.push(tokio::spawn(async move { cache.refresh(Some("expired")).await }));
        }
        for waiter in waiters {
            assert_eq!(waiter.await.unwrap().unwrap(), "654321");
        }
        assert_eq!(prompter.count(), 1);
    }

    #[tokio::test]
    async fn test_run_retries_with_fresh_password() {
        let prompter = Arc::new(CountingPrompter::new("111111"));
        let cache = OtpCache::new(prompter.clone(), None);
        let registry = FakeRegistry::requiring_otp("111111");

        let op = RegistryOp::AddDistTag {
            spec: "core@1.0.0",
            tag: "latest",
        };
        cache.run(&registry, &op, &ConcurrencyLimit::new(1)).await.unwrap();

        assert_eq!(prompter.count(), 1);
        assert_eq!(registry.calls(), vec!["dist-tag add core@1.0.0 latest"]);
    }

    #[tokio::test]
    async fn test_seeded_password_skips_prompt() {
        let prompter = Arc::new(CountingPrompter::new("000000"));
        let cache = OtpCache::new(prompter.clone(), Some("111111".to_string()));
        let registry = FakeRegistry::requiring_otp("111111");

        let op = RegistryOp::RemoveDistTag {
            spec: "core@1.0.0",
            tag: "tandem-temp",
        };
        cache.run(&registry, &op, &ConcurrencyLimit::new(1)).await.unwrap();
        assert_eq!(prompter.count(), 0);
    }
}
