//! Interactive prompts on the terminal

use async_trait::async_trait;
use dialoguer::{Confirm, Input};

use tandem_core::error::{Result, TandemError};
use tandem_core::traits::{Confirmer, OtpPrompter};

/// Yes/no confirmation through dialoguer
#[derive(Debug, Default)]
pub struct TerminalConfirmer;

impl Confirmer for TerminalConfirmer {
    fn confirm(&self, message: &str) -> Result<bool> {
        Confirm::new()
            .with_prompt(message)
            .default(false)
            .interact()
            .map_err(|e| TandemError::Prompt(e.to_string()))
    }
}

/// Reads a one-time password from the terminal
#[derive(Debug, Default)]
pub struct TerminalOtpPrompter;

#[async_trait]
impl OtpPrompter for TerminalOtpPrompter {
    async fn request_otp(&self, prompt: &str) -> Result<String> {
        let prompt = prompt.to_string();
        let entered = tokio::task::spawn_blocking(move || {
            Input::<String>::new()
                .with_prompt(prompt)
                .validate_with(|input: &String| -> std::result::Result<(), &str> {
                    if !input.trim().is_empty() && input.trim().chars().all(|c| c.is_ascii_digit()) {
                        Ok(())
                    } else {
                        Err("the one-time password is numeric")
                    }
                })
                .interact_text()
        })
        .await
        .map_err(|e| TandemError::Prompt(e.to_string()))?
        .map_err(|e| TandemError::Prompt(e.to_string()))?;
        Ok(entered.trim().to_string())
    }
}
