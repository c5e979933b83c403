//! Operator confirmation gate

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::errors::UpdateError;

/// Human-in-the-loop confirmation for decisions the orchestrator must not
/// take on its own (proceeding over uncommitted local changes)
#[async_trait]
pub trait OperatorGate: Send + Sync {
    /// Ask the operator; `false` means decline
    async fn confirm(&self, prompt: &str) -> Result<bool, UpdateError>;
}

/// Prompts on stdin; `--yes` short-circuits to approval
pub struct ConsoleGate {
    assume_yes: bool,
}

impl ConsoleGate {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

#[async_trait]
impl OperatorGate for ConsoleGate {
    async fn confirm(&self, prompt: &str) -> Result<bool, UpdateError> {
        if self.assume_yes {
            return Ok(true);
        }

        let mut stdout = tokio::io::stdout();
        stdout.write_all(prompt.as_bytes()).await?;
        stdout.write_all(b" [y/N] ").await?;
        stdout.flush().await?;

        let mut line = String::new();
        let bytes = BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;

        // EOF counts as decline
        if bytes == 0 {
            return Ok(false);
        }

        let answer = line.trim();
        Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
    }
}
