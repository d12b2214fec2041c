// ABOUTME: Operator confirmation prompts.
// ABOUTME: Terminal prompt for the CLI and a fixed answer for unattended runs and tests.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[async_trait]
pub trait Confirmation: Send + Sync {
    /// Ask a yes/no question. Anything other than an explicit yes is a no.
    async fn confirm(&self, question: &str) -> std::io::Result<bool>;
}

/// Reads the answer from stdin.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl Confirmation for TerminalPrompt {
    async fn confirm(&self, question: &str) -> std::io::Result<bool> {
        let mut stderr = tokio::io::stderr();
        stderr
            .write_all(format!("{question} [y/N] ").as_bytes())
            .await?;
        stderr.flush().await?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await?;
        Ok(is_yes(&line))
    }
}

/// Always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

#[async_trait]
impl Confirmation for FixedAnswer {
    async fn confirm(&self, question: &str) -> std::io::Result<bool> {
        tracing::debug!(question, answer = self.0, "answering confirmation");
        Ok(self.0)
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_explicit_yes_confirms() {
        assert!(is_yes("y\n"));
        assert!(is_yes(" YES "));
        assert!(!is_yes(""));
        assert!(!is_yes("n"));
        assert!(!is_yes("yep"));
    }

    #[tokio::test]
    async fn fixed_answer_is_returned() {
        assert!(FixedAnswer(true).confirm("go?").await.unwrap());
        assert!(!FixedAnswer(false).confirm("go?").await.unwrap());
    }
}
