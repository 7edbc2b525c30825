use std::io::{self, Write};

use async_trait::async_trait;

/// Source of operator-supplied verification codes.
///
/// The login flow prompts through this trait during MFA and challenge
/// steps; tests substitute a scripted implementation.
#[async_trait]
pub trait Prompter: Send + Sync {
    async fn prompt(&self, message: &str) -> io::Result<String>;
}

/// Blocking stdin prompter for interactive use.
pub struct StdinPrompter;

#[async_trait]
impl Prompter for StdinPrompter {
    async fn prompt(&self, message: &str) -> io::Result<String> {
        let message = message.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stdout = io::stdout();
            write!(stdout, "{}", message)?;
            stdout.flush()?;

            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            Ok(line.trim().to_string())
        })
        .await
        .map_err(io::Error::other)?
    }
}
