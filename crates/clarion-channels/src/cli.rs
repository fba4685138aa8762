//! Terminal channel: prompts on stdout, answers on stdin.

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use clarion_api::ClarificationDescriptor;

use crate::channel::{ChannelError, ClarificationChannel};

/// Interactive terminal channel.
///
/// Multiple-choice options are shown as a numbered list; the user may
/// answer with the number or the option text. Action clarifications are
/// considered ready once the user confirms with Enter.
pub struct CliChannel {
    stdin: Mutex<BufReader<Stdin>>,
}

impl CliChannel {
    pub fn new() -> Self {
        Self {
            stdin: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }

    async fn write_line(&self, line: &str) -> Result<(), ChannelError> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }

    async fn read_line(&self) -> Result<String, ChannelError> {
        let mut buffer = String::new();
        let mut stdin = self.stdin.lock().await;
        stdin.read_line(&mut buffer).await?;
        Ok(buffer.trim().to_string())
    }
}

impl Default for CliChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ClarificationChannel for CliChannel {
    async fn present(&self, clarification: &ClarificationDescriptor) -> Result<(), ChannelError> {
        self.write_line("").await?;
        self.write_line(&format!(
            "[{}] {}",
            clarification.step, clarification.prompt
        ))
        .await?;
        if let Some(options) = &clarification.options {
            for (index, option) in options.iter().enumerate() {
                self.write_line(&format!("  {}. {}", index + 1, option))
                    .await?;
            }
        }
        if let Some(url) = &clarification.action_url {
            self.write_line(&format!("  -> {}", url)).await?;
        }
        Ok(())
    }

    async fn collect(
        &self,
        clarification: &ClarificationDescriptor,
    ) -> Result<Value, ChannelError> {
        self.write_line("> ").await?;
        let answer = self.read_line().await?;

        if let Some(options) = &clarification.options {
            // Accept a 1-based index into the presented list
            if let Ok(index) = answer.parse::<usize>() {
                if index >= 1 && index <= options.len() {
                    return Ok(Value::String(options[index - 1].clone()));
                }
            }
        }
        Ok(Value::String(answer))
    }

    async fn poll_ready(
        &self,
        clarification: &ClarificationDescriptor,
    ) -> Result<bool, ChannelError> {
        self.write_line(&format!(
            "Press Enter once you have completed: {}",
            clarification.prompt
        ))
        .await?;
        self.read_line().await?;
        Ok(true)
    }
}
