//! Compile dependency: format a snippet, then compile and run it remotely.

mod client;
mod format;

pub use client::{Formatter, PlaygroundClient};
pub use format::{run_formatter, wrap_snippet};

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum PlaygroundError {
    #[error("playground request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("playground api error: {0}")]
    Api(String),
    #[error("format failed: {0}")]
    Format(String),
}

/// Compile service answer. Non-empty `compile_errors` means the program did not build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CompileResult {
    #[serde(default)]
    pub compile_errors: String,
    #[serde(default)]
    pub output: String,
}

impl CompileResult {
    /// Program output as a fenced block, ready to post.
    pub fn fenced_output(&self) -> String {
        format!("```{}```", self.output)
    }
}

/// Two-phase compile contract used by the compile stage.
#[async_trait]
pub trait Compiler: Send + Sync {
    type Error: std::fmt::Display + Send;

    /// Wrap the snippet into a runnable program and format it.
    async fn format(&self, snippet: &str) -> Result<String, Self::Error>;

    /// Compile and run formatted code.
    async fn compile(&self, code: &str) -> Result<CompileResult, Self::Error>;
}
