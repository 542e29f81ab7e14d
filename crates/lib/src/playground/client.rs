//! Go Playground client: format (goimports or the playground's /fmt) and compile.

use crate::playground::format::{run_formatter, wrap_snippet};
use crate::playground::{CompileResult, Compiler, PlaygroundError};
use async_trait::async_trait;
use serde::Deserialize;

const DEFAULT_GOIMPORTS: &str = "goimports";

/// How snippets are formatted before compiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Formatter {
    /// Local goimports (or compatible) binary.
    Goimports { binary: String },
    /// Remote `/fmt` endpoint (form `body`, `imports=true`; answers `{Body, Error}`).
    Remote { url: String },
}

impl Default for Formatter {
    fn default() -> Self {
        Formatter::Goimports {
            binary: DEFAULT_GOIMPORTS.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct FmtResponse {
    #[serde(rename = "Body", default)]
    body: String,
    #[serde(rename = "Error", default)]
    error: String,
}

/// Client for a Go Playground compile endpoint.
#[derive(Clone)]
pub struct PlaygroundClient {
    compile_url: String,
    formatter: Formatter,
    client: reqwest::Client,
}

impl PlaygroundClient {
    pub fn new(compile_url: impl Into<String>, formatter: Formatter) -> Self {
        Self {
            compile_url: compile_url.into(),
            formatter,
            client: reqwest::Client::new(),
        }
    }

    async fn format_remote(&self, url: &str, program: &str) -> Result<String, PlaygroundError> {
        let res = self
            .client
            .post(url)
            .form(&[("body", program), ("imports", "true")])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PlaygroundError::Api(format!("{} {}", status, body)));
        }
        let data: FmtResponse = res.json().await?;
        if !data.error.is_empty() {
            return Err(PlaygroundError::Format(data.error));
        }
        log::debug!("code formatted:\n{}", data.body);
        Ok(data.body)
    }
}

#[async_trait]
impl Compiler for PlaygroundClient {
    type Error = PlaygroundError;

    async fn format(&self, snippet: &str) -> Result<String, PlaygroundError> {
        let program = wrap_snippet(snippet);
        match &self.formatter {
            Formatter::Goimports { binary } => run_formatter(binary, &program).await,
            Formatter::Remote { url } => self.format_remote(url, &program).await,
        }
    }

    /// POST form `body=<code>` to the compile endpoint.
    async fn compile(&self, code: &str) -> Result<CompileResult, PlaygroundError> {
        let res = self
            .client
            .post(&self.compile_url)
            .form(&[("body", code)])
            .send()
            .await?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(PlaygroundError::Api(format!("{} {}", status, body)));
        }
        Ok(res.json().await?)
    }
}
