use async_trait::async_trait;

/// Text-completion service consumed by the reasoning loop and by the
/// completion-backed tools.
///
/// Text in, text out. Implementations do not retry; a failure surfaces to the
/// caller as-is.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Complete `prompt` and return the generated text.
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    /// Provider name for logs and status output
    fn name(&self) -> &str;
}
