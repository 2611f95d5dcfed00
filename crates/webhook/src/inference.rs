use async_trait::async_trait;
use llm::InferenceError;

/// Text generation backend used by the dispatcher.
#[async_trait]
pub trait Inference: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError>;
}

#[async_trait]
impl Inference for llm::Client {
    async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        llm::Client::generate(self, prompt).await
    }
}
