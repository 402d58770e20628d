//! Provider contract (C1, §4.5 "Provider contract").
//!
//! Mirrors `toka-llm-gateway::providers::LlmProvider`'s async trait shape,
//! generalized from one hardcoded backend to an arbitrary number of named
//! providers the router dispatches across. No HTTP client lives here — the
//! concrete backends are out of scope (§1); [`MockProvider`] is the only
//! implementation this crate ships, for tests and as a reference shape for
//! a real adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors a provider adapter surfaces (§4.5 "Errors are typed").
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    /// The provider is not currently reachable or serving requests.
    #[error("provider unavailable")]
    Unavailable,
    /// The provider rejected the request on authentication grounds.
    #[error("authentication failed")]
    Authentication,
    /// The provider rate-limited the request.
    #[error("rate limited")]
    RateLimit,
    /// Any other provider-specific failure.
    #[error("provider error: {0}")]
    Other(String),
}

/// Relative pricing tier for a provider's model (§4.5 Capabilities, costTier).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostTier {
    /// No per-request cost.
    Free,
    /// Inexpensive relative to the provider's other models.
    Low,
    /// Mid-range pricing.
    Medium,
    /// Premium pricing.
    High,
}

/// Static capability description for a provider/model pairing (§4.5 Capabilities).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Supported input/output modalities, e.g. `"text"`, `"image"`.
    pub modalities: Vec<String>,
    /// Maximum total context size, in tokens.
    pub max_context_size: u32,
    /// Whether the provider can stream partial output.
    pub streaming: bool,
    /// Whether the provider supports function/tool calling.
    pub function_calling: bool,
    /// Whether the provider accepts image input.
    pub vision: bool,
    /// Relative pricing tier.
    pub cost_tier: CostTier,
}

/// Normalized generation options (§6 "LLM request options (normalized)").
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Overrides the provider's default model.
    pub model: Option<String>,
    /// Sampling temperature, conventionally in `[0, 2]`.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling parameter.
    pub top_p: Option<f32>,
    /// Whether to stream partial output.
    pub stream: bool,
    /// Stop sequences.
    pub stop: Vec<String>,
    /// Penalizes tokens already present in the context.
    pub presence_penalty: Option<f32>,
    /// Penalizes tokens by their existing frequency.
    pub frequency_penalty: Option<f32>,
    /// The calling agent's role, consulted by task-characteristic estimation.
    pub role: Option<String>,
    /// Groups requests belonging to one multi-turn conversation.
    pub conversation_id: Option<String>,
    /// Explicit task characteristics, bypassing estimation from the prompt.
    pub task: Option<crate::TaskCharacteristics>,
    /// Per-call timeout, in milliseconds. Default 30s (§5 Timeouts).
    pub timeout_ms: Option<u64>,
}

/// A single completed generation (§4.5 Provider contract, `Generate(...) → Response`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated text.
    pub content: String,
    /// Tokens consumed by the prompt, if reported.
    pub prompt_tokens: Option<u32>,
    /// Tokens consumed by the completion, if reported.
    pub completion_tokens: Option<u32>,
}

/// Uniform generate/health contract over one LLM backend (C1).
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate a completion for `prompt` under `options`.
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError>;

    /// Probe whether the provider is currently serving requests.
    async fn is_available(&self) -> bool;

    /// Static capability description.
    fn capabilities(&self) -> Capabilities;

    /// Provider name, as declared in [`crate::RouterConfig`].
    fn provider_name(&self) -> &str;

    /// Model name in use.
    fn model_name(&self) -> &str;
}

/// Reference/test provider returning a scripted response or error.
pub struct MockProvider {
    name: String,
    model: String,
    capabilities: Capabilities,
    behavior: std::sync::Mutex<MockBehavior>,
}

enum MockBehavior {
    Succeed(String),
    Fail(ProviderError),
}

impl MockProvider {
    /// A provider that always succeeds, returning `content`.
    pub fn succeeding(name: impl Into<String>, model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            capabilities: default_capabilities(),
            behavior: std::sync::Mutex::new(MockBehavior::Succeed(content.into())),
        }
    }

    /// A provider that always fails with `error`.
    pub fn failing(name: impl Into<String>, model: impl Into<String>, error: ProviderError) -> Self {
        Self {
            name: name.into(),
            model: model.into(),
            capabilities: default_capabilities(),
            behavior: std::sync::Mutex::new(MockBehavior::Fail(error)),
        }
    }

    /// Override the default test capabilities.
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

fn default_capabilities() -> Capabilities {
    Capabilities {
        modalities: vec!["text".to_string()],
        max_context_size: 8_192,
        streaming: false,
        function_calling: false,
        vision: false,
        cost_tier: CostTier::Medium,
    }
}

#[async_trait]
impl LlmProvider for MockProvider {
    async fn generate(
        &self,
        _prompt: &str,
        _options: &GenerationOptions,
    ) -> Result<GenerationResult, ProviderError> {
        match &*self.behavior.lock().unwrap() {
            MockBehavior::Succeed(content) => Ok(GenerationResult {
                content: content.clone(),
                prompt_tokens: None,
                completion_tokens: None,
            }),
            MockBehavior::Fail(err) => Err(err.clone()),
        }
    }

    async fn is_available(&self) -> bool {
        !matches!(&*self.behavior.lock().unwrap(), MockBehavior::Fail(ProviderError::Unavailable))
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn provider_name(&self) -> &str {
        &self.name
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
