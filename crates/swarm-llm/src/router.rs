//! LLM Router (C2, §4.5). Rule-driven provider selection with a shared
//! health cache and fallback chains, mirroring
//! `toka-llm-gateway::LlmGateway`'s rate-limiting/metrics shape but
//! generalized from one hardcoded provider to a named registry the router
//! picks across.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::characteristics::{self, Complexity, TaskCharacteristics, TaskType};
use crate::providers::{GenerationOptions, LlmProvider, ProviderError};

/// Health cache TTL (§4.5 "Health is cached for 5 minutes per provider").
pub const DEFAULT_HEALTH_CACHE_TTL: Duration = Duration::from_secs(5 * 60);

/// Rate-limit cool-down window (§4.5 "a cool-down window (default 60s)").
pub const DEFAULT_RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

/// Default per-call timeout (§5 Timeouts, "default 30s").
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Errors the router surfaces.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RouterError {
    /// No configured provider is reachable (§4.5 step 5, `LLMUnavailable`).
    #[error("no healthy provider available")]
    LlmUnavailable,
    /// Every candidate in the fallback chain failed the generation call.
    #[error("all providers failed")]
    AllProvidersFailed,
    /// A named provider was not registered with the router.
    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

/// A conjunctive, all-optional match condition over a task's characteristics
/// (§4.5 Routing rule).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingCondition {
    /// Matches if the task's type is one of these.
    pub task_types: Option<Vec<TaskType>>,
    /// Matches if the task's complexity is one of these.
    pub complexities: Option<Vec<Complexity>>,
    /// Matches if `context_size` falls in `[min, max]` (inclusive).
    pub context_size: Option<(u32, u32)>,
    /// Matches if the request's iteration count falls in `[min, max]`.
    pub iteration: Option<(u32, u32)>,
    /// Matches if the calling role is one of these.
    pub agent_roles: Option<Vec<String>>,
}

impl RoutingCondition {
    /// Whether `characteristics` satisfies every `Some` field of this condition.
    pub fn matches(&self, characteristics: &TaskCharacteristics) -> bool {
        if let Some(types) = &self.task_types {
            if !types.contains(&characteristics.task_type) {
                return false;
            }
        }
        if let Some(complexities) = &self.complexities {
            if !complexities.contains(&characteristics.complexity) {
                return false;
            }
        }
        if let Some((min, max)) = self.context_size {
            if characteristics.context_size < min || characteristics.context_size > max {
                return false;
            }
        }
        if let Some((min, max)) = self.iteration {
            match characteristics.iteration {
                Some(it) if it >= min && it <= max => {}
                _ => return false,
            }
        }
        if let Some(roles) = &self.agent_roles {
            match &characteristics.role {
                Some(role) if roles.iter().any(|r| r == role) => {}
                _ => return false,
            }
        }
        true
    }
}

/// A named routing rule (§4.5 Routing rule).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingRule {
    /// Human-readable rule name.
    pub name: String,
    /// Match condition.
    pub condition: RoutingCondition,
    /// The provider this rule routes to when it matches.
    pub target_provider: String,
    /// Higher evaluates first.
    pub priority: i32,
    /// Recorded as the selection reason when this rule fires.
    pub reason: String,
}

/// Tie-breaking preference among equally-matching healthy providers
/// (§4.5 Cost optimization modes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostOptimization {
    /// Prefer free-tier providers.
    Cost,
    /// Prefer historically faster providers.
    Speed,
    /// Prefer larger context windows and function-calling support.
    Quality,
}

/// Router configuration (§4.5 Routing rule, Cost optimization modes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Ordered routing rules; evaluated by descending `priority`.
    pub rules: Vec<RoutingRule>,
    /// Provider used when no rule matches.
    pub default_provider: String,
    /// Fallback providers tried, in declared order, after the default.
    pub fallback_providers: Vec<String>,
    /// Tie-breaking preference.
    pub cost_optimization: CostOptimization,
    #[serde(skip, default = "default_health_ttl")]
    health_cache_ttl: Duration,
    #[serde(skip, default = "default_cooldown")]
    rate_limit_cooldown: Duration,
}

fn default_health_ttl() -> Duration {
    DEFAULT_HEALTH_CACHE_TTL
}

fn default_cooldown() -> Duration {
    DEFAULT_RATE_LIMIT_COOLDOWN
}

impl RouterConfig {
    /// Construct a configuration with the default health-cache TTL,
    /// rate-limit cool-down, and quality-first tie-breaking.
    pub fn new(default_provider: impl Into<String>) -> Self {
        Self {
            rules: Vec::new(),
            default_provider: default_provider.into(),
            fallback_providers: Vec::new(),
            cost_optimization: CostOptimization::Quality,
            health_cache_ttl: DEFAULT_HEALTH_CACHE_TTL,
            rate_limit_cooldown: DEFAULT_RATE_LIMIT_COOLDOWN,
        }
    }

    /// Append a routing rule.
    pub fn with_rule(mut self, rule: RoutingRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Set the fallback chain.
    pub fn with_fallbacks(mut self, fallbacks: Vec<String>) -> Self {
        self.fallback_providers = fallbacks;
        self
    }

    /// Override the cost-optimization mode.
    pub fn with_cost_optimization(mut self, mode: CostOptimization) -> Self {
        self.cost_optimization = mode;
        self
    }
}

#[derive(Debug, Clone, Copy)]
struct HealthEntry {
    healthy: bool,
    checked_at: Instant,
}

/// Gateway-level metrics (SPEC_FULL.md "Gateway-level metrics"), mirroring
/// `toka-llm-gateway::GatewayMetrics`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RouterMetrics {
    /// Total generation requests accepted.
    pub total_requests: u64,
    /// Requests that completed successfully, possibly after falling back.
    pub successful_responses: u64,
    /// Requests that exhausted the fallback chain.
    pub failed_requests: u64,
    /// Number of times the chain advanced past the first-chosen provider.
    pub fallbacks_triggered: u64,
    /// Running mean response time, in milliseconds, over successes.
    pub avg_response_time_ms: f64,
}

/// Outcome of a successful generation (§4.5 "response carries metadata").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Generated text.
    pub content: String,
    /// Name of the provider that actually produced the response.
    pub provider_used: String,
    /// Model the response was generated with.
    pub model_used: String,
    /// Human-readable reason the provider was selected.
    pub selection_reason: String,
}

/// Rule-driven provider router with a process-wide health cache (§4.5, §5
/// "Global state").
pub struct LlmRouter {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    config: RouterConfig,
    health: RwLock<HashMap<String, HealthEntry>>,
    cooldowns: RwLock<HashMap<String, Instant>>,
    metrics: RwLock<RouterMetrics>,
}

impl LlmRouter {
    /// Construct a router over `providers`, keyed by provider name.
    pub fn new(config: RouterConfig, providers: Vec<Arc<dyn LlmProvider>>) -> Self {
        let providers = providers
            .into_iter()
            .map(|p| (p.provider_name().to_string(), p))
            .collect();
        Self {
            providers,
            config,
            health: RwLock::new(HashMap::new()),
            cooldowns: RwLock::new(HashMap::new()),
            metrics: RwLock::new(RouterMetrics::default()),
        }
    }

    /// Current gateway-level metrics.
    pub async fn metrics(&self) -> RouterMetrics {
        *self.metrics.read().await
    }

    async fn on_cooldown(&self, name: &str) -> bool {
        match self.cooldowns.read().await.get(name) {
            Some(expiry) => Instant::now() < *expiry,
            None => false,
        }
    }

    async fn set_cooldown(&self, name: &str) {
        let expiry = Instant::now() + self.config.rate_limit_cooldown;
        self.cooldowns.write().await.insert(name.to_string(), expiry);
    }

    /// Whether `name` is currently considered healthy, consulting and
    /// refreshing the shared cache (§4.5 "cache misses trigger a fresh
    /// IsAvailable() probe").
    pub async fn is_healthy(&self, name: &str) -> bool {
        if self.on_cooldown(name).await {
            return false;
        }
        let Some(provider) = self.providers.get(name) else {
            return false;
        };

        {
            let cache = self.health.read().await;
            if let Some(entry) = cache.get(name) {
                if entry.checked_at.elapsed() < self.config.health_cache_ttl {
                    return entry.healthy;
                }
            }
        }

        let healthy = provider.is_available().await;
        self.health.write().await.insert(
            name.to_string(),
            HealthEntry {
                healthy,
                checked_at: Instant::now(),
            },
        );
        healthy
    }

    fn break_tie<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        if candidates.is_empty() {
            return None;
        }
        if candidates.len() == 1 {
            return Some(candidates[0]);
        }
        let score = |name: &str| -> f64 {
            let Some(provider) = self.providers.get(name) else {
                return f64::MIN;
            };
            let caps = provider.capabilities();
            match self.config.cost_optimization {
                CostOptimization::Cost => {
                    if caps.cost_tier == crate::providers::CostTier::Free {
                        1.0
                    } else {
                        0.0
                    }
                }
                CostOptimization::Speed => -(caps.max_context_size as f64), // placeholder: no latency history tracked yet, favors smaller models
                CostOptimization::Quality => {
                    caps.max_context_size as f64 + if caps.function_calling { 100_000.0 } else { 0.0 }
                }
            }
        };
        candidates
            .iter()
            .copied()
            .max_by(|a, b| score(a).partial_cmp(&score(b)).unwrap_or(std::cmp::Ordering::Equal))
    }

    /// Select a provider and a human-readable reason for a task
    /// characterization (§4.5 Provider selection algorithm, steps 2-5).
    pub async fn select_provider(
        &self,
        characteristics: &TaskCharacteristics,
    ) -> Result<(String, String), RouterError> {
        let mut rules_by_priority: Vec<&RoutingRule> = self.config.rules.iter().collect();
        rules_by_priority.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut target: Option<(&str, &str)> = None;
        let mut idx = 0;
        while idx < rules_by_priority.len() {
            let top_priority = rules_by_priority[idx].priority;
            let tied: Vec<&RoutingRule> = rules_by_priority[idx..]
                .iter()
                .take_while(|r| r.priority == top_priority)
                .filter(|r| r.condition.matches(characteristics))
                .copied()
                .collect();
            if !tied.is_empty() {
                let names: Vec<&str> = tied.iter().map(|r| r.target_provider.as_str()).collect();
                if let Some(chosen) = self.break_tie(&names) {
                    let rule = tied.iter().find(|r| r.target_provider == chosen).unwrap();
                    target = Some((chosen, rule.reason.as_str()));
                }
                break;
            }
            idx += rules_by_priority[idx..]
                .iter()
                .take_while(|r| r.priority == top_priority)
                .count();
        }

        let (preferred, reason): (String, String) = match target {
            Some((name, reason)) => (name.to_string(), reason.to_string()),
            None => (self.config.default_provider.clone(), "default provider".to_string()),
        };

        if self.is_healthy(&preferred).await {
            return Ok((preferred, reason));
        }

        let mut chain: Vec<String> = vec![self.config.default_provider.clone()];
        chain.extend(self.config.fallback_providers.iter().cloned());
        chain.retain(|name| *name != preferred);

        for candidate in chain {
            if self.is_healthy(&candidate).await {
                warn!(from = %preferred, to = %candidate, "falling back to healthy provider");
                return Ok((candidate.clone(), format!("Fallback from {preferred} to {candidate}")));
            }
        }

        Err(RouterError::LlmUnavailable)
    }

    /// Generate a completion, estimating task characteristics from `prompt`
    /// when `options.task` is absent, selecting a provider, and retrying
    /// across the fallback chain on failure (§4.5 "Generation with fallback").
    pub async fn generate(
        &self,
        prompt: &str,
        options: GenerationOptions,
    ) -> Result<GenerationResponse, RouterError> {
        self.metrics.write().await.total_requests += 1;

        let characteristics = options
            .task
            .clone()
            .unwrap_or_else(|| characteristics::estimate(prompt, options.role.as_deref(), options.max_tokens));

        let (selected, reason) = match self.select_provider(&characteristics).await {
            Ok(pair) => pair,
            Err(e) => {
                self.metrics.write().await.failed_requests += 1;
                return Err(e);
            }
        };

        let mut chain = vec![selected.clone()];
        chain.push(self.config.default_provider.clone());
        chain.extend(self.config.fallback_providers.iter().cloned());
        chain.dedup();

        let mut current_reason = reason;
        for (step, name) in chain.iter().enumerate() {
            if step > 0 {
                if self.on_cooldown(name).await {
                    continue;
                }
                current_reason = format!("Fallback from {selected} to {name}");
                self.metrics.write().await.fallbacks_triggered += 1;
            }

            let Some(provider) = self.providers.get(name) else {
                continue;
            };

            let start = Instant::now();
            match provider.generate(prompt, &options).await {
                Ok(result) => {
                    let elapsed_ms = start.elapsed().as_millis() as f64;
                    let mut metrics = self.metrics.write().await;
                    metrics.successful_responses += 1;
                    let n = metrics.successful_responses as f64;
                    metrics.avg_response_time_ms =
                        (metrics.avg_response_time_ms * (n - 1.0) + elapsed_ms) / n;
                    drop(metrics);

                    info!(provider = %name, "generation succeeded");
                    return Ok(GenerationResponse {
                        content: result.content,
                        provider_used: name.clone(),
                        model_used: provider.model_name().to_string(),
                        selection_reason: current_reason,
                    });
                }
                Err(ProviderError::RateLimit) => {
                    debug!(provider = %name, "rate limited, entering cooldown");
                    self.set_cooldown(name).await;
                }
                Err(ProviderError::Authentication) => {
                    debug!(provider = %name, "authentication failed, advancing chain");
                }
                Err(other) => {
                    debug!(provider = %name, error = %other, "generation failed, advancing chain");
                }
            }
        }

        self.metrics.write().await.failed_requests += 1;
        Err(RouterError::AllProvidersFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{MockProvider, ProviderError};

    fn router_with(providers: Vec<Arc<dyn LlmProvider>>, config: RouterConfig) -> LlmRouter {
        LlmRouter::new(config, providers)
    }

    #[tokio::test]
    async fn scenario_router_fallback_on_unavailable() {
        let ollama = Arc::new(MockProvider::failing("ollama", "llama3", ProviderError::Unavailable));
        let perplexity = Arc::new(MockProvider::succeeding("perplexity", "sonar", "X"));
        let config = RouterConfig::new("ollama").with_fallbacks(vec!["perplexity".to_string()]);
        let router = router_with(vec![ollama, perplexity], config);

        let response = router.generate("prompt", GenerationOptions::default()).await.unwrap();
        assert_eq!(response.content, "X");
        assert_eq!(response.provider_used, "perplexity");
    }

    #[tokio::test]
    async fn no_healthy_candidate_reports_llm_unavailable() {
        let a = Arc::new(MockProvider::failing("a", "m", ProviderError::Unavailable));
        let b = Arc::new(MockProvider::failing("b", "m", ProviderError::Unavailable));
        let config = RouterConfig::new("a").with_fallbacks(vec!["b".to_string()]);
        let router = router_with(vec![a, b], config);

        let err = router.generate("prompt", GenerationOptions::default()).await.unwrap_err();
        assert_eq!(err, RouterError::LlmUnavailable);
    }

    #[tokio::test]
    async fn exhausted_fallback_chain_reports_all_providers_failed() {
        let a = Arc::new(MockProvider::failing("a", "m", ProviderError::Other("boom".to_string())));
        let b = Arc::new(MockProvider::failing("b", "m", ProviderError::Other("boom".to_string())));
        let config = RouterConfig::new("a").with_fallbacks(vec!["b".to_string()]);
        let router = router_with(vec![a, b], config);

        let err = router.generate("prompt", GenerationOptions::default()).await.unwrap_err();
        assert_eq!(err, RouterError::AllProvidersFailed);
    }

    #[tokio::test]
    async fn rate_limited_provider_enters_cooldown_and_is_unhealthy() {
        let a = Arc::new(MockProvider::failing("a", "m", ProviderError::RateLimit));
        let b = Arc::new(MockProvider::succeeding("b", "m", "ok"));
        let config = RouterConfig::new("a").with_fallbacks(vec!["b".to_string()]);
        let router = router_with(vec![a, b], config);

        router.generate("prompt", GenerationOptions::default()).await.unwrap();
        assert!(!router.is_healthy("a").await);
    }

    #[tokio::test]
    async fn matching_rule_routes_to_its_target() {
        let debugger = Arc::new(MockProvider::succeeding("claude", "opus", "fixed it"));
        let default = Arc::new(MockProvider::succeeding("gpt", "4o", "generic"));
        let rule = RoutingRule {
            name: "route-debugging".to_string(),
            condition: RoutingCondition {
                task_types: Some(vec![TaskType::Debugging]),
                ..Default::default()
            },
            target_provider: "claude".to_string(),
            priority: 10,
            reason: "debugging tasks prefer claude".to_string(),
        };
        let config = RouterConfig::new("gpt").with_rule(rule);
        let router = router_with(vec![debugger, default], config);

        let characteristics = characteristics::estimate("please debug this function", None, None);
        let (provider, reason) = router.select_provider(&characteristics).await.unwrap();
        assert_eq!(provider, "claude");
        assert_eq!(reason, "debugging tasks prefer claude");
    }

    #[tokio::test]
    async fn unhealthy_rule_target_falls_back_to_default() {
        let claude = Arc::new(MockProvider::failing("claude", "opus", ProviderError::Unavailable));
        let gpt = Arc::new(MockProvider::succeeding("gpt", "4o", "generic"));
        let rule = RoutingRule {
            name: "route-debugging".to_string(),
            condition: RoutingCondition {
                task_types: Some(vec![TaskType::Debugging]),
                ..Default::default()
            },
            target_provider: "claude".to_string(),
            priority: 10,
            reason: "debugging tasks prefer claude".to_string(),
        };
        let config = RouterConfig::new("gpt").with_rule(rule);
        let router = router_with(vec![claude, gpt], config);

        let characteristics = characteristics::estimate("please debug this function", None, None);
        let (provider, reason) = router.select_provider(&characteristics).await.unwrap();
        assert_eq!(provider, "gpt");
        assert!(reason.contains("Fallback from claude to gpt"));
    }

    #[tokio::test]
    async fn no_healthy_provider_is_llm_unavailable() {
        let a = Arc::new(MockProvider::failing("a", "m", ProviderError::Unavailable));
        let config = RouterConfig::new("a");
        let router = router_with(vec![a], config);

        let characteristics = characteristics::estimate("hello", None, None);
        assert_eq!(
            router.select_provider(&characteristics).await.unwrap_err(),
            RouterError::LlmUnavailable
        );
    }
}
