#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **swarm-llm** – C1/C2, Provider Adapter contract and LLM Router (§4.5).
//!
//! Generalizes `toka-llm-gateway`'s single-hardcoded-provider gateway into
//! a registry the router dispatches across by rule, health, and fallback
//! chain. The concrete HTTP backends are out of scope (§1); this crate
//! defines the contract every adapter must satisfy and ships
//! [`providers::MockProvider`] as the only implementation.

pub mod characteristics;
pub mod providers;
pub mod router;

pub use characteristics::{estimate, Complexity, TaskCharacteristics, TaskType};
pub use providers::{Capabilities, CostTier, GenerationOptions, GenerationResult, LlmProvider, MockProvider, ProviderError};
pub use router::{
    CostOptimization, GenerationResponse, LlmRouter, RouterConfig, RouterError, RouterMetrics,
    RoutingCondition, RoutingRule, DEFAULT_HEALTH_CACHE_TTL, DEFAULT_RATE_LIMIT_COOLDOWN,
    DEFAULT_TIMEOUT_MS,
};
