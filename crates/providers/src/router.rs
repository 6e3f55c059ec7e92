//! Model router: picks the endpoint for each request by model name.
//!
//! The agent and the summarizing memory may use different models, each with
//! its own base URL, key, context size and price. The router holds one
//! client per configured model and forwards each call to the right one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thinkloop_config::AppConfig;
use thinkloop_core::error::ProviderError;
use thinkloop_core::provider::{LlmClient, LlmRequest, LlmResponse};
use thinkloop_core::token::TokenCounter;
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;

/// Base URL used for models that do not configure one.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Routes LLM requests to the client registered for their model.
pub struct ModelRouter {
    clients: HashMap<String, Arc<dyn LlmClient>>,
    fallback: Arc<dyn LlmClient>,
}

impl ModelRouter {
    /// Create a router; models without a dedicated client go to `fallback`.
    pub fn new(fallback: Arc<dyn LlmClient>) -> Self {
        Self {
            clients: HashMap::new(),
            fallback,
        }
    }

    /// Register the client serving `model`.
    pub fn register(&mut self, model: impl Into<String>, client: Arc<dyn LlmClient>) {
        self.clients.insert(model.into(), client);
    }

    /// The client that serves `model`.
    pub fn resolve(&self, model: &str) -> &Arc<dyn LlmClient> {
        self.clients.get(model).unwrap_or(&self.fallback)
    }

    /// List the models with a dedicated client.
    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.clients.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }
}

#[async_trait]
impl LlmClient for ModelRouter {
    fn name(&self) -> &str {
        "router"
    }

    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse, ProviderError> {
        let client = self.resolve(&request.model);
        debug!(model = %request.model, client = %client.name(), "Routing request");
        client.complete(request).await
    }

    fn max_context(&self, model: &str) -> Option<usize> {
        self.resolve(model).max_context(model)
    }

    fn token_counter(&self, model: &str) -> Arc<dyn TokenCounter> {
        self.resolve(model).token_counter(model)
    }
}

/// Build the model clients from configuration.
///
/// Every entry of `models` gets its own client; the default and summary
/// models are always routable, falling back to the OpenAI endpoint and the
/// top-level API key when not configured.
pub fn build_from_config(config: &AppConfig) -> Result<ModelRouter, ProviderError> {
    let fallback = build_model(config, &config.default_model)?;
    let mut router = ModelRouter::new(fallback.clone());
    router.register(config.default_model.clone(), fallback);

    for name in config.models.keys().map(String::as_str).chain([config.summary_model()]) {
        if router.clients.contains_key(name) {
            continue;
        }
        router.register(name, build_model(config, name)?);
    }

    debug!(models = ?router.models(), "Model router built");
    Ok(router)
}

fn build_model(config: &AppConfig, name: &str) -> Result<Arc<dyn LlmClient>, ProviderError> {
    let model = config.model(name);
    let api_key = model
        .api_key
        .clone()
        .or_else(|| config.api_key.clone())
        .unwrap_or_default();
    let base_url = model.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

    let mut provider = OpenAiCompatProvider::new(name, base_url, api_key)?;
    if let Some(tokens) = model.max_context {
        provider = provider.with_max_context(name, tokens);
    }
    if let Some(cost) = model.cost {
        provider = provider.with_pricing(name, cost);
    }
    Ok(Arc::new(provider))
}
