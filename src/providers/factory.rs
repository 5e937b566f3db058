use crate::config::{Provider, ProviderConfig};
use crate::core::error::CinechatError;
use crate::providers::{
    LLMProvider, anthropic::AnthropicProvider, openai_compatible::OpenAICompatibleProvider,
};
use std::collections::HashMap;
use std::sync::Arc;

type ProviderCreator =
    Box<dyn Fn(&ProviderConfig) -> Result<Arc<dyn LLMProvider>, CinechatError> + Send + Sync>;

pub struct ProviderFactory {
    creators: HashMap<Provider, ProviderCreator>,
}

fn require_key(provider: Provider, config: &ProviderConfig) -> Result<String, CinechatError> {
    config.api_key.clone().ok_or_else(|| {
        CinechatError::Config(format!(
            "No API key for {}: set providers.{}.api_key or {}",
            provider.as_str(),
            provider.as_str(),
            provider.api_key_env()
        ))
    })
}

fn openai_style(provider: Provider) -> ProviderCreator {
    Box::new(move |config: &ProviderConfig| {
        let api_key = require_key(provider, config)?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| provider.default_base_url().to_string());

        let extra_headers = (provider == Provider::OpenRouter).then(|| {
            let mut headers = HashMap::new();
            headers.insert(
                "HTTP-Referer".to_string(),
                "https://github.com/cinechat/cinechat".to_string(),
            );
            headers.insert("X-Title".to_string(), "cinechat".to_string());
            headers
        });

        Ok(Arc::new(OpenAICompatibleProvider::new(
            provider.as_str(),
            base_url,
            api_key,
            extra_headers,
        )) as Arc<dyn LLMProvider>)
    })
}

impl ProviderFactory {
    pub fn new() -> Self {
        let mut creators = HashMap::new();

        creators.insert(Provider::OpenAI, openai_style(Provider::OpenAI));
        creators.insert(Provider::OpenRouter, openai_style(Provider::OpenRouter));
        creators.insert(Provider::Fireworks, openai_style(Provider::Fireworks));
        creators.insert(
            Provider::Anthropic,
            Box::new(|config: &ProviderConfig| {
                let api_key = require_key(Provider::Anthropic, config)?;
                let provider = match &config.base_url {
                    Some(base_url) => {
                        AnthropicProvider::with_endpoint(base_url.clone(), Some(api_key))
                    }
                    None => AnthropicProvider::new(Some(api_key)),
                };
                Ok(Arc::new(provider) as Arc<dyn LLMProvider>)
            }) as ProviderCreator,
        );

        Self { creators }
    }

    pub fn create(
        &self,
        provider: &Provider,
        config: &ProviderConfig,
    ) -> Result<Arc<dyn LLMProvider>, CinechatError> {
        self.creators
            .get(provider)
            .ok_or_else(|| CinechatError::Config(format!("Provider not found: {:?}", provider)))
            .and_then(|creator| creator(config))
    }
}

impl Default for ProviderFactory {
    fn default() -> Self {
        Self::new()
    }
}
