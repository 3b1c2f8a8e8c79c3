//! The model client every stage agent talks through.

use replyline_config::AppConfig;
use replyline_core::error::{Error, ProviderError, Result};
use replyline_core::provider::{Provider, ProviderRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::{RetryConfig, RetryProvider};

/// Generated text plus how long the call took.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    pub latency_ms: f64,
    pub model: String,
}

/// One request/response call to the hosted endpoint.
///
/// Cheap to clone; the provider behind it is shared.
#[derive(Clone)]
pub struct ModelClient {
    provider: Arc<dyn Provider>,
}

impl ModelClient {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self { provider }
    }

    /// Build the production client: OpenAI-compatible HTTP provider wrapped
    /// in the configured retry policy.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let api_key = config.check_credential()?;
        let timeout = Duration::from_secs(config.client.request_timeout_secs);

        let http = OpenAiCompatProvider::new("groq", &config.api_url, api_key, timeout)
            .map_err(Error::from)?;

        let retry = RetryConfig {
            max_retries: config.client.max_retries,
            base_delay: Duration::from_millis(config.client.retry_delay_ms),
            attempt_timeout: Some(timeout),
            ..RetryConfig::default()
        };

        Ok(Self::new(Arc::new(RetryProvider::new(http, retry))))
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send `request` and return the trimmed reply text.
    ///
    /// An empty reply is a model error: no stage can do anything with it.
    pub async fn complete(&self, request: ProviderRequest) -> Result<Completion> {
        let model = request.model.clone();
        let started = Instant::now();

        let response = self.provider.complete(request).await?;
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let text = response.message.content.trim().to_string();
        if text.is_empty() {
            return Err(Error::Model(ProviderError::EmptyResponse(format!(
                "{model} returned no content"
            ))));
        }

        debug!(
            provider = %self.provider.name(),
            model = %response.model,
            latency_ms,
            chars = text.len(),
            "Model call completed"
        );

        Ok(Completion {
            text,
            latency_ms,
            model: response.model,
        })
    }

    /// Can the endpoint be reached with the configured credential?
    pub async fn health_check(&self) -> Result<bool> {
        Ok(self.provider.health_check().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use replyline_core::message::Message;
    use replyline_core::provider::ProviderResponse;

    struct FixedProvider(std::result::Result<String, ProviderError>);

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn complete(
            &self,
            request: ProviderRequest,
        ) -> std::result::Result<ProviderResponse, ProviderError> {
            self.0.clone().map(|text| ProviderResponse {
                message: Message::assistant(text),
                usage: None,
                model: request.model,
            })
        }
    }

    fn client(reply: std::result::Result<&str, ProviderError>) -> ModelClient {
        ModelClient::new(Arc::new(FixedProvider(reply.map(String::from))))
    }

    #[tokio::test]
    async fn completion_is_trimmed_and_timed() {
        let completion = client(Ok("  SAFE \n"))
            .complete(ProviderRequest::chat("guard", "s", "u"))
            .await
            .unwrap();
        assert_eq!(completion.text, "SAFE");
        assert_eq!(completion.model, "guard");
        assert!(completion.latency_ms >= 0.0);
    }

    #[tokio::test]
    async fn blank_reply_is_model_error() {
        let err = client(Ok("   "))
            .complete(ProviderRequest::chat("m", "s", "u"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "model_error");
    }

    #[tokio::test]
    async fn timeouts_surface_as_transport_errors() {
        let err = client(Err(ProviderError::Timeout("30s".into())))
            .complete(ProviderRequest::chat("m", "s", "u"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "transport_error");
    }

    #[tokio::test]
    async fn api_errors_surface_as_model_errors() {
        let err = client(Err(ProviderError::ApiError {
            status_code: 400,
            message: "bad request".into(),
        }))
        .complete(ProviderRequest::chat("m", "s", "u"))
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "model_error");
    }

    #[test]
    fn from_config_requires_credential() {
        let err = ModelClient::from_config(&AppConfig::default()).err().unwrap();
        assert_eq!(err.kind(), "configuration_error");
    }

    #[test]
    fn from_config_builds_retrying_client() {
        let config = AppConfig {
            api_key: Some("gsk_test_key_0123456789".into()),
            ..AppConfig::default()
        };
        let client = ModelClient::from_config(&config).unwrap();
        assert_eq!(client.provider_name(), "groq");
    }
}
