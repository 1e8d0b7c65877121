use {
    super::{
        cloudpayments::CloudPaymentsProvider, mock::MockProvider, yookassa::YooKassaProvider,
    },
    crate::{
        config::{Config, PROVIDER_HTTP_TIMEOUT},
        domain::{
            error::PipelineError,
            provider::{PaymentProvider, ProviderKind},
        },
    },
    std::{collections::HashMap, sync::Arc},
};

/// Configured payment backends, keyed by kind, plus the name of the one new
/// payments go to.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderKind, Arc<dyn PaymentProvider>>,
    default_name: String,
}

impl ProviderRegistry {
    pub fn new(default_name: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_name: default_name.into(),
        }
    }

    pub fn with_provider(mut self, provider: Arc<dyn PaymentProvider>) -> Self {
        self.providers.insert(provider.kind(), provider);
        self
    }

    /// The mock gateway is always registered; vendors only when their
    /// credentials are configured.
    pub fn from_config(config: &Config) -> Result<Self, PipelineError> {
        let mut registry = Self::new(config.payment_provider.clone()).with_provider(Arc::new(
            MockProvider::new(config.mock_webhook_secret.clone(), config.base_url.clone()),
        ));

        if let Some(yk) = &config.yookassa {
            registry = registry.with_provider(Arc::new(YooKassaProvider::new(
                yk.clone(),
                PROVIDER_HTTP_TIMEOUT,
            )?));
        }
        if let Some(cp) = &config.cloudpayments {
            registry = registry.with_provider(Arc::new(CloudPaymentsProvider::new(
                cp.clone(),
                PROVIDER_HTTP_TIMEOUT,
            )?));
        }

        Ok(registry)
    }

    pub fn get_kind(&self, kind: ProviderKind) -> Result<Arc<dyn PaymentProvider>, PipelineError> {
        self.providers
            .get(&kind)
            .cloned()
            .ok_or_else(|| PipelineError::UnsupportedProvider(kind.to_string()))
    }

    /// Unknown names and known-but-unconfigured vendors are both
    /// `UnsupportedProvider`.
    pub fn get(&self, name: &str) -> Result<Arc<dyn PaymentProvider>, PipelineError> {
        self.get_kind(name.parse()?)
    }

    pub fn default_provider(&self) -> Result<Arc<dyn PaymentProvider>, PipelineError> {
        self.get(&self.default_name)
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }
}
