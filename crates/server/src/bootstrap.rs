use std::sync::Arc;

use foreman_agent::{IntentClassifier, LlmError, OpenAiClient};
use foreman_core::config::{AppConfig, ConfigError, LoadOptions};
use foreman_erp::{
    AuditLogger, ContextCache, DirectoryFetcher, ErpClient, HttpTransport, RecordService,
    SystemClock, TransportError,
};
use foreman_telegram::{NotifyError, TelegramNotifier};
use thiserror::Error;
use tracing::info;

use crate::pipeline::Orchestrator;
use crate::webhook::AppState;

pub struct Application {
    pub config: AppConfig,
    pub state: AppState,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("erp transport initialization failed: {0}")]
    ErpTransport(#[source] TransportError),
    #[error("classifier initialization failed: {0}")]
    Classifier(#[source] LlmError),
    #[error("notifier initialization failed: {0}")]
    Notifier(#[source] NotifyError),
}

#[allow(dead_code)]
pub fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config)
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "bootstrap_start");

    let transport = HttpTransport::new(&config.erp).map_err(BootstrapError::ErpTransport)?;
    let client = ErpClient::new(Arc::new(transport));

    let fetcher =
        DirectoryFetcher::new(client.clone(), config.erp.user_email_domain_filter.clone());
    let cache = ContextCache::new(Arc::new(SystemClock));

    let llm = OpenAiClient::new(&config.llm).map_err(BootstrapError::Classifier)?;
    let classifier = IntentClassifier::new(Arc::new(llm));

    let records = RecordService::new(client.clone());
    let audit = AuditLogger::new(client);

    let notifier = TelegramNotifier::new(config.telegram.bot_token.clone())
        .map_err(BootstrapError::Notifier)?;

    let orchestrator =
        Orchestrator::new(cache, fetcher, classifier, records, audit, Arc::new(notifier));
    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        webhook_secret: config.telegram.webhook_secret.clone(),
    };

    info!(event_name = "bootstrap_complete");
    Ok(Application { config, state })
}
