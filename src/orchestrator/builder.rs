//! Builder pattern for Orchestrator construction

use std::sync::Arc;

use tokio::sync::watch;

use bench_sweep_core::{validate_scenarios, Error, MetricExtractor, Result, ScenarioSpec, SweepConfig};
use bench_sweep_notify::{MailTransport, NotificationDispatcher, NotifyConfig, SmtpMailer};

use crate::sysinfo::SystemInventory;

use super::executor::Orchestrator;

/// Builder for creating an Orchestrator with proper configuration
///
/// # Example
///
/// ```ignore
/// let orchestrator = OrchestratorBuilder::new()
///     .config(config)
///     .scenarios(scenarios)
///     .notify(notify)
///     .build()?;
///
/// let outcome = orchestrator.run_with_signal_handling().await?;
/// ```
pub struct OrchestratorBuilder {
    config: SweepConfig,
    scenarios: Vec<ScenarioSpec>,
    extractor: MetricExtractor,
    notify: NotifyConfig,
    transport: Option<Arc<dyn MailTransport>>,
    system: Option<SystemInventory>,
    api_key: Option<String>,
}

impl OrchestratorBuilder {
    /// Create a builder with the default config and the built-in sweep
    pub fn new() -> Self {
        Self {
            config: SweepConfig::default(),
            scenarios: ScenarioSpec::default_sweep(),
            extractor: MetricExtractor::default(),
            notify: NotifyConfig::default(),
            transport: None,
            system: None,
            api_key: None,
        }
    }

    /// Set the sweep configuration
    pub fn config(mut self, config: SweepConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the scenario list
    pub fn scenarios(mut self, scenarios: Vec<ScenarioSpec>) -> Self {
        self.scenarios = scenarios;
        self
    }

    /// Set the metric extractor
    pub fn extractor(mut self, extractor: MetricExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Set notification settings
    pub fn notify(mut self, notify: NotifyConfig) -> Self {
        self.notify = notify;
        self
    }

    /// Override the mail transport; SMTP is used otherwise
    pub fn transport(mut self, transport: Arc<dyn MailTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Host inventory to record in the run directory and report header
    pub fn system_inventory(mut self, system: Option<SystemInventory>) -> Self {
        self.system = system;
        self
    }

    /// API key passed to the benchmark tool
    pub fn api_key(mut self, key: Option<String>) -> Self {
        self.api_key = key;
        self
    }

    /// Build the orchestrator
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration or the scenario list is invalid.
    pub fn build(self) -> Result<Orchestrator> {
        self.config
            .validate()
            .map_err(|e| Error::config(e.to_string()))?;
        validate_scenarios(&self.scenarios).map_err(|e| Error::config(e.to_string()))?;

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(SmtpMailer::from_config(&self.notify)) as Arc<dyn MailTransport>
        });
        let dispatcher = NotificationDispatcher::new(self.notify, transport);
        let (shutdown_tx, _) = watch::channel(false);

        Ok(Orchestrator {
            config: self.config,
            scenarios: self.scenarios,
            extractor: self.extractor,
            dispatcher,
            system: self.system,
            api_key: self.api_key,
            shutdown_tx,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
