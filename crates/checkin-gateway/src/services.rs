//! Wiring of the remote adapters shared by the server and the one-shot commands.

use std::sync::Arc;
use std::time::Duration;

use checkin_client::{
    BasicHeaderProvider, CachedTimezoneResolver, HeaderProvider, HeaderSet, OpenFlightsResolver,
    RetryPolicy, SouthwestClient, StaticHeaderProvider, TimezoneResolver,
};
use checkin_core::config::CheckinConfig;
use checkin_engine::Executor;
use checkin_scheduler::{TriggerKeyBuilder, TriggerScheduler, TriggerStore};
use tracing::info;

const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

pub struct Services {
    pub client: Arc<SouthwestClient>,
    pub basic_headers: Arc<dyn HeaderProvider>,
    pub commit_headers: Arc<dyn HeaderProvider>,
    pub timezones: Arc<dyn TimezoneResolver>,
}

impl Services {
    pub fn build(config: &CheckinConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()?;

        let basic_headers: Arc<dyn HeaderProvider> = Arc::new(BasicHeaderProvider::new(
            http.clone(),
            config.remote.config_js_url.clone(),
            config.remote.channel_id.clone(),
        ));

        // Operator-captured headers (e.g. from browser automation) win for the commit.
        let commit_headers: Arc<dyn HeaderProvider> = if config.remote.commit_headers.is_empty() {
            basic_headers.clone()
        } else {
            info!(
                count = config.remote.commit_headers.len(),
                "using configured commit headers"
            );
            Arc::new(StaticHeaderProvider::layered_over(
                HeaderSet::from(config.remote.commit_headers.clone()),
                basic_headers.clone(),
            ))
        };

        let client = Arc::new(SouthwestClient::new(
            http.clone(),
            config.remote.base_url.clone(),
            basic_headers.clone(),
        ));

        let timezones: Arc<dyn TimezoneResolver> = Arc::new(CachedTimezoneResolver::new(
            Arc::new(OpenFlightsResolver::new(
                http,
                config.timezones.openflights_url.clone(),
            )),
            config.timezones.overrides.clone(),
        ));

        Ok(Self {
            client,
            basic_headers,
            commit_headers,
            timezones,
        })
    }

    pub fn scheduler(
        &self,
        config: &CheckinConfig,
        store: Arc<dyn TriggerStore>,
    ) -> TriggerScheduler {
        TriggerScheduler::new(
            store,
            self.client.clone(),
            self.timezones.clone(),
            TriggerKeyBuilder::new(config.scheduler.namespace.clone()),
            Self::retry_policy(config),
        )
    }

    pub fn retry_policy(config: &CheckinConfig) -> RetryPolicy {
        RetryPolicy::new(
            config.lookup.retry_attempts,
            Duration::from_millis(config.lookup.retry_delay_ms),
        )
    }

    pub fn executor(&self, config: &CheckinConfig) -> anyhow::Result<Executor> {
        Ok(Executor::new(
            self.client.clone(),
            self.basic_headers.clone(),
            self.commit_headers.clone(),
            &config.race,
        )?)
    }
}
