use std::sync::Arc;

use arc_swap::ArcSwap;

use cascade_common::GlobalConfig;
use cascade_provider_core::{EventHub, ProviderResult};
use cascade_provider_impl::{RegistrySnapshot, build_provider_specs, process_env};

use crate::orchestrator::FallbackOrchestrator;
use crate::upstream_client::UpstreamClient;

/// Where `/reload` reads provider settings from.
pub type EnvSource = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

pub struct AppState {
    pub global: GlobalConfig,
    pub registry: ArcSwap<RegistrySnapshot>,
    pub events: EventHub,
    pub client: Arc<dyn UpstreamClient>,
    env: EnvSource,
}

impl AppState {
    pub fn new(
        global: GlobalConfig,
        snapshot: RegistrySnapshot,
        events: EventHub,
        client: Arc<dyn UpstreamClient>,
    ) -> Self {
        Self::with_env_source(global, snapshot, events, client, Arc::new(process_env))
    }

    pub fn with_env_source(
        global: GlobalConfig,
        snapshot: RegistrySnapshot,
        events: EventHub,
        client: Arc<dyn UpstreamClient>,
        env: EnvSource,
    ) -> Self {
        Self {
            global,
            registry: ArcSwap::from_pointee(snapshot),
            events,
            client,
            env,
        }
    }

    /// The snapshot a new request runs against for its whole lifetime.
    pub fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.registry.load_full()
    }

    /// Rebuilds the registry from the environment source. On error the
    /// current snapshot stays in place.
    pub fn reload(&self) -> ProviderResult<Arc<RegistrySnapshot>> {
        let env = self.env.clone();
        let snapshot = Arc::new(RegistrySnapshot::from_specs(build_provider_specs(
            move |key: &str| env(key),
        ))?);
        self.registry.store(snapshot.clone());
        Ok(snapshot)
    }

    pub fn orchestrator(&self) -> FallbackOrchestrator {
        FallbackOrchestrator::new(
            self.client.clone(),
            self.events.clone(),
            self.global.fallback_budget,
        )
    }
}
