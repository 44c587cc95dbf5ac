use std::sync::Arc;

use cascade_provider_core::{ProviderError, ProviderResult};

use crate::spec::ProviderSpec;

/// Immutable, ordered provider list. Index 0 is the primary provider.
///
/// A request captures one snapshot at admission; a reload installs a new
/// snapshot without touching requests already in flight.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    providers: Vec<Arc<ProviderSpec>>,
}

impl RegistrySnapshot {
    pub fn from_specs(specs: Vec<ProviderSpec>) -> ProviderResult<Self> {
        if specs.is_empty() {
            return Err(ProviderError::NoEnabledProviders);
        }
        Ok(Self {
            providers: specs.into_iter().map(Arc::new).collect(),
        })
    }

    /// Reads the process environment.
    pub fn from_env() -> ProviderResult<Self> {
        Self::from_specs(crate::config::build_provider_specs(crate::config::process_env))
    }

    pub fn providers(&self) -> &[Arc<ProviderSpec>] {
        &self.providers
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
