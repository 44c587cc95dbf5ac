pub mod config;
pub mod kind;
pub mod providers;
pub mod registry;
pub mod spec;

pub use config::{FALLBACK_PROVIDERS_ENV, build_provider_specs, process_env};
pub use kind::ProviderKind;
pub use providers::ProviderPreset;
pub use registry::RegistrySnapshot;
pub use spec::{DEFAULT_MAX_RETRIES, ProviderSpec};
