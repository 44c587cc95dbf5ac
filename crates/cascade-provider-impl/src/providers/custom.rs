use std::time::Duration;

use cascade_provider_core::ChatAdapter;

/// Used when a `FALLBACK_PROVIDERS` entry omits `timeout`.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3 * 60);

/// Any OpenAI-compatible endpoint described entirely by configuration.
pub struct CustomAdapter;

impl ChatAdapter for CustomAdapter {}
