use std::time::Duration;

use cascade_provider_core::ChatAdapter;

use super::ProviderPreset;
use crate::kind::ProviderKind;

/// Kimi tokens arrive slowly, hence the longer timeout.
pub const PRESET: ProviderPreset = ProviderPreset {
    key: "kimi",
    kind: ProviderKind::Kimi,
    name: "Kimi",
    base_url: "https://api.moonshot.cn/v1",
    model: "kimi-k2-0711-preview",
    timeout: Duration::from_secs(5 * 60),
    api_key_env: "KIMI_API_KEY",
    base_url_env: "KIMI_BASE_URL",
};

/// OpenAI-compatible as-is.
pub struct KimiAdapter;

impl ChatAdapter for KimiAdapter {}
