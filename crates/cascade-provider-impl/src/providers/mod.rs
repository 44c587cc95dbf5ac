use std::time::Duration;

use crate::kind::ProviderKind;

pub mod custom;
pub mod glm;
pub mod kimi;
pub mod modelscope;

/// Built-in defaults for a known provider family.
#[derive(Debug, Clone, Copy)]
pub struct ProviderPreset {
    /// Lowercase key used in `FALLBACK_PROVIDERS` entries.
    pub key: &'static str,
    pub kind: ProviderKind,
    pub name: &'static str,
    pub base_url: &'static str,
    pub model: &'static str,
    pub timeout: Duration,
    pub api_key_env: &'static str,
    pub base_url_env: &'static str,
}

pub const PRESETS: [ProviderPreset; 3] = [glm::PRESET, modelscope::PRESET, kimi::PRESET];

pub fn preset_by_key(key: &str) -> Option<&'static ProviderPreset> {
    PRESETS
        .iter()
        .find(|preset| preset.key.eq_ignore_ascii_case(key.trim()))
}
