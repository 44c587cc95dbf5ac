use std::time::Duration;

use cascade_provider_core::ChatAdapter;

use super::ProviderPreset;
use crate::kind::ProviderKind;

pub const PRESET: ProviderPreset = ProviderPreset {
    key: "modelscope",
    kind: ProviderKind::ModelScope,
    name: "ModelScope",
    base_url: "https://api-inference.modelscope.cn/v1",
    model: "Qwen/Qwen3-Coder-480B-A35B-Instruct",
    timeout: Duration::from_secs(3 * 60),
    api_key_env: "MODELSCOPE_API_KEY",
    base_url_env: "MODELSCOPE_BASE_URL",
};

pub struct ModelScopeAdapter;

impl ChatAdapter for ModelScopeAdapter {}
