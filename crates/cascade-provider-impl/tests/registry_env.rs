use std::collections::HashMap;
use std::time::Duration;

use cascade_provider_core::ProviderError;
use cascade_provider_impl::{
    FALLBACK_PROVIDERS_ENV, ProviderKind, RegistrySnapshot, build_provider_specs,
};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn default_chain_is_glm_modelscope_kimi() {
    let specs = build_provider_specs(env(&[
        ("GLM_API_KEY", "g"),
        ("MODELSCOPE_API_KEY", "m"),
        ("KIMI_API_KEY", "k"),
    ]));
    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["GLM", "ModelScope", "Kimi"]);
    assert_eq!(specs[0].kind, ProviderKind::Glm);
    assert_eq!(specs[0].model, "glm-4.5");
    assert_eq!(specs[2].timeout, Duration::from_secs(300));
    assert!(specs.iter().all(|s| s.max_retries == 3));
}

#[test]
fn providers_without_credentials_are_skipped() {
    let specs = build_provider_specs(env(&[
        ("GLM_API_KEY", "${GLM_API_KEY}"),
        ("KIMI_API_KEY", "k"),
    ]));
    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["Kimi"]);
}

#[test]
fn base_url_env_overrides_the_preset() {
    let specs = build_provider_specs(env(&[
        ("GLM_API_KEY", "g"),
        ("GLM_BASE_URL", "https://glm.internal/v4/"),
    ]));
    assert_eq!(
        specs[0].chat_completions_url(),
        "https://glm.internal/v4/chat/completions"
    );
}

#[test]
fn fallback_list_replaces_the_default_chain() {
    let fallback = r#"[
        {"provider": "kimi", "model": "kimi-latest", "timeout": 5000, "maxRetries": 50},
        {"name": "Local", "model": "qwen", "apiKey": "x", "baseUrl": "http://127.0.0.1:8000/v1"},
        {"name": "Broken", "model": "m", "apiKey": "x", "baseUrl": "::nope::"},
        {"provider": "unknown"},
        {"name": 42}
    ]"#;
    let specs = build_provider_specs(env(&[
        ("GLM_API_KEY", "g"),
        ("MODELSCOPE_API_KEY", "m"),
        ("KIMI_API_KEY", "k"),
        (FALLBACK_PROVIDERS_ENV, fallback),
    ]));
    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["GLM", "Kimi", "Local"]);
    assert_eq!(specs[1].model, "kimi-latest");
    assert_eq!(specs[1].timeout, Duration::from_millis(5000));
    assert_eq!(specs[1].max_retries, 10);
    assert_eq!(specs[2].kind, ProviderKind::Custom);
    assert_eq!(specs[2].timeout, Duration::from_secs(180));
}

#[test]
fn malformed_fallback_list_keeps_the_default_chain() {
    let specs = build_provider_specs(env(&[
        ("GLM_API_KEY", "g"),
        ("MODELSCOPE_API_KEY", "m"),
        (FALLBACK_PROVIDERS_ENV, "{not json"),
    ]));
    let names: Vec<_> = specs.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, ["GLM", "ModelScope"]);
}

#[test]
fn empty_snapshot_is_rejected() {
    let specs = build_provider_specs(env(&[]));
    assert!(specs.is_empty());
    assert_eq!(
        RegistrySnapshot::from_specs(specs).unwrap_err(),
        ProviderError::NoEnabledProviders
    );
}

#[test]
fn snapshot_keeps_order() {
    let snapshot = RegistrySnapshot::from_specs(build_provider_specs(env(&[
        ("GLM_API_KEY", "g"),
        ("KIMI_API_KEY", "k"),
    ])))
    .unwrap();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot.names(), ["GLM", "Kimi"]);
    assert_eq!(snapshot.providers()[1].kind, ProviderKind::Kimi);
}
