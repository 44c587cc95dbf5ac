use std::time::Duration;

use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::warn;

use cascade_provider_core::{ProviderError, ProviderResult};

use crate::kind::ProviderKind;
use crate::providers::{ProviderPreset, custom, glm, kimi, modelscope, preset_by_key};
use crate::spec::{DEFAULT_MAX_RETRIES, MAX_RETRIES_CAP, ProviderSpec};

/// JSON array describing the ordered chain after the primary provider.
pub const FALLBACK_PROVIDERS_ENV: &str = "FALLBACK_PROVIDERS";

/// One `FALLBACK_PROVIDERS` entry: either a preset (`provider`) with optional
/// overrides, or a fully custom provider.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FallbackEntry {
    provider: Option<String>,
    name: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    /// Milliseconds.
    timeout: Option<u64>,
    max_retries: Option<u32>,
}

pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Builds the ordered, enabled provider list from environment values.
///
/// The primary provider is always the GLM preset. `FALLBACK_PROVIDERS`, when
/// set, lists the rest of the chain; otherwise ModelScope then Kimi follow.
/// Providers without a credential or with an unusable base URL are dropped.
pub fn build_provider_specs<F>(env: F) -> Vec<ProviderSpec>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |key: &str| sanitize_optional_env_value(env(key));

    let mut candidates = vec![preset_spec(&glm::PRESET, &FallbackEntry::default(), &read)];

    match read(FALLBACK_PROVIDERS_ENV).map(|raw| parse_fallback_entries(&raw)) {
        Some(Ok(entries)) => {
            for entry in entries {
                match entry_spec(&entry, &read) {
                    Ok(spec) => candidates.push(spec),
                    Err(err) => {
                        warn!(event = "provider_entry_dropped", error = %err, "skipping fallback entry");
                    }
                }
            }
        }
        Some(Err(err)) => {
            warn!(
                event = "provider_entry_dropped",
                error = %err,
                "{FALLBACK_PROVIDERS_ENV} is not a JSON array; using the default chain"
            );
            candidates.extend(default_chain(&read));
        }
        None => candidates.extend(default_chain(&read)),
    }

    candidates
        .into_iter()
        .filter(|spec| {
            if spec.api_key.is_empty() {
                warn!(event = "provider_disabled", provider = %spec.name, "no API key configured");
                return false;
            }
            if let Err(err) = validate_base_url(&spec.base_url) {
                warn!(event = "provider_disabled", provider = %spec.name, error = %err, "invalid base URL");
                return false;
            }
            true
        })
        .collect()
}

fn default_chain(read: &dyn Fn(&str) -> Option<String>) -> Vec<ProviderSpec> {
    [&modelscope::PRESET, &kimi::PRESET]
        .into_iter()
        .map(|preset| preset_spec(preset, &FallbackEntry::default(), read))
        .collect()
}

fn parse_fallback_entries(raw: &str) -> ProviderResult<Vec<FallbackEntry>> {
    let value: JsonValue = serde_json::from_str(raw)
        .map_err(|err| ProviderError::InvalidConfig(format!("{FALLBACK_PROVIDERS_ENV}: {err}")))?;
    let JsonValue::Array(items) = value else {
        return Err(ProviderError::InvalidConfig(format!(
            "{FALLBACK_PROVIDERS_ENV} must be a JSON array"
        )));
    };
    // Entries are decoded one by one so a single bad entry only drops itself.
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(position, item)| {
            match serde_json::from_value::<FallbackEntry>(item) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    warn!(event = "provider_entry_dropped", position, error = %err, "malformed fallback entry");
                    None
                }
            }
        })
        .collect())
}

fn entry_spec(
    entry: &FallbackEntry,
    read: &dyn Fn(&str) -> Option<String>,
) -> ProviderResult<ProviderSpec> {
    if let Some(key) = non_blank(entry.provider.as_deref()) {
        let preset = preset_by_key(key).ok_or_else(|| ProviderError::UnknownPreset(key.to_string()))?;
        return Ok(preset_spec(preset, entry, read));
    }
    custom_spec(entry)
}

fn preset_spec(
    preset: &ProviderPreset,
    overrides: &FallbackEntry,
    read: &dyn Fn(&str) -> Option<String>,
) -> ProviderSpec {
    ProviderSpec {
        name: non_blank(overrides.name.as_deref())
            .unwrap_or(preset.name)
            .to_string(),
        kind: preset.kind,
        api_key: non_blank(overrides.api_key.as_deref())
            .map(str::to_string)
            .or_else(|| read(preset.api_key_env))
            .unwrap_or_default(),
        base_url: non_blank(overrides.base_url.as_deref())
            .map(str::to_string)
            .or_else(|| read(preset.base_url_env))
            .unwrap_or_else(|| preset.base_url.to_string()),
        model: non_blank(overrides.model.as_deref())
            .unwrap_or(preset.model)
            .to_string(),
        timeout: overrides
            .timeout
            .map(Duration::from_millis)
            .unwrap_or(preset.timeout),
        max_retries: clamp_retries(overrides.max_retries),
    }
}

fn custom_spec(entry: &FallbackEntry) -> ProviderResult<ProviderSpec> {
    let name = non_blank(entry.name.as_deref()).ok_or(ProviderError::MissingField("name"))?;
    let model = non_blank(entry.model.as_deref()).ok_or(ProviderError::MissingField("model"))?;
    let api_key =
        non_blank(entry.api_key.as_deref()).ok_or(ProviderError::MissingField("apiKey"))?;
    let base_url =
        non_blank(entry.base_url.as_deref()).ok_or(ProviderError::MissingField("baseUrl"))?;
    Ok(ProviderSpec {
        name: name.to_string(),
        kind: ProviderKind::Custom,
        api_key: api_key.to_string(),
        base_url: base_url.to_string(),
        model: model.to_string(),
        timeout: entry
            .timeout
            .map(Duration::from_millis)
            .unwrap_or(custom::DEFAULT_TIMEOUT),
        max_retries: clamp_retries(entry.max_retries),
    })
}

fn clamp_retries(value: Option<u32>) -> u32 {
    value
        .unwrap_or(DEFAULT_MAX_RETRIES)
        .clamp(1, MAX_RETRIES_CAP)
}

fn validate_base_url(base_url: &str) -> ProviderResult<()> {
    let parsed = url::Url::parse(base_url)
        .map_err(|err| ProviderError::InvalidConfig(format!("{base_url}: {err}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ProviderError::InvalidConfig(format!(
            "{base_url}: unsupported scheme {other}"
        ))),
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    // Some PaaS systems inject unresolved placeholders like `${VAR}`.
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed)
}
