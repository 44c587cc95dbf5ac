use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use cascade_common::GlobalConfig;
use cascade_provider_core::{EventHub, TerminalEventSink};
use cascade_provider_impl::RegistrySnapshot;

use crate::state::AppState;
use crate::upstream_client::{UpstreamClientConfig, WreqUpstreamClient};

#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "cascade",
    version,
    about = "Streaming OpenAI-compatible gateway with ordered provider fallback"
)]
pub struct CliArgs {
    /// Bind host.
    #[arg(long, env = "CASCADE_HOST")]
    pub host: Option<String>,

    /// Bind port.
    #[arg(long, env = "PORT")]
    pub port: Option<String>,

    /// Maximum provider-to-provider transitions per request.
    #[arg(long, env = "CASCADE_MAX_FALLBACKS")]
    pub fallback_budget: Option<String>,

    /// Optional outbound proxy for upstream requests.
    #[arg(long, env = "CASCADE_PROXY")]
    pub proxy: Option<String>,

    /// Seconds an upstream stream may stay silent before the attempt fails.
    #[arg(long, env = "CASCADE_STREAM_IDLE_TIMEOUT_SECS")]
    pub stream_idle_timeout_secs: Option<String>,

    /// Print retry/fallback/chunk events to stderr.
    #[arg(long, env = "CASCADE_EVENT_LOG")]
    pub event_log: Option<String>,
}

pub struct Bootstrap {
    pub state: Arc<AppState>,
}

pub async fn bootstrap_from_env() -> anyhow::Result<Bootstrap> {
    let args = CliArgs::parse();
    bootstrap(args).await
}

pub async fn bootstrap(args: CliArgs) -> anyhow::Result<Bootstrap> {
    let global = global_config_from_args(&args)?;

    // Zero usable providers is a startup error.
    let snapshot = RegistrySnapshot::from_env().context("build provider registry")?;

    let client = WreqUpstreamClient::new(UpstreamClientConfig::from_global(&global))
        .context("build upstream client")?;

    let events = EventHub::default();
    if global.event_log {
        events.add_sink(Arc::new(TerminalEventSink::new())).await;
    }

    let state = AppState::new(global, snapshot, events, Arc::new(client));
    Ok(Bootstrap {
        state: Arc::new(state),
    })
}

/// Merges CLI/env values over the defaults. clap already applies CLI > ENV.
pub fn global_config_from_args(args: &CliArgs) -> anyhow::Result<GlobalConfig> {
    let defaults = GlobalConfig::default();
    let global = GlobalConfig {
        host: sanitize_optional_env_value(args.host.clone()).unwrap_or(defaults.host),
        port: parse_env_value::<u16>(args.port.clone(), "PORT")?.unwrap_or(defaults.port),
        fallback_budget: parse_env_value::<u32>(
            args.fallback_budget.clone(),
            "CASCADE_MAX_FALLBACKS",
        )?
        .unwrap_or(defaults.fallback_budget),
        proxy: sanitize_optional_env_value(args.proxy.clone()),
        stream_idle_timeout_secs: parse_env_value::<u64>(
            args.stream_idle_timeout_secs.clone(),
            "CASCADE_STREAM_IDLE_TIMEOUT_SECS",
        )?
        .unwrap_or(defaults.stream_idle_timeout_secs),
        event_log: parse_bool_env_value(args.event_log.clone(), "CASCADE_EVENT_LOG")?
            .unwrap_or(defaults.event_log),
    };
    global.validate().context("validate global config")?;
    Ok(global)
}

fn sanitize_optional_env_value(value: Option<String>) -> Option<String> {
    let trimmed = value?.trim().to_string();
    if trimmed.is_empty() {
        return None;
    }
    // Some PaaS systems may inject unresolved placeholders like `${VAR}`.
    if trimmed.starts_with("${") && trimmed.ends_with('}') {
        return None;
    }
    Some(trimmed)
}

fn parse_env_value<T>(value: Option<String>, env_name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = raw
        .parse::<T>()
        .with_context(|| format!("invalid {env_name} value: {raw}"))?;
    Ok(Some(parsed))
}

fn parse_bool_env_value(value: Option<String>, env_name: &str) -> anyhow::Result<Option<bool>> {
    let Some(raw) = sanitize_optional_env_value(value) else {
        return Ok(None);
    };
    let parsed = match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => return Err(anyhow::anyhow!("invalid {env_name} value: {raw}")),
    };
    Ok(Some(parsed))
}
