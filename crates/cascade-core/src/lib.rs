pub mod bootstrap;
pub mod core;
pub mod error;
pub mod forwarder;
pub mod handler;
pub mod orchestrator;
pub mod sink;
pub mod state;
pub mod upstream_client;
pub mod validate;

pub use bootstrap::{Bootstrap, CliArgs, bootstrap, bootstrap_from_env};
pub use core::Core;
pub use error::{ClientGone, ProxyError};
pub use forwarder::{ForwardOutcome, StreamForwarder, backoff_delay};
pub use orchestrator::{AttemptState, FallbackOrchestrator};
pub use sink::ClientSink;
pub use state::{AppState, EnvSource};
pub use upstream_client::{UpstreamClient, UpstreamClientConfig, WreqUpstreamClient};
pub use validate::{ValidationError, validate_chat_request};
