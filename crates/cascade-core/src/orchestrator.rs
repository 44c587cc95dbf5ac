use std::sync::Arc;
use std::time::{Instant, SystemTime};

use tracing::{info, warn};

use cascade_protocol::openai::error::ErrorEnvelope;
use cascade_provider_core::{
    ChatRequest, Event, EventHub, FallbackEvent, TerminateEvent, TerminateOutcome,
};
use cascade_provider_impl::RegistrySnapshot;

use crate::error::ClientGone;
use crate::forwarder::{ForwardOutcome, StreamForwarder};
use crate::sink::ClientSink;
use crate::upstream_client::UpstreamClient;

pub const EXHAUSTED_ERROR_TYPE: &str = "provider_exhausted";

/// Per-request position in the provider chain.
#[derive(Debug, Clone)]
pub struct AttemptState {
    /// Only ever moves forward.
    pub provider_index: usize,
    pub fallback_count: u32,
    /// 1-based attempt number within the current provider.
    pub attempt: u32,
    pub started_at: Instant,
    pub attempt_id: String,
}

impl AttemptState {
    pub fn new() -> Self {
        Self {
            provider_index: 0,
            fallback_count: 0,
            attempt: 1,
            started_at: Instant::now(),
            attempt_id: String::new(),
        }
    }

    pub fn begin_attempt(&mut self, attempt: u32, provider: &str, trace_id: &str) {
        self.attempt = attempt;
        self.attempt_id = format!("{provider}-{trace_id}-{attempt}");
    }

    pub fn advance_provider(&mut self) {
        self.provider_index += 1;
        self.fallback_count += 1;
        self.attempt = 1;
    }

    pub fn is_exhausted(&self, providers: usize, fallback_budget: u32) -> bool {
        self.provider_index >= providers || self.fallback_count >= fallback_budget
    }

    /// Whether a transition away from the current provider would still leave
    /// someone to try.
    pub fn has_fallback(&self, providers: usize, fallback_budget: u32) -> bool {
        self.provider_index + 1 < providers && self.fallback_count + 1 < fallback_budget
    }
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::new()
    }
}

/// Walks the provider chain for one client request.
///
/// Each iteration hands the current provider to a [`StreamForwarder`]; a
/// fallback, a hard failure and a forwarder error all advance to the next
/// provider. The chain ends on the first success, when the list or the
/// fallback budget runs out, or when the client disconnects.
#[derive(Clone)]
pub struct FallbackOrchestrator {
    client: Arc<dyn UpstreamClient>,
    events: EventHub,
    fallback_budget: u32,
}

impl FallbackOrchestrator {
    pub fn new(client: Arc<dyn UpstreamClient>, events: EventHub, fallback_budget: u32) -> Self {
        Self {
            client,
            events,
            fallback_budget,
        }
    }

    pub async fn run(
        &self,
        request: ChatRequest,
        snapshot: Arc<RegistrySnapshot>,
        sink: ClientSink,
        trace_id: String,
    ) -> TerminateOutcome {
        let providers = snapshot.providers();
        let forwarder = StreamForwarder::new(self.client.as_ref(), &self.events, &sink, &trace_id);
        let mut state = AttemptState::new();
        let mut last_reason: Option<String> = None;

        // Every pass either returns or advances the provider index.
        for _ in 0..=providers.len() {
            if state.is_exhausted(providers.len(), self.fallback_budget) {
                break;
            }
            let Some(provider) = providers.get(state.provider_index) else {
                break;
            };
            let has_fallback = state.has_fallback(providers.len(), self.fallback_budget);

            let reason = match forwarder
                .forward(provider, &request, &mut state, has_fallback)
                .await
            {
                Ok(ForwardOutcome::Completed) => {
                    info!(
                        event = "request_completed",
                        trace_id = %trace_id,
                        provider = %provider.name,
                        fallback_count = state.fallback_count,
                        elapsed_ms = state.started_at.elapsed().as_millis() as u64
                    );
                    self.terminate(
                        &trace_id,
                        &state,
                        Some(&provider.name),
                        TerminateOutcome::Completed,
                        None,
                    )
                    .await;
                    return TerminateOutcome::Completed;
                }
                Ok(ForwardOutcome::Fallback { reason }) => reason,
                Ok(ForwardOutcome::Failed { reason }) => {
                    warn!(
                        event = "provider_failed",
                        trace_id = %trace_id,
                        provider = %provider.name,
                        error = %reason
                    );
                    reason
                }
                Err(ClientGone) => {
                    info!(
                        event = "client_disconnected",
                        trace_id = %trace_id,
                        provider = %provider.name,
                        elapsed_ms = state.started_at.elapsed().as_millis() as u64
                    );
                    self.terminate(
                        &trace_id,
                        &state,
                        Some(&provider.name),
                        TerminateOutcome::ClientGone,
                        None,
                    )
                    .await;
                    return TerminateOutcome::ClientGone;
                }
            };

            let leaving = state.provider_index;
            state.advance_provider();
            warn!(
                event = "provider_fallback",
                trace_id = %trace_id,
                provider = %provider.name,
                provider_index = leaving,
                fallback_count = state.fallback_count,
                reason = %reason
            );
            self.events
                .emit(Event::Fallback(FallbackEvent {
                    at: SystemTime::now(),
                    trace_id: trace_id.clone(),
                    provider: provider.name.clone(),
                    provider_index: leaving,
                    fallback_count: state.fallback_count,
                    reason: reason.clone(),
                }))
                .await;
            last_reason = Some(reason);
        }

        let message = match last_reason {
            Some(reason) => format!("all providers are unavailable: {reason}"),
            None => "all providers are unavailable".to_string(),
        };
        warn!(
            event = "providers_exhausted",
            trace_id = %trace_id,
            fallback_count = state.fallback_count,
            error = %message
        );
        let outcome = match sink
            .send_json(&ErrorEnvelope::new(message.clone(), EXHAUSTED_ERROR_TYPE))
            .await
        {
            Ok(()) => match sink.send_done().await {
                Ok(()) => TerminateOutcome::Exhausted,
                Err(ClientGone) => TerminateOutcome::ClientGone,
            },
            Err(ClientGone) => TerminateOutcome::ClientGone,
        };
        self.terminate(&trace_id, &state, None, outcome, Some(message)).await;
        outcome
    }

    async fn terminate(
        &self,
        trace_id: &str,
        state: &AttemptState,
        provider: Option<&str>,
        outcome: TerminateOutcome,
        message: Option<String>,
    ) {
        self.events
            .emit(Event::Terminate(TerminateEvent {
                at: SystemTime::now(),
                trace_id: trace_id.to_string(),
                provider: provider.map(str::to_string),
                outcome,
                elapsed_ms: state.started_at.elapsed().as_millis() as u64,
                message,
            }))
            .await;
    }
}
