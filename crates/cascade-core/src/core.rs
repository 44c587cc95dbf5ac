use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::handler::{
    chat_completions_handler, health_handler, providers_handler, reload_handler,
};
use crate::state::AppState;

/// Chat histories with inline images get large.
const MAX_REQUEST_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct Core {
    state: Arc<AppState>,
}

impl Core {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/chat/completions", post(chat_completions_handler))
            .route("/health", get(health_handler))
            .route("/providers", get(providers_handler))
            .route("/reload", post(reload_handler))
            .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .with_state(self.state.clone())
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }
}
