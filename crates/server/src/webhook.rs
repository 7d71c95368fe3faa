//! Webhook surface.
//!
//! The webhook always acknowledges with 200 once the secret check passes, even
//! when the pipeline fails; the user already got their reply, and a non-200
//! would only make the sender re-deliver the update.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use foreman_telegram::auth;
use foreman_telegram::Update;
use secrecy::SecretString;
use serde_json::{json, Value};
use tracing::warn;

use crate::pipeline::{Orchestrator, PipelineResult};

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub webhook_secret: Option<SecretString>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook))
        .route("/healthz", get(healthz))
        .with_state(state)
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> (StatusCode, Json<Value>) {
    let provided = headers.get(auth::SECRET_HEADER).and_then(|value| value.to_str().ok());
    if !auth::validate_secret(provided, state.webhook_secret.as_ref()) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "Invalid webhook secret" })));
    }

    let update = match serde_json::from_str::<Update>(&body) {
        Ok(update) => update,
        Err(error) => {
            warn!(event_name = "update_unparsable", error = %error);
            return (StatusCode::OK, Json(json!({ "message": "Update type not supported" })));
        }
    };

    let Some(inbound) = update.into_inbound() else {
        return (StatusCode::OK, Json(json!({ "message": "Update type not supported" })));
    };

    let outcome = state.orchestrator.handle(inbound).await;
    let message = match outcome.result {
        PipelineResult::Created(_) => "Task created",
        PipelineResult::Rejected => "Command received",
        PipelineResult::Failed(_) => "Processing failed, user notified",
    };

    (StatusCode::OK, Json(json!({ "message": message })))
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    use crate::test_support::{
        orchestrator, valid_classifier_payload, LlmScript, RecordingNotifier, RouteTransport,
        ScriptedLlm,
    };

    use super::*;

    fn app(webhook_secret: Option<&str>) -> (Router, Arc<RecordingNotifier>) {
        let transport = RouteTransport::with_defaults();
        let llm = ScriptedLlm::new(vec![LlmScript::Ok(valid_classifier_payload())]);
        let notifier = RecordingNotifier::new();
        let state = AppState {
            orchestrator: Arc::new(orchestrator(&transport, &llm, &notifier)),
            webhook_secret: webhook_secret.map(|secret| secret.to_string().into()),
        };
        (router(state), notifier)
    }

    fn update_body() -> String {
        serde_json::json!({
            "update_id": 9000,
            "message": {
                "message_id": 42,
                "chat": { "id": 7 },
                "from": { "id": 3, "username": "colin", "first_name": "Colin" },
                "text": "Colin check pump at Big Sky"
            }
        })
        .to_string()
    }

    fn post_webhook(body: String, secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri("/webhook");
        if let Some(secret) = secret {
            builder = builder.header(auth::SECRET_HEADER, secret);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn bad_secret_is_rejected_with_403() {
        let (app, notifier) = app(Some("hunter22"));

        let response =
            app.oneshot(post_webhook(update_body(), Some("wrong"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn valid_update_is_processed_and_acknowledged() {
        let (app, notifier) = app(Some("hunter22"));

        let response =
            app.oneshot(post_webhook(update_body(), Some("hunter22"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn non_text_update_is_acknowledged_without_processing() {
        let (app, notifier) = app(None);
        let body = serde_json::json!({
            "update_id": 9001,
            "message": { "message_id": 43, "chat": { "id": 7 }, "from": { "id": 3 } }
        })
        .to_string();

        let response = app.oneshot(post_webhook(body, None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn unparsable_body_is_acknowledged() {
        let (app, notifier) = app(None);

        let response =
            app.oneshot(post_webhook("not json".to_string(), None)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn healthz_responds_ok() {
        let (app, _) = app(None);
        let request = Request::builder().uri("/healthz").body(Body::empty()).unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
