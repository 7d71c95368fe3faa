//! Shared fakes for pipeline and webhook tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use foreman_agent::{Completion, IntentClassifier, LlmClient, LlmError};
use foreman_core::InboundMessage;
use foreman_erp::{
    AuditLogger, ContextCache, DirectoryFetcher, ErpClient, ErpRequest, ErpResponse, ErpTransport,
    RecordService, SystemClock, TransportError,
};
use foreman_telegram::{Notifier, NotifyError};
use serde_json::{json, Value};

use crate::pipeline::Orchestrator;

#[derive(Clone)]
pub enum Canned {
    Respond(u16, Value),
    Timeout,
    Network,
}

/// Routes ERP calls by path to canned responses, recording every call and
/// every POST body.
pub struct RouteTransport {
    responses: Mutex<HashMap<String, Canned>>,
    calls: Mutex<Vec<(String, Option<Value>)>>,
}

impl RouteTransport {
    pub fn with_defaults() -> Arc<Self> {
        let transport = Self {
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        };

        transport.set(
            "/api/resource/User",
            Canned::Respond(
                200,
                json!({
                    "data": [
                        {
                            "name": "colin@example.com",
                            "email": "colin@example.com",
                            "full_name": "Colin Verde",
                            "time_zone": "America/Los_Angeles",
                            "enabled": 1
                        },
                        {
                            "name": "taylor@example.com",
                            "email": "taylor@example.com",
                            "full_name": "Taylor Reyes",
                            "time_zone": "America/Chicago",
                            "enabled": 1
                        }
                    ]
                }),
            ),
        );
        transport.set(
            "/api/resource/Location",
            Canned::Respond(200, json!({ "data": [{ "location_name": "Big Sky" }] })),
        );
        transport.set(
            "/api/resource/Maintenance Visit",
            Canned::Respond(200, json!({ "data": { "name": "MV-0001" } })),
        );
        transport.set(
            "/api/resource/Task Parser Log",
            Canned::Respond(200, json!({ "data": { "name": "TPL-0001" } })),
        );

        Arc::new(transport)
    }

    pub fn set(&self, path: &str, canned: Canned) {
        self.responses.lock().unwrap().insert(path.to_string(), canned);
    }

    pub fn calls_to(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(called, _)| called == path).count()
    }

    pub fn bodies_for(&self, path: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(called, _)| called == path)
            .filter_map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl ErpTransport for RouteTransport {
    async fn execute(&self, request: &ErpRequest) -> Result<ErpResponse, TransportError> {
        self.calls.lock().unwrap().push((request.path.clone(), request.body.clone()));

        let canned = self
            .responses
            .lock()
            .unwrap()
            .get(&request.path)
            .cloned()
            .unwrap_or(Canned::Respond(404, json!({})));

        match canned {
            Canned::Respond(status, body) => {
                Ok(ErpResponse { status, body, retry_after: None })
            }
            Canned::Timeout => Err(TransportError::Timeout),
            Canned::Network => Err(TransportError::Network("connection refused".to_string())),
        }
    }
}

pub enum LlmScript {
    Ok(String),
    Timeout,
}

/// Plays back classifier responses; the last entry repeats.
pub struct ScriptedLlm {
    script: Vec<LlmScript>,
    calls: Mutex<u32>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<LlmScript>) -> Arc<Self> {
        Arc::new(Self { script, calls: Mutex::new(0) })
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, _request: &Completion) -> Result<String, LlmError> {
        let mut calls = self.calls.lock().unwrap();
        let index = (*calls as usize).min(self.script.len().saturating_sub(1));
        *calls += 1;
        match self.script.get(index).expect("empty llm script") {
            LlmScript::Ok(raw) => Ok(raw.clone()),
            LlmScript::Timeout => Err(LlmError::Timeout),
        }
    }
}

pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self { sent: Mutex::new(Vec::new()) })
    }

    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

pub fn message(text: &str) -> InboundMessage {
    InboundMessage {
        source_message_id: 42,
        chat_id: 7,
        sender_id: 3,
        username: Some("colin".to_string()),
        first_name: Some("Colin".to_string()),
        text: text.to_string(),
    }
}

pub fn valid_classifier_payload() -> String {
    json!({
        "description": "check pump at Big Sky",
        "assignee": "colin",
        "due_date": "2025-06-02",
        "priority": "High",
        "rationale": "direct task statement",
        "confidence": 0.92
    })
    .to_string()
}

pub fn orchestrator(
    transport: &Arc<RouteTransport>,
    llm: &Arc<ScriptedLlm>,
    notifier: &Arc<RecordingNotifier>,
) -> Orchestrator {
    let client = ErpClient::new(transport.clone());
    Orchestrator::new(
        ContextCache::new(Arc::new(SystemClock)),
        DirectoryFetcher::new(client.clone(), None),
        IntentClassifier::new(llm.clone()),
        RecordService::new(client.clone()),
        AuditLogger::new(client),
        notifier.clone(),
    )
}
