//! Common test utilities for attendly-webhooks integration tests.
//!
//! Builds the full delivery pipeline on the in-memory stores so tests run
//! without a database, plus wiremock helpers for inspecting what endpoints
//! actually receive.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;
use wiremock::{Request, Respond, ResponseTemplate};

use attendly_webhooks::config::WorkerConfig;
use attendly_webhooks::dispatcher::Dispatcher;
use attendly_webhooks::error::WebhookError;
use attendly_webhooks::idempotency::IdempotencyService;
use attendly_webhooks::inbound::{
    EventRef, InboundEventHandler, InboundProcessor, Provider, VerifierRegistry,
};
use attendly_webhooks::models::{CreateWebhookEndpointRequest, WebhookEndpointCreatedResponse};
use attendly_webhooks::queue::{InMemoryJobQueue, JobQueue};
use attendly_webhooks::services::EndpointService;
use attendly_webhooks::store::{InMemoryEndpointRegistry, InMemoryEventStore, InMemoryLedger};
use attendly_webhooks::worker::DeliveryWorker;

// ---------------------------------------------------------------------------
// Test fixtures
// ---------------------------------------------------------------------------

/// Standard test organization IDs
pub const ORG_A: Uuid = Uuid::from_bytes([
    0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x11,
]);

pub const ORG_B: Uuid = Uuid::from_bytes([
    0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22, 0x22,
]);

/// Encryption key used by every test harness.
pub const TEST_KEY: [u8; 32] = [0x42u8; 32];

// ---------------------------------------------------------------------------
// TestHarness - the full pipeline on in-memory stores
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub endpoints: Arc<InMemoryEndpointRegistry>,
    pub ledger: Arc<InMemoryLedger>,
    pub queue: Arc<InMemoryJobQueue>,
    pub events: Arc<InMemoryEventStore>,
    pub dispatcher: Arc<Dispatcher>,
    pub worker: Arc<DeliveryWorker>,
    pub service: Arc<EndpointService>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_worker_config(WorkerConfig::default())
    }

    pub fn with_worker_config(config: WorkerConfig) -> Self {
        let endpoints = Arc::new(InMemoryEndpointRegistry::new());
        let ledger = Arc::new(InMemoryLedger::new());
        let queue = Arc::new(InMemoryJobQueue::new());
        let events = Arc::new(InMemoryEventStore::new());

        let dispatcher = Arc::new(Dispatcher::new(endpoints.clone(), queue.clone()));

        let worker = Arc::new(
            DeliveryWorker::new(
                endpoints.clone(),
                ledger.clone(),
                queue.clone(),
                events.clone(),
                dispatcher.clone(),
                config,
                TEST_KEY,
            )
            .expect("worker build failed"),
        );

        let service = Arc::new(
            EndpointService::new(
                endpoints.clone(),
                ledger.clone(),
                dispatcher.clone(),
                TEST_KEY,
            )
            .with_allow_http(true),
        );

        Self {
            endpoints,
            ledger,
            queue,
            events,
            dispatcher,
            worker,
            service,
        }
    }

    /// Register an endpoint through the service, as the API would.
    pub async fn create_endpoint(
        &self,
        url: &str,
        event_types: &[&str],
    ) -> WebhookEndpointCreatedResponse {
        self.service
            .create_endpoint(
                ORG_A,
                CreateWebhookEndpointRequest {
                    url: url.to_string(),
                    description: None,
                    event_types: event_types.iter().map(ToString::to_string).collect(),
                    custom_headers: HashMap::new(),
                },
            )
            .await
            .expect("endpoint creation failed")
    }

    /// Claim and execute every currently-due job. Returns the number of jobs
    /// processed. Retries scheduled for the future are left in the queue.
    pub async fn run_due_jobs(&self) -> usize {
        let mut processed = 0;
        loop {
            let jobs = self.queue.claim_due(100).await.expect("claim failed");
            if jobs.is_empty() {
                return processed;
            }
            for job in jobs {
                self.worker
                    .process_job(job)
                    .await
                    .expect("job processing failed");
                processed += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureResponder - records what an endpoint receives
// ---------------------------------------------------------------------------

/// A captured HTTP request with body and headers.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub body: Vec<u8>,
    pub headers: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl CapturedRequest {
    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Get a header value by name (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        let name_lower = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| k.to_lowercase() == name_lower)
            .map(|(_, v)| v.as_str())
    }
}

/// A wiremock responder that captures incoming requests.
#[derive(Clone)]
pub struct CaptureResponder {
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    response_code: u16,
}

impl CaptureResponder {
    /// Responder that returns 200 OK.
    pub fn new() -> Self {
        Self::with_status(200)
    }

    /// Responder that returns a custom status code.
    pub fn with_status(status: u16) -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            response_code: status,
        }
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Respond for CaptureResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let headers = request
            .headers
            .iter()
            .map(|(k, v)| {
                (
                    k.as_str().to_string(),
                    v.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        self.requests.lock().unwrap().push(CapturedRequest {
            body: request.body.clone(),
            headers,
            timestamp: Utc::now(),
        });

        ResponseTemplate::new(self.response_code)
    }
}

// ---------------------------------------------------------------------------
// RecordingHandler - inbound handler that records invocations
// ---------------------------------------------------------------------------

/// Inbound event handler that records every invocation.
#[derive(Default)]
pub struct RecordingHandler {
    handled: Mutex<Vec<(String, String)>>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handled(&self) -> Vec<(String, String)> {
        self.handled.lock().unwrap().clone()
    }

    pub fn handled_count(&self) -> usize {
        self.handled.lock().unwrap().len()
    }
}

#[async_trait]
impl InboundEventHandler for RecordingHandler {
    async fn handle(
        &self,
        provider: Provider,
        event: &EventRef,
        _payload: &serde_json::Value,
    ) -> Result<(), WebhookError> {
        self.handled
            .lock()
            .unwrap()
            .push((provider.as_str().to_string(), event.event_id.clone()));
        Ok(())
    }
}

/// Build an inbound processor over in-memory state with one configured
/// provider secret.
pub fn inbound_processor(
    provider: Provider,
    secret: &str,
) -> (Arc<InboundProcessor>, Arc<RecordingHandler>) {
    let handler = Arc::new(RecordingHandler::new());
    let mut secrets = HashMap::new();
    secrets.insert(provider, secret.to_string());

    let processor = Arc::new(InboundProcessor::new(
        VerifierRegistry::with_defaults(),
        secrets,
        Arc::new(IdempotencyService::new(Arc::new(InMemoryEventStore::new()))),
        handler.clone(),
    ));

    (processor, handler)
}
