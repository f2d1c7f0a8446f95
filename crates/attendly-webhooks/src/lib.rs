//! Webhook infrastructure for Attendly.
//!
//! Two halves share this crate:
//!
//! - **Outbound**: customers register endpoints subscribed to domain events.
//!   Events fan out as durable queue jobs; a bounded worker pool delivers
//!   them with signed payloads, retries with backoff, a per-delivery ledger,
//!   and auto-disable of persistently failing endpoints.
//! - **Inbound**: upstream providers (Stripe, Recall, WorkOS, Zoom) post
//!   events to us. Per-provider adapters verify signatures behind one
//!   contract, and an idempotency claim guarantees each event is handled
//!   once.

pub mod config;
pub mod crypto;
pub mod dispatcher;
pub mod error;
pub mod handlers;
pub mod idempotency;
pub mod inbound;
pub mod models;
pub mod queue;
pub mod router;
pub mod services;
pub mod store;
pub mod validation;
pub mod worker;

pub use config::{WebhooksConfig, WorkerConfig};
pub use dispatcher::{Dispatcher, MAX_RETRY_ATTEMPTS, RETRY_DELAYS_MS};
pub use error::{ApiResult, WebhookError};
pub use handlers::OrgContext;
pub use idempotency::IdempotencyService;
pub use inbound::{InboundOutcome, InboundProcessor, Provider, VerifierRegistry};
pub use router::{webhooks_router, WebhooksState};
pub use services::EndpointService;
pub use worker::DeliveryWorker;
