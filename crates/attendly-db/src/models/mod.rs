//! Data models for the webhook subsystem.

pub mod processed_inbound_event;
pub mod webhook_delivery;
pub mod webhook_endpoint;
pub mod webhook_job;

pub use processed_inbound_event::ProcessedInboundEvent;
pub use webhook_delivery::{RecordDeliveryAttempt, WebhookDelivery, WebhookDeliveryStatus};
pub use webhook_endpoint::{
    NewWebhookEndpoint, UpdateWebhookEndpoint, WebhookEndpoint, WebhookEndpointStatus,
};
pub use webhook_job::{DeliveryJob, NewDeliveryJob};
