//! HTTP handlers.

pub mod deliveries;
pub mod endpoints;
pub mod inbound;

/// Authenticated organization context, attached as a request extension by the
/// API gateway's auth middleware.
#[derive(Debug, Clone, Copy)]
pub struct OrgContext {
    pub organization_id: uuid::Uuid,
}
