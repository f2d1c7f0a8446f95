//! Business logic services.

mod endpoint_service;

pub use endpoint_service::{EndpointService, DEFAULT_MAX_ENDPOINTS, TEST_EVENT_TYPE};
