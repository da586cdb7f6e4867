// Gateway module for backend requests - follows the Train Station Pattern
// All external access must go through this gateway

mod cache;
mod client;
mod config;
mod error;
mod outcome;
mod registry;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::ResponseCache;
pub use client::{new_request_id, ApiGateway, UnauthorizedCallback};
pub use config::{GatewayDefaults, RequestConfig};
pub use error::{ApiError, ErrorKind};
pub use outcome::{safe_request, ApiOutcome, SafeRequestOptions};
pub use registry::ActiveRequests;
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};

pub use reqwest::Method;
