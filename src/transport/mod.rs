//! # Transport Module
//!
//! The transport is the dispatcher's only way onto the network. It receives a
//! fully described [`TransportRequest`] and a completion, performs the call
//! (including any retries the request's [`RetryPolicy`] asks for), and invokes
//! the completion exactly once, asynchronously.
//!
//! ## Contract
//!
//! - `send` never blocks on I/O; the completion normally runs later on
//!   another thread, but may run inline when the call fails before it starts
//!   (e.g. the worker pool is gone)
//! - the completion runs exactly once, with `Ok(value)` or `Err(error)`
//! - the retry policy and cancellation token arrive exactly as the dispatcher
//!   forwarded them; the dispatcher never retries on its own
//! - cancellation does not abort the call; the dispatcher decides whether the
//!   outcome is delivered
//!
//! [`HttpTransport`] is the production implementation. Tests plug in their own
//! implementations of [`Transport`] to script outcomes.

mod http;
mod pool;

pub use self::http::HttpTransport;
pub use pool::{TransportPool, TransportPoolMetrics};

use crate::cancellation::CancellationToken;
use crate::config::Credentials;
use crate::error::ApiResult;
use crate::ids::RequestId;
use crate::request::RequestBody;
use crate::retry::RetryPolicy;
use ::http::Method;
use std::sync::Arc;
use std::time::Duration;

/// Completion invoked once with the outcome of a transport call.
pub type Completion = Box<dyn FnOnce(ApiResult) + Send + 'static>;

/// Base endpoint configuration shared by all calls of a client.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    /// Snapshot of the client's credentials at dispatch time
    pub credentials: Arc<Credentials>,
    /// Process-wide per-request timeout
    pub timeout: Duration,
}

/// Everything the transport needs to perform one call.
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub request_id: RequestId,
    pub endpoint: Endpoint,
    pub method: Method,
    pub path: String,
    /// Query parameters with absent values already removed
    pub query: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub retry: RetryPolicy,
    pub cancellation: Option<CancellationToken>,
}

/// Network collaborator of the dispatcher.
pub trait Transport: Send + Sync + 'static {
    /// Start the call and return; `on_complete` runs exactly once, inline only
    /// on immediate failure.
    fn send(&self, request: TransportRequest, on_complete: Completion);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: TransportRequest, on_complete: Completion) {
        (**self).send(request, on_complete);
    }
}
