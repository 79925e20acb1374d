//! Dispatcher core - the single funnel every endpoint call goes through.

use super::scope::{self, TaskRegistry};
use crate::cancellation::CancellationToken;
use crate::config::{ClientConfig, Credentials};
use crate::error::{ApiError, ApiResult};
use crate::ids::RequestId;
use crate::request::ApiRequest;
use crate::transport::{Endpoint, Transport, TransportRequest};
use arc_swap::ArcSwap;
use may::sync::mpsc;
use std::sync::Arc;
use tracing::debug;

/// Completion callback for callback-mode dispatch
pub type Callback = Box<dyn FnOnce(ApiResult) + Send + 'static>;

/// Executes request descriptors against a [`Transport`].
///
/// Two delivery modes, chosen by whether a callback is supplied:
///
/// - **with callback**: the transport call is issued and `dispatch` returns
///   `None` immediately. The callback later receives the result, unless the
///   request's token was cancelled by then, in which case the result is
///   dropped without a word.
/// - **with coroutine**: the calling coroutine parks until the transport
///   completes and `dispatch` returns `Some(result)`. The token comes from the
///   task scope set up by [`run_scoped`](Self::run_scoped). A token that is
///   already cancelled short-circuits without touching the transport; one
///   cancelled mid-flight resumes the caller with [`ApiError::Cancelled`].
///
/// Exactly one transport call is made per dispatch. Retries are the
/// transport's business: the effective [`RetryPolicy`](crate::RetryPolicy) is
/// forwarded untouched.
#[derive(Clone)]
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    registry: Arc<TaskRegistry>,
    config: Arc<ClientConfig>,
    credentials: Arc<ArcSwap<Credentials>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            registry: Arc::new(TaskRegistry::new()),
            config: Arc::new(config),
            credentials: Arc::new(ArcSwap::from_pointee(Credentials::default())),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn task_registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Snapshot of the credentials attached to new requests.
    #[must_use]
    pub fn credentials(&self) -> Arc<Credentials> {
        self.credentials.load_full()
    }

    /// Replace all credentials.
    pub fn set_credentials(&self, credentials: Credentials) {
        self.credentials.store(Arc::new(credentials));
    }

    /// Modify credentials in place. `f` may run more than once under contention.
    pub fn update_credentials<F>(&self, mut f: F)
    where
        F: FnMut(&mut Credentials),
    {
        self.credentials.rcu(|current| {
            let mut next = Credentials::clone(current);
            f(&mut next);
            next
        });
    }

    /// Execute `request`, delivering through `on_complete` if given, or by
    /// suspending the calling coroutine otherwise.
    ///
    /// # Panics
    ///
    /// Without a callback this must be called from inside a `may` coroutine
    /// (see [`run_scoped`](Self::run_scoped)); anything else is a programming
    /// error and panics.
    pub fn dispatch(&self, request: ApiRequest, on_complete: Option<Callback>) -> Option<ApiResult> {
        match on_complete {
            Some(callback) => {
                self.dispatch_with_callback(request, callback);
                None
            }
            None => Some(self.dispatch_in_task(request)),
        }
    }

    /// Callback-mode dispatch.
    pub fn call_with<F>(&self, request: ApiRequest, callback: F)
    where
        F: FnOnce(ApiResult) + Send + 'static,
    {
        self.dispatch_with_callback(request, Box::new(callback));
    }

    /// Coroutine-mode dispatch.
    ///
    /// # Panics
    ///
    /// When called outside a `may` coroutine.
    pub fn call(&self, request: ApiRequest) -> ApiResult {
        self.dispatch_in_task(request)
    }

    /// Run `f` inside a coroutine whose coroutine-mode dispatches are scoped by `token`.
    ///
    /// Never panics because of `f`: a panic becomes [`ApiError::TaskPanicked`].
    pub fn run_scoped<F, T>(&self, f: F, token: Option<CancellationToken>) -> Result<T, ApiError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        scope::run_scoped(&self.registry, self.config.stack_size, f, token)
    }

    fn dispatch_with_callback(&self, request: ApiRequest, callback: Callback) {
        let token = request.cancellation.clone();
        let transport_request = self.transport_request(request, token.clone());
        let request_id = transport_request.request_id;

        debug!(
            request_id = %request_id,
            method = %transport_request.method,
            path = %transport_request.path,
            mode = "with callback",
            "Dispatching request"
        );

        self.transport.send(
            transport_request,
            Box::new(move |result| {
                if token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                    debug!(request_id = %request_id, "Token cancelled, dropping result");
                    return;
                }
                callback(result);
            }),
        );
    }

    fn dispatch_in_task(&self, request: ApiRequest) -> ApiResult {
        assert!(
            may::coroutine::is_coroutine(),
            "dispatch without a callback must run inside a coroutine; wrap the call in run_scoped"
        );

        let token = self
            .registry
            .current_token()
            .or_else(|| request.cancellation.clone());

        if token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            debug!(
                path = %request.path,
                mode = "with coroutine",
                "Token already cancelled, request not sent"
            );
            return Err(ApiError::Cancelled);
        }

        let transport_request = self.transport_request(request, token.clone());
        let request_id = transport_request.request_id;

        debug!(
            request_id = %request_id,
            method = %transport_request.method,
            path = %transport_request.path,
            mode = "with coroutine",
            "Dispatching request"
        );

        let (reply_tx, reply_rx) = mpsc::channel();
        self.transport.send(
            transport_request,
            Box::new(move |result| {
                let result = if token.as_ref().is_some_and(CancellationToken::is_cancelled) {
                    debug!(request_id = %request_id, "Token cancelled in flight, discarding result");
                    Err(ApiError::Cancelled)
                } else {
                    result
                };
                let _ = reply_tx.send(result);
            }),
        );

        match reply_rx.recv() {
            Ok(result) => result,
            Err(_) => Err(ApiError::Transport(
                "transport dropped the completion".to_string(),
            )),
        }
    }

    fn transport_request(
        &self,
        request: ApiRequest,
        cancellation: Option<CancellationToken>,
    ) -> TransportRequest {
        TransportRequest {
            request_id: RequestId::new(),
            endpoint: Endpoint {
                base_url: self.config.base_url.clone(),
                credentials: self.credentials.load_full(),
                timeout: self.config.timeout,
            },
            method: request.method,
            query: request.query.to_pairs(),
            path: request.path,
            body: request.body,
            retry: request.retry.unwrap_or_else(|| self.config.retry.clone()),
            cancellation,
        }
    }
}
