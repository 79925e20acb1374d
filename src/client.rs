//! # Client Module
//!
//! [`IgsClient`] ties configuration, credentials, the endpoint table and the
//! dispatcher together. It is cheap to clone; clones share everything.
//!
//! ```rust,ignore
//! use xsolla_igs::{ClientConfig, EndpointArgs, IgsClient};
//!
//! let client = IgsClient::new(ClientConfig::from_env().with_project_id(44056))?;
//! client.set_bearer_token("eyJhbGciOi...");
//!
//! // callback mode
//! client.call_with("get_virtual_items", EndpointArgs::new().query("limit", Some(10)), |result| {
//!     println!("{result:?}");
//! });
//!
//! // coroutine mode
//! let scoped = client.clone();
//! let items = client.run_scoped(
//!     move || scoped.call("get_virtual_items", EndpointArgs::new()),
//!     None,
//! )??;
//! ```

use crate::cancellation::CancellationToken;
use crate::config::{BasicAuth, CartAuth, ClientConfig, Credentials, MerchantAuth};
use crate::dispatcher::{Callback, Dispatcher, TaskRegistry};
use crate::endpoints::{EndpointArgs, EndpointCatalog, EndpointSpec};
use crate::error::{ApiError, ApiResult};
use crate::logging::redact;
use crate::transport::{HttpTransport, Transport};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Xsolla in-game store client.
#[derive(Clone)]
pub struct IgsClient {
    dispatcher: Dispatcher,
    catalog: Arc<EndpointCatalog>,
}

impl IgsClient {
    /// Client backed by the HTTP transport and the built-in endpoint table.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let transport = HttpTransport::new(config.transport_workers)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Client backed by any transport.
    #[must_use]
    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        info!(
            base_url = %config.base_url,
            project_id = ?config.project_id,
            timeout_ms = config.timeout.as_millis() as u64,
            "Creating store client"
        );
        Self {
            dispatcher: Dispatcher::new(config, transport),
            catalog: EndpointCatalog::builtin(),
        }
    }

    /// Replace the endpoint table, e.g. with one loaded from an OpenAPI document.
    #[must_use]
    pub fn with_catalog(mut self, catalog: impl Into<Arc<EndpointCatalog>>) -> Self {
        self.catalog = catalog.into();
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        self.dispatcher.config()
    }

    #[must_use]
    pub fn catalog(&self) -> &EndpointCatalog {
        &self.catalog
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn task_registry(&self) -> &Arc<TaskRegistry> {
        self.dispatcher.task_registry()
    }

    #[must_use]
    pub fn credentials(&self) -> Arc<Credentials> {
        self.dispatcher.credentials()
    }

    pub fn set_bearer_token(&self, token: impl Into<String>) {
        let token = token.into();
        debug!(token = %redact(&token), "Setting bearer token");
        self.dispatcher
            .update_credentials(|creds| creds.bearer_token = Some(token.clone()));
    }

    pub fn set_basic_auth(&self, username: impl Into<String>, password: impl Into<String>) {
        let auth = BasicAuth {
            username: username.into(),
            password: password.into(),
        };
        debug!(username = %auth.username, "Setting basic auth");
        self.dispatcher
            .update_credentials(|creds| creds.basic = Some(auth.clone()));
    }

    pub fn set_merchant_auth(&self, merchant_id: impl ToString, api_key: impl Into<String>) {
        let auth = MerchantAuth {
            merchant_id: merchant_id.to_string(),
            api_key: api_key.into(),
        };
        debug!(
            merchant_id = %auth.merchant_id,
            api_key = %redact(&auth.api_key),
            "Setting merchant auth"
        );
        self.dispatcher
            .update_credentials(|creds| creds.merchant = Some(auth.clone()));
    }

    /// Identity of a user who is not logged in, for cart endpoints.
    pub fn set_cart_auth(&self, unauthorized_id: impl Into<String>, user: Value) {
        let auth = CartAuth {
            unauthorized_id: unauthorized_id.into(),
            user,
        };
        debug!(unauthorized_id = %auth.unauthorized_id, "Setting cart auth");
        self.dispatcher
            .update_credentials(|creds| creds.cart = Some(auth.clone()));
    }

    pub fn set_credentials(&self, credentials: Credentials) {
        self.dispatcher.set_credentials(credentials);
    }

    pub fn clear_credentials(&self) {
        self.dispatcher.set_credentials(Credentials::default());
    }

    /// Generic call site: build the request for `spec` and dispatch it.
    ///
    /// With a callback this returns `None` at once; without one it must run in
    /// a coroutine and returns the result.
    ///
    /// # Panics
    ///
    /// On missing required arguments (see [`EndpointSpec::build_request`]) and
    /// on coroutine mode outside a coroutine.
    pub fn call_endpoint(
        &self,
        spec: &EndpointSpec,
        args: EndpointArgs,
        on_complete: Option<Callback>,
    ) -> Option<ApiResult> {
        let request = spec.build_request(args, self.config().project_id.as_deref());
        self.dispatcher.dispatch(request, on_complete)
    }

    /// Call an operation by id, suspending the current coroutine until it completes.
    pub fn call(&self, operation_id: &str, args: EndpointArgs) -> ApiResult {
        let Some(spec) = self.catalog.get(operation_id) else {
            warn!(operation_id = %operation_id, "Unknown endpoint");
            return Err(ApiError::UnknownEndpoint(operation_id.to_string()));
        };
        self.call_endpoint(spec, args, None).unwrap_or_else(|| {
            Err(ApiError::Transport("dispatch returned no result".to_string()))
        })
    }

    /// Call an operation by id, delivering the result to `callback`.
    ///
    /// An unknown operation id is reported through the callback, inline,
    /// before this returns.
    pub fn call_with<F>(&self, operation_id: &str, args: EndpointArgs, callback: F)
    where
        F: FnOnce(ApiResult) + Send + 'static,
    {
        match self.catalog.get(operation_id) {
            Some(spec) => {
                let _ = self.call_endpoint(spec, args, Some(Box::new(callback)));
            }
            None => {
                warn!(operation_id = %operation_id, "Unknown endpoint");
                callback(Err(ApiError::UnknownEndpoint(operation_id.to_string())));
            }
        }
    }

    /// See [`Dispatcher::run_scoped`].
    pub fn run_scoped<F, T>(&self, f: F, token: Option<CancellationToken>) -> Result<T, ApiError>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        self.dispatcher.run_scoped(f, token)
    }
}
