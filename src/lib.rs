//! # xsolla-igs
//!
//! **xsolla-igs** is a client for the Xsolla in-game store REST API, built on
//! the `may` coroutine runtime. Every store operation is a row in an endpoint
//! table; one generic call site turns a row plus arguments into a request, and
//! one dispatcher executes it.
//!
//! ## Overview
//!
//! Each call is delivered in one of two ways:
//!
//! - **callback**: the call returns at once and a callback receives the
//!   result later
//! - **coroutine**: the calling coroutine suspends and resumes with the result
//!
//! Either way a [`CancellationToken`] can suppress delivery of a result that
//! is no longer wanted, and a [`RetryPolicy`] tells the transport how often to
//! try.
//!
//! ## Architecture
//!
//! - **[`cancellation`]** - Shared set-once cancellation flag
//! - **[`dispatcher`]** - Dispatch core, task scoping and `run_scoped`
//! - **[`request`]** - Request descriptor and query parameters
//! - **[`retry`]** - Retry policies and the attempt schedule
//! - **[`transport`]** - Transport trait and the blocking HTTP implementation
//! - **[`endpoints`]** - Endpoint table, built-in or from an OpenAPI document
//! - **[`config`]** - Client configuration and credentials
//! - **[`client`]** - [`IgsClient`], the entry point
//! - **[`logging`]** - `tracing` subscriber setup
//! - **[`cli`]** - The `igs` command line
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant App
//!     participant Client as IgsClient
//!     participant Disp as Dispatcher
//!     participant Reg as TaskRegistry
//!     participant Pool as TransportPool
//!     participant Store as Store API
//!
//!     App->>Client: run_scoped(f, token)
//!     Client->>Reg: bind(task, token)
//!     App->>Client: call("get_virtual_items", args)
//!     Client->>Disp: dispatch(request, None)
//!     Disp->>Reg: current_token()
//!     Disp->>Pool: send(request, completion)
//!     Note over Disp: coroutine parked
//!     Pool->>Store: GET /v2/project/{id}/items/virtual_items
//!     Store-->>Pool: 200 JSON
//!     Pool-->>Disp: completion(Ok(value))
//!     Disp-->>App: Ok(value)
//!     Client->>Reg: clear(task)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use xsolla_igs::{CancellationToken, ClientConfig, EndpointArgs, IgsClient};
//!
//! let client = IgsClient::new(ClientConfig::from_env().with_project_id(44056))?;
//! client.set_bearer_token(std::env::var("IGS_BEARER_TOKEN")?);
//!
//! let token = CancellationToken::new();
//! let scoped = client.clone();
//! let items = client.run_scoped(
//!     move || {
//!         scoped.call(
//!             "get_virtual_items",
//!             EndpointArgs::new().query("limit", Some(10)).query("locale", None::<String>),
//!         )
//!     },
//!     Some(token.clone()),
//! )??;
//! ```
//!
//! ## Runtime Considerations
//!
//! - Coroutine mode requires running inside a `may` coroutine; use
//!   [`IgsClient::run_scoped`] from plain threads.
//! - HTTP requests block, so they run on a dedicated pool of OS threads, never
//!   on coroutine workers. Completions run on those threads.
//! - Scoped coroutines use `IGS_STACK_SIZE` (default 64 KiB).

pub mod cancellation;
pub mod cli;
pub mod client;
pub mod config;
pub mod dispatcher;
pub mod endpoints;
pub mod error;
mod ids;
pub mod logging;
pub mod request;
pub mod retry;
pub mod transport;

pub use cancellation::CancellationToken;
pub use client::IgsClient;
pub use config::{BasicAuth, CartAuth, ClientConfig, Credentials, MerchantAuth};
pub use dispatcher::{current_task, Callback, Dispatcher, TaskId, TaskRegistry};
pub use endpoints::{EndpointArgs, EndpointCatalog, EndpointSpec, QueryParam};
pub use error::{ApiError, ApiResult};
pub use ids::RequestId;
pub use request::{ApiRequest, QueryParams, RequestBody};
pub use retry::{ExponentialBackoff, RetryPolicy};
pub use transport::{Completion, Endpoint, HttpTransport, Transport, TransportRequest};
