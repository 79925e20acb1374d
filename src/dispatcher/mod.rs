//! # Dispatcher Module
//!
//! The dispatcher turns an [`ApiRequest`](crate::ApiRequest) into exactly one
//! transport call and routes the outcome back to the caller.
//!
//! ## Delivery Modes
//!
//! - **with callback** ([`Dispatcher::call_with`]): returns immediately, the
//!   callback runs later on a transport thread. If the request's cancellation
//!   token is cancelled before the result arrives, the callback never runs.
//! - **with coroutine** ([`Dispatcher::call`]): the calling `may` coroutine
//!   parks until the result arrives and receives it as a return value.
//!   Cancellation is taken from the enclosing [`run_scoped`](Dispatcher::run_scoped)
//!   scope.
//!
//! ## Task Scoping
//!
//! [`run_scoped`](Dispatcher::run_scoped) binds a cancellation token to the
//! current coroutine in a [`TaskRegistry`], spawning a coroutine first when
//! called from a plain thread. A panic inside the scope is logged and returned
//! as [`ApiError::TaskPanicked`](crate::ApiError::TaskPanicked), never
//! propagated. Scopes nest: the innermost token wins, and leaving a nested
//! scope clears the association for the coroutine.
//!
//! ```rust,ignore
//! use xsolla_igs::{ApiRequest, CancellationToken, IgsClient};
//!
//! let client = IgsClient::new(config)?;
//! let token = CancellationToken::new();
//! let dispatcher = client.dispatcher().clone();
//!
//! let items = client.run_scoped(
//!     move || dispatcher.call(ApiRequest::get("/v2/project/44056/items/virtual_items")),
//!     Some(token),
//! )??;
//! ```
//!
//! ## Stack Size
//!
//! Scoped coroutines use [`ClientConfig::stack_size`](crate::ClientConfig::stack_size)
//! (`IGS_STACK_SIZE`, default 64 KiB). Dispatching is shallow; deep work
//! inside a scope may need more.

mod core;
mod scope;

pub use self::core::{Callback, Dispatcher};
pub use scope::{current_task, TaskId, TaskRegistry};
