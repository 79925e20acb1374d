//! Task scoping: which cancellation token belongs to which coroutine.
//!
//! Each coroutine that enters [`run_scoped`] gets a [`TaskId`] stored in
//! coroutine-local storage. The [`TaskRegistry`] maps that id to the token the
//! caller supplied, and a dispatch without a callback looks its token up there.
//! Completions arrive on transport threads, so the registry is a concurrent map.

use crate::cancellation::CancellationToken;
use crate::error::ApiError;
use dashmap::DashMap;
use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

may::coroutine_local!(static CURRENT_TASK: Cell<Option<TaskId>> = Cell::new(None));

/// Identity of a scoped coroutine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId(u64);

impl TaskId {
    fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Id of the running coroutine, if it has entered a scope.
#[must_use]
pub fn current_task() -> Option<TaskId> {
    if !may::coroutine::is_coroutine() {
        return None;
    }
    CURRENT_TASK.with(Cell::get)
}

/// Id of the running coroutine, assigning one on first use.
fn ensure_current_task() -> TaskId {
    CURRENT_TASK.with(|slot| match slot.get() {
        Some(id) => id,
        None => {
            let id = TaskId::next();
            slot.set(Some(id));
            id
        }
    })
}

/// Concurrent map from scoped task to its cancellation token.
///
/// At most one token per task; binding again replaces the previous one.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tokens: DashMap<TaskId, CancellationToken>,
}

impl TaskRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate `token` with `task`; `None` removes any association.
    pub fn bind(&self, task: TaskId, token: Option<CancellationToken>) {
        match token {
            Some(token) => {
                self.tokens.insert(task, token);
            }
            None => {
                self.tokens.remove(&task);
            }
        }
    }

    pub fn clear(&self, task: TaskId) {
        self.tokens.remove(&task);
    }

    #[must_use]
    pub fn token_for(&self, task: TaskId) -> Option<CancellationToken> {
        self.tokens.get(&task).map(|entry| entry.value().clone())
    }

    /// Token associated with the running coroutine.
    #[must_use]
    pub fn current_token(&self) -> Option<CancellationToken> {
        current_task().and_then(|task| self.token_for(task))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Run `f` in a coroutine scoped by `token`.
///
/// Inside a coroutine `f` runs in place; otherwise a coroutine is spawned and
/// joined before returning. A panic in `f` is logged and returned as
/// [`ApiError::TaskPanicked`]; the association is cleared either way.
pub(crate) fn run_scoped<F, T>(
    registry: &Arc<TaskRegistry>,
    stack_size: usize,
    f: F,
    token: Option<CancellationToken>,
) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    if may::coroutine::is_coroutine() {
        return scoped_in_current_task(registry, f, token);
    }

    let registry = Arc::clone(registry);
    // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may runtime.
    // The closure owns everything it touches (F and T are Send + 'static) and the
    // coroutine is joined below before this function returns.
    let spawn_result = unsafe {
        may::coroutine::Builder::new()
            .name("igs-scoped".to_string())
            .stack_size(stack_size)
            .spawn(move || scoped_in_current_task(&registry, f, token))
    };

    match spawn_result {
        Ok(handle) => match handle.join() {
            Ok(result) => result,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(panic_message = %message, "Scoped coroutine panicked");
                Err(ApiError::TaskPanicked(message))
            }
        },
        Err(e) => {
            error!(error = %e, stack_size = stack_size, "Failed to spawn scoped coroutine");
            Err(ApiError::TaskSpawn(e.to_string()))
        }
    }
}

fn scoped_in_current_task<F, T>(
    registry: &TaskRegistry,
    f: F,
    token: Option<CancellationToken>,
) -> Result<T, ApiError>
where
    F: FnOnce() -> T,
{
    let task = ensure_current_task();
    debug!(task = %task, has_token = token.is_some(), "Entering scope");
    registry.bind(task, token);

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));
    registry.clear(task);

    match outcome {
        Ok(value) => Ok(value),
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(task = %task, panic_message = %message, "Scoped task panicked");
            Err(ApiError::TaskPanicked(message))
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_latest_bind_wins() {
        let registry = TaskRegistry::new();
        let task = TaskId::next();
        let first = CancellationToken::new();
        let second = CancellationToken::new();

        registry.bind(task, Some(first));
        registry.bind(task, Some(second.clone()));
        assert_eq!(registry.len(), 1);
        assert!(registry
            .token_for(task)
            .is_some_and(|token| token.same_as(&second)));

        registry.bind(task, None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_no_current_task_outside_coroutines() {
        assert_eq!(current_task(), None);
        assert!(TaskRegistry::new().current_token().is_none());
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = TaskId::next();
        let b = TaskId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("task-"));
    }

    #[test]
    fn test_panic_message_payloads() {
        let boxed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(boxed.as_ref()), "static");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
        let boxed: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(boxed.as_ref()), "non-string panic payload");
    }
}
