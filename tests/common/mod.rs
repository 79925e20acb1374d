#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

pub mod stub {
    use parking_lot::Mutex;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::time::Duration;
    use xsolla_igs::{ApiResult, Completion, RetryPolicy, Transport, TransportRequest};

    enum Mode {
        /// Completions are held until the test resolves them
        Manual,
        /// Completions run on a background thread, one scripted outcome per attempt
        Scripted,
    }

    /// In-memory transport recording every request it is handed.
    ///
    /// In scripted mode the stub honours the request's retry policy the way
    /// the HTTP transport does, pulling one outcome from the script per attempt
    /// (`Ok({"ok": true})` once the script runs dry).
    pub struct StubTransport {
        mode: Mode,
        sent: Mutex<Vec<TransportRequest>>,
        pending: Mutex<VecDeque<Completion>>,
        script: Arc<Mutex<VecDeque<ApiResult>>>,
        attempts: Arc<Mutex<Vec<RetryPolicy>>>,
    }

    impl StubTransport {
        fn with_mode(mode: Mode, script: Vec<ApiResult>) -> Arc<Self> {
            Arc::new(Self {
                mode,
                sent: Mutex::new(Vec::new()),
                pending: Mutex::new(VecDeque::new()),
                script: Arc::new(Mutex::new(script.into())),
                attempts: Arc::new(Mutex::new(Vec::new())),
            })
        }

        pub fn manual() -> Arc<Self> {
            Self::with_mode(Mode::Manual, Vec::new())
        }

        pub fn scripted(script: Vec<ApiResult>) -> Arc<Self> {
            Self::with_mode(Mode::Scripted, script)
        }

        /// Scripted stub answering every attempt with `Ok({"ok": true})`.
        pub fn ok() -> Arc<Self> {
            Self::scripted(Vec::new())
        }

        pub fn sent(&self) -> Vec<TransportRequest> {
            self.sent.lock().clone()
        }

        pub fn send_count(&self) -> usize {
            self.sent.lock().len()
        }

        pub fn pending_count(&self) -> usize {
            self.pending.lock().len()
        }

        /// Retry policy seen by each attempt, in order.
        pub fn attempts(&self) -> Vec<RetryPolicy> {
            self.attempts.lock().clone()
        }

        /// Resolve the oldest held completion. Returns false if none is pending.
        pub fn complete_next(&self, result: ApiResult) -> bool {
            let completion = self.pending.lock().pop_front();
            match completion {
                Some(completion) => {
                    completion(result);
                    true
                }
                None => false,
            }
        }

        pub fn wait_for_pending(&self, count: usize, timeout: Duration) -> bool {
            super::wait_until(timeout, || self.pending_count() >= count)
        }
    }

    impl Transport for StubTransport {
        fn send(&self, request: TransportRequest, on_complete: Completion) {
            let retry = request.retry.clone();
            self.sent.lock().push(request);
            match self.mode {
                Mode::Manual => self.pending.lock().push_back(on_complete),
                Mode::Scripted => {
                    let script = Arc::clone(&self.script);
                    let attempts = Arc::clone(&self.attempts);
                    std::thread::spawn(move || {
                        let result = retry.execute(|_| {
                            attempts.lock().push(retry.clone());
                            script
                                .lock()
                                .pop_front()
                                .unwrap_or_else(|| Ok(json!({"ok": true})))
                        });
                        on_complete(result);
                    });
                }
            }
        }
    }

    /// Transport that fails every call inline, before `send` returns.
    pub struct InlineFailingTransport;

    impl Transport for InlineFailingTransport {
        fn send(&self, _request: TransportRequest, on_complete: Completion) {
            on_complete(Err(xsolla_igs::ApiError::Transport(
                "transport pool unavailable".to_string(),
            )));
        }
    }

    /// Transport that loses every completion without calling it.
    pub struct DroppingTransport;

    impl Transport for DroppingTransport {
        fn send(&self, _request: TransportRequest, on_complete: Completion) {
            std::thread::spawn(move || drop(on_complete));
        }
    }
}

pub mod runtime {
    use std::sync::Once;

    static MAY_INIT: Once = Once::new();

    /// Configure the may scheduler once per test binary and route `tracing`
    /// output to the test harness (`RUST_LOG=xsolla_igs=debug` to see it).
    pub fn setup_may_runtime() {
        MAY_INIT.call_once(|| {
            may::config().set_workers(2).set_stack_size(0x8000);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .with_test_writer()
                .try_init();
        });
    }
}

pub mod temp_files {
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write `content` to a temporary file with the given extension.
    pub fn create_temp_spec(content: &str, ext: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new()
            .prefix("igs_test_")
            .suffix(&format!(".{ext}"))
            .tempfile()
            .expect("create temp file");
        file.write_all(content.as_bytes()).expect("write temp file");
        file.flush().expect("flush temp file");
        file
    }
}

/// Poll `cond` until it holds or `timeout` passes.
pub fn wait_until(timeout: std::time::Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + timeout;
    while std::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(2));
    }
    cond()
}
