use super::{Completion, Transport, TransportPool, TransportRequest};
use crate::error::{ApiError, ApiResult};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

const USER_AGENT: &str = concat!("xsolla-igs/", env!("CARGO_PKG_VERSION"));

/// Transport that performs real HTTP calls with a blocking `reqwest` client on
/// a [`TransportPool`].
pub struct HttpTransport {
    client: Arc<reqwest::blocking::Client>,
    pool: TransportPool,
}

impl HttpTransport {
    /// Build the HTTP client and start `workers` transport threads.
    pub fn new(workers: usize) -> Result<Self, ApiError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;
        let pool = TransportPool::new("igs-transport", workers);
        info!(workers = pool.workers(), "HTTP transport ready");
        Ok(Self {
            client: Arc::new(client),
            pool,
        })
    }

    #[must_use]
    pub fn pool(&self) -> &TransportPool {
        &self.pool
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: TransportRequest, on_complete: Completion) {
        let client = Arc::clone(&self.client);
        let guard = CompletionGuard::new(on_complete);
        let request_id = request.request_id;

        let job = Box::new(move || {
            let result = execute(&client, &request);
            guard.complete(result);
        });

        if self.pool.submit(job).is_err() {
            // Dropping the job drops the guard, which reports the failure.
            error!(request_id = %request_id, "Transport pool unavailable");
        }
    }
}

/// Runs the completion exactly once: with the result, or with a transport
/// error if the job is dropped or unwinds before finishing.
struct CompletionGuard {
    completion: Option<Completion>,
}

impl CompletionGuard {
    fn new(completion: Completion) -> Self {
        Self {
            completion: Some(completion),
        }
    }

    fn complete(mut self, result: ApiResult) {
        if let Some(completion) = self.completion.take() {
            completion(result);
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if let Some(completion) = self.completion.take() {
            completion(Err(ApiError::Transport(
                "request dropped before completion".to_string(),
            )));
        }
    }
}

fn execute(client: &reqwest::blocking::Client, request: &TransportRequest) -> ApiResult {
    let url = build_url(&request.endpoint.base_url, &request.path, &request.query)?;
    let headers = request.endpoint.credentials.headers();
    let start = Instant::now();

    let result = request.retry.execute(|attempt| {
        debug!(
            request_id = %request.request_id,
            method = %request.method,
            url = %url,
            attempt = attempt,
            "Sending request"
        );

        let mut builder = client
            .request(request.method.clone(), url.clone())
            .timeout(request.endpoint.timeout)
            .header("accept", "application/json");
        for (name, value) in &headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder
                .header("content-type", "application/json")
                .body(body.as_bytes().to_vec());
        }

        let response = builder
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        decode_response(status, &bytes)
    });

    let elapsed_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => debug!(
            request_id = %request.request_id,
            latency_ms = elapsed_ms,
            "Request completed"
        ),
        Err(e) => warn!(
            request_id = %request.request_id,
            latency_ms = elapsed_ms,
            error = %e,
            "Request failed"
        ),
    }
    result
}

/// Join base URL and path and append the query parameters.
pub(crate) fn build_url(
    base_url: &str,
    path: &str,
    query: &[(String, String)],
) -> Result<url::Url, ApiError> {
    let joined = format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    let mut url = url::Url::parse(&joined).map_err(|e| ApiError::InvalidUrl(format!("{joined}: {e}")))?;
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// Turn a status and body into a result. Empty bodies decode to `null`.
pub(crate) fn decode_response(status: u16, bytes: &[u8]) -> ApiResult {
    let success = (200..300).contains(&status);
    let body = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => value,
            Err(e) if success => return Err(ApiError::Decode(e.to_string())),
            Err(_) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        }
    };
    if success {
        Ok(body)
    } else {
        Err(ApiError::Status { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_url_joins_and_encodes() {
        let url = build_url(
            "https://store.xsolla.com/api/",
            "/v2/project/44056/items/virtual_items",
            &[
                ("limit".to_string(), "10".to_string()),
                ("locale".to_string(), "en US".to_string()),
            ],
        )
        .expect("valid url");
        assert_eq!(
            url.as_str(),
            "https://store.xsolla.com/api/v2/project/44056/items/virtual_items?limit=10&locale=en+US"
        );
    }

    #[test]
    fn test_build_url_without_query_has_no_question_mark() {
        let url = build_url("http://127.0.0.1:9000", "v2/project/1/cart", &[]).expect("valid url");
        assert_eq!(url.as_str(), "http://127.0.0.1:9000/v2/project/1/cart");
    }

    #[test]
    fn test_build_url_rejects_garbage_base() {
        assert!(matches!(
            build_url("not a url", "/x", &[]),
            Err(ApiError::InvalidUrl(_))
        ));
    }

    #[test]
    fn test_decode_success_and_empty() {
        assert_eq!(decode_response(200, br#"{"a":1}"#), Ok(json!({"a": 1})));
        assert_eq!(decode_response(204, b""), Ok(Value::Null));
        assert!(matches!(
            decode_response(200, b"<html>"),
            Err(ApiError::Decode(_))
        ));
    }

    #[test]
    fn test_decode_error_status_keeps_body() {
        assert_eq!(
            decode_response(422, br#"{"errorCode":1102}"#),
            Err(ApiError::Status {
                status: 422,
                body: json!({"errorCode": 1102})
            })
        );
        assert_eq!(
            decode_response(502, b"Bad Gateway"),
            Err(ApiError::Status {
                status: 502,
                body: Value::String("Bad Gateway".into())
            })
        );
    }

    #[test]
    fn test_completion_guard_reports_drop() {
        let (tx, rx) = std::sync::mpsc::channel();
        let guard = CompletionGuard::new(Box::new(move |result| {
            let _ = tx.send(result);
        }));
        drop(guard);
        assert!(matches!(rx.recv(), Ok(Err(ApiError::Transport(_)))));
    }
}
