//! # Configuration Module
//!
//! Client configuration is an explicit value, not process-wide state: build a
//! [`ClientConfig`] once (defaults, environment or a YAML file) and hand it to
//! [`IgsClient::new`](crate::IgsClient::new). Several independently
//! configured clients can live in one process.
//!
//! ## Environment Variables
//!
//! | Variable                | Field               | Default                          |
//! |-------------------------|---------------------|----------------------------------|
//! | `IGS_BASE_URL`          | `base_url`          | `https://store.xsolla.com/api`   |
//! | `IGS_PROJECT_ID`        | `project_id`        | unset                            |
//! | `IGS_TIMEOUT_SECS`      | `timeout`           | `30`                             |
//! | `IGS_RETRY_COUNT`       | `retry` (fixed)     | no retries                       |
//! | `IGS_RETRY_DELAY_MS`    | `retry` (fixed)     | `500`                            |
//! | `IGS_TRANSPORT_WORKERS` | `transport_workers` | `4`                              |
//! | `IGS_STACK_SIZE`        | `stack_size`        | `0x10000` (decimal or `0x` hex)  |
//!
//! Credentials are read separately by [`Credentials::from_env`]:
//! `IGS_BEARER_TOKEN`, `IGS_USERNAME`/`IGS_PASSWORD`,
//! `IGS_MERCHANT_ID`/`IGS_API_KEY`.
//!
//! ## YAML
//!
//! ```yaml
//! base_url: https://store.xsolla.com/api
//! project_id: "44056"
//! timeout_secs: 10
//! retry:
//!   kind: fixed
//!   count: 3
//!   delay: 250
//! ```

use crate::error::ApiError;
use crate::retry::RetryPolicy;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use std::env;
use std::path::Path;
use std::time::Duration;

/// Production store endpoint
pub const DEFAULT_BASE_URL: &str = "https://store.xsolla.com/api";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RETRY_DELAY_MS: u64 = 500;
const DEFAULT_TRANSPORT_WORKERS: usize = 4;
const DEFAULT_STACK_SIZE: usize = 0x10000;

/// Client-wide settings shared by every call.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Store API root; endpoint paths are appended to it
    pub base_url: String,
    /// Used for the `{project_id}` placeholder when a call does not supply one
    pub project_id: Option<String>,
    /// Per-request timeout handed to the transport
    pub timeout: Duration,
    /// Default retry policy for calls that do not override it
    pub retry: RetryPolicy,
    /// OS threads executing HTTP requests
    pub transport_workers: usize,
    /// Stack size for coroutines spawned by `run_scoped`
    pub stack_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            project_id: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::None,
            transport_workers: DEFAULT_TRANSPORT_WORKERS,
            stack_size: DEFAULT_STACK_SIZE,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    base_url: Option<String>,
    project_id: Option<String>,
    timeout_secs: Option<u64>,
    retry: Option<RetryPolicy>,
    transport_workers: Option<usize>,
    stack_size: Option<Value>,
}

impl ClientConfig {
    /// Load configuration from `IGS_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let retry = match env::var("IGS_RETRY_COUNT")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            Some(count) if count > 1 => {
                let delay = env::var("IGS_RETRY_DELAY_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_RETRY_DELAY_MS);
                RetryPolicy::fixed(count, Duration::from_millis(delay))
            }
            _ => defaults.retry,
        };

        Self {
            base_url: env::var("IGS_BASE_URL").unwrap_or(defaults.base_url),
            project_id: env::var("IGS_PROJECT_ID").ok().filter(|s| !s.is_empty()),
            timeout: env::var("IGS_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry,
            transport_workers: env::var("IGS_TRANSPORT_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.transport_workers),
            stack_size: env::var("IGS_STACK_SIZE")
                .ok()
                .and_then(|s| parse_stack_size(&s))
                .unwrap_or(defaults.stack_size),
        }
    }

    /// Load configuration from a YAML file; fields not present keep their defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("{}: {e}", path.display())))?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(content: &str) -> Result<Self, ApiError> {
        let file: ConfigFile =
            serde_yaml::from_str(content).map_err(|e| ApiError::Config(e.to_string()))?;
        let defaults = Self::default();
        let stack_size = match file.stack_size {
            None => defaults.stack_size,
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| ApiError::Config(format!("invalid stack_size: {n}")))?,
            Some(Value::String(s)) => parse_stack_size(&s)
                .ok_or_else(|| ApiError::Config(format!("invalid stack_size: {s}")))?,
            Some(other) => return Err(ApiError::Config(format!("invalid stack_size: {other}"))),
        };
        Ok(Self {
            base_url: file.base_url.unwrap_or(defaults.base_url),
            project_id: file.project_id,
            timeout: file
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            retry: file.retry.unwrap_or(defaults.retry),
            transport_workers: file
                .transport_workers
                .filter(|n| *n > 0)
                .unwrap_or(defaults.transport_workers),
            stack_size,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_project_id(mut self, project_id: impl ToString) -> Self {
        self.project_id = Some(project_id.to_string());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Parse a stack size given in decimal or `0x`-prefixed hex.
fn parse_stack_size(s: &str) -> Option<usize> {
    if let Some(hex) = s.strip_prefix("0x") {
        usize::from_str_radix(hex, 16).ok()
    } else {
        s.parse().ok()
    }
}

/// Username/password pair sent as HTTP basic auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

/// Merchant id and API key, sent as HTTP basic auth for server-side calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerchantAuth {
    pub merchant_id: String,
    pub api_key: String,
}

/// Identity for carts of users who are not logged in.
#[derive(Debug, Clone, PartialEq)]
pub struct CartAuth {
    /// Value of the `x-unauthorized-id` header
    pub unauthorized_id: String,
    /// User description, sent base64-encoded in the `x-user` header
    pub user: Value,
}

/// Credentials attached to every request.
///
/// Setters overwrite a field and validate nothing; bad credentials only show
/// up as authentication failures from the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Credentials {
    pub bearer_token: Option<String>,
    pub basic: Option<BasicAuth>,
    pub merchant: Option<MerchantAuth>,
    pub cart: Option<CartAuth>,
}

impl Credentials {
    /// Read `IGS_BEARER_TOKEN`, `IGS_USERNAME`/`IGS_PASSWORD` and
    /// `IGS_MERCHANT_ID`/`IGS_API_KEY`.
    #[must_use]
    pub fn from_env() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|s| !s.is_empty());
        Self {
            bearer_token: var("IGS_BEARER_TOKEN"),
            basic: var("IGS_USERNAME").zip(var("IGS_PASSWORD")).map(
                |(username, password)| BasicAuth { username, password },
            ),
            merchant: var("IGS_MERCHANT_ID").zip(var("IGS_API_KEY")).map(
                |(merchant_id, api_key)| MerchantAuth {
                    merchant_id,
                    api_key,
                },
            ),
            cart: None,
        }
    }

    /// Headers for a request.
    ///
    /// `Authorization` comes from the bearer token if set, else merchant basic
    /// auth, else user basic auth. Cart identity headers are added on top.
    #[must_use]
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(token) = &self.bearer_token {
            headers.push(("authorization", format!("Bearer {token}")));
        } else if let Some(merchant) = &self.merchant {
            headers.push((
                "authorization",
                basic_header(&merchant.merchant_id, &merchant.api_key),
            ));
        } else if let Some(basic) = &self.basic {
            headers.push((
                "authorization",
                basic_header(&basic.username, &basic.password),
            ));
        }
        if let Some(cart) = &self.cart {
            headers.push(("x-unauthorized-id", cart.unauthorized_id.clone()));
            headers.push(("x-user", BASE64.encode(cart.user.to_string())));
        }
        headers
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bearer_token.is_none()
            && self.basic.is_none()
            && self.merchant.is_none()
            && self.cart.is_none()
    }
}

fn basic_header(user: &str, secret: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{user}:{secret}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert_eq!(config.retry, RetryPolicy::None);
        assert_eq!(config.stack_size, 0x10000);
    }

    #[test]
    fn test_parse_stack_size() {
        assert_eq!(parse_stack_size("0x4000"), Some(0x4000));
        assert_eq!(parse_stack_size("32768"), Some(32768));
        assert_eq!(parse_stack_size("big"), None);
    }

    #[test]
    fn test_yaml_overrides_and_defaults() {
        let config = ClientConfig::from_yaml_str(
            "project_id: \"44056\"\ntimeout_secs: 5\nstack_size: \"0x8000\"\nretry:\n  kind: fixed\n  count: 3\n  delay: 250\n",
        )
        .expect("valid yaml");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.project_id.as_deref(), Some("44056"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.stack_size, 0x8000);
        assert_eq!(config.retry, RetryPolicy::fixed(3, Duration::from_millis(250)));
    }

    #[test]
    fn test_yaml_rejects_bad_stack_size() {
        assert!(matches!(
            ClientConfig::from_yaml_str("stack_size: lots\n"),
            Err(ApiError::Config(_))
        ));
    }

    #[test]
    fn test_bearer_wins_over_basic() {
        let creds = Credentials {
            bearer_token: Some("jwt".into()),
            basic: Some(BasicAuth {
                username: "u".into(),
                password: "p".into(),
            }),
            ..Default::default()
        };
        assert_eq!(
            creds.headers(),
            vec![("authorization", "Bearer jwt".to_string())]
        );
    }

    #[test]
    fn test_merchant_basic_auth() {
        let creds = Credentials {
            merchant: Some(MerchantAuth {
                merchant_id: "123".into(),
                api_key: "key".into(),
            }),
            ..Default::default()
        };
        // base64("123:key")
        assert_eq!(
            creds.headers(),
            vec![("authorization", "Basic MTIzOmtleQ==".to_string())]
        );
    }

    #[test]
    fn test_cart_headers() {
        let creds = Credentials {
            cart: Some(CartAuth {
                unauthorized_id: "device-1".into(),
                user: json!({"id": 7}),
            }),
            ..Default::default()
        };
        let headers = creds.headers();
        assert_eq!(headers[0], ("x-unauthorized-id", "device-1".to_string()));
        assert_eq!(headers[1].0, "x-user");
        let decoded = BASE64.decode(&headers[1].1).expect("base64");
        assert_eq!(decoded, br#"{"id":7}"#);
        assert!(Credentials::default().headers().is_empty());
    }
}
