//! # Request Module
//!
//! [`ApiRequest`] is the request descriptor every call site hands to the
//! dispatcher: a path with placeholders already substituted, query
//! parameters, verb, optional pre-serialized body, optional retry override and
//! optional cancellation token. It is built once, consumed once.

use crate::cancellation::CancellationToken;
use crate::error::ApiError;
use crate::retry::RetryPolicy;
use http::Method;
use serde::Serialize;
use smallvec::SmallVec;

/// Maximum inline query parameters before heap allocation
pub const MAX_INLINE_QUERY: usize = 8;

/// Query parameter list; a `None` value means "omit this parameter".
pub type QueryVec = SmallVec<[(String, Option<String>); MAX_INLINE_QUERY]>;

/// Ordered query parameter mapping.
///
/// Absent values are kept so call sites can pass through optional arguments
/// unconditionally, but they never reach the wire: [`present`](Self::present)
/// and [`to_query_string`](Self::to_query_string) skip them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    params: QueryVec,
}

impl QueryParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing an earlier value under the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl ToString) {
        self.push_opt(name, Some(value));
    }

    /// Set a parameter that may be absent.
    pub fn push_opt<V: ToString>(&mut self, name: impl Into<String>, value: Option<V>) {
        let name = name.into();
        let value = value.map(|v| v.to_string());
        if let Some(slot) = self.params.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.params.push((name, value));
        }
    }

    /// Builder form of [`push_opt`](Self::push_opt).
    #[must_use]
    pub fn with<V: ToString>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.push_opt(name, value);
        self
    }

    /// Value of a present parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .and_then(|(_, v)| v.as_deref())
    }

    /// Whether the mapping has an entry for `name`, present or not.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.params.iter().any(|(k, _)| k == name)
    }

    /// Parameters that carry a value, in insertion order.
    pub fn present(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (k.as_str(), v)))
    }

    /// All entries, including absent ones.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.params.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.params.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Present parameters as owned pairs, the shape the transport consumes.
    #[must_use]
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.present()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    /// `application/x-www-form-urlencoded` rendering of the present parameters.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.present())
            .finish()
    }
}

/// Pre-serialized request body.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestBody {
    bytes: Vec<u8>,
}

impl RequestBody {
    /// Serialize `value` as JSON.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ApiError> {
        serde_json::to_vec(value)
            .map(|bytes| Self { bytes })
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// Wrap bytes that are already JSON.
    #[must_use]
    pub fn raw(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Request descriptor consumed once by the dispatcher.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the base URL, placeholders already substituted
    pub path: String,
    pub query: QueryParams,
    pub body: Option<RequestBody>,
    /// Overrides the client's default policy when set
    pub retry: Option<RetryPolicy>,
    pub cancellation: Option<CancellationToken>,
}

impl ApiRequest {
    /// Create a descriptor for one of the verbs the store API uses.
    pub fn new(method: Method, path: impl Into<String>) -> Result<Self, ApiError> {
        if !is_supported_method(&method) {
            return Err(ApiError::UnsupportedMethod(method.to_string()));
        }
        Ok(Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
            retry: None,
            cancellation: None,
        })
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::with_method(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::with_method(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::with_method(Method::PUT, path)
    }

    #[must_use]
    pub fn patch(path: impl Into<String>) -> Self {
        Self::with_method(Method::PATCH, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::with_method(Method::DELETE, path)
    }

    fn with_method(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: QueryParams::new(),
            body: None,
            retry: None,
            cancellation: None,
        }
    }

    #[must_use]
    pub fn query<V: ToString>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.query.push_opt(name, value);
        self
    }

    #[must_use]
    pub fn query_params(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }
}

/// Verbs the store API is called with.
#[must_use]
pub fn is_supported_method(method: &Method) -> bool {
    [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
    ]
    .contains(method)
}
