//! # Endpoints Module
//!
//! Store endpoints are data, not code. Each [`EndpointSpec`] describes one
//! operation (verb, path template, declared query parameters, whether it takes
//! a body) and one generic call site turns it plus [`EndpointArgs`] into an
//! [`ApiRequest`] for the dispatcher.
//!
//! The table comes from [`EndpointCatalog::builtin`] or from an OpenAPI
//! document ([`EndpointCatalog::from_openapi_file`]).
//!
//! ## Contract
//!
//! A missing path argument or a missing body for an operation that takes one
//! is a programming error and panics in [`EndpointSpec::build_request`]. The
//! `project_id` placeholder falls back to the client's configured project.

mod catalog;
mod openapi;

pub use catalog::EndpointCatalog;

use crate::cancellation::CancellationToken;
use crate::error::ApiError;
use crate::request::{ApiRequest, QueryParams, RequestBody};
use crate::retry::RetryPolicy;
use http::Method;
use serde::Serialize;
use tracing::warn;

/// Placeholder filled from configuration when a call leaves it out
pub const PROJECT_ID_PARAM: &str = "project_id";

/// A query parameter an endpoint accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    /// Argument name used by callers (`additional_fields`)
    pub name: String,
    /// Name sent on the wire (`additional_fields[]`)
    pub wire_name: String,
}

impl QueryParam {
    /// Declare a parameter from its wire name; the argument name drops `[]`
    /// and maps `-` to `_`.
    #[must_use]
    pub fn new(wire_name: &str) -> Self {
        Self {
            name: normalize_name(wire_name),
            wire_name: wire_name.to_string(),
        }
    }
}

/// Description of a single store operation.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointSpec {
    pub operation_id: String,
    pub method: Method,
    /// Path relative to the base URL, with `{name}` placeholders
    pub path_template: String,
    pub query_params: Vec<QueryParam>,
    /// The operation requires a JSON body
    pub has_body: bool,
}

impl EndpointSpec {
    #[must_use]
    pub fn new(operation_id: &str, method: Method, path_template: &str) -> Self {
        Self {
            operation_id: operation_id.to_string(),
            method,
            path_template: path_template.to_string(),
            query_params: Vec::new(),
            has_body: false,
        }
    }

    /// Declare query parameters by wire name.
    #[must_use]
    pub fn with_query(mut self, wire_names: &[&str]) -> Self {
        self.query_params
            .extend(wire_names.iter().map(|name| QueryParam::new(name)));
        self
    }

    #[must_use]
    pub fn with_body(mut self) -> Self {
        self.has_body = true;
        self
    }

    /// Placeholder names in the path template, in order.
    #[must_use]
    pub fn path_params(&self) -> Vec<&str> {
        let mut params = Vec::new();
        let mut rest = self.path_template.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    params.push(&after[..close]);
                    rest = &after[close + 1..];
                }
                None => break,
            }
        }
        params
    }

    /// Turn call arguments into a request descriptor.
    ///
    /// # Panics
    ///
    /// If a path placeholder has no value (and, for `project_id`, no
    /// `default_project_id`), or if the operation takes a body and none was
    /// given.
    #[must_use]
    pub fn build_request(&self, args: EndpointArgs, default_project_id: Option<&str>) -> ApiRequest {
        let mut path = String::with_capacity(self.path_template.len() + 32);
        let mut rest = self.path_template.as_str();
        for name in self.path_params() {
            let placeholder = format!("{{{name}}}");
            let Some(at) = rest.find(&placeholder) else {
                break;
            };
            let value = args
                .path_value(name)
                .or_else(|| (name == PROJECT_ID_PARAM).then_some(default_project_id).flatten())
                .unwrap_or_else(|| {
                    panic!(
                        "{}: missing required path argument `{name}`",
                        self.operation_id
                    )
                });
            path.push_str(&rest[..at]);
            path.push_str(&urlencoding::encode(value));
            rest = &rest[at + placeholder.len()..];
        }
        path.push_str(rest);

        let mut query = QueryParams::new();
        for (name, value) in args.query.iter() {
            match self.query_params.iter().find(|p| p.name == name || p.wire_name == name) {
                Some(param) => query.push_opt(param.wire_name.as_str(), value),
                None => warn!(
                    operation_id = %self.operation_id,
                    param = %name,
                    "Dropping undeclared query parameter"
                ),
            }
        }

        let body = match (self.has_body, args.body) {
            (true, Some(body)) => Some(body),
            (true, None) => panic!("{}: missing required request body", self.operation_id),
            (false, Some(_)) => {
                warn!(operation_id = %self.operation_id, "Dropping body for operation without one");
                None
            }
            (false, None) => None,
        };

        ApiRequest {
            method: self.method.clone(),
            path,
            query,
            body,
            retry: args.retry,
            cancellation: args.cancellation,
        }
    }
}

/// Arguments of one endpoint call.
#[derive(Debug, Clone, Default)]
pub struct EndpointArgs {
    path: Vec<(String, String)>,
    query: QueryParams,
    body: Option<RequestBody>,
    retry: Option<RetryPolicy>,
    cancellation: Option<CancellationToken>,
}

impl EndpointArgs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value for a `{name}` placeholder.
    #[must_use]
    pub fn path(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        let name = name.into();
        let value = value.to_string();
        if let Some(slot) = self.path.iter_mut().find(|(k, _)| *k == name) {
            slot.1 = value;
        } else {
            self.path.push((name, value));
        }
        self
    }

    /// Query argument; `None` is accepted and omitted from the wire.
    #[must_use]
    pub fn query<V: ToString>(mut self, name: impl Into<String>, value: Option<V>) -> Self {
        self.query.push_opt(name, value);
        self
    }

    #[must_use]
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// Serialize `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, ApiError> {
        Ok(self.body(RequestBody::json(value)?))
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

    fn path_value(&self, name: &str) -> Option<&str> {
        self.path
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Argument name for a wire name: `[]` removed, `-` mapped to `_`.
pub(crate) fn normalize_name(name: &str) -> String {
    name.replace("[]", "").replace('-', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items() -> EndpointSpec {
        EndpointSpec::new(
            "get_virtual_items_sku",
            Method::GET,
            "/v2/project/{project_id}/items/virtual_items/sku/{item_sku}",
        )
        .with_query(&["locale", "additional_fields[]"])
    }

    #[test]
    fn test_path_params_in_order() {
        assert_eq!(items().path_params(), vec!["project_id", "item_sku"]);
        assert!(EndpointSpec::new("x", Method::GET, "/static").path_params().is_empty());
    }

    #[test]
    fn test_query_param_normalization() {
        let param = QueryParam::new("additional_fields[]");
        assert_eq!(param.name, "additional_fields");
        assert_eq!(param.wire_name, "additional_fields[]");
        assert_eq!(normalize_name("x-user-id"), "x_user_id");
    }

    #[test]
    fn test_path_values_are_percent_encoded() {
        let request = items().build_request(
            EndpointArgs::new()
                .path("project_id", 44056)
                .path("item_sku", "big sword/2"),
            None,
        );
        assert_eq!(
            request.path,
            "/v2/project/44056/items/virtual_items/sku/big%20sword%2F2"
        );
    }

    #[test]
    fn test_project_id_falls_back_to_default() {
        let request = items().build_request(EndpointArgs::new().path("item_sku", "gem"), Some("7"));
        assert_eq!(request.path, "/v2/project/7/items/virtual_items/sku/gem");
    }

    #[test]
    fn test_query_uses_wire_names_and_keeps_absent_values() {
        let request = items().build_request(
            EndpointArgs::new()
                .path("item_sku", "gem")
                .query("additional_fields", Some("media_list"))
                .query("locale", None::<String>)
                .query("bogus", Some(1)),
            Some("7"),
        );
        assert_eq!(request.query.get("additional_fields[]"), Some("media_list"));
        assert!(request.query.contains_key("locale"));
        assert!(!request.query.contains_key("bogus"));
        assert_eq!(
            request.query.to_query_string(),
            "additional_fields%5B%5D=media_list"
        );
    }

    #[test]
    #[should_panic(expected = "missing required path argument `item_sku`")]
    fn test_missing_path_argument_panics() {
        let _ = items().build_request(EndpointArgs::new(), Some("7"));
    }

    #[test]
    #[should_panic(expected = "missing required request body")]
    fn test_missing_body_panics() {
        let spec = EndpointSpec::new("redeem_coupon", Method::POST, "/v2/project/{project_id}/coupon/redeem")
            .with_body();
        let _ = spec.build_request(EndpointArgs::new(), Some("7"));
    }
}
