//! Endpoint table from an OpenAPI 3 document.

use super::{normalize_name, EndpointCatalog, EndpointSpec, QueryParam};
use crate::error::ApiError;
use crate::request::is_supported_method;
use oas3::spec::{ObjectOrReference, Parameter, ParameterIn};
use oas3::OpenApiV3Spec;
use std::path::Path;
use tracing::{debug, info, warn};

impl EndpointCatalog {
    /// Load an OpenAPI document (`.yaml`/`.yml` or JSON) and build the table from it.
    pub fn from_openapi_file(path: impl AsRef<Path>) -> Result<Self, ApiError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Spec(format!("{}: {e}", path.display())))?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml")
        );
        let spec: OpenApiV3Spec = if is_yaml {
            serde_yaml::from_str(&content).map_err(|e| ApiError::Spec(e.to_string()))?
        } else {
            serde_json::from_str(&content).map_err(|e| ApiError::Spec(e.to_string()))?
        };
        let catalog = Self::from_openapi(&spec)?;
        info!(
            spec = %path.display(),
            endpoints = catalog.len(),
            "Loaded endpoints from OpenAPI document"
        );
        Ok(catalog)
    }

    /// Build the table from a parsed document.
    ///
    /// Operation ids map `-` to `_`. Query parameters are declared under their
    /// wire names; `$ref` parameters are resolved from `components`. Verbs the
    /// store API does not use are skipped. Every operation needs an
    /// operation id.
    pub fn from_openapi(spec: &OpenApiV3Spec) -> Result<Self, ApiError> {
        let mut endpoints = Vec::new();
        let mut issues = Vec::new();

        if let Some(paths) = spec.paths.as_ref() {
            for (path, item) in paths {
                for (method, operation) in item.methods() {
                    if !is_supported_method(&method) {
                        debug!(path = %path, method = %method, "Skipping unsupported verb");
                        continue;
                    }
                    let Some(operation_id) = operation.operation_id.as_deref() else {
                        issues.push(format!("{method} {path}: missing operationId"));
                        continue;
                    };

                    let mut endpoint =
                        EndpointSpec::new(&operation_id.replace('-', "_"), method, path);
                    for param in item.parameters.iter().chain(&operation.parameters) {
                        match resolve_parameter(spec, param) {
                            Some(param) if matches!(param.location, ParameterIn::Query) => {
                                endpoint.query_params.push(QueryParam {
                                    name: normalize_name(&param.name),
                                    wire_name: param.name.clone(),
                                });
                            }
                            Some(_) => {}
                            None => warn!(
                                operation_id = %endpoint.operation_id,
                                "Unresolvable parameter reference"
                            ),
                        }
                    }
                    endpoint.has_body = operation.request_body.is_some();
                    endpoints.push(endpoint);
                }
            }
        }

        if !issues.is_empty() {
            return Err(ApiError::Spec(issues.join("; ")));
        }
        Ok(Self::new(endpoints))
    }
}

fn resolve_parameter<'a>(
    spec: &'a OpenApiV3Spec,
    param: &'a ObjectOrReference<Parameter>,
) -> Option<&'a Parameter> {
    match param {
        ObjectOrReference::Object(param) => Some(param),
        ObjectOrReference::Ref { ref_path, .. } => {
            let name = ref_path.strip_prefix("#/components/parameters/")?;
            match spec.components.as_ref()?.parameters.get(name)? {
                ObjectOrReference::Object(param) => Some(param),
                ObjectOrReference::Ref { .. } => None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    const DOC: &str = r#"
openapi: 3.1.0
info:
  title: Store
  version: "2.0"
paths:
  /v2/project/{project_id}/items/virtual_items:
    get:
      operationId: get-virtual-items
      parameters:
        - $ref: '#/components/parameters/project_id'
        - name: additional_fields[]
          in: query
          schema:
            type: string
        - name: limit
          in: query
          schema:
            type: integer
      responses:
        '200':
          description: ok
  /v2/project/{project_id}/coupon/redeem:
    post:
      operationId: redeem-coupon
      parameters:
        - $ref: '#/components/parameters/project_id'
      requestBody:
        content:
          application/json:
            schema:
              type: object
      responses:
        '200':
          description: ok
components:
  parameters:
    project_id:
      name: project_id
      in: path
      required: true
      schema:
        type: integer
"#;

    fn parse(doc: &str) -> OpenApiV3Spec {
        serde_yaml::from_str(doc).expect("valid document")
    }

    #[test]
    fn test_operations_become_endpoints() {
        let catalog = EndpointCatalog::from_openapi(&parse(DOC)).expect("catalog");
        assert_eq!(catalog.len(), 2);

        let items = catalog.get("get_virtual_items").expect("normalized id");
        assert_eq!(items.method, Method::GET);
        assert_eq!(items.path_params(), vec!["project_id"]);
        let names: Vec<_> = items.query_params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["additional_fields", "limit"]);
        assert!(!items.has_body);

        assert!(catalog.get("redeem_coupon").is_some_and(|spec| spec.has_body));
    }

    #[test]
    fn test_missing_operation_id_is_an_error() {
        let doc = r#"
openapi: 3.1.0
info:
  title: Store
  version: "1"
paths:
  /v2/x:
    get:
      responses:
        '200':
          description: ok
"#;
        let err = EndpointCatalog::from_openapi(&parse(doc)).unwrap_err();
        assert!(matches!(err, ApiError::Spec(msg) if msg.contains("missing operationId")));
    }
}
