//! Operation registry and path resolver
//!
//! Translates a symbolic operation id plus caller-supplied parameters into a
//! rendered, transport-ready request, without the caller knowing the path
//! template. The operation table is built once (typically from a generated
//! JSON description) and never mutated, so dispatch needs no synchronization.

use crate::error::{ClientError, ErrorDetails};
use crate::transport::{RequestParts, Response, Transport};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};
use thiserror::Error;
use tracing::debug;

/// HTTP method of a table-described operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
    Options,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Head => "HEAD",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("unknown HTTP method: {0}")]
pub struct UnknownMethod(String);

impl FromStr for Method {
    type Err = UnknownMethod;

    /// Case-insensitive, so raw `request("get", ...)` dispatches as `GET`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            "PATCH" => Ok(Method::Patch),
            "HEAD" => Ok(Method::Head),
            "OPTIONS" => Ok(Method::Options),
            _ => Err(UnknownMethod(s.to_string())),
        }
    }
}

/// Normalized operation metadata, constructed once and never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDefinition {
    /// Globally unique key into the operation table.
    pub operation_id: String,
    pub method: Method,
    /// Path template with `{name}` placeholders, e.g. `/widgets/{widget_id}`.
    pub path: String,
    /// Informational grouping tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Informational one-line description.
    #[serde(default)]
    pub summary: String,
    /// Placeholder names that must be supplied at call time.
    pub path_params: Vec<String>,
}

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{([^}]+)\}").unwrap());

/// Placeholder names appearing in a path template, in order of occurrence.
fn template_placeholders(path: &str) -> Vec<&str> {
    PLACEHOLDER_RE
        .find_iter(path)
        .map(|m| &path[m.start() + 1..m.end() - 1])
        .collect()
}

/// Read-only mapping from operation id to [`OperationDefinition`].
///
/// Construction verifies that every definition's `{...}` placeholders match
/// its declared `path_params` exactly, in both directions, and that ids are
/// unique. After that the table is immutable and freely shareable.
#[derive(Debug, Default)]
pub struct OperationTable {
    ops: BTreeMap<String, OperationDefinition>,
}

impl OperationTable {
    /// Build a table from individual definitions.
    pub fn from_definitions(
        definitions: impl IntoIterator<Item = OperationDefinition>,
    ) -> Result<Self, ClientError> {
        let mut ops = BTreeMap::new();
        for definition in definitions {
            Self::check_definition(&definition)?;
            let id = definition.operation_id.clone();
            if ops.insert(id.clone(), definition).is_some() {
                return Err(ClientError::Validation {
                    message: format!("Duplicate operation_id: {id}"),
                    details: ErrorDetails::for_operation("load_operation_table")
                        .resource("operation", &id),
                });
            }
        }
        Ok(Self { ops })
    }

    /// Build a table from a generated JSON array of definitions.
    pub fn from_json(raw: &str) -> Result<Self, ClientError> {
        let definitions: Vec<OperationDefinition> =
            serde_json::from_str(raw).map_err(|e| ClientError::Validation {
                message: format!("Malformed operation table: {e}"),
                details: ErrorDetails::for_operation("load_operation_table"),
            })?;
        Self::from_definitions(definitions)
    }

    fn check_definition(definition: &OperationDefinition) -> Result<(), ClientError> {
        let in_template: BTreeSet<&str> =
            template_placeholders(&definition.path).into_iter().collect();
        let declared: BTreeSet<&str> =
            definition.path_params.iter().map(String::as_str).collect();

        if in_template != declared || declared.len() != definition.path_params.len() {
            return Err(ClientError::Validation {
                message: format!(
                    "Path params {:?} do not match template placeholders in '{}'",
                    definition.path_params, definition.path
                ),
                details: ErrorDetails::for_operation("load_operation_table")
                    .resource("operation", &definition.operation_id)
                    .context("path", definition.path.clone()),
            });
        }
        Ok(())
    }

    pub fn get(&self, operation_id: &str) -> Option<&OperationDefinition> {
        self.ops.get(operation_id)
    }

    /// All operation ids, sorted.
    pub fn operation_ids(&self) -> Vec<String> {
        self.ops.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

/// Per-call inputs for a table-described operation.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Values for the template's placeholders. A `null` value is treated as
    /// missing, never as the literal string "null".
    pub path_params: BTreeMap<String, Value>,
    pub query: BTreeMap<String, String>,
    pub body: Option<Value>,
    pub headers: BTreeMap<String, String>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn path_param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.path_params.insert(name.to_string(), value.into());
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.insert(key.to_string(), value.into());
        self
    }

    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    fn into_parts(self) -> (BTreeMap<String, Value>, RequestParts) {
        let CallOptions {
            path_params,
            query,
            body,
            headers,
        } = self;
        (
            path_params,
            RequestParts {
                query,
                body,
                headers,
            },
        )
    }
}

/// Low-level typed access to any table-described or raw endpoint.
///
/// Holds no mutable state; clones share the transport and table.
#[derive(Clone)]
pub struct RawOperations {
    transport: Arc<dyn Transport>,
    table: Arc<OperationTable>,
}

impl RawOperations {
    pub fn new(transport: Arc<dyn Transport>, table: Arc<OperationTable>) -> Self {
        Self { transport, table }
    }

    /// Sorted operation ids available in this SDK build.
    pub fn list_operations(&self) -> Vec<String> {
        self.table.operation_ids()
    }

    /// Metadata for a specific operation id.
    pub fn get_operation(&self, operation_id: &str) -> Result<OperationDefinition, ClientError> {
        self.table
            .get(operation_id)
            .cloned()
            .ok_or_else(|| ClientError::Validation {
                message: format!("Unknown operation_id: {operation_id}"),
                details: ErrorDetails::for_operation("raw_get_operation")
                    .resource("operation", operation_id),
            })
    }

    /// Call an operation by operation id.
    ///
    /// Resolves the definition, renders the path, then forwards to the
    /// transport. Any resolution or rendering failure prevents the transport
    /// call entirely; no partial request is ever sent.
    pub async fn call(
        &self,
        operation_id: &str,
        options: CallOptions,
    ) -> Result<Response, ClientError> {
        let operation = self.get_operation(operation_id)?;
        let (path_params, parts) = options.into_parts();
        let path = render_path(&operation.path, &operation.path_params, &path_params)?;
        debug!(operation_id, method = %operation.method, path = %path, "dispatching operation");
        self.dispatch(operation.method, &path, parts, "raw_call").await
    }

    /// Send an arbitrary request, bypassing the operation table.
    ///
    /// Supports backend-only or undocumented endpoints. The verb is parsed
    /// case-insensitively; an unknown verb is a validation error raised
    /// before any transport activity.
    pub async fn request(
        &self,
        method: &str,
        path: &str,
        parts: RequestParts,
    ) -> Result<Response, ClientError> {
        let method = Method::from_str(method).map_err(|e| ClientError::Validation {
            message: e.to_string(),
            details: ErrorDetails::for_operation("raw_request"),
        })?;
        self.dispatch(method, path, parts, "raw_request").await
    }

    pub async fn get(&self, path: &str, parts: RequestParts) -> Result<Response, ClientError> {
        self.dispatch(Method::Get, path, parts, "raw_request").await
    }

    pub async fn post(&self, path: &str, parts: RequestParts) -> Result<Response, ClientError> {
        self.dispatch(Method::Post, path, parts, "raw_request").await
    }

    pub async fn put(&self, path: &str, parts: RequestParts) -> Result<Response, ClientError> {
        self.dispatch(Method::Put, path, parts, "raw_request").await
    }

    pub async fn delete(&self, path: &str, parts: RequestParts) -> Result<Response, ClientError> {
        self.dispatch(Method::Delete, path, parts, "raw_request").await
    }

    pub async fn patch(&self, path: &str, parts: RequestParts) -> Result<Response, ClientError> {
        self.dispatch(Method::Patch, path, parts, "raw_request").await
    }

    pub async fn head(&self, path: &str, parts: RequestParts) -> Result<Response, ClientError> {
        self.dispatch(Method::Head, path, parts, "raw_request").await
    }

    pub async fn options(&self, path: &str, parts: RequestParts) -> Result<Response, ClientError> {
        self.dispatch(Method::Options, path, parts, "raw_request").await
    }

    /// Forward to the transport and classify any failing response.
    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        parts: RequestParts,
        operation: &str,
    ) -> Result<Response, ClientError> {
        let response = self.transport.send(method, path, parts).await?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(crate::classify::classify_response(
                response.status,
                &response.payload,
                operation,
            ))
        }
    }
}

/// Render a path template with the supplied parameter values.
///
/// Missing-name detection runs to completion first so a single error reports
/// every missing name; only then are individual values checked for `null`.
/// The rendered path always begins with `/`. Extra supplied parameters are
/// ignored; they are not forwarded as query parameters.
fn render_path(
    template: &str,
    required: &[String],
    provided: &BTreeMap<String, Value>,
) -> Result<String, ClientError> {
    let missing: Vec<&str> = required
        .iter()
        .map(String::as_str)
        .filter(|name| !provided.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(ClientError::Validation {
            message: format!("Missing required path params: {}", missing.join(", ")),
            details: ErrorDetails::for_operation("raw_call")
                .resource("operation_path_params", template)
                .context("path", template)
                .context("required", required.join(", ")),
        });
    }

    let mut rendered = String::with_capacity(template.len());
    let mut tail = 0;
    for m in PLACEHOLDER_RE.find_iter(template) {
        let name = &template[m.start() + 1..m.end() - 1];
        rendered.push_str(&template[tail..m.start()]);
        match provided.get(name) {
            Some(Value::Null) | None => {
                return Err(ClientError::Validation {
                    message: format!("Path param '{name}' cannot be null"),
                    details: ErrorDetails::for_operation("raw_call")
                        .resource("operation_path_params", template)
                        .context("path", template)
                        .context("param", name),
                });
            }
            Some(Value::String(s)) => rendered.push_str(s),
            Some(value) => rendered.push_str(&value.to_string()),
        }
        tail = m.end();
    }
    rendered.push_str(&template[tail..]);

    if !rendered.starts_with('/') {
        rendered.insert(0, '/');
    }
    Ok(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn widget_definition() -> OperationDefinition {
        OperationDefinition {
            operation_id: "get_widget".to_string(),
            method: Method::Get,
            path: "/widgets/{widget_id}".to_string(),
            tags: vec!["widgets".to_string()],
            summary: "Fetch one widget".to_string(),
            path_params: vec!["widget_id".to_string()],
        }
    }

    fn params(entries: &[(&str, Value)]) -> BTreeMap<String, Value> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn table_rejects_placeholder_mismatch() {
        let mut definition = widget_definition();
        definition.path_params = vec!["id".to_string()];
        let err = OperationTable::from_definitions([definition]).unwrap_err();
        assert!(matches!(err, ClientError::Validation { .. }));
    }

    #[test]
    fn table_rejects_duplicate_ids() {
        let err =
            OperationTable::from_definitions([widget_definition(), widget_definition()])
                .unwrap_err();
        match err {
            ClientError::Validation { message, .. } => {
                assert!(message.contains("Duplicate"));
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn table_loads_from_json() {
        let table = OperationTable::from_json(
            r#"[
                {"operation_id": "list_widgets", "method": "GET",
                 "path": "/widgets", "path_params": [],
                 "tags": ["widgets"], "summary": "List widgets"},
                {"operation_id": "get_widget", "method": "GET",
                 "path": "/widgets/{widget_id}", "path_params": ["widget_id"]}
            ]"#,
        )
        .unwrap();
        assert_eq!(
            table.operation_ids(),
            vec!["get_widget".to_string(), "list_widgets".to_string()]
        );
        let op = table.get("get_widget").unwrap();
        assert_eq!(op.method, Method::Get);
        assert_eq!(template_placeholders(&op.path), vec!["widget_id"]);
        assert_eq!(op.path_params, vec!["widget_id".to_string()]);
    }

    #[test]
    fn render_substitutes_all_placeholders() {
        let required = vec!["org_id".to_string(), "widget_id".to_string()];
        let rendered = render_path(
            "/orgs/{org_id}/widgets/{widget_id}",
            &required,
            &params(&[("org_id", json!("acme")), ("widget_id", json!(42))]),
        )
        .unwrap();
        assert_eq!(rendered, "/orgs/acme/widgets/42");
    }

    #[test]
    fn render_prepends_missing_leading_slash() {
        let rendered = render_path("status", &[], &BTreeMap::new()).unwrap();
        assert_eq!(rendered, "/status");
    }

    #[test]
    fn render_reports_all_missing_params_at_once() {
        let required = vec![
            "org_id".to_string(),
            "team_id".to_string(),
            "widget_id".to_string(),
        ];
        let err = render_path(
            "/orgs/{org_id}/teams/{team_id}/widgets/{widget_id}",
            &required,
            &params(&[("team_id", json!(7))]),
        )
        .unwrap_err();
        match err {
            ClientError::Validation { message, details } => {
                assert!(message.contains("org_id"));
                assert!(message.contains("widget_id"));
                assert!(!message.contains("team_id"));
                assert_eq!(
                    details.context.get("required").map(String::as_str),
                    Some("org_id, team_id, widget_id")
                );
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn render_rejects_null_param_by_name() {
        let required = vec!["widget_id".to_string()];
        let err = render_path(
            "/widgets/{widget_id}",
            &required,
            &params(&[("widget_id", Value::Null)]),
        )
        .unwrap_err();
        match err {
            ClientError::Validation { message, details } => {
                assert!(message.contains("widget_id"));
                assert_eq!(
                    details.context.get("param").map(String::as_str),
                    Some("widget_id")
                );
            }
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn render_ignores_extra_params() {
        let required = vec!["widget_id".to_string()];
        let rendered = render_path(
            "/widgets/{widget_id}",
            &required,
            &params(&[("widget_id", json!(1)), ("unused", json!("x"))]),
        )
        .unwrap();
        assert_eq!(rendered, "/widgets/1");
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("get".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("PaTcH".parse::<Method>().unwrap(), Method::Patch);
        assert!("FETCH".parse::<Method>().is_err());
    }
}
