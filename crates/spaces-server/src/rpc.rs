use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request or notification.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct RpcRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
}

impl RpcRequest {
    /// A message without an id expects no response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// JSON-RPC 2.0 response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Server-defined codes
pub const AUTH_REQUIRED: i32 = -32001;
pub const BACKEND_FAILURE: i32 = -32002;
pub const BACKEND_TIMEOUT: i32 = -32003;

impl RpcResponse {
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Value, error: RpcError) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: None,
            error: Some(error),
        }
    }

    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self::failure(
            id,
            RpcError {
                code,
                message: message.into(),
                data: None,
            },
        )
    }

    pub fn method_not_found(id: Value, method: &str) -> Self {
        Self::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
    }

    pub fn invalid_params(id: Value, msg: impl Into<String>) -> Self {
        Self::error(id, INVALID_PARAMS, msg)
    }

    pub fn invalid_request(id: Value, msg: impl Into<String>) -> Self {
        Self::error(id, INVALID_REQUEST, msg)
    }

    pub fn parse_error() -> Self {
        Self::error(Value::Null, PARSE_ERROR, "Parse error")
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Decode one inbound message, answering malformed input with the matching
/// protocol error.
pub fn parse_message(raw: &str) -> Result<RpcRequest, RpcResponse> {
    let value: Value = serde_json::from_str(raw).map_err(|_| RpcResponse::parse_error())?;
    let id = value.get("id").cloned().unwrap_or(Value::Null);

    if !value.is_object() {
        return Err(RpcResponse::invalid_request(id, "Request must be a JSON object"));
    }
    let request: RpcRequest = serde_json::from_value(value)
        .map_err(|e| RpcResponse::invalid_request(id.clone(), format!("Invalid request: {e}")))?;
    if let Some(version) = request.jsonrpc.as_deref() {
        if version != "2.0" {
            return Err(RpcResponse::invalid_request(
                id,
                format!("Unsupported jsonrpc version: {version}"),
            ));
        }
    }
    Ok(request)
}
