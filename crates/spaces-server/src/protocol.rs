//! MCP method routing on top of the dispatcher.

use serde_json::{json, Value};
use tracing::debug;

use spaces_core::AuthContext;

use crate::dispatch::Dispatcher;
use crate::rpc::{RpcRequest, RpcResponse};

/// MCP revision spoken by this server.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "huggingface-spaces-server";

/// Handle one JSON-RPC message. Returns `None` for notifications.
pub async fn handle(
    dispatcher: &Dispatcher,
    request: RpcRequest,
    auth: &AuthContext,
) -> Option<RpcResponse> {
    if request.method.starts_with("notifications/") {
        debug!(method = %request.method, "notification received");
        return None;
    }

    let notification = request.is_notification();
    let id = request.id.unwrap_or(Value::Null);
    let response = match request.method.as_str() {
        "initialize" => RpcResponse::success(id, initialize_result()),
        "ping" => RpcResponse::success(id, json!({})),
        "tools/list" => RpcResponse::success(
            id,
            json!({ "tools": dispatcher.catalog().definitions() }),
        ),
        "tools/call" => call_tool(dispatcher, id, request.params, auth).await,
        other => RpcResponse::method_not_found(id, other),
    };

    if notification {
        None
    } else {
        Some(response)
    }
}

fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": {
            "name": SERVER_NAME,
            "version": env!("CARGO_PKG_VERSION"),
        },
    })
}

async fn call_tool(
    dispatcher: &Dispatcher,
    id: Value,
    params: Option<Value>,
    auth: &AuthContext,
) -> RpcResponse {
    let params = params.unwrap_or_else(|| json!({}));
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return RpcResponse::invalid_params(id, "Missing required parameter: name");
    };
    let args = params.get("arguments").cloned().unwrap_or(Value::Null);

    match dispatcher.dispatch(name, &args, auth).await {
        Ok(result) => RpcResponse::success(id, result),
        Err(err) => RpcResponse::failure(id, err.to_rpc_error()),
    }
}
