use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::rpc::{middleware::RpcUser, AppState};

/// Built-in methods, in the order `help` lists them.
pub const METHODS: &[&str] = &["echo", "getrpcinfo", "help", "uptime"];

const PARSE_ERROR: i64 = -32700;
const INVALID_REQUEST: i64 = -32600;
const METHOD_NOT_FOUND: i64 = -32601;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    method: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

/// Handle one authenticated JSON-RPC request.
#[instrument(skip_all, fields(user = %user.0))]
pub async fn dispatch(
    State(state): State<AppState>,
    Extension(user): Extension<RpcUser>,
    body: Bytes,
) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            debug!("Unparsable request body: {e}");
            return error(StatusCode::BAD_REQUEST, false, Value::Null, PARSE_ERROR, "Parse error");
        }
    };

    let request: RpcRequest = match serde_json::from_value(value) {
        Ok(request) => request,
        Err(e) => {
            debug!("Invalid request object: {e}");
            return error(
                StatusCode::BAD_REQUEST,
                false,
                Value::Null,
                INVALID_REQUEST,
                "Invalid Request object",
            );
        }
    };
    let v2 = request.jsonrpc.as_deref() == Some("2.0");

    if !state.whitelist.allows(&user.0, &request.method) {
        warn!("User {} is not allowed to call {}", user.0, request.method);
        return StatusCode::FORBIDDEN.into_response();
    }

    match call(&state, &request.method, request.params) {
        Some(result) => (StatusCode::OK, Json(envelope(v2, request.id, Ok(result)))).into_response(),
        None => error(
            StatusCode::NOT_FOUND,
            v2,
            request.id,
            METHOD_NOT_FOUND,
            "Method not found",
        ),
    }
}

fn call(state: &AppState, method: &str, params: Value) -> Option<Value> {
    let result = match method {
        "echo" => params,
        "getrpcinfo" => json!({
            "bind": state.local_addr.to_string(),
            "credentials": state.authenticator.registry().len(),
            "cookie": state.authenticator.cookie().is_some(),
        }),
        "help" => json!(METHODS),
        "uptime" => json!(state.started.elapsed().as_secs()),
        _ => return None,
    };
    Some(result)
}

fn error(status: StatusCode, v2: bool, id: Value, code: i64, message: &str) -> Response {
    let body = envelope(v2, id, Err(json!({ "code": code, "message": message })));
    (status, Json(body)).into_response()
}

/// JSON-RPC 2.0 replies carry either `result` or `error`; 1.0 replies carry both.
fn envelope(v2: bool, id: Value, outcome: Result<Value, Value>) -> Value {
    if v2 {
        match outcome {
            Ok(result) => json!({ "jsonrpc": "2.0", "result": result, "id": id }),
            Err(error) => json!({ "jsonrpc": "2.0", "error": error, "id": id }),
        }
    } else {
        match outcome {
            Ok(result) => json!({ "result": result, "error": null, "id": id }),
            Err(error) => json!({ "result": null, "error": error, "id": id }),
        }
    }
}
