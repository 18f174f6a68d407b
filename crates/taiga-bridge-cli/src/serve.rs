//! Tool server - line-delimited JSON-RPC on stdin/stdout
//!
//! Exposes the facade to tool-calling agents. One request per line, one
//! response per line; notifications (no `id`) get no response.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use crate::tools::{tool_specs, ToolBox};

const PROTOCOL_VERSION: &str = "2024-11-05";

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;
const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[allow(dead_code)]
    jsonrpc: Option<String>,
    method: String,
    #[serde(default)]
    params: Value,
    id: Option<Value>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
    id: Value,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    fn err(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

/// Serve on the process's stdin/stdout until stdin closes
pub async fn run_server(tools: ToolBox) -> anyhow::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    serve_lines(stdin, stdout, tools).await
}

/// Request loop over any line reader / writer pair
pub async fn serve_lines<R, W>(mut reader: R, mut writer: W, mut tools: ToolBox) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    tracing::info!("Tool server ready for project {}", tools.facade().project().slug);

    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(request) => handle_request(&mut tools, request).await,
            Err(e) => {
                tracing::debug!("Malformed request: {}", e);
                Some(RpcResponse::err(Value::Null, PARSE_ERROR, e.to_string()))
            }
        };

        if let Some(response) = response {
            let response_json = serde_json::to_string(&response)? + "\n";
            writer.write_all(response_json.as_bytes()).await?;
            writer.flush().await?;
        }
    }

    Ok(())
}

async fn handle_request(tools: &mut ToolBox, req: RpcRequest) -> Option<RpcResponse> {
    let Some(id) = req.id else {
        tracing::debug!("Notification {}", req.method);
        return None;
    };

    let response = match req.method.as_str() {
        "initialize" => RpcResponse::ok(
            id,
            json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {"tools": {"listChanged": false}},
                "serverInfo": {
                    "name": "taiga-bridge",
                    "version": taiga_bridge_core::VERSION
                }
            }),
        ),
        "tools/list" => RpcResponse::ok(id, json!({ "tools": tool_specs() })),
        "tools/call" => match req.params.get("name").and_then(Value::as_str) {
            Some(name) => {
                let arguments = req.params.get("arguments").cloned().unwrap_or(Value::Null);
                RpcResponse::ok(id, handle_tool_call(tools, name, arguments).await)
            }
            None => RpcResponse::err(id, INVALID_PARAMS, "tools/call needs a tool name"),
        },
        "ping" => RpcResponse::ok(id, json!({})),
        other => RpcResponse::err(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    };
    Some(response)
}

/// Payload as pretty JSON text, or the error message with `isError`
async fn handle_tool_call(tools: &mut ToolBox, name: &str, arguments: Value) -> Value {
    match tools.call(name, arguments).await {
        Ok(payload) => {
            let text = serde_json::to_string_pretty(&payload).unwrap_or_else(|_| payload.to_string());
            json!({"content": [{"type": "text", "text": text}]})
        }
        Err(e) => {
            tracing::debug!("Tool {} failed: {}", name, e);
            json!({
                "isError": true,
                "content": [{"type": "text", "text": e.to_string()}]
            })
        }
    }
}
