//! Line-delimited JSON-RPC 2.0 server exposing the tool catalog.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::client::OutlineClient;
use crate::tools::{ToolError, call_tool, tool_catalog};
use crate::transport::{CancelToken, Transport};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "outline-mcp";

pub const PARSE_ERROR: i64 = -32700;
pub const INVALID_REQUEST: i64 = -32600;
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;

#[derive(Debug, Deserialize)]
struct Request {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Read requests from `input` until EOF, writing one response line per
/// request. Notifications get no response.
pub fn serve<R, W, T>(client: &OutlineClient<T>, input: R, mut output: W) -> Result<()>
where
    R: BufRead,
    W: Write,
    T: Transport,
{
    tracing::info!(base_url = client.base_url(), "tool server listening on stdio");
    for line in input.lines() {
        let line = line.context("failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }
        if let Some(response) = handle_line(client, &line) {
            writeln!(output, "{response}").context("failed to write response")?;
            output.flush().context("failed to flush response")?;
        }
    }
    tracing::info!("tool server input closed");
    Ok(())
}

/// Handle one raw request line. `None` means nothing should be written back.
pub fn handle_line<T: Transport>(client: &OutlineClient<T>, line: &str) -> Option<Value> {
    let raw: Value = match serde_json::from_str(line) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!("unparsable request: {error}");
            return Some(error_response(
                Value::Null,
                RpcError::new(PARSE_ERROR, format!("Parse error: {error}")),
            ));
        }
    };

    // An explicit `"id": null` still expects a reply; only a missing id marks
    // a notification.
    let id_present = raw.get("id").is_some();
    let id_hint = raw.get("id").cloned().unwrap_or(Value::Null);
    let request: Request = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(error) => {
            return Some(error_response(
                id_hint,
                RpcError::new(INVALID_REQUEST, format!("Invalid request: {error}")),
            ));
        }
    };

    if !id_present {
        tracing::debug!(method = %request.method, "notification");
        return None;
    }
    let id = request.id;

    tracing::debug!(method = %request.method, "request");
    Some(match dispatch(client, &request.method, request.params) {
        Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
        Err(error) => error_response(id, error),
    })
}

fn dispatch<T: Transport>(
    client: &OutlineClient<T>,
    method: &str,
    params: Value,
) -> std::result::Result<Value, RpcError> {
    match method {
        "initialize" => {
            let version = params
                .get("protocolVersion")
                .and_then(Value::as_str)
                .unwrap_or(PROTOCOL_VERSION);
            Ok(json!({
                "protocolVersion": version,
                "capabilities": { "tools": { "listChanged": false } },
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": env!("CARGO_PKG_VERSION"),
                },
            }))
        }
        "ping" => Ok(json!({})),
        "tools/list" => Ok(json!({ "tools": tool_catalog() })),
        "tools/call" => {
            let call: CallParams = serde_json::from_value(params)
                .map_err(|error| RpcError::new(INVALID_PARAMS, format!("Invalid params: {error}")))?;
            let text = call_tool(client, &call.name, call.arguments, &CancelToken::new())
                .map_err(|error| match error {
                    ToolError::UnknownTool(_) | ToolError::InvalidArguments { .. } => {
                        RpcError::new(INVALID_PARAMS, error.to_string())
                    }
                })?;
            let is_error = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|value| value.get("success").and_then(Value::as_bool))
                == Some(false);
            Ok(json!({
                "content": [{ "type": "text", "text": text }],
                "isError": is_error,
            }))
        }
        other => Err(RpcError::new(
            METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        )),
    }
}

fn error_response(id: Value, error: RpcError) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": error.code, "message": error.message },
    })
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::transport::{HttpReply, TransportError};

    struct FixedTransport(&'static str);

    impl Transport for FixedTransport {
        fn post_json(
            &self,
            _endpoint: &str,
            _body: String,
            _cancel: &CancelToken,
        ) -> std::result::Result<HttpReply, TransportError> {
            Ok(HttpReply {
                status: 200,
                body: self.0.to_string(),
            })
        }
    }

    fn client(body: &'static str) -> OutlineClient<FixedTransport> {
        OutlineClient::with_transport("https://wiki.example.org", FixedTransport(body))
    }

    fn run(client: &OutlineClient<FixedTransport>, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve(client, Cursor::new(input.as_bytes()), &mut output).expect("serve");
        String::from_utf8(output)
            .expect("utf8")
            .lines()
            .map(|line| serde_json::from_str(line).expect("response json"))
            .collect()
    }

    #[test]
    fn initialize_handshake_skips_notification() {
        let client = client("{}");
        let responses = run(
            &client,
            concat!(
                r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#,
                "\n",
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                "\n\n",
                r#"{"jsonrpc":"2.0","id":2,"method":"ping"}"#,
                "\n",
            ),
        );
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[0]["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(responses[0]["result"]["serverInfo"]["name"], SERVER_NAME);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(responses[1]["result"], json!({}));
    }

    #[test]
    fn null_id_request_still_gets_a_reply() {
        let client = client("{}");
        let response = handle_line(&client, r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .expect("response");
        assert_eq!(response["id"], Value::Null);
        assert_eq!(response["result"], json!({}));

        let notification = handle_line(&client, r#"{"jsonrpc":"2.0","method":"ping"}"#);
        assert!(notification.is_none());
    }

    #[test]
    fn tools_list_returns_catalog() {
        let client = client("{}");
        let response =
            handle_line(&client, r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
                .expect("response");
        let tools = response["result"]["tools"].as_array().expect("tools");
        assert_eq!(tools.len(), 10);
        assert!(tools[0]["inputSchema"].is_object());
    }

    #[test]
    fn tools_call_wraps_text_content() {
        let client = client(r#"{"data":[{"id":"c1","name":"Eng"}]}"#);
        let response = handle_line(
            &client,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"list_collections","arguments":{}}}"#,
        )
        .expect("response");
        let result = &response["result"];
        assert_eq!(result["isError"], false);
        assert_eq!(result["content"][0]["type"], "text");
        let text = result["content"][0]["text"].as_str().expect("text");
        let body: Value = serde_json::from_str(text).expect("tool json");
        assert_eq!(body[0]["name"], "Eng");
    }

    #[test]
    fn failed_tool_sets_is_error() {
        let client = client("{}");
        let response = handle_line(
            &client,
            r#"{"jsonrpc":"2.0","id":4,"method":"tools/call","params":{"name":"get_document","arguments":{"documentId":"missing"}}}"#,
        )
        .expect("response");
        assert_eq!(response["result"]["isError"], true);
    }

    #[test]
    fn protocol_errors_use_json_rpc_codes() {
        let client = client("{}");
        let parse = handle_line(&client, "{not json").expect("response");
        assert_eq!(parse["error"]["code"], PARSE_ERROR);
        assert_eq!(parse["id"], Value::Null);

        let unknown = handle_line(&client, r#"{"jsonrpc":"2.0","id":5,"method":"resources/list"}"#)
            .expect("response");
        assert_eq!(unknown["error"]["code"], METHOD_NOT_FOUND);

        let bad_tool = handle_line(
            &client,
            r#"{"jsonrpc":"2.0","id":6,"method":"tools/call","params":{"name":"nope"}}"#,
        )
        .expect("response");
        assert_eq!(bad_tool["error"]["code"], INVALID_PARAMS);

        let no_params = handle_line(&client, r#"{"jsonrpc":"2.0","id":7,"method":"tools/call"}"#)
            .expect("response");
        assert_eq!(no_params["error"]["code"], INVALID_PARAMS);

        let no_method = handle_line(&client, r#"{"jsonrpc":"2.0","id":8}"#).expect("response");
        assert_eq!(no_method["error"]["code"], INVALID_REQUEST);
        assert_eq!(no_method["id"], 8);
    }
}
