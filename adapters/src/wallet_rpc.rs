//! `WalletExecutor` over Content-Length-framed JSON-RPC 2.0 (§6, "Wallet
//! executor RPC"), the same framing MCP stdio transports use: each
//! message is `Content-Length: N\r\n\r\n<N bytes of JSON>`.
//!
//! Generic over `AsyncRead + AsyncWrite` so the same client drives a
//! spawned child's stdio, a duplex socket, or (in tests) an in-memory
//! pipe — the teacher's `executor::types` traits are abstracted the same
//! way over `TonClient`/`SwapBuilder` rather than hard-coding a
//! transport.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use types::{Action, ExecutionIntent, ExecutionResult, ResultStatus};

const WALLET_EXECUTE_SWAP: &str = "wallet_execute_swap";
const WALLET_SIGN_AND_SEND: &str = "wallet_sign_and_send";

/// JSON-RPC 2.0 client speaking the Content-Length framing over any
/// `AsyncRead + AsyncWrite` pair.
pub struct WalletRpcClient<R, W> {
    reader: Mutex<BufReader<R>>,
    writer: Mutex<W>,
    next_id: AtomicU64,
}

impl<R, W> WalletRpcClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: Mutex::new(BufReader::new(reader)),
            writer: Mutex::new(writer),
            next_id: AtomicU64::new(1),
        }
    }

    /// Sends the `initialize` handshake. Callers invoke this once before
    /// the client is handed to the cycle engine as a `WalletExecutor`.
    pub async fn initialize(&self) -> anyhow::Result<Value> {
        self.call("initialize", json!({})).await
    }

    async fn call(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });
        write_message(&mut *self.writer.lock().await, &request).await?;

        loop {
            let response = read_message(&mut *self.reader.lock().await).await?;
            if response.get("id").and_then(Value::as_u64) == Some(id) {
                if let Some(error) = response.get("error") {
                    anyhow::bail!("rpc error: {error}");
                }
                return Ok(response.get("result").cloned().unwrap_or(Value::Null));
            }
            // A response for a stale/unrelated id; this transport is used
            // sequentially so that should not happen, but don't spin on it.
            tracing::warn!(method, "discarding rpc response for unexpected id");
        }
    }

    async fn call_tool(&self, tool_name: &str, arguments: Value) -> anyhow::Result<Value> {
        self.call(
            "tools/call",
            json!({ "name": tool_name, "arguments": arguments }),
        )
        .await
    }
}

#[async_trait]
impl<R, W> ports::WalletExecutor for WalletRpcClient<R, W>
where
    R: AsyncRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn execute(&self, intent: &ExecutionIntent, deadline: Duration) -> ExecutionResult {
        let now = chrono::Utc::now();
        let (tool_name, arguments) = tool_call_for(intent);

        let outcome = tokio::time::timeout(deadline, self.call_tool(tool_name, arguments)).await;
        match outcome {
            Err(_) => ExecutionResult::new(intent.id.clone(), now, ResultStatus::Failed)
                .with_error("wallet executor call timed out"),
            Ok(Err(err)) => ExecutionResult::new(intent.id.clone(), now, ResultStatus::Failed)
                .with_error(err.to_string()),
            Ok(Ok(result)) => parse_tool_result(intent, result, now),
        }
    }
}

fn tool_call_for(intent: &ExecutionIntent) -> (&'static str, Value) {
    let base = json!({
        "input_mint": intent.input_mint,
        "output_mint": intent.output_mint,
        "amount_lamports": intent.amount_lamports,
        "slippage_bps": intent.slippage_bps,
    });
    match intent.action {
        Action::Buy | Action::Sell => (WALLET_EXECUTE_SWAP, base),
        Action::PerpOpen | Action::PerpClose => (WALLET_SIGN_AND_SEND, base),
    }
}

/// MCP-style tool results carry `isError` plus a `content` array of
/// `{type: "text", text: "<json>"}` blocks; the swap payload is the
/// parsed JSON inside the first text block.
fn parse_tool_result(
    intent: &ExecutionIntent,
    result: Value,
    now: chrono::DateTime<chrono::Utc>,
) -> ExecutionResult {
    let is_error = result.get("isError").and_then(Value::as_bool).unwrap_or(false);
    let text = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|blocks| blocks.first())
        .and_then(|block| block.get("text"))
        .and_then(Value::as_str)
        .unwrap_or("");

    if is_error {
        return ExecutionResult::new(intent.id.clone(), now, ResultStatus::Failed)
            .with_error(if text.is_empty() { "executor reported an error".to_string() } else { text.to_string() });
    }

    let payload: BTreeMap<String, Value> = serde_json::from_str(text).unwrap_or_default();
    let tx_hash = payload.get("tx_hash").and_then(Value::as_str).map(str::to_string);
    let input_amount = payload
        .get("input_amount")
        .and_then(Value::as_str)
        .unwrap_or(&intent.amount_lamports)
        .to_string();
    let output_amount = payload
        .get("output_amount")
        .and_then(Value::as_str)
        .unwrap_or("0")
        .to_string();

    let mut filled = ExecutionResult::new(intent.id.clone(), now, ResultStatus::Filled)
        .with_amounts(input_amount, output_amount);
    if let Some(tx_hash) = tx_hash {
        filled = filled.with_tx_hash(tx_hash);
    }
    filled
}

async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, value: &Value) -> anyhow::Result<()> {
    let body = serde_json::to_vec(value)?;
    writer
        .write_all(format!("Content-Length: {}\r\n\r\n", body.len()).as_bytes())
        .await?;
    writer.write_all(&body).await?;
    writer.flush().await?;
    Ok(())
}

async fn read_message<R: AsyncRead + Unpin>(reader: &mut BufReader<R>) -> anyhow::Result<Value> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            anyhow::bail!("wallet rpc transport closed while reading headers");
        }
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            break;
        }
        if let Some(value) = trimmed.strip_prefix("Content-Length:") {
            content_length = Some(value.trim().parse()?);
        }
    }
    let len = content_length.ok_or_else(|| anyhow::anyhow!("missing Content-Length header"))?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(serde_json::from_slice(&buf)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::IntentKind;

    fn sample_intent() -> ExecutionIntent {
        ExecutionIntent {
            kind: IntentKind::ExecutionIntent,
            id: "intent-1".to_string(),
            created_at: chrono::Utc::now(),
            expires_at: None,
            action: Action::Buy,
            input_mint: "So11111111111111111111111111111111111111112".to_string(),
            output_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            amount_lamports: "500000000".to_string(),
            slippage_bps: 100,
            metadata: None,
        }
    }

    async fn respond_once(mut server: tokio::io::DuplexStream, response_body: Value) {
        let request = read_message(&mut BufReader::new(&mut server)).await.unwrap();
        let id = request["id"].clone();
        let response = json!({ "jsonrpc": "2.0", "id": id, "result": response_body });
        write_message(&mut server, &response).await.unwrap();
    }

    #[tokio::test]
    async fn execute_parses_a_filled_swap_result() {
        let (client_io, server_io) = tokio::io::duplex(4096);

        let response = json!({
            "isError": false,
            "content": [{ "type": "text", "text": "{\"tx_hash\":\"abc123\",\"input_amount\":\"500000000\",\"output_amount\":\"12345\"}" }],
        });
        let server_task = tokio::spawn(respond_once(server_io, response));

        let (reader, writer) = tokio::io::split(client_io);
        let client = WalletRpcClient::new(reader, writer);
        let result = ports::WalletExecutor::execute(&client, &sample_intent(), Duration::from_secs(1)).await;

        server_task.await.unwrap();
        assert_eq!(result.status, ResultStatus::Filled);
        assert_eq!(result.tx_hash.as_deref(), Some("abc123"));
        assert_eq!(result.output_amount, "12345");
    }

    #[tokio::test]
    async fn execute_surfaces_is_error_as_failed() {
        let (client_io, server_io) = tokio::io::duplex(4096);

        let response = json!({
            "isError": true,
            "content": [{ "type": "text", "text": "insufficient balance" }],
        });
        let server_task = tokio::spawn(respond_once(server_io, response));

        let (reader, writer) = tokio::io::split(client_io);
        let client = WalletRpcClient::new(reader, writer);
        let result = ports::WalletExecutor::execute(&client, &sample_intent(), Duration::from_secs(1)).await;

        server_task.await.unwrap();
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("insufficient balance"));
    }

    #[tokio::test]
    async fn execute_times_out_when_no_response_arrives() {
        let (client_io, _server_io) = tokio::io::duplex(4096);
        let (reader, writer) = tokio::io::split(client_io);
        let client = WalletRpcClient::new(reader, writer);

        let result =
            ports::WalletExecutor::execute(&client, &sample_intent(), Duration::from_millis(20)).await;
        assert_eq!(result.status, ResultStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("wallet executor call timed out"));
    }
}
