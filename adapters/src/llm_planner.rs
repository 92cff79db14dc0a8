//! LLM `Planner` backends (§4.7, §6): an HTTP chat-completions transport
//! and a subprocess transport that writes its decision to a file. Both
//! normalize to the same `{notes, intents}` shape the adapter expects;
//! neither backend is trusted for size discipline — that is the Planner
//! Adapter's job, not this crate's.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use ports::{Planner, PlannerOutput, TokenContext};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use types::ErrorKind;

const SYSTEM_PROMPT: &str = concat!(
    "You are a trading planner. Given token contexts, respond with JSON ",
    "of the shape {\"notes\": [string], \"intents\": [{\"mint\", \"action\", ",
    "\"amount_lamports\", \"slippage_bps\"}]}. Respond with JSON only."
);

fn user_prompt(contexts: &[TokenContext], notes: &[String]) -> String {
    json!({ "contexts": contexts, "notes": notes }).to_string()
}

/// Chat-completions HTTP transport (OpenAI-compatible request/response
/// shape).
pub struct HttpLlmPlanner {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl HttpLlmPlanner {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
        }
    }
}

#[async_trait]
impl Planner for HttpLlmPlanner {
    async fn plan(
        &self,
        contexts: &[TokenContext],
        notes: &[String],
        deadline: Duration,
    ) -> Result<PlannerOutput, ErrorKind> {
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_prompt(contexts, notes) },
            ],
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = tokio::time::timeout(deadline, request.send())
            .await
            .map_err(|_| ErrorKind::PlannerUnavailable("llm request timed out".to_string()))?
            .map_err(|err| ErrorKind::PlannerUnavailable(err.to_string()))?;

        let value: Value = response
            .json()
            .await
            .map_err(|err| ErrorKind::PlannerUnavailable(err.to_string()))?;

        parse_chat_completion(&value)
    }
}

fn parse_chat_completion(value: &Value) -> Result<PlannerOutput, ErrorKind> {
    let content = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .ok_or_else(|| ErrorKind::PlannerUnavailable("missing choices[0].message.content".to_string()))?;

    parse_planner_output(content)
}

fn parse_planner_output(text: &str) -> Result<PlannerOutput, ErrorKind> {
    serde_json::from_str(text)
        .map_err(|err| ErrorKind::PlannerUnavailable(format!("unparseable planner JSON: {err}")))
}

/// Subprocess transport: spawns `command` with `args` plus a trailing
/// `--output <path>` flag, feeds it the same `{contexts, notes}` payload
/// on stdin, and reads the decision back from the file it writes (§4.7:
/// "spawning a subprocess that writes JSON to a file").
pub struct SubprocessLlmPlanner {
    command: String,
    args: Vec<String>,
}

impl SubprocessLlmPlanner {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl Planner for SubprocessLlmPlanner {
    async fn plan(
        &self,
        contexts: &[TokenContext],
        notes: &[String],
        deadline: Duration,
    ) -> Result<PlannerOutput, ErrorKind> {
        let output_path =
            std::env::temp_dir().join(format!("planner-{}.json", uuid::Uuid::new_v4()));

        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .arg("--output")
            .arg(&output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| ErrorKind::PlannerUnavailable(format!("spawn failed: {err}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            let payload = user_prompt(contexts, notes);
            let _ = stdin.write_all(payload.as_bytes()).await;
        }

        let wait_result = tokio::time::timeout(deadline, child.wait()).await;
        let result = match wait_result {
            Err(_) => {
                let _ = child.kill().await;
                Err(ErrorKind::PlannerUnavailable("subprocess timed out".to_string()))
            }
            Ok(Err(err)) => Err(ErrorKind::PlannerUnavailable(err.to_string())),
            Ok(Ok(status)) if !status.success() => Err(ErrorKind::PlannerUnavailable(format!(
                "subprocess exited with {status}"
            ))),
            Ok(Ok(_)) => {
                let bytes = tokio::fs::read(&output_path)
                    .await
                    .map_err(|err| ErrorKind::PlannerUnavailable(format!("no output file: {err}")))?;
                parse_planner_output(&String::from_utf8_lossy(&bytes))
            }
        };

        let _ = tokio::fs::remove_file(&output_path).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_chat_completion_choices_content() {
        let value = json!({
            "choices": [{ "message": { "content": "{\"notes\":[],\"intents\":[]}" } }],
        });
        let output = parse_chat_completion(&value).unwrap();
        assert!(output.intents.is_empty());
    }

    #[test]
    fn missing_choices_is_planner_unavailable() {
        let value = json!({});
        let err = parse_chat_completion(&value).unwrap_err();
        assert!(matches!(err, ErrorKind::PlannerUnavailable(_)));
    }

    #[test]
    fn unparseable_content_is_planner_unavailable() {
        let err = parse_planner_output("not json").unwrap_err();
        assert!(matches!(err, ErrorKind::PlannerUnavailable(_)));
    }

    #[tokio::test]
    async fn subprocess_planner_reads_back_the_output_file() {
        // `sh -c` writes a canned decision to the --output path it is given.
        // Final argv is `sh -c <script> --output <path>`; inside the
        // script, $1 is the first word after the script (`--output` is
        // $0, so the path the harness passed lands in $1).
        let planner = SubprocessLlmPlanner::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo '{\"notes\":[],\"intents\":[]}' > \"$1\"".to_string(),
            ],
        );
        let output = planner.plan(&[], &[], Duration::from_secs(5)).await.unwrap();
        assert!(output.intents.is_empty());
    }
}
