use std::time::Duration;

use anyhow::{Error, Result, bail};
use async_stream::try_stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::ai::gateway::FragmentStream;

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Part {
    #[serde(default)]
    pub text: String,
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    pub fn new(role: Role, text: &str) -> Self {
        Self {
            role: Some(role),
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    /// System instructions are sent without a role.
    pub fn instruction(text: &str) -> Self {
        Self {
            role: None,
            parts: vec![Part {
                text: text.to_string(),
            }],
        }
    }

    pub fn text(&self) -> String {
        self.parts.iter().map(|p| p.text.as_str()).collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    #[allow(dead_code)]
    finish_reason: Option<String>,
}

// Object {
//     "candidates": Array [
//         Object {
//             "content": Object {
//                 "parts": Array [ Object { "text": String("Hel") } ],
//                 "role": String("model")
//             },
//             "finishReason": String("STOP")
//         }
//     ],
//     "usageMetadata": Object { ... }
// }
#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<Value>,
}

impl GenerateContentResponse {
    fn text(&self) -> Result<String, Error> {
        if let Some(err) = &self.error {
            bail!("Gemini returned an error: {}", err);
        }
        Ok(self
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(Content::text)
            .unwrap_or_default())
    }
}

fn payload(contents: &[Content], system_instruction: &Option<Content>) -> Value {
    let mut payload = json!({ "contents": contents });
    if let Some(instruction) = system_instruction {
        payload["systemInstruction"] = json!(instruction);
    }
    payload
}

fn model_url(api_hostname: &str, model: &str, method: &str) -> String {
    format!(
        "{}/v1beta/models/{}:{}",
        api_hostname.trim_end_matches("/"),
        model,
        method
    )
}

pub async fn generate_content(
    contents: &[Content],
    system_instruction: &Option<Content>,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<String, Error> {
    let url = model_url(api_hostname, model, "generateContent");
    let response: GenerateContentResponse = reqwest::Client::new()
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 2))
        .json(&payload(contents, system_instruction))
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    response.text()
}

/// Removes the next complete SSE event from `buffer`. Events are
/// separated by a blank line; both `\n\n` and `\r\n\r\n` are accepted.
fn next_event(buffer: &mut Vec<u8>) -> Option<String> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n").map(|i| (i, 2));
    let crlf = buffer
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|i| (i, 4));
    let (end, sep_len) = match (lf, crlf) {
        (Some(a), Some(b)) => {
            if a.0 < b.0 {
                a
            } else {
                b
            }
        }
        (Some(a), None) => a,
        (None, Some(b)) => b,
        (None, None) => return None,
    };
    let event: Vec<u8> = buffer.drain(..end + sep_len).take(end).collect();
    Some(String::from_utf8_lossy(&event).into_owned())
}

/// The joined `data:` lines of an event, if it has any.
fn event_data(event: &str) -> Option<String> {
    let data: Vec<&str> = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim)
        .collect();
    if data.is_empty() {
        None
    } else {
        Some(data.join("\n"))
    }
}

fn parse_fragment(data: &str) -> Result<String, Error> {
    let chunk = serde_json::from_str::<GenerateContentResponse>(data)
        .inspect_err(|e| tracing::error!("Parsing stream chunk failed for {}\nError:{}", data, e))?;
    chunk.text()
}

/// Streams the reply text of a `streamGenerateContent` call as it
/// arrives. The request is sent before returning so connection and
/// HTTP status errors are reported here rather than in the stream.
pub async fn stream_generate_content(
    contents: &[Content],
    system_instruction: &Option<Content>,
    api_hostname: &str,
    api_key: &str,
    model: &str,
) -> Result<FragmentStream, Error> {
    let url = format!(
        "{}?alt=sse",
        model_url(api_hostname, model, "streamGenerateContent")
    );
    let response = reqwest::Client::new()
        .post(url)
        .header("x-goog-api-key", api_key)
        .header("Content-Type", "application/json")
        .timeout(Duration::from_secs(60 * 5))
        .json(&payload(contents, system_instruction))
        .send()
        .await?
        .error_for_status()?;

    let stream = try_stream! {
        let mut bytes = response.bytes_stream();
        // Raw bytes are buffered so that multi-byte characters and SSE
        // events split across network frames are reassembled first
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            buffer.extend_from_slice(&chunk?);

            while let Some(event) = next_event(&mut buffer) {
                let Some(data) = event_data(&event) else {
                    continue;
                };
                if data.is_empty() || data == "[DONE]" {
                    continue;
                }
                let text = parse_fragment(&data)?;
                if !text.is_empty() {
                    yield text;
                }
            }
        }

        // Servers may close without a trailing blank line
        if let Some(data) = event_data(&String::from_utf8_lossy(&buffer))
            && !data.is_empty()
        {
            let text = parse_fragment(&data)?;
            if !text.is_empty() {
                yield text;
            }
        }
    };

    Ok(stream.boxed())
}
