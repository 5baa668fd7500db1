//! Streaming generation
//!
//! Provides:
//! - `Generator`: prompt in, lazy finite stream of raw text fragments out
//! - `OllamaGenerator`: NDJSON streaming from Ollama's `/api/generate`.
//!   Reasoning sent in the separate `thinking` field is re-wrapped in the
//!   think delimiters, so the splitter sees one text stream either way
//! - `ScriptedGenerator`: replays fixed fragments for tests and local runs
//!
//! Dropping a returned stream drops the HTTP response body, which closes
//! the connection and stops generation upstream.

use crate::prompt::Prompt;
use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use graphqa_common::config::{LlmConfig, PromptConfig};
use graphqa_common::errors::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Raw model output. Ends after the last fragment or the first error.
pub type TextStream = BoxStream<'static, Result<String>>;

#[async_trait]
pub trait Generator: Send + Sync {
    /// Open one streaming generation call
    async fn generate_stream(&self, prompt: &Prompt) -> Result<TextStream>;

    /// Model identifier, for logs and metrics
    fn model_name(&self) -> &str;
}

/// Create a generator based on configuration
pub fn create_generator(config: &LlmConfig, prompt: &PromptConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaGenerator::new(config, prompt)?)),
        "mock" => Ok(Arc::new(ScriptedGenerator::demo())),
        other => Err(AppError::Configuration {
            message: format!("Unknown llm provider: {}", other),
        }),
    }
}

// ============================================================================
// Ollama
// ============================================================================

pub struct OllamaGenerator {
    client: reqwest::Client,
    url: String,
    model: String,
    temperature: f32,
    num_ctx: u32,
    connect_timeout: Duration,
    idle_timeout: Duration,
    think: bool,
    think_start: String,
    think_end: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    think: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_ctx: u32,
}

#[derive(Deserialize)]
struct GenerateChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    thinking: String,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

impl OllamaGenerator {
    pub fn new(config: &LlmConfig, prompt: &PromptConfig) -> Result<Self> {
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self {
            client,
            url: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            num_ctx: config.num_ctx,
            connect_timeout,
            idle_timeout: Duration::from_secs(config.idle_timeout_secs),
            think: config.think,
            think_start: prompt.think_start.clone(),
            think_end: prompt.think_end.clone(),
        })
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate_stream(&self, prompt: &Prompt) -> Result<TextStream> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: &prompt.text,
            stream: true,
            think: self.think,
            options: GenerateOptions {
                temperature: self.temperature,
                num_ctx: self.num_ctx,
            },
        };

        let send = self.client.post(&self.url).json(&request).send();
        let response = tokio::time::timeout(self.connect_timeout, send)
            .await
            .map_err(|_| AppError::ModelTimeout {
                timeout_ms: self.connect_timeout.as_millis() as u64,
            })?
            .map_err(|e| AppError::ModelUnavailable {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ModelUnavailable {
                message: format!("API error {}: {}", status, body),
            });
        }

        tracing::debug!(model = %self.model, fingerprint = %prompt.fingerprint, "Generation stream opened");

        let body = response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed();
        let thinking = ThinkingWrap::new(&self.think_start, &self.think_end);
        Ok(ndjson_fragments(body, self.idle_timeout, thinking))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

struct NdjsonState {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    idle_timeout: Duration,
    thinking: ThinkingWrap,
    finished: bool,
}

struct Line {
    thinking: String,
    response: String,
    done: bool,
}

/// Puts the `thinking` field back inline between the delimiters
struct ThinkingWrap {
    start: String,
    end: String,
    open: bool,
}

impl ThinkingWrap {
    fn new(start: &str, end: &str) -> Self {
        Self {
            start: start.to_string(),
            end: end.to_string(),
            open: false,
        }
    }

    fn wrap(&mut self, line: Line) -> String {
        let mut out = String::new();
        if !line.thinking.is_empty() {
            if !self.open {
                out.push_str(&self.start);
                self.open = true;
            }
            out.push_str(&line.thinking);
        }
        if self.open && (!line.response.is_empty() || line.done) {
            out.push_str(&self.end);
            self.open = false;
        }
        out.push_str(&line.response);
        out
    }
}

/// Decode an NDJSON body into text fragments.
///
/// Lines are split on raw bytes so multibyte characters cut across
/// network chunks survive intact.
fn ndjson_fragments(
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    idle_timeout: Duration,
    thinking: ThinkingWrap,
) -> TextStream {
    let state = NdjsonState {
        body: body.fuse().boxed(),
        buffer: Vec::new(),
        idle_timeout,
        thinking,
        finished: false,
    };

    stream::unfold(state, |mut st| async move {
        loop {
            if st.finished {
                return None;
            }

            if let Some(pos) = st.buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = st.buffer.drain(..=pos).collect();
                match parse_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(line)) => {
                        let done = line.done;
                        let text = st.thinking.wrap(line);
                        if done {
                            st.finished = true;
                            if text.is_empty() {
                                return None;
                            }
                            return Some((Ok(text), st));
                        }
                        if text.is_empty() {
                            continue;
                        }
                        return Some((Ok(text), st));
                    }
                    Err(e) => {
                        st.finished = true;
                        return Some((Err(e), st));
                    }
                }
            }

            let next = tokio::time::timeout(st.idle_timeout, st.body.next()).await;
            match next {
                Err(_) => {
                    st.finished = true;
                    let err = AppError::ModelTimeout {
                        timeout_ms: st.idle_timeout.as_millis() as u64,
                    };
                    return Some((Err(err), st));
                }
                Ok(Some(Ok(bytes))) => st.buffer.extend_from_slice(&bytes),
                Ok(Some(Err(e))) => {
                    st.finished = true;
                    let err = AppError::ModelUnavailable {
                        message: format!("Stream interrupted: {}", e),
                    };
                    return Some((Err(err), st));
                }
                Ok(None) if st.buffer.iter().any(|b| !b.is_ascii_whitespace()) => {
                    // Final line without a trailing newline
                    st.buffer.push(b'\n');
                }
                Ok(None) => {
                    st.finished = true;
                    let err = AppError::ModelUnavailable {
                        message: "Stream closed before completion".to_string(),
                    };
                    return Some((Err(err), st));
                }
            }
        }
    })
    .boxed()
}

fn parse_line(line: &[u8]) -> Result<Option<Line>> {
    let line = std::str::from_utf8(line).map_err(|_| AppError::ModelUnavailable {
        message: "Invalid UTF-8 in stream".to_string(),
    })?;
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: GenerateChunk = serde_json::from_str(line).map_err(|e| AppError::ModelUnavailable {
        message: format!("Malformed stream chunk: {}", e),
    })?;

    if let Some(error) = chunk.error {
        return Err(AppError::ModelUnavailable { message: error });
    }

    Ok(Some(Line {
        thinking: chunk.thinking,
        response: chunk.response,
        done: chunk.done,
    }))
}

// ============================================================================
// Scripted
// ============================================================================

/// How a scripted stream ends
#[derive(Debug, Clone)]
pub enum ScriptEnd {
    Complete,
    Unavailable(String),
    Timeout,
}

/// Replays a fixed list of fragments
pub struct ScriptedGenerator {
    fragments: Vec<String>,
    end: ScriptEnd,
    fail_on_open: bool,
    delay: Duration,
    open_streams: Arc<AtomicUsize>,
}

const DEMO_TRANSCRIPT: &str = "<think>\nThe question should be answered from the related \
entries in the context. I will summarise the most relevant ones.\n</think>\n\n\
This answer comes from the scripted generator. Set `llm.provider` to `ollama` \
to stream from a real model.";

impl ScriptedGenerator {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
            end: ScriptEnd::Complete,
            fail_on_open: false,
            delay: Duration::ZERO,
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Canned reasoning and answer in small fragments
    pub fn demo() -> Self {
        let chars: Vec<char> = DEMO_TRANSCRIPT.chars().collect();
        Self::new(chars.chunks(6).map(|c| c.iter().collect::<String>())).with_delay(Duration::from_millis(15))
    }

    pub fn ending_with(mut self, end: ScriptEnd) -> Self {
        self.end = end;
        self
    }

    pub fn failing_on_open(mut self) -> Self {
        self.fail_on_open = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Streams handed out and not yet dropped
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }
}

/// Decrements the open-stream count when the stream is dropped
struct OpenGuard(Arc<AtomicUsize>);

impl Drop for OpenGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate_stream(&self, _prompt: &Prompt) -> Result<TextStream> {
        if self.fail_on_open {
            return Err(AppError::ModelUnavailable {
                message: "scripted failure".to_string(),
            });
        }

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        let guard = OpenGuard(self.open_streams.clone());

        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        match &self.end {
            ScriptEnd::Complete => {}
            ScriptEnd::Unavailable(message) => items.push(Err(AppError::ModelUnavailable {
                message: message.clone(),
            })),
            ScriptEnd::Timeout => items.push(Err(AppError::ModelTimeout { timeout_ms: 0 })),
        }

        let delay = self.delay;
        let stream = stream::unfold((items.into_iter(), guard), move |(mut items, guard)| async move {
            let item = items.next()?;
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Some((item, (items, guard)))
        });

        Ok(stream.boxed())
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
