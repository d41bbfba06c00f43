use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

use crate::i18n::tr;
use crate::settings::BackendSettings;
use crate::translate::{Example, TranslationDetails, TranslationResult};

const CHAT_COMPLETIONS_PATH: &str = "chat/completions";
const USER_AGENT_VALUE: &str = concat!("hoverlens/", env!("CARGO_PKG_VERSION"));
const MAX_ERROR_BODY_PREVIEW: usize = 300;
const MAX_PLAIN_REPLY_CHARS: usize = 500;
const TEMPERATURE: f32 = 1.0;
const MAX_TOKENS: u32 = 300;

/// System instruction requesting the fixed JSON reply shape.
const SYSTEM_PROMPT_JA: &str = "请将用户输入的日语内容翻译成地道的中文。\
请按以下格式提供翻译结果(仅返回JSON格式，不要添加任何额外文本):\n\
{\n\
  \"translation\": \"完整的中文翻译\",\n\
  \"pronunciation\": \"假名读音\",\n\
  \"keywords\": [\n\
    {\"word\": \"关键词\", \"meaning\": \"中文释义\", \"reading\": \"假名读音\"}\n\
  ],\n\
  \"examples\": [\n\
    {\"japanese\": \"日语例句\", \"chinese\": \"中文翻译\"}\n\
  ]\n\
}";

/// Error information returned when a lookup request fails.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Successful lookup with the measured round-trip latency.
#[derive(Debug, Clone)]
pub struct LookupOutcome {
    pub result: TranslationResult,
    pub latency_ms: u128,
}

#[derive(Serialize)]
struct ChatCompletionPayload {
    model: String,
    messages: Vec<ChatMessagePayload>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessagePayload {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<Value>,
}

/// Fields the model is asked to produce. Everything is optional; the
/// normalization ladder copes with partial or malformed replies.
#[derive(Deserialize, Default)]
struct ModelReply {
    #[serde(default)]
    translation: String,
    #[serde(default)]
    pronunciation: String,
    #[serde(default)]
    keywords: Vec<Value>,
    #[serde(default)]
    examples: Vec<Value>,
}

/// Translate a Japanese span through the chat-completion backend.
pub fn translate_japanese(settings: &BackendSettings, text: &str) -> ApiResult<LookupOutcome> {
    if settings.api_key.trim().is_empty() {
        return Err(ApiError {
            message: "API key is not configured".to_string(),
            status: None,
        });
    }

    let payload = ChatCompletionPayload {
        model: settings.effective_model(),
        messages: vec![
            ChatMessagePayload {
                role: "system",
                content: SYSTEM_PROMPT_JA.to_string(),
            },
            ChatMessagePayload {
                role: "user",
                content: text.to_string(),
            },
        ],
        temperature: TEMPERATURE,
        max_tokens: MAX_TOKENS,
    };

    let (response, latency_ms) = execute_chat_completion(settings, &payload)?;
    let content = extract_first_choice_text(&response).ok_or_else(|| ApiError {
        message: "Missing content field".to_string(),
        status: None,
    })?;

    let reply = parse_model_reply(&content);
    Ok(LookupOutcome {
        result: normalize(text, reply),
        latency_ms,
    })
}

fn execute_chat_completion(
    settings: &BackendSettings,
    payload: &ChatCompletionPayload,
) -> ApiResult<(ChatCompletionResponse, u128)> {
    let client = build_client(settings.timeout_secs).map_err(|e| ApiError {
        message: format!("Failed to create HTTP client: {}", e),
        status: None,
    })?;
    let headers = create_headers(settings).map_err(|e| ApiError {
        message: e.to_string(),
        status: None,
    })?;

    let url = join_url(&settings.effective_base_url(), CHAT_COMPLETIONS_PATH);
    let start = Instant::now();
    let response = client
        .post(&url)
        .headers(headers)
        .json(payload)
        .send()
        .map_err(map_reqwest_error)?;

    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();
    let body = response.text().unwrap_or_default();

    if !status.is_success() {
        return Err(ApiError {
            message: format!("HTTP {} {}", status.as_u16(), preview_body(&body)),
            status: Some(status.as_u16()),
        });
    }

    let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| ApiError {
        message: format!("Failed to parse JSON: {}", e),
        status: Some(status.as_u16()),
    })?;

    Ok((parsed, elapsed_ms))
}

fn extract_first_choice_text(resp: &ChatCompletionResponse) -> Option<String> {
    resp.choices
        .first()
        .and_then(|choice| choice.message.as_ref())
        .and_then(|msg| msg.content.as_ref())
        .and_then(extract_content_value)
}

fn extract_content_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Array(parts) => {
            let mut buf = String::new();
            for part in parts {
                if let Some(text) = part.get("text").and_then(|v| v.as_str()) {
                    buf.push_str(text);
                    buf.push('\n');
                } else if let Some(text) = part.get("content").and_then(|v| v.as_str()) {
                    buf.push_str(text);
                    buf.push('\n');
                }
            }
            if buf.is_empty() {
                None
            } else {
                Some(buf.trim().to_string())
            }
        }
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(|v| v.as_str()) {
                return Some(text.trim().to_string());
            }
            if let Some(content) = map.get("content").and_then(|v| v.as_str()) {
                return Some(content.trim().to_string());
            }
            None
        }
        _ => None,
    }
}

static JSON_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());
static TRANSLATION_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""translation"\s*:\s*"([^"]*)""#).unwrap());
static PRONUNCIATION_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""pronunciation"\s*:\s*"([^"]*)""#).unwrap());

/// Recovery ladder for the model's reply: strict JSON over the
/// brace-delimited span, then regex field extraction, then the cleaned text
/// treated as the plain translation.
fn parse_model_reply(raw: &str) -> ModelReply {
    let candidate = JSON_SPAN
        .find(raw)
        .map(|m| m.as_str())
        .unwrap_or(raw);

    if let Ok(reply) = serde_json::from_str::<ModelReply>(candidate) {
        return reply;
    }
    tracing::warn!("reply is not valid JSON, attempting field recovery");

    let mut reply = ModelReply {
        translation: TRANSLATION_FIELD
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        pronunciation: PRONUNCIATION_FIELD
            .captures(raw)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default(),
        ..Default::default()
    };
    if reply.translation.is_empty() {
        reply.translation = cleanup_model_text(raw);
    }
    reply
}

/// Strip markdown fences and bound the length of a free-text reply.
fn cleanup_model_text(raw: &str) -> String {
    let stripped = raw.replace("```json", "").replace("```", "");
    stripped.trim().chars().take(MAX_PLAIN_REPLY_CHARS).collect()
}

fn normalize(original: &str, reply: ModelReply) -> TranslationResult {
    let translation = if reply.translation.trim().is_empty() {
        tr("no-translation")
    } else {
        reply.translation.trim().to_string()
    };

    let definitions = reply
        .keywords
        .iter()
        .filter_map(format_keyword)
        .collect::<Vec<_>>();

    let examples = reply
        .examples
        .iter()
        .filter_map(normalize_example)
        .filter(|ex| !ex.text.is_empty() && !ex.translation.is_empty())
        .collect::<Vec<_>>();

    TranslationResult {
        original: original.to_string(),
        translation,
        pronunciation: reply.pronunciation.trim().to_string(),
        source_language: "ja".to_string(),
        target_language: "zh".to_string(),
        details: TranslationDetails { definitions },
        examples,
        unsupported: false,
    }
}

/// `word (reading): meaning`, tolerating entries keyed `grama` instead of
/// `word` and missing fields.
fn format_keyword(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    let word = map
        .get("word")
        .or_else(|| map.get("grama"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    let meaning = map.get("meaning").and_then(|v| v.as_str()).unwrap_or("");
    let reading = map.get("reading").and_then(|v| v.as_str()).unwrap_or("");
    if word.is_empty() && meaning.is_empty() {
        return None;
    }
    if reading.is_empty() {
        Some(format!("{}: {}", word, meaning))
    } else {
        Some(format!("{} ({}): {}", word, reading, meaning))
    }
}

/// Examples arrive either as `text|translation` strings or as objects with
/// varying key names.
fn normalize_example(value: &Value) -> Option<Example> {
    match value {
        Value::String(s) => {
            let mut parts = s.splitn(2, ['|', '｜']);
            let text = parts.next().unwrap_or("").trim().to_string();
            let translation = parts.next().unwrap_or("").trim().to_string();
            Some(Example { text, translation })
        }
        Value::Object(map) => {
            let text = ["japanese", "text", "source"]
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
                .unwrap_or("");
            let translation = ["chinese", "translation", "target"]
                .iter()
                .find_map(|k| map.get(*k).and_then(|v| v.as_str()))
                .unwrap_or("");
            Some(Example {
                text: text.trim().to_string(),
                translation: translation.trim().to_string(),
            })
        }
        _ => None,
    }
}

fn build_client(timeout_secs: u64) -> anyhow::Result<Client> {
    let secs = timeout_secs.clamp(3, 120);
    Client::builder()
        .timeout(Duration::from_secs(secs))
        .build()
        .map_err(|e| anyhow::anyhow!("create HTTP client: {}", e))
}

fn create_headers(settings: &BackendSettings) -> anyhow::Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    let bearer = format!("Bearer {}", settings.api_key.trim());
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&bearer).map_err(|e| anyhow::anyhow!("invalid API key: {}", e))?,
    );
    Ok(headers)
}

fn join_url(base: &str, path: &str) -> String {
    let mut joined = base.trim_end_matches('/').to_string();
    joined.push('/');
    joined.push_str(path.trim_start_matches('/'));
    joined
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        return ApiError {
            message: "Lookup request timed out".to_string(),
            status: None,
        };
    }
    if err.is_connect() {
        return ApiError {
            message: format!("Failed to connect: {}", err),
            status: None,
        };
    }
    ApiError {
        message: format!("HTTP request failed: {}", err),
        status: err.status().map(|s| s.as_u16()),
    }
}

fn preview_body(body: &str) -> String {
    let mut out = String::new();
    let mut count = 0usize;
    let mut truncated = false;
    for ch in body.chars() {
        if count >= MAX_ERROR_BODY_PREVIEW {
            truncated = true;
            break;
        }
        out.push(ch);
        count += 1;
    }
    let trimmed = out.trim();
    if truncated {
        format!("{}…", trimmed)
    } else {
        trimmed.to_string()
    }
}
