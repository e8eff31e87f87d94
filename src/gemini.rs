//! Minimal Gemini REST client for our use-cases.
//!
//! We call `generateContent` for questions (JSON mime type) and tutor replies
//! (plain text + search grounding), and `predictLongRunning` + operation polling
//! for reward videos. Calls log model names, latencies and token usage (not contents).
//!
//! NOTE: We never log the API key; it travels in the `x-goog-api-key` header only.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, instrument};

use crate::config::Prompts;
use crate::error::{QuizError, Result};
use crate::remote::{
  GenerationRequest, QuestionGenerator, TutorResponder, VideoFile, VideoGenerator, VideoJob, VideoJobStatus,
};
use crate::util::{fill_template, trunc_for_log};

const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub text_model: String,
  pub video_model: String,
  pub prompts: Prompts,
}

impl Gemini {
  /// Construct the client if we find GEMINI_API_KEY (or API_KEY); otherwise return None.
  pub fn from_env(prompts: Prompts) -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY")
      .or_else(|_| std::env::var("API_KEY"))
      .ok()
      .filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let text_model =
      std::env::var("GEMINI_TEXT_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into());
    let video_model =
      std::env::var("GEMINI_VIDEO_MODEL").unwrap_or_else(|_| "veo-3.1-fast-generate-preview".into());

    // Per-attempt deadlines are enforced by callers; this only bounds stuck sockets.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .ok()?;

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), text_model, video_model, prompts })
  }

  async fn post_json(&self, url: &str, body: &impl Serialize) -> Result<reqwest::Response> {
    let res = self.client.post(url)
      .header(USER_AGENT, "mathquiz-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(API_KEY_HEADER, &self.api_key)
      .json(body).send().await?;
    check_status(res).await
  }

  async fn get(&self, url: &str) -> Result<reqwest::Response> {
    let res = self.client.get(url)
      .header(USER_AGENT, "mathquiz-backend/0.1")
      .header(API_KEY_HEADER, &self.api_key)
      .send().await?;
    check_status(res).await
  }

  /// One `generateContent` round trip; returns the concatenated text parts.
  #[instrument(level = "info", skip(self, req), fields(model = %self.text_model))]
  async fn generate_content(&self, req: &GenerateContentRequest) -> Result<String> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.text_model);
    let start = std::time::Instant::now();
    let res = self.post_json(&url, req).await;
    let elapsed = start.elapsed();
    let body: GenerateContentResponse = match res {
      Ok(r) => r.json().await?,
      Err(e) => {
        error!(target: "gemini", ?elapsed, error = %e, "generateContent failed");
        return Err(e);
      }
    };
    if let Some(u) = &body.usage_metadata {
      info!(target: "gemini", ?elapsed, prompt_tokens = ?u.prompt_token_count, completion_tokens = ?u.candidates_token_count, total_tokens = ?u.total_token_count, "Gemini usage");
    }
    let text = body.text();
    if text.trim().is_empty() {
      return Err(QuizError::RemoteMalformedResponse("no text in response".into()));
    }
    Ok(text)
  }
}

/// Render the question prompt for one generation request.
pub fn build_question_prompt(prompts: &Prompts, req: &GenerationRequest) -> String {
  let topic_prompt = fill_template(&prompts.topic_prefix, &[("subject", &req.subject)]);
  let geometry_rule = if req.geometry {
    prompts.geometry_rule.as_str()
  } else {
    "If the question is about GEOMETRY, include a simple 200x200px SVG in the \"svg\" field; otherwise omit it."
  };
  fill_template(
    &prompts.question_template,
    &[
      ("topic_prompt", &topic_prompt),
      ("difficulty", req.difficulty.as_str()),
      ("geometry_rule", geometry_rule),
    ],
  )
}

#[async_trait]
impl QuestionGenerator for Gemini {
  #[instrument(level = "info", skip(self, req), fields(subject = %req.subject, difficulty = req.difficulty.as_str(), geometry = req.geometry))]
  async fn generate_question(&self, req: &GenerationRequest) -> Result<String> {
    let prompt = build_question_prompt(&self.prompts, req);
    let body = GenerateContentRequest {
      contents: vec![Content::user(prompt)],
      system_instruction: None,
      generation_config: Some(GenerationConfig {
        response_mime_type: Some("application/json".into()),
        temperature: Some(0.9),
      }),
      tools: None,
    };
    self.generate_content(&body).await
  }
}

#[async_trait]
impl TutorResponder for Gemini {
  #[instrument(level = "info", skip(self, context, question), fields(context_len = context.len(), question_len = question.len()))]
  async fn tutor_reply(&self, context: &str, question: &str) -> Result<String> {
    let system = fill_template(&self.prompts.tutor_system_template, &[("context", context)]);
    let body = GenerateContentRequest {
      contents: vec![Content::user(question.to_string())],
      system_instruction: Some(Content { role: None, parts: vec![Part { text: Some(system) }] }),
      generation_config: None,
      tools: Some(vec![json!({ "google_search": {} })]),
    };
    Ok(self.generate_content(&body).await?.trim().to_string())
  }
}

#[async_trait]
impl VideoGenerator for Gemini {
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.video_model, prompt_len = prompt.len()))]
  async fn start_video(&self, prompt: &str) -> Result<VideoJob> {
    let url = format!("{}/models/{}:predictLongRunning", self.base_url, self.video_model);
    let full_prompt = fill_template(&self.prompts.reward_video_template, &[("prompt", prompt)]);
    let body = json!({
      "instances": [{ "prompt": full_prompt }],
      "parameters": { "aspectRatio": "16:9", "resolution": "720p", "numberOfVideos": 1 }
    });
    let op: Operation = self.post_json(&url, &body).await?.json().await?;
    info!(target: "gemini", operation = %op.name, "Video job started");
    Ok(VideoJob { name: op.name })
  }

  #[instrument(level = "debug", skip(self), fields(operation = %job.name))]
  async fn poll_video(&self, job: &VideoJob) -> Result<VideoJobStatus> {
    let url = format!("{}/{}", self.base_url, job.name);
    let op: Operation = self.get(&url).await?.json().await?;
    Ok(op.status())
  }

  /// Generated file URIs need the API key; the browser gets them through our proxy.
  #[instrument(level = "info", skip(self, uri))]
  async fn download_video(&self, uri: &str) -> Result<VideoFile> {
    let res = self.get(uri).await?;
    let content_type = res.headers()
      .get(CONTENT_TYPE)
      .and_then(|v| v.to_str().ok())
      .unwrap_or("video/mp4")
      .to_string();
    let bytes = res.bytes().await?.to_vec();
    info!(target: "gemini", size = bytes.len(), %content_type, "Video downloaded");
    Ok(VideoFile { content_type, bytes })
  }
}

async fn check_status(res: reqwest::Response) -> Result<reqwest::Response> {
  let status = res.status();
  if status.is_success() {
    return Ok(res);
  }
  let body = res.text().await.unwrap_or_default();
  let msg = extract_gemini_error(&body).unwrap_or_else(|| trunc_for_log(&body, 200));
  Err(classify_http_error(status, msg))
}

fn classify_http_error(status: StatusCode, msg: String) -> QuizError {
  match status {
    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
      QuizError::PermissionDenied(format!("Gemini HTTP {}: {}", status, msg))
    }
    StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => QuizError::RemoteTimeout,
    _ => QuizError::RemoteTransportError(format!("Gemini HTTP {}: {}", status, msg)),
  }
}

/// Try to extract a clean error message from a Gemini error body.
fn extract_gemini_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}

// --- Gemini DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  system_instruction: Option<Content>,
  #[serde(skip_serializing_if = "Option::is_none")]
  generation_config: Option<GenerationConfig>,
  #[serde(skip_serializing_if = "Option::is_none")]
  tools: Option<Vec<Value>>,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  role: Option<String>,
  #[serde(default)]
  parts: Vec<Part>,
}

impl Content {
  fn user(text: String) -> Self {
    Self { role: Some("user".into()), parts: vec![Part { text: Some(text) }] }
  }
}

#[derive(Serialize, Deserialize, Default)]
struct Part {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  text: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  temperature: Option<f32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
  fn text(&self) -> String {
    self.candidates.first()
      .and_then(|c| c.content.as_ref())
      .map(|c| c.parts.iter().filter_map(|p| p.text.as_deref()).collect::<Vec<_>>().join(""))
      .unwrap_or_default()
  }
}

#[derive(Deserialize)]
struct Candidate {
  #[serde(default)] content: Option<Content>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] total_token_count: Option<u32>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Operation {
  name: String,
  #[serde(default)] done: bool,
  #[serde(default)] error: Option<OperationError>,
  #[serde(default)] response: Option<VideoResponse>,
}

#[derive(Deserialize)]
struct OperationError {
  #[serde(default)] message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResponse {
  #[serde(default)] generate_video_response: Option<GenerateVideoResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateVideoResponse {
  #[serde(default)] generated_samples: Vec<GeneratedSample>,
}

#[derive(Deserialize)]
struct GeneratedSample {
  #[serde(default)] video: Option<VideoRef>,
}

#[derive(Deserialize)]
struct VideoRef {
  #[serde(default)] uri: Option<String>,
}

impl Operation {
  fn status(&self) -> VideoJobStatus {
    if let Some(e) = &self.error {
      return VideoJobStatus::Failed(e.message.clone());
    }
    if !self.done {
      return VideoJobStatus::Pending;
    }
    let uri = self.response.as_ref()
      .and_then(|r| r.generate_video_response.as_ref())
      .and_then(|g| g.generated_samples.first())
      .and_then(|s| s.video.as_ref())
      .and_then(|v| v.uri.clone())
      .filter(|u| !u.is_empty());
    VideoJobStatus::Done(uri)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::Difficulty;

  #[test]
  fn question_prompt_fills_topic_and_difficulty() {
    let req = GenerationRequest { subject: "שברים".into(), difficulty: Difficulty::Medium, geometry: false };
    let p = build_question_prompt(&Prompts::default(), &req);
    assert!(p.contains("Topic: שברים"));
    assert!(p.contains("Difficulty: medium"));
    assert!(!p.contains("{topic_prompt}"));
    assert!(!p.contains("MUST provide"));
  }

  #[test]
  fn geometry_prompt_demands_svg() {
    let req = GenerationRequest { subject: "זוויות".into(), difficulty: Difficulty::Medium, geometry: true };
    let p = build_question_prompt(&Prompts::default(), &req);
    assert!(p.contains("MUST provide"));
  }

  #[test]
  fn response_text_joins_parts() {
    let body: GenerateContentResponse = serde_json::from_value(json!({
      "candidates": [{ "content": { "role": "model", "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } }],
      "usageMetadata": { "promptTokenCount": 10, "candidatesTokenCount": 5, "totalTokenCount": 15 }
    })).unwrap();
    assert_eq!(body.text(), "{\"a\":1}");
    assert_eq!(body.usage_metadata.unwrap().total_token_count, Some(15));
  }

  #[test]
  fn empty_candidates_give_empty_text() {
    let body: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
    assert_eq!(body.text(), "");
  }

  #[test]
  fn operation_status_mapping() {
    let pending: Operation = serde_json::from_value(json!({ "name": "operations/1" })).unwrap();
    assert_eq!(pending.status(), VideoJobStatus::Pending);

    let done: Operation = serde_json::from_value(json!({
      "name": "operations/1",
      "done": true,
      "response": { "generateVideoResponse": { "generatedSamples": [{ "video": { "uri": "https://media/v.mp4" } }] } }
    })).unwrap();
    assert_eq!(done.status(), VideoJobStatus::Done(Some("https://media/v.mp4".into())));

    let empty: Operation = serde_json::from_value(json!({ "name": "operations/1", "done": true, "response": {} })).unwrap();
    assert_eq!(empty.status(), VideoJobStatus::Done(None));

    let failed: Operation = serde_json::from_value(json!({
      "name": "operations/1", "done": true, "error": { "code": 3, "message": "unsafe prompt" }
    })).unwrap();
    assert_eq!(failed.status(), VideoJobStatus::Failed("unsafe prompt".into()));
  }

  #[test]
  fn http_errors_are_classified() {
    assert!(matches!(classify_http_error(StatusCode::FORBIDDEN, "x".into()), QuizError::PermissionDenied(_)));
    assert!(matches!(classify_http_error(StatusCode::UNAUTHORIZED, "x".into()), QuizError::PermissionDenied(_)));
    assert_eq!(classify_http_error(StatusCode::GATEWAY_TIMEOUT, "x".into()), QuizError::RemoteTimeout);
    assert!(matches!(classify_http_error(StatusCode::INTERNAL_SERVER_ERROR, "x".into()), QuizError::RemoteTransportError(_)));
  }

  #[test]
  fn gemini_error_body_is_extracted() {
    let body = r#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#;
    assert_eq!(extract_gemini_error(body).as_deref(), Some("API key not valid"));
    assert_eq!(extract_gemini_error("<html>"), None);
  }
}
