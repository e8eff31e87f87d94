//! Seams to the hosted generative service.
//!
//! The question supply, the rewards desk and the tutor only see these traits;
//! `gemini::Gemini` implements all three, tests script them.

use async_trait::async_trait;

use crate::domain::Difficulty;
use crate::error::Result;

/// What the orchestrator asks the generator for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenerationRequest {
  /// Subject text: a topic title or one of the mixed prompts.
  pub subject: String,
  pub difficulty: Difficulty,
  /// Geometry questions must carry an SVG illustration.
  pub geometry: bool,
}

#[async_trait]
pub trait QuestionGenerator: Send + Sync {
  /// Raw model output; parsing and validation belong to the caller.
  async fn generate_question(&self, req: &GenerationRequest) -> Result<String>;
}

/// Handle to a long-running video job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoJob {
  pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VideoJobStatus {
  Pending,
  /// Finished; `None` when the job produced no playable output.
  Done(Option<String>),
  Failed(String),
}

/// A finished video, fetched with server-side credentials.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFile {
  pub content_type: String,
  pub bytes: Vec<u8>,
}

#[async_trait]
pub trait VideoGenerator: Send + Sync {
  async fn start_video(&self, prompt: &str) -> Result<VideoJob>;
  async fn poll_video(&self, job: &VideoJob) -> Result<VideoJobStatus>;
  /// Download the output of a finished job (the URI from `VideoJobStatus::Done`).
  async fn download_video(&self, uri: &str) -> Result<VideoFile>;
}

#[async_trait]
pub trait TutorResponder: Send + Sync {
  async fn tutor_reply(&self, context: &str, question: &str) -> Result<String>;
}
