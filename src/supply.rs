//! Question supply: remote generation with one retry, then the local fallback bank.
//!
//! `fetch_with_fallback` never fails. Each remote attempt is bounded by a
//! per-attempt timeout; attempts run strictly one after the other.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::domain::{Difficulty, Question, QuestionSource, QuestionTemplate, Topic, TopicCategory};
use crate::error::{QuizError, Result};
use crate::fallback::FallbackBank;
use crate::remote::{GenerationRequest, QuestionGenerator};
use crate::seeds::MIXED_PROMPTS;
use crate::util::{extract_json_object, trunc_for_log};

const MAX_ATTEMPTS: usize = 2;

/// Difficulty of every automated request.
pub const AUTO_DIFFICULTY: Difficulty = Difficulty::Medium;

#[derive(Clone)]
pub struct QuestionSupply {
  generator: Option<Arc<dyn QuestionGenerator>>,
  bank: Arc<FallbackBank>,
  attempt_timeout: Duration,
}

impl QuestionSupply {
  pub fn new(
    generator: Option<Arc<dyn QuestionGenerator>>,
    bank: Arc<FallbackBank>,
    attempt_timeout: Duration,
  ) -> Self {
    Self { generator, bank, attempt_timeout }
  }

  #[cfg(test)]
  pub(crate) fn bank(&self) -> &FallbackBank {
    &self.bank
  }

  /// Mixed topic: a random subject from the fixed list. Otherwise the topic title.
  pub fn build_request(topic: &Topic) -> GenerationRequest {
    let subject = if topic.is_mixed() {
      let mut rng = rand::thread_rng();
      MIXED_PROMPTS.choose(&mut rng).copied().unwrap_or(MIXED_PROMPTS[0]).to_string()
    } else {
      topic.title.clone()
    };
    GenerationRequest {
      subject,
      difficulty: AUTO_DIFFICULTY,
      geometry: topic.category == Some(TopicCategory::Geometry),
    }
  }

  #[instrument(level = "info", skip(self, topic), fields(topic = %topic.id))]
  pub async fn fetch_with_fallback(&self, topic: &Topic) -> Question {
    if let Some(generator) = &self.generator {
      let req = Self::build_request(topic);
      for attempt in 1..=MAX_ATTEMPTS {
        match self.attempt(generator.as_ref(), &req).await {
          Ok(q) => {
            info!(target: "quiz", topic = %topic.id, id = %q.id, attempt, "Generated question accepted");
            return q;
          }
          Err(e) if attempt < MAX_ATTEMPTS => {
            warn!(target: "quiz", topic = %topic.id, attempt, error = %e, "Question generation failed; retrying");
          }
          Err(e) => {
            warn!(target: "quiz", topic = %topic.id, attempt, error = %e, "Question generation failed; using fallback bank");
          }
        }
      }
    } else {
      warn!(target: "quiz", topic = %topic.id, "No question generator configured; using fallback bank");
    }
    let mut rng = rand::thread_rng();
    self.bank.pick_for_topic(topic, &mut rng)
  }

  async fn attempt(&self, generator: &dyn QuestionGenerator, req: &GenerationRequest) -> Result<Question> {
    let raw = tokio::time::timeout(self.attempt_timeout, generator.generate_question(req))
      .await
      .map_err(|_| QuizError::RemoteTimeout)??;
    let template = parse_generated_question(&raw, req.difficulty)?;
    Ok(template.into_question(format!("ai-{}", Uuid::new_v4()), QuestionSource::Generated))
  }
}

/// Shape the model is asked to return.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedQuestion {
  text: String,
  options: Vec<String>,
  correct_answer_index: usize,
  #[serde(default)] explanation: String,
  #[serde(default)] difficulty: Option<String>,
  #[serde(default)] svg: Option<String>,
}

/// Clean, parse and validate raw model output. Anything short of a complete,
/// consistent question is `RemoteMalformedResponse`.
pub fn parse_generated_question(raw: &str, requested: Difficulty) -> Result<QuestionTemplate> {
  let json = extract_json_object(raw);
  let g: GeneratedQuestion = serde_json::from_str(&json).map_err(|e| {
    QuizError::RemoteMalformedResponse(format!("{} in {}", e, trunc_for_log(&json, 120)))
  })?;

  if g.text.trim().is_empty() {
    return Err(QuizError::RemoteMalformedResponse("empty question text".into()));
  }
  if g.options.is_empty() {
    return Err(QuizError::RemoteMalformedResponse("no options".into()));
  }
  if g.correct_answer_index >= g.options.len() {
    return Err(QuizError::RemoteMalformedResponse(format!(
      "correctAnswerIndex {} out of range for {} options",
      g.correct_answer_index,
      g.options.len()
    )));
  }

  let difficulty = match g.difficulty.as_deref().map(str::trim) {
    Some("easy") => Difficulty::Easy,
    Some("medium") => Difficulty::Medium,
    Some("hard") => Difficulty::Hard,
    _ => requested,
  };

  Ok(QuestionTemplate {
    text: g.text,
    options: g.options,
    correct_answer_index: g.correct_answer_index,
    explanation: g.explanation,
    difficulty,
    svg: g.svg.filter(|s| !s.trim().is_empty()),
  })
}
