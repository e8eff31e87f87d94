//! Loading agent configuration (prompts, quiz tuning, extra fallback questions) from TOML.
//!
//! See `AgentConfig`, `Prompts` and `QuizSettings` for the expected schema.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::{Difficulty, QuestionTemplate, TopicCategory};
use crate::rewards::VideoPolling;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AgentConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub quiz: QuizSettings,
  #[serde(default)]
  pub fallback_questions: Vec<FallbackQuestionCfg>,
}

/// Extra fallback-bank entry accepted in TOML configuration.
#[derive(Clone, Debug, Deserialize)]
pub struct FallbackQuestionCfg {
  pub category: String,
  pub text: String,
  pub options: Vec<String>,
  pub correct_answer_index: usize,
  #[serde(default)] pub explanation: String,
  #[serde(default)] pub difficulty: Difficulty,
  #[serde(default)] pub svg: Option<String>,
}

impl FallbackQuestionCfg {
  /// Validated conversion; `None` when the entry cannot be shown to a learner.
  pub fn to_template(&self) -> Option<(TopicCategory, QuestionTemplate)> {
    let category = TopicCategory::parse(&self.category)?;
    let t = QuestionTemplate {
      text: self.text.clone(),
      options: self.options.clone(),
      correct_answer_index: self.correct_answer_index,
      explanation: self.explanation.clone(),
      difficulty: self.difficulty,
      svg: self.svg.clone().filter(|s| !s.trim().is_empty()),
    };
    t.is_well_formed().then_some((category, t))
  }
}

/// Timeouts, polling cadence and the learner's starting balance.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct QuizSettings {
  pub question_timeout_secs: u64,
  pub video_poll_secs: u64,
  /// A video job still pending after this many polls is given up on.
  pub video_max_polls: u32,
  pub starting_points: u32,
}

impl Default for QuizSettings {
  fn default() -> Self {
    Self { question_timeout_secs: 12, video_poll_secs: 5, video_max_polls: 60, starting_points: 120 }
  }
}

impl QuizSettings {
  pub fn question_timeout(&self) -> Duration {
    Duration::from_secs(self.question_timeout_secs.max(1))
  }

  pub fn video_polling(&self) -> VideoPolling {
    VideoPolling {
      interval: Duration::from_secs(self.video_poll_secs.max(1)),
      max_polls: self.video_max_polls.max(1),
    }
  }
}

/// Prompts sent to the remote model. Defaults target 4th graders in Hebrew.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  /// Placeholders: {topic_prompt}, {difficulty}, {geometry_rule}
  pub question_template: String,
  pub geometry_rule: String,
  /// Placeholder: {subject}
  pub topic_prefix: String,
  /// Placeholder: {context}
  pub tutor_system_template: String,
  /// Placeholder: {prompt}
  pub reward_video_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      question_template: r#"Create a fun, engaging multiple-choice math question for a 4th grade student in Israel.
{topic_prompt}
Difficulty: {difficulty}
Language: Hebrew.

IMPORTANT FORMATTING RULES:
1. Enclose ALL mathematical formulas, equations, or number expressions in backticks (`) to ensure they stay on one line. Example: "Calculate `50 + 20`".
2. {geometry_rule}

You MUST return the result as a valid JSON object.
Do not include any text outside the JSON object.

JSON Structure:
{
  "text": "The question text in Hebrew. Formulas inside backticks.",
  "options": ["Option 1", "Option 2", "Option 3", "Option 4"],
  "correctAnswerIndex": 0,
  "explanation": "Brief explanation in Hebrew",
  "svg": "<svg...>...</svg>"
}"#
      .into(),
      geometry_rule: "This is a GEOMETRY question: you MUST provide a simple, clean 200x200px SVG string in the \"svg\" field illustrating the shape or angle.".into(),
      topic_prefix: "Topic: {subject}".into(),
      tutor_system_template: "You are a friendly, encouraging private math tutor for a 4th grade student.\nThe student is learning: {context}.\nAnswer in Hebrew. Be concise, fun, and use emojis.\nIf the question is about real-world examples, use Google Search to find interesting facts.".into(),
      reward_video_template: "A cute, fun, 4th-grade appropriate animation: {prompt}. Cartoon style, bright colors.".into(),
    }
  }
}

pub fn parse_agent_config(s: &str) -> Result<AgentConfig, toml::de::Error> {
  toml::from_str::<AgentConfig>(s)
}

/// Attempt to load `AgentConfig` from AGENT_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_agent_config_from_env() -> Option<AgentConfig> {
  let path = std::env::var("AGENT_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_agent_config(&s) {
      Ok(cfg) => {
        info!(target: "mathquiz_backend", %path, extra_fallbacks = cfg.fallback_questions.len(), "Loaded agent config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "mathquiz_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "mathquiz_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
