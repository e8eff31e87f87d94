//! Domain models used by the backend: topics and categories, questions, and their sources.

use serde::{Deserialize, Serialize};

/// Id of the synthetic "any category" topic.
pub const MIXED_TOPIC_ID: &str = "mixed";

/// Curriculum bucket a topic belongs to. Also keys the fallback bank.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TopicCategory {
  WholeNumbers,
  Fractions,
  Geometry,
}

impl TopicCategory {
  pub const ALL: [TopicCategory; 3] = [
    TopicCategory::WholeNumbers,
    TopicCategory::Fractions,
    TopicCategory::Geometry,
  ];

  /// Lenient parse used for config files: anything unknown is `None`.
  pub fn parse(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
      "whole_numbers" => Some(TopicCategory::WholeNumbers),
      "fractions" => Some(TopicCategory::Fractions),
      "geometry" => Some(TopicCategory::Geometry),
      _ => None,
    }
  }
}

/// A learner-selectable subject area.
/// `category` is `None` only for the mixed topic.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
  pub id: String,
  pub title: String,
  pub category: Option<TopicCategory>,
  pub description: String,
}

impl Topic {
  pub fn is_mixed(&self) -> bool {
    self.id == MIXED_TOPIC_ID
  }
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
  Easy,
  #[default]
  Medium,
  Hard,
}

impl Difficulty {
  pub fn as_str(&self) -> &'static str {
    match self {
      Difficulty::Easy => "easy",
      Difficulty::Medium => "medium",
      Difficulty::Hard => "hard",
    }
  }
}

/// Where did the question come from?
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
  Generated, // produced by the remote generator
  Fallback,  // drawn from the local fallback bank
}

/// A pre-authored question without an id; ids are assigned at selection time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionTemplate {
  pub text: String,
  pub options: Vec<String>,
  pub correct_answer_index: usize,
  pub explanation: String,
  pub difficulty: Difficulty,
  pub svg: Option<String>,
}

impl QuestionTemplate {
  /// Non-empty text, non-empty options, answer index in range.
  pub fn is_well_formed(&self) -> bool {
    !self.text.trim().is_empty()
      && !self.options.is_empty()
      && self.correct_answer_index < self.options.len()
  }

  pub fn into_question(self, id: String, source: QuestionSource) -> Question {
    Question {
      id,
      text: self.text,
      options: self.options,
      correct_answer_index: self.correct_answer_index,
      explanation: self.explanation,
      difficulty: self.difficulty,
      svg: self.svg,
      source,
    }
  }
}

/// A ready-to-display multiple-choice question.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Question {
  pub id: String,
  pub text: String,
  pub options: Vec<String>,
  pub correct_answer_index: usize,
  pub explanation: String,
  pub difficulty: Difficulty,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub svg: Option<String>,
  pub source: QuestionSource,
}

impl Question {
  pub fn is_well_formed(&self) -> bool {
    !self.text.trim().is_empty()
      && !self.options.is_empty()
      && self.correct_answer_index < self.options.len()
  }
}
