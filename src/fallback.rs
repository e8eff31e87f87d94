//! Local fallback bank: pre-authored questions keyed by category.
//!
//! Built once at startup from the built-in seeds plus any TOML extras, then
//! only read. Every draw assigns a fresh `local-…` id.

use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::FallbackQuestionCfg;
use crate::domain::{Question, QuestionSource, QuestionTemplate, Topic, TopicCategory};
use crate::seeds::seed_fallback_questions;

#[derive(Clone, Debug)]
pub struct FallbackBank {
  buckets: HashMap<TopicCategory, Vec<QuestionTemplate>>,
}

impl FallbackBank {
  pub fn new(buckets: HashMap<TopicCategory, Vec<QuestionTemplate>>) -> Self {
    Self { buckets }
  }

  /// Built-in seeds followed by the well-formed config extras.
  pub fn from_seeds_and_config(extras: &[FallbackQuestionCfg]) -> Self {
    let mut buckets: HashMap<TopicCategory, Vec<QuestionTemplate>> =
      seed_fallback_questions().into_iter().collect();
    for cfg in extras {
      match cfg.to_template() {
        Some((category, t)) => buckets.entry(category).or_default().push(t),
        None => {
          error!(target: "quiz", category = %cfg.category, text = %cfg.text, "Skipping fallback entry: unknown category or malformed question.");
        }
      }
    }
    Self { buckets }
  }

  pub fn bucket(&self, category: TopicCategory) -> &[QuestionTemplate] {
    self.buckets.get(&category).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn len(&self) -> usize {
    self.buckets.values().map(Vec::len).sum()
  }

  /// Uniform draw from the category bucket; the whole-numbers bucket stands in
  /// for a missing or empty category.
  pub fn pick_for_category<R: Rng + ?Sized>(&self, category: Option<TopicCategory>, rng: &mut R) -> Question {
    let bucket = category
      .map(|c| self.bucket(c))
      .filter(|b| !b.is_empty())
      .unwrap_or_else(|| self.bucket(TopicCategory::WholeNumbers));
    let template = bucket.choose(rng).cloned().unwrap_or_else(hard_fallback_template);
    template.into_question(format!("local-{}", Uuid::new_v4()), QuestionSource::Fallback)
  }

  /// Uniform draw over the union of every bucket.
  pub fn pick_any<R: Rng + ?Sized>(&self, rng: &mut R) -> Question {
    let all: Vec<&QuestionTemplate> = TopicCategory::ALL
      .iter()
      .flat_map(|c| self.bucket(*c).iter())
      .collect();
    let template = all.choose(rng).map(|t| (*t).clone()).unwrap_or_else(hard_fallback_template);
    template.into_question(format!("local-mixed-{}", Uuid::new_v4()), QuestionSource::Fallback)
  }

  pub fn pick_for_topic<R: Rng + ?Sized>(&self, topic: &Topic, rng: &mut R) -> Question {
    let q = if topic.is_mixed() {
      self.pick_any(rng)
    } else {
      self.pick_for_category(topic.category, rng)
    };
    debug!(target: "quiz", topic = %topic.id, id = %q.id, "Fallback question selected");
    q
  }
}

/// Absolute last resort when every bucket is empty (e.g. a test bank).
fn hard_fallback_template() -> QuestionTemplate {
  QuestionTemplate {
    text: "כמה הם `2 + 2`?".into(),
    options: vec!["3".into(), "4".into(), "5".into(), "22".into()],
    correct_answer_index: 1,
    explanation: "`2 + 2 = 4`.".into(),
    difficulty: crate::domain::Difficulty::Easy,
    svg: None,
  }
}
