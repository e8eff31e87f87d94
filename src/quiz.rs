//! Per-learner quiz flow: the current question, its answer state, and a
//! single-slot prefetch of the next question.
//!
//! The prefetch slot holds at most one background fetch, tagged with the topic
//! it was started for. It is replaced on every request cycle. A slot for another
//! topic is dropped, which detaches the task (it is never aborted).

use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::{Question, Topic};
use crate::supply::QuestionSupply;

/// Points for a correct answer.
pub const REWARD_POINTS: u32 = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnswerState {
  Answering,
  Revealed { selected: usize, correct: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
  pub correct: bool,
  pub selected: usize,
  pub correct_answer_index: usize,
  pub explanation: String,
  pub points_awarded: u32,
}

struct Prefetch {
  topic_id: String,
  handle: JoinHandle<Question>,
}

pub struct QuizSession {
  supply: QuestionSupply,
  current: Option<Question>,
  answer: AnswerState,
  prefetch: Option<Prefetch>,
}

impl QuizSession {
  pub fn new(supply: QuestionSupply) -> Self {
    Self { supply, current: None, answer: AnswerState::Answering, prefetch: None }
  }

  pub fn current(&self) -> Option<&Question> {
    self.current.as_ref()
  }

  #[cfg(test)]
  fn answer_state(&self) -> AnswerState {
    self.answer
  }

  #[cfg(test)]
  fn prefetch_topic(&self) -> Option<&str> {
    self.prefetch.as_ref().map(|p| p.topic_id.as_str())
  }

  /// Deliver the next question for `topic`, then start prefetching the one after it.
  #[instrument(level = "info", skip(self, topic), fields(topic = %topic.id))]
  pub async fn request_question(&mut self, topic: &Topic, is_initial_load: bool) -> Question {
    self.answer = AnswerState::Answering;

    let pending = self.prefetch.take();
    let question = match pending {
      Some(p) if !is_initial_load && p.topic_id == topic.id => match p.handle.await {
        Ok(q) => {
          debug!(target: "quiz", topic = %topic.id, id = %q.id, "Serving prefetched question");
          q
        }
        Err(e) => {
          warn!(target: "quiz", topic = %topic.id, error = %e, "Prefetch failed; fetching fresh");
          self.supply.fetch_with_fallback(topic).await
        }
      },
      stale => {
        if let Some(p) = stale {
          debug!(target: "quiz", stale_topic = %p.topic_id, topic = %topic.id, "Discarding prefetch");
        }
        self.supply.fetch_with_fallback(topic).await
      }
    };

    self.current = Some(question.clone());
    self.start_prefetch(topic);
    info!(target: "quiz", topic = %topic.id, id = %question.id, source = ?question.source, "Question delivered");
    question
  }

  fn start_prefetch(&mut self, topic: &Topic) {
    let supply = self.supply.clone();
    let t = topic.clone();
    let handle = tokio::spawn(async move { supply.fetch_with_fallback(&t).await });
    self.prefetch = Some(Prefetch { topic_id: topic.id.clone(), handle });
  }

  /// First selection reveals the answer; later selections are ignored until the
  /// next question. `on_correct` runs once, with `REWARD_POINTS`, on a correct pick.
  pub fn select_answer(&mut self, index: usize, on_correct: impl FnOnce(u32)) -> Option<AnswerOutcome> {
    let q = self.current.as_ref()?;
    if self.answer != AnswerState::Answering {
      return None;
    }
    let correct = index == q.correct_answer_index;
    self.answer = AnswerState::Revealed { selected: index, correct };
    let points_awarded = if correct {
      on_correct(REWARD_POINTS);
      REWARD_POINTS
    } else {
      0
    };
    info!(target: "quiz", id = %q.id, selected = index, correct, "Answer evaluated");
    Some(AnswerOutcome {
      correct,
      selected: index,
      correct_answer_index: q.correct_answer_index,
      explanation: q.explanation.clone(),
      points_awarded,
    })
  }
}
