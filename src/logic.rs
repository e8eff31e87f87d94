//! Core behaviors shared by both HTTP and WebSocket handlers.
//!
//! This includes:
//!   - Delivering the next question for a learner's topic
//!   - Evaluating an answer and crediting the ledger
//!   - Redeeming points for a reward video and proxying its playback
//!   - Text tutor replies (remote, with a local stub)

use tracing::{debug, error, info, instrument};

use crate::domain::{Question, Topic};
use crate::error::{QuizError, Result};
use crate::quiz::AnswerOutcome;
use crate::remote::VideoFile;
use crate::rewards::{redeem_reward, RewardVideo};
use crate::state::{AppState, LearnerSession};

/// Path the front-end plays reward videos from.
pub const VIDEO_ROUTE_PREFIX: &str = "/api/v1/videos/";

/// Serve a question for `topic_id`. Picking a different topic than the
/// session's active one counts as an initial load. Only the quiz lock is held
/// while the question is fetched.
#[instrument(level = "info", skip(state, session), fields(%topic_id))]
pub async fn next_question(state: &AppState, session: &LearnerSession, topic_id: &str) -> Result<Question> {
  let topic = state.find_topic(topic_id)?;
  let mut quiz = session.quiz.lock().await;
  let is_initial_load = {
    let mut active = session.topic.write().await;
    let initial = active.as_ref().map(|t| t.id != topic.id).unwrap_or(true);
    *active = Some(topic.clone());
    initial
  };
  let _loading = session.begin_loading();
  Ok(quiz.request_question(&topic, is_initial_load).await)
}

/// Next question for the session's active topic, if one was selected.
pub async fn continue_quiz(state: &AppState, session: &LearnerSession) -> Option<Question> {
  let topic_id = session.topic_id().await?;
  next_question(state, session, &topic_id).await.ok()
}

/// Evaluate the learner's pick; `None` when there is nothing to answer,
/// including while the next question is still loading.
/// Returns the outcome and the balance after any award.
#[instrument(level = "info", skip(session))]
pub async fn submit_answer(session: &LearnerSession, index: usize) -> Option<(AnswerOutcome, u32)> {
  let mut earned = 0;
  let outcome = match session.quiz.try_lock() {
    Ok(mut quiz) => quiz.select_answer(index, |points| earned = points)?,
    Err(_) => {
      debug!(target: "quiz", "Answer ignored: question still loading");
      return None;
    }
  };

  let mut l = session.ledger.lock().await;
  let balance = if earned > 0 { l.award(earned) } else { l.balance() };
  Some((outcome, balance))
}

pub async fn points(session: &LearnerSession) -> u32 {
  session.ledger.lock().await.balance()
}

/// Redeem a reward. The returned URI points at our video proxy; the generated
/// file itself needs the API key and stays server-side.
#[instrument(level = "info", skip(state, session, prompt), fields(prompt_len = prompt.len()))]
pub async fn redeem(state: &AppState, session: &LearnerSession, prompt: &str) -> Result<RewardVideo> {
  let video = redeem_reward(
    session.ledger.clone(),
    state.services.videos.clone(),
    prompt,
    state.settings.video_polling(),
  )
  .await?;
  let id = state.register_video(video.uri).await;
  info!(target: "rewards", video = %id, "Reward video registered for playback");
  Ok(RewardVideo { uri: format!("{}{}", VIDEO_ROUTE_PREFIX, id), balance: video.balance })
}

/// Fetch a delivered reward video by proxy id.
#[instrument(level = "info", skip(state))]
pub async fn fetch_video(state: &AppState, id: &str) -> Result<VideoFile> {
  let source = state.video_source(id).await?;
  let videos = state
    .services
    .videos
    .as_ref()
    .ok_or_else(|| QuizError::RemoteTransportError("video generation is not configured".into()))?;
  videos.download_video(&source).await
}

/// Context line handed to the tutor.
pub fn tutor_context(topic: Option<&Topic>) -> String {
  match topic {
    Some(t) => format!("Topic: {}", t.title),
    None => "General Math Help".into(),
  }
}

#[instrument(level = "info", skip(state, session, question), fields(question_len = question.len()))]
pub async fn ask_tutor(state: &AppState, session: &LearnerSession, question: &str) -> String {
  let context = tutor_context(session.topic.read().await.as_ref());
  if let Some(tutor) = &state.services.tutor {
    match tutor.tutor_reply(&context, question).await {
      Ok(t) if !t.is_empty() => {
        debug!(target: "mathquiz_backend", %context, "Tutor reply via Gemini.");
        return t;
      }
      Ok(_) => error!(target: "mathquiz_backend", "Tutor reply was empty; using stub."),
      Err(e) => error!(target: "mathquiz_backend", error = %e, "Tutor reply failed; using stub."),
    }
  }
  tutor_reply_stub(question)
}

// -------- Local fallbacks --------

/// Tiny offline tutor: nudges toward the usual 4th-grade stumbling blocks.
fn tutor_reply_stub(text: &str) -> String {
  let t = text.to_lowercase();
  if t.contains("שבר") || t.contains("fraction") {
    "שבר הוא חלק משלם 🍕 המונה (למעלה) אומר כמה חלקים לקחנו, והמכנה (למטה) לכמה חלקים חילקנו את השלם.".into()
  } else if t.contains("סדר") || t.contains("order") {
    "קודם סוגריים, אחר כך כפל וחילוק, ורק בסוף חיבור וחיסור ✨".into()
  } else if t.contains("אלכסון") || t.contains("diagonal") {
    "אלכסון מחבר שני קודקודים שאינם שכנים 📐 נסו לספור מכל קודקוד לאילו קודקודים אפשר להגיע.".into()
  } else {
    "שאלה מצוינת! 🦉 נסו לפרק את התרגיל לצעדים קטנים ולבדוק כל צעד בנפרד.".into()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::AgentConfig;
  use crate::domain::QuestionSource;
  use crate::remote::{QuestionGenerator, TutorResponder, VideoJobStatus};
  use crate::rewards::tests::{as_service, ScriptedVideos};
  use crate::state::Services;
  use crate::supply::tests::{Scripted, ScriptedGenerator};
  use async_trait::async_trait;
  use std::sync::Arc;
  use std::time::Duration;

  fn offline_state() -> AppState {
    AppState::with_services(&AgentConfig::default(), Services::default())
  }

  struct EchoTutor;

  #[async_trait]
  impl TutorResponder for EchoTutor {
    async fn tutor_reply(&self, context: &str, question: &str) -> Result<String> {
      Ok(format!("{context} | {question}"))
    }
  }

  struct BrokenTutor;

  #[async_trait]
  impl TutorResponder for BrokenTutor {
    async fn tutor_reply(&self, _context: &str, _question: &str) -> Result<String> {
      Err(QuizError::RemoteTimeout)
    }
  }

  #[tokio::test]
  async fn correct_answer_credits_the_ledger() {
    let state = offline_state();
    let session = state.new_learner();
    let q = next_question(&state, &session, "basic-ops").await.unwrap();
    let (outcome, balance) = submit_answer(&session, q.correct_answer_index).await.unwrap();
    assert!(outcome.correct);
    assert_eq!(balance, 130);
    // Locked until the next question.
    assert!(submit_answer(&session, q.correct_answer_index).await.is_none());
    assert_eq!(points(&session).await, 130);
  }

  #[tokio::test]
  async fn wrong_answer_leaves_points() {
    let state = offline_state();
    let session = state.new_learner();
    let q = next_question(&state, &session, "frac-ident").await.unwrap();
    let wrong = (q.correct_answer_index + 1) % q.options.len();
    let (outcome, balance) = submit_answer(&session, wrong).await.unwrap();
    assert!(!outcome.correct);
    assert_eq!(balance, 120);
  }

  #[tokio::test]
  async fn unknown_topic_is_an_error() {
    let state = offline_state();
    let session = state.new_learner();
    let err = next_question(&state, &session, "algebra").await.unwrap_err();
    assert_eq!(err, QuizError::UnknownTopic("algebra".into()));
  }

  #[tokio::test]
  async fn continue_quiz_needs_a_topic() {
    let state = offline_state();
    let session = state.new_learner();
    assert!(continue_quiz(&state, &session).await.is_none());
    next_question(&state, &session, "mixed").await.unwrap();
    assert!(continue_quiz(&state, &session).await.is_some());
  }

  #[tokio::test]
  async fn redeem_offline_fails_without_debit() {
    let state = offline_state();
    let session = state.new_learner();
    let err = redeem(&state, &session, "rocket cat").await.unwrap_err();
    assert!(matches!(err, QuizError::RedemptionFailed(_)));
    assert_eq!(points(&session).await, 120);
  }

  #[tokio::test]
  async fn tutor_gets_topic_context() {
    let services = Services { tutor: Some(Arc::new(EchoTutor)), ..Services::default() };
    let state = AppState::with_services(&AgentConfig::default(), services);
    let session = state.new_learner();
    assert_eq!(ask_tutor(&state, &session, "help").await, "General Math Help | help");
    next_question(&state, &session, "order-ops").await.unwrap();
    assert_eq!(ask_tutor(&state, &session, "help").await, "Topic: סדר פעולות חשבון | help");
  }

  #[tokio::test]
  async fn tutor_failure_uses_stub() {
    let services = Services { tutor: Some(Arc::new(BrokenTutor)), ..Services::default() };
    let state = AppState::with_services(&AgentConfig::default(), services);
    let session = state.new_learner();
    let reply = ask_tutor(&state, &session, "מה זה שבר?").await;
    assert!(reply.contains("מונה"));
  }

  #[tokio::test(start_paused = true)]
  async fn learner_stays_responsive_while_a_question_loads() {
    let generator: Arc<dyn QuestionGenerator> = Arc::new(ScriptedGenerator::new(vec![Scripted::Hang, Scripted::Hang]));
    let services = Services { questions: Some(generator), ..Services::default() };
    let state = Arc::new(AppState::with_services(&AgentConfig::default(), services));
    let session = Arc::new(state.new_learner());

    let fetch = tokio::spawn({
      let (state, session) = (state.clone(), session.clone());
      async move { next_question(&state, &session, "basic-ops").await }
    });
    for _ in 0..3 {
      tokio::task::yield_now().await;
    }
    assert!(session.is_loading());

    let started = tokio::time::Instant::now();
    assert_eq!(points(&session).await, 120);
    assert!(submit_answer(&session, 0).await.is_none());
    assert!(!ask_tutor(&state, &session, "help").await.is_empty());
    assert_eq!(session.topic_id().await.as_deref(), Some("basic-ops"));
    assert!(started.elapsed() < Duration::from_secs(1));

    // Both attempts time out, then the bank answers.
    let q = fetch.await.unwrap().unwrap();
    assert_eq!(q.source, QuestionSource::Fallback);
    assert!(started.elapsed() >= Duration::from_secs(24));
    assert!(!session.is_loading());
  }

  #[tokio::test(start_paused = true)]
  async fn redeemed_video_is_served_through_the_proxy() {
    let videos = ScriptedVideos::ok(vec![VideoJobStatus::Done(Some("https://files/abc:download?alt=media".into()))]);
    let services = Services { videos: as_service(&videos), ..Services::default() };
    let state = AppState::with_services(&AgentConfig::default(), services);
    let session = state.new_learner();

    let video = redeem(&state, &session, "rocket cat").await.unwrap();
    assert_eq!(video.balance, 70);
    assert!(video.uri.starts_with(VIDEO_ROUTE_PREFIX));
    assert!(!video.uri.contains("files/abc"));

    let id = video.uri.trim_start_matches(VIDEO_ROUTE_PREFIX);
    let file = fetch_video(&state, id).await.unwrap();
    assert_eq!(file.content_type, "video/mp4");
    assert_eq!(file.bytes, b"MP4DATA".to_vec());
    assert_eq!(videos.downloads.lock().unwrap().clone(), vec!["https://files/abc:download?alt=media".to_string()]);
    assert!(matches!(fetch_video(&state, "unknown").await, Err(QuizError::UnknownVideo(_))));
  }
}
