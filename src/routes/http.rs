//! HTTP endpoint handlers. These are thin wrappers that forward to core logic.
//! Each handler is instrumented and logs parameters and basic result info.

use std::sync::Arc;
use axum::{
  extract::{Path, State},
  http::{header, StatusCode},
  response::{IntoResponse, Response},
  Json,
};
use tracing::{info, instrument, warn};

use crate::error::QuizError;
use crate::logic::*;
use crate::protocol::*;
use crate::state::AppState;

impl IntoResponse for QuizError {
  fn into_response(self) -> Response {
    let status = match &self {
      QuizError::UnknownSession(_) | QuizError::UnknownVideo(_) => StatusCode::NOT_FOUND,
      QuizError::UnknownTopic(_) => StatusCode::BAD_REQUEST,
      QuizError::InsufficientPoints { .. } => StatusCode::PAYMENT_REQUIRED,
      QuizError::RedemptionInProgress => StatusCode::CONFLICT,
      QuizError::PermissionDenied(_) => StatusCode::FORBIDDEN,
      QuizError::RemoteTimeout => StatusCode::GATEWAY_TIMEOUT,
      QuizError::RedemptionFailed(_)
      | QuizError::RemoteMalformedResponse(_)
      | QuizError::RemoteTransportError(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(ErrorOut { error: self.to_string() })).into_response()
  }
}

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { ok: true }) }

#[instrument(level = "info", skip(state))]
pub async fn http_get_topics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(TopicsOut { topics: state.topics.as_ref().clone() })
}

#[instrument(level = "info", skip(state))]
pub async fn http_post_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  let (session_id, session) = state.create_session().await;
  let balance = points(&session).await;
  (StatusCode::CREATED, Json(SessionOut { session_id, points: balance }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<SessionStatusOut>, QuizError> {
  let session = state.get_session(&id).await?;
  Ok(Json(SessionStatusOut {
    points: points(&session).await,
    loading: session.is_loading(),
    topic_id: session.topic_id().await,
    session_id: id,
  }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_delete_session(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<StatusCode, QuizError> {
  state.remove_session(&id).await?;
  Ok(StatusCode::NO_CONTENT)
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic_id))]
pub async fn http_post_question(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<QuestionIn>,
) -> Result<Json<QuestionOut>, QuizError> {
  let session = state.get_session(&id).await?;
  let q = next_question(&state, &session, &body.topic_id).await?;
  info!(target: "quiz", session = %id, topic = %body.topic_id, question = %q.id, source = ?q.source, "HTTP question served");
  Ok(Json(to_out(&q)))
}

#[instrument(level = "info", skip(state, body), fields(index = body.index))]
pub async fn http_post_answer(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<AnswerIn>,
) -> Result<Response, QuizError> {
  let session = state.get_session(&id).await?;
  match submit_answer(&session, body.index).await {
    Some((outcome, points)) => {
      info!(target: "quiz", session = %id, correct = outcome.correct, points, "HTTP answer evaluated");
      Ok(Json(to_answer_out(&outcome, points)).into_response())
    }
    None => {
      warn!(target: "quiz", session = %id, "HTTP answer ignored: no open question");
      Ok((StatusCode::CONFLICT, Json(ErrorOut { error: "No open question to answer.".into() })).into_response())
    }
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_get_points(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Json<PointsOut>, QuizError> {
  let session = state.get_session(&id).await?;
  Ok(Json(PointsOut { points: points(&session).await }))
}

#[instrument(level = "info", skip(state, body), fields(prompt_len = body.prompt.len()))]
pub async fn http_post_redeem(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<RedeemIn>,
) -> Result<Json<RedeemOut>, QuizError> {
  let session = state.get_session(&id).await?;
  let video = redeem(&state, &session, &body.prompt).await?;
  info!(target: "rewards", session = %id, points = video.balance, "HTTP reward redeemed");
  Ok(Json(RedeemOut { video_uri: video.uri, points: video.balance }))
}

#[instrument(level = "info", skip(state, body), fields(text_len = body.text.len()))]
pub async fn http_post_tutor(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
  Json(body): Json<TutorIn>,
) -> Result<Json<TutorOut>, QuizError> {
  let session = state.get_session(&id).await?;
  let text = ask_tutor(&state, &session, &body.text).await;
  Ok(Json(TutorOut { text }))
}

/// Stream a delivered reward video to the browser; the upstream file needs the API key.
#[instrument(level = "info", skip(state))]
pub async fn http_get_video(
  State(state): State<Arc<AppState>>,
  Path(id): Path<String>,
) -> Result<Response, QuizError> {
  let file = fetch_video(&state, &id).await?;
  info!(target: "rewards", video = %id, size = file.bytes.len(), "HTTP reward video served");
  Ok(([(header::CONTENT_TYPE, file.content_type)], file.bytes).into_response())
}
