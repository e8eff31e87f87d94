//! WebSocket upgrade + message loop. Each connection is one learner session.
//! Each client message is parsed as JSON and forwarded to core logic; we reply
//! with a single JSON message per request.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tracing::{debug, error, info, instrument};

use crate::logic::*;
use crate::protocol::{to_answer_out, to_out, ClientWsMessage, ServerWsMessage};
use crate::state::{AppState, LearnerSession};

#[instrument(level = "info", skip(ws, state))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
  info!(target: "mathquiz_backend", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, state))
}

#[instrument(level = "info", skip(socket, state))]
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
  info!(target: "mathquiz_backend", "WebSocket connected");
  let session = state.new_learner();

  while let Some(Ok(msg)) = socket.recv().await {
    match msg {
      Message::Text(txt) => {
        // Parse, dispatch, serialize response.
        let reply_msg = match serde_json::from_str::<ClientWsMessage>(&txt) {
          Ok(incoming) => {
            debug!(target: "mathquiz_backend", "WS received: {:?}", &incoming);
            handle_client_ws(incoming, &state, &session).await
          }
          Err(e) => ServerWsMessage::Error { message: format!("Invalid JSON: {}", e) },
        };

        let out = serde_json::to_string(&reply_msg).unwrap_or_else(|e| {
          serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
        });

        if let Err(e) = socket.send(Message::Text(out)).await {
          error!(target: "mathquiz_backend", error = %e, "WS send error");
          break;
        }
      }
      Message::Ping(payload) => { let _ = socket.send(Message::Pong(payload)).await; }
      Message::Close(_) => break,
      _ => {}
    }
  }
  info!(target: "mathquiz_backend", "WebSocket disconnected");
}

#[instrument(level = "info", skip(state, session))]
async fn handle_client_ws(msg: ClientWsMessage, state: &AppState, session: &LearnerSession) -> ServerWsMessage {
  match msg {
    ClientWsMessage::Ping => ServerWsMessage::Pong,

    ClientWsMessage::ListTopics => ServerWsMessage::Topics { topics: state.topics.as_ref().clone() },

    ClientWsMessage::SelectTopic { topic_id } => match next_question(state, session, &topic_id).await {
      Ok(q) => {
        info!(target: "quiz", topic = %topic_id, id = %q.id, source = ?q.source, "WS question served");
        ServerWsMessage::Question { question: to_out(&q) }
      }
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::NextQuestion => match continue_quiz(state, session).await {
      Some(q) => ServerWsMessage::Question { question: to_out(&q) },
      None => ServerWsMessage::Error { message: "Select a topic first.".into() },
    },

    ClientWsMessage::Answer { index } => match submit_answer(session, index).await {
      Some((outcome, points)) => {
        info!(target: "quiz", correct = outcome.correct, points, "WS answer evaluated");
        ServerWsMessage::AnswerResult { result: to_answer_out(&outcome, points) }
      }
      None => ServerWsMessage::Error { message: "No open question to answer.".into() },
    },

    ClientWsMessage::Points => ServerWsMessage::Points { points: points(session).await },

    ClientWsMessage::Redeem { prompt } => match redeem(state, session, &prompt).await {
      Ok(video) => ServerWsMessage::RewardVideo { video_uri: video.uri, points: video.balance },
      Err(e) => ServerWsMessage::Error { message: e.to_string() },
    },

    ClientWsMessage::TutorMessage { text } => {
      let reply = ask_tutor(state, session, &text).await;
      ServerWsMessage::TutorReply { text: reply }
    }
  }
}
