//! Error family shared by the question supply, the rewards desk and the transport.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, QuizError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QuizError {
  #[error("Remote call timed out")]
  RemoteTimeout,

  #[error("Malformed remote response: {0}")]
  RemoteMalformedResponse(String),

  #[error("Remote transport error: {0}")]
  RemoteTransportError(String),

  #[error("Permission denied: {0}")]
  PermissionDenied(String),

  #[error("Redemption failed: {0}")]
  RedemptionFailed(String),

  #[error("Not enough points: have {balance}, need {cost}")]
  InsufficientPoints { balance: u32, cost: u32 },

  #[error("A redemption is already in progress")]
  RedemptionInProgress,

  #[error("Unknown topic: {0}")]
  UnknownTopic(String),

  #[error("Unknown session: {0}")]
  UnknownSession(String),

  #[error("Unknown video: {0}")]
  UnknownVideo(String),
}

impl From<reqwest::Error> for QuizError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_timeout() {
      QuizError::RemoteTimeout
    } else if e.is_decode() {
      QuizError::RemoteMalformedResponse(e.to_string())
    } else {
      QuizError::RemoteTransportError(e.to_string())
    }
  }
}
