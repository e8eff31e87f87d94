//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{Difficulty, Question, QuestionSource, Topic};
use crate::quiz::AnswerOutcome;
use crate::util::{split_math_segments, TextSegment};

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
    Ping,
    ListTopics,
    SelectTopic {
        #[serde(rename = "topicId")]
        topic_id: String,
    },
    NextQuestion,
    Answer {
        index: usize,
    },
    Points,
    Redeem {
        prompt: String,
    },
    TutorMessage {
        text: String,
    },
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
    Pong,
    Topics {
        topics: Vec<Topic>,
    },
    Question {
        question: QuestionOut,
    },
    AnswerResult {
        #[serde(flatten)]
        result: AnswerOut,
    },
    Points {
        points: u32,
    },
    RewardVideo {
        #[serde(rename = "videoUri")]
        video_uri: String,
        points: u32,
    },
    TutorReply {
        text: String,
    },
    Error {
        message: String,
    },
}

/// DTO used by both WS and HTTP for question delivery.
/// The correct index is withheld until the answer is revealed.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOut {
    pub id: String,
    pub text: String,
    pub text_segments: Vec<TextSegment>,
    pub options: Vec<String>,
    pub difficulty: Difficulty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub svg: Option<String>,
    pub source: QuestionSource,
}

/// Convert full `Question` (internal) to the public DTO.
pub fn to_out(q: &Question) -> QuestionOut {
    QuestionOut {
        id: q.id.clone(),
        text: q.text.clone(),
        text_segments: split_math_segments(&q.text),
        options: q.options.clone(),
        difficulty: q.difficulty,
        svg: q.svg.clone(),
        source: q.source,
    }
}

//
// HTTP request/response DTOs
//

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct TopicsOut {
    pub topics: Vec<Topic>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOut {
    pub session_id: String,
    pub points: u32,
}

/// Snapshot of one learner; `loading` is true while a question is on its way.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusOut {
    pub session_id: String,
    pub points: u32,
    pub loading: bool,
    pub topic_id: Option<String>,
}

#[derive(Deserialize)]
pub struct QuestionIn {
    #[serde(rename = "topicId")]
    pub topic_id: String,
}

#[derive(Deserialize)]
pub struct AnswerIn {
    pub index: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOut {
    pub correct: bool,
    pub selected: usize,
    pub correct_answer_index: usize,
    pub explanation: String,
    pub points_awarded: u32,
    pub points: u32,
}

pub fn to_answer_out(o: &AnswerOutcome, points: u32) -> AnswerOut {
    AnswerOut {
        correct: o.correct,
        selected: o.selected,
        correct_answer_index: o.correct_answer_index,
        explanation: o.explanation.clone(),
        points_awarded: o.points_awarded,
        points,
    }
}

#[derive(Serialize)]
pub struct PointsOut {
    pub points: u32,
}

#[derive(Deserialize)]
pub struct RedeemIn {
    pub prompt: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedeemOut {
    pub video_uri: String,
    pub points: u32,
}

#[derive(Deserialize)]
pub struct TutorIn {
    pub text: String,
}

#[derive(Serialize)]
pub struct TutorOut {
    pub text: String,
}

#[derive(Serialize)]
pub struct ErrorOut {
    pub error: String,
}
