//! Application state: topic catalogue, fallback bank, remote services, and learner sessions.
//!
//! This module owns:
//!   - the topic catalogue (static topics + the mixed topic)
//!   - the fallback bank (seeds + TOML extras, read-only after startup)
//!   - the prompts and quiz settings (from TOML or defaults)
//!   - optional Gemini-backed generators
//!   - in-memory learner sessions (quiz flow + points ledger), until deleted or process exit
//!   - the proxy table for delivered reward videos

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::config::{load_agent_config_from_env, AgentConfig, QuizSettings};
use crate::domain::{Topic, TopicCategory};
use crate::error::{QuizError, Result};
use crate::fallback::FallbackBank;
use crate::gemini::Gemini;
use crate::ledger::PointsLedger;
use crate::quiz::QuizSession;
use crate::remote::{QuestionGenerator, TutorResponder, VideoGenerator};
use crate::seeds::{mixed_topic, seed_topics};
use crate::supply::QuestionSupply;

/// One learner. Quiz flow, active topic and points sit behind separate locks
/// so a slow question fetch never blocks points, answers or the tutor.
pub struct LearnerSession {
    pub quiz: Mutex<QuizSession>,
    pub topic: RwLock<Option<Topic>>,
    pub ledger: Arc<Mutex<PointsLedger>>,
    loading: AtomicBool,
}

impl LearnerSession {
    /// True while a question is being fetched for this learner.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Mark the learner as loading until the returned guard drops.
    pub fn begin_loading(&self) -> LoadingGuard<'_> {
        self.loading.store(true, Ordering::SeqCst);
        LoadingGuard(&self.loading)
    }

    pub async fn topic_id(&self) -> Option<String> {
        self.topic.read().await.as_ref().map(|t| t.id.clone())
    }
}

pub struct LoadingGuard<'a>(&'a AtomicBool);

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Remote collaborators; each is optional so the app works offline.
#[derive(Clone, Default)]
pub struct Services {
    pub questions: Option<Arc<dyn QuestionGenerator>>,
    pub videos: Option<Arc<dyn VideoGenerator>>,
    pub tutor: Option<Arc<dyn TutorResponder>>,
}

#[derive(Clone)]
pub struct AppState {
    pub topics: Arc<Vec<Topic>>,
    pub bank: Arc<FallbackBank>,
    pub settings: QuizSettings,
    pub services: Services,
    pub sessions: Arc<RwLock<HashMap<String, Arc<LearnerSession>>>>,
    /// Proxy id -> generated file URI for delivered reward videos.
    pub reward_videos: Arc<RwLock<HashMap<String, String>>>,
}

impl AppState {
    /// Build state from env: load config, build the fallback bank, init Gemini.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_agent_config_from_env().unwrap_or_default();

        let services = match Gemini::from_env(cfg.prompts.clone()) {
            Some(g) => {
                info!(target: "mathquiz_backend", base_url = %g.base_url, text_model = %g.text_model, video_model = %g.video_model, "Gemini enabled.");
                let g = Arc::new(g);
                Services {
                    questions: Some(g.clone()),
                    videos: Some(g.clone()),
                    tutor: Some(g),
                }
            }
            None => {
                info!(target: "mathquiz_backend", "Gemini disabled (no GEMINI_API_KEY). Questions come from the fallback bank.");
                Services::default()
            }
        };

        Self::with_services(&cfg, services)
    }

    /// Deterministic constructor used by `new` and by tests.
    pub fn with_services(cfg: &AgentConfig, services: Services) -> Self {
        let bank = FallbackBank::from_seeds_and_config(&cfg.fallback_questions);
        for c in TopicCategory::ALL {
            info!(target: "quiz", category = ?c, questions = bank.bucket(c).len(), "Startup fallback inventory");
        }

        let mut topics = seed_topics();
        topics.push(mixed_topic());

        Self {
            topics: Arc::new(topics),
            bank: Arc::new(bank),
            settings: cfg.quiz.clone(),
            services,
            sessions: Arc::new(RwLock::new(HashMap::new())),
            reward_videos: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn find_topic(&self, id: &str) -> Result<Topic> {
        self.topics
            .iter()
            .find(|t| t.id == id)
            .cloned()
            .ok_or_else(|| QuizError::UnknownTopic(id.to_string()))
    }

    pub fn question_supply(&self) -> QuestionSupply {
        QuestionSupply::new(
            self.services.questions.clone(),
            self.bank.clone(),
            self.settings.question_timeout(),
        )
    }

    /// Fresh learner with the configured starting balance (not registered).
    pub fn new_learner(&self) -> LearnerSession {
        LearnerSession {
            quiz: Mutex::new(QuizSession::new(self.question_supply())),
            topic: RwLock::new(None),
            ledger: Arc::new(Mutex::new(PointsLedger::new(self.settings.starting_points))),
            loading: AtomicBool::new(false),
        }
    }

    /// Register a learner for the HTTP API; returns its id.
    #[instrument(level = "info", skip(self))]
    pub async fn create_session(&self) -> (String, Arc<LearnerSession>) {
        let id = Uuid::new_v4().to_string();
        let session = Arc::new(self.new_learner());
        self.sessions.write().await.insert(id.clone(), session.clone());
        info!(target: "mathquiz_backend", session = %id, "Learner session created");
        (id, session)
    }

    pub async fn get_session(&self, id: &str) -> Result<Arc<LearnerSession>> {
        self.sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| QuizError::UnknownSession(id.to_string()))
    }

    /// Forget an HTTP learner. In-flight work on the session finishes on its own.
    #[instrument(level = "info", skip(self))]
    pub async fn remove_session(&self, id: &str) -> Result<()> {
        match self.sessions.write().await.remove(id) {
            Some(_) => {
                info!(target: "mathquiz_backend", session = %id, "Learner session removed");
                Ok(())
            }
            None => Err(QuizError::UnknownSession(id.to_string())),
        }
    }

    /// Register a delivered video and return its proxy id.
    pub async fn register_video(&self, source_uri: String) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.reward_videos.write().await.insert(id.clone(), source_uri);
        id
    }

    pub async fn video_source(&self, id: &str) -> Result<String> {
        self.reward_videos
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| QuizError::UnknownVideo(id.to_string()))
    }
}
