//! Reward redemption: trade points for a generated video.
//!
//! The ledger is only debited after the video job confirms a playable output
//! and the requester is still waiting for it. At most one redemption per
//! ledger is in flight; the job and its settlement run in a detached task so a
//! dropped request cannot leave the flag set.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, Mutex};
use tracing::{error, info, instrument, warn};

use crate::error::{QuizError, Result};
use crate::ledger::{PointsLedger, REDEMPTION_COST};
use crate::remote::{VideoGenerator, VideoJobStatus};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewardVideo {
  pub uri: String,
  pub balance: u32,
}

/// Poll cadence and ceiling for a video job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VideoPolling {
  pub interval: Duration,
  pub max_polls: u32,
}

#[instrument(level = "info", skip(ledger, videos, prompt), fields(prompt_len = prompt.len()))]
pub async fn redeem_reward(
  ledger: Arc<Mutex<PointsLedger>>,
  videos: Option<Arc<dyn VideoGenerator>>,
  prompt: &str,
  polling: VideoPolling,
) -> Result<RewardVideo> {
  let prompt = prompt.trim();
  if prompt.is_empty() {
    return Err(QuizError::RedemptionFailed("empty prompt".into()));
  }
  ledger.lock().await.begin_redemption(REDEMPTION_COST)?;

  let (tx, rx) = oneshot::channel();
  tokio::spawn(settle_redemption(ledger, videos, prompt.to_string(), polling, tx));
  rx.await
    .unwrap_or_else(|_| Err(QuizError::RedemptionFailed("redemption ended without a result".into())))
}

/// Run the job, clear the in-flight flag, and debit only if someone is still
/// waiting for the video.
async fn settle_redemption(
  ledger: Arc<Mutex<PointsLedger>>,
  videos: Option<Arc<dyn VideoGenerator>>,
  prompt: String,
  polling: VideoPolling,
  tx: oneshot::Sender<Result<RewardVideo>>,
) {
  let outcome = match videos {
    // Inner task: a panicking generator surfaces as a JoinError instead of skipping settlement.
    Some(v) => tokio::spawn(async move { run_video_job(v.as_ref(), &prompt, polling).await })
      .await
      .unwrap_or_else(|e| Err(QuizError::RedemptionFailed(format!("video job crashed: {}", e)))),
    None => Err(QuizError::RedemptionFailed("video generation is not configured".into())),
  };

  let mut l = ledger.lock().await;
  l.end_redemption();
  let result = match outcome {
    Ok(uri) if tx.is_closed() => {
      warn!(target: "rewards", %uri, balance = l.balance(), "Requester left before the video was ready; points untouched");
      return;
    }
    Ok(uri) => l.redeem(REDEMPTION_COST).map(|balance| {
      info!(target: "rewards", %uri, balance, "Reward video delivered");
      RewardVideo { uri, balance }
    }),
    Err(e) => {
      error!(target: "rewards", error = %e, balance = l.balance(), "Reward redemption failed; points untouched");
      Err(e)
    }
  };
  drop(l);
  let _ = tx.send(result);
}

/// Start the job and poll until it settles or the poll budget runs out.
async fn run_video_job(videos: &dyn VideoGenerator, prompt: &str, polling: VideoPolling) -> Result<String> {
  let job = videos.start_video(prompt).await?;
  for polls in 1..=polling.max_polls {
    tokio::time::sleep(polling.interval).await;
    match videos.poll_video(&job).await? {
      VideoJobStatus::Pending => continue,
      VideoJobStatus::Done(Some(uri)) => {
        info!(target: "rewards", job = %job.name, polls, "Video job finished");
        return Ok(uri);
      }
      VideoJobStatus::Done(None) => {
        return Err(QuizError::RedemptionFailed("video job produced no output".into()));
      }
      VideoJobStatus::Failed(msg) => return Err(QuizError::RedemptionFailed(msg)),
    }
  }
  warn!(target: "rewards", job = %job.name, max_polls = polling.max_polls, "Video job still pending; giving up");
  Err(QuizError::RedemptionFailed(format!("video still pending after {} polls", polling.max_polls)))
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;
  use crate::remote::{VideoFile, VideoJob};
  use async_trait::async_trait;
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex as StdMutex;

  pub(crate) struct ScriptedVideos {
    start: StdMutex<Option<Result<VideoJob>>>,
    polls: StdMutex<VecDeque<Result<VideoJobStatus>>>,
    pub starts: AtomicUsize,
    pub prompts: StdMutex<Vec<String>>,
    pub downloads: StdMutex<Vec<String>>,
  }

  impl ScriptedVideos {
    pub(crate) fn new(start: Result<VideoJob>, polls: Vec<Result<VideoJobStatus>>) -> Self {
      Self {
        start: StdMutex::new(Some(start)),
        polls: StdMutex::new(VecDeque::from(polls)),
        starts: AtomicUsize::new(0),
        prompts: StdMutex::new(Vec::new()),
        downloads: StdMutex::new(Vec::new()),
      }
    }

    /// Once `polls` is exhausted the job stays pending.
    pub(crate) fn ok(polls: Vec<VideoJobStatus>) -> Arc<Self> {
      Arc::new(Self::new(Ok(VideoJob { name: "operations/42".into() }), polls.into_iter().map(Ok).collect()))
    }
  }

  #[async_trait]
  impl VideoGenerator for ScriptedVideos {
    async fn start_video(&self, prompt: &str) -> Result<VideoJob> {
      self.starts.fetch_add(1, Ordering::SeqCst);
      self.prompts.lock().unwrap().push(prompt.to_string());
      self.start.lock().unwrap().take().unwrap_or_else(|| Err(QuizError::RemoteTransportError("no job".into())))
    }

    async fn poll_video(&self, _job: &VideoJob) -> Result<VideoJobStatus> {
      self.polls.lock().unwrap().pop_front().unwrap_or(Ok(VideoJobStatus::Pending))
    }

    async fn download_video(&self, uri: &str) -> Result<VideoFile> {
      self.downloads.lock().unwrap().push(uri.to_string());
      Ok(VideoFile { content_type: "video/mp4".into(), bytes: b"MP4DATA".to_vec() })
    }
  }

  pub(crate) fn as_service(v: &Arc<ScriptedVideos>) -> Option<Arc<dyn VideoGenerator>> {
    let service: Arc<dyn VideoGenerator> = v.clone();
    Some(service)
  }

  const POLLING: VideoPolling = VideoPolling { interval: Duration::from_secs(5), max_polls: 60 };

  fn ledger(balance: u32) -> Arc<Mutex<PointsLedger>> {
    Arc::new(Mutex::new(PointsLedger::new(balance)))
  }

  #[tokio::test(start_paused = true)]
  async fn successful_job_debits_exactly_the_cost() {
    let ledger = ledger(120);
    let videos = ScriptedVideos::ok(vec![
      VideoJobStatus::Pending,
      VideoJobStatus::Pending,
      VideoJobStatus::Done(Some("https://media/cat.mp4".into())),
    ]);
    let started = tokio::time::Instant::now();
    let out = redeem_reward(ledger.clone(), as_service(&videos), "  חתול בחלל ", POLLING).await.unwrap();
    assert_eq!(out, RewardVideo { uri: "https://media/cat.mp4".into(), balance: 70 });
    assert_eq!(ledger.lock().await.balance(), 70);
    assert!(!ledger.lock().await.redemption_in_flight());
    assert_eq!(videos.prompts.lock().unwrap().clone(), vec!["חתול בחלל".to_string()]);
    assert!(started.elapsed() >= Duration::from_secs(15));
  }

  #[tokio::test]
  async fn insufficient_points_skip_the_remote_call() {
    let ledger = ledger(40);
    let videos = ScriptedVideos::ok(vec![]);
    let err = redeem_reward(ledger.clone(), as_service(&videos), "dragon", POLLING).await.unwrap_err();
    assert_eq!(err, QuizError::InsufficientPoints { balance: 40, cost: 50 });
    assert_eq!(videos.starts.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.lock().await.balance(), 40);
  }

  #[tokio::test(start_paused = true)]
  async fn failed_job_leaves_ledger_untouched() {
    let ledger = ledger(60);
    let videos = ScriptedVideos::ok(vec![VideoJobStatus::Pending, VideoJobStatus::Failed("unsafe prompt".into())]);
    let err = redeem_reward(ledger.clone(), as_service(&videos), "dragon", POLLING).await.unwrap_err();
    assert_eq!(err, QuizError::RedemptionFailed("unsafe prompt".into()));
    assert_eq!(ledger.lock().await.balance(), 60);
    assert!(!ledger.lock().await.redemption_in_flight());
  }

  #[tokio::test(start_paused = true)]
  async fn job_without_output_is_a_failure() {
    let ledger = ledger(60);
    let videos = ScriptedVideos::ok(vec![VideoJobStatus::Done(None)]);
    let err = redeem_reward(ledger.clone(), as_service(&videos), "dragon", POLLING).await.unwrap_err();
    assert!(matches!(err, QuizError::RedemptionFailed(_)));
    assert_eq!(ledger.lock().await.balance(), 60);
  }

  #[tokio::test]
  async fn start_error_propagates_without_debit() {
    let ledger = ledger(60);
    let videos = Arc::new(ScriptedVideos::new(Err(QuizError::PermissionDenied("paid key required".into())), vec![]));
    let err = redeem_reward(ledger.clone(), as_service(&videos), "dragon", POLLING).await.unwrap_err();
    assert!(matches!(err, QuizError::PermissionDenied(_)));
    assert_eq!(ledger.lock().await.balance(), 60);
    assert!(!ledger.lock().await.redemption_in_flight());
  }

  #[tokio::test]
  async fn missing_video_service_fails_cleanly() {
    let ledger = ledger(60);
    let err = redeem_reward(ledger.clone(), None, "dragon", POLLING).await.unwrap_err();
    assert!(matches!(err, QuizError::RedemptionFailed(_)));
    assert_eq!(ledger.lock().await.balance(), 60);
    assert!(!ledger.lock().await.redemption_in_flight());
  }

  #[tokio::test]
  async fn blank_prompt_is_rejected_before_anything_else() {
    let ledger = ledger(60);
    let videos = ScriptedVideos::ok(vec![]);
    let err = redeem_reward(ledger.clone(), as_service(&videos), "   ", POLLING).await.unwrap_err();
    assert!(matches!(err, QuizError::RedemptionFailed(_)));
    assert_eq!(videos.starts.load(Ordering::SeqCst), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn concurrent_redemption_is_refused() {
    let ledger = ledger(200);
    let slow = ScriptedVideos::ok(vec![VideoJobStatus::Pending, VideoJobStatus::Done(Some("https://media/a.mp4".into()))]);
    let other = ScriptedVideos::ok(vec![]);
    let (first, second) = tokio::join!(
      redeem_reward(ledger.clone(), as_service(&slow), "a", POLLING),
      async {
        tokio::time::sleep(Duration::from_secs(1)).await;
        redeem_reward(ledger.clone(), as_service(&other), "b", POLLING).await
      }
    );
    assert_eq!(first.unwrap().balance, 150);
    assert_eq!(second.unwrap_err(), QuizError::RedemptionInProgress);
    assert_eq!(other.starts.load(Ordering::SeqCst), 0);
    assert_eq!(ledger.lock().await.balance(), 150);
  }

  #[tokio::test(start_paused = true)]
  async fn pending_job_gives_up_after_max_polls() {
    let ledger = ledger(100);
    let videos = ScriptedVideos::ok(vec![]);
    let polling = VideoPolling { interval: Duration::from_secs(5), max_polls: 3 };
    let started = tokio::time::Instant::now();
    let err = redeem_reward(ledger.clone(), as_service(&videos), "slow", polling).await.unwrap_err();
    assert!(matches!(err, QuizError::RedemptionFailed(_)));
    assert!(started.elapsed() >= Duration::from_secs(15) && started.elapsed() < Duration::from_secs(20));
    assert_eq!(ledger.lock().await.balance(), 100);
    assert!(!ledger.lock().await.redemption_in_flight());
  }

  #[tokio::test(start_paused = true)]
  async fn abandoned_request_still_clears_the_flag() {
    let ledger = ledger(100);
    let stuck = ScriptedVideos::ok(vec![]);
    let polling = VideoPolling { interval: Duration::from_secs(5), max_polls: 4 };

    let dropped = tokio::time::timeout(
      Duration::from_secs(7),
      redeem_reward(ledger.clone(), as_service(&stuck), "stuck", polling),
    )
    .await;
    assert!(dropped.is_err());
    // The job is still being polled in the background.
    assert!(ledger.lock().await.redemption_in_flight());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!ledger.lock().await.redemption_in_flight());
    assert_eq!(ledger.lock().await.balance(), 100);

    let next = ScriptedVideos::ok(vec![VideoJobStatus::Done(Some("https://media/b.mp4".into()))]);
    let out = redeem_reward(ledger.clone(), as_service(&next), "again", polling).await.unwrap();
    assert_eq!(out.balance, 50);
  }

  #[tokio::test(start_paused = true)]
  async fn abandoned_request_is_not_charged_on_late_success() {
    let ledger = ledger(100);
    let late = ScriptedVideos::ok(vec![VideoJobStatus::Pending, VideoJobStatus::Done(Some("https://media/c.mp4".into()))]);

    let dropped = tokio::time::timeout(
      Duration::from_secs(7),
      redeem_reward(ledger.clone(), as_service(&late), "late", POLLING),
    )
    .await;
    assert!(dropped.is_err());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(!ledger.lock().await.redemption_in_flight());
    assert_eq!(ledger.lock().await.balance(), 100);
  }
}
