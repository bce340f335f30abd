//! crates/skill_tutor_core/src/poller.rs
//!
//! Drives a long-running video generation operation from submission to a
//! downloaded artifact. Status checks are strictly sequential: check, wait,
//! check. Every suspension point observes the caller's `CancellationToken`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::{AnimationRequest, GenerationJob, VideoArtifact};
use crate::error::StudioError;
use crate::ports::VideoGenerationService;

pub const STAGE_STARTING: &str = "Video banana shuru ho raha hai...";
pub const STAGE_PROCESSING: &str = "Processing jaari hai... ismein kuch minute lag sakte hain.";
pub const STAGE_READY: &str = "Video taiyaar hai!";

const VIDEO_MIME_TYPE: &str = "video/mp4";

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Delay between two status checks.
    pub interval: Duration,
    /// Status checks allowed before giving up with `StudioError::Timeout`.
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: 60,
        }
    }
}

/// One progress report, emitted after each status check.
#[derive(Debug, Clone, PartialEq)]
pub struct JobProgress {
    pub attempt: u32,
    pub percent: f64,
    pub message: String,
}

impl JobProgress {
    fn new(attempt: u32, percent: f64) -> Self {
        Self {
            attempt,
            percent,
            message: format!("Video {}% ban chuki hai...", percent.round() as u32),
        }
    }
}

pub struct JobPoller {
    videos: Arc<dyn VideoGenerationService>,
    settings: PollSettings,
}

impl JobPoller {
    pub fn new(videos: Arc<dyn VideoGenerationService>, settings: PollSettings) -> Self {
        Self { videos, settings }
    }

    /// Rejects requests missing a prompt or source image.
    pub fn validate(request: &AnimationRequest) -> Result<(), StudioError> {
        if request.prompt.trim().is_empty() {
            return Err(StudioError::Validation(
                "Kripya ek prompt likhein.".to_string(),
            ));
        }
        if request.image.data.is_empty() {
            return Err(StudioError::Validation(
                "Kripya ek image upload karein.".to_string(),
            ));
        }
        Ok(())
    }

    /// Starts the external operation. Validation happens before any network call.
    pub async fn submit(&self, request: &AnimationRequest) -> Result<GenerationJob, StudioError> {
        Self::validate(request)?;
        info!(
            aspect_ratio = request.aspect_ratio.as_str(),
            "Submitting video generation job."
        );
        let job = self
            .videos
            .start_generation(request)
            .await
            .map_err(StudioError::from_port)?;
        info!(operation = %job.name, "Video generation job accepted.");
        Ok(job)
    }

    /// Polls `job` until it is done, then downloads its artifact.
    ///
    /// `on_progress` is invoked exactly once per status check, with a percentage
    /// that never decreases. After cancellation no callback runs.
    pub async fn await_completion<F>(
        &self,
        mut job: GenerationJob,
        mut on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<VideoArtifact, StudioError>
    where
        F: FnMut(JobProgress) + Send,
    {
        let mut attempts: u32 = 0;
        let mut reported: f64 = 0.0;

        while !job.done {
            if attempts >= self.settings.max_attempts {
                warn!(operation = %job.name, attempts, "Video generation timed out.");
                return Err(StudioError::Timeout { attempts });
            }

            until_cancelled(cancel, tokio::time::sleep(self.settings.interval)).await?;

            attempts += 1;
            let next = until_cancelled(cancel, self.videos.get_operation(&job))
                .await?
                .map_err(StudioError::from_port)?;

            reported = reported.max(next.progress_percentage.clamp(0.0, 100.0));
            debug!(operation = %next.name, attempt = attempts, percent = reported, done = next.done, "Polled video job.");
            job = next;
            on_progress(JobProgress::new(attempts, reported));
        }

        let uri = match job.result_uri.filter(|uri| !uri.is_empty()) {
            Some(uri) => uri,
            None => {
                warn!(operation = %job.name, "Video job finished without a download link.");
                return Err(StudioError::ArtifactMissing);
            }
        };

        let bytes = until_cancelled(cancel, self.videos.download(&uri))
            .await?
            .map_err(StudioError::from_port)?;
        info!(operation = %job.name, size = bytes.len(), "Video downloaded.");

        Ok(VideoArtifact {
            source_uri: uri,
            mime_type: VIDEO_MIME_TYPE.to_string(),
            bytes,
        })
    }

    /// Submits and awaits one animation, reporting the stage messages through `on_stage`.
    pub async fn animate<S, F>(
        &self,
        request: &AnimationRequest,
        mut on_stage: S,
        on_progress: F,
        cancel: &CancellationToken,
    ) -> Result<VideoArtifact, StudioError>
    where
        S: FnMut(&str) + Send,
        F: FnMut(JobProgress) + Send,
    {
        Self::validate(request)?;
        on_stage(STAGE_STARTING);
        let job = until_cancelled(cancel, self.submit(request)).await??;
        on_stage(STAGE_PROCESSING);
        let artifact = self.await_completion(job, on_progress, cancel).await?;
        on_stage(STAGE_READY);
        Ok(artifact)
    }
}

/// Runs `fut` unless `cancel` fires first.
async fn until_cancelled<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = T>,
) -> Result<T, StudioError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Video job cancelled by the caller.");
            Err(StudioError::Cancelled)
        }
        out = fut => Ok(out),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AspectRatio, MediaInput};
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a scripted list of operation states.
    struct ScriptedVideos {
        polls: Mutex<VecDeque<PortResult<GenerationJob>>>,
        poll_calls: Mutex<u32>,
        start_calls: Mutex<u32>,
        downloaded: Mutex<Vec<String>>,
    }

    impl ScriptedVideos {
        fn new(polls: Vec<PortResult<GenerationJob>>) -> Arc<Self> {
            Arc::new(Self {
                polls: Mutex::new(polls.into()),
                poll_calls: Mutex::new(0),
                start_calls: Mutex::new(0),
                downloaded: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl VideoGenerationService for ScriptedVideos {
        async fn start_generation(&self, _request: &AnimationRequest) -> PortResult<GenerationJob> {
            *self.start_calls.lock().unwrap() += 1;
            Ok(job(false, 0.0, None))
        }

        async fn get_operation(&self, _job: &GenerationJob) -> PortResult<GenerationJob> {
            *self.poll_calls.lock().unwrap() += 1;
            self.polls
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(job(false, 0.0, None)))
        }

        async fn download(&self, uri: &str) -> PortResult<Bytes> {
            self.downloaded.lock().unwrap().push(uri.to_string());
            Ok(Bytes::from_static(b"mp4-bytes"))
        }
    }

    /// Accepts jobs but never answers a status check.
    struct SilentVideos {
        poll_calls: Mutex<u32>,
    }

    #[async_trait]
    impl VideoGenerationService for SilentVideos {
        async fn start_generation(&self, _request: &AnimationRequest) -> PortResult<GenerationJob> {
            Ok(job(false, 0.0, None))
        }

        async fn get_operation(&self, _job: &GenerationJob) -> PortResult<GenerationJob> {
            *self.poll_calls.lock().unwrap() += 1;
            futures::future::pending().await
        }

        async fn download(&self, _uri: &str) -> PortResult<Bytes> {
            futures::future::pending().await
        }
    }

    fn cancel_after(secs: u64) -> CancellationToken {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            trigger.cancel();
        });
        cancel
    }

    fn job(done: bool, progress: f64, uri: Option<&str>) -> GenerationJob {
        GenerationJob {
            name: "models/veo/operations/op-1".into(),
            done,
            progress_percentage: progress,
            result_uri: uri.map(str::to_string),
        }
    }

    fn request(prompt: &str, image: &'static [u8]) -> AnimationRequest {
        AnimationRequest {
            prompt: prompt.into(),
            image: MediaInput {
                mime_type: "image/png".into(),
                data: Bytes::from_static(image),
            },
            aspect_ratio: AspectRatio::Landscape,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn blank_prompt_fails_before_any_network_call() {
        let videos = ScriptedVideos::new(vec![]);
        let poller = JobPoller::new(videos.clone(), PollSettings::default());

        let err = poller.submit(&request("   ", b"png")).await.unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
        let err = poller.submit(&request("dance", b"")).await.unwrap_err();
        assert!(matches!(err, StudioError::Validation(_)));
        assert_eq!(*videos.start_calls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn progress_never_goes_backwards() {
        let videos = ScriptedVideos::new(vec![
            Ok(job(false, 40.0, None)),
            Ok(job(false, 20.0, None)),
            Ok(job(true, 100.0, Some("https://files/v.mp4?alt=media"))),
        ]);
        let poller = JobPoller::new(videos, PollSettings::default());
        let mut seen = Vec::new();

        poller
            .await_completion(job(false, 0.0, None), |p| seen.push(p.percent), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(seen, vec![40.0, 40.0, 100.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn done_without_artifact_stops_polling() {
        let videos = ScriptedVideos::new(vec![Ok(job(true, 100.0, None)), Ok(job(false, 0.0, None))]);
        let poller = JobPoller::new(videos.clone(), PollSettings::default());

        let err = poller
            .await_completion(job(false, 0.0, None), |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, StudioError::ArtifactMissing);
        assert_eq!(*videos.poll_calls.lock().unwrap(), 1);
        assert!(videos.downloaded.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_attempts() {
        let videos = ScriptedVideos::new(vec![]);
        let settings = PollSettings {
            interval: Duration::from_secs(10),
            max_attempts: 3,
        };
        let poller = JobPoller::new(videos.clone(), settings);

        let err = poller
            .await_completion(job(false, 0.0, None), |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err, StudioError::Timeout { attempts: 3 });
        assert_eq!(*videos.poll_calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_credential_during_poll_is_classified() {
        let videos = ScriptedVideos::new(vec![Err(PortError::Upstream(
            "Requested entity was not found.".into(),
        ))]);
        let poller = JobPoller::new(videos, PollSettings::default());

        let err = poller
            .await_completion(job(false, 0.0, None), |_| {}, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, StudioError::InvalidCredential(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_loop_makes_no_further_calls() {
        let videos = ScriptedVideos::new(vec![]);
        let poller = JobPoller::new(videos.clone(), PollSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut callbacks = 0;

        let err = poller
            .await_completion(job(false, 0.0, None), |_| callbacks += 1, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, StudioError::Cancelled);
        assert_eq!(callbacks, 0);
        assert_eq!(*videos.poll_calls.lock().unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_between_checks_stops_the_wait() {
        let videos = ScriptedVideos::new(vec![]);
        let poller = JobPoller::new(videos.clone(), PollSettings::default());
        let cancel = cancel_after(25);
        let mut callbacks = 0;

        let err = poller
            .await_completion(job(false, 0.0, None), |_| callbacks += 1, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, StudioError::Cancelled);
        assert_eq!(callbacks, 2);
        assert_eq!(*videos.poll_calls.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_during_a_status_check_abandons_it() {
        let videos = Arc::new(SilentVideos {
            poll_calls: Mutex::new(0),
        });
        let poller = JobPoller::new(videos.clone(), PollSettings::default());
        let cancel = cancel_after(15);
        let mut callbacks = 0;

        let err = poller
            .await_completion(job(false, 0.0, None), |_| callbacks += 1, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err, StudioError::Cancelled);
        assert_eq!(callbacks, 0);
        assert_eq!(*videos.poll_calls.lock().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn animate_reports_stages_in_order() {
        let videos = ScriptedVideos::new(vec![Ok(job(true, 100.0, Some("https://files/v.mp4")))]);
        let poller = JobPoller::new(videos, PollSettings::default());
        let mut stages = Vec::new();

        poller
            .animate(
                &request("ek astronaut", b"png"),
                |stage| stages.push(stage.to_string()),
                |_| {},
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(stages, vec![STAGE_STARTING, STAGE_PROCESSING, STAGE_READY]);
    }
}
