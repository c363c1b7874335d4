//! Client side of "start learning".
//!
//! Saving the track is a convenience: whatever the save does, the user ends
//! up on the learning-path page. With a track id the page is opened for that
//! track, otherwise by start and target name. Only one save may be in flight;
//! repeated clicks while it runs are ignored.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Deserialize;

use crate::skill::Skill;

use super::{NewTrack, StartLearningRequest, TrackError, TrackResult, TrackStore};

/// Shown inline when the save failed but navigation goes ahead.
pub const SAVE_FAILED_NOTICE: &str =
    "We couldn't save this learning track. Opening the learning path anyway.";

/// The start-learning endpoint as seen by a client.
#[async_trait]
pub trait TrackApi: Send + Sync {
    /// Submit the track; `Ok(None)` when the server saved it but returned no id.
    async fn start_learning(&self, request: &StartLearningRequest) -> TrackResult<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct StartLearningBody {
    #[serde(default)]
    data: Option<StartLearningData>,
}

#[derive(Debug, Deserialize)]
struct StartLearningData {
    #[serde(default)]
    user_roadmap_path_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DetailBody {
    #[serde(default)]
    detail: String,
}

/// [`TrackApi`] over HTTP against a running `atlasd`.
pub struct HttpTrackApi {
    /// Server URL including any URL prefix.
    base: String,
    token: Option<String>,
    http: reqwest::Client,
}

impl HttpTrackApi {
    pub fn new(base: &str, token: Option<String>) -> TrackResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| TrackError::Unreachable {
                url: base.to_string(),
                message: e.to_string(),
            })?;
        Ok(Self {
            base: base.trim_end_matches('/').to_string(),
            token,
            http,
        })
    }
}

#[async_trait]
impl TrackApi for HttpTrackApi {
    async fn start_learning(&self, request: &StartLearningRequest) -> TrackResult<Option<String>> {
        let url = format!("{}/api/route-planning/start-learning", self.base);
        let mut req = self.http.post(&url).json(request);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(|e| TrackError::Unreachable {
            url: url.clone(),
            message: e.to_string(),
        })?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp
                .json::<DetailBody>()
                .await
                .map(|b| b.detail)
                .unwrap_or_default();
            return Err(TrackError::Upstream {
                status: status.as_u16(),
                message: detail,
            });
        }

        let body: StartLearningBody = resp.json().await.map_err(|e| TrackError::Response {
            message: e.to_string(),
        })?;
        Ok(body
            .data
            .and_then(|d| d.user_roadmap_path_id)
            .filter(|id| !id.is_empty()))
    }
}

/// [`TrackApi`] writing straight to a [`TrackStore`], for offline use.
pub struct StoreTrackApi {
    store: Arc<dyn TrackStore>,
    user_id: String,
    secret: String,
}

impl StoreTrackApi {
    pub fn new(store: Arc<dyn TrackStore>, user_id: &str, secret: &str) -> Self {
        Self {
            store,
            user_id: user_id.to_string(),
            secret: secret.to_string(),
        }
    }
}

#[async_trait]
impl TrackApi for StoreTrackApi {
    async fn start_learning(&self, request: &StartLearningRequest) -> TrackResult<Option<String>> {
        let track = NewTrack::prepare(&self.user_id, request, &self.secret)?;
        let receipt = self.store.save(track).await?;
        Ok(Some(receipt.user_roadmap_path_id))
    }
}

#[derive(Debug)]
pub enum LaunchOutcome {
    /// Open the learning-path page.
    Navigate {
        url: String,
        /// Inline message to show, set when saving failed.
        notice: Option<String>,
        track_id: Option<String>,
    },
    /// A save from an earlier click is still running.
    AlreadyPending,
    /// The displayed path cannot be saved; nothing was sent.
    Invalid(TrackError),
}

/// `{prefix}/learning-path?user_roadmap_path_id={id}`
pub fn track_url(prefix: &str, track_id: &str) -> String {
    format!(
        "{prefix}/learning-path?user_roadmap_path_id={}",
        urlencoding::encode(track_id)
    )
}

/// `{prefix}/learning-path?start={start}&end={target}`
pub fn fallback_url(prefix: &str, start: &str, target: &str) -> String {
    format!(
        "{prefix}/learning-path?start={}&end={}",
        urlencoding::encode(start),
        urlencoding::encode(target)
    )
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct LearningLauncher<A> {
    api: A,
    prefix: String,
    in_flight: AtomicBool,
}

impl<A: TrackApi> LearningLauncher<A> {
    /// `prefix` is the normalised URL prefix navigation URLs start with.
    pub fn new(api: A, prefix: impl Into<String>) -> Self {
        Self {
            api,
            prefix: prefix.into(),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Save `path` as a track and decide where to navigate.
    pub async fn launch(&self, path: &[Skill]) -> LaunchOutcome {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return LaunchOutcome::AlreadyPending;
        }
        let _guard = InFlight(&self.in_flight);

        let request = match StartLearningRequest::from_path(path) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!(error = %e, "cannot start learning from displayed path");
                return LaunchOutcome::Invalid(e);
            }
        };

        match self.api.start_learning(&request).await {
            Ok(Some(id)) => LaunchOutcome::Navigate {
                url: track_url(&self.prefix, &id),
                notice: None,
                track_id: Some(id),
            },
            Ok(None) => LaunchOutcome::Navigate {
                url: fallback_url(&self.prefix, &request.start_skill, &request.target_skill),
                notice: None,
                track_id: None,
            },
            Err(e) => {
                tracing::error!(error = %e, "saving learning track failed");
                LaunchOutcome::Navigate {
                    url: fallback_url(&self.prefix, &request.start_skill, &request.target_skill),
                    notice: Some(SAVE_FAILED_NOTICE.to_string()),
                    track_id: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct RecordingApi {
        calls: AtomicUsize,
        seen: Mutex<Vec<StartLearningRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl TrackApi for RecordingApi {
        async fn start_learning(
            &self,
            request: &StartLearningRequest,
        ) -> TrackResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(request.clone());
            if self.fail {
                Err(TrackError::Upstream {
                    status: 500,
                    message: "boom".into(),
                })
            } else {
                Ok(Some("track 42".into()))
            }
        }
    }

    struct GatedApi {
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl TrackApi for GatedApi {
        async fn start_learning(&self, _: &StartLearningRequest) -> TrackResult<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.gate.notified().await;
            Ok(Some("t1".into()))
        }
    }

    fn path(names: &[&str]) -> Vec<Skill> {
        names.iter().enumerate().map(|(i, n)| Skill::new(n, "", i as i64)).collect()
    }

    #[tokio::test]
    async fn success_navigates_to_track() {
        let launcher = LearningLauncher::new(RecordingApi::default(), "/atlas");
        let out = launcher
            .launch(&path(&["python", "machine learning", "mlops"]))
            .await;
        match out {
            LaunchOutcome::Navigate { url, notice, track_id } => {
                assert_eq!(url, "/atlas/learning-path?user_roadmap_path_id=track%2042");
                assert!(notice.is_none());
                assert_eq!(track_id.as_deref(), Some("track 42"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        let seen = launcher.api().seen.lock().unwrap();
        let names: Vec<&str> = seen[0].skill_path.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["python", "machine learning", "mlops"]);
        assert!(!launcher.is_pending());
    }

    #[tokio::test]
    async fn failure_still_navigates_with_notice() {
        let api = RecordingApi {
            fail: true,
            ..Default::default()
        };
        let launcher = LearningLauncher::new(api, "");
        match launcher.launch(&path(&["data analyst", "ai agents"])).await {
            LaunchOutcome::Navigate { url, notice, .. } => {
                assert_eq!(url, "/learning-path?start=data%20analyst&end=ai%20agents");
                assert_eq!(notice.as_deref(), Some(SAVE_FAILED_NOTICE));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_paths_send_nothing() {
        let launcher = LearningLauncher::new(RecordingApi::default(), "");
        assert!(matches!(
            launcher.launch(&[]).await,
            LaunchOutcome::Invalid(TrackError::EmptyPath)
        ));

        let mut p = path(&["python", "mlops"]);
        p[0].name.clear();
        assert!(matches!(
            launcher.launch(&p).await,
            LaunchOutcome::Invalid(TrackError::MissingSkillName { index: 0 })
        ));
        assert_eq!(launcher.api().calls.load(Ordering::SeqCst), 0);
        assert!(!launcher.is_pending());
    }

    #[tokio::test]
    async fn second_click_while_pending_is_ignored() {
        let launcher = LearningLauncher::new(
            GatedApi {
                gate: Notify::new(),
                calls: AtomicUsize::new(0),
            },
            "",
        );
        let p = path(&["python", "mlops"]);

        let (first, second) = tokio::join!(launcher.launch(&p), async {
            tokio::task::yield_now().await;
            let out = launcher.launch(&p).await;
            launcher.api().gate.notify_one();
            out
        });

        assert!(matches!(first, LaunchOutcome::Navigate { .. }));
        assert!(matches!(second, LaunchOutcome::AlreadyPending));
        assert_eq!(launcher.api().calls.load(Ordering::SeqCst), 1);
        assert!(!launcher.is_pending());
    }

    #[tokio::test]
    async fn store_api_saves_through_track_store() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(crate::track::local::LocalTrackStore::open(dir.path()).unwrap());
        let launcher = LearningLauncher::new(StoreTrackApi::new(store.clone(), "local", "s"), "");

        let out = launcher.launch(&path(&["java", "android"])).await;
        let LaunchOutcome::Navigate { track_id: Some(id), .. } = out else {
            panic!("expected a saved track, got {out:?}");
        };
        let saved = store.track(&id).await.unwrap().unwrap();
        assert_eq!(saved.user_id, "local");
        assert_eq!(saved.skill_sequence, "java-android");
    }

    #[test]
    fn urls_are_encoded_and_prefixed() {
        assert_eq!(track_url("", "abc"), "/learning-path?user_roadmap_path_id=abc");
        assert_eq!(
            fallback_url("/app", "c++", "ai agents"),
            "/app/learning-path?start=c%2B%2B&end=ai%20agents"
        );
    }
}
