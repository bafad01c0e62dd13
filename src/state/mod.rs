mod types;

pub use types::*;

use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use vaultcast_common::VideoId;

const MAX_HISTORY_SIZE: usize = 1000;

/// Application-wide event for SSE-style progress consumers.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AppEvent {
    IngestStarted { job: IngestJob },
    IngestProgress { job_id: String, phase: IngestPhase, current_bytes: u64, total_bytes: u64 },
    IngestCompleted { job: IngestJob },
    IngestFailed { job_id: String, error: String },
    DeleteCompleted { video_id: VideoId },
    CacheCleared,
}

/// Shared application context: job tracking, the event bus, and the
/// per-video_id ingest guard that rejects concurrent ingests of the same id.
pub struct AppState {
    jobs: RwLock<std::collections::HashMap<String, IngestJob>>,
    history: RwLock<VecDeque<IngestJob>>,
    /// Guards against two concurrent ingests of the same `video_id`; see
    /// Open Question (b) in the design notes.
    in_flight_ingests: DashMap<VideoId, ()>,
    event_tx: broadcast::Sender<AppEvent>,
}

impl AppState {
    pub fn new() -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            jobs: RwLock::new(std::collections::HashMap::new()),
            history: RwLock::new(VecDeque::new()),
            in_flight_ingests: DashMap::new(),
            event_tx,
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    fn broadcast(&self, event: AppEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Claim the ingest guard for `video_id`. Returns `false` (and claims
    /// nothing) if an ingest of this id is already in flight.
    pub fn try_begin_ingest(&self, video_id: &VideoId) -> bool {
        self.in_flight_ingests.insert(video_id.clone(), ()).is_none()
    }

    pub fn end_ingest(&self, video_id: &VideoId) {
        self.in_flight_ingests.remove(video_id);
    }

    pub fn start_job(&self, job: IngestJob) {
        self.broadcast(AppEvent::IngestStarted { job: job.clone() });
        self.jobs.write().insert(job.id.clone(), job);
    }

    pub fn update_progress(&self, job_id: &str, phase: IngestPhase, current_bytes: u64, total_bytes: u64) {
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            job.phase = phase;
            job.current_bytes = current_bytes;
            job.total_bytes = total_bytes;
        }
        self.broadcast(AppEvent::IngestProgress {
            job_id: job_id.to_string(),
            phase,
            current_bytes,
            total_bytes,
        });
    }

    pub fn complete_job(&self, job_id: &str) {
        if let Some(mut job) = self.jobs.write().remove(job_id) {
            job.phase = IngestPhase::Done;
            self.add_to_history(job.clone());
            self.broadcast(AppEvent::IngestCompleted { job });
        }
    }

    pub fn fail_job(&self, job_id: &str, error: &str) {
        if let Some(mut job) = self.jobs.write().remove(job_id) {
            job.phase = IngestPhase::Error;
            job.error = Some(error.to_string());
            self.add_to_history(job);
        }
        self.broadcast(AppEvent::IngestFailed {
            job_id: job_id.to_string(),
            error: error.to_string(),
        });
    }

    pub fn get_job(&self, job_id: &str) -> Option<IngestJob> {
        self.jobs.read().get(job_id).cloned().or_else(|| {
            self.history.read().iter().find(|j| j.id == job_id).cloned()
        })
    }

    fn add_to_history(&self, job: IngestJob) {
        let mut history = self.history.write();
        history.push_front(job);
        while history.len() > MAX_HISTORY_SIZE {
            history.pop_back();
        }
    }

    pub fn notify_delete(&self, video_id: VideoId) {
        self.broadcast(AppEvent::DeleteCompleted { video_id });
    }

    pub fn notify_cache_cleared(&self) {
        self.broadcast(AppEvent::CacheCleared);
    }
}
