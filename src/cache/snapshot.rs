//! Published snapshot collaborator.
//!
//! Refreshers notify the snapshot service only after their repository-level
//! caches are cleared. Type-level notifications may be offloaded to a single
//! background worker that preserves submission order.

use std::pin::pin;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;
use tokio::sync::{Notify, mpsc};
use tracing::{debug, warn};

use cachefarm_wire::{ContentPayload, ContentTypePayload, DataTypePayload, DomainPayload, MediaPayload};

use super::error::CacheError;
use super::lock::mutex_lock;

const SOURCE: &str = "cache::snapshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentNotifyOutcome {
    pub draft_changed: bool,
    pub published_changed: bool,
}

pub trait PublishedSnapshotService: Send + Sync {
    fn notify_content(&self, payloads: &[ContentPayload]) -> ContentNotifyOutcome;

    /// Returns whether anything cached for media changed.
    fn notify_media(&self, payloads: &[MediaPayload]) -> bool;

    fn notify_content_types(&self, payloads: &[ContentTypePayload]);

    fn notify_data_types(&self, payloads: &[DataTypePayload]);

    fn notify_domains(&self, payloads: &[DomainPayload]);
}

/// For servers and tools that keep no published snapshot.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSnapshotService;

impl PublishedSnapshotService for NoopSnapshotService {
    fn notify_content(&self, _payloads: &[ContentPayload]) -> ContentNotifyOutcome {
        ContentNotifyOutcome::default()
    }

    fn notify_media(&self, _payloads: &[MediaPayload]) -> bool {
        false
    }

    fn notify_content_types(&self, _payloads: &[ContentTypePayload]) {}

    fn notify_data_types(&self, _payloads: &[DataTypePayload]) {}

    fn notify_domains(&self, _payloads: &[DomainPayload]) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotNotification {
    Content(Vec<ContentPayload>),
    Media(Vec<MediaPayload>),
    ContentTypes(Vec<ContentTypePayload>),
    DataTypes(Vec<DataTypePayload>),
    Domains(Vec<DomainPayload>),
}

/// Records every notification in arrival order.
///
/// Reports changes for any non-empty content or media notification unless
/// configured otherwise.
pub struct RecordingSnapshotService {
    notifications: Mutex<Vec<SnapshotNotification>>,
    content_outcome: ContentNotifyOutcome,
    media_changed: bool,
}

impl RecordingSnapshotService {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(Vec::new()),
            content_outcome: ContentNotifyOutcome {
                draft_changed: true,
                published_changed: true,
            },
            media_changed: true,
        }
    }

    pub fn with_content_outcome(mut self, outcome: ContentNotifyOutcome) -> Self {
        self.content_outcome = outcome;
        self
    }

    pub fn with_media_changed(mut self, changed: bool) -> Self {
        self.media_changed = changed;
        self
    }

    pub fn notifications(&self) -> Vec<SnapshotNotification> {
        mutex_lock(&self.notifications, SOURCE, "notifications").clone()
    }

    pub fn take(&self) -> Vec<SnapshotNotification> {
        std::mem::take(&mut *mutex_lock(&self.notifications, SOURCE, "take"))
    }

    fn record(&self, notification: SnapshotNotification) {
        mutex_lock(&self.notifications, SOURCE, "record").push(notification);
    }
}

impl Default for RecordingSnapshotService {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishedSnapshotService for RecordingSnapshotService {
    fn notify_content(&self, payloads: &[ContentPayload]) -> ContentNotifyOutcome {
        self.record(SnapshotNotification::Content(payloads.to_vec()));
        if payloads.is_empty() {
            ContentNotifyOutcome::default()
        } else {
            self.content_outcome
        }
    }

    fn notify_media(&self, payloads: &[MediaPayload]) -> bool {
        self.record(SnapshotNotification::Media(payloads.to_vec()));
        !payloads.is_empty() && self.media_changed
    }

    fn notify_content_types(&self, payloads: &[ContentTypePayload]) {
        self.record(SnapshotNotification::ContentTypes(payloads.to_vec()));
    }

    fn notify_data_types(&self, payloads: &[DataTypePayload]) {
        self.record(SnapshotNotification::DataTypes(payloads.to_vec()));
    }

    fn notify_domains(&self, payloads: &[DomainPayload]) {
        self.record(SnapshotNotification::Domains(payloads.to_vec()));
    }
}

// ============================================================================
// Model rebuild worker
// ============================================================================

#[derive(Debug)]
enum RebuildJob {
    ContentTypes(Vec<ContentTypePayload>),
    DataTypes(Vec<DataTypePayload>),
}

struct PendingJobs {
    count: AtomicUsize,
    drained: Notify,
}

/// Decrements the pending count even if the job unwinds.
struct JobGuard<'a>(&'a PendingJobs);

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        if self.0.count.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.drained.notify_waiters();
        }
    }
}

/// Single background worker rebuilding derived models before the snapshot
/// service sees type changes. Jobs run one at a time in submission order.
pub struct ModelRebuildQueue {
    sender: mpsc::UnboundedSender<RebuildJob>,
    pending: Arc<PendingJobs>,
}

impl ModelRebuildQueue {
    /// Spawns the worker on the runtime the caller is running in.
    pub fn spawn(service: Arc<dyn PublishedSnapshotService>) -> Result<Self, CacheError> {
        let handle = Handle::try_current().map_err(|_| CacheError::NoRuntime)?;
        Ok(Self::spawn_on(service, &handle))
    }

    pub fn spawn_on(service: Arc<dyn PublishedSnapshotService>, runtime: &Handle) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<RebuildJob>();
        let pending = Arc::new(PendingJobs {
            count: AtomicUsize::new(0),
            drained: Notify::new(),
        });

        let worker_pending = Arc::clone(&pending);
        runtime.spawn(async move {
            while let Some(job) = receiver.recv().await {
                let _guard = JobGuard(&worker_pending);
                debug!(job = ?job_kind(&job), "Model rebuild job started");
                match job {
                    RebuildJob::ContentTypes(payloads) => service.notify_content_types(&payloads),
                    RebuildJob::DataTypes(payloads) => service.notify_data_types(&payloads),
                }
            }
            debug!("Model rebuild worker stopped");
        });

        Self { sender, pending }
    }

    fn submit(&self, job: RebuildJob) -> Result<(), CacheError> {
        self.pending.count.fetch_add(1, Ordering::SeqCst);
        self.sender.send(job).map_err(|_| {
            let _guard = JobGuard(&self.pending);
            warn!("Model rebuild worker is gone; notification dropped");
            CacheError::WorkerStopped
        })
    }

    pub fn submit_content_types(&self, payloads: Vec<ContentTypePayload>) -> Result<(), CacheError> {
        self.submit(RebuildJob::ContentTypes(payloads))
    }

    pub fn submit_data_types(&self, payloads: Vec<DataTypePayload>) -> Result<(), CacheError> {
        self.submit(RebuildJob::DataTypes(payloads))
    }

    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::SeqCst)
    }

    /// Waits until every job submitted so far has finished.
    pub async fn wait_drained(&self) {
        loop {
            let mut notified = pin!(self.pending.drained.notified());
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }
}

fn job_kind(job: &RebuildJob) -> &'static str {
    match job {
        RebuildJob::ContentTypes(_) => "content_types",
        RebuildJob::DataTypes(_) => "data_types",
    }
}

/// Where content type and data type notifications go.
#[derive(Clone)]
pub enum SnapshotNotifier {
    Inline(Arc<dyn PublishedSnapshotService>),
    Queued {
        service: Arc<dyn PublishedSnapshotService>,
        queue: Arc<ModelRebuildQueue>,
    },
}

impl SnapshotNotifier {
    pub fn inline(service: Arc<dyn PublishedSnapshotService>) -> Self {
        Self::Inline(service)
    }

    /// Spawns the model rebuild worker on the caller's tokio runtime.
    pub fn queued(service: Arc<dyn PublishedSnapshotService>) -> Result<Self, CacheError> {
        let queue = Arc::new(ModelRebuildQueue::spawn(Arc::clone(&service))?);
        Ok(Self::Queued { service, queue })
    }

    pub fn service(&self) -> &Arc<dyn PublishedSnapshotService> {
        match self {
            Self::Inline(service) | Self::Queued { service, .. } => service,
        }
    }

    pub fn queue(&self) -> Option<&Arc<ModelRebuildQueue>> {
        match self {
            Self::Inline(_) => None,
            Self::Queued { queue, .. } => Some(queue),
        }
    }

    pub fn content_types(&self, payloads: &[ContentTypePayload]) -> Result<(), CacheError> {
        match self {
            Self::Inline(service) => {
                service.notify_content_types(payloads);
                Ok(())
            }
            Self::Queued { queue, .. } => queue.submit_content_types(payloads.to_vec()),
        }
    }

    pub fn data_types(&self, payloads: &[DataTypePayload]) -> Result<(), CacheError> {
        match self {
            Self::Inline(service) => {
                service.notify_data_types(payloads);
                Ok(())
            }
            Self::Queued { queue, .. } => queue.submit_data_types(payloads.to_vec()),
        }
    }
}
