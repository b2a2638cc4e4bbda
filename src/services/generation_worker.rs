use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::database::entities::story_jobs;
use crate::errors::{CoreError, CoreResult, GenerationError};
use crate::services::generators::StoryGenerator;
use crate::services::story_service::StoreOutcome;
use crate::services::{JobService, StoryService};

/// Lifecycle hooks for generation runs
#[async_trait]
pub trait JobReporter: Send + Sync {
    async fn report_started(&self, job_id: &str, theme: &str);
    async fn report_completed(&self, job_id: &str, story_id: i32);
    async fn report_failed(&self, job_id: &str, error: &str);
}

/// Default reporter that logs through `tracing`
pub struct LogJobReporter;

#[async_trait]
impl JobReporter for LogJobReporter {
    async fn report_started(&self, job_id: &str, theme: &str) {
        info!("[{}] Generating story for theme '{}'", job_id, theme);
    }

    async fn report_completed(&self, job_id: &str, story_id: i32) {
        info!("[{}] ✓ Story {} ready", job_id, story_id);
    }

    async fn report_failed(&self, job_id: &str, error: &str) {
        error!("[{}] ✗ Generation failed: {}", job_id, error);
    }
}

/// One unit of work for the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationTask {
    pub job_id: String,
    pub session_id: String,
    pub theme: String,
}

impl From<&story_jobs::Model> for GenerationTask {
    fn from(job: &story_jobs::Model) -> Self {
        Self {
            job_id: job.job_id.clone(),
            session_id: job.session_id.clone(),
            theme: job.theme.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// Job missing or no longer pending; nothing was done.
    Skipped,
    Completed { story_id: i32 },
    Failed { error: String },
    /// Story was generated but the job had already left `processing`.
    Discarded,
}

/// Runs a single job from `pending` to a terminal state.
#[derive(Clone)]
pub struct GenerationWorker {
    jobs: JobService,
    stories: StoryService,
    generator: Arc<dyn StoryGenerator>,
    reporter: Arc<dyn JobReporter>,
    job_timeout: Duration,
}

impl GenerationWorker {
    pub fn new(
        jobs: JobService,
        stories: StoryService,
        generator: Arc<dyn StoryGenerator>,
        job_timeout: Duration,
    ) -> Self {
        Self::with_reporter(jobs, stories, generator, job_timeout, Arc::new(LogJobReporter))
    }

    pub fn with_reporter(
        jobs: JobService,
        stories: StoryService,
        generator: Arc<dyn StoryGenerator>,
        job_timeout: Duration,
        reporter: Arc<dyn JobReporter>,
    ) -> Self {
        Self {
            jobs,
            stories,
            generator,
            reporter,
            job_timeout,
        }
    }

    pub async fn process(&self, task: GenerationTask) -> WorkOutcome {
        match self.jobs.find_job(&task.job_id).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!("[{}] Job no longer exists; skipping", task.job_id);
                return WorkOutcome::Skipped;
            }
            Err(e) => {
                error!("[{}] Could not load job: {}", task.job_id, e);
                return WorkOutcome::Skipped;
            }
        }

        // Commit `processing` before the long-running part so pollers see progress.
        match self.jobs.mark_processing(&task.job_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!("[{}] Job is not pending; duplicate dispatch ignored", task.job_id);
                return WorkOutcome::Skipped;
            }
            Err(e) => {
                error!("[{}] Could not start job: {}", task.job_id, e);
                return WorkOutcome::Skipped;
            }
        }

        self.reporter.report_started(&task.job_id, &task.theme).await;

        match self.generate_and_store(&task).await {
            Ok(StoreOutcome::Stored { story_id }) => {
                self.reporter.report_completed(&task.job_id, story_id).await;
                WorkOutcome::Completed { story_id }
            }
            Ok(StoreOutcome::JobNotProcessing) => WorkOutcome::Discarded,
            Err(err) => {
                let message = err.to_string();
                if let Err(e) = self.jobs.mark_failed(&task.job_id, &message).await {
                    // The recovery sweep fails the job once it goes stale.
                    error!("[{}] Could not record failure: {}", task.job_id, e);
                }
                self.reporter.report_failed(&task.job_id, &message).await;
                WorkOutcome::Failed { error: message }
            }
        }
    }

    async fn generate_and_store(&self, task: &GenerationTask) -> Result<StoreOutcome, GenerationError> {
        let generator = self.generator.clone();
        let theme = task.theme.clone();

        // Own task so a panicking generator surfaces as a JoinError
        let mut handle = tokio::spawn(async move { generator.generate(&theme).await });

        let draft = match tokio::time::timeout(self.job_timeout, &mut handle).await {
            Ok(Ok(result)) => result?,
            Ok(Err(join_err)) => return Err(GenerationError::Aborted(join_err.to_string())),
            Err(_) => {
                handle.abort();
                return Err(GenerationError::Timeout(self.job_timeout));
            }
        };

        let story = draft.validate()?;
        debug!(
            "[{}] Generated '{}' with {} nodes",
            task.job_id,
            story.title(),
            story.nodes().len()
        );

        let outcome = self
            .stories
            .store_for_job(&task.job_id, &task.session_id, &task.theme, &story)
            .await?;
        Ok(outcome)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryReport {
    pub failed: usize,
    pub redispatched: usize,
}

/// Job ids sitting in the queue, not yet taken by a worker.
#[derive(Clone, Default)]
struct QueuedJobs(Arc<StdMutex<HashSet<String>>>);

impl QueuedJobs {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `false` when the job is already queued.
    fn insert(&self, job_id: &str) -> bool {
        self.lock().insert(job_id.to_string())
    }

    fn remove(&self, job_id: &str) {
        self.lock().remove(job_id);
    }

    fn contains(&self, job_id: &str) -> bool {
        self.lock().contains(job_id)
    }
}

/// Bounded queue of generation tasks drained by a fixed set of workers, plus
/// a periodic sweep that fails orphaned jobs and re-dispatches stuck ones.
#[derive(Clone)]
pub struct GenerationPool {
    sender: mpsc::Sender<GenerationTask>,
    queued: QueuedJobs,
    jobs: JobService,
    config: WorkerConfig,
}

impl GenerationPool {
    /// Spawn the workers and the recovery sweep. Must run inside a Tokio runtime.
    pub fn start(worker: GenerationWorker, jobs: JobService, config: WorkerConfig) -> Self {
        let (pool, receiver) = Self::unstarted(jobs, config);
        let receiver = Arc::new(Mutex::new(receiver));

        for index in 0..pool.config.concurrency {
            let worker = worker.clone();
            let receiver = receiver.clone();
            let queued = pool.queued.clone();
            tokio::spawn(async move {
                loop {
                    let next = { receiver.lock().await.recv().await };
                    let Some(task) = next else {
                        debug!("Generation worker {} stopping: queue closed", index);
                        break;
                    };
                    queued.remove(&task.job_id);
                    let job_id = task.job_id.clone();
                    let outcome = worker.process(task).await;
                    debug!("Generation worker {} finished {}: {:?}", index, job_id, outcome);
                }
            });
        }

        pool.spawn_recovery_sweep();

        info!(
            "Generation pool started: {} workers, queue capacity {}, timeout {:?}",
            pool.config.concurrency, pool.config.queue_capacity, pool.config.job_timeout
        );
        pool
    }

    /// Pool and queue receiver with no workers attached.
    fn unstarted(jobs: JobService, config: WorkerConfig) -> (Self, mpsc::Receiver<GenerationTask>) {
        let (sender, receiver) = mpsc::channel::<GenerationTask>(config.queue_capacity);
        let pool = Self {
            sender,
            queued: QueuedJobs::default(),
            jobs,
            config,
        };
        (pool, receiver)
    }

    /// Queue a task without waiting. `false` when the queue is full or closed;
    /// the job then stays pending until the sweep re-dispatches it. A job that
    /// is already waiting in the queue is not queued twice.
    pub fn dispatch(&self, task: GenerationTask) -> bool {
        if !self.queued.insert(&task.job_id) {
            debug!("[{}] Already queued", task.job_id);
            return true;
        }

        match self.sender.try_send(task) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(task)) => {
                self.queued.remove(&task.job_id);
                warn!("Generation queue full; job {} left pending", task.job_id);
                false
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                self.queued.remove(&task.job_id);
                error!("Generation queue closed; job {} left pending", task.job_id);
                false
            }
        }
    }

    /// Fail orphaned `processing` jobs and re-dispatch stale `pending` ones.
    pub async fn recover(&self) -> CoreResult<RecoveryReport> {
        let now = Utc::now();
        let mut report = RecoveryReport::default();

        let stale_after = self.config.stale_after();
        let cutoff = now - to_chrono(stale_after)?;
        for job in self.jobs.stale_processing_jobs(cutoff).await? {
            let message = format!(
                "Generation did not finish within {:?}; job abandoned",
                stale_after
            );
            if self.jobs.mark_failed(&job.job_id, &message).await? {
                warn!("[{}] Failed orphaned job", job.job_id);
                report.failed += 1;
            }
        }

        let cutoff = now - to_chrono(self.config.redispatch_after)?;
        for job in self.jobs.stale_pending_jobs(cutoff).await? {
            if self.queued.contains(&job.job_id) {
                continue;
            }
            if self.dispatch(GenerationTask::from(&job)) {
                info!("[{}] Re-dispatched pending job", job.job_id);
                report.redispatched += 1;
            }
        }

        Ok(report)
    }

    fn spawn_recovery_sweep(&self) {
        let pool = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(pool.config.sweep_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // First tick fires immediately and covers jobs left by a previous process.
            loop {
                interval.tick().await;
                match pool.recover().await {
                    Ok(report) if report != RecoveryReport::default() => {
                        info!(
                            "Recovery sweep: {} failed, {} re-dispatched",
                            report.failed, report.redispatched
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!("Recovery sweep failed: {}", e),
                }
            }
        });
    }
}

fn to_chrono(duration: Duration) -> CoreResult<chrono::Duration> {
    chrono::Duration::from_std(duration)
        .map_err(|e| CoreError::internal("Duration out of range").with_source(e))
}
