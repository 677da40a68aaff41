//! Indexing job bookkeeping store.

use async_trait::async_trait;
use plinth_core::{
    EntityId, IndexingJob, IndexingJobStatus, IndexingJobType, PlinthResult, StorageError,
};
use tokio::sync::RwLock;

/// Store for [`IndexingJob`] bookkeeping rows.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn create(&self, job: IndexingJob) -> PlinthResult<IndexingJob>;

    /// Persist updated job progress. Fails for unknown jobs.
    async fn update(&self, job: &IndexingJob) -> PlinthResult<()>;

    async fn get(&self, job_id: EntityId) -> PlinthResult<Option<IndexingJob>>;

    /// The most recent jobs, newest first.
    async fn recent(&self, limit: usize) -> PlinthResult<Vec<IndexingJob>>;

    /// The most recently completed job of the given type.
    async fn latest_completed(
        &self,
        job_type: IndexingJobType,
    ) -> PlinthResult<Option<IndexingJob>>;

    /// Jobs currently in the Running state.
    async fn running(&self) -> PlinthResult<Vec<IndexingJob>>;
}

/// In-memory job store.
pub struct InMemoryJobStore {
    jobs: RwLock<Vec<IndexingJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(&self, job: IndexingJob) -> PlinthResult<IndexingJob> {
        let mut jobs = self.jobs.write().await;
        jobs.push(job.clone());
        Ok(job)
    }

    async fn update(&self, job: &IndexingJob) -> PlinthResult<()> {
        let mut jobs = self.jobs.write().await;
        match jobs.iter_mut().find(|j| j.job_id == job.job_id) {
            Some(stored) => {
                *stored = job.clone();
                Ok(())
            }
            None => Err(StorageError::QueryFailed {
                reason: format!("unknown indexing job {}", job.job_id),
            }
            .into()),
        }
    }

    async fn get(&self, job_id: EntityId) -> PlinthResult<Option<IndexingJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs.iter().find(|j| j.job_id == job_id).cloned())
    }

    async fn recent(&self, limit: usize) -> PlinthResult<Vec<IndexingJob>> {
        let jobs = self.jobs.read().await;
        let mut recent: Vec<IndexingJob> = jobs.clone();
        recent.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn latest_completed(
        &self,
        job_type: IndexingJobType,
    ) -> PlinthResult<Option<IndexingJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .iter()
            .filter(|j| j.job_type == job_type && j.status == IndexingJobStatus::Completed)
            .max_by_key(|j| j.completed_at)
            .cloned())
    }

    async fn running(&self) -> PlinthResult<Vec<IndexingJob>> {
        let jobs = self.jobs.read().await;
        Ok(jobs
            .iter()
            .filter(|j| j.status == IndexingJobStatus::Running)
            .cloned()
            .collect())
    }
}
