use super::action::{BanAction, BanActionError};
use super::request::BanParams;
use crate::shared::{JobId, TenantId, UserId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub requester_id: UserId,
    pub tenant_id: TenantId,
    pub candidate_ids: Vec<String>,
    pub params: BanParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobProgress {
    pub processed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSummary {
    pub job_id: JobId,
    pub total: usize,
    pub processed: usize,
    pub failed: Vec<String>,
}

impl JobSummary {
    pub fn passed(&self) -> usize {
        self.processed.saturating_sub(self.failed.len())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed(JobSummary),
    Cancelled(JobSummary),
}

impl JobOutcome {
    pub fn summary(&self) -> &JobSummary {
        match self {
            Self::Completed(summary) | Self::Cancelled(summary) => summary,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Requested,
    AlreadyRequested,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("job {0} is not registered")]
    NotFound(JobId),
    #[error("job {0} is already running")]
    AlreadyRunning(JobId),
}

#[derive(Debug)]
pub struct JobHandle {
    job_id: JobId,
    requester_id: UserId,
    tenant_id: TenantId,
    candidate_ids: Vec<String>,
    params: BanParams,
    processed: AtomicUsize,
    cancel_requested: AtomicBool,
    running: AtomicBool,
    failed: Mutex<Vec<String>>,
}

impl JobHandle {
    fn new(job_id: JobId, spec: JobSpec) -> Self {
        Self {
            job_id,
            requester_id: spec.requester_id,
            tenant_id: spec.tenant_id,
            candidate_ids: spec.candidate_ids,
            params: spec.params,
            processed: AtomicUsize::new(0),
            cancel_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
            failed: Mutex::new(Vec::new()),
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn requester_id(&self) -> &UserId {
        &self.requester_id
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn candidate_ids(&self) -> &[String] {
        &self.candidate_ids
    }

    pub fn params(&self) -> &BanParams {
        &self.params
    }

    pub fn total(&self) -> usize {
        self.candidate_ids.len()
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Acquire)
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    pub fn progress(&self) -> JobProgress {
        JobProgress {
            processed: self.processed(),
            total: self.total(),
        }
    }

    pub fn failed(&self) -> Vec<String> {
        self.lock_failed().clone()
    }

    fn request_cancel(&self) -> StopOutcome {
        if self.cancel_requested.swap(true, Ordering::AcqRel) {
            StopOutcome::AlreadyRequested
        } else {
            StopOutcome::Requested
        }
    }

    fn record_failure(&self, candidate_id: &str) {
        self.lock_failed().push(candidate_id.to_string());
    }

    fn lock_failed(&self) -> MutexGuard<'_, Vec<String>> {
        self.failed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn summary(&self) -> JobSummary {
        JobSummary {
            job_id: self.job_id.clone(),
            total: self.total(),
            processed: self.processed(),
            failed: self.failed(),
        }
    }
}

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: Mutex<HashMap<JobId, Arc<JobHandle>>>,
}

struct RegistrationGuard<'a> {
    registry: &'a JobRegistry,
    job_id: &'a JobId,
}

impl Drop for RegistrationGuard<'_> {
    fn drop(&mut self) {
        self.registry.remove(self.job_id);
    }
}

impl JobRegistry {
    pub fn create_job(&self, spec: JobSpec) -> JobId {
        let mut jobs = self.lock();
        let mut job_id = JobId::generate();
        while jobs.contains_key(&job_id) {
            job_id = JobId::generate();
        }
        jobs.insert(
            job_id.clone(),
            Arc::new(JobHandle::new(job_id.clone(), spec)),
        );
        job_id
    }

    pub fn get(&self, job_id: &JobId) -> Option<Arc<JobHandle>> {
        self.lock().get(job_id).cloned()
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.lock().contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn stop(&self, job_id: &JobId) -> StopOutcome {
        match self.get(job_id) {
            Some(handle) => handle.request_cancel(),
            None => StopOutcome::NotFound,
        }
    }

    pub fn view_progress(&self, job_id: &JobId) -> Option<JobProgress> {
        self.get(job_id).map(|handle| handle.progress())
    }

    pub fn run(&self, job_id: &JobId, action: &dyn BanAction) -> Result<JobOutcome, JobError> {
        self.run_with_observer(job_id, action, |_, _| {})
    }

    pub fn run_with_observer<F>(
        &self,
        job_id: &JobId,
        action: &dyn BanAction,
        mut on_failure: F,
    ) -> Result<JobOutcome, JobError>
    where
        F: FnMut(&str, &BanActionError),
    {
        let handle = self
            .get(job_id)
            .ok_or_else(|| JobError::NotFound(job_id.clone()))?;
        if handle.running.swap(true, Ordering::AcqRel) {
            return Err(JobError::AlreadyRunning(job_id.clone()));
        }
        let _registration = RegistrationGuard {
            registry: self,
            job_id: handle.job_id(),
        };

        for candidate_id in handle.candidate_ids() {
            if handle.cancel_requested() {
                return Ok(JobOutcome::Cancelled(handle.summary()));
            }
            if let Err(err) = action.ban(handle.tenant_id(), candidate_id, handle.params()) {
                handle.record_failure(candidate_id);
                on_failure(candidate_id, &err);
            }
            handle.processed.fetch_add(1, Ordering::AcqRel);
        }

        Ok(JobOutcome::Completed(handle.summary()))
    }

    fn remove(&self, job_id: &JobId) {
        self.lock().remove(job_id);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, Arc<JobHandle>>> {
        self.jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
