// ABOUTME: At-most-one active pipeline per (target, environment).
// ABOUTME: Claims are refused, never queued, and released when the guard drops.

use super::error::{PipelineError, Result};
use crate::types::{Environment, TargetId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

type JobKey = (TargetId, Environment);

#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    active: Arc<Mutex<HashMap<JobKey, DateTime<Utc>>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the (target, environment) slot or fail with `JobInProgress`.
    pub fn claim(&self, target: &TargetId, environment: &Environment) -> Result<JobGuard> {
        let key = (target.clone(), environment.clone());
        let mut active = self.active.lock();
        if let Some(since) = active.get(&key) {
            return Err(PipelineError::JobInProgress {
                target: target.clone(),
                environment: environment.clone(),
                since: *since,
            });
        }
        active.insert(key.clone(), Utc::now());
        Ok(JobGuard {
            active: Arc::clone(&self.active),
            key,
        })
    }

    pub fn is_active(&self, target: &TargetId, environment: &Environment) -> bool {
        self.active
            .lock()
            .contains_key(&(target.clone(), environment.clone()))
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

/// A held pipeline slot.
pub struct JobGuard {
    active: Arc<Mutex<HashMap<JobKey, DateTime<Utc>>>>,
    key: JobKey,
}

impl std::fmt::Debug for JobGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobGuard")
            .field("target", &self.key.0)
            .field("environment", &self.key.1)
            .finish()
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.key);
    }
}
