//! Registry of in-flight pipeline runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};
use tracing::info;

/// Cancellation flag shared between a run and its registry entry
///
/// Audit writes hold the write gate, and cancelling takes it too, so once
/// `cancel` returns no write of the run is in progress or still to come.
#[derive(Debug, Clone, Default)]
pub struct JobHandle {
    cancelled: Arc<AtomicBool>,
    writes: Arc<Mutex<()>>,
}

impl JobHandle {
    /// Mark the run cancelled, waiting for an in-progress write to land
    pub async fn cancel(&self) {
        let _writes = self.writes.lock().await;
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Enter the write gate. `None` if the run was cancelled.
    pub async fn begin_write(&self) -> Option<MutexGuard<'_, ()>> {
        let guard = self.writes.lock().await;
        (!self.is_cancelled()).then_some(guard)
    }

    fn same_job(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cancelled, &other.cancelled)
    }
}

/// In-flight runs keyed by image id
#[derive(Debug, Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, JobHandle>>>,
}

impl JobRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run for `image_id`.
    ///
    /// A run already registered for the same image is cancelled, so only
    /// the newest run writes to the audit trail.
    pub async fn register(&self, image_id: &str) -> JobHandle {
        let handle = JobHandle::default();
        let previous = self
            .jobs
            .write()
            .await
            .insert(image_id.to_string(), handle.clone());
        if let Some(previous) = previous {
            info!("Superseding running job for image {}", image_id);
            previous.cancel().await;
        }
        handle
    }

    /// Cancel the run for `image_id`. Returns false if none is running.
    pub async fn cancel(&self, image_id: &str) -> bool {
        let removed = self.jobs.write().await.remove(image_id);
        match removed {
            Some(handle) => {
                info!("Cancelling job for image {}", image_id);
                handle.cancel().await;
                true
            }
            None => false,
        }
    }

    /// Drop the entry of a finished run, unless a newer run replaced it
    pub async fn finish(&self, image_id: &str, handle: &JobHandle) {
        let mut jobs = self.jobs.write().await;
        if jobs.get(image_id).is_some_and(|current| current.same_job(handle)) {
            jobs.remove(image_id);
        }
    }

    pub async fn is_running(&self, image_id: &str) -> bool {
        self.jobs.read().await.contains_key(image_id)
    }

    pub async fn running_jobs(&self) -> usize {
        self.jobs.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_register_and_finish() {
        let registry = JobRegistry::new();
        let handle = registry.register("img").await;
        assert!(registry.is_running("img").await);

        registry.finish("img", &handle).await;
        assert!(!registry.is_running("img").await);
        assert!(!handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_flips_flag() {
        let registry = JobRegistry::new();
        let handle = registry.register("img").await;

        assert!(registry.cancel("img").await);
        assert!(handle.is_cancelled());
        assert!(!registry.cancel("img").await);
        assert_eq!(registry.running_jobs().await, 0);
    }

    #[tokio::test]
    async fn test_newer_run_supersedes_older() {
        let registry = JobRegistry::new();
        let first = registry.register("img").await;
        let second = registry.register("img").await;

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());

        // The older run finishing must not drop the newer entry
        registry.finish("img", &first).await;
        assert!(registry.is_running("img").await);
    }

    #[tokio::test]
    async fn test_cancel_waits_for_open_write() {
        let handle = JobHandle::default();
        let write = handle.begin_write().await.unwrap();

        let cancelling = {
            let handle = handle.clone();
            tokio::spawn(async move { handle.cancel().await })
        };
        tokio::task::yield_now().await;
        assert!(!handle.is_cancelled());
        assert!(!cancelling.is_finished());

        drop(write);
        cancelling.await.unwrap();
        assert!(handle.is_cancelled());
        assert!(handle.begin_write().await.is_none());
    }
}
