use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::pipeline::{SyncPipeline, SyncRunSummary};

/// Runs the sync pipeline on a fixed interval.
///
/// A failed cycle is logged and the next tick runs as usual. A tick that fires
/// while the previous cycle is still running is skipped.
pub struct Scheduler {
    pipeline: Arc<SyncPipeline>,
    interval: Duration,
    running: Arc<Mutex<()>>,
    inner: Option<JobScheduler>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<SyncPipeline>, interval: Duration) -> Self {
        Self {
            pipeline,
            interval,
            running: Arc::new(Mutex::new(())),
            inner: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_started(&self) -> bool {
        self.inner.is_some()
    }

    /// One guarded cycle. `None` when the cycle failed or was skipped.
    pub async fn run_cycle(&self) -> Option<SyncRunSummary> {
        run_guarded(&self.pipeline, &self.running).await
    }

    pub async fn start(&mut self) -> Result<()> {
        if self.inner.is_some() {
            return Ok(());
        }
        let sched = JobScheduler::new().await.context("creating scheduler")?;
        let pipeline = Arc::clone(&self.pipeline);
        let running = Arc::clone(&self.running);
        let job = Job::new_repeated_async(self.interval, move |_uuid, _lock| {
            let pipeline = Arc::clone(&pipeline);
            let running = Arc::clone(&running);
            Box::pin(async move {
                run_guarded(&pipeline, &running).await;
            })
        })
        .with_context(|| format!("creating sync job every {:?}", self.interval))?;
        sched.add(job).await.context("adding sync job")?;
        sched.start().await.context("starting scheduler")?;
        info!(interval_secs = self.interval.as_secs(), "scheduler started");
        self.inner = Some(sched);
        Ok(())
    }

    /// Stops future ticks.
    pub async fn shutdown(&mut self) -> Result<()> {
        if let Some(mut sched) = self.inner.take() {
            sched.shutdown().await.context("stopping scheduler")?;
            info!("scheduler stopped");
        }
        Ok(())
    }
}

async fn run_guarded(pipeline: &SyncPipeline, running: &Mutex<()>) -> Option<SyncRunSummary> {
    let Ok(_guard) = running.try_lock() else {
        warn!("previous sync cycle still running; skipping tick");
        return None;
    };
    match pipeline.run_once().await {
        Ok(summary) => {
            info!(
                run_id = %summary.run_id,
                fetched = summary.fetched,
                created = summary.created,
                updated = summary.updated,
                failed_sources = summary.failed_sources.len(),
                "scheduled sync cycle finished"
            );
            Some(summary)
        }
        Err(err) => {
            error!(error = ?err, "scheduled sync cycle failed; waiting for next tick");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use jobscout_adapters::{FetchError, SourceAdapter};
    use jobscout_core::{RawPosting, SearchQuery, SourceInfo};
    use jobscout_storage::MemoryStore;

    use crate::aggregator::Aggregator;

    struct CountingBoard {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SourceAdapter for CountingBoard {
        fn source(&self) -> SourceInfo {
            SourceInfo::new("counting", "Counting Board")
        }

        async fn fetch(&self, _query: &SearchQuery, _limit: usize) -> Result<Vec<RawPosting>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![RawPosting {
                external_id: "1".into(),
                title: "Laravel Developer".into(),
                company: "ACME".into(),
                description: "Laravel APIs".into(),
                url: "https://counting.test/jobs/1".into(),
                ..Default::default()
            }])
        }
    }

    fn scheduler() -> (Scheduler, Arc<AtomicUsize>, Arc<MemoryStore>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let aggregator = Aggregator::builder()
            .adapter(CountingBoard {
                calls: Arc::clone(&calls),
            })
            .build();
        let store = Arc::new(MemoryStore::new());
        let pipeline = SyncPipeline::new(aggregator, store.clone(), SearchQuery::default(), 10);
        (Scheduler::new(Arc::new(pipeline), Duration::from_secs(60)), calls, store)
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let (scheduler, calls, store) = scheduler();
        let _held = scheduler.running.try_lock().unwrap();

        assert!(scheduler.run_cycle().await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn cycle_runs_again_once_guard_is_released() {
        let (scheduler, calls, store) = scheduler();
        {
            let _held = scheduler.running.try_lock().unwrap();
            assert!(scheduler.run_cycle().await.is_none());
        }

        let summary = scheduler.run_cycle().await.unwrap();
        assert_eq!(summary.created, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len().await, 1);

        let again = scheduler.run_cycle().await.unwrap();
        assert_eq!((again.created, again.updated), (0, 1));
    }
}
