// ABOUTME: Thread-safe hand-off of scheduled job futures onto the event loop
// ABOUTME: The sending half lives on the scheduler thread; the endpoint spawns jobs on the loop

use crate::error::ScheduledJobError;
use crate::metrics;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use uuid::Uuid;

/// A job's pending work, built off-loop and polled on the loop
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;

/// Result of handing a job to the loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Submitted,
    /// The loop endpoint is not running; the work was discarded
    Dropped,
}

struct Submission {
    job: String,
    run_id: Uuid,
    future: JobFuture,
}

/// Sending half, safe to call from any thread while the loop is busy
#[derive(Clone)]
pub struct SubmissionBridge {
    tx: mpsc::UnboundedSender<Submission>,
    running: Arc<AtomicBool>,
}

/// Receiving half, driven by the event loop
pub struct BridgeEndpoint {
    rx: mpsc::UnboundedReceiver<Submission>,
    running: Arc<AtomicBool>,
}

/// Create a connected bridge pair
pub fn submission_bridge() -> (SubmissionBridge, BridgeEndpoint) {
    let (tx, rx) = mpsc::unbounded_channel();
    let running = Arc::new(AtomicBool::new(false));
    (
        SubmissionBridge {
            tx,
            running: Arc::clone(&running),
        },
        BridgeEndpoint { rx, running },
    )
}

impl SubmissionBridge {
    /// Hand `future` to the event loop without waiting for it
    pub fn submit(&self, job: &str, future: JobFuture) -> SubmitOutcome {
        if !self.running.load(Ordering::Acquire) {
            tracing::warn!(job = %job, "Event loop not running, dropping scheduled job");
            metrics::record_job_dropped(job);
            return SubmitOutcome::Dropped;
        }

        let submission = Submission {
            job: job.to_string(),
            run_id: Uuid::new_v4(),
            future,
        };
        let run_id = submission.run_id;

        if self.tx.send(submission).is_err() {
            tracing::warn!(job = %job, "Event loop endpoint closed, dropping scheduled job");
            metrics::record_job_dropped(job);
            return SubmitOutcome::Dropped;
        }

        tracing::debug!(job = %job, run_id = %run_id, "Submitted scheduled job");
        metrics::record_job_submitted(job);
        SubmitOutcome::Submitted
    }

    /// Whether the loop endpoint is currently accepting work
    pub fn is_attached(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

/// Clears the running flag however the endpoint stops
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl BridgeEndpoint {
    /// Receive submissions until every sender is gone, spawning each as its own task.
    ///
    /// Must be awaited on the event loop's runtime.
    pub async fn run(mut self) {
        self.running.store(true, Ordering::Release);
        let _guard = RunningGuard(Arc::clone(&self.running));
        tracing::info!("Scheduled job endpoint attached to event loop");

        while let Some(submission) = self.rx.recv().await {
            tokio::spawn(run_job(submission));
        }

        tracing::info!("Scheduled job endpoint detached");
    }
}

async fn run_job(submission: Submission) {
    let Submission {
        job,
        run_id,
        future,
    } = submission;

    tracing::info!(job = %job, run_id = %run_id, "Running scheduled job");
    let started = Instant::now();
    let result = future.await;
    let elapsed = started.elapsed();
    metrics::record_job_duration(&job, elapsed);

    match result {
        Ok(()) => {
            tracing::info!(
                job = %job,
                run_id = %run_id,
                elapsed_ms = elapsed.as_millis() as u64,
                "Scheduled job completed"
            );
        }
        Err(source) => {
            metrics::record_job_failure(&job);
            let err = ScheduledJobError { job, source };
            tracing::error!(run_id = %run_id, error = %err, "Scheduled job failed");
        }
    }
}
