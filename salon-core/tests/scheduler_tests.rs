// ABOUTME: Tests for the scheduler thread driving jobs onto a current-thread event loop
// ABOUTME: Covers the full path from schedule tick through the bridge to job execution

use chrono::Utc;
use salon_core::scheduler::{JobTable, RecurringJob, ScheduleRule, Scheduler, SchedulerThread};
use salon_core::submission_bridge;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_interval_job_runs_on_event_loop() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let (bridge, endpoint) = submission_bridge();
    let runs = Arc::new(AtomicUsize::new(0));
    let loop_thread = std::thread::current().id();
    let ran_on_loop = Arc::new(std::sync::Mutex::new(Vec::new()));

    let mut table = JobTable::new();
    {
        let runs = Arc::clone(&runs);
        let ran_on_loop = Arc::clone(&ran_on_loop);
        table
            .add(RecurringJob::new(
                "tick",
                ScheduleRule::Every(Duration::from_secs(1)),
                move || {
                    let runs = Arc::clone(&runs);
                    let ran_on_loop = Arc::clone(&ran_on_loop);
                    async move {
                        ran_on_loop
                            .lock()
                            .unwrap()
                            .push(std::thread::current().id());
                        runs.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            ))
            .unwrap();
    }

    rt.block_on(async {
        tokio::spawn(endpoint.run());
        tokio::task::yield_now().await;

        let scheduler = Scheduler::new(table, chrono_tz::UTC, bridge, Utc::now());
        let thread = SchedulerThread::spawn(scheduler, Duration::from_millis(50)).unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while runs.load(Ordering::SeqCst) < 1 {
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .unwrap();

        thread.shutdown();
    });

    let threads = ran_on_loop.lock().unwrap();
    assert!(!threads.is_empty());
    assert!(threads.iter().all(|id| *id == loop_thread));
}

#[test]
fn test_job_failure_is_contained() {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (bridge, endpoint) = submission_bridge();
    let after = Arc::new(AtomicUsize::new(0));

    let mut table = JobTable::new();
    table
        .add(RecurringJob::new(
            "broken",
            ScheduleRule::Every(Duration::from_secs(1)),
            || async { anyhow::bail!("upstream API down") },
        ))
        .unwrap();
    {
        let after = Arc::clone(&after);
        table
            .add(RecurringJob::new(
                "healthy",
                ScheduleRule::Every(Duration::from_secs(1)),
                move || {
                    let after = Arc::clone(&after);
                    async move {
                        after.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                },
            ))
            .unwrap();
    }

    rt.block_on(async {
        tokio::spawn(endpoint.run());
        tokio::task::yield_now().await;
        let mut scheduler = Scheduler::new(table, chrono_tz::UTC, bridge, Utc::now());

        let report = scheduler.run_pending(Utc::now() + chrono::Duration::seconds(1));
        assert_eq!(report.submitted, vec!["broken", "healthy"]);

        tokio::time::timeout(Duration::from_secs(2), async {
            while after.load(Ordering::SeqCst) < 1 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    });
}
