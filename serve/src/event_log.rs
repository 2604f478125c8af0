//! Per-job event log (spec §4.7): seq-stamps every event a job ever emits and
//! retains it so `after_seq` resume works after the live stream has ended.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use engine::Executor;
use serde_json::Value;
use stream_event::{EngineEvent, SeqState};
use tokio::sync::{Mutex, Notify};

const PUMP_POLL_INTERVAL: Duration = Duration::from_millis(20);
const WAITER_SAFETY_NET: Duration = Duration::from_millis(200);

/// One job's retained, seq-stamped event history.
pub struct EventLog {
    entries: Mutex<Vec<Value>>,
    notify: Notify,
    finished: AtomicBool,
}

impl EventLog {
    fn new() -> Self {
        EventLog {
            entries: Mutex::new(Vec::new()),
            notify: Notify::new(),
            finished: AtomicBool::new(false),
        }
    }

    async fn append(&self, event: Value) {
        let is_finished = event.get("event").and_then(Value::as_str) == Some("stream_finished");
        self.entries.lock().await.push(event);
        if is_finished {
            self.finished.store(true, Ordering::SeqCst);
        }
        self.notify.notify_waiters();
    }

    /// Events with `seq > after_seq`, in order, as of this call.
    pub async fn since(&self, after_seq: u64) -> Vec<Value> {
        self.entries
            .lock()
            .await
            .iter()
            .filter(|e| e.get("seq").and_then(Value::as_u64).unwrap_or(0) > after_seq)
            .cloned()
            .collect()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }

    /// Waits until new events may be available: either a waiter is woken
    /// directly, or (as a safety net against a missed wakeup between the
    /// caller's last check and this call) a short interval elapses and the
    /// caller re-checks on its own.
    pub async fn wait_for_more(&self) {
        let notified = self.notify.notified();
        tokio::select! {
            _ = notified => {},
            _ = tokio::time::sleep(WAITER_SAFETY_NET) => {},
        }
    }
}

/// Job id -> `EventLog`, plus the background pump task that feeds each one.
#[derive(Clone, Default)]
pub struct EventLogRegistry {
    logs: Arc<DashMap<String, Arc<EventLog>>>,
}

impl EventLogRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the log for `job_id`, creating it and spawning its pump task if
    /// absent. `seed`, when given, is stamped as the log's very first entry
    /// before the pump's own diffs take over — this is how `job_queued` gets
    /// into the log, since it is the HTTP boundary's own event and never
    /// something the Streaming Tracker produces (spec §4.7: a job's log "starts
    /// at seq = 1 with the `job_queued` event emitted by the HTTP layer"). A
    /// log with no seed is the fallback path (spec §4.7): it is built entirely
    /// by polling the store and synthesizing events from state snapshots.
    pub async fn ensure(
        &self,
        executor: Executor,
        job_id: &str,
        seed: Option<EngineEvent>,
    ) -> Arc<EventLog> {
        if let Some(existing) = self.logs.get(job_id) {
            return existing.clone();
        }
        let log = Arc::new(EventLog::new());
        self.logs.insert(job_id.to_string(), log.clone());
        let pump_log = log.clone();
        let pump_job_id = job_id.to_string();
        tokio::spawn(run_pump(executor, pump_job_id, pump_log, seed));
        log
    }
}

/// Polls the job store and diffs successive snapshots through a fresh
/// `StreamingTracker`, stamping every event it yields into `log` until
/// `stream_finished` is produced (or the job vanishes from the store, which
/// should not happen since jobs are never deleted).
async fn run_pump(executor: Executor, job_id: String, log: Arc<EventLog>, seed: Option<EngineEvent>) {
    let mut seq = SeqState::new(job_id.clone());
    if let Some(event) = seed {
        if let Ok(stamped) = seq.stamp(&event) {
            log.append(stamped).await;
        }
    }

    let mut tracker = engine::StreamingTracker::new();
    loop {
        let job = match executor.store().get(&job_id).await {
            Ok(job) => job,
            Err(_) => return,
        };
        let events = tracker.diff(&job);
        let mut finished = false;
        for event in &events {
            if let Ok(stamped) = seq.stamp(event) {
                log.append(stamped).await;
            }
            if event.name() == "stream_finished" {
                finished = true;
            }
        }
        if finished {
            return;
        }
        tokio::time::sleep(PUMP_POLL_INTERVAL).await;
    }
}
