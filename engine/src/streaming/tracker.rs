use std::collections::HashMap;

use stream_event::EngineEvent;

use crate::model::{Job, JobStatus, StepStatus};

/// Remembered state for one step execution, enough to detect status changes and
/// newly-appended chunks between diffs.
struct StepMemory {
    status: StepStatus,
    chunk_count: usize,
}

/// Diffs consecutive [`Job`] snapshots into the ordered event sequence described in
/// spec §4.6. Construct one fresh instance per stream subscription.
#[derive(Default)]
pub struct StreamingTracker {
    last_status: Option<JobStatus>,
    job_started_emitted: bool,
    steps: HashMap<String, StepMemory>,
    last_item_count: usize,
    stream_finished_emitted: bool,
}

impl StreamingTracker {
    /// A job always starts at `queued` with every step `pending` (spec §4.5 entry);
    /// seeding that as the tracker's baseline means the first real `diff()` call
    /// only reports genuine transitions, not the job's creation itself (the HTTP
    /// layer emits `job_queued` separately, per spec §4.7).
    pub fn new() -> Self {
        StreamingTracker {
            last_status: Some(JobStatus::Queued),
            ..Self::default()
        }
    }

    /// Returns the events this job snapshot newly implies, in emission order.
    /// Once `stream_finished` has been produced, further calls return nothing.
    pub fn diff(&mut self, job: &Job) -> Vec<EngineEvent> {
        if self.stream_finished_emitted {
            return Vec::new();
        }

        let mut events = Vec::new();
        let job_value = serde_json::to_value(job).expect("Job always serializes");

        // 1. job.status transition, minus the terminal/stream_finished tail: those
        // must come after steps 2-4 below so `stream_finished` stays the very last
        // event even when a single snapshot carries both a step-terminal and a
        // job-terminal transition (e.g. cancel_job/fail_step write both in one
        // store update).
        let became_terminal = self.last_status != Some(job.status) && job.status.is_terminal();
        if self.last_status != Some(job.status) {
            if job.status == JobStatus::Running && !self.job_started_emitted {
                events.push(EngineEvent::JobStarted {
                    job: job_value.clone(),
                });
                self.job_started_emitted = true;
            }
            events.push(EngineEvent::JobStatus {
                job: job_value.clone(),
            });
            self.last_status = Some(job.status);
        }

        // 2. Step status transitions, in definition order.
        for step in &job.step_executions {
            let memory = self.steps.entry(step.step_id.clone()).or_insert(StepMemory {
                status: StepStatus::Pending,
                chunk_count: 0,
            });
            if memory.status != step.status {
                let step_value = serde_json::to_value(step).expect("StepExecution always serializes");
                events.push(step_event(step.status, step_value));
                memory.status = step.status;
            }
        }

        // 3. New chunks, in index order, per step in definition order.
        for step in &job.step_executions {
            let memory = self.steps.get_mut(&step.step_id).expect("inserted above");
            while memory.chunk_count < step.chunks.len() {
                let chunk = &step.chunks[memory.chunk_count];
                events.push(EngineEvent::ProviderChunk {
                    chunk: serde_json::to_value(chunk).expect("Chunk always serializes"),
                });
                memory.chunk_count += 1;
            }
        }

        // 4. New result items, in production order.
        if let Some(result) = &job.result {
            while self.last_item_count < result.items.len() {
                let item = &result.items[self.last_item_count];
                events.push(EngineEvent::ItemCompleted {
                    item: serde_json::to_value(item).expect("ResultItem always serializes"),
                });
                self.last_item_count += 1;
            }
        }

        // 5. Terminal job event + stream_finished, unconditionally last.
        if became_terminal {
            events.push(terminal_event(job.status, job_value));
            events.push(EngineEvent::StreamFinished);
            self.stream_finished_emitted = true;
        }

        events
    }
}

fn terminal_event(status: JobStatus, job: serde_json::Value) -> EngineEvent {
    match status {
        JobStatus::Succeeded => EngineEvent::JobCompleted { job },
        JobStatus::Failed => EngineEvent::JobFailed { job },
        JobStatus::Cancelled => EngineEvent::JobCancelled { job },
        _ => unreachable!("terminal_event only called for terminal statuses"),
    }
}

fn step_event(status: StepStatus, step: serde_json::Value) -> EngineEvent {
    match status {
        StepStatus::Running => EngineEvent::StepStarted { step },
        StepStatus::Success => EngineEvent::StepCompleted { step },
        StepStatus::Failed => EngineEvent::StepFailed { step },
        StepStatus::Cancelled => EngineEvent::StepCancelled { step },
        // `Pending` is the initial state (never a transition target) and `Skipped`
        // has no dedicated wire event in spec §4.6; both are silently absorbed.
        StepStatus::Pending | StepStatus::Skipped => EngineEvent::StepStarted { step },
    }
}
