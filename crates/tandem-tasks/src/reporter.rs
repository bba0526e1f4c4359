//! Task execution reporting

use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Events emitted while a stage runs across packages
#[derive(Debug, Clone, PartialEq)]
pub enum TaskEvent {
    /// A stage is starting
    StageStarted {
        stage: String,
        task_count: usize,
    },
    /// A package task is starting
    Started {
        stage: String,
        package: String,
    },
    /// A package task completed
    Completed {
        stage: String,
        package: String,
        duration: Duration,
    },
    /// A package task failed
    Failed {
        stage: String,
        package: String,
        duration: Duration,
        error: String,
    },
    /// A package task never ran
    Skipped {
        stage: String,
        package: String,
        reason: String,
    },
    /// A package stuck in a cycle was started ahead of its dependencies
    CycleReleased {
        stage: String,
        package: String,
    },
    /// Every task of the stage settled
    StageCompleted {
        stage: String,
        total: usize,
        succeeded: usize,
        failed: usize,
        duration: Duration,
    },
}

/// Trait for reporting task execution progress
pub trait TaskReporter: Send + Sync {
    /// Handle a task event
    fn report(&self, event: &TaskEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl TaskReporter for TracingReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::StageStarted { stage, task_count } => {
                tracing::info!(stage = %stage, tasks = task_count, "stage started");
            }
            TaskEvent::Started { stage, package } => {
                tracing::debug!(stage = %stage, package = %package, "task started");
            }
            TaskEvent::Completed {
                stage,
                package,
                duration,
            } => {
                tracing::info!(
                    stage = %stage,
                    package = %package,
                    "completed in {:.1}s",
                    duration.as_secs_f64()
                );
            }
            TaskEvent::Failed {
                stage,
                package,
                duration,
                error,
            } => {
                tracing::error!(
                    stage = %stage,
                    package = %package,
                    "failed after {:.1}s: {}",
                    duration.as_secs_f64(),
                    error
                );
            }
            TaskEvent::Skipped {
                stage,
                package,
                reason,
            } => {
                tracing::info!(stage = %stage, package = %package, "skipped: {}", reason);
            }
            TaskEvent::CycleReleased { stage, package } => {
                tracing::warn!(
                    stage = %stage,
                    package = %package,
                    "releasing package from a dependency cycle"
                );
            }
            TaskEvent::StageCompleted {
                stage,
                total,
                succeeded,
                failed,
                duration,
            } => {
                tracing::info!(
                    stage = %stage,
                    "{}/{} succeeded, {} failed ({:.1}s)",
                    succeeded,
                    total,
                    failed,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: Mutex<Vec<TaskEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<TaskEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl TaskReporter for CollectingReporter {
    fn report(&self, event: &TaskEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Fan-out to several reporters
pub struct TaskReporterRegistry {
    reporters: Vec<Arc<dyn TaskReporter>>,
}

impl TaskReporterRegistry {
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    pub fn register(&mut self, reporter: Arc<dyn TaskReporter>) {
        self.reporters.push(reporter);
    }

    pub fn all(&self) -> &[Arc<dyn TaskReporter>] {
        &self.reporters
    }
}

impl Default for TaskReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskReporter for TaskReporterRegistry {
    fn report(&self, event: &TaskEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}
