//! Progress bars for runner stages

use std::sync::Mutex;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use tandem_tasks::{TaskEvent, TaskReporter};

/// One bar per stage, advanced as packages settle
#[derive(Default)]
pub struct ProgressReporter {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{spinner:.green} {prefix:>8.bold} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl TaskReporter for ProgressReporter {
    fn report(&self, event: &TaskEvent) {
        match event {
            TaskEvent::StageStarted { stage, task_count } => {
                let bar = ProgressBar::new(*task_count as u64);
                bar.set_style(bar_style());
                bar.set_prefix(stage.clone());
                if let Ok(mut guard) = self.bar.lock() {
                    *guard = Some(bar);
                }
            }
            TaskEvent::Started { package, .. } => {
                self.with_bar(|bar| bar.set_message(package.clone()));
            }
            TaskEvent::Completed { .. } => self.with_bar(|bar| bar.inc(1)),
            TaskEvent::Failed { package, error, .. } => self.with_bar(|bar| {
                bar.println(format!("{} {}: {}", style("✗").red().bold(), package, error));
                bar.inc(1);
            }),
            TaskEvent::Skipped { .. } => {}
            TaskEvent::CycleReleased { package, .. } => self.with_bar(|bar| {
                bar.println(format!(
                    "{} {} is part of a dependency cycle, starting it anyway",
                    style("!").yellow().bold(),
                    package
                ));
            }),
            TaskEvent::StageCompleted { .. } => {
                if let Ok(mut guard) = self.bar.lock() {
                    if let Some(bar) = guard.take() {
                        bar.finish_and_clear();
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_bar_lifecycle() {
        let reporter = ProgressReporter::new();
        reporter.report(&TaskEvent::StageStarted {
            stage: "pack".to_string(),
            task_count: 2,
        });
        reporter.report(&TaskEvent::Completed {
            stage: "pack".to_string(),
            package: "a".to_string(),
            duration: Duration::from_millis(5),
        });
        reporter.with_bar(|bar| assert_eq!(bar.position(), 1));

        reporter.report(&TaskEvent::StageCompleted {
            stage: "pack".to_string(),
            total: 2,
            succeeded: 2,
            failed: 0,
            duration: Duration::from_millis(9),
        });
        assert!(reporter.bar.lock().unwrap().is_none());
    }
}
