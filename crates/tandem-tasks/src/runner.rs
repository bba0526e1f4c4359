//! Topological task runner on tokio
//!
//! A package's task is started once every dependency inside the run has
//! finished. Independent packages run side by side up to the concurrency
//! budget. The first failure stops new tasks from starting; tasks already
//! running are allowed to settle.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::task::JoinSet;
use tracing::warn;

use tandem_core::error::{CycleError, TandemError};
use tandem_core::monorepo::graph::{component_ids, cycle_release, strongly_connected};

use crate::error::{RunError, RunFailure, TaskFailure};
use crate::limit::ConcurrencyLimit;
use crate::reporter::{TaskEvent, TaskReporter, TracingReporter};

/// What to do with dependency cycles among the tasks of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CyclePolicy {
    /// Fail before any task starts, naming the cycle
    Reject,
    /// Warn, then start a stuck cycle member that waits on nothing
    /// outside its cycle, in declaration order
    #[default]
    Warn,
}

/// Options for the task runner
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Maximum concurrent tasks
    pub concurrency: usize,
    /// Cycle handling
    pub cycle_policy: CyclePolicy,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            concurrency: num_cpus(),
            cycle_policy: CyclePolicy::default(),
        }
    }
}

fn num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Queued,
    Done,
    Failed,
    Skipped,
}

enum Attempt<T> {
    Ran(Result<T, TandemError>, Duration),
    /// The run was stopped while the task waited for a slot
    Skipped,
}

/// Runs one task per package in dependency order
pub struct TopologicalRunner {
    options: RunnerOptions,
    reporter: Arc<dyn TaskReporter>,
}

impl TopologicalRunner {
    pub fn new(options: RunnerOptions) -> Self {
        Self {
            options,
            reporter: Arc::new(TracingReporter),
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn TaskReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.options
    }

    /// Run `task` for every package in `edges`.
    ///
    /// `edges` pairs each package with the packages it depends on; names
    /// outside the run are ignored. Successful results come back in the
    /// order the tasks finished.
    pub async fn run<T, F, Fut>(
        &self,
        stage: &str,
        edges: Vec<(String, Vec<String>)>,
        task: F,
    ) -> Result<Vec<(String, T)>, RunError>
    where
        T: Send + 'static,
        F: Fn(String, ConcurrencyLimit) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TandemError>> + Send + 'static,
    {
        let start = Instant::now();
        let names: Vec<String> = edges.iter().map(|(name, _)| name.clone()).collect();
        let count = names.len();
        let index: HashMap<String, usize> = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (i, (_, deps)) in edges.iter().enumerate() {
            for dep in deps {
                if let Some(&j) = index.get(dep) {
                    if j != i && !dependencies[i].contains(&j) {
                        dependencies[i].push(j);
                    }
                }
            }
        }
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
        for (i, deps) in dependencies.iter().enumerate() {
            for &j in deps {
                dependents[j].push(i);
            }
        }

        let cycles: Vec<Vec<String>> = strongly_connected(&dependencies)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|component| component.into_iter().map(|i| names[i].clone()).collect())
            .collect();
        if let Some(first) = cycles.first() {
            if self.options.cycle_policy == CyclePolicy::Reject {
                return Err(CycleError {
                    members: first.clone(),
                }
                .into());
            }
            for members in &cycles {
                warn!(
                    stage,
                    members = %members.join(", "),
                    "dependency cycle, ordering within it is best effort"
                );
            }
        }

        self.reporter.report(&TaskEvent::StageStarted {
            stage: stage.to_string(),
            task_count: count,
        });

        let components = component_ids(&dependencies);
        let mut waiting_on: Vec<usize> = dependencies.iter().map(Vec::len).collect();
        let mut state = vec![State::Pending; count];
        let mut queue: VecDeque<usize> = VecDeque::new();
        for i in 0..count {
            if waiting_on[i] == 0 {
                state[i] = State::Queued;
                queue.push_back(i);
            }
        }

        let limit = ConcurrencyLimit::new(self.options.concurrency);
        let aborted = Arc::new(AtomicBool::new(false));
        let task = Arc::new(task);
        let mut running: JoinSet<(usize, Attempt<T>)> = JoinSet::new();

        let mut results = Vec::new();
        let mut completed = Vec::new();
        let mut failures = Vec::new();

        loop {
            if !aborted.load(Ordering::SeqCst) {
                while let Some(i) = queue.pop_front() {
                    let name = names[i].clone();
                    let stage = stage.to_string();
                    let task = task.clone();
                    let limit = limit.clone();
                    let aborted = aborted.clone();
                    let reporter = self.reporter.clone();

                    let inner = async move {
                        let Some(_permit) = limit.acquire().await else {
                            return Attempt::Skipped;
                        };
                        if aborted.load(Ordering::SeqCst) {
                            return Attempt::Skipped;
                        }
                        reporter.report(&TaskEvent::Started {
                            stage,
                            package: name.clone(),
                        });
                        let started = Instant::now();
                        let result = task(name, limit.clone()).await;
                        Attempt::Ran(result, started.elapsed())
                    };
                    // a panicking task becomes a failure of that package
                    running.spawn(async move {
                        let attempt = match tokio::spawn(inner).await {
                            Ok(attempt) => attempt,
                            Err(e) => Attempt::Ran(
                                Err(TandemError::other(format!("task panicked: {}", e))),
                                Duration::ZERO,
                            ),
                        };
                        (i, attempt)
                    });
                }
            }

            if running.is_empty() {
                if aborted.load(Ordering::SeqCst) {
                    break;
                }
                let started: Vec<bool> = state.iter().map(|s| *s != State::Pending).collect();
                match cycle_release(&dependencies, &components, &started) {
                    None => break,
                    Some(i) => {
                        // every remaining package waits on a cycle
                        self.reporter.report(&TaskEvent::CycleReleased {
                            stage: stage.to_string(),
                            package: names[i].clone(),
                        });
                        state[i] = State::Queued;
                        queue.push_back(i);
                        continue;
                    }
                }
            }

            let Some(joined) = running.join_next().await else {
                continue;
            };
            let Ok((i, attempt)) = joined else {
                // outer wrapper was cancelled; stop scheduling
                aborted.store(true, Ordering::SeqCst);
                continue;
            };

            match attempt {
                Attempt::Skipped => state[i] = State::Skipped,
                Attempt::Ran(Ok(value), duration) => {
                    state[i] = State::Done;
                    self.reporter.report(&TaskEvent::Completed {
                        stage: stage.to_string(),
                        package: names[i].clone(),
                        duration,
                    });
                    completed.push(names[i].clone());
                    results.push((names[i].clone(), value));
                    for &d in &dependents[i] {
                        waiting_on[d] = waiting_on[d].saturating_sub(1);
                        if waiting_on[d] == 0 && state[d] == State::Pending {
                            state[d] = State::Queued;
                            queue.push_back(d);
                        }
                    }
                }
                Attempt::Ran(Err(error), duration) => {
                    state[i] = State::Failed;
                    aborted.store(true, Ordering::SeqCst);
                    self.reporter.report(&TaskEvent::Failed {
                        stage: stage.to_string(),
                        package: names[i].clone(),
                        duration,
                        error: error.to_string(),
                    });
                    failures.push(TaskFailure {
                        package: names[i].clone(),
                        error,
                    });
                }
            }
        }

        let skipped: Vec<String> = (0..count)
            .filter(|&i| !matches!(state[i], State::Done | State::Failed))
            .map(|i| names[i].clone())
            .collect();
        for package in &skipped {
            self.reporter.report(&TaskEvent::Skipped {
                stage: stage.to_string(),
                package: package.clone(),
                reason: "an earlier task failed".to_string(),
            });
        }
        self.reporter.report(&TaskEvent::StageCompleted {
            stage: stage.to_string(),
            total: count,
            succeeded: completed.len(),
            failed: failures.len(),
            duration: start.elapsed(),
        });

        if failures.is_empty() {
            Ok(results)
        } else {
            Err(RunFailure {
                failures,
                completed,
                skipped,
            }
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::CollectingReporter;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    fn edges(rows: &[(&str, &[&str])]) -> Vec<(String, Vec<String>)> {
        rows.iter()
            .map(|(name, deps)| (name.to_string(), deps.iter().map(|d| d.to_string()).collect()))
            .collect()
    }

    fn runner(concurrency: usize, cycle_policy: CyclePolicy) -> TopologicalRunner {
        TopologicalRunner::new(RunnerOptions {
            concurrency,
            cycle_policy,
        })
    }

    fn four_cycle() -> Vec<(String, Vec<String>)> {
        edges(&[("a", &["b"]), ("b", &["c"]), ("c", &["d"]), ("d", &["a"])])
    }

    #[tokio::test(start_paused = true)]
    async fn test_dependencies_finish_before_dependents_start() {
        let spans: Arc<Mutex<HashMap<String, (tokio::time::Instant, tokio::time::Instant)>>> =
            Arc::new(Mutex::new(HashMap::new()));
        let graph = edges(&[
            ("app", &["lib", "core"]),
            ("core", &[]),
            ("lib", &["core"]),
            ("other", &[]),
        ]);

        let recorded = spans.clone();
        let results = runner(4, CyclePolicy::Reject)
            .run("publish", graph.clone(), move |name, _limit| {
                let recorded = recorded.clone();
                async move {
                    let began = tokio::time::Instant::now();
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    recorded
                        .lock()
                        .unwrap()
                        .insert(name.clone(), (began, tokio::time::Instant::now()));
                    Ok::<_, TandemError>(name)
                }
            })
            .await
            .unwrap();
        assert_eq!(results.len(), 4);

        let spans = spans.lock().unwrap();
        for (name, deps) in &graph {
            for dep in deps {
                assert!(spans[dep].1 <= spans[name].0, "{} started before {} finished", name, dep);
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_is_bounded() {
        let current = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let graph = edges(&[("a", &[]), ("b", &[]), ("c", &[]), ("d", &[]), ("e", &[]), ("f", &[])]);

        let (c, p) = (current.clone(), peak.clone());
        runner(2, CyclePolicy::Warn)
            .run("pack", graph, move |_name, _limit| {
                let (current, peak) = (c.clone(), p.clone());
                async move {
                    let now = current.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    current.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, TandemError>(())
                }
            })
            .await
            .unwrap();

        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_stops_new_tasks() {
        let ran = Arc::new(Mutex::new(Vec::new()));
        let graph = edges(&[("a", &[]), ("b", &["a"]), ("c", &["b"])]);

        let log = ran.clone();
        let err = runner(1, CyclePolicy::Warn)
            .run("publish", graph, move |name, _limit| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(name.clone());
                    if name == "b" {
                        return Err(TandemError::other("boom"));
                    }
                    Ok::<_, TandemError>(())
                }
            })
            .await
            .unwrap_err();

        let RunError::Failed(failure) = err else {
            panic!("expected a task failure");
        };
        assert_eq!(failure.first().unwrap().package, "b");
        assert_eq!(failure.completed, vec!["a"]);
        assert_eq!(failure.skipped, vec!["c"]);
        assert_eq!(*ran.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_cycle_rejected_before_any_task() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let err = runner(2, CyclePolicy::Reject)
            .run("publish", four_cycle(), move |_name, _limit| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, TandemError>(()) }
            })
            .await
            .unwrap_err();

        let RunError::Cycle(cycle) = err else {
            panic!("expected a cycle error");
        };
        assert_eq!(cycle.members, vec!["a", "b", "c", "d"]);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cycle_released_in_declaration_order() {
        let reporter = Arc::new(CollectingReporter::default());
        let results = runner(1, CyclePolicy::Warn)
            .with_reporter(reporter.clone())
            .run("publish", four_cycle(), |name, _limit| async move { Ok::<_, TandemError>(name) })
            .await
            .unwrap();

        let order: Vec<String> = results.into_iter().map(|(_, name)| name).collect();
        assert_eq!(order, vec!["a", "d", "c", "b"]);
        assert!(reporter.events().contains(&TaskEvent::CycleReleased {
            stage: "publish".to_string(),
            package: "a".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_dependent_of_a_cycle_runs_after_it() {
        let started = Arc::new(Mutex::new(Vec::new()));
        let graph = edges(&[("x", &["a"]), ("a", &["b"]), ("b", &["a"])]);

        let log = started.clone();
        let reporter = Arc::new(CollectingReporter::default());
        runner(1, CyclePolicy::Warn)
            .with_reporter(reporter.clone())
            .run("publish", graph, move |name, _limit| {
                let log = log.clone();
                async move {
                    log.lock().unwrap().push(name);
                    Ok::<_, TandemError>(())
                }
            })
            .await
            .unwrap();

        let order = started.lock().unwrap().clone();
        assert_eq!(order.len(), 3);
        assert_eq!(order[0], "a");
        let position = |n: &str| order.iter().position(|o| o == n).unwrap();
        assert!(position("a") < position("x"));
        assert!(reporter.events().contains(&TaskEvent::CycleReleased {
            stage: "publish".to_string(),
            package: "a".to_string(),
        }));
        assert!(!reporter.events().contains(&TaskEvent::CycleReleased {
            stage: "publish".to_string(),
            package: "x".to_string(),
        }));
    }

    #[tokio::test]
    async fn test_suspended_task_frees_its_slot() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let receiver = Arc::new(Mutex::new(Some(rx)));
        let sender = Arc::new(Mutex::new(Some(tx)));
        let graph = edges(&[("a", &[]), ("b", &[])]);

        let runner = runner(1, CyclePolicy::Warn);
        let run = runner.run("publish", graph, move |_name, limit| {
            let receiver = receiver.clone();
            let sender = sender.clone();
            async move {
                let rx = receiver.lock().unwrap().take();
                if let Some(rx) = rx {
                    // the other task can only run while this one is suspended
                    let _ = limit.suspend(rx).await;
                } else {
                    let tx = sender.lock().unwrap().take();
                    if let Some(tx) = tx {
                        let _ = tx.send(());
                    }
                }
                Ok::<_, TandemError>(())
            }
        });

        let results = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("runner deadlocked")
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_run() {
        let results = runner(2, CyclePolicy::Reject)
            .run("pack", Vec::new(), |_name, _limit| async { Ok::<_, TandemError>(()) })
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
