//! Tandem Tasks - dependency-ordered task execution
//!
//! Runs one async task per package so that a package only starts once
//! every package it depends on has finished, with bounded concurrency
//! and stop-on-first-failure semantics.

pub mod error;
pub mod limit;
pub mod reporter;
pub mod runner;

pub use error::{RunError, RunFailure, TaskFailure};
pub use limit::ConcurrencyLimit;
pub use reporter::{CollectingReporter, TaskEvent, TaskReporter, TaskReporterRegistry, TracingReporter};
pub use runner::{CyclePolicy, RunnerOptions, TopologicalRunner};
