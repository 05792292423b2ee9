//! Per-stage timing and dof-count statistics.
//!
//! The logger is an observability sink: records accumulate per analysis step
//! and are also emitted through the `log` facade. Drivers that want to keep
//! them (e.g. for convergence studies) can serialize the record types.

use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Serialize)]
pub struct TaskDurationRecord {
    pub analysis_step: usize,
    pub task: String,
    pub duration_ms: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DofCountRecord {
    pub analysis_step: usize,
    pub category: String,
    pub count: usize,
}

#[derive(Debug)]
pub struct SolverLogger {
    solver_name: &'static str,
    analysis_step: usize,
    task_durations: Vec<TaskDurationRecord>,
    dof_counts: Vec<DofCountRecord>,
}

impl SolverLogger {
    pub fn new(solver_name: &'static str) -> Self {
        Self {
            solver_name,
            analysis_step: 0,
            task_durations: Vec::new(),
            dof_counts: Vec::new(),
        }
    }

    pub fn log_task_duration(&mut self, task: &str, duration: Duration) {
        let duration_ms = duration.as_secs_f64() * 1e3;
        log::debug!("{}: {} took {:.3} ms", self.solver_name, task, duration_ms);
        self.task_durations.push(TaskDurationRecord {
            analysis_step: self.analysis_step,
            task: task.to_string(),
            duration_ms,
        });
    }

    pub fn log_num_dofs(&mut self, category: &str, count: usize) {
        log::info!("{}: {} = {}", self.solver_name, category, count);
        self.dof_counts.push(DofCountRecord {
            analysis_step: self.analysis_step,
            category: category.to_string(),
            count,
        });
    }

    pub fn increment_analysis_step(&mut self) {
        self.analysis_step += 1;
    }

    pub fn analysis_step(&self) -> usize {
        self.analysis_step
    }

    pub fn task_durations(&self) -> &[TaskDurationRecord] {
        &self.task_durations
    }

    pub fn dof_counts(&self) -> &[DofCountRecord] {
        &self.dof_counts
    }
}
