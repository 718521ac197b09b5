// Playgist - Version-controlled playlists
// Copyright (C) 2025 Playgist Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published
// by the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.

//! Progress reporting for long-running transfers

use tracing::{debug, info};

/// Receives progress from a push
///
/// Work is reported as a sequence of tasks; each task announces its total
/// and then reports completed units.
pub trait ProgressSink: Send {
    /// Transfer starts with `total_tasks` tasks
    fn start(&mut self, total_tasks: usize);

    /// A task begins; `total_work` is 0 when unknown
    fn begin_task(&mut self, title: &str, total_work: usize);

    /// `completed` more units of the current task are done
    fn update(&mut self, completed: usize);

    /// The current task finished
    fn end_task(&mut self);
}

/// Discards all progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn start(&mut self, _total_tasks: usize) {}
    fn begin_task(&mut self, _title: &str, _total_work: usize) {}
    fn update(&mut self, _completed: usize) {}
    fn end_task(&mut self) {}
}

/// Reports progress through `tracing`
#[derive(Debug, Default)]
pub struct LoggingProgress {
    task: Option<String>,
    total: usize,
    done: usize,
}

impl LoggingProgress {
    /// Create a logging sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Units completed in the current task
    pub fn completed(&self) -> usize {
        self.done
    }
}

impl ProgressSink for LoggingProgress {
    fn start(&mut self, total_tasks: usize) {
        debug!(total_tasks, "Transfer started");
    }

    fn begin_task(&mut self, title: &str, total_work: usize) {
        self.task = Some(title.to_string());
        self.total = total_work;
        self.done = 0;
        info!(task = %title, total = total_work, "Task started");
    }

    fn update(&mut self, completed: usize) {
        self.done += completed;
        debug!(
            task = self.task.as_deref().unwrap_or(""),
            done = self.done,
            total = self.total,
            "Task progress"
        );
    }

    fn end_task(&mut self) {
        if let Some(task) = self.task.take() {
            info!(task = %task, done = self.done, "Task finished");
        }
    }
}
