//! Source watching (CLI task `watch`).
//!
//! A [`WatchTable`] maps glob patterns, relative to the project root, to
//! the content task that must re-run when a matching file changes:
//!
//! | Pattern | Task |
//! |---|---|
//! | `src/sass/**/*.*` | `sass` |
//! | `src/assets/img/**/*.{gif,jpg,png,svg,jpeg}` | `img` |
//! | `src/fonts/**/*.*` | `fonts` |
//! | `src/templates/**/*.*` | `pug` |
//! | `src/js/**/*.js` | `webpack` |
//!
//! Every task has its own worker. A trigger arriving while the worker is
//! waiting out the debounce window or running is folded into at most one
//! follow-up run. A failing run is logged and the watcher carries on.

use crate::output;
use crate::tasks::{Pipeline, TaskName};
use globset::{GlobBuilder, GlobMatcher};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("File watcher error: {0}")]
    Notify(#[from] notify::Error),
    #[error("Invalid watch pattern: {0}")]
    Glob(#[from] globset::Error),
}

#[derive(Debug, Clone)]
pub struct WatchEntry {
    pub pattern: String,
    pub task: TaskName,
    matcher: GlobMatcher,
}

#[derive(Debug, Clone)]
pub struct WatchTable {
    entries: Vec<WatchEntry>,
}

impl WatchTable {
    /// The standard table for a source directory (relative to the root).
    pub fn new(source: &str) -> Result<Self, WatchError> {
        let src = source.trim_start_matches("./").trim_end_matches('/');
        let rules = [
            (format!("{src}/sass/**/*.*"), TaskName::Sass),
            (
                format!("{src}/assets/img/**/*.{{gif,jpg,png,svg,jpeg}}"),
                TaskName::Img,
            ),
            (format!("{src}/fonts/**/*.*"), TaskName::Fonts),
            (format!("{src}/templates/**/*.*"), TaskName::Pug),
            (format!("{src}/js/**/*.js"), TaskName::Webpack),
        ];
        let entries = rules
            .into_iter()
            .map(|(pattern, task)| {
                let matcher = GlobBuilder::new(&pattern)
                    .literal_separator(true)
                    .build()?
                    .compile_matcher();
                Ok(WatchEntry {
                    pattern,
                    task,
                    matcher,
                })
            })
            .collect::<Result<Vec<_>, WatchError>>()?;
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[WatchEntry] {
        &self.entries
    }

    /// Tasks to re-run for a change at `relative` (project-root relative).
    pub fn tasks_for(&self, relative: &Path) -> Vec<TaskName> {
        let mut tasks: Vec<TaskName> = self
            .entries
            .iter()
            .filter(|e| e.matcher.is_match(relative))
            .map(|e| e.task)
            .collect();
        tasks.dedup();
        tasks
    }
}

/// Filesystem watcher delivering changed paths on a channel.
pub struct FsWatcher {
    watcher: notify::RecommendedWatcher,
    receiver: mpsc::Receiver<PathBuf>,
}

impl FsWatcher {
    /// Watch `dir` recursively.
    pub fn new(dir: &Path) -> Result<Self, notify::Error> {
        let mut watcher = Self::unwatched()?;
        watcher.watch(dir, RecursiveMode::Recursive)?;
        Ok(watcher)
    }

    /// A watcher with nothing registered yet; see [`FsWatcher::watch`].
    pub fn unwatched() -> Result<Self, notify::Error> {
        let (tx, rx) = mpsc::channel(256);

        let watcher = notify::recommended_watcher(move |res: Result<Event, _>| {
            if let Ok(event) = res
                && is_change(&event.kind)
            {
                for path in event.paths {
                    let _ = tx.blocking_send(path);
                }
            }
        })?;

        Ok(Self {
            watcher,
            receiver: rx,
        })
    }

    /// Add `dir`. Watching a directory again re-arms it after it was
    /// removed and recreated.
    pub fn watch(&mut self, dir: &Path, mode: RecursiveMode) -> Result<(), notify::Error> {
        self.watcher.watch(dir, mode)
    }

    pub async fn next_path(&mut self) -> Option<PathBuf> {
        self.receiver.recv().await
    }

    /// Take everything already queued.
    pub fn drain(&mut self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        while let Ok(path) = self.receiver.try_recv() {
            paths.push(path);
        }
        paths
    }
}

fn is_change(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// One coalescing worker per task.
pub struct TaskWorkers {
    triggers: HashMap<TaskName, mpsc::Sender<()>>,
}

impl TaskWorkers {
    /// Spawn a worker for each of `tasks`. A run waits `debounce`, then
    /// calls `run` on the blocking pool.
    pub fn spawn<F>(tasks: impl IntoIterator<Item = TaskName>, debounce: Duration, run: F) -> Self
    where
        F: Fn(TaskName) + Send + Sync + 'static,
    {
        let run = Arc::new(run);
        let mut triggers = HashMap::new();
        for task in tasks {
            let (tx, mut rx) = mpsc::channel::<()>(1);
            let run = Arc::clone(&run);
            tokio::spawn(async move {
                while rx.recv().await.is_some() {
                    tokio::time::sleep(debounce).await;
                    while rx.try_recv().is_ok() {}
                    let run = Arc::clone(&run);
                    if let Err(e) = tokio::task::spawn_blocking(move || run(task)).await {
                        tracing::error!(task = %task, "task panicked: {e}");
                    }
                }
            });
            triggers.insert(task, tx);
        }
        Self { triggers }
    }

    /// Request a run of `task`. Returns `false` if it has no worker.
    pub fn trigger(&self, task: TaskName) -> bool {
        match self.triggers.get(&task) {
            Some(tx) => {
                // A full channel means a run is already pending.
                let _ = tx.try_send(());
                true
            }
            None => false,
        }
    }
}

/// Run `task` on the pipeline and log the outcome.
pub fn run_and_log(pipeline: &Pipeline, task: TaskName) {
    tracing::info!(task = %task, "starting");
    match pipeline.run_content_task(task) {
        Ok(report) => {
            for line in output::format_task_report(&report) {
                tracing::info!(task = %task, "{line}");
            }
        }
        Err(e) => tracing::error!(task = %task, "{e}"),
    }
}

/// Watch the source tree and re-run content tasks until the watcher stops.
pub async fn watch(pipeline: Arc<Pipeline>) -> Result<(), WatchError> {
    let ctx = pipeline.context();
    let table = WatchTable::new(&ctx.config.paths.source)?;
    let root = ctx.layout.root().canonicalize()?;
    let source = ctx.layout.source_dir().canonicalize()?;
    let debounce = Duration::from_millis(ctx.config.watch.debounce_ms);

    let mut watcher = FsWatcher::new(&source)?;
    let runner = Arc::clone(&pipeline);
    let workers = TaskWorkers::spawn(TaskName::CONTENT, debounce, move |task| {
        run_and_log(&runner, task)
    });

    tracing::info!("watching {}", ctx.layout.display(ctx.layout.source_dir()));
    for entry in table.entries() {
        tracing::debug!(pattern = %entry.pattern, task = %entry.task, "watch rule");
    }

    while let Some(path) = watcher.next_path().await {
        let Ok(relative) = path.strip_prefix(&root) else {
            continue;
        };
        for task in table.tasks_for(relative) {
            tracing::debug!(file = %relative.display(), task = %task, "change detected");
            workers.trigger(task);
        }
    }
    Ok(())
}
