//! Task registry and orchestration.
//!
//! | CLI name | Work |
//! |---|---|
//! | `clean` | remove the output tree |
//! | `sass` | [`styles::compile_styles`] |
//! | `img` | [`images::optimize_images`] |
//! | `fonts` | [`files::copy_tree`] |
//! | `pug` | [`templates::compile_pages`] |
//! | `webpack` | [`scripts::bundle_scripts`] |
//! | `build` | `clean`, then the five content tasks in parallel |
//! | `server` | [`server::serve`] |
//! | `watch` | [`watch::watch`] |
//! | `default` | `build`, then `server` and `watch` together |
//!
//! [`Pipeline`] owns the build context and the pluggable collaborators
//! (optimizer, bundler, notifier) and is the only place that decides how a
//! task's outcome is treated: a script compile error goes to the notifier
//! and the task still succeeds, anything else returned as `Err` fails it.

use crate::cache::{self, CacheManifest};
use crate::config::ConfigError;
use crate::context::BuildContext;
use crate::files::{self, CopiedFile};
use crate::images::{self, ImageError, ImageOptimizer, ImageReport, RustOptimizer};
use crate::notifier::{DesktopNotifier, Notifier};
use crate::scripts::{
    self, BundleConfig, EsbuildBundler, ScriptBundler, ScriptError, ScriptOutcome,
};
use crate::server::{self, ServerError};
use crate::styles::{self, StyleError, StyleReport};
use crate::templates::{self, TemplateError, TemplateOptions, TemplateReport};
use crate::watch::{self, WatchError};
use rayon::prelude::*;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Title used for compile-error notifications.
pub const COMPILE_ERROR_TITLE: &str = "Compile Error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskName {
    Clean,
    Sass,
    Img,
    Fonts,
    Pug,
    Webpack,
    Build,
    Server,
    Watch,
    Default,
}

impl TaskName {
    /// Tasks that read sources and write one part of the output tree.
    pub const CONTENT: [TaskName; 5] = [
        TaskName::Sass,
        TaskName::Img,
        TaskName::Fonts,
        TaskName::Pug,
        TaskName::Webpack,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::Sass => "sass",
            Self::Img => "img",
            Self::Fonts => "fonts",
            Self::Pug => "pug",
            Self::Webpack => "webpack",
            Self::Build => "build",
            Self::Server => "server",
            Self::Watch => "watch",
            Self::Default => "default",
        }
    }

    pub fn is_content(self) -> bool {
        Self::CONTENT.contains(&self)
    }
}

impl fmt::Display for TaskName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single task run produced.
#[derive(Debug, Clone)]
pub enum TaskReport {
    Clean { removed: bool },
    Styles(StyleReport),
    Images(ImageReport),
    Fonts(Vec<CopiedFile>),
    Templates(TemplateReport),
    Script(ScriptOutcome),
}

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
    #[error("Style error: {0}")]
    Style(#[from] StyleError),
    #[error("Script error: {0}")]
    Script(#[from] ScriptError),
    #[error("Image error: {0}")]
    Image(#[from] ImageError),
    #[error("Server error: {0}")]
    Server(#[from] ServerError),
    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),
    #[error("`{0}` is not a content task")]
    NotContent(TaskName),
    #[error("Build failed: {0} task(s) failed")]
    BuildFailed(usize),
}

/// Result of a full `build`.
#[derive(Debug)]
pub struct BuildSummary {
    /// Whether `clean` found an output tree to remove.
    pub cleaned: bool,
    pub reports: Vec<(TaskName, TaskReport)>,
    pub failures: Vec<(TaskName, TaskError)>,
}

impl BuildSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Build context plus the collaborators tasks run with.
pub struct Pipeline {
    ctx: BuildContext,
    optimizer: Box<dyn ImageOptimizer>,
    bundler: Box<dyn ScriptBundler>,
    notifier: Box<dyn Notifier>,
    bundle_config: BundleConfig,
    template_options: TemplateOptions,
    use_cache: bool,
}

impl Pipeline {
    /// Pipeline with the production collaborators.
    pub fn new(ctx: BuildContext) -> Self {
        let bundler = EsbuildBundler::new(ctx.config.scripts.bundler.clone());
        Self {
            bundle_config: BundleConfig::new(&ctx),
            template_options: TemplateOptions::default(),
            optimizer: Box::new(RustOptimizer::new()),
            bundler: Box::new(bundler),
            notifier: Box::new(DesktopNotifier::new()),
            use_cache: true,
            ctx,
        }
    }

    pub fn with_optimizer(mut self, optimizer: impl ImageOptimizer + 'static) -> Self {
        self.optimizer = Box::new(optimizer);
        self
    }

    pub fn with_bundler(mut self, bundler: impl ScriptBundler + 'static) -> Self {
        self.bundler = Box::new(bundler);
        self
    }

    pub fn with_notifier(mut self, notifier: impl Notifier + 'static) -> Self {
        self.notifier = Box::new(notifier);
        self
    }

    /// `false` starts the image task from an empty cache manifest.
    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn context(&self) -> &BuildContext {
        &self.ctx
    }

    pub fn clean(&self) -> Result<TaskReport, TaskError> {
        let removed = files::clean(self.ctx.layout.output_dir())?;
        Ok(TaskReport::Clean { removed })
    }

    /// Remove the image cache. Returns whether a cache existed.
    pub fn clear_cache(&self) -> Result<bool, TaskError> {
        Ok(cache::clear(self.ctx.layout.cache_dir())?)
    }

    /// Run one content task.
    pub fn run_content_task(&self, task: TaskName) -> Result<TaskReport, TaskError> {
        let layout = &self.ctx.layout;
        match task {
            TaskName::Sass => Ok(TaskReport::Styles(styles::compile_styles(&self.ctx)?)),
            TaskName::Img => {
                let mut manifest = if self.use_cache {
                    CacheManifest::load(layout.cache_dir())
                } else {
                    CacheManifest::empty()
                };
                let report =
                    images::optimize_images(&self.ctx, self.optimizer.as_ref(), &mut manifest)?;
                Ok(TaskReport::Images(report))
            }
            TaskName::Fonts => Ok(TaskReport::Fonts(files::copy_tree(
                &layout.fonts_dir(),
                &layout.fonts_out(),
            )?)),
            TaskName::Pug => Ok(TaskReport::Templates(templates::compile_pages(
                &self.ctx,
                &self.template_options,
            )?)),
            TaskName::Webpack => {
                let outcome =
                    scripts::bundle_scripts(&self.ctx, &self.bundle_config, self.bundler.as_ref())?;
                if let ScriptOutcome::CompileFailed { message } = &outcome {
                    self.notifier.compile_error(COMPILE_ERROR_TITLE, message);
                }
                Ok(TaskReport::Script(outcome))
            }
            other => Err(TaskError::NotContent(other)),
        }
    }

    /// `clean`, then every content task in parallel. All tasks run to
    /// completion; failures are collected in the summary. Only a failing
    /// `clean` aborts the build.
    pub fn build(&self) -> Result<BuildSummary, TaskError> {
        let cleaned = files::clean(self.ctx.layout.output_dir())?;

        let results: Vec<(TaskName, Result<TaskReport, TaskError>)> = TaskName::CONTENT
            .par_iter()
            .map(|&task| (task, self.run_content_task(task)))
            .collect();

        let mut summary = BuildSummary {
            cleaned,
            reports: Vec::new(),
            failures: Vec::new(),
        };
        for (task, result) in results {
            match result {
                Ok(report) => summary.reports.push((task, report)),
                Err(e) => summary.failures.push((task, e)),
            }
        }
        Ok(summary)
    }
}

/// Run the dev server and the source watcher until one of them fails.
pub async fn serve_and_watch(pipeline: Arc<Pipeline>) -> Result<(), TaskError> {
    let ctx = pipeline.context().clone();
    tokio::try_join!(
        async { server::serve(&ctx).await.map_err(TaskError::from) },
        async { watch::watch(pipeline.clone()).await.map_err(TaskError::from) },
    )?;
    Ok(())
}
