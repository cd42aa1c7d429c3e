//! Script bundling (CLI task `webpack`).
//!
//! One entry point is bundled into `js/<name>.js`. The bundler itself sits
//! behind [`ScriptBundler`] so the task logic can be tested without a
//! JavaScript toolchain; the production implementation is [`EsbuildBundler`].
//!
//! ## Outcomes
//!
//! | Result | Meaning | Output written |
//! |---|---|---|
//! | `Ok(ScriptOutcome::Bundled)` | bundle built | yes |
//! | `Ok(ScriptOutcome::CompileFailed)` | user code does not compile | no |
//! | `Err(ScriptError)` | entry missing, bundler unavailable, I/O | no |
//!
//! A compile failure is an ordinary outcome, not an error: what to do with
//! it (notify and carry on) is decided by the caller, see
//! [`Pipeline`](crate::tasks::Pipeline).

use crate::context::BuildContext;
use crate::mode::Mode;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Script entry not found: {0}")]
    MissingEntry(PathBuf),
    #[error("Could not run bundler `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
}

/// Static bundler configuration, built once per pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleConfig {
    pub mode: Mode,
    pub entry: PathBuf,
    /// Output file pattern, `[name]` being the entry stem.
    pub output_name: String,
    /// Language level the bundle is lowered to.
    pub target: String,
    pub inline_source_map: bool,
    pub minify: bool,
    /// Nothing is written when the bundle has errors.
    pub no_emit_on_errors: bool,
}

impl BundleConfig {
    pub fn new(ctx: &BuildContext) -> Self {
        let dev = ctx.mode.is_dev();
        Self {
            mode: ctx.mode,
            entry: ctx.layout.script_entry().to_path_buf(),
            output_name: ctx.config.scripts.output_name.clone(),
            target: ctx.config.scripts.target.clone(),
            inline_source_map: dev,
            minify: !dev,
            no_emit_on_errors: true,
        }
    }

    /// `[name].js` with entry `index.js` → `index.js`.
    pub fn output_file_name(&self) -> String {
        let stem = self
            .entry
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        self.output_name.replace("[name]", &stem)
    }
}

/// What a bundler produced for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bundle {
    Code(String),
    Errors(String),
}

pub trait ScriptBundler: Send + Sync {
    /// Bundle `config.entry`. Compile errors in user code are returned as
    /// [`Bundle::Errors`]; `Err` is reserved for failures of the bundler
    /// itself.
    fn bundle(&self, root: &Path, config: &BundleConfig) -> Result<Bundle, ScriptError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Bundled { output: PathBuf, bytes: usize },
    CompileFailed { message: String },
}

/// Bundle the entry point into the JS output directory.
pub fn bundle_scripts(
    ctx: &BuildContext,
    config: &BundleConfig,
    bundler: &dyn ScriptBundler,
) -> Result<ScriptOutcome, ScriptError> {
    if !config.entry.is_file() {
        return Err(ScriptError::MissingEntry(config.entry.clone()));
    }

    match bundler.bundle(ctx.layout.root(), config)? {
        Bundle::Code(code) => {
            let js_out = ctx.layout.js_out();
            fs::create_dir_all(&js_out)?;
            let output = js_out.join(config.output_file_name());
            fs::write(&output, &code)?;
            Ok(ScriptOutcome::Bundled {
                output,
                bytes: code.len(),
            })
        }
        Bundle::Errors(message) if config.no_emit_on_errors => {
            Ok(ScriptOutcome::CompileFailed { message })
        }
        Bundle::Errors(message) => {
            // Emit whatever the bundler reported so the page shows the failure.
            let js_out = ctx.layout.js_out();
            fs::create_dir_all(&js_out)?;
            let output = js_out.join(config.output_file_name());
            fs::write(&output, format!("console.error({message:?});\n"))?;
            Ok(ScriptOutcome::CompileFailed { message })
        }
    }
}

/// Bundles with the `esbuild` command line, reading the bundle from stdout.
#[derive(Debug, Clone)]
pub struct EsbuildBundler {
    command: String,
}

impl EsbuildBundler {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Command-line arguments for one run.
    pub fn args(&self, config: &BundleConfig) -> Vec<String> {
        let mut args = vec![
            config.entry.to_string_lossy().into_owned(),
            "--bundle".to_string(),
            "--format=iife".to_string(),
            format!("--target={}", config.target),
            format!("--define:process.env.NODE_ENV=\"{}\"", config.mode.as_str()),
            "--log-level=error".to_string(),
            "--color=false".to_string(),
        ];
        if config.inline_source_map {
            args.push("--sourcemap=inline".to_string());
        }
        if config.minify {
            args.push("--minify".to_string());
        }
        args
    }
}

impl ScriptBundler for EsbuildBundler {
    fn bundle(&self, root: &Path, config: &BundleConfig) -> Result<Bundle, ScriptError> {
        let output = Command::new(&self.command)
            .args(self.args(config))
            .current_dir(root)
            .output()
            .map_err(|source| ScriptError::Spawn {
                command: self.command.clone(),
                source,
            })?;

        if output.status.success() {
            Ok(Bundle::Code(String::from_utf8_lossy(&output.stdout).into_owned()))
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Ok(Bundle::Errors(if stderr.is_empty() {
                format!("{} exited with {}", self.command, output.status)
            } else {
                stderr
            }))
        }
    }
}
