use assetpipe::config::{self, ConfigError};
use assetpipe::context::BuildContext;
use assetpipe::mode::Mode;
use assetpipe::tasks::{self, Pipeline, TaskError, TaskName};
use assetpipe::{output, server, watch};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that optimize images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the image cache and re-optimize every image
    #[arg(long, global = true)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "assetpipe")]
#[command(about = "Front-end asset build with dev server and live reload")]
#[command(long_about = "\
Front-end asset build with dev server and live reload

Project structure:

  assetpipe.toml                   # Optional, see 'assetpipe gen-config'
  src/
  ├── templates/
  │   ├── pages/*.hbs              # One page each → build/<name>.html
  │   └── **/*.hbs                 # Partials, e.g. {{> layouts/head}}
  ├── sass/*.{sass,scss}           # _partials are only imported → build/css/
  ├── js/index.js                  # Bundle entry → build/js/index.js
  ├── assets/img/**                # Optimized and cached → build/assets/img/
  └── fonts/**                     # Copied → build/fonts/

Set NODE_ENV=production for minified, prefixed output without source maps.
Any other value, or none, builds for development.

Without a command, runs 'build' and then serves and watches the project.")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(flatten)]
    cache: CacheArgs,

    /// Log debug output (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Remove the output directory
    Clean,
    /// Compile stylesheets
    Sass,
    /// Optimize images
    Img,
    /// Copy fonts
    Fonts,
    /// Render page templates
    Pug,
    /// Bundle scripts
    Webpack,
    /// Clean, then run every content task
    Build,
    /// Serve the output directory with live reload
    Server,
    /// Re-run content tasks when sources change
    Watch,
    /// Build, then serve and watch
    Default,
    /// Remove the image cache
    ClearCache,
    /// Print a stock assetpipe.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let load = || -> Result<Pipeline, ConfigError> {
        let mode = Mode::from_env();
        let ctx = BuildContext::load(&cli.root, mode)?;
        tracing::info!(mode = %mode, root = %cli.root.display(), "loaded project");
        Ok(Pipeline::new(ctx).with_cache(!cli.cache.no_cache))
    };

    match cli.command.unwrap_or(Command::Default) {
        Command::Clean => output::print_task_report(&load()?.clean()?),
        Command::Sass => run_content(&load()?, TaskName::Sass)?,
        Command::Img => run_content(&load()?, TaskName::Img)?,
        Command::Fonts => run_content(&load()?, TaskName::Fonts)?,
        Command::Pug => run_content(&load()?, TaskName::Pug)?,
        Command::Webpack => run_content(&load()?, TaskName::Webpack)?,
        Command::Build => build(&load()?)?,
        Command::Server => {
            let pipeline = load()?;
            runtime()?.block_on(server::serve(pipeline.context()))?;
        }
        Command::Watch => {
            let pipeline = Arc::new(load()?);
            runtime()?.block_on(watch::watch(pipeline))?;
        }
        Command::Default => {
            let pipeline = load()?;
            build(&pipeline)?;
            runtime()?.block_on(tasks::serve_and_watch(Arc::new(pipeline)))?;
        }
        Command::ClearCache => {
            let pipeline = load()?;
            let layout = &pipeline.context().layout;
            let cache_dir = layout.display(layout.cache_dir());
            if pipeline.clear_cache()? {
                println!("Removed {cache_dir}");
            } else {
                println!("No cache at {cache_dir}");
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log filter: `RUST_LOG` when set, otherwise info (debug with `--verbose`)
/// for this crate and warnings from the HTTP stack.
fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("assetpipe=debug,tower_http=debug")
        } else {
            EnvFilter::new("assetpipe=info,tower_http=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn run_content(pipeline: &Pipeline, task: TaskName) -> Result<(), TaskError> {
    let report = pipeline.run_content_task(task)?;
    output::print_task_report(&report);
    Ok(())
}

fn build(pipeline: &Pipeline) -> Result<(), TaskError> {
    let summary = pipeline.build()?;
    output::print_build_summary(&summary);
    if summary.is_success() {
        Ok(())
    } else {
        Err(TaskError::BuildFailed(summary.failures.len()))
    }
}

fn runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}
