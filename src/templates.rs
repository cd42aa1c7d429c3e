//! Page template compilation (CLI task `pug`).
//!
//! Every top-level `*.hbs` file in `templates/pages/` becomes one HTML page
//! in the output root. All other `*.hbs` files under `templates/` are
//! registered as partials, named by their path relative to `templates/`
//! without the extension:
//!
//! ```text
//! src/templates/
//! ├── layouts/head.hbs     → {{> layouts/head}}
//! ├── mixins/nav.hbs       → {{> mixins/nav}}
//! └── pages/
//!     ├── index.hbs        → build/index.html
//!     └── about.hbs        → build/about.html
//! ```
//!
//! Pages are rendered with `{ page, mode, dev }` as their data.
//!
//! Unlike stylesheets, a broken template fails the whole task.

use crate::context::BuildContext;
use crate::files;
use handlebars::Handlebars;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const TEMPLATE_EXTENSION: &str = "hbs";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template error in {path}: {message}")]
    Compile { path: PathBuf, message: String },
}

/// Formatting options for rendered pages.
#[derive(Debug, Clone, Copy)]
pub struct TemplateOptions {
    /// Keep partials indented at their call site and end pages with a newline.
    pub pretty: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self { pretty: true }
    }
}

#[derive(Debug, Clone)]
pub struct RenderedPage {
    pub source: PathBuf,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct TemplateReport {
    pub pages: Vec<RenderedPage>,
    pub partials: usize,
}

#[derive(Serialize)]
struct PageData<'a> {
    page: &'a str,
    mode: &'static str,
    dev: bool,
}

/// Render every page template into the output root.
pub fn compile_pages(
    ctx: &BuildContext,
    options: &TemplateOptions,
) -> Result<TemplateReport, TemplateError> {
    let layout = &ctx.layout;
    let pages_dir = layout.pages_dir();
    let pages = files::top_level_files(&pages_dir, &[TEMPLATE_EXTENSION])?;

    let mut registry = Handlebars::new();
    registry.set_prevent_indent(!options.pretty);
    let partials = register_partials(&mut registry, &layout.templates_dir(), &pages_dir)?;

    fs::create_dir_all(layout.output_dir())?;

    let mut report = TemplateReport {
        pages: Vec::with_capacity(pages.len()),
        partials,
    };
    for source in pages {
        let stem = template_stem(&source);
        let content = fs::read_to_string(&source)?;
        registry
            .register_template_string(&stem, content)
            .map_err(|e| compile_error(&source, e))?;

        let data = PageData {
            page: &stem,
            mode: ctx.mode.as_str(),
            dev: ctx.mode.is_dev(),
        };
        let mut html = registry
            .render(&stem, &data)
            .map_err(|e| compile_error(&source, e))?;
        if options.pretty && !html.ends_with('\n') {
            html.push('\n');
        }

        let output = layout.output_dir().join(format!("{stem}.html"));
        fs::write(&output, html)?;
        report.pages.push(RenderedPage { source, output });
    }
    Ok(report)
}

/// Register every template outside `pages_dir` as a partial.
fn register_partials(
    registry: &mut Handlebars<'_>,
    templates_dir: &Path,
    pages_dir: &Path,
) -> Result<usize, TemplateError> {
    let partials = files::walk_files(templates_dir, |p| {
        files::has_extension(p, &[TEMPLATE_EXTENSION]) && !p.starts_with(pages_dir)
    })?;
    for path in &partials {
        let name = partial_name(templates_dir, path);
        let content = fs::read_to_string(path)?;
        registry
            .register_partial(&name, content)
            .map_err(|e| compile_error(path, e))?;
    }
    Ok(partials.len())
}

fn template_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// `templates/layouts/head.hbs` → `layouts/head`.
fn partial_name(templates_dir: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(templates_dir).unwrap_or(path);
    relative
        .with_extension("")
        .to_string_lossy()
        .replace('\\', "/")
}

fn compile_error(path: &Path, error: impl std::fmt::Display) -> TemplateError {
    TemplateError::Compile {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}
