//! CLI output formatting for task reports.
//!
//! # Output Format
//!
//! ## Content tasks
//!
//! ```text
//! sass
//!     main.css (+ main.css.map)
//!     FAILED broken.scss: Undefined variable.
//! img (1 cached, 1 optimized (2 total))
//!     logo.png: 1820 → 1204 bytes
//!     icons/arrow.svg: cached
//! fonts
//!     body.woff2 (16 bytes)
//! pug (1 partial)
//!     index.hbs → index.html
//! webpack
//!     index.js (2048 bytes)
//! ```
//!
//! ## Build
//!
//! The per-task blocks above, followed by a one-line verdict:
//!
//! ```text
//! Built 5 tasks
//! Build failed: pug
//!     Template error in src/templates/pages/broken.hbs: ...
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::files::CopiedFile;
use crate::images::{ImageReport, ImageStatus};
use crate::scripts::ScriptOutcome;
use crate::styles::StyleReport;
use crate::tasks::{BuildSummary, TaskName, TaskReport};
use crate::templates::TemplateReport;
use std::path::Path;

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

// ============================================================================
// Per-task output
// ============================================================================

pub fn format_styles(report: &StyleReport) -> Vec<String> {
    let mut lines = vec!["sass".to_string()];
    for style in &report.compiled {
        let line = match &style.map {
            Some(map) => format!("{}{} (+ {})", indent(1), file_name(&style.output), file_name(map)),
            None => format!("{}{}", indent(1), file_name(&style.output)),
        };
        lines.push(line);
    }
    for failure in &report.failed {
        let first = failure.message.lines().next().unwrap_or_default();
        lines.push(format!("{}FAILED {}", indent(1), first));
    }
    lines
}

pub fn format_images(report: &ImageReport) -> Vec<String> {
    let mut lines = vec![format!("img ({})", report.cache)];
    for image in &report.images {
        let name = image.relative.to_string_lossy().replace('\\', "/");
        let line = match image.status {
            ImageStatus::Cached => format!("{}{}: cached", indent(1), name),
            ImageStatus::Optimized {
                original,
                optimized,
            } => format!("{}{}: {} → {} bytes", indent(1), name, original, optimized),
        };
        lines.push(line);
    }
    lines
}

pub fn format_fonts(copied: &[CopiedFile]) -> Vec<String> {
    let mut lines = vec!["fonts".to_string()];
    for file in copied {
        lines.push(format!(
            "{}{} ({} bytes)",
            indent(1),
            file.relative.to_string_lossy().replace('\\', "/"),
            file.bytes
        ));
    }
    lines
}

pub fn format_templates(report: &TemplateReport) -> Vec<String> {
    let mut lines = vec![format!("pug ({})", plural(report.partials, "partial"))];
    for page in &report.pages {
        lines.push(format!(
            "{}{} → {}",
            indent(1),
            file_name(&page.source),
            file_name(&page.output)
        ));
    }
    lines
}

pub fn format_script(outcome: &ScriptOutcome) -> Vec<String> {
    let detail = match outcome {
        ScriptOutcome::Bundled { output, bytes } => {
            format!("{}{} ({} bytes)", indent(1), file_name(output), bytes)
        }
        ScriptOutcome::CompileFailed { .. } => {
            format!("{}compile error, nothing written", indent(1))
        }
    };
    vec!["webpack".to_string(), detail]
}

/// Format any task report.
pub fn format_task_report(report: &TaskReport) -> Vec<String> {
    match report {
        TaskReport::Clean { removed: true } => vec!["clean: output removed".to_string()],
        TaskReport::Clean { removed: false } => vec!["clean: nothing to remove".to_string()],
        TaskReport::Styles(r) => format_styles(r),
        TaskReport::Images(r) => format_images(r),
        TaskReport::Fonts(copied) => format_fonts(copied),
        TaskReport::Templates(r) => format_templates(r),
        TaskReport::Script(outcome) => format_script(outcome),
    }
}

pub fn print_task_report(report: &TaskReport) {
    for line in format_task_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Build output
// ============================================================================

pub fn format_build_summary(summary: &BuildSummary) -> Vec<String> {
    let mut lines = Vec::new();
    for (_, report) in &summary.reports {
        lines.extend(format_task_report(report));
    }
    if summary.is_success() {
        lines.push(format!("Built {}", plural(summary.reports.len(), "task")));
    } else {
        let names: Vec<&str> = summary
            .failures
            .iter()
            .map(|(task, _)| TaskName::as_str(*task))
            .collect();
        lines.push(format!("Build failed: {}", names.join(", ")));
        for (_, error) in &summary.failures {
            lines.push(format!("{}{}", indent(1), error));
        }
    }
    lines
}

pub fn print_build_summary(summary: &BuildSummary) {
    for line in format_build_summary(summary) {
        println!("{}", line);
    }
}
