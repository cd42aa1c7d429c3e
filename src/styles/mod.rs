//! Stylesheet compilation (CLI task `sass`).
//!
//! Each top-level `*.sass` / `*.scss` file in `sass/` (partials starting
//! with `_` excluded) goes through, in order:
//!
//! 1. **dev**: source-map tracking starts with the source text
//! 2. `grass` compile: expanded in dev, compressed in production
//! 3. **production**: [`prefix::autoprefix`] for the configured targets
//! 4. **dev**: `<stem>.css.map` is written and referenced from the CSS
//!
//! A file that fails to compile (including one that is not valid UTF-8)
//! is logged and recorded in the [`StyleReport`]; the other files are
//! still compiled and the task succeeds. Only filesystem errors fail the
//! task.
//!
//! Map `sources` are relative to the CSS output directory, so they resolve
//! however deep `paths.output` is.

pub mod prefix;
pub mod sourcemap;

use crate::context::BuildContext;
use crate::files;
use lightningcss::targets::Browsers;
use sourcemap::SourceMapBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const STYLE_EXTENSIONS: &[&str] = &["sass", "scss"];

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config error: {0}")]
    Config(#[from] crate::config::ConfigError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct CompiledStyle {
    pub source: PathBuf,
    pub output: PathBuf,
    pub map: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct StyleFailure {
    pub source: PathBuf,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct StyleReport {
    pub compiled: Vec<CompiledStyle>,
    pub failed: Vec<StyleFailure>,
}

/// Compile every stylesheet into the CSS output directory.
pub fn compile_styles(ctx: &BuildContext) -> Result<StyleReport, StyleError> {
    let layout = &ctx.layout;
    let sources: Vec<PathBuf> = files::top_level_files(&layout.sass_dir(), STYLE_EXTENSIONS)?
        .into_iter()
        .filter(|p| !is_partial(p))
        .collect();

    let css_out = layout.css_out();
    fs::create_dir_all(&css_out)?;

    let browsers = if ctx.mode.is_dev() {
        None
    } else {
        Some(prefix::browsers_from_targets(&ctx.config.styles.targets)?)
    };
    let include_paths: Vec<PathBuf> = ctx
        .config
        .styles
        .include_paths
        .iter()
        .map(|p| layout.root().join(p))
        .collect();

    let mut report = StyleReport::default();
    for source in sources {
        match compile_one(ctx, &source, &css_out, &include_paths, browsers)? {
            Ok(compiled) => report.compiled.push(compiled),
            Err(message) => {
                tracing::error!(file = %layout.display(&source), "{message}");
                report.failed.push(StyleFailure { source, message });
            }
        }
    }
    Ok(report)
}

/// Compile one stylesheet. The outer `Result` carries fatal I/O errors,
/// the inner one a compile error message for this file only.
fn compile_one(
    ctx: &BuildContext,
    source: &Path,
    css_out: &Path,
    include_paths: &[PathBuf],
    browsers: Option<Browsers>,
) -> Result<Result<CompiledStyle, String>, StyleError> {
    let dev = ctx.mode.is_dev();
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let css_name = format!("{stem}.css");
    let source_name = source
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let tracking = if dev {
        let text = match String::from_utf8(fs::read(source)?) {
            Ok(text) => text,
            Err(e) => return Ok(Err(format!("{source_name}: {e}"))),
        };
        Some(SourceMapBuilder::begin(files::relative_path(css_out, source), text))
    } else {
        None
    };

    let style = if dev {
        grass::OutputStyle::Expanded
    } else {
        grass::OutputStyle::Compressed
    };
    let mut options = grass::Options::default().style(style);
    for path in include_paths {
        options = options.load_path(path);
    }
    let mut css = match grass::from_path(source, &options) {
        Ok(css) => css,
        Err(e) => return Ok(Err(format!("{source_name}: {e}"))),
    };

    if let Some(browsers) = browsers {
        css = match prefix::autoprefix(&css, &css_name, browsers) {
            Ok(css) => css,
            Err(e) => return Ok(Err(format!("{source_name}: {e}"))),
        };
    }

    let output = css_out.join(&css_name);
    let map = match tracking {
        Some(builder) => {
            let map_name = format!("{css_name}.map");
            let map_path = css_out.join(&map_name);
            let map = builder.finish(&css_name, &css);
            fs::write(&map_path, map.to_json()?)?;
            if !css.ends_with('\n') {
                css.push('\n');
            }
            css.push_str(&format!("\n/*# sourceMappingURL={map_name} */\n"));
            Some(map_path)
        }
        None => None,
    };
    fs::write(&output, css)?;

    Ok(Ok(CompiledStyle {
        source: source.to_path_buf(),
        output,
        map,
    }))
}

/// Sass partials (`_variables.scss`) are only compiled through imports.
fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectConfig;
    use crate::mode::Mode;
    use crate::test_helpers::{project_context, write_file};
    use tempfile::TempDir;

    const GRID_SCSS: &str = ".layout {\n  display: grid;\n}\n";

    #[test]
    fn production_scenario_prefixed_compressed_no_map() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/sass/main.scss", GRID_SCSS);
        let ctx = project_context(tmp.path(), Mode::Production);

        let report = compile_styles(&ctx).unwrap();

        assert_eq!(report.compiled.len(), 1);
        assert!(report.failed.is_empty());
        let css = fs::read_to_string(tmp.path().join("build/css/main.css")).unwrap();
        assert!(css.contains("display:grid"), "got: {css}");
        assert!(css.contains("display:-ms-grid"), "got: {css}");
        assert!(!css.contains("\n  "), "expected compressed output, got: {css}");
        assert!(!tmp.path().join("build/css/main.css.map").exists());
        assert!(report.compiled[0].map.is_none());
    }

    #[test]
    fn development_writes_map_alongside_css() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/sass/main.scss", GRID_SCSS);
        let ctx = project_context(tmp.path(), Mode::Development);

        compile_styles(&ctx).unwrap();

        let css = fs::read_to_string(tmp.path().join("build/css/main.css")).unwrap();
        assert!(css.contains("  display: grid;"), "expected expanded output, got: {css}");
        assert!(!css.contains("-ms-grid"));
        assert!(css.contains("/*# sourceMappingURL=main.css.map */"));

        let map: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(tmp.path().join("build/css/main.css.map")).unwrap(),
        )
        .unwrap();
        assert_eq!(map["version"], 3);
        assert_eq!(map["file"], "main.css");
        assert_eq!(map["sources"][0], "../../src/sass/main.scss");
    }

    #[test]
    fn compile_error_is_recorded_and_others_continue() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/sass/broken.scss", ".a { color: $undefined; }\n");
        write_file(tmp.path(), "src/sass/ok.scss", ".b { color: red; }\n");
        let ctx = project_context(tmp.path(), Mode::Development);

        let report = compile_styles(&ctx).unwrap();

        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].source.ends_with("broken.scss"));
        assert!(report.failed[0].message.starts_with("broken.scss:"));
        assert_eq!(report.compiled.len(), 1);
        assert!(tmp.path().join("build/css/ok.css").exists());
        assert!(!tmp.path().join("build/css/broken.css").exists());
    }

    #[test]
    fn unreadable_source_is_a_compile_failure_in_both_modes() {
        for mode in [Mode::Development, Mode::Production] {
            let tmp = TempDir::new().unwrap();
            write_file(tmp.path(), "src/sass/a_bad.scss", b"\xff\xfe.a { color: red; }\n");
            write_file(tmp.path(), "src/sass/ok.scss", ".b { color: red; }\n");
            let ctx = project_context(tmp.path(), mode);

            let report = compile_styles(&ctx).unwrap();

            assert_eq!(report.failed.len(), 1, "{mode}");
            assert!(report.failed[0].message.starts_with("a_bad.scss:"), "{mode}");
            assert_eq!(report.compiled.len(), 1, "{mode}");
            assert!(tmp.path().join("build/css/ok.css").exists(), "{mode}");
        }
    }

    #[test]
    fn map_source_is_relative_to_nested_output() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/sass/main.scss", GRID_SCSS);
        let mut config = ProjectConfig::default();
        config.paths.output = "dist/site".into();
        let ctx = BuildContext::new(tmp.path(), Mode::Development, config);

        compile_styles(&ctx).unwrap();

        let map: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(tmp.path().join("dist/site/css/main.css.map")).unwrap(),
        )
        .unwrap();
        assert_eq!(map["sources"][0], "../../../src/sass/main.scss");
    }

    #[test]
    fn partials_are_imported_not_compiled() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "src/sass/_vars.scss", "$brand: #ff0000;\n");
        write_file(
            tmp.path(),
            "src/sass/main.scss",
            "@import 'vars';\n.a { color: $brand; }\n",
        );
        let ctx = project_context(tmp.path(), Mode::Production);

        let report = compile_styles(&ctx).unwrap();

        assert_eq!(report.compiled.len(), 1);
        assert!(!tmp.path().join("build/css/_vars.css").exists());
        let css = fs::read_to_string(tmp.path().join("build/css/main.css")).unwrap();
        assert!(css.contains(".a{color:red}") || css.contains(".a{color:#f00}"), "got: {css}");
    }

    #[test]
    fn include_paths_resolve_from_project_root() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "node_modules/kit/_reset.scss", "body { margin: 0; }\n");
        write_file(tmp.path(), "src/sass/main.scss", "@import 'kit/reset';\n");
        let ctx = project_context(tmp.path(), Mode::Production);

        let report = compile_styles(&ctx).unwrap();

        assert!(report.failed.is_empty(), "{:?}", report.failed);
        let css = fs::read_to_string(tmp.path().join("build/css/main.css")).unwrap();
        assert!(css.contains("body{margin:0}"), "got: {css}");
    }

    #[test]
    fn missing_sass_dir_is_fatal() {
        let tmp = TempDir::new().unwrap();
        let ctx = project_context(tmp.path(), Mode::Development);
        assert!(matches!(compile_styles(&ctx), Err(StyleError::Io(_))));
    }
}
