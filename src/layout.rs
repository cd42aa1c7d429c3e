//! Filesystem layout of a project.
//!
//! ```text
//! <root>/
//! ├── assetpipe.toml               # optional
//! ├── src/
//! │   ├── templates/
//! │   │   ├── pages/*.hbs          → build/*.html
//! │   │   └── **/*.hbs             (partials)
//! │   ├── sass/*.{sass,scss}       → build/css/*.css
//! │   ├── js/index.js              → build/js/index.js
//! │   ├── assets/img/**            → build/assets/img/**
//! │   └── fonts/**                 → build/fonts/**
//! ├── build/                       # removed by clean
//! └── .assetpipe-cache/            # image cache, kept by clean
//! ```
//!
//! Each content task writes to its own part of the output tree; templates
//! own the top-level `*.html` files and nothing else writes there.

use crate::config::ProjectConfig;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
    source: PathBuf,
    output: PathBuf,
    cache: PathBuf,
    entry: PathBuf,
}

impl Layout {
    pub fn new(root: &Path, config: &ProjectConfig) -> Self {
        let source = root.join(&config.paths.source);
        Self {
            root: root.to_path_buf(),
            entry: source.join(&config.scripts.entry),
            output: root.join(&config.paths.output),
            cache: root.join(&config.paths.cache),
            source,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn source_dir(&self) -> &Path {
        &self.source
    }

    pub fn output_dir(&self) -> &Path {
        &self.output
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache
    }

    pub fn templates_dir(&self) -> PathBuf {
        self.source.join("templates")
    }

    pub fn pages_dir(&self) -> PathBuf {
        self.templates_dir().join("pages")
    }

    pub fn sass_dir(&self) -> PathBuf {
        self.source.join("sass")
    }

    pub fn script_entry(&self) -> &Path {
        &self.entry
    }

    pub fn images_dir(&self) -> PathBuf {
        self.source.join("assets").join("img")
    }

    pub fn fonts_dir(&self) -> PathBuf {
        self.source.join("fonts")
    }

    pub fn css_out(&self) -> PathBuf {
        self.output.join("css")
    }

    pub fn js_out(&self) -> PathBuf {
        self.output.join("js")
    }

    pub fn images_out(&self) -> PathBuf {
        self.output.join("assets").join("img")
    }

    pub fn fonts_out(&self) -> PathBuf {
        self.output.join("fonts")
    }

    /// Display form of `path` relative to the project root.
    pub fn display(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_layout_paths() {
        let layout = Layout::new(Path::new("/proj"), &ProjectConfig::default());
        assert_eq!(layout.pages_dir(), Path::new("/proj/src/templates/pages"));
        assert_eq!(layout.sass_dir(), Path::new("/proj/src/sass"));
        assert_eq!(layout.script_entry(), Path::new("/proj/src/js/index.js"));
        assert_eq!(layout.images_dir(), Path::new("/proj/src/assets/img"));
        assert_eq!(layout.fonts_dir(), Path::new("/proj/src/fonts"));
        assert_eq!(layout.css_out(), Path::new("/proj/build/css"));
        assert_eq!(layout.js_out(), Path::new("/proj/build/js"));
        assert_eq!(layout.images_out(), Path::new("/proj/build/assets/img"));
        assert_eq!(layout.fonts_out(), Path::new("/proj/build/fonts"));
        assert_eq!(layout.cache_dir(), Path::new("/proj/.assetpipe-cache"));
    }

    #[test]
    fn configured_directories_are_respected() {
        let mut config = ProjectConfig::default();
        config.paths.source = "assets".into();
        config.paths.output = "public".into();
        config.scripts.entry = "scripts/main.js".into();
        let layout = Layout::new(Path::new("/p"), &config);
        assert_eq!(layout.sass_dir(), Path::new("/p/assets/sass"));
        assert_eq!(layout.css_out(), Path::new("/p/public/css"));
        assert_eq!(layout.script_entry(), Path::new("/p/assets/scripts/main.js"));
    }

    #[test]
    fn display_is_root_relative() {
        let layout = Layout::new(Path::new("/proj"), &ProjectConfig::default());
        assert_eq!(layout.display(&layout.css_out().join("main.css")), "build/css/main.css");
        assert_eq!(layout.display(Path::new("/elsewhere/x")), "/elsewhere/x");
    }
}
