//! Project configuration module.
//!
//! Handles loading, validating, and merging `assetpipe.toml`. The file is
//! optional: stock defaults reproduce the conventional layout
//! (`src/` → `build/`) and every key the user sets overrides just that key.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [paths]
//! source = "src"                 # Sources, relative to the project root
//! output = "build"               # Output tree, removed by `clean`
//! cache = ".assetpipe-cache"     # Image cache, survives `clean`
//!
//! [styles]
//! include_paths = ["node_modules"]
//! targets = ["ie 11", "safari 9", "chrome 49", "firefox 52"]
//!
//! [scripts]
//! entry = "js/index.js"          # Relative to paths.source
//! output_name = "[name].js"      # [name] = entry file stem
//! bundler = "esbuild"
//! target = "es2015"
//!
//! [images]
//! optimization_level = 3         # 0-7
//! progressive = true
//! interlaced = true
//! jpeg_quality = 85              # 1-100
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [watch]
//! debounce_ms = 100
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the project config file, looked up in the project root.
pub const CONFIG_FILENAME: &str = "assetpipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `assetpipe.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    pub paths: PathsConfig,
    pub styles: StylesConfig,
    pub scripts: ScriptsConfig,
    pub images: ImagesConfig,
    pub server: ServerConfig,
    pub watch: WatchConfig,
}

impl ProjectConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.paths.source.is_empty() || self.paths.output.is_empty() {
            return Err(ConfigError::Validation(
                "paths.source and paths.output must not be empty".into(),
            ));
        }
        let source = project_relative("paths.source", &self.paths.source)?;
        let output = project_relative("paths.output", &self.paths.output)?;
        let cache = project_relative("paths.cache", &self.paths.cache)?;
        // `clean` removes the output tree and `clear-cache` the cache.
        if output.as_os_str().is_empty() || source.starts_with(&output) {
            return Err(ConfigError::Validation(format!(
                "paths.output {:?} would remove the project root or paths.source",
                self.paths.output
            )));
        }
        if cache.as_os_str().is_empty() || source.starts_with(&cache) {
            return Err(ConfigError::Validation(format!(
                "paths.cache {:?} would remove the project root or paths.source",
                self.paths.cache
            )));
        }
        if self.images.optimization_level > 7 {
            return Err(ConfigError::Validation(
                "images.optimization_level must be 0-7".into(),
            ));
        }
        if !(1..=100).contains(&self.images.jpeg_quality) {
            return Err(ConfigError::Validation(
                "images.jpeg_quality must be 1-100".into(),
            ));
        }
        if !self.scripts.output_name.ends_with(".js") {
            return Err(ConfigError::Validation(
                "scripts.output_name must end in .js".into(),
            ));
        }
        for target in &self.styles.targets {
            parse_browser_target(target)?;
        }
        Ok(())
    }
}

/// Normalize a configured directory: `.` components dropped, anything
/// that could leave the project root (`..`, absolute paths) rejected.
/// An empty result stands for the project root itself.
fn project_relative(key: &str, value: &str) -> Result<PathBuf, ConfigError> {
    let mut normalized = PathBuf::new();
    for component in Path::new(value).components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => normalized.push(part),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a directory inside the project root, got {value:?}"
                )));
            }
        }
    }
    Ok(normalized)
}

/// Source, output, and cache directories, relative to the project root.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub source: String,
    pub output: String,
    pub cache: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            source: "src".to_string(),
            output: "build".to_string(),
            cache: ".assetpipe-cache".to_string(),
        }
    }
}

/// Stylesheet compilation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StylesConfig {
    /// Extra Sass load paths, relative to the project root.
    pub include_paths: Vec<String>,
    /// Browser targets for production prefixing, as `"<browser> <version>"`.
    pub targets: Vec<String>,
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self {
            include_paths: vec!["node_modules".to_string()],
            targets: vec![
                "ie 11".to_string(),
                "safari 9".to_string(),
                "chrome 49".to_string(),
                "firefox 52".to_string(),
            ],
        }
    }
}

/// Script bundling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScriptsConfig {
    /// Entry point, relative to `paths.source`.
    pub entry: String,
    /// Output file pattern; `[name]` is replaced with the entry stem.
    pub output_name: String,
    /// Bundler executable.
    pub bundler: String,
    /// Language level the bundle is transpiled down to.
    pub target: String,
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self {
            entry: "js/index.js".to_string(),
            output_name: "[name].js".to_string(),
            bundler: "esbuild".to_string(),
            target: "es2015".to_string(),
        }
    }
}

/// Image optimization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// PNG optimization level, 0 (fastest) to 7 (smallest).
    pub optimization_level: u8,
    pub progressive: bool,
    pub interlaced: bool,
    pub jpeg_quality: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            optimization_level: 3,
            progressive: true,
            interlaced: true,
            jpeg_quality: 85,
        }
    }
}

/// Development server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

/// File watching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// Quiet period before a triggered task (or a browser reload) runs.
    pub debounce_ms: u64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: 100 }
    }
}

/// Browser families accepted in `styles.targets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Browser {
    Android,
    Chrome,
    Edge,
    Firefox,
    Ie,
    IosSafari,
    Opera,
    Safari,
    Samsung,
}

/// Parse a `"<browser> <major>[.<minor>]"` target.
///
/// The version is encoded as `major << 16 | minor << 8`, the packing used by
/// CSS tooling for browser versions.
pub fn parse_browser_target(target: &str) -> Result<(Browser, u32), ConfigError> {
    let invalid = || ConfigError::Validation(format!("invalid browser target: {target:?}"));
    let (name, version) = target.trim().split_once(' ').ok_or_else(invalid)?;
    let browser = match name.to_ascii_lowercase().as_str() {
        "android" => Browser::Android,
        "chrome" => Browser::Chrome,
        "edge" => Browser::Edge,
        "firefox" | "ff" => Browser::Firefox,
        "ie" => Browser::Ie,
        "ios" | "ios_saf" => Browser::IosSafari,
        "opera" => Browser::Opera,
        "safari" => Browser::Safari,
        "samsung" => Browser::Samsung,
        _ => return Err(invalid()),
    };
    let mut parts = version.trim().splitn(2, '.');
    let major: u32 = parts
        .next()
        .and_then(|p| p.parse().ok())
        .ok_or_else(invalid)?;
    let minor: u32 = match parts.next() {
        Some(p) => p.parse().map_err(|_| invalid())?,
        None => 0,
    };
    if major > 0xff || minor > 0xff {
        return Err(invalid());
    }
    Ok((browser, (major << 16) | (minor << 8)))
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ProjectConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `assetpipe.toml` from the project root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load the project config: user values over stock defaults, validated.
pub fn load_config(root: &Path) -> Result<ProjectConfig, ConfigError> {
    let merged = match load_raw_config(root)? {
        Some(overlay) => merge_toml(stock_defaults_value(), overlay),
        None => stock_defaults_value(),
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `assetpipe.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# assetpipe configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.
#
# The build mode comes from the environment, not from this file:
#   NODE_ENV=production assetpipe build

# ---------------------------------------------------------------------------
# Directories (relative to the project root)
# ---------------------------------------------------------------------------
# output and cache must not be the root itself, the source directory or
# one of its parents, and no path may leave the root with "..".
[paths]
source = "src"
# Removed entirely by `assetpipe clean` and at the start of every build.
output = "build"
# Optimized image cache. Lives outside the output so clean keeps it.
cache = ".assetpipe-cache"

# ---------------------------------------------------------------------------
# Stylesheets: <source>/sass/*.sass|*.scss -> <output>/css/
# ---------------------------------------------------------------------------
[styles]
# Extra @use/@import load paths.
include_paths = ["node_modules"]
# Browsers that production CSS is prefixed for ("<browser> <version>").
# Known browsers: android chrome edge firefox ie ios opera safari samsung
targets = ["ie 11", "safari 9", "chrome 49", "firefox 52"]

# ---------------------------------------------------------------------------
# Scripts: one entry point -> <output>/js/
# ---------------------------------------------------------------------------
[scripts]
entry = "js/index.js"
# [name] is replaced with the entry file stem.
output_name = "[name].js"
# Bundler executable (esbuild-compatible command line).
bundler = "esbuild"
target = "es2015"

# ---------------------------------------------------------------------------
# Images: <source>/assets/img/** -> <output>/assets/img/
# ---------------------------------------------------------------------------
[images]
# PNG optimization level, 0 (fastest) to 7 (smallest).
optimization_level = 3
progressive = true
interlaced = true
# JPEG re-encoding quality (1-100). The original is kept if it is smaller.
jpeg_quality = 85

# ---------------------------------------------------------------------------
# Development server
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
port = 3000

# ---------------------------------------------------------------------------
# Watch
# ---------------------------------------------------------------------------
[watch]
# Quiet period in milliseconds before a triggered task or reload runs.
debounce_ms = 100
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_matches_layout_contract() {
        let config = ProjectConfig::default();
        assert_eq!(config.paths.source, "src");
        assert_eq!(config.paths.output, "build");
        assert_eq!(config.scripts.entry, "js/index.js");
        assert_eq!(config.scripts.output_name, "[name].js");
        assert_eq!(config.styles.include_paths, vec!["node_modules"]);
    }

    #[test]
    fn default_image_settings() {
        let config = ProjectConfig::default();
        assert_eq!(config.images.optimization_level, 3);
        assert!(config.images.progressive);
        assert!(config.images.interlaced);
    }

    #[test]
    fn parse_partial_config() {
        let config: ProjectConfig = toml::from_str(
            r#"
[server]
port = 8080
"#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.paths.output, "build");
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
[paths]
output = "dist"

[images]
jpeg_quality = 70
"#,
        )
        .unwrap();

        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.paths.output, "dist");
        assert_eq!(config.paths.source, "src");
        assert_eq!(config.images.jpeg_quality, 70);
        assert_eq!(config.images.optimization_level, 3);
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "[server\nport = ").unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_key_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[server]\nprot = 3000\n",
        )
        .unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<ProjectConfig, _> = toml::from_str("[gulp]\nfoo = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn validate_default_config_passes() {
        ProjectConfig::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_output_equal_to_source() {
        let mut config = ProjectConfig::default();
        config.paths.output = "src".into();
        assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn validate_rejects_output_that_would_clean_root_or_sources() {
        for output in [".", "./", "..", "./src", "src/..", "src/./", "../build", "/tmp/build"] {
            let mut config = ProjectConfig::default();
            config.paths.output = output.into();
            assert!(
                matches!(config.validate(), Err(ConfigError::Validation(_))),
                "output {output:?} should be rejected"
            );
        }
    }

    #[test]
    fn validate_rejects_output_containing_source() {
        let mut config = ProjectConfig::default();
        config.paths.source = "web/src".into();
        config.paths.output = "web".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_cache_that_would_clear_root_or_sources() {
        for cache in [".", "src", "../cache"] {
            let mut config = ProjectConfig::default();
            config.paths.cache = cache.into();
            assert!(config.validate().is_err(), "cache {cache:?} should be rejected");
        }
    }

    #[test]
    fn validate_accepts_nested_and_dotted_output() {
        for output in ["./build", "dist/site", "public/"] {
            let mut config = ProjectConfig::default();
            config.paths.output = output.into();
            config.validate().unwrap();
        }
    }

    #[test]
    fn validate_rejects_level_out_of_range() {
        let mut config = ProjectConfig::default();
        config.images.optimization_level = 8;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_jpeg_quality() {
        let mut config = ProjectConfig::default();
        config.images.jpeg_quality = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_browser_target() {
        let mut config = ProjectConfig::default();
        config.styles.targets = vec!["netscape 4".into()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parse_browser_target_packs_version() {
        assert_eq!(parse_browser_target("ie 11").unwrap(), (Browser::Ie, 11 << 16));
        assert_eq!(
            parse_browser_target("safari 9.1").unwrap(),
            (Browser::Safari, (9 << 16) | (1 << 8))
        );
        assert_eq!(
            parse_browser_target("Firefox 52").unwrap().0,
            Browser::Firefox
        );
    }

    #[test]
    fn parse_browser_target_rejects_garbage() {
        assert!(parse_browser_target("chrome").is_err());
        assert!(parse_browser_target("chrome latest").is_err());
        assert!(parse_browser_target("chrome 9.x").is_err());
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str("[a]\nx = 1\ny = 2\n").unwrap();
        let overlay: toml::Value = toml::from_str("[a]\ny = 3\n").unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged["a"]["x"].as_integer(), Some(1));
        assert_eq!(merged["a"]["y"].as_integer(), Some(3));
    }

    #[test]
    fn stock_config_toml_parses_to_defaults() {
        let config: ProjectConfig = toml::from_str(stock_config_toml()).unwrap();
        let defaults = ProjectConfig::default();
        assert_eq!(config.paths.cache, defaults.paths.cache);
        assert_eq!(config.styles.targets, defaults.styles.targets);
        assert_eq!(config.server.port, defaults.server.port);
        assert_eq!(config.watch.debounce_ms, defaults.watch.debounce_ms);
    }
}
