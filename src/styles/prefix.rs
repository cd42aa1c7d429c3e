//! Production post-processing: vendor prefixes and minified printing.
//!
//! `lightningcss` adds the prefixes the configured browser targets need and
//! prints compressed output. It does not emit the legacy `-ms-grid` syntax,
//! so a second pass over the minified CSS adds it for grid containers:
//!
//! | Declaration | Added before it |
//! |---|---|
//! | `display:grid` | `display:-ms-grid` |
//! | `display:inline-grid` | `display:-ms-inline-grid` |
//! | `grid-template-columns:1fr 2fr` | `-ms-grid-columns:1fr 2fr` |
//! | `grid-template-rows:repeat(3,10px)` | `-ms-grid-rows:(10px)[3]` |

use crate::config::{self, Browser, ConfigError};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use regex::{Captures, Regex};
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrefixError {
    #[error("CSS parse error: {0}")]
    Parse(String),
    #[error("CSS minify error: {0}")]
    Minify(String),
    #[error("CSS print error: {0}")]
    Print(String),
}

/// Build the lightningcss browser set from `styles.targets`.
///
/// When a browser is listed twice the lowest version wins.
pub fn browsers_from_targets(targets: &[String]) -> Result<Browsers, ConfigError> {
    let mut browsers = Browsers::default();
    for target in targets {
        let (browser, version) = config::parse_browser_target(target)?;
        let slot = match browser {
            Browser::Android => &mut browsers.android,
            Browser::Chrome => &mut browsers.chrome,
            Browser::Edge => &mut browsers.edge,
            Browser::Firefox => &mut browsers.firefox,
            Browser::Ie => &mut browsers.ie,
            Browser::IosSafari => &mut browsers.ios_saf,
            Browser::Opera => &mut browsers.opera,
            Browser::Safari => &mut browsers.safari,
            Browser::Samsung => &mut browsers.samsung,
        };
        *slot = Some(slot.map_or(version, |v| v.min(version)));
    }
    Ok(browsers)
}

/// Prefix and minify `css` for `browsers`, then add legacy grid syntax.
pub fn autoprefix(css: &str, filename: &str, browsers: Browsers) -> Result<String, PrefixError> {
    let targets = Targets::from(browsers);
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| PrefixError::Parse(e.to_string()))?;
    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| PrefixError::Minify(e.to_string()))?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| PrefixError::Print(e.to_string()))?;
    Ok(prefix_grid(&printed.code))
}

static GRID_DISPLAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{;])display:(grid|inline-grid)([;}])").expect("valid grid display regex")
});

static GRID_TEMPLATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([{;])grid-template-(columns|rows):([^;{}]+)([;}])")
        .expect("valid grid template regex")
});

static REPEAT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^repeat\((\d+),\s*([^()]+)\)$").expect("valid repeat regex")
});

/// Add `-ms-grid` declarations in front of standard grid declarations in
/// minified CSS.
pub fn prefix_grid(css: &str) -> String {
    let css = GRID_DISPLAY.replace_all(css, "${1}display:-ms-${2};display:${2}${3}");
    GRID_TEMPLATE
        .replace_all(&css, |caps: &Captures| {
            let value = caps[3].trim();
            format!(
                "{}-ms-grid-{}:{};grid-template-{}:{}{}",
                &caps[1],
                &caps[2],
                ms_track_list(value),
                &caps[2],
                value,
                &caps[4]
            )
        })
        .into_owned()
}

/// `repeat(3, 1fr)` → `(1fr)[3]`; other track lists are kept as is.
fn ms_track_list(value: &str) -> String {
    match REPEAT.captures(value) {
        Some(caps) => format!("({})[{}]", caps[2].trim(), &caps[1]),
        None => value.to_string(),
    }
}
