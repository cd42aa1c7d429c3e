//! Build mode resolution.
//!
//! The mode is decided once at startup from `NODE_ENV` and then threaded
//! through every task as part of the [`BuildContext`](crate::context::BuildContext).
//! Only the exact value `production` selects a production build; anything
//! else (unset, empty, `Production`, `prod`) is a development build.
//!
//! | | Development | Production |
//! |---|---|---|
//! | CSS | expanded + `.css.map` | compressed + vendor prefixes |
//! | JS | inline source map | minified |
//! | Templates | pretty | pretty |

use serde::Serialize;
use std::fmt;

/// Environment variable that selects the build mode.
pub const MODE_ENV_VAR: &str = "NODE_ENV";

/// The only value of [`MODE_ENV_VAR`] that selects [`Mode::Production`].
pub const PRODUCTION_MARKER: &str = "production";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Development,
    Production,
}

impl Mode {
    /// Resolve the mode from the process environment.
    pub fn from_env() -> Self {
        Self::from_value(std::env::var(MODE_ENV_VAR).ok().as_deref())
    }

    /// Resolve the mode from a raw environment value.
    pub fn from_value(value: Option<&str>) -> Self {
        match value {
            Some(PRODUCTION_MARKER) => Mode::Production,
            _ => Mode::Development,
        }
    }

    pub fn is_dev(self) -> bool {
        self == Mode::Development
    }

    /// Name as understood by bundlers and templates.
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
