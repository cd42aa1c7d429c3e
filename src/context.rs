//! The immutable inputs every task reads.

use crate::config::{self, ConfigError, ProjectConfig};
use crate::layout::Layout;
use crate::mode::Mode;
use std::path::Path;

/// Mode, layout, and configuration, resolved once at startup.
///
/// Tasks take `&BuildContext` and never read the environment themselves, so
/// a task's behavior is fully determined by the context it is handed.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub mode: Mode,
    pub layout: Layout,
    pub config: ProjectConfig,
}

impl BuildContext {
    pub fn new(root: &Path, mode: Mode, config: ProjectConfig) -> Self {
        Self {
            mode,
            layout: Layout::new(root, &config),
            config,
        }
    }

    /// Load `assetpipe.toml` from `root` and build a context for `mode`.
    pub fn load(root: &Path, mode: Mode) -> Result<Self, ConfigError> {
        let config = config::load_config(root)?;
        Ok(Self::new(root, mode, config))
    }
}
