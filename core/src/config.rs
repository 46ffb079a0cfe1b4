//! Engine settings, loadable from TOML.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::vm::{DEFAULT_MAX_FRAMES, DEFAULT_STACK_CAPACITY};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Call depth limit per VM.
    pub max_frames: usize,
    /// Initial operand stack capacity.
    pub stack_capacity: usize,
    /// Wall-clock limit for `Engine::execute_with_timeout`.
    pub timeout_ms: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_frames: DEFAULT_MAX_FRAMES,
            stack_capacity: DEFAULT_STACK_CAPACITY,
            timeout_ms: None,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(input).context("invalid engine config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    fn validate(&self) -> Result<()> {
        if self.max_frames == 0 {
            bail!("max_frames must be at least 1");
        }
        if self.timeout_ms == Some(0) {
            bail!("timeout_ms must be positive");
        }
        Ok(())
    }
}
