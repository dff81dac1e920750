//! Engine configuration options.

use crate::config::{ConfigError, Environment, PerpParams};
use crate::context::DEFAULT_MAX_EVENTS;
use serde::{Deserialize, Serialize};

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub params: PerpParams,
    /// Maximum number of events a context built by the engine retains.
    pub max_events: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            params: PerpParams::default(),
            max_events: DEFAULT_MAX_EVENTS,
        }
    }
}

impl EngineConfig {
    pub fn for_environment(env: Environment) -> Self {
        Self {
            params: env.params(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.params.validate()
    }
}
