//! Optimizer settings
//!
//! Read from a TOML file such as:
//!
//! ```toml
//! expected_executions_per_deployment = 200
//! optimize_memory_loads = true
//! max_iterations = 10
//!
//! [cost_model]
//! runtime_byte_cost = 200
//! ```
//!
//! Every key is optional; unknown keys are rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};
use crate::gas::CostModel;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OptimizerSettings {
    /// Expected executions of the code per deployment; absent means the
    /// code is treated as running once, at deployment
    pub expected_executions_per_deployment: Option<u64>,
    /// Allow resolving memory loads (programs querying `msize` never do)
    pub optimize_memory_loads: bool,
    /// Upper bound on pipeline iterations
    pub max_iterations: usize,
    pub cost_model: CostModel,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            expected_executions_per_deployment: None,
            optimize_memory_loads: true,
            max_iterations: 10,
            cost_model: CostModel::default(),
        }
    }
}

impl OptimizerSettings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: OptimizerSettings =
            toml::from_str(text).map_err(|e| CompileError::config_error(format!("invalid optimizer settings: {}", e)))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CompileError::io_error(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| CompileError::config_error(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(CompileError::config_error("max_iterations must be at least 1"));
        }
        Ok(())
    }
}
