// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Upper bound on instructions executed by `CortexM::run`.
    pub max_steps: u64,
    /// Stop `run` when an instruction leaves PC where it was (`B .`).
    pub stop_on_self_loop: bool,
    /// Log every retired instruction at TRACE level.
    pub trace_instructions: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            stop_on_self_loop: true,
            trace_instructions: false,
        }
    }
}
