// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// Architectural state of the core, as written by `m4sim --snapshot`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CpuSnapshot {
    /// r0-r15; PC is the address of the next instruction to fetch.
    pub registers: Vec<u32>,
    pub xpsr: u32,
    pub opcode: u32,
    /// Display form of the sticky fault, if any.
    pub fault: Option<String>,
}
