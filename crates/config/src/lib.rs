// LabWired - Firmware Simulation Platform
// Copyright (C) 2026 Andrii Shylenko
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default schema version for YAML configs
fn default_schema_version() -> String {
    "1.0".to_string()
}

fn default_name() -> String {
    "cortex-m4".to_string()
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("region '{region}' has zero size")]
    EmptyRegion { region: &'static str },
    #[error("region '{region}' at {base:#x} with size {size:#x} wraps the 32-bit address space")]
    RegionWraps {
        region: &'static str,
        base: u64,
        size: u64,
    },
    #[error("code and data regions overlap")]
    Overlap,
}

/// One contiguous address range. `size` is a human readable string, e.g. "256KiB".
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RegionConfig {
    pub base: u64,
    pub size: String,
}

impl RegionConfig {
    pub fn new(base: u64, size: &str) -> Self {
        Self {
            base,
            size: size.to_string(),
        }
    }

    pub fn size_bytes(&self) -> Result<u64> {
        parse_size(&self.size).with_context(|| format!("Bad region size '{}'", self.size))
    }
}

/// Optional execution units present on the modelled core.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilityConfig {
    #[serde(default)]
    pub fpu: bool,
    #[serde(default)]
    pub dsp: bool,
}

/// Describes the machine the interpreter runs on: one read-only code region,
/// one read-write data region and the optional extension units.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default = "default_name")]
    pub name: String,
    pub code: RegionConfig,
    pub data: RegionConfig,
    #[serde(default)]
    pub capabilities: CapabilityConfig,
    /// Overrides the stack pointer taken from the vector table.
    #[serde(default)]
    pub initial_sp: Option<u32>,
    /// Overrides the reset vector / image entry point.
    #[serde(default)]
    pub entry: Option<u32>,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            name: default_name(),
            code: RegionConfig::new(0x0000_0000, "256KiB"),
            data: RegionConfig::new(0x2000_0000, "64KiB"),
            capabilities: CapabilityConfig::default(),
            initial_sp: None,
            entry: None,
        }
    }
}

impl MachineConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read machine config {:?}", path))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to load machine config {:?}", path))?;
        tracing::info!("Loaded machine config '{}' from {:?}", config.name, path);
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).context("Failed to parse Machine Config YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that both regions are non-empty, fit in 32 bits and do not overlap.
    pub fn validate(&self) -> Result<()> {
        let code = Self::check_region("code", &self.code)?;
        let data = Self::check_region("data", &self.data)?;
        if code.0 < data.1 && data.0 < code.1 {
            return Err(ConfigError::Overlap.into());
        }
        Ok(())
    }

    fn check_region(name: &'static str, region: &RegionConfig) -> Result<(u64, u64)> {
        let size = region.size_bytes()?;
        if size == 0 {
            return Err(ConfigError::EmptyRegion { region: name }.into());
        }
        let end = region.base + size;
        if end > 1 << 32 {
            return Err(ConfigError::RegionWraps {
                region: name,
                base: region.base,
                size,
            }
            .into());
        }
        Ok((region.base, end))
    }
}

pub fn parse_size(size_str: &str) -> Result<u64> {
    use human_size::{Byte, Size, SpecificSize};
    let s: Size = size_str
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid size format: {}", e))?;
    let bytes: SpecificSize<Byte> = s.into();
    Ok(bytes.value() as u64)
}
