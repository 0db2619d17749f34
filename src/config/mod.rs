//! Configuration Management
//!
//! This module handles loading and saving pager and batch-writer settings.
//!
//! # Configuration Locations
//! - Local: `.docshell/config.json` (per-project)
//! - Global: `~/.config/docshell/config.json` (per-user)
//!
//! # Resolution Precedence
//! 1. Explicit command-line flags (highest priority, applied by the CLI)
//! 2. Local config file (`.docshell/config.json`)
//! 3. Global config file (`~/.config/docshell/config.json`)
//! 4. Built-in defaults
//!
//! Files are merged field by field: a local file that only sets
//! `pager.line_numbers` keeps every other value from the global file.
//!
//! Example:
//! ```json
//! {
//!   "pager": { "paginate": true, "line_numbers": false },
//!   "batch": { "write_limit": 500, "ordered": true }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backend::WriteMode;
use crate::batch::DEFAULT_WRITE_LIMIT;
use crate::error::{DocShellError, Result};

/// Default text shown at the foot of each full page
pub const DEFAULT_PROMPT: &str = "Hit Return to continue (q or quit to exit)";

/// Pager settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PagerSettings {
    /// Pause for the user after each full page
    pub paginate: bool,

    /// Text shown at the foot of each full page
    pub paginate_prompt: String,

    /// Mirror every source line to this file (append mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<PathBuf>,

    /// Prefix every rendered row with its number
    pub line_numbers: bool,

    /// Number of the first rendered row; 0 disables numbering
    pub first_line_number: usize,

    /// Render documents as indented multi-line JSON instead of a single line
    pub pretty_print: bool,
}

impl Default for PagerSettings {
    fn default() -> Self {
        Self {
            paginate: true,
            paginate_prompt: DEFAULT_PROMPT.to_string(),
            output_filename: None,
            line_numbers: true,
            first_line_number: 1,
            pretty_print: true,
        }
    }
}

impl PagerSettings {
    /// Check settings for values the pager cannot work with
    pub fn validate(&self) -> Result<()> {
        validate_prompt(&self.paginate_prompt)
    }

    /// Whether rows are numbered
    #[must_use]
    pub const fn numbering_enabled(&self) -> bool {
        self.line_numbers && self.first_line_number > 0
    }
}

/// Reject prompts the terminal could not show as plain text
pub fn validate_prompt(prompt: &str) -> Result<()> {
    if let Some(c) = prompt.chars().find(|c| c.is_control() && *c != '\n') {
        return Err(DocShellError::config_error(format!(
            "paginate_prompt contains control character {:?}",
            c
        )));
    }
    Ok(())
}

/// Batch writer settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchSettings {
    /// Documents per bulk insert
    pub write_limit: usize,

    /// Abort each batch at its first per-document error
    pub ordered: bool,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self { write_limit: DEFAULT_WRITE_LIMIT, ordered: false }
    }
}

impl BatchSettings {
    /// Write mode derived from `ordered`
    #[must_use]
    pub const fn mode(&self) -> WriteMode {
        WriteMode::from_ordered(self.ordered)
    }

    pub fn validate(&self) -> Result<()> {
        if self.write_limit == 0 {
            return Err(DocShellError::config_error("batch.write_limit must be at least 1"));
        }
        Ok(())
    }
}

/// Complete settings file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellConfig {
    pub pager: PagerSettings,
    pub batch: BatchSettings,
}

impl ShellConfig {
    pub fn validate(&self) -> Result<()> {
        self.pager.validate()?;
        self.batch.validate()
    }
}

/// Configuration file location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLocation {
    /// Local config: `.docshell/config.json`
    Local,
    /// Global config: `~/.config/docshell/config.json`
    Global,
}

impl ConfigLocation {
    /// Path of the config file for this location
    pub fn path(self) -> Result<PathBuf> {
        match self {
            Self::Local => local_config_path(),
            Self::Global => global_config_path(),
        }
    }
}

/// Get path to local config file (`.docshell/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        DocShellError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(".docshell").join("config.json"))
}

/// Get path to global config file (`~/.config/docshell/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| DocShellError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("docshell").join("config.json"))
}

/// Load the raw JSON object stored at `path`; a missing file is an empty object
fn load_value(path: &Path) -> Result<serde_json::Value> {
    if !path.exists() {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    }

    let contents = fs::read_to_string(path)
        .map_err(|e| DocShellError::config_error(format!("Could not read config file: {e}")))?;

    let value: serde_json::Value = serde_json::from_str(&contents).map_err(|e| {
        DocShellError::config_error(format!("Invalid config file {}: {e}", path.display()))
    })?;

    if !value.is_object() {
        return Err(DocShellError::config_error(format!(
            "Config file {} must contain a JSON object",
            path.display()
        )));
    }
    Ok(value)
}

fn parse_config(value: serde_json::Value) -> Result<ShellConfig> {
    let config: ShellConfig = serde_json::from_value(value)
        .map_err(|e| DocShellError::config_error(format!("Invalid config file format: {e}")))?;
    config.validate()?;
    Ok(config)
}

/// Load settings from a single config file
///
/// A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<ShellConfig> {
    parse_config(load_value(path)?)
}

/// Save settings to a config file, creating parent directories as needed
pub fn save_config(path: &Path, config: &ShellConfig) -> Result<()> {
    config.validate()?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            DocShellError::config_error(format!("Could not create config directory: {e}"))
        })?;
    }

    let contents = serde_json::to_string_pretty(config)
        .map_err(|e| DocShellError::config_error(format!("Could not serialize config: {e}")))?;

    fs::write(path, contents)
        .map_err(|e| DocShellError::config_error(format!("Could not write config file: {e}")))?;

    Ok(())
}

/// Load `global` then overlay `local` field by field
pub fn load_layered(global: &Path, local: &Path) -> Result<ShellConfig> {
    let mut merged = load_value(global)?;
    merge_values(&mut merged, load_value(local)?);
    parse_config(merged)
}

/// Load settings with precedence (local first, then global, then defaults)
pub fn load_with_precedence() -> Result<ShellConfig> {
    load_layered(&global_config_path()?, &local_config_path()?)
}

/// Deep-merge `overlay` into `base`; objects merge per key, everything else is replaced
fn merge_values(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}
