// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `config.json` in the data directory.  A missing or malformed file falls
// back to defaults; the defaults are written out on first run so operators
// have something to edit.

use std::path::Path;

use recordvault_core::SecurityConfig;
use recordvault_core::error::Result;

pub const CONFIG_FILE: &str = "config.json";

/// Load the configuration, or defaults when absent or unreadable.
pub fn load_config(data_dir: &Path) -> SecurityConfig {
    let path = data_dir.join(CONFIG_FILE);
    let Ok(data) = std::fs::read_to_string(&path) else {
        return SecurityConfig::default();
    };
    match serde_json::from_str(&data) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "malformed config, using defaults");
            SecurityConfig::default()
        }
    }
}

pub fn persist_config(data_dir: &Path, config: &SecurityConfig) -> Result<()> {
    let path = data_dir.join(CONFIG_FILE);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}

/// Load the configuration, writing the defaults if no file exists yet.
pub fn load_or_init(data_dir: &Path) -> Result<SecurityConfig> {
    let config = load_config(data_dir);
    if !data_dir.join(CONFIG_FILE).exists() {
        persist_config(data_dir, &config)?;
        tracing::info!(dir = %data_dir.display(), "wrote default config");
    }
    Ok(config)
}
