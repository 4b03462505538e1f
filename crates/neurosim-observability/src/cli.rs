// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-neurosim-npu-cycle-engine` to raise one
//! crate's log level to `debug`.

use std::collections::HashMap;
use std::env;

use crate::{crate_target, KNOWN_CRATES};

/// Per-crate debug switches
///
/// # Example
/// ```rust
/// use neurosim_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-neurosim-config".to_string()]);
/// assert!(flags.is_enabled("neurosim-config"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: HashMap<String, bool>,
}

impl CrateDebugFlags {
    /// Parse `--debug-{crate-name}` and `--debug-all` arguments
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();
        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
            } else if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enable(crate_name);
            }
        }
        flags
    }

    pub fn enable(&mut self, crate_name: &str) {
        self.enabled_crates.insert(crate_name.to_string(), true);
    }

    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enable(crate_name);
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains_key(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// `DEBUG` if enabled, `INFO` otherwise.
    pub fn log_level(&self, crate_name: &str) -> tracing::Level {
        if self.is_enabled(crate_name) {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// `EnvFilter` directive string, e.g.
    /// `"neurosim_npu_cycle_engine=debug,info"`. Enabled crates are sorted so
    /// the string is stable.
    pub fn to_filter_string(&self, default_level: &str) -> String {
        let mut crates: Vec<&String> = self.enabled_crates.keys().collect();
        crates.sort();
        let mut filters: Vec<String> = crates
            .into_iter()
            .map(|name| format!("{}=debug", crate_target(name)))
            .collect();
        filters.push(default_level.to_lowercase());
        filters.join(",")
    }
}

/// Debug flags from the process arguments plus `NEUROSIM_DEBUG`
/// (comma-separated crate names or `all`).
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());
    if let Ok(env_var) = env::var("NEUROSIM_DEBUG") {
        merge_env_list(&mut flags, &env_var);
    }
    flags
}

fn merge_env_list(flags: &mut CrateDebugFlags, list: &str) {
    if list.trim() == "all" {
        flags.enable_all();
        return;
    }
    for crate_name in list.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        flags.enable(crate_name);
    }
}

/// Help text for the debug flags
pub fn debug_flags_help() -> String {
    format!(
        r#"Debug Flags:
  --debug-all                    Enable debug logging for all crates
  --debug-{{crate-name}}          Enable debug logging for specific crate

Available crates:
  {}

Environment Variable:
  NEUROSIM_DEBUG={{crate-name}}[,{{crate-name}}]
  NEUROSIM_DEBUG=all
"#,
        KNOWN_CRATES.join(", ")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_crate_flag() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-neurosim-npu-cycle-engine".to_string()]);
        assert!(flags.is_enabled("neurosim-npu-cycle-engine"));
        assert!(!flags.is_enabled("neurosim-config"));
    }

    #[test]
    fn test_debug_all() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-all".to_string()]);
        for crate_name in KNOWN_CRATES {
            assert!(flags.is_enabled(crate_name), "{} should be enabled", crate_name);
        }
    }

    #[test]
    fn test_filter_string_uses_targets() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-neurosim-npu-plasticity".to_string()]);
        assert_eq!(flags.to_filter_string("warn"), "neurosim_npu_plasticity=debug,warn");
        assert_eq!(CrateDebugFlags::default().to_filter_string("INFO"), "info");
    }

    #[test]
    fn test_env_list() {
        let mut flags = CrateDebugFlags::default();
        merge_env_list(&mut flags, " neurosim-config , ,neurosim ");
        assert!(flags.is_enabled("neurosim-config"));
        assert!(flags.is_enabled("neurosim"));
        assert_eq!(flags.enabled_crates.len(), 2);
    }

    #[test]
    fn test_log_level() {
        let flags = CrateDebugFlags::from_args(vec!["--debug-neurosim".to_string()]);
        assert_eq!(flags.log_level("neurosim"), tracing::Level::DEBUG);
        assert_eq!(flags.log_level("neurosim-config"), tracing::Level::INFO);
    }
}
