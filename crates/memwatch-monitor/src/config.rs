//! Monitor configuration.
//!
//! Two layers:
//! - [`WatchOptions`] is the raw configuration surface (JSON file, CLI
//!   flags). Sizes may be numbers or strings like `"512M"`.
//! - [`MonitorConfig`] is the validated, immutable form the monitor runs on.
//!
//! A threshold of `0` always means the check is disabled.
//!
//! # Example
//!
//! ```rust
//! use memwatch_monitor::{MonitorConfig, WatchOptions, SizeSpec};
//!
//! let options = WatchOptions {
//!     max_rss: Some(SizeSpec::Text("1M".to_string())),
//!     line_trace: true,
//!     activate_from: Some("app:10".to_string()),
//!     ..WatchOptions::default()
//! };
//! let config = options.into_config()?;
//! assert_eq!(config.max_rss, 1_048_576);
//! # Ok::<(), memwatch_monitor::ConfigError>(())
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::size;

/// Modules belonging to the host's own pattern-compiler machinery.
///
/// They never open the activation window and never produce trace lines.
pub const INTERNAL_MODULES: [&str; 3] = ["sre_compile", "sre_parse", "opcode"];

/// Returns true if `module` is part of the fixed internal-exclusion set.
#[must_use]
pub fn is_internal_module(module: &str) -> bool {
    INTERNAL_MODULES.contains(&module)
}

/// Code location that opens the activation window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivationMarker {
    /// Module that must be reached.
    pub module: String,
    /// Specific line within the module, or any line when unset.
    pub line: Option<u32>,
}

impl ActivationMarker {
    /// Creates a marker.
    #[must_use]
    pub fn new(module: impl Into<String>, line: Option<u32>) -> Self {
        Self {
            module: module.into(),
            line,
        }
    }
}

impl FromStr for ActivationMarker {
    type Err = ConfigError;

    /// Parses `module` or `module:line`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (module, line) = match s.split_once(':') {
            Some((module, line)) => (module, Some(line)),
            None => (s, None),
        };

        if module.is_empty() {
            return Err(ConfigError::Marker(s.to_string()));
        }

        let line = match line {
            None | Some("") => None,
            Some(text) => Some(
                text.parse::<u32>()
                    .map_err(|_| ConfigError::Marker(s.to_string()))?,
            ),
        };

        Ok(Self::new(module, line))
    }
}

impl fmt::Display for ActivationMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}", self.module, line),
            None => f.write_str(&self.module),
        }
    }
}

/// Validated configuration for [`Monitor`](crate::Monitor).
///
/// Built once per run. Use the `with_*` methods or
/// [`WatchOptions::into_config`].
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// RSS limit in bytes (0 = disabled).
    pub max_rss: u64,
    /// VMS limit in bytes (0 = disabled).
    pub max_vms: u64,
    /// Memory percentage limit (0 = disabled).
    pub max_percent: f64,
    /// Reserved minimum-RSS slot. Never evaluated.
    pub min_rss: u64,
    /// Reserved minimum-VMS slot. Never evaluated.
    pub min_vms: u64,
    /// Emit one trace line per executed source line.
    pub line_trace: bool,
    /// Modules that never produce trace lines.
    pub ignore_modules: BTreeSet<String>,
    /// Location that opens the activation window.
    pub activation_marker: Option<ActivationMarker>,
}

impl MonitorConfig {
    /// Creates a config with every threshold disabled, tracing off and
    /// the internal modules ignored.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_rss: 0,
            max_vms: 0,
            max_percent: 0.0,
            min_rss: 0,
            min_vms: 0,
            line_trace: false,
            ignore_modules: INTERNAL_MODULES.iter().map(|m| (*m).to_string()).collect(),
            activation_marker: None,
        }
    }

    /// Sets the RSS limit in bytes.
    #[must_use]
    pub const fn with_max_rss(mut self, bytes: u64) -> Self {
        self.max_rss = bytes;
        self
    }

    /// Sets the VMS limit in bytes.
    #[must_use]
    pub const fn with_max_vms(mut self, bytes: u64) -> Self {
        self.max_vms = bytes;
        self
    }

    /// Sets the memory percentage limit.
    #[must_use]
    pub const fn with_max_percent(mut self, percent: f64) -> Self {
        self.max_percent = percent;
        self
    }

    /// Enables or disables line tracing.
    #[must_use]
    pub const fn with_line_trace(mut self, enabled: bool) -> Self {
        self.line_trace = enabled;
        self
    }

    /// Adds a module to the ignore list.
    #[must_use]
    pub fn with_ignored_module(mut self, module: impl Into<String>) -> Self {
        self.ignore_modules.insert(module.into());
        self
    }

    /// Sets the activation marker.
    #[must_use]
    pub fn with_activation_marker(mut self, marker: ActivationMarker) -> Self {
        self.activation_marker = Some(marker);
        self
    }

    /// Returns true if no stop condition is enabled.
    #[must_use]
    pub fn thresholds_disabled(&self) -> bool {
        self.max_rss == 0 && self.max_vms == 0 && self.max_percent == 0.0
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A size given either as raw bytes or as a human-readable string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSpec {
    /// Byte count.
    Bytes(u64),
    /// Human-readable size such as `"1G"`.
    Text(String),
}

impl SizeSpec {
    fn resolve(&self, option: &'static str) -> Result<u64, ConfigError> {
        match self {
            Self::Bytes(bytes) => Ok(*bytes),
            Self::Text(text) => {
                size::parse(text).map_err(|source| ConfigError::Size { option, source })
            }
        }
    }
}

/// Raw configuration surface, as read from a JSON file or assembled from
/// command-line flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WatchOptions {
    /// RSS limit.
    pub max_rss: Option<SizeSpec>,
    /// VMS limit.
    pub max_vms: Option<SizeSpec>,
    /// Percentage limit.
    pub max_percent: Option<f64>,
    /// Reserved minimum RSS.
    pub min_rss: Option<SizeSpec>,
    /// Reserved minimum VMS.
    pub min_vms: Option<SizeSpec>,
    /// Per-line tracing.
    pub line_trace: bool,
    /// Extra modules to ignore, on top of the internal set.
    pub ignore_modules: Vec<String>,
    /// `module[:line]` that opens the activation window.
    pub activate_from: Option<String>,
}

impl WatchOptions {
    /// Overlays `other` on top of `self`. Options set in `other` win;
    /// ignore lists are merged.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.max_rss = other.max_rss.or(self.max_rss);
        self.max_vms = other.max_vms.or(self.max_vms);
        self.max_percent = other.max_percent.or(self.max_percent);
        self.min_rss = other.min_rss.or(self.min_rss);
        self.min_vms = other.min_vms.or(self.min_vms);
        self.line_trace |= other.line_trace;
        self.ignore_modules.extend(other.ignore_modules);
        self.activate_from = other.activate_from.or(self.activate_from);
        self
    }

    /// Validates the options into a [`MonitorConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed sizes, a percentage outside
    /// `0..=100`, or a malformed activation marker.
    pub fn into_config(self) -> Result<MonitorConfig, ConfigError> {
        let resolve = |spec: &Option<SizeSpec>, option| {
            spec.as_ref().map_or(Ok(0), |s| s.resolve(option))
        };

        let max_percent = self.max_percent.unwrap_or(0.0);
        if !(0.0..=100.0).contains(&max_percent) {
            return Err(ConfigError::Percent(max_percent));
        }

        let activation_marker = self
            .activate_from
            .as_deref()
            .map(str::parse::<ActivationMarker>)
            .transpose()?;

        let mut config = MonitorConfig::new();
        config.max_rss = resolve(&self.max_rss, "maxRss")?;
        config.max_vms = resolve(&self.max_vms, "maxVms")?;
        config.min_rss = resolve(&self.min_rss, "minRss")?;
        config.min_vms = resolve(&self.min_vms, "minVms")?;
        config.max_percent = max_percent;
        config.line_trace = self.line_trace;
        config.ignore_modules.extend(self.ignore_modules);
        config.activation_marker = activation_marker;

        Ok(config)
    }
}
