//! Command-line surface.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use memwatch_monitor::{SizeSpec, WatchOptions};

#[derive(Debug, Parser)]
#[command(name = "memwatch")]
#[command(about = "Run a script and stop it when memory crosses a limit")]
pub struct Cli {
    /// Stop when RSS exceeds this size (e.g. 512M, 0 = off)
    #[arg(short = 'r', long = "maxrss", value_name = "SIZE")]
    pub max_rss: Option<String>,

    /// Stop when VMS exceeds this size (0 = off)
    #[arg(short = 'v', long = "maxvms", value_name = "SIZE")]
    pub max_vms: Option<String>,

    /// Stop when memory usage exceeds this percentage (0 = off)
    #[arg(short = 'p', long = "maxpc", value_name = "PERCENT")]
    pub max_percent: Option<f64>,

    /// Reserved minimum physical memory; accepted and ignored
    #[arg(short = 'P', long = "minphy", value_name = "SIZE")]
    pub min_phy: Option<String>,

    /// Reserved minimum virtual memory; accepted and ignored
    #[arg(short = 'V', long = "minvm", value_name = "SIZE")]
    pub min_vm: Option<String>,

    /// Print one trace line per executed script line
    #[arg(short = 'L', long = "linetrace")]
    pub line_trace: bool,

    /// Hold back tracing until MODULE[:LINE] executes
    #[arg(short = 'f', long = "tracefrom", value_name = "MODULE[:LINE]")]
    pub trace_from: Option<String>,

    /// Extra module to leave out of the trace (repeatable)
    #[arg(short = 'i', long = "ignore", value_name = "MODULE")]
    pub ignore: Vec<String>,

    /// JSON file with watch options; flags override it
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Script to run
    pub script: PathBuf,

    /// Arguments passed to the script ($1, $2, ...)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

impl Cli {
    /// Options given on the command line only.
    #[must_use]
    pub fn flag_options(&self) -> WatchOptions {
        let text = |value: &Option<String>| value.clone().map(SizeSpec::Text);
        WatchOptions {
            max_rss: text(&self.max_rss),
            max_vms: text(&self.max_vms),
            max_percent: self.max_percent,
            min_rss: text(&self.min_phy),
            min_vms: text(&self.min_vm),
            line_trace: self.line_trace,
            ignore_modules: self.ignore.clone(),
            activate_from: self.trace_from.clone(),
        }
    }

    /// Config file options (if any) with command-line flags layered on top.
    ///
    /// # Errors
    ///
    /// Fails if the config file cannot be read or is not valid JSON.
    pub fn watch_options(&self) -> anyhow::Result<WatchOptions> {
        let base = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                serde_json::from_str::<WatchOptions>(&text)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => WatchOptions::default(),
        };
        Ok(base.merge(self.flag_options()))
    }
}
