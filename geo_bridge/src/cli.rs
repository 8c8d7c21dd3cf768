use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

use geo_bridge::BridgeOptions;

#[derive(Parser, Debug)]
#[command(
    about = "Runs a Lua construction script against a fresh geometry construction",
    version
)]
pub struct Args {
    /// Lua script to execute; `ggb` is available as a global
    #[arg(long)]
    pub script: PathBuf,

    /// Path to write the final construction as JSON
    #[arg(long)]
    pub snapshot_json: Option<PathBuf>,

    /// Path to write the bridge event log as JSON
    #[arg(long)]
    pub events_json: Option<PathBuf>,

    /// Maximum update-dispatch passes per operation before pending updates are dropped
    #[arg(long, default_value_t = 16)]
    pub max_update_passes: usize,

    /// Log every bridge event and print the event log after the run
    #[arg(long)]
    pub verbose: bool,
}

impl Args {
    pub fn validate(&self) -> Result<()> {
        if self.max_update_passes == 0 {
            bail!("--max-update-passes must be at least 1");
        }
        Ok(())
    }

    pub fn bridge_options(&self) -> BridgeOptions {
        BridgeOptions {
            max_update_passes: self.max_update_passes,
            verbose: self.verbose,
        }
    }
}
