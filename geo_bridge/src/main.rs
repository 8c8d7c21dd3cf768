use std::cell::RefCell;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use geo_bridge::{ScriptHost, SharedEngine};
use geo_construction::Construction;

mod cli;
use cli::Args;

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    args.validate()?;

    let construction = Rc::new(RefCell::new(Construction::new()));
    let engine: SharedEngine = construction.clone();
    let host = ScriptHost::new(engine, args.bridge_options())
        .context("setting up Lua host")?;

    let outcome = host.run_file(&args.script);

    if args.verbose {
        for event in host.events() {
            println!("{event}");
        }
    }

    if let Some(path) = args.snapshot_json.as_ref() {
        construction
            .borrow()
            .write_snapshot_json(path)
            .with_context(|| format!("writing construction snapshot to {}", path.display()))?;
        println!("Saved construction snapshot to {}", path.display());
    }

    if let Some(path) = args.events_json.as_ref() {
        write_events_json(path, &host.events())?;
        println!("Saved bridge event log to {}", path.display());
    }

    outcome
}

fn write_events_json(path: &Path, events: &[String]) -> Result<()> {
    let json = serde_json::to_string_pretty(events).context("serializing bridge events to JSON")?;
    fs::write(path, json).with_context(|| format!("writing bridge events to {}", path.display()))?;
    Ok(())
}
