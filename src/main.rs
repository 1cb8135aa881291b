//! biotrawl CLI: harvest followers; Ctrl+C pauses, twice stops, rerun resumes.

use anyhow::Result;
use biotrawl::engine::Cli;
use biotrawl::engine::handle_run;
use clap::Parser;
use std::time::Instant;

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    handle_run(&cli)?;
    log::debug!("Total time: {:?}", start_time.elapsed());
    Ok(())
}
