use std::time::Instant;

use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, info};
use sysinfo::{get_current_pid, ProcessExt, System, SystemExt};

use stroke_pipeline::cli::PipelineArgs;
use stroke_pipeline::error::PipelineError;
use stroke_pipeline::pipeline;

/// Resident memory of this process in bytes, 0 when unavailable.
fn monitor_memory(system: &mut System) -> u64 {
    match get_current_pid() {
        Ok(pid) => {
            system.refresh_process(pid);
            system.process(pid).map_or(0, |process| process.memory())
        }
        Err(_) => 0,
    }
}

#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let cli = PipelineArgs::parse();

    let env = Env::new().filter("STROKE_LOG");
    Builder::new()
        .filter(Some("stroke_pipeline"), cli.log_level())
        .parse_env(env)
        .init();

    debug!("Arguments {:#?}", cli);
    let config = cli.resolve()?;

    let start_time = Instant::now();
    let mut system = System::new();
    let start_memory = monitor_memory(&mut system);

    pipeline::run(&config, cli.skip_causal).await?;

    let end_memory = monitor_memory(&mut system);
    info!("Time elapsed: {:?}", start_time.elapsed());
    info!(
        "Memory used: {} bytes",
        end_memory.saturating_sub(start_memory)
    );

    Ok(())
}
