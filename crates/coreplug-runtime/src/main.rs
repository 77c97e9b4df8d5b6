// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! `coreplugd`: runs the adaptive core-count governor against the host (or a
//! simulated package) and reads operator commands from stdin.

mod config;
mod console;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Backend, DaemonConfig};
use console::{Console, Flow};
use coreplug_control::{Governor, HotplugService};
use coreplug_core::{CoreHotplug, CpuTimeSource};
use coreplug_infra::{ManualPowerEvents, ProcStatTimes, SimulatedCpus, SysfsHotplug};
use coreplug_telemetry::HotplugMetrics;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "coreplugd", version, about = "Adaptive core-count governor")]
struct Args {
    /// TOML configuration file with `[governor]` and `[platform]` tables.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use the in-memory package instead of sysfs.
    #[arg(long)]
    simulate: bool,

    /// Core count for the simulated package.
    #[arg(long)]
    cores: Option<usize>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

/// The backends chosen at startup.
struct Host {
    hotplug: Arc<dyn CoreHotplug>,
    times: Arc<dyn CpuTimeSource>,
    simulated: Option<Arc<SimulatedCpus>>,
}

fn build_host(config: &DaemonConfig, args: &Args) -> Host {
    let backend = if args.simulate {
        Backend::Simulated
    } else {
        config.platform.backend
    };
    match backend {
        Backend::Simulated => {
            let cores = args.cores.unwrap_or(config.platform.simulated_cores);
            log::info!("Using a simulated package of {cores} cores");
            let sim = Arc::new(SimulatedCpus::new(cores));
            Host {
                hotplug: sim.clone(),
                times: sim.clone(),
                simulated: Some(sim),
            }
        }
        Backend::Sysfs => {
            let hotplug = SysfsHotplug::new(&config.platform.sysfs_root);
            log::info!(
                "Using sysfs at {} ({} cores)",
                hotplug.root().display(),
                hotplug.core_count()
            );
            Host {
                hotplug: Arc::new(hotplug),
                times: Arc::new(ProcStatTimes::new(&config.platform.proc_stat_path)),
                simulated: None,
            }
        }
    }
}

fn run_console(console: &Console) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read from stdin")?;
        let (reply, flow) = console.handle_line(&line);
        if let Some(reply) = reply {
            writeln!(stdout, "{reply}").context("Failed to write to stdout")?;
            stdout.flush().context("Failed to flush stdout")?;
        }
        if flow == Flow::Quit {
            break;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    coreplug_telemetry::logging::init(&args.log_level);

    let config = DaemonConfig::load(args.config.as_deref())?;
    let host = build_host(&config, &args);

    let metrics = Arc::new(HotplugMetrics::new());
    let governor = Arc::new(
        Governor::from_config(&config.governor, host.hotplug, host.times, metrics)
            .context("Invalid governor configuration")?,
    );

    let power = Arc::new(ManualPowerEvents::new());
    let mut service = HotplugService::new(Arc::clone(&governor));
    service
        .start(power.as_ref())
        .context("Failed to start the hotplug service")?;
    log::info!("coreplugd running; type 'help' for commands");

    let console = Console::new(Arc::clone(&governor), power, host.simulated);
    let result = run_console(&console);

    service.stop();
    log::info!("coreplugd stopped with {} cores online", governor.online_cores().len());
    result
}
