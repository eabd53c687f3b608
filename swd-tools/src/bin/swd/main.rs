mod cmd;
mod config;
mod util;

use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use swd_probe::{CortexM, DebugProbeError, Lister, ProbeCreationError, StLink};

use crate::cmd::actions::{ActionContext, Engine, ACTIONS_HELP};
use crate::config::{Config, Overrides};
use crate::util::logging::{setup_logging, LevelFilter};

/// Inspect and modify Cortex-M targets through an ST-Link
#[derive(clap::Parser)]
#[clap(name = "swd", version, after_help = ACTIONS_HELP)]
struct Cli {
    /// Only print errors
    #[clap(short, long, help_heading = "LOG CONFIGURATION")]
    quiet: bool,
    /// Print debug output, twice for trace output
    #[clap(short, long, action = ArgAction::Count, help_heading = "LOG CONFIGURATION")]
    debug: u8,
    /// Print info output
    #[clap(short, long, action = ArgAction::Count, help_heading = "LOG CONFIGURATION")]
    info: u8,
    /// Increase verbosity of memory dumps
    #[clap(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// SWD frequency in Hz
    #[clap(short, long, value_parser = parse_frequency)]
    freq: Option<u32>,
    /// Select the ST-Link by the start or end of its serial number
    #[clap(short, long)]
    serial: Option<String>,
    /// Timeout of a single USB transfer in milliseconds
    #[clap(long)]
    timeout_ms: Option<u64>,
    /// Configuration file to use instead of ./swd.toml
    #[clap(long, env = "SWD_CONFIG")]
    config: Option<PathBuf>,

    /// Actions, processed sequentially
    actions: Vec<String>,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            serial: self.serial.clone(),
            frequency: self.freq,
            timeout_ms: self.timeout_ms,
            verbose: (self.verbose > 0).then_some(self.verbose),
        }
    }
}

fn parse_frequency(input: &str) -> Result<u32, String> {
    util::parse::parse_u32(input).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _log_guard = setup_logging(LevelFilter::from_flags(cli.quiet, cli.debug, cli.info));

    match run(&cli) {
        Ok(count) => {
            tracing::debug!("{} actions processed", count);
            ExitCode::SUCCESS
        }
        Err(err) => {
            for line in diagnostics(&err) {
                tracing::error!("{}", line);
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<usize> {
    let config = Config::load(cli.config.as_deref(), &cli.overrides())
        .context("Failed to load the configuration")?;

    let device = Lister::new().open(&config.serial)?;
    let mut stlink = StLink::with_timeout(device, Duration::from_millis(config.timeout_ms))?;

    let speed_khz = stlink.attach(config.frequency / 1000)?;
    tracing::debug!("SWD frequency: {} kHz", speed_khz);

    // Fails early if no target is connected.
    let idcode = stlink
        .read_idcode()
        .context("Failed to read the IDCODE of the target")?;
    tracing::debug!("IDCODE: {:08x}", idcode);

    tracing::info!("{}", stlink.version_string());
    tracing::info!("Target voltage: {:.2}V", stlink.get_target_voltage()?);

    let mut core = CortexM::new(stlink);
    let mut stdout = std::io::stdout().lock();
    let mut ctx = ActionContext::new(&mut core, &mut stdout, config.verbose);

    let count = Engine::new()
        .process(&mut ctx, &cli.actions)
        .inspect_err(|err| {
            let skipped = cli.actions.len() - err.index - 1;
            tracing::debug!("Skipping {} remaining actions", skipped);
        })?;
    stdout.flush()?;

    Ok(count)
}

/// The messages logged for a failed run.
fn diagnostics(err: &anyhow::Error) -> Vec<String> {
    let creation_error = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<ProbeCreationError>());

    match creation_error {
        Some(ProbeCreationError::NotFound) => vec!["ST-Link not connected.".to_string()],
        Some(ProbeCreationError::Ambiguous { serial_numbers }) => vec![
            format!(
                "ST-Link Found more devices with these serial numbers:\n  {}",
                serial_numbers.join("\n  ")
            ),
            "Use parameter: -s serial_no".to_string(),
        ],
        _ => {
            let transport_fault = err
                .chain()
                .filter_map(|cause| cause.downcast_ref::<DebugProbeError>())
                .any(DebugProbeError::is_transport);

            if transport_fault {
                vec![format!("USB transport error: {err:#}")]
            } else {
                vec![format!("{err:#}")]
            }
        }
    }
}
