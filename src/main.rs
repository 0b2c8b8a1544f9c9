use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod config;
mod error;
mod logging;
mod pipeline;
mod projection;
mod runner;

use config::{DiscoveryScope, SpiceFallback, SpiceMode, DEFAULT_TIMEOUT_SECS};
use projection::Projection;

#[derive(Parser, Debug)]
#[command(name = "marci-isis-pipeline")]
#[command(about = "Process MRO MARCI images into map-projected PNGs using ISIS")]
#[command(version)]
#[command(group(
    clap::ArgGroup::new("map_source")
        .required(true)
        .args(["template", "map", "projection"])
))]
pub struct Args {
    /// Map template file or projection preset name (positional form)
    #[arg(value_name = "TEMPLATE")]
    pub template: Option<String>,

    /// 1 = delete intermediate files, 0 = keep them (positional form)
    #[arg(
        value_name = "DELETE",
        value_parser = clap::value_parser!(u8).range(0..=1),
        conflicts_with = "delete"
    )]
    pub legacy_delete: Option<u8>,

    /// Path to a custom ISIS .map template
    #[arg(long, env = "MARCI_MAP")]
    pub map: Option<PathBuf>,

    /// Use a predefined projection instead of a template file
    #[arg(long, env = "MARCI_PROJECTION", value_enum)]
    pub projection: Option<Projection>,

    /// Center longitude override for --projection
    #[arg(long, env = "MARCI_CENTER_LONGITUDE")]
    pub center_longitude: Option<f64>,

    /// Center latitude override for --projection
    #[arg(long, env = "MARCI_CENTER_LATITUDE")]
    pub center_latitude: Option<f64>,

    /// 1 = delete intermediate files, 0 = keep them (default: 0)
    #[arg(long, env = "MARCI_DELETE", value_parser = clap::value_parser!(u8).range(0..=1))]
    pub delete: Option<u8>,

    /// Directory containing the .IMG files
    #[arg(long, env = "MARCI_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Map-project the calibrated cubes directly instead of per band
    #[arg(long, env = "MARCI_NO_BAND_SPLIT")]
    pub no_band_split: bool,

    /// First spiceinit lookup mode
    #[arg(long, env = "MARCI_SPICE_MODE", value_enum, default_value_t = SpiceMode::Local)]
    pub spice_mode: SpiceMode,

    /// spiceinit lookup mode retried once after a failure
    #[arg(long, env = "MARCI_SPICE_FALLBACK", value_enum, default_value_t = SpiceFallback::Web)]
    pub spice_fallback: SpiceFallback,

    /// Which files later stages pick up
    #[arg(long, env = "MARCI_DISCOVERY", value_enum, default_value_t = DiscoveryScope::Directory)]
    pub discovery: DiscoveryScope,

    /// Leave items alone when their output already exists
    #[arg(long, env = "MARCI_SKIP_EXISTING")]
    pub skip_existing: bool,

    /// Per-command timeout in seconds
    #[arg(long, env = "MARCI_TIMEOUT", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    /// Only look for the ISIS executables here (default: $ISISROOT/bin, then PATH)
    #[arg(long, env = "MARCI_TOOL_DIR")]
    pub tool_dir: Option<PathBuf>,

    /// Log file (default: marci_isis_processing.log in the working directory)
    #[arg(long, env = "MARCI_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,

    /// Write the run summary as JSON
    #[arg(long, env = "MARCI_SUMMARY_JSON")]
    pub summary_json: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    let log_file = args.log_file.clone().or_else(|| {
        args.dir
            .is_dir()
            .then(|| args.dir.join(logging::LOG_FILE_NAME))
    });
    if let Err(e) = logging::init(&args.log_level, log_file.as_deref()) {
        eprintln!("Error: {:#}", e);
        return ExitCode::FAILURE;
    }

    tracing::info!(
        "Starting marci-isis-pipeline v{}",
        env!("CARGO_PKG_VERSION")
    );

    let summary_json = args.summary_json.clone();
    let config = match config::Config::try_from(args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    let runner = runner::ProcessRunner::new(config.tool_search.clone(), config.command_timeout);
    let summary = match pipeline::Driver::new(&config, &runner).run().await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::from(e.exit_code());
        }
    };

    summary.log();

    if let Some(path) = summary_json {
        if let Err(e) = summary.write_json(&path) {
            tracing::error!("{:#}", e);
            return ExitCode::FAILURE;
        }
    }

    ExitCode::SUCCESS
}
