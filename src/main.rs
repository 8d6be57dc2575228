use clap::{CommandFactory, Parser, ValueEnum};
use dirflow::{
    LoaderKind, Observers, Orchestrator, PipelineConfig, PipelineResult, RunReport,
    TracingObserver,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, trace};
use tracing_subscriber::EnvFilter;

/// Run a Map-Reduce word count over every file in a directory.
#[derive(Parser, Debug)]
#[command(name = "dirflow", version, about, long_about = None)]
struct Cli {
    /// Directory whose regular files are the job input
    input_dir: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Parent directory for run outputs (overrides the config)
    #[arg(short, long)]
    work_dir: Option<PathBuf>,

    /// Where stage modules come from (overrides the config)
    #[arg(long, value_enum)]
    loader: Option<LoaderArg>,

    /// Write run metrics as JSON to this file
    #[cfg(feature = "metrics")]
    #[arg(long, value_name = "FILE")]
    metrics: Option<PathBuf>,

    /// Enable verbose output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LoaderArg {
    Builtin,
    Dylib,
}

impl From<LoaderArg> for LoaderKind {
    fn from(arg: LoaderArg) -> Self {
        match arg {
            LoaderArg::Builtin => LoaderKind::Builtin,
            LoaderArg::Dylib => LoaderKind::Dylib,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose >= 3)
        .with_writer(std::io::stderr)
        .init();

    debug!("dirflow started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    let Some(input_dir) = cli.input_dir.clone() else {
        // Nothing to process is not an error.
        let mut cmd = Cli::command();
        if let Err(e) = cmd.print_help() {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
        return ExitCode::SUCCESS;
    };

    match run(&cli, input_dir) {
        Ok(report) => {
            println!(
                "{} file(s) processed; results in {}",
                report.files,
                report.final_output_dir.display()
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(kind = e.kind(), "Fatal error: {}", e);
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, input_dir: PathBuf) -> PipelineResult<RunReport> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(work_dir) = &cli.work_dir {
        config.work_dir = work_dir.clone();
    }
    if let Some(loader) = cli.loader {
        config.loader = loader.into();
    }

    #[cfg_attr(not(feature = "metrics"), allow(unused_mut))]
    let mut observers = Observers::new().with(Arc::new(TracingObserver));

    #[cfg(feature = "metrics")]
    let metrics = cli
        .metrics
        .as_ref()
        .map(|path| (path.clone(), dirflow::MetricsCollector::new()));
    #[cfg(feature = "metrics")]
    if let Some((_, metrics)) = &metrics {
        observers.push(Arc::new(dirflow::MetricsObserver::new(metrics.clone())));
    }

    let orchestrator = Orchestrator::from_config(config)?.with_observer(Arc::new(observers));
    let result = orchestrator.run(input_dir);

    #[cfg(feature = "metrics")]
    if let Some((path, metrics)) = &metrics
        && let Err(e) = metrics.save_to_file(path)
    {
        error!("could not write metrics to {}: {e:#}", path.display());
    }

    result
}
