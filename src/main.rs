// src/main.rs
use std::io::Write;
use std::path::{Path, PathBuf};
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use ccstats::batch::{run_batch, run_job};
use ccstats::collate::collate;
use ccstats::control::{read_control_table, Job};
use ccstats::plot::{load_sweeps, render_epoch_png, select_sweeps, PlotStyle};
use ccstats::recording::{epoch_recording, scan_cell, ChannelMap, EpochKind};
use ccstats::{EpochExtractor, EpochId, EpochRecord, ExtractConfig};
#[derive(Parser, Debug)]
#[command(name = "ccstats")]
#[command(about = "Spike and membrane-property statistics from current-clamp recordings")]
#[command(version)]
struct Cli {
    /// Log per-sweep details
    #[arg(long, global = true)]
    debug: bool,
    /// Extraction parameters (JSON); missing fields keep their defaults
    #[arg(long, global = true, value_name = "JSON")]
    config: Option<PathBuf>,
    /// Junction potential subtracted from the voltage channel (mV)
    #[arg(long, global = true, value_name = "MV")]
    junction_potential: Option<f64>,
    #[command(subcommand)]
    command: Command,
}
#[derive(Subcommand, Debug)]
enum Command {
    /// Extract one epoch into a record file
    Extract {
        cell: String,
        /// Recording file, or the cell directory holding its recordings
        path: PathBuf,
        /// 1-based recording number within the cell directory
        #[arg(long, default_value_t = 1)]
        epoch: u32,
        /// Half-open sweep span to analyze
        #[arg(long, num_args = 2, value_names = ["START", "END"])]
        sweeps: Option<Vec<usize>>,
        #[arg(short = 'O', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// Extract every epoch listed in a control table
    Batch {
        control: PathBuf,
        #[arg(short = 'O', long, default_value = ".")]
        output_dir: PathBuf,
        /// Worker threads (defaults to the number of cores)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Flatten record files into epoch, sweep and IV tables
    Collate {
        /// Record files or directories of records
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(short = 'O', long, default_value = ".")]
        output_dir: PathBuf,
    },
    /// List the current-clamp epochs of a cell directory
    Scan { cell: String, dir: PathBuf },
    /// Render an epoch to PNG
    Plot {
        record: PathBuf,
        #[arg(short = 'O', long)]
        output: Option<PathBuf>,
        /// Sweeps to draw (all when omitted)
        #[arg(long, num_args = 1.., value_name = "SWEEP")]
        sweeps: Vec<usize>,
        /// Overlay the voltage traces instead of stacking them
        #[arg(long)]
        combine: bool,
        /// Time window to draw (s)
        #[arg(short = 'x', long, num_args = 2, value_names = ["START", "END"])]
        xlim: Option<Vec<f64>>,
        /// Time scale bar (s)
        #[arg(short = 'X', long, default_value_t = 0.1)]
        time_bar: f64,
        /// Voltage scale bar (mV)
        #[arg(short = 'V', long, default_value_t = 20.0)]
        voltage_bar: f64,
        /// Current scale bar (pA)
        #[arg(short = 'I', long, default_value_t = 50.0)]
        current_bar: f64,
        #[arg(short = 'W', long, default_value_t = 900)]
        width: u32,
        #[arg(short = 'H', long, default_value_t = 1200)]
        height: u32,
    },
}
#[derive(Debug)]
struct PlotArgs {
    sweeps: Vec<usize>,
    combine: bool,
    xlim: Option<Vec<f64>>,
    time_bar: f64,
    voltage_bar: f64,
    current_bar: f64,
    width: u32,
    height: u32,
}
fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();
}
fn load_config(cli: &Cli) -> Result<ExtractConfig> {
    let mut config = match &cli.config {
        Some(path) => ExtractConfig::from_json_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ExtractConfig::default(),
    };
    if let Some(mv) = cli.junction_potential {
        config.junction_potential_mv = mv;
    }
    Ok(config)
}
fn channels(config: &ExtractConfig) -> ChannelMap {
    ChannelMap {
        voltage: config.voltage_channel,
        current: config.current_channel,
        command: config.command_channel,
    }
}
fn extract(
    config: ExtractConfig,
    cell: String,
    path: &Path,
    epoch: u32,
    sweeps: Option<Vec<usize>>,
    output_dir: &Path,
) -> Result<()> {
    let file = if path.is_dir() {
        epoch_recording(path, epoch)?
    } else {
        path.to_path_buf()
    };
    let mut job = Job::new(EpochId::new(cell, epoch), file);
    if let Some([start, end]) = sweeps.as_deref() {
        job.first_sweep = Some(*start);
        job.last_sweep = Some(*end);
    }
    let extractor = EpochExtractor::new(config)?;
    run_job(&extractor, &job, output_dir)
        .with_context(|| format!("extracting {} epoch {}", job.id.cell, job.id.epoch))?;
    Ok(())
}
fn batch(
    config: ExtractConfig,
    control: &Path,
    output_dir: &Path,
    jobs: Option<usize>,
) -> Result<()> {
    let table = read_control_table(control, &channels(&config))
        .with_context(|| format!("reading control table {}", control.display()))?;
    let extractor = EpochExtractor::new(config)?;
    let outcomes = run_batch(&extractor, &table, output_dir, jobs)?;
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        bail!("{failed} of {} epochs failed", outcomes.len());
    }
    Ok(())
}
fn scan(config: &ExtractConfig, cell: &str, dir: &Path) -> Result<()> {
    let scanned = scan_cell(dir, &channels(config))
        .with_context(|| format!("scanning {}", dir.display()))?;
    let mut stdout = std::io::stdout().lock();
    for epoch in scanned {
        match epoch.kind {
            EpochKind::CurrentClamp => writeln!(stdout, "{cell} {}", epoch.epoch)?,
            other => info!("- {} epoch {}: skipped ({other:?})", cell, epoch.epoch),
        }
    }
    Ok(())
}
fn plot(
    config: &ExtractConfig,
    record: &Path,
    output: Option<PathBuf>,
    args: PlotArgs,
) -> Result<()> {
    let epoch = EpochRecord::read(record)?;
    let sweeps = load_sweeps(&epoch, config)
        .with_context(|| format!("reading sweeps from {}", epoch.source))?;
    let sweeps = select_sweeps(sweeps, &args.sweeps);
    let style = PlotStyle {
        width: args.width,
        height: args.height,
        combine: args.combine,
        xlim: args.xlim.as_deref().and_then(|w| match w {
            [start, end] => Some((*start, *end)),
            _ => None,
        }),
        time_bar_s: args.time_bar,
        voltage_bar_mv: args.voltage_bar,
        current_bar_pa: args.current_bar,
        ..PlotStyle::default()
    };
    let png = render_epoch_png(&epoch, &sweeps, &style)?;
    let output = output.unwrap_or_else(|| record.with_extension("png"));
    std::fs::write(&output, png).with_context(|| format!("writing {}", output.display()))?;
    info!("- wrote {}", output.display());
    Ok(())
}
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);
    info!("- date: {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("- version: {}", env!("CARGO_PKG_VERSION"));
    let config = load_config(&cli)?;
    match cli.command {
        Command::Extract {
            cell,
            path,
            epoch,
            sweeps,
            output_dir,
        } => extract(config, cell, &path, epoch, sweeps, &output_dir),
        Command::Batch {
            control,
            output_dir,
            jobs,
        } => batch(config, &control, &output_dir, jobs),
        Command::Collate { inputs, output_dir } => {
            collate(&inputs, &output_dir)?;
            Ok(())
        }
        Command::Scan { cell, dir } => scan(&config, &cell, &dir),
        Command::Plot {
            record,
            output,
            sweeps,
            combine,
            xlim,
            time_bar,
            voltage_bar,
            current_bar,
            width,
            height,
        } => {
            let args = PlotArgs {
                sweeps,
                combine,
                xlim,
                time_bar,
                voltage_bar,
                current_bar,
                width,
                height,
            };
            plot(&config, &record, output, args)
        }
    }
}
