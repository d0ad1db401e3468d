#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]
#![deny(clippy::no_effect_underscore_binding)]

use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use ldindex::{
    Assignment, PairCoordinate, ScanConfig, ScanProgressObserver, ScanProgressStage, WindowSpec,
    parse_flat_index,
};
use std::fs::File;
use std::io::{self, BufWriter, IsTerminal, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Mutex;

#[derive(Clone, Copy, ValueEnum)]
pub enum AssignmentCli {
    Contiguous,
    Strided,
}

impl From<AssignmentCli> for Assignment {
    fn from(value: AssignmentCli) -> Self {
        match value {
            AssignmentCli::Contiguous => Assignment::Contiguous,
            AssignmentCli::Strided => Assignment::Strided,
        }
    }
}

#[derive(Args)]
pub struct WindowArgs {
    /// Number of trailing sites compared against the first site of each block
    #[arg(long)]
    pub window: u64,

    /// Number of sites the window advances between periods
    #[arg(long)]
    pub step: u64,

    /// Accept a step larger than the window, leaving gaps uncompared
    #[arg(long)]
    pub allow_gaps: bool,
}

impl WindowArgs {
    fn spec(&self) -> Result<WindowSpec, Box<dyn std::error::Error>> {
        let spec = if self.allow_gaps {
            WindowSpec::with_gaps(self.window, self.step)?
        } else {
            WindowSpec::new(self.window, self.step)?
        };
        Ok(spec)
    }
}

#[derive(Args)]
pub struct InvertArgs {
    /// Flat task index to invert
    #[arg(value_name = "INDEX", allow_hyphen_values = true)]
    pub index: String,

    /// Number of consecutive indices to invert, starting at INDEX
    #[arg(long, default_value = "1")]
    pub count: u64,

    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Args)]
pub struct PackArgs {
    /// Relative offset of the left site
    pub i: u64,

    /// Relative offset of the right site
    pub j: u64,

    /// Window period
    pub period: u64,

    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Args)]
pub struct PlanArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    /// Number of sites in the scanned sequence
    #[arg(long, value_name = "N")]
    pub sites: u64,

    /// Number of workers; defaults to the number of logical CPUs
    #[arg(long)]
    pub workers: Option<usize>,

    #[arg(long, value_enum, default_value_t = AssignmentCli::Contiguous)]
    pub assignment: AssignmentCli,

    /// Write the plan as a scan configuration (.toml)
    #[arg(long, value_name = "PATH")]
    pub save: Option<PathBuf>,
}

#[derive(Args)]
pub struct ScanArgs {
    /// Scan configuration file (.toml)
    #[arg(long)]
    pub config: PathBuf,

    /// Output TSV; standard output when absent
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "ldindex",
    version,
    about = "Partition sliding-window LD comparisons across independent workers",
    long_about = "Maps flat task counters to window-relative site pairs and back, and plans \
                 how a sliding-window LD scan is split across parallel workers."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Map flat task indices to (i, j, period)
    #[command(about = "Invert flat task indices")]
    Invert(InvertArgs),

    /// Map (i, j, period) to its flat task index
    #[command(about = "Pack a pair coordinate into a flat task index")]
    Pack(PackArgs),

    /// Describe how a scan is split across workers
    #[command(about = "Plan a scan (optionally saves scan.toml)")]
    Plan(PlanArgs),

    /// Enumerate every in-range pair of a planned scan
    #[command(about = "Run a scan plan (outputs: period, i, j, left, right, distance)")]
    Scan(ScanArgs),
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Invert(args)) => run_invert(args),
        Some(Commands::Pack(args)) => run_pack(args),
        Some(Commands::Plan(args)) => run_plan(args),
        Some(Commands::Scan(args)) => run_scan(args),
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(|err| Box::new(err) as Box<dyn std::error::Error>),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_invert(args: InvertArgs) -> Result<(), Box<dyn std::error::Error>> {
    let spec = args.window.spec()?;
    let first = parse_flat_index(&args.index)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    writeln!(out, "index\ti\tj\tperiod")?;
    for offset in 0..args.count {
        let Some(flat) = first.checked_add(offset) else {
            break;
        };
        let coord = spec.invert(flat);
        writeln!(out, "{flat}\t{}\t{}\t{}", coord.i, coord.j, coord.period)?;
    }
    out.flush()?;
    Ok(())
}

fn run_pack(args: PackArgs) -> Result<(), Box<dyn std::error::Error>> {
    let spec = args.window.spec()?;
    let flat = spec.pack(PairCoordinate {
        i: args.i,
        j: args.j,
        period: args.period,
    })?;
    println!("{flat}");
    Ok(())
}

fn run_plan(args: PlanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ScanConfig {
        window: args.window.window,
        step: args.window.step,
        n_sites: args.sites,
        workers: args.workers,
        assignment: args.assignment.into(),
        allow_gaps: args.window.allow_gaps,
    };
    let plan = config.plan()?;
    let workers = config.worker_count()?;

    println!("Window:            {}", plan.spec());
    println!("Rows per period:   {}", plan.spec().rows_per_period());
    println!("Tasks per period:  {}", plan.spec().block_size());
    println!("Sites:             {}", plan.n_sites());
    println!("Periods:           {}", plan.periods());
    println!("Total tasks:       {}", plan.total_tasks());
    println!("Workers:           {workers} ({:?})", config.assignment);

    for worker in 0..workers {
        let count = plan.worker_task_count(config.assignment, worker, workers)?;
        match config.assignment {
            Assignment::Contiguous => {
                let range = plan.worker_range(worker, workers)?;
                println!(
                    "  worker {worker:>4}: [{}, {}) {count} tasks",
                    range.start, range.end
                );
            }
            Assignment::Strided => {
                println!("  worker {worker:>4}: {worker} + k*{workers}, {count} tasks");
            }
        }
    }

    if let Some(path) = args.save {
        config.save(&path)?;
        println!("Scan configuration written to {}", path.display());
    }
    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = ScanConfig::load(&args.config)?;
    let plan = config.plan()?;
    let workers = config.worker_count()?;

    let progress = BarProgress::new();
    let results = plan.run(config.assignment, workers, &progress, |task| {
        task.pair.right - task.pair.left
    })?;

    let sink: Box<dyn Write> = match &args.out {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut out = BufWriter::new(sink);
    writeln!(out, "period\ti\tj\tleft\tright\tdistance")?;
    for (period, entries) in &results {
        for (task, distance) in entries {
            writeln!(
                out,
                "{period}\t{}\t{}\t{}\t{}\t{distance}",
                task.coord.i, task.coord.j, task.pair.left, task.pair.right
            )?;
        }
    }
    out.flush()?;

    if let Some(path) = &args.out {
        println!("Scan results written to {}", path.display());
    }
    Ok(())
}

/// Terminal progress bar shared by every scan worker.
struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl BarProgress {
    fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }
}

impl ScanProgressObserver for BarProgress {
    fn on_stage_start(&self, stage: ScanProgressStage, total_tasks: u64) {
        let draw_target = if io::stderr().is_terminal() {
            ProgressDrawTarget::stderr_with_hz(20)
        } else {
            ProgressDrawTarget::hidden()
        };

        let pb = ProgressBar::with_draw_target(Some(total_tasks), draw_target);
        if let Ok(style) = ProgressStyle::with_template(
            "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        ) {
            pb.set_style(style.progress_chars("█▉▊▋▌▍▎▏  "));
        }
        pb.set_message(stage.describe());

        if let Ok(mut slot) = self.bar.lock() {
            *slot = Some(pb);
        }
    }

    fn on_stage_advance(&self, stage: ScanProgressStage, completed_tasks: u64) {
        let pb = self.bar.lock().ok().and_then(|slot| slot.clone());
        if let Some(pb) = pb {
            pb.inc(completed_tasks);
        } else {
            log::debug!("No progress bar active for {stage}");
        }
    }

    fn on_stage_finish(&self, stage: ScanProgressStage) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(pb) = slot.take() {
                pb.finish_with_message(format!("{stage} complete"));
            }
        }
    }
}
