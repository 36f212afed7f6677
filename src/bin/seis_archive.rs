use std::process::ExitCode;

use camino::Utf8Path;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;

use seis_archive::acquire::plan_continuous;
use seis_archive::archive::Archive;
use seis_archive::chunker::{self, Sampling};
use seis_archive::config::ConfigLoader;
use seis_archive::domain::{OutputFormat, StationId, parse_time};
use seis_archive::error::ArchiveError;
use seis_archive::fetcher::ContinuousOptions;
use seis_archive::layout::CONTINUOUS_DIR_DEFAULT;
use seis_archive::logging::{TracingSink, init_tracing};
use seis_archive::output::{ChunksResult, JsonOutput, QueryResult};

#[derive(Parser)]
#[command(name = "seis-archive")]
#[command(about = "Indexed seismic waveform archives: query, inspect and plan acquisitions")]
#[command(version, author)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List archive files covering a time window")]
    Query(QueryArgs),
    #[command(about = "Print the index rows of an archive")]
    Records(RecordsArgs),
    #[command(about = "Print epoch-aligned chunk start times")]
    Chunks(ChunksArgs),
    #[command(about = "Dry run of continuous acquisition from a config file")]
    Plan(PlanArgs),
}

#[derive(Args)]
struct QueryArgs {
    dir: String,
    station: String,
    starttime: String,
    endtime: String,
}

#[derive(Args)]
struct RecordsArgs {
    dir: String,

    #[arg(long)]
    station: Option<String>,
}

#[derive(Args)]
struct ChunksArgs {
    starttime: String,
    endtime: String,

    #[arg(long, default_value_t = 3600.0)]
    duration: f64,

    #[arg(long)]
    sample: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args)]
struct PlanArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long, default_value = CONTINUOUS_DIR_DEFAULT)]
    dir: String,

    #[arg(long, value_enum, default_value_t = OutputFormat::Mseed)]
    format: OutputFormat,

    #[arg(long)]
    starttime: Option<String>,

    #[arg(long)]
    endtime: Option<String>,

    #[arg(long)]
    sample: Option<usize>,

    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<ArchiveError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ArchiveError) -> u8 {
    match error {
        ArchiveError::NotIndexed(_) | ArchiveError::MissingConfig => 2,
        ArchiveError::Transport(_)
        | ArchiveError::TransportStatus { .. }
        | ArchiveError::Inventory(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    init_tracing("info");
    let cli = Cli::parse();

    match cli.command {
        Commands::Query(args) => run_query(args),
        Commands::Records(args) => run_records(args),
        Commands::Chunks(args) => run_chunks(args),
        Commands::Plan(args) => run_plan(args),
    }
}

fn sampling(sample: Option<usize>, seed: Option<u64>) -> Option<Sampling> {
    sample.map(|count| Sampling { count, seed })
}

fn run_query(args: QueryArgs) -> miette::Result<()> {
    let station: StationId = args.station.parse()?;
    let t1 = parse_time(&args.starttime)?;
    let t2 = parse_time(&args.endtime)?;
    let archive = Archive::open(args.dir.as_str())?;
    let paths = archive
        .query(&station.to_string(), t1, t2, &TracingSink)?
        .unwrap_or_default();
    JsonOutput::print_query(&QueryResult {
        station: station.to_string(),
        starttime: t1,
        endtime: t2,
        paths: paths.into_iter().map(|path| path.to_string()).collect(),
    })
    .into_diagnostic()
}

fn run_records(args: RecordsArgs) -> miette::Result<()> {
    let station = args
        .station
        .as_deref()
        .map(str::parse::<StationId>)
        .transpose()?
        .map(|id| id.to_string());
    let archive = Archive::open(args.dir.as_str())?;
    let records = archive.entries(station.as_deref(), &TracingSink)?;
    JsonOutput::print_records(&records).into_diagnostic()
}

fn run_chunks(args: ChunksArgs) -> miette::Result<()> {
    let start = parse_time(&args.starttime)?;
    let end = parse_time(&args.endtime)?;
    let starts = chunker::chunks(
        start,
        end,
        args.duration,
        sampling(args.sample, args.seed),
        &TracingSink,
    )?
    .collect();
    JsonOutput::print_chunks(&ChunksResult {
        duration: args.duration,
        starts,
    })
    .into_diagnostic()
}

fn run_plan(args: PlanArgs) -> miette::Result<()> {
    let resolved = ConfigLoader::resolve(args.config.as_deref())?;
    let mut options = ContinuousOptions::from_config(&resolved.fetch);
    options.start = args.starttime.as_deref().map(parse_time).transpose()?;
    options.end = args.endtime.as_deref().map(parse_time).transpose()?;
    options.sampling = sampling(args.sample, args.seed);

    let plan = plan_continuous(
        &resolved.stations,
        &options,
        Utf8Path::new(&args.dir),
        args.format,
        &TracingSink,
    )?;
    JsonOutput::print_plan(&plan).into_diagnostic()
}
