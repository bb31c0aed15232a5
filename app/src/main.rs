use std::{
    io::stdout,
    path::{Path, PathBuf},
};

use clap::{Parser, Subcommand, ValueEnum};
use common::{
    AggregatedSeries, GroupingMode, RunLogAggregator,
    probe::{ProbeKind, collect_at_k, collect_probe},
    series::write_points_csv,
    util::summarize,
};
use eyre::{Context, ContextCompat, Result};
use futures::future::join_all;
use tokio::fs::read_to_string;
use tracing::{debug, error};
use tracing_subscriber::{
    EnvFilter,
    fmt::{layer, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

mod report;

const LOG_TARGETS: &[&str] = &["anyk_report", "common"];

#[derive(Parser)]
#[command(version, about = "Median reports over any-k benchmark run logs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    /// Extra tracing directives, ie. common=debug
    #[arg(short, long)]
    log: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the median TT(k) at one k
    Median {
        #[arg(short, long)]
        input: PathBuf,
        /// k to report, the last aggregated k if unset
        #[arg(short)]
        k: Option<u64>,
        #[command(flatten)]
        group: GroupArgs,
    },
    /// Print the aggregated TT(k) series
    Series {
        #[arg(short, long)]
        input: PathBuf,
        #[command(flatten)]
        group: GroupArgs,
        /// Report the delay between consecutive results instead
        #[arg(long, default_value_t = false)]
        delay: bool,
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
        #[arg(short, long)]
        title: Option<String>,
    },
    /// Median and standard deviation of TT(k) at a fixed k, per file
    AtK {
        #[arg(short)]
        k: u64,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Median of an engine statistic, per file
    Probe {
        #[arg(long, value_parser = parse_probe_kind)]
        kind: ProbeKind,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Aggregate and export every entry of a report config
    Report {
        #[arg(short, long, default_value = "report.yaml")]
        config_file: PathBuf,
    },
}

#[derive(clap::Args)]
struct GroupArgs {
    /// Stop after this k (exclusive)
    #[arg(short, long)]
    cutoff: Option<u64>,
    /// Group samples by k value instead of position within a repetition
    #[arg(long, default_value_t = false)]
    by_k: bool,
}

impl GroupArgs {
    fn aggregator(&self) -> RunLogAggregator {
        let mode = if self.by_k {
            GroupingMode::ByK
        } else {
            GroupingMode::Position
        };
        RunLogAggregator::default()
            .with_cutoff(self.cutoff)
            .with_mode(mode)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Csv,
    Json,
}

fn parse_probe_kind(s: &str) -> Result<ProbeKind, String> {
    ProbeKind::ALL
        .into_iter()
        .find(|kind| kind.to_string() == s)
        .ok_or_else(|| {
            let names = ProbeKind::ALL.map(|kind| kind.to_string());
            format!("unknown probe '{s}', expected one of: {}", names.join(", "))
        })
}

#[tokio::main]
async fn main() -> Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or("warn".to_owned());
    let args = Cli::parse();
    let file_appender = tracing_appender::rolling::never(".", "log.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let mut env_filter = EnvFilter::new("off");
    for log in &args.log {
        env_filter = env_filter.add_directive(log.parse()?);
    }
    for target in LOG_TARGETS {
        if !args.log.iter().any(|x| x.starts_with(target)) {
            env_filter = env_filter.add_directive(format!("{target}={log_level}").parse()?);
        }
    }

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            layer()
                .with_writer(std::io::stderr)
                .with_timer(ChronoLocal::new("%v %k:%M:%S %z".to_owned()))
                .compact(),
        )
        .with(layer().with_writer(non_blocking).with_ansi(false))
        .init();

    let result = match args.command {
        Commands::Median { input, k, group } => median(&input, k, &group).await,
        Commands::Series {
            input,
            group,
            delay,
            format,
            title,
        } => series(&input, &group, delay, format, title).await,
        Commands::AtK { k, inputs } => at_k(k, &inputs).await,
        Commands::Probe { kind, inputs } => probe(kind, &inputs).await,
        Commands::Report { config_file } => report::run_report(&config_file).await,
    };
    if let Err(err) = &result {
        error!("{err:#?}");
    }
    result
}

async fn read_log(path: &Path) -> Result<String> {
    read_to_string(path)
        .await
        .wrap_err_with(|| format!("Read {}", path.display()))
}

async fn aggregate_file(path: &Path, aggregator: &RunLogAggregator) -> Result<AggregatedSeries> {
    let data = read_log(path).await?;
    let series = aggregator
        .aggregate_str(&data)
        .wrap_err_with(|| format!("Aggregate {}", path.display()))?;
    debug!(
        "{}: {} points from {} instances",
        path.display(),
        series.points.len(),
        series.instances
    );
    Ok(series)
}

async fn median(input: &Path, k: Option<u64>, group: &GroupArgs) -> Result<()> {
    let series = aggregate_file(input, &group.aggregator()).await?;
    let value = match k {
        Some(k) => series
            .value_at(k)
            .with_context(|| format!("k={k} not in aggregated series of {}", input.display()))?,
        None => series.last().context("Empty series")?.value,
    };
    println!("{value:.2}");
    Ok(())
}

async fn series(
    input: &Path,
    group: &GroupArgs,
    delay: bool,
    format: OutputFormat,
    title: Option<String>,
) -> Result<()> {
    let series = aggregate_file(input, &group.aggregator()).await?;
    let title = title.unwrap_or_else(|| input.display().to_string());
    eprintln!("{} instances of {title}", series.instances);

    let (points, header) = if delay {
        let delays = series
            .delays()
            .with_context(|| format!("{} has too few points for delays", input.display()))?;
        (delays, "delay")
    } else {
        (series.points, "median")
    };

    match format {
        OutputFormat::Table => {
            for point in &points {
                println!("k = {} : {}", point.k, point.value);
            }
        }
        OutputFormat::Csv => write_points_csv(&points, header, stdout().lock())?,
        OutputFormat::Json => {
            let out = AggregatedSeries {
                instances: series.instances,
                points,
            };
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}

async fn read_all(inputs: &[PathBuf]) -> Result<Vec<(&PathBuf, String)>> {
    let reads = inputs.iter().map(|path| async move { (path, read_log(path).await) });
    join_all(reads)
        .await
        .into_iter()
        .map(|(path, data)| Ok((path, data?)))
        .collect()
}

async fn at_k(k: u64, inputs: &[PathBuf]) -> Result<()> {
    for (path, data) in read_all(inputs).await? {
        let samples = collect_at_k(k, data.lines())
            .wrap_err_with(|| format!("Collect TT({k}) from {}", path.display()))?;
        let summary = summarize(&samples).context("No samples")?;
        println!(
            "{} : TT({k}) median {:.2} std {:.2} ({} samples)",
            path.display(),
            summary.median,
            summary.std_dev,
            summary.samples
        );
    }
    Ok(())
}

async fn probe(kind: ProbeKind, inputs: &[PathBuf]) -> Result<()> {
    for (path, data) in read_all(inputs).await? {
        let samples = collect_probe(kind, data.lines())
            .wrap_err_with(|| format!("Collect {kind} from {}", path.display()))?;
        let summary = summarize(&samples).context("No samples")?;
        match kind.unit() {
            Some(unit) => println!("{} : {:.2} {unit}", path.display(), summary.median),
            None => println!("{} : {}", path.display(), summary.median),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_kind_names() {
        assert_eq!(
            parse_probe_kind("execution-time"),
            Ok(ProbeKind::ExecutionTime)
        );
        assert_eq!(parse_probe_kind("duplicates"), Ok(ProbeKind::Duplicates));
        assert!(parse_probe_kind("wall-time").unwrap_err().contains("cpu-time"));
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
