use std::path::{Path, PathBuf};

use common::{
    RunLogAggregator,
    config::{Config, ProbeConfig, SeriesConfig, Settings},
    plot::{PlotData, export_plot_data},
    probe::{ProbeKind, collect_probe},
    util::{Summary, summarize},
};
use eyre::{Context, ContextCompat, Result, eyre};
use futures::future::join_all;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use regex::Regex;
use serde::Serialize;
use tokio::fs::{create_dir_all, read_dir, read_to_string, write};
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct ProbeReport {
    name: String,
    kind: ProbeKind,
    file: PathBuf,
    summary: Summary,
}

struct SeriesReport {
    label: String,
    instances: usize,
    jobs: Vec<PlotData>,
}

pub async fn run_report(config_file: &Path) -> Result<()> {
    let data = read_to_string(config_file)
        .await
        .wrap_err_with(|| format!("Read {}", config_file.display()))?;
    let mut config = Config::from_yaml(&data)?;
    let base = config_file.parent().unwrap_or(Path::new("."));
    config.resolve_paths(base);
    info!("Running report {}", config.name);

    create_dir_all(&config.output_dir).await?;

    let reports = aggregate_series(&config.series, &config.settings).await?;
    let mut jobs = Vec::new();
    for report in reports {
        println!("{} instances of {}", report.instances, report.label);
        jobs.extend(report.jobs);
    }
    let written = export_plot_data(&config.output_dir, &jobs, &config.settings.formats)?;
    debug!("Exported {} plot data files", written.len());

    let mut probe_reports = Vec::new();
    for probe in &config.probes {
        probe_reports.extend(run_probe(probe).await?);
    }
    for report in &probe_reports {
        let unit = report.kind.unit().map(|u| format!(" {u}")).unwrap_or_default();
        println!(
            "{} {} : {:.2}{unit}",
            report.name,
            report.file.display(),
            report.summary.median
        );
    }
    if !probe_reports.is_empty() {
        write(
            config.output_dir.join("probes.json"),
            serde_json::to_string_pretty(&probe_reports)?,
        )
        .await?;
    }

    println!("Results written to {}", config.output_dir.display());
    Ok(())
}

async fn aggregate_series(
    series: &[SeriesConfig],
    settings: &Settings,
) -> Result<Vec<SeriesReport>> {
    let reads = series.iter().map(|entry| async move {
        let data = read_to_string(&entry.input)
            .await
            .wrap_err_with(|| format!("Read {}", entry.input.display()));
        (entry, data)
    });
    let loaded = join_all(reads).await;

    loaded
        .into_par_iter()
        .map(|(entry, data)| series_report(entry, &data?, settings))
        .collect()
}

fn series_report(entry: &SeriesConfig, data: &str, settings: &Settings) -> Result<SeriesReport> {
    let series = RunLogAggregator::new(entry.options(settings))
        .aggregate_str(data)
        .wrap_err_with(|| format!("Aggregate {} ({})", entry.name, entry.input.display()))?;

    let mut jobs = vec![PlotData::new(
        &entry.name,
        entry.label(),
        series.instances,
        &series.points,
    )];
    if entry.delay {
        let delays = series
            .delays()
            .with_context(|| format!("{} has too few points for delays", entry.name))?;
        jobs.push(
            PlotData::new(
                &entry.delay_name(),
                entry.label(),
                series.instances,
                &delays,
            )
            .with_y_label("Delay (sec)"),
        );
    }

    Ok(SeriesReport {
        label: entry.label().to_owned(),
        instances: series.instances,
        jobs,
    })
}

async fn probe_files(probe: &ProbeConfig) -> Result<Vec<PathBuf>> {
    let mut files = probe.inputs.clone();
    if let (Some(dir), Some(pattern)) = (&probe.dir, &probe.pattern) {
        let file_regex = Regex::new(pattern)
            .wrap_err_with(|| format!("Probe {} pattern {pattern}", probe.name))?;
        let mut matched = Vec::new();
        let mut items = read_dir(dir)
            .await
            .wrap_err_with(|| format!("Read dir {}", dir.display()))?;
        while let Some(entry) = items.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if entry
                .file_name()
                .to_str()
                .is_some_and(|name| file_regex.is_match(name))
            {
                matched.push(entry.path());
            }
        }
        matched.sort();
        files.extend(matched);
    }
    if files.is_empty() {
        return Err(eyre!("Probe {} matched no files", probe.name));
    }
    Ok(files)
}

async fn run_probe(probe: &ProbeConfig) -> Result<Vec<ProbeReport>> {
    let files = probe_files(probe).await?;
    debug!("Probe {} reads {} files", probe.name, files.len());

    let mut reports = Vec::new();
    for file in files {
        let data = read_to_string(&file)
            .await
            .wrap_err_with(|| format!("Read {}", file.display()))?;
        let samples = collect_probe(probe.kind, data.lines())
            .wrap_err_with(|| format!("Probe {} ({})", probe.name, file.display()))?;
        let summary = summarize(&samples).context("No samples")?;
        reports.push(ProbeReport {
            name: probe.name.clone(),
            kind: probe.kind,
            file,
            summary,
        });
    }
    Ok(reports)
}
