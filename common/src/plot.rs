use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    config::ExportFormat,
    series::{Point, write_points_csv},
};

/// One curve handed to the external plotting scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlotData {
    pub name: String,
    pub label: String,
    pub instances: usize,
    pub x_label: String,
    pub y_label: String,
    pub x: Vec<u64>,
    pub y: Vec<f64>,
}

impl PlotData {
    pub fn new(name: &str, label: &str, instances: usize, points: &[Point]) -> Self {
        Self {
            name: name.to_owned(),
            label: label.to_owned(),
            instances,
            x_label: "k".to_owned(),
            y_label: "TT(k) sec".to_owned(),
            x: points.iter().map(|p| p.k).collect(),
            y: points.iter().map(|p| p.value).collect(),
        }
    }

    pub fn with_y_label(mut self, y_label: &str) -> Self {
        self.y_label = y_label.to_owned();
        self
    }

    fn points(&self) -> Vec<Point> {
        self.x
            .iter()
            .zip(&self.y)
            .map(|(&k, &value)| Point { k, value })
            .collect()
    }
}

/// Writes every job in each requested format and returns the created files.
///
/// JSON lands in `<plot_dir>/plot_data/<name>.json`, CSV in
/// `<plot_dir>/<name>.csv`.
pub fn export_plot_data(
    plot_dir: &Path,
    jobs: &[PlotData],
    formats: &[ExportFormat],
) -> Result<Vec<PathBuf>> {
    if jobs.is_empty() {
        return Ok(Vec::new());
    }

    let plot_data_dir = plot_dir.join("plot_data");
    if formats.contains(&ExportFormat::Json) && !plot_data_dir.exists() {
        fs::create_dir_all(&plot_data_dir)?;
    }
    if !plot_dir.exists() {
        fs::create_dir_all(plot_dir)?;
    }

    let mut written = Vec::new();
    for job in jobs {
        for format in formats {
            let path = match format {
                ExportFormat::Json => {
                    let path = plot_data_dir.join(format!("{}.json", job.name));
                    fs::write(&path, serde_json::to_string(job)?)
                        .wrap_err_with(|| format!("Write {}", path.display()))?;
                    path
                }
                ExportFormat::Csv => {
                    let path = plot_dir.join(format!("{}.csv", job.name));
                    let file = File::create(&path)
                        .wrap_err_with(|| format!("Create {}", path.display()))?;
                    write_points_csv(&job.points(), &job.y_label, file)?;
                    path
                }
            };
            debug!("Wrote {}", path.display());
            written.push(path);
        }
    }
    Ok(written)
}
