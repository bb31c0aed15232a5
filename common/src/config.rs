use std::path::{Path, PathBuf};

use eyre::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{AggregateOptions, GroupingMode},
    probe::ProbeKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub name: String,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub series: Vec<SeriesConfig>,
    #[serde(default)]
    pub probes: Vec<ProbeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub cutoff: Option<u64>,
    #[serde(default)]
    pub mode: GroupingMode,
    #[serde(default = "default_formats")]
    pub formats: Vec<ExportFormat>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cutoff: None,
            mode: GroupingMode::default(),
            formats: default_formats(),
        }
    }
}

fn default_formats() -> Vec<ExportFormat> {
    vec![ExportFormat::Json, ExportFormat::Csv]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
}

/// A single algorithm's run log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesConfig {
    pub name: String,
    pub label: Option<String>,
    pub input: PathBuf,
    pub cutoff: Option<u64>,
    pub mode: Option<GroupingMode>,
    /// Also export the per-result delay curve.
    #[serde(default)]
    pub delay: bool,
}

impl SeriesConfig {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.name)
    }

    /// Name of the exported delay curve.
    pub fn delay_name(&self) -> String {
        format!("{}-delay", self.name)
    }

    /// Entry values override the report-wide settings.
    pub fn options(&self, settings: &Settings) -> AggregateOptions {
        AggregateOptions {
            cutoff: self.cutoff.or(settings.cutoff),
            mode: self.mode.unwrap_or(settings.mode),
        }
    }
}

/// Files are `inputs`, plus every file in `dir` whose name matches `pattern`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub name: String,
    pub kind: ProbeKind,
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    pub dir: Option<PathBuf>,
    pub pattern: Option<String>,
}

impl Config {
    pub fn from_yaml(data: &str) -> Result<Self> {
        let config: Config = serde_yml::from_str(data).context("Parse report config")?;
        config.validate()?;
        Ok(config)
    }

    /// Relative paths in the config are resolved against `base`, normally the
    /// directory holding the config file.
    pub fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.output_dir);
        for series in &mut self.series {
            resolve(&mut series.input);
        }
        for probe in &mut self.probes {
            probe.inputs.iter_mut().for_each(resolve);
            if let Some(dir) = probe.dir.as_mut() {
                resolve(dir);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        let mut names = self
            .series
            .iter()
            .flat_map(|s| {
                let delay = s.delay.then(|| s.delay_name());
                std::iter::once(s.name.clone()).chain(delay)
            })
            .chain(self.probes.iter().map(|p| p.name.clone()))
            .collect::<Vec<_>>();
        names.sort_unstable();
        if let Some(dup) = names.windows(2).find(|w| w[0] == w[1]) {
            bail!("Duplicate entry name {}", dup[0]);
        }
        for probe in &self.probes {
            if probe.dir.is_some() != probe.pattern.is_some() {
                bail!("Probe {}: dir and pattern must be set together", probe.name);
            }
            if probe.inputs.is_empty() && probe.dir.is_none() {
                bail!("Probe {} has no inputs", probe.name);
            }
        }
        Ok(())
    }
}
