//! Scalar samples read from the non-`k=` lines of engine logs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    error::{AggregateError, ParseError},
    line::{float_token, parse_k_line},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProbeKind {
    /// PostgreSQL `EXPLAIN ANALYZE` total, in seconds.
    ExecutionTime,
    /// Commercial engine statistics line, in seconds.
    CpuTime,
    ResultCount,
    GraphSize,
    Duplicates,
}

impl ProbeKind {
    pub const ALL: [ProbeKind; 5] = [
        ProbeKind::ExecutionTime,
        ProbeKind::CpuTime,
        ProbeKind::ResultCount,
        ProbeKind::GraphSize,
        ProbeKind::Duplicates,
    ];

    /// Matched against the raw line, leading whitespace included.
    pub fn prefix(&self) -> &'static str {
        match self {
            ProbeKind::ExecutionTime => " Execution time",
            ProbeKind::CpuTime => "   CPU time =",
            ProbeKind::ResultCount => "Number_of_Results",
            ProbeKind::GraphSize => "Graph_size =",
            ProbeKind::Duplicates => "Duplicates filtered",
        }
    }

    pub fn token(&self) -> usize {
        match self {
            ProbeKind::ExecutionTime => 2,
            ProbeKind::CpuTime => 8,
            ProbeKind::ResultCount => 2,
            ProbeKind::GraphSize => 2,
            ProbeKind::Duplicates => 3,
        }
    }

    /// Both engines report milliseconds.
    pub fn scale(&self) -> f64 {
        match self {
            ProbeKind::ExecutionTime | ProbeKind::CpuTime => 1000.0,
            _ => 1.0,
        }
    }

    /// Result counts are printed once per instance, only the first line of a
    /// file is read.
    pub fn first_only(&self) -> bool {
        matches!(self, ProbeKind::ResultCount)
    }

    pub fn unit(&self) -> Option<&'static str> {
        match self {
            ProbeKind::ExecutionTime | ProbeKind::CpuTime => Some("sec"),
            _ => None,
        }
    }

    pub fn parse(&self, line: &str) -> Option<Result<f64, ParseError>> {
        if !line.starts_with(self.prefix()) {
            return None;
        }
        let tokens = line.split_whitespace().collect::<Vec<_>>();
        Some(float_token(&tokens, self.token()).map(|v| v / self.scale()))
    }
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProbeKind::ExecutionTime => "execution-time",
            ProbeKind::CpuTime => "cpu-time",
            ProbeKind::ResultCount => "result-count",
            ProbeKind::GraphSize => "graph-size",
            ProbeKind::Duplicates => "duplicates",
        };
        f.write_str(name)
    }
}

pub fn collect_probe<I, S>(kind: ProbeKind, lines: I) -> Result<Vec<f64>, AggregateError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut samples = Vec::new();
    for (idx, line) in lines.into_iter().enumerate() {
        match kind.parse(line.as_ref()) {
            None => continue,
            Some(Ok(v)) => samples.push(v),
            Some(Err(err)) => return Err(AggregateError::malformed(idx + 1, err)),
        }
        if kind.first_only() {
            break;
        }
    }
    if samples.is_empty() {
        return Err(AggregateError::EmptyInput);
    }
    Ok(samples)
}

/// Every runtime logged for exactly `k`, one per repetition that reached it.
pub fn collect_at_k<I, S>(k: u64, lines: I) -> Result<Vec<f64>, AggregateError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut samples = Vec::new();
    for (idx, line) in lines.into_iter().enumerate() {
        match parse_k_line(line.as_ref()) {
            None => {}
            Some(Ok(parsed)) if parsed.k == k => samples.push(parsed.runtime),
            Some(Ok(_)) => {}
            Some(Err(err)) => return Err(AggregateError::malformed(idx + 1, err)),
        }
    }
    if samples.is_empty() {
        return Err(AggregateError::EmptyInput);
    }
    Ok(samples)
}
