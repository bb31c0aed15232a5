use std::io::Write;

use eyre::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub k: u64,
    pub value: f64,
}

/// Median runtime per k, in first-appearance order of k.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedSeries {
    /// Number of repetitions behind every point.
    pub instances: usize,
    pub points: Vec<Point>,
}

impl AggregatedSeries {
    pub fn ks(&self) -> Vec<u64> {
        self.points.iter().map(|p| p.k).collect()
    }

    pub fn value_at(&self, k: u64) -> Option<f64> {
        self.points.iter().find(|p| p.k == k).map(|p| p.value)
    }

    pub fn last(&self) -> Option<Point> {
        self.points.last().copied()
    }

    /// Time between consecutive results, normalised by the step between the
    /// first two k values. Emitted at every k but the first.
    ///
    /// `None` when there are fewer than two points or the step is zero.
    pub fn delays(&self) -> Option<Vec<Point>> {
        let [first, second, ..] = self.points.as_slice() else {
            return None;
        };
        let window = second.k as f64 - first.k as f64;
        if window == 0.0 {
            return None;
        }
        Some(
            self.points
                .iter()
                .tuple_windows()
                .map(|(prev, cur)| Point {
                    k: cur.k,
                    value: (cur.value - prev.value) / window,
                })
                .collect(),
        )
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        write_points_csv(&self.points, "median", writer)
    }
}

pub fn write_points_csv<W: Write>(points: &[Point], value_header: &str, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["k", value_header])?;
    for point in points {
        wtr.write_record([point.k.to_string(), point.value.to_string()])?;
    }
    wtr.flush()?;
    Ok(())
}
