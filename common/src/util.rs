use itertools::Itertools;
use serde::{Deserialize, Serialize};

pub fn median(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    let sorted = data.iter().copied().sorted_by(f64::total_cmp).collect::<Vec<_>>();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

/// Population standard deviation.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    let mean = mean(data)?;
    let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub samples: usize,
    pub median: f64,
    pub mean: f64,
    pub std_dev: f64,
}

pub fn summarize(data: &[f64]) -> Option<Summary> {
    Some(Summary {
        samples: data.len(),
        median: median(data)?,
        mean: mean(data)?,
        std_dev: std_dev(data)?,
    })
}
