use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    error::AggregateError,
    line::{ParsedLine, parse_k_line},
    series::{AggregatedSeries, Point},
    util::median,
};

/// How `k=` lines are assigned to groups.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingMode {
    /// The n-th accepted line of a repetition lands in the n-th group. A line
    /// with `k == 1` starts a new repetition. Matches the layout of logs where
    /// every repetition reports the same k sequence.
    #[default]
    Position,
    /// Groups are keyed by the literal k value.
    ByK,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateOptions {
    /// Lines with `k >= cutoff` are skipped.
    pub cutoff: Option<u64>,
    #[serde(default)]
    pub mode: GroupingMode,
}

/// Every runtime observed for one group, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesPoint {
    pub k: u64,
    pub samples: Vec<f64>,
}

#[derive(Debug)]
struct Accumulator {
    options: AggregateOptions,
    current_index: Option<usize>,
    max_k: u64,
    groups: Vec<SeriesPoint>,
    by_k: HashMap<u64, usize>,
}

impl Accumulator {
    fn new(options: AggregateOptions) -> Self {
        Self {
            options,
            current_index: None,
            max_k: 0,
            groups: Vec::new(),
            by_k: HashMap::new(),
        }
    }

    fn accept(mut self, line_no: usize, parsed: ParsedLine) -> Result<Self, AggregateError> {
        if self.options.cutoff.is_some_and(|cutoff| parsed.k >= cutoff) {
            return Ok(self);
        }
        let index = match self.options.mode {
            GroupingMode::Position => self.position_index(line_no, parsed.k)?,
            GroupingMode::ByK => self.key_index(parsed.k),
        };
        self.groups[index].samples.push(parsed.runtime);
        Ok(self)
    }

    fn position_index(&mut self, line_no: usize, k: u64) -> Result<usize, AggregateError> {
        let index = match (k, self.current_index) {
            (1, _) | (_, None) => 0,
            (_, Some(prev)) => prev + 1,
        };
        self.current_index = Some(index);

        if k > self.max_k {
            self.max_k = k;
            self.groups.push(SeriesPoint {
                k,
                samples: Vec::new(),
            });
        }

        if index >= self.groups.len() {
            return Err(AggregateError::malformed(
                line_no,
                format!(
                    "k={k} is entry {} of its repetition but only {} k values were seen",
                    index + 1,
                    self.groups.len()
                ),
            ));
        }
        Ok(index)
    }

    fn key_index(&mut self, k: u64) -> usize {
        let groups = &mut self.groups;
        *self.by_k.entry(k).or_insert_with(|| {
            groups.push(SeriesPoint {
                k,
                samples: Vec::new(),
            });
            groups.len() - 1
        })
    }

    fn finish(mut self) -> Result<AggregatedSeries, AggregateError> {
        let instances = self.groups.first().map_or(0, |g| g.samples.len());
        if instances == 0 {
            return Err(AggregateError::EmptyInput);
        }

        let total = self.groups.len();
        while self
            .groups
            .last()
            .is_some_and(|g| g.samples.len() < instances)
        {
            self.groups.pop();
        }
        if self.groups.len() < total {
            warn!(
                "Dropped {} trailing k values reported by fewer than {instances} instances",
                total - self.groups.len()
            );
        }

        let points = self
            .groups
            .into_iter()
            .filter_map(|group| {
                median(&group.samples).map(|value| Point {
                    k: group.k,
                    value,
                })
            })
            .collect::<Vec<_>>();
        debug!("Aggregated {} points over {instances} instances", points.len());

        Ok(AggregatedSeries { instances, points })
    }
}

/// Reduces a run log with repeated `k= <k> <unit> <runtime>` lines to the
/// median runtime per k.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunLogAggregator {
    options: AggregateOptions,
}

impl RunLogAggregator {
    pub fn new(options: AggregateOptions) -> Self {
        Self { options }
    }

    pub fn with_cutoff(mut self, cutoff: Option<u64>) -> Self {
        self.options.cutoff = cutoff;
        self
    }

    pub fn with_mode(mut self, mode: GroupingMode) -> Self {
        self.options.mode = mode;
        self
    }

    pub fn aggregate<I, S>(&self, lines: I) -> Result<AggregatedSeries, AggregateError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        lines
            .into_iter()
            .enumerate()
            .try_fold(Accumulator::new(self.options), |acc, (idx, line)| {
                match parse_k_line(line.as_ref()) {
                    None => Ok(acc),
                    Some(Ok(parsed)) => acc.accept(idx + 1, parsed),
                    Some(Err(err)) => Err(AggregateError::malformed(idx + 1, err)),
                }
            })?
            .finish()
    }

    pub fn aggregate_str(&self, input: &str) -> Result<AggregatedSeries, AggregateError> {
        self.aggregate(input.lines())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn pairs(series: &AggregatedSeries) -> Vec<(u64, f64)> {
        series.points.iter().map(|p| (p.k, p.value)).collect()
    }

    fn log(runs: &[&[(u64, f64)]]) -> String {
        let mut out = String::new();
        for run in runs {
            out.push_str("Starting run\n");
            for (k, t) in *run {
                out.push_str(&format!("k= {k} time= {t} sec\n"));
            }
            out.push_str("Number_of_Results = 12\n");
        }
        out
    }

    #[test]
    fn medians_two_repetitions() {
        let series = RunLogAggregator::default()
            .aggregate(["k= 1 x 1.0", "k= 2 x 2.0", "k= 1 x 3.0", "k= 2 x 4.0"])
            .unwrap();
        assert_eq!(series.instances, 2);
        assert_eq!(pairs(&series), vec![(1, 2.0), (2, 3.0)]);
    }

    #[test]
    fn odd_sample_count_takes_middle() {
        let input = log(&[&[(1, 2.0)], &[(1, 6.0)], &[(1, 4.0)]]);
        let series = RunLogAggregator::default().aggregate_str(&input).unwrap();
        assert_eq!(pairs(&series), vec![(1, 4.0)]);
    }

    #[test]
    fn truncates_incomplete_trailing_groups() {
        let input = log(&[
            &[(1, 1.0), (10, 2.0), (20, 3.0)],
            &[(1, 1.0), (10, 2.0)],
            &[(1, 1.0), (10, 2.0), (20, 3.0)],
        ]);
        let series = RunLogAggregator::default().aggregate_str(&input).unwrap();
        assert_eq!(series.instances, 3);
        assert_eq!(series.ks(), vec![1, 10]);
    }

    #[test]
    fn cutoff_excludes_large_k() {
        let input = log(&[
            &[(1, 1.0), (50, 2.0), (100, 3.0), (150, 4.0)],
            &[(1, 1.0), (50, 2.0), (100, 3.0), (150, 4.0)],
        ]);
        let series = RunLogAggregator::default()
            .with_cutoff(Some(100))
            .aggregate_str(&input)
            .unwrap();
        assert_eq!(series.ks(), vec![1, 50]);
    }

    #[test]
    fn cutoff_lines_do_not_advance_group_index() {
        let series = RunLogAggregator::default()
            .with_cutoff(Some(100))
            .aggregate([
                "k= 1 x 1.0",
                "k= 500 x 9.0",
                "k= 2 x 2.0",
                "k= 1 x 3.0",
                "k= 500 x 9.0",
                "k= 2 x 4.0",
            ])
            .unwrap();
        assert_eq!(series.instances, 2);
        assert_eq!(pairs(&series), vec![(1, 2.0), (2, 3.0)]);
    }

    #[test]
    fn position_mode_groups_by_place_in_repetition() {
        let input = [
            "k= 1 x 1.0",
            "k= 2 x 2.0",
            "k= 3 x 3.0",
            "k= 1 x 5.0",
            "k= 3 x 6.0",
            "k= 2 x 4.0",
        ];
        let by_position = RunLogAggregator::default().aggregate(input).unwrap();
        assert_eq!(pairs(&by_position), vec![(1, 3.0), (2, 4.0), (3, 3.5)]);

        let by_k = RunLogAggregator::default()
            .with_mode(GroupingMode::ByK)
            .aggregate(input)
            .unwrap();
        assert_eq!(pairs(&by_k), vec![(1, 3.0), (2, 3.0), (3, 4.5)]);
    }

    #[test]
    fn first_line_without_k_one_starts_at_group_zero() {
        let series = RunLogAggregator::default()
            .aggregate(["k= 5 x 1.0", "k= 6 x 2.0"])
            .unwrap();
        assert_eq!(pairs(&series), vec![(5, 1.0), (6, 2.0)]);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let err = RunLogAggregator::default()
            .aggregate(["header", "k= 1 x 1.0", "k= abc x y"])
            .unwrap_err();
        assert!(matches!(err, AggregateError::MalformedInput { line: 3, .. }));
    }

    #[test]
    fn nan_runtime_is_malformed() {
        let err = RunLogAggregator::default()
            .aggregate(["k= 1 x nan", "k= 1 x 1.0", "k= 1 x 2.0"])
            .unwrap_err();
        assert!(matches!(err, AggregateError::MalformedInput { line: 1, .. }));
    }

    #[test]
    fn position_overflow_is_malformed() {
        let err = RunLogAggregator::default()
            .aggregate(["k= 1 x 1.0", "k= 2 x 1.0", "k= 2 x 1.0"])
            .unwrap_err();
        assert!(matches!(err, AggregateError::MalformedInput { line: 3, .. }));
    }

    #[test]
    fn no_k_lines_is_empty_input() {
        let err = RunLogAggregator::default()
            .aggregate(["Number_of_Results = 3", ""])
            .unwrap_err();
        assert_eq!(err, AggregateError::EmptyInput);

        let err = RunLogAggregator::default()
            .with_cutoff(Some(1))
            .aggregate(["k= 1 x 1.0"])
            .unwrap_err();
        assert_eq!(err, AggregateError::EmptyInput);
    }

    #[test]
    fn by_k_aligns_reordered_repetitions() {
        let input = ["k= 1 x 1.0", "k= 2 x 2.0", "k= 2 x 4.0", "k= 1 x 3.0"];
        let by_k = RunLogAggregator::default()
            .with_mode(GroupingMode::ByK)
            .aggregate(input)
            .unwrap();
        assert_eq!(pairs(&by_k), vec![(1, 2.0), (2, 3.0)]);
    }

    #[test]
    fn by_k_tolerates_skipped_values() {
        let input = ["k= 1 x 1.0", "k= 2 x 9.0", "k= 3 x 5.0", "k= 1 x 3.0", "k= 3 x 7.0"];
        let series = RunLogAggregator::default()
            .with_mode(GroupingMode::ByK)
            .aggregate(input)
            .unwrap();
        // k=2 has a single sample and sits in the middle, so it is kept
        assert_eq!(pairs(&series), vec![(1, 2.0), (2, 9.0), (3, 6.0)]);
    }

    fn repetitions() -> impl Strategy<Value = (Vec<u64>, Vec<Vec<f64>>)> {
        (1usize..8, 1usize..6).prop_flat_map(|(len, runs)| {
            let ks = (1..=len as u64).map(|i| i * 10 - 9).collect::<Vec<_>>();
            let runs = prop::collection::vec(
                (1..=len).prop_flat_map(|n| prop::collection::vec(0.0f64..100.0, n)),
                runs,
            );
            (Just(ks), runs)
        })
    }

    fn render(ks: &[u64], runs: &[Vec<f64>]) -> String {
        let mut out = String::new();
        for run in runs {
            for (k, t) in ks.iter().zip(run) {
                out.push_str(&format!("k= {k} x {t}\n"));
            }
        }
        out
    }

    proptest! {
        #[test]
        fn output_length_is_shortest_repetition((ks, runs) in repetitions()) {
            let input = render(&ks, &runs);
            let series = RunLogAggregator::default().aggregate_str(&input).unwrap();
            let shortest = runs.iter().map(Vec::len).min().unwrap();
            prop_assert_eq!(series.points.len(), shortest);
            prop_assert_eq!(series.ks(), ks[..shortest].to_vec());
        }

        #[test]
        fn aggregation_is_idempotent((ks, runs) in repetitions()) {
            let input = render(&ks, &runs);
            let aggregator = RunLogAggregator::default();
            prop_assert_eq!(
                aggregator.aggregate_str(&input).unwrap(),
                aggregator.aggregate_str(&input).unwrap()
            );
        }

        #[test]
        fn cutoff_bounds_every_k((ks, runs) in repetitions(), cutoff in 2u64..80) {
            let input = render(&ks, &runs);
            let series = RunLogAggregator::default()
                .with_cutoff(Some(cutoff))
                .aggregate_str(&input)
                .unwrap();
            prop_assert!(series.ks().iter().all(|k| *k < cutoff));
        }
    }
}
