use anyhow::{anyhow, ensure};

/// Ordered thresholds splitting values into `len() + 1` classes. Class `i` covers
/// `[breakpoints[i - 1], breakpoints[i])`, the first and last classes are open-ended.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassBreakpoints {
    breakpoints: Vec<f64>,
}

impl ClassBreakpoints {
    pub fn new(breakpoints: Vec<f64>) -> anyhow::Result<Self> {
        ensure!(
            breakpoints.iter().all(|value| value.is_finite()),
            "Breakpoints must be finite numbers, got {:?}",
            breakpoints
        );
        ensure!(
            breakpoints.windows(2).all(|pair| pair[0] <= pair[1]),
            "Breakpoints must be non-decreasing, got {:?}",
            breakpoints
        );
        Ok(Self { breakpoints })
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.breakpoints
    }

    pub fn class_count(&self) -> usize {
        self.breakpoints.len() + 1
    }

    /// Index of the class containing `value`: the position of the first breakpoint strictly
    /// greater than it.
    pub fn class_index(&self, value: f64) -> usize {
        self.breakpoints.partition_point(|breakpoint| *breakpoint <= value)
    }
}

/// Classify `values` into `classes` groups using optimal 1-D k-means (natural breaks) and return
/// the minimum of every group but the first.
///
/// The result does not depend on the order of `values`. When there are fewer distinct values than
/// classes, the values are clustered into as many groups as there are distinct values and the
/// breakpoint list is padded by repeating its last entry.
pub fn natural_breaks(values: &[f64], classes: usize) -> anyhow::Result<ClassBreakpoints> {
    ensure!(classes > 0, "Cannot classify into zero classes");
    ensure!(!values.is_empty(), "Cannot classify an empty set of values");
    ensure!(
        values.iter().all(|value| value.is_finite()),
        "Cannot classify non-finite values"
    );

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mut distinct = sorted.clone();
    distinct.dedup();

    let clusters = classes.min(distinct.len());
    let starts = cluster_starts(&sorted, clusters);
    let mut breakpoints: Vec<f64> = starts.iter().skip(1).map(|start| sorted[*start]).collect();

    let padding = *breakpoints.last().unwrap_or(&sorted[0]);
    breakpoints.resize(classes - 1, padding);
    if clusters < classes {
        log::warn!(
            "Only {} distinct values for {} classes, breakpoints are degenerate",
            distinct.len(),
            classes
        );
    }
    ClassBreakpoints::new(breakpoints)
}

/// Sums of squared deviations over contiguous ranges of sorted values, via prefix sums.
struct RangeCost {
    sums: Vec<f64>,
    squared_sums: Vec<f64>,
}

impl RangeCost {
    fn new(sorted: &[f64]) -> Self {
        // Values are divided by the largest magnitude and shifted by the median so the squared
        // prefix sums stay within a few units per value, whatever the input scale.
        let magnitude = sorted
            .iter()
            .map(|value| value.abs())
            .fold(0.0, f64::max);
        let scale = if magnitude > 0.0 { magnitude } else { 1.0 };
        let shift = sorted[sorted.len() / 2] / scale;
        let mut sums = Vec::with_capacity(sorted.len() + 1);
        let mut squared_sums = Vec::with_capacity(sorted.len() + 1);
        sums.push(0.0);
        squared_sums.push(0.0);
        for value in sorted {
            let value = value / scale - shift;
            sums.push(sums.last().unwrap_or(&0.0) + value);
            squared_sums.push(squared_sums.last().unwrap_or(&0.0) + value * value);
        }
        Self { sums, squared_sums }
    }

    /// Cost of the values with indices `start..=end`.
    fn cost(&self, start: usize, end: usize) -> f64 {
        let count = (end - start + 1) as f64;
        let sum = self.sums[end + 1] - self.sums[start];
        let squared_sum = self.squared_sums[end + 1] - self.squared_sums[start];
        let cost = squared_sum - sum * sum / count;
        // Rounding can leave a tiny negative residue for constant ranges.
        if cost < 0.0 {
            0.0
        } else {
            cost
        }
    }
}

/// Dynamic program over sorted values returning the start index of each of `clusters` contiguous
/// groups minimizing the total within-group sum of squares. Requires `1 <= clusters <= len`.
fn cluster_starts(sorted: &[f64], clusters: usize) -> Vec<usize> {
    let n = sorted.len();
    let range_cost = RangeCost::new(sorted);

    // cost[m][j]: best cost of splitting values 0..=j into m + 1 groups.
    // start[m][j]: first index of the last group in that split.
    let mut cost = vec![vec![f64::INFINITY; n]; clusters];
    let mut start = vec![vec![0usize; n]; clusters];
    for j in 0..n {
        cost[0][j] = range_cost.cost(0, j);
    }
    for m in 1..clusters {
        for j in m..n {
            for i in m..=j {
                let candidate = cost[m - 1][i - 1] + range_cost.cost(i, j);
                if candidate < cost[m][j] {
                    cost[m][j] = candidate;
                    start[m][j] = i;
                }
            }
        }
    }

    let mut starts = vec![0usize; clusters];
    let mut end = n - 1;
    for m in (1..clusters).rev() {
        starts[m] = start[m][end];
        end = starts[m] - 1;
    }
    starts
}

/// Split values into the classes of `breakpoints`, for logging and legends.
pub fn class_counts(values: &[f64], breakpoints: &ClassBreakpoints) -> Vec<usize> {
    let mut counts = vec![0; breakpoints.class_count()];
    for value in values {
        counts[breakpoints.class_index(*value)] += 1;
    }
    counts
}

pub fn manual_breaks(breakpoints: &[f64]) -> anyhow::Result<ClassBreakpoints> {
    ClassBreakpoints::new(breakpoints.to_vec())
        .map_err(|err| anyhow!("Invalid manual classification: {}", err))
}
