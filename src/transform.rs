// Aggregation kernels used by the chart builder

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::{BTreeMap, HashMap};

use crate::chart::Bin;
use crate::selection::{Aggregation, TimeUnit};

/// Order category values: numerically when every value parses as a number,
/// lexicographically otherwise.
pub fn sort_categories(categories: &mut [String]) {
    let all_numeric = categories.iter().all(|s| s.parse::<f64>().is_ok());
    if all_numeric {
        categories.sort_by(|a, b| {
            let fa = a.parse::<f64>().unwrap_or(f64::NAN);
            let fb = b.parse::<f64>().unwrap_or(f64::NAN);
            fa.partial_cmp(&fb).unwrap_or(std::cmp::Ordering::Equal)
        });
    } else {
        categories.sort();
    }
}

/// Collect the non-null values of `values` per category key, skipping rows
/// where either side is null.
pub fn group_values(keys: &[Option<String>], values: &[Option<f64>]) -> HashMap<String, Vec<f64>> {
    let mut groups: HashMap<String, Vec<f64>> = HashMap::new();
    for (key, value) in keys.iter().zip(values.iter()) {
        if let (Some(k), Some(v)) = (key, value) {
            groups.entry(k.clone()).or_default().push(*v);
        }
    }
    groups
}

/// Sorted category keys of a grouping
pub fn sorted_keys<V>(groups: &HashMap<String, V>) -> Vec<String> {
    let mut keys: Vec<String> = groups.keys().cloned().collect();
    sort_categories(&mut keys);
    keys
}

pub fn reduce(values: &[f64], aggregation: Aggregation) -> f64 {
    let sum: f64 = values.iter().sum();
    match aggregation {
        Aggregation::Sum => sum,
        Aggregation::Mean => {
            if values.is_empty() {
                f64::NAN
            } else {
                sum / values.len() as f64
            }
        }
    }
}

/// Group by category and reduce each group; one output row per category
/// that has at least one non-null value.
pub fn group_reduce(
    keys: &[Option<String>],
    values: &[Option<f64>],
    aggregation: Aggregation,
) -> (Vec<String>, Vec<f64>) {
    let groups = group_values(keys, values);
    let order = sorted_keys(&groups);
    let reduced = order.iter().map(|k| reduce(&groups[k], aggregation)).collect();
    (order, reduced)
}

/// Linear-interpolated percentile of already sorted data
pub fn percentile(sorted_data: &[f64], p: f64) -> f64 {
    let n = sorted_data.len();
    if n == 0 {
        return f64::NAN;
    }
    if n == 1 {
        return sorted_data[0];
    }

    let rank = p * (n - 1) as f64;
    let lower_idx = rank.floor() as usize;
    let upper_idx = rank.ceil() as usize;

    if lower_idx == upper_idx {
        sorted_data[lower_idx]
    } else {
        let weight = rank - lower_idx as f64;
        sorted_data[lower_idx] * (1.0 - weight) + sorted_data[upper_idx] * weight
    }
}

/// Box statistics for one category
#[derive(Debug, Clone, PartialEq)]
pub struct FiveNumber {
    pub lower_whisker: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

/// Quartiles, 1.5 IQR whiskers and outliers. Returns `None` for empty input.
pub fn five_number_summary(values: &[f64]) -> Option<FiveNumber> {
    if values.is_empty() {
        return None;
    }
    let mut ys = values.to_vec();
    ys.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let q1 = percentile(&ys, 0.25);
    let median = percentile(&ys, 0.50);
    let q3 = percentile(&ys, 0.75);
    let iqr = q3 - q1;

    let lower_fence = q1 - 1.5 * iqr;
    let upper_fence = q3 + 1.5 * iqr;

    // Whiskers reach the most extreme values inside the fences
    let lower_whisker = ys.iter().copied().find(|&v| v >= lower_fence).unwrap_or(q1);
    let upper_whisker = ys.iter().rev().copied().find(|&v| v <= upper_fence).unwrap_or(q3);

    let outliers: Vec<f64> = ys
        .iter()
        .copied()
        .filter(|&v| v < lower_fence || v > upper_fence)
        .collect();

    Some(FiveNumber {
        lower_whisker,
        q1,
        median,
        q3,
        upper_whisker,
        outliers,
    })
}

/// Exactly `bin_count` equal-width bins spanning [min, max]. The last bin is
/// closed so the maximum lands in it. A constant column gets a unit-width span
/// centred on its value.
pub fn histogram_bins(values: &[f64], bin_count: usize) -> Vec<Bin> {
    let bin_count = bin_count.max(1);
    let values: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (min, max) = if values.is_empty() {
        (0.0, 1.0)
    } else {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if min == max {
            (min - 0.5, max + 0.5)
        } else {
            (min, max)
        }
    };

    let width = (max - min) / bin_count as f64;
    let mut counts = vec![0usize; bin_count];
    for &v in &values {
        let idx = ((v - min) / width).floor() as isize;
        let idx = idx.clamp(0, bin_count as isize - 1) as usize;
        counts[idx] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| Bin {
            start: min + i as f64 * width,
            end: if i + 1 == bin_count { max } else { min + (i + 1) as f64 * width },
            count,
        })
        .collect()
}

/// Pearson correlation over rows where both values are present.
/// NaN when fewer than two such rows exist or either side has zero variance.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();

    let n = pairs.len() as f64;
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Square, symmetric correlation matrix with a unit diagonal
pub fn correlation_matrix(columns: &[&[Option<f64>]]) -> Vec<Vec<f64>> {
    let n = columns.len();
    let mut matrix = vec![vec![0.0; n]; n];
    for i in 0..n {
        matrix[i][i] = 1.0;
        for j in (i + 1)..n {
            let r = pearson(columns[i], columns[j]);
            matrix[i][j] = r;
            matrix[j][i] = r;
        }
    }
    matrix
}

/// First day of the bucket containing `date`
pub fn bucket_start(date: NaiveDate, unit: TimeUnit) -> NaiveDate {
    match unit {
        TimeUnit::Day => date,
        TimeUnit::Week => {
            // Weeks start on Monday
            let days_from_monday = date.weekday().num_days_from_monday();
            date - Duration::days(days_from_monday as i64)
        }
        TimeUnit::Month => date.with_day(1).unwrap_or(date),
    }
}

/// Sum `values` per calendar bucket; buckets ascending. Rows with a null on
/// either side are skipped.
pub fn bucket_sums(
    dates: &[Option<NaiveDate>],
    values: &[Option<f64>],
    unit: TimeUnit,
) -> (Vec<NaiveDate>, Vec<f64>) {
    let mut buckets: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for (date, value) in dates.iter().zip(values.iter()) {
        if let (Some(d), Some(v)) = (date, value) {
            *buckets.entry(bucket_start(*d, unit)).or_insert(0.0) += v;
        }
    }
    buckets.into_iter().unzip()
}
