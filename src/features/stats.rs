//! Small descriptive statistics over window contents.

use std::collections::BTreeMap;

/// Occurrence counts, ordered by key.
pub fn counts<'a, I>(items: I) -> BTreeMap<&'a str, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = BTreeMap::new();
    for item in items {
        *out.entry(item).or_insert(0) += 1;
    }
    out
}

/// Base-2 Shannon entropy of a count distribution: 0 for one category,
/// `log2 k` for `k` equally frequent ones.
pub fn entropy<'a, I>(counts: I) -> f64
where
    I: IntoIterator<Item = &'a usize>,
{
    let counts: Vec<usize> = counts.into_iter().copied().filter(|&c| c > 0).collect();
    let total: usize = counts.iter().sum();
    if counts.len() < 2 {
        return 0.0;
    }
    let total = total as f64;
    counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample standard deviation (n − 1); 0 for fewer than two values.
pub fn sample_std(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    var.sqrt()
}

/// The `k` most frequent keys with their relative frequency. Ties go to the
/// lexicographically smaller key.
pub fn top_k(counts: &BTreeMap<&str, usize>, k: usize) -> Vec<(String, f64)> {
    let total: usize = counts.values().sum();
    if total == 0 {
        return Vec::new();
    }
    let mut ranked: Vec<(&str, usize)> = counts.iter().map(|(key, n)| (*key, *n)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(k)
        .map(|(key, n)| (key.to_string(), n as f64 / total as f64))
        .collect()
}
