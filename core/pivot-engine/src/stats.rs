//! FILENAME: core/pivot-engine/src/stats.rs
//! Numeric helpers behind cell aggregation and computed deltas.

// ============================================================================
// ACCUMULATOR
// ============================================================================

/// Accumulator for the running statistics of a value set.
/// Variance uses Welford's algorithm for numerical stability.
#[derive(Debug, Clone, Default)]
pub struct NumericAccumulator {
    pub count: u64,
    pub sum: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    mean: f64,
    m2: f64,
}

impl NumericAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;

        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));

        let delta = value - self.mean;
        self.mean += delta / (self.count as f64);
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn average(&self) -> Option<f64> {
        if self.count > 0 {
            Some(self.sum / self.count as f64)
        } else {
            None
        }
    }

    /// Sample variance (n - 1 denominator); needs at least two values.
    pub fn sample_variance(&self) -> Option<f64> {
        if self.count > 1 {
            Some(self.m2 / (self.count - 1) as f64)
        } else {
            None
        }
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.sample_variance().map(f64::sqrt)
    }
}

impl FromIterator<f64> for NumericAccumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = NumericAccumulator::new();
        for value in iter {
            acc.add(value);
        }
        acc
    }
}

// ============================================================================
// ORDER STATISTICS AND MEANS
// ============================================================================

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Geometric mean. Any negative value makes the result NaN.
pub fn geometric_mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    if values.iter().any(|v| *v < 0.0) {
        return Some(f64::NAN);
    }
    let log_sum: f64 = values.iter().map(|v| v.ln()).sum();
    Some((log_sum / values.len() as f64).exp())
}

/// `round(100 * std_dev / average)` as a whole number; undefined for a zero average.
pub fn coefficient_of_variation(std_dev: f64, average: f64) -> Option<f64> {
    if average == 0.0 || !average.is_finite() || !std_dev.is_finite() {
        return None;
    }
    Some((100.0 * std_dev / average).round() as i64 as f64)
}

/// Truncates toward zero to two decimals (0.126 -> 0.12, -0.126 -> -0.12).
pub fn truncate2(value: f64) -> f64 {
    (value * 100.0).trunc() / 100.0
}

/// Formats a number without unnecessary decimal places.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}
