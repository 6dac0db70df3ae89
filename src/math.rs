use ndarray::Array1;
use num_traits::{Float, FromPrimitive};

/// Arithmetic mean of the values that are present.
///
/// Missing values, and `NaN`, are excluded from both the sum and the count. Returns `None` when
/// nothing is present.
///
/// # Examples
///
/// ```
/// use airhealth::math::mean_present;
///
/// let mean = mean_present([Some(1.0), None, Some(3.0)]);
/// assert_eq!(mean, Some(2.0));
///
/// let nothing: Option<f64> = mean_present([None, None]);
/// assert_eq!(nothing, None);
/// ```
pub fn mean_present<F: Float + FromPrimitive>(
    values: impl IntoIterator<Item = Option<F>>,
) -> Option<F> {
    let present: Array1<F> = values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    present.mean()
}

/// Population standard deviation (`ddof = 0`)
pub fn population_std<F: Float + FromPrimitive>(values: &[F]) -> Option<F> {
    if values.is_empty() {
        return None;
    }
    let values = Array1::from_iter(values.iter().copied());
    Some(values.std(F::zero()))
}

/// Sample standard deviation (`ddof = 1`), `NaN` for a single observation
pub fn sample_std<F: Float + FromPrimitive>(values: &[F]) -> Option<F> {
    match values.len() {
        0 => None,
        1 => Some(F::nan()),
        _ => {
            let values = Array1::from_iter(values.iter().copied());
            Some(values.std(F::one()))
        }
    }
}

/// Number of distinct values, comparing by exact equality
pub fn distinct_count<F: Float>(values: &[F]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    sorted.dedup();
    sorted.len()
}

/// Keep the observations where both series are present
pub fn pairwise_complete<F: Float>(x: &[Option<F>], y: &[Option<F>]) -> (Vec<F>, Vec<F>) {
    x.iter()
        .zip(y)
        .filter_map(|(x, y)| match (x, y) {
            (Some(x), Some(y)) if !x.is_nan() && !y.is_nan() => Some((*x, *y)),
            _ => None,
        })
        .unzip()
}

/// Pearson's correlation coefficient.
///
/// The coefficient is undefined, and returned as `NaN`, with fewer than two observations, when
/// the series differ in length, or when either series has no variance. Constant series are detected by value rather than by a
/// computed sum of squares, which rounding can leave slightly above zero.
pub fn pearson<F: Float + FromPrimitive>(x: &[F], y: &[F]) -> F {
    if x.len() != y.len() || x.len() < 2 || distinct_count(x) < 2 || distinct_count(y) < 2 {
        return F::nan();
    }
    let x = Array1::from_iter(x.iter().copied());
    let y = Array1::from_iter(y.iter().copied());
    let (Some(mean_x), Some(mean_y)) = (x.mean(), y.mean()) else {
        return F::nan();
    };

    let dx = x.mapv(|v| v - mean_x);
    let dy = y.mapv(|v| v - mean_y);
    let sxx = (&dx * &dx).sum();
    let syy = (&dy * &dy).sum();
    if sxx == F::zero() || syy == F::zero() {
        return F::nan();
    }

    let r = (&dx * &dy).sum() / (sxx * syy).sqrt();
    r.max(-F::one()).min(F::one())
}

/// Quantile with linear interpolation between closest ranks, `sorted` must be ascending
pub fn quantile_sorted<F: Float + FromPrimitive>(sorted: &[F], q: f64) -> Option<F> {
    if sorted.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let lower = position.floor() as usize;
    let upper = (lower + 1).min(sorted.len() - 1);
    let fraction = F::from_f64(position - position.floor())?;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Descriptive statistics of one column
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Summary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

/// Count, mean, sample standard deviation, extrema and quartiles of the present values
pub fn describe(values: impl IntoIterator<Item = Option<f64>>) -> Option<Summary> {
    let mut present: Vec<f64> = values
        .into_iter()
        .flatten()
        .filter(|v| !v.is_nan())
        .collect();
    if present.is_empty() {
        return None;
    }
    present.sort_by(f64::total_cmp);

    Some(Summary {
        count: present.len(),
        mean: mean_present(present.iter().copied().map(Some))?,
        std_dev: sample_std(&present)?,
        min: present[0],
        q1: quantile_sorted(&present, 0.25)?,
        median: quantile_sorted(&present, 0.5)?,
        q3: quantile_sorted(&present, 0.75)?,
        max: present[present.len() - 1],
    })
}
