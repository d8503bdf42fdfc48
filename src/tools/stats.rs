/// Returns the arithmetic mean of the data, or 0.0 for an empty slice
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    data.iter().sum::<f64>() / data.len() as f64
}

/// Returns the minimum and maximum of the data, skipping NaN values
pub fn min_max(data: &[f64]) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;

    data.iter().for_each(|v| {
        if v.is_nan() {
            return;
        }

        if *v > max {
            max = *v;
        }

        if *v < min {
            min = *v;
        }
    });

    (min, max)
}

/// Sample standard deviation (n - 1 denominator). A slice with fewer than two
/// values has no spread to estimate and yields 0.0 rather than NaN.
pub fn sample_std(data: &[f64]) -> f64 {
    if data.len() < 2 {
        return 0.0;
    }

    let m = mean(data);
    let sum_sq = data.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    (sum_sq / (data.len() - 1) as f64).sqrt()
}

/// Population standard deviation (n denominator), 0.0 for an empty slice
pub fn population_std(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let m = mean(data);
    let sum_sq = data.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    (sum_sq / data.len() as f64).sqrt()
}

/// Fits an ordinary least-squares line to the paired points and returns
/// (slope, intercept). Degenerate inputs (fewer than two points, zero x
/// variance) yield a flat line through the mean.
pub fn least_squares_line(xs: &[f64], ys: &[f64]) -> (f64, f64) {
    if xs.len() != ys.len() || xs.len() < 2 {
        return (0.0, mean(ys));
    }

    let x_mean = mean(xs);
    let y_mean = mean(ys);

    let mut covariance = 0.0;
    let mut x_variance = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        covariance += (x - x_mean) * (y - y_mean);
        x_variance += (x - x_mean).powi(2);
    }

    if x_variance == 0.0 {
        return (0.0, y_mean);
    }

    let slope = covariance / x_variance;
    (slope, y_mean - slope * x_mean)
}

/// Pearson correlation coefficient between the paired points. Either axis
/// having zero variance makes the coefficient undefined, reported here as 0.0.
pub fn pearson_r(xs: &[f64], ys: &[f64]) -> f64 {
    if xs.len() != ys.len() || xs.len() < 2 {
        return 0.0;
    }

    let x_mean = mean(xs);
    let y_mean = mean(ys);

    let mut covariance = 0.0;
    let mut x_variance = 0.0;
    let mut y_variance = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        covariance += (x - x_mean) * (y - y_mean);
        x_variance += (x - x_mean).powi(2);
        y_variance += (y - y_mean).powi(2);
    }

    if x_variance == 0.0 || y_variance == 0.0 {
        return 0.0;
    }

    covariance / (x_variance.sqrt() * y_variance.sqrt())
}
