//! Pure reductions over a slice of finite `f64` samples.
//!
//! The upstream design narrows the dynamic `int`/`Fraction`/`Decimal`/`float`
//! coercion lattice down to `f64`, per the note in the design docs: the
//! reservoirs that feed every caller of this module only ever produce
//! floating-point samples, so there is no mixed-type input to coerce in the
//! first place. Functions that require sorted input document it; none of
//! them sort their argument themselves, since callers (the histogram
//! instrument) already hold a sorted copy.

use crate::error::StatisticsError;

/// A high-precision-ish sum: pairwise summation keeps rounding error much
/// lower than a naive left-to-right fold without needing exact rationals.
pub fn sum(data: &[f64]) -> f64 {
    pairwise_sum(data)
}

fn pairwise_sum(data: &[f64]) -> f64 {
    const CHUNK: usize = 128;
    if data.len() <= CHUNK {
        let mut total = 0.0;
        for &x in data {
            total += x;
        }
        total
    } else {
        let mid = data.len() / 2;
        pairwise_sum(&data[..mid]) + pairwise_sum(&data[mid..])
    }
}

/// Arithmetic mean. Empty input is a [`StatisticsError::Empty`].
pub fn mean(data: &[f64]) -> Result<f64, StatisticsError> {
    if data.is_empty() {
        return Err(StatisticsError::Empty);
    }
    Ok(sum(data) / data.len() as f64)
}

/// Median of a value already sorted ascending.
pub fn median(sorted: &[f64]) -> Result<f64, StatisticsError> {
    if sorted.is_empty() {
        return Err(StatisticsError::Empty);
    }
    let n = sorted.len();
    if n % 2 == 1 {
        Ok(sorted[n / 2])
    } else {
        Ok((sorted[n / 2 - 1] + sorted[n / 2]) / 2.0)
    }
}

/// Low median (lower of the two central values on even-length input).
pub fn median_low(sorted: &[f64]) -> Result<f64, StatisticsError> {
    if sorted.is_empty() {
        return Err(StatisticsError::Empty);
    }
    let n = sorted.len();
    Ok(if n % 2 == 1 { sorted[n / 2] } else { sorted[n / 2 - 1] })
}

/// High median (higher of the two central values on even-length input).
pub fn median_high(sorted: &[f64]) -> Result<f64, StatisticsError> {
    if sorted.is_empty() {
        return Err(StatisticsError::Empty);
    }
    Ok(sorted[sorted.len() / 2])
}

/// The most common value. Fails if there's no unique mode, or the data is
/// empty.
pub fn mode(data: &[f64]) -> Result<f64, StatisticsError> {
    if data.is_empty() {
        return Err(StatisticsError::Empty);
    }

    let mut counts: Vec<(f64, usize)> = Vec::new();
    for &x in data {
        match counts.iter_mut().find(|(v, _)| v.to_bits() == x.to_bits()) {
            Some((_, c)) => *c += 1,
            None => counts.push((x, 1)),
        }
    }

    let max_count = counts.iter().map(|(_, c)| *c).max().unwrap();
    let mut winners = counts.iter().filter(|(_, c)| *c == max_count);
    let first = winners.next().unwrap().0;
    if winners.next().is_some() {
        return Err(StatisticsError::NoUniqueMode);
    }
    Ok(first)
}

/// Sample (`ddof = 1`) or population (`ddof = 0`) variance.
///
/// Two-pass: `ss = sum((x - c)^2) - sum(x - c)^2 / n`, with `c = mean(data)`,
/// returning `ss / (n - ddof)`.
pub fn variance(data: &[f64], ddof: usize) -> Result<f64, StatisticsError> {
    let n = data.len();
    if n <= ddof {
        return Err(StatisticsError::TooFewDataPoints);
    }
    let c = mean(data)?;
    let mut sq_sum = 0.0;
    let mut lin_sum = 0.0;
    for &x in data {
        let d = x - c;
        sq_sum += d * d;
        lin_sum += d;
    }
    let ss = sq_sum - (lin_sum * lin_sum) / n as f64;
    Ok(ss / (n - ddof) as f64)
}

/// Sample standard deviation (`ddof = 1`).
pub fn stdev(data: &[f64]) -> Result<f64, StatisticsError> {
    variance(data, 1).map(f64::sqrt)
}

/// Population standard deviation (`ddof = 0`).
pub fn pstdev(data: &[f64]) -> Result<f64, StatisticsError> {
    variance(data, 0).map(f64::sqrt)
}

/// Geometric mean. Non-positive values are replaced by a sentinel (`0 -> e`,
/// negative -> `1.0`) so the log-domain computation stays defined.
pub fn geometric_mean(data: &[f64]) -> Result<f64, StatisticsError> {
    if data.is_empty() {
        return Err(StatisticsError::Empty);
    }
    let n = data.len() as f64;
    let mut log_sum = 0.0;
    for &x in data {
        let sentinel = if x == 0.0 {
            std::f64::consts::E
        } else if x < 0.0 {
            1.0
        } else {
            x
        };
        log_sum += sentinel.abs().ln();
    }
    Ok((log_sum / n).exp())
}

/// Harmonic mean, treating `1/0` as `0` so a single zero doesn't blow up the
/// whole reduction.
pub fn harmonic_mean(data: &[f64]) -> Result<f64, StatisticsError> {
    if data.is_empty() {
        return Err(StatisticsError::Empty);
    }
    let n = data.len() as f64;
    let recip_sum: f64 = data.iter().map(|&x| if x == 0.0 { 0.0 } else { 1.0 / x }).sum();
    Ok(n / recip_sum)
}

/// Population skewness. Returns `0.0` if the standard deviation is zero
/// rather than dividing by it.
pub fn skewness(data: &[f64]) -> Result<f64, StatisticsError> {
    if data.is_empty() {
        return Err(StatisticsError::Empty);
    }
    let n = data.len() as f64;
    let mu = mean(data)?;
    let sigma = stdev(data)?;
    if sigma == 0.0 {
        return Ok(0.0);
    }
    let third_moment: f64 = data.iter().map(|&x| (x - mu).powi(3)).sum::<f64>() / n;
    Ok(third_moment / sigma.powi(3))
}

/// Excess population kurtosis (normal distribution has kurtosis `0.0`).
/// Returns `0.0` if the standard deviation is zero.
pub fn kurtosis(data: &[f64]) -> Result<f64, StatisticsError> {
    if data.is_empty() {
        return Err(StatisticsError::Empty);
    }
    let n = data.len() as f64;
    let mu = mean(data)?;
    let sigma = stdev(data)?;
    if sigma == 0.0 {
        return Ok(0.0);
    }
    let fourth_moment: f64 = data.iter().map(|&x| (x - mu).powi(4)).sum::<f64>() / n;
    Ok(fourth_moment / sigma.powi(4) - 3.0)
}

/// Nearest-rank percentile with a half-step shift over data already sorted
/// ascending: `idx = (p/100)*n - 0.5`, erroring if `idx` falls outside
/// `[0, n]`, else returning `data[floor(idx)]`.
pub fn percentile(sorted: &[f64], p: f64) -> Result<f64, StatisticsError> {
    let n = sorted.len();
    if n == 0 {
        return Err(StatisticsError::Empty);
    }
    let idx = (p / 100.0) * n as f64 - 0.5;
    if idx < 0.0 || idx > n as f64 {
        return Err(StatisticsError::OutOfRange);
    }
    let i = (idx.floor() as usize).min(n - 1);
    Ok(sorted[i])
}

/// Auto-binned histogram over data already sorted ascending. Requires at
/// least two points. Bin width is Sturges-like: `w = round(3.5*stdev /
/// n^(1/3))`, clamped to at least `1.0`. Bins are right edges
/// `min + i*w` for `i` in `[1, b]` where `b = round((max-min)/w) + 1`.
pub fn auto_histogram(sorted: &[f64]) -> Result<Vec<(f64, u64)>, StatisticsError> {
    if sorted.len() < 2 {
        return Err(StatisticsError::TooFewDataPoints);
    }
    let n = sorted.len() as f64;
    let sigma = stdev(sorted)?;
    let min = sorted[0];
    let max = sorted[sorted.len() - 1];

    let w = (3.5 * sigma / n.cbrt()).round().max(1.0);
    let b = (((max - min) / w).round() as i64 + 1).max(1) as usize;

    let mut bins: Vec<(f64, u64)> = (1..=b).map(|i| (min + i as f64 * w, 0u64)).collect();
    for &value in sorted {
        if let Some(bin) = bins.iter_mut().find(|(edge, _)| *edge >= value) {
            bin.1 += 1;
        } else if let Some(last) = bins.last_mut() {
            last.1 += 1;
        }
    }
    Ok(bins)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: [f64; 7] = [1.5, 2.5, 2.5, 2.75, 3.25, 3.26, 4.75];

    fn close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn scenario_histogram_stats() {
        close(mean(&DATA).unwrap(), 2.93);
        close(geometric_mean(&DATA).unwrap(), 2.7843790857);
        close(harmonic_mean(&DATA).unwrap(), 2.6362666258);
        close(median(&DATA).unwrap(), 2.75);
        close(variance(&DATA, 1).unwrap(), 0.99513333);
        close(stdev(&DATA).unwrap(), 0.9975636989);
        close(skewness(&DATA).unwrap(), 0.4329020512);
        close(kurtosis(&DATA).unwrap(), -0.8007344004);
    }

    #[test]
    fn scenario_percentiles() {
        let levels = [50.0, 75.0, 90.0, 95.0, 99.0, 99.9];
        let expected = [2.75, 3.25, 3.26, 4.75, 4.75, 4.75];
        for (p, exp) in levels.iter().zip(expected.iter()) {
            close(percentile(&DATA, *p).unwrap(), *exp);
        }
    }

    #[test]
    fn scenario_percentile_small_set() {
        let data = [1.5, 2.5, 2.5, 2.75, 3.25, 4.75];
        close(percentile(&data, 50.0).unwrap(), 2.5);
        assert_eq!(percentile(&data, 1.0).unwrap_err(), StatisticsError::OutOfRange);
    }

    #[test]
    fn scenario_auto_histogram() {
        let got = auto_histogram(&DATA).unwrap();
        assert_eq!(got, vec![(3.5, 6), (5.5, 1), (7.5, 0)]);

        let data2 = [1.5, 2.5, 2.5, 2.75, 3.25, 4.75, 5.0];
        let got2 = auto_histogram(&data2).unwrap();
        assert_eq!(got2, vec![(3.5, 5), (5.5, 2), (7.5, 0)]);

        let ones = [1.0, 1.0, 1.0];
        assert_eq!(auto_histogram(&ones).unwrap(), vec![(2.0, 3)]);

        assert_eq!(auto_histogram(&[1.5]).unwrap_err(), StatisticsError::TooFewDataPoints);
    }

    #[test]
    fn mode_requires_uniqueness() {
        assert_eq!(mode(&[1.0, 1.0, 2.0]).unwrap(), 1.0);
        assert_eq!(mode(&[1.0, 2.0]).unwrap_err(), StatisticsError::NoUniqueMode);
        assert_eq!(mode(&[]).unwrap_err(), StatisticsError::Empty);
    }

    #[test]
    fn harmonic_mean_treats_zero_as_zero_reciprocal() {
        close(harmonic_mean(&[0.0, 1.0, 2.0]).unwrap(), 3.0 / 1.5);
    }

    #[test]
    fn skewness_and_kurtosis_are_zero_for_constant_data() {
        let flat = [5.0, 5.0, 5.0, 5.0];
        assert_eq!(skewness(&flat).unwrap(), 0.0);
        assert_eq!(kurtosis(&flat).unwrap(), 0.0);
    }
}
