//! Numerical primitives shared by the volume agents.
//!
//! Rolling windows follow the usual dataframe conventions: a window of `w`
//! ending at index `i` covers `i+1-w..=i`, and positions without a full
//! window are `None`. Standard deviations are sample (ddof = 1) unless the
//! function name says otherwise.

use crate::models::PriceSeries;

/// Result of an ordinary least squares fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub r_value: f64,
}

pub fn mean(xs: &[f64]) -> Option<f64> {
    if xs.is_empty() {
        return None;
    }
    Some(xs.iter().sum::<f64>() / xs.len() as f64)
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let m = mean(xs)?;
    let ss: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / (xs.len() - 1) as f64).sqrt())
}

/// Population standard deviation (n denominator).
pub fn population_std(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    let ss: f64 = xs.iter().map(|x| (x - m).powi(2)).sum();
    Some((ss / xs.len() as f64).sqrt())
}

pub fn rolling_mean(xs: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(xs, window, mean)
}

pub fn rolling_std(xs: &[f64], window: usize) -> Vec<Option<f64>> {
    rolling(xs, window, sample_std)
}

fn rolling(xs: &[f64], window: usize, f: fn(&[f64]) -> Option<f64>) -> Vec<Option<f64>> {
    (0..xs.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                None
            } else {
                f(&xs[i + 1 - window..=i])
            }
        })
        .collect()
}

/// Fractional change between consecutive values. A zero previous value
/// yields 0.0 rather than infinity.
pub fn pct_change(xs: &[f64]) -> Vec<f64> {
    xs.windows(2)
        .map(|w| if w[0] == 0.0 { 0.0 } else { (w[1] - w[0]) / w[0] })
        .collect()
}

/// Pearson correlation coefficient. `None` when undefined.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs)?;
    let my = mean(ys)?;

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }

    if vx == 0.0 || vy == 0.0 {
        return None;
    }
    let r = cov / (vx.sqrt() * vy.sqrt());
    r.is_finite().then_some(r)
}

/// Least squares fit of `ys` against `xs`.
pub fn linregress(xs: &[f64], ys: &[f64]) -> Regression {
    let n = xs.len().min(ys.len());
    if n < 2 {
        return Regression {
            slope: 0.0,
            intercept: ys.first().copied().unwrap_or(0.0),
            r_value: 0.0,
        };
    }
    let xs = &xs[..n];
    let ys = &ys[..n];
    let mx = mean(xs).unwrap_or(0.0);
    let my = mean(ys).unwrap_or(0.0);

    let num: f64 = xs.iter().zip(ys).map(|(x, y)| (x - mx) * (y - my)).sum();
    let den: f64 = xs.iter().map(|x| (x - mx).powi(2)).sum();

    let slope = if den == 0.0 { 0.0 } else { num / den };
    Regression {
        slope,
        intercept: my - slope * mx,
        r_value: pearson(xs, ys).unwrap_or(0.0),
    }
}

/// Regression of `ys` against their index `0..n`.
pub fn trend_line(ys: &[f64]) -> Regression {
    let xs: Vec<f64> = (0..ys.len()).map(|i| i as f64).collect();
    linregress(&xs, ys)
}

/// Percentage of `xs` that is less than or equal to `value`.
pub fn percentile_rank(xs: &[f64], value: f64) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let below = xs.iter().filter(|&&x| x <= value).count();
    below as f64 / xs.len() as f64 * 100.0
}

/// Sample std over mean. `None` when the mean is zero or the std is undefined.
pub fn coefficient_of_variation(xs: &[f64]) -> Option<f64> {
    let m = mean(xs)?;
    if m == 0.0 {
        return None;
    }
    Some(sample_std(xs)? / m)
}

/// Cumulative volume-weighted average price at the last bar.
pub fn vwap(series: &PriceSeries) -> f64 {
    let volumes = series.volumes();
    let pv: f64 = series
        .typical_prices()
        .iter()
        .zip(&volumes)
        .map(|(tp, v)| tp * v)
        .sum();
    let vol: f64 = volumes.iter().sum();
    if vol > 0.0 {
        pv / vol
    } else {
        series.bars.last().map(|b| b.close).unwrap_or(0.0)
    }
}

/// Last `n` elements (or all of them when shorter).
pub fn tail<T>(xs: &[T], n: usize) -> &[T] {
    &xs[xs.len().saturating_sub(n)..]
}

/// Round to `dp` decimal places.
pub fn round_to(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mean_and_std() {
        let xs = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!(approx(mean(&xs).unwrap(), 5.0));
        assert!(approx(population_std(&xs).unwrap(), 2.0));
        assert!(approx(sample_std(&xs).unwrap(), (32.0f64 / 7.0).sqrt()));
        assert!(mean(&[]).is_none());
        assert!(sample_std(&[1.0]).is_none());
    }

    #[test]
    fn test_rolling_windows() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let rm = rolling_mean(&xs, 3);
        assert_eq!(rm[0], None);
        assert_eq!(rm[1], None);
        assert!(approx(rm[2].unwrap(), 2.0));
        assert!(approx(rm[3].unwrap(), 3.0));

        let rs = rolling_std(&xs, 3);
        assert!(approx(rs[3].unwrap(), 1.0));
    }

    #[test]
    fn test_pct_change_zero_previous() {
        let changes = pct_change(&[0.0, 10.0, 15.0]);
        assert_eq!(changes.len(), 2);
        assert!(approx(changes[0], 0.0));
        assert!(approx(changes[1], 0.5));
    }

    #[test]
    fn test_pearson() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let ys = [2.0, 4.0, 6.0, 8.0];
        assert!(approx(pearson(&xs, &ys).unwrap(), 1.0));

        let inverse = [8.0, 6.0, 4.0, 2.0];
        assert!(approx(pearson(&xs, &inverse).unwrap(), -1.0));

        assert!(pearson(&xs, &[1.0, 1.0, 1.0, 1.0]).is_none());
        assert!(pearson(&xs, &ys[..3]).is_none());
    }

    #[test]
    fn test_linregress() {
        let reg = trend_line(&[1.0, 3.0, 5.0, 7.0]);
        assert!(approx(reg.slope, 2.0));
        assert!(approx(reg.intercept, 1.0));
        assert!(approx(reg.r_value, 1.0));

        let flat = trend_line(&[5.0, 5.0, 5.0]);
        assert!(approx(flat.slope, 0.0));
        assert!(approx(flat.r_value, 0.0));
    }

    #[test]
    fn test_percentile_rank() {
        let xs = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!(approx(percentile_rank(&xs, 5.0), 100.0));
        assert!(approx(percentile_rank(&xs, 1.0), 20.0));
        assert!(approx(percentile_rank(&xs, 0.5), 0.0));
    }

    #[test]
    fn test_coefficient_of_variation() {
        assert!(coefficient_of_variation(&[0.0, 0.0]).is_none());
        let cv = coefficient_of_variation(&[10.0, 10.0, 10.0]).unwrap();
        assert!(approx(cv, 0.0));
    }

    #[test]
    fn test_round_and_tail() {
        assert!(approx(round_to(1.23456, 2), 1.23));
        assert_eq!(tail(&[1.0, 2.0, 3.0], 2), &[2.0, 3.0]);
        assert_eq!(tail(&[1.0], 5), &[1.0]);
    }

    #[test]
    fn test_vwap_weights_typical_price() {
        use crate::models::OhlcvBar;
        use chrono::NaiveDate;

        let bar = |day: u32, price: f64, volume: f64| OhlcvBar {
            date: NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            open: price,
            high: price + 3.0,
            low: price - 3.0,
            close: price,
            volume,
        };
        let series = PriceSeries::new("V", vec![bar(1, 10.0, 1.0), bar(2, 20.0, 3.0)]);
        assert!(approx(vwap(&series), 17.5));

        let silent = PriceSeries::new("V", vec![bar(1, 10.0, 0.0), bar(2, 20.0, 0.0)]);
        assert!(approx(vwap(&silent), 20.0));
    }
}
