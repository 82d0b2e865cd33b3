// src/stats/cliff.rs

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::fmt;

use super::check_samples;
use super::rank::omit_nan;
use crate::error::{Error, Result};

/// How the confidence interval around Cliff's delta is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CiMethod {
    /// Cliff's consistent variance with the asymmetric interval.
    #[default]
    Consistent,
    /// Symmetric `d ± z·s`, clamped to [-1, 1].
    Normal,
}

/// Romano et al. magnitude labels for |d|.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Magnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl Magnitude {
    pub fn from_delta(d: f64) -> Self {
        let d = d.abs();
        if d < 0.147 {
            Magnitude::Negligible
        } else if d < 0.33 {
            Magnitude::Small
        } else if d < 0.474 {
            Magnitude::Medium
        } else {
            Magnitude::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Magnitude::Negligible => "negligible",
            Magnitude::Small => "small",
            Magnitude::Medium => "medium",
            Magnitude::Large => "large",
        }
    }
}

impl fmt::Display for Magnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct EffectSize {
    /// P(X > Y) − P(X < Y).
    pub estimate: f64,
    pub ci: (f64, f64),
    pub variance: f64,
    pub magnitude: Magnitude,
}

/// Two-sided normal quantile for `alpha`.
pub(crate) fn z_critical(alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(Error::InvalidInput(format!(
            "alpha must be in (0, 1), got {}",
            alpha
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| Error::InvalidInput(format!("standard normal: {}", e)))?;
    Ok(normal.inverse_cdf(1.0 - alpha / 2.0))
}

/// Cliff's delta of `x` over `y` with a `1 - alpha` confidence interval.
///
/// NaNs are omitted. Each sample needs two observations for the variance.
pub fn cliff_delta(x: &[f64], y: &[f64], alpha: f64, method: CiMethod) -> Result<EffectSize> {
    let (x, y) = (omit_nan(x), omit_nan(y));
    check_samples(&x, &y, 2)?;
    let z = z_critical(alpha)?;

    let (n1, n2) = (x.len(), y.len());
    let (f1, f2) = (n1 as f64, n2 as f64);

    // dominance matrix, row-major
    let dom: Vec<f64> = x
        .iter()
        .flat_map(|&a| y.iter().map(move |&b| sign(a - b)))
        .collect();
    let d = dom.iter().sum::<f64>() / (f1 * f2);

    let row_ss: f64 = dom
        .chunks(n2)
        .map(|row| (row.iter().sum::<f64>() / f2 - d).powi(2))
        .sum();
    let col_ss: f64 = (0..n2)
        .map(|j| ((0..n1).map(|i| dom[i * n2 + j]).sum::<f64>() / f1 - d).powi(2))
        .sum();
    let cell_ss: f64 = dom.iter().map(|v| (v - d).powi(2)).sum();

    let raw = (f2 * f2 * row_ss + f1 * f1 * col_ss - cell_ss)
        / (f1 * f2 * (f1 - 1.0) * (f2 - 1.0));
    let variance = raw.max((1.0 - d * d) / (f1 * f2 - 1.0));
    let s = variance.sqrt();

    let ci = match method {
        CiMethod::Consistent => {
            let denom = 1.0 - d * d + z * z * variance;
            if denom <= 0.0 {
                // |d| = 1 with zero spread
                (d, d)
            } else {
                let centre = d - d.powi(3);
                let half = z * s * ((1.0 - d * d).powi(2) + z * z * variance).sqrt();
                ((centre - half) / denom, (centre + half) / denom)
            }
        }
        CiMethod::Normal => (d - z * s, d + z * s),
    };

    Ok(EffectSize {
        estimate: d,
        ci: (ci.0.clamp(-1.0, 1.0), ci.1.clamp(-1.0, 1.0)),
        variance,
        magnitude: Magnitude::from_delta(d),
    })
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const X1: [f64; 14] = [
        1.0, 2.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 4.0, 1.0, 1.0,
    ];
    const X2: [f64; 11] = [3.0, 3.0, 4.0, 3.0, 1.0, 2.0, 3.0, 1.0, 1.0, 5.0, 4.0];

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_reference_values() {
        let es = cliff_delta(&X1, &X2, 0.05, CiMethod::Consistent).unwrap();
        assert!(close(es.estimate, -0.577922077922078));
        assert!(close(es.variance, 0.033494427650271816));
        assert!(close(es.ci.0, -0.8258028152919477), "{:?}", es.ci);
        assert!(close(es.ci.1, -0.14289589009138656), "{:?}", es.ci);
        assert_eq!(es.magnitude, Magnitude::Large);

        let es = cliff_delta(
            &[10.0, 12.0, 14.0, 15.0, 19.0],
            &[1.0, 3.0, 5.0, 11.0, 13.0, 2.0],
            0.05,
            CiMethod::Consistent,
        )
        .unwrap();
        assert!(close(es.estimate, 0.8));
        assert!(close(es.ci.0, 0.2893904246915615), "{:?}", es.ci);
        assert!(close(es.ci.1, 0.9561795255264683), "{:?}", es.ci);
    }

    #[test]
    fn test_antisymmetric_and_bounded() {
        let xy = cliff_delta(&X1, &X2, 0.05, CiMethod::Consistent).unwrap();
        let yx = cliff_delta(&X2, &X1, 0.05, CiMethod::Consistent).unwrap();
        assert!(close(xy.estimate, -yx.estimate));
        assert!(close(xy.ci.0, -yx.ci.1));
        for es in [xy, yx] {
            assert!(es.ci.0 <= es.estimate && es.estimate <= es.ci.1);
            assert!(es.ci.0 >= -1.0 && es.ci.1 <= 1.0);
        }
    }

    #[test]
    fn test_normal_interval_is_symmetric() {
        let es = cliff_delta(&X1, &X2, 0.05, CiMethod::Normal).unwrap();
        assert!(close(es.estimate, -0.577922077922078));
        let below = es.estimate - es.ci.0;
        let above = es.ci.1 - es.estimate;
        assert!(close(below, above));
    }

    #[test]
    fn test_complete_separation() {
        let es = cliff_delta(&[5.0, 6.0], &[1.0, 2.0], 0.05, CiMethod::Consistent).unwrap();
        assert_eq!(es.estimate, 1.0);
        assert_eq!(es.ci, (1.0, 1.0));
    }

    #[test]
    fn test_nan_omitted_and_small_samples() {
        let es = cliff_delta(&[1.0, f64::NAN, 2.0], &[3.0, 4.0], 0.05, CiMethod::Consistent);
        assert_eq!(es.unwrap().estimate, -1.0);

        assert!(matches!(
            cliff_delta(&[], &[1.0, 2.0], 0.05, CiMethod::Consistent),
            Err(Error::EmptySample("x"))
        ));
        assert!(matches!(
            cliff_delta(&[1.0, 2.0], &[3.0], 0.05, CiMethod::Consistent),
            Err(Error::InsufficientData { needed: 2, got: 1 })
        ));
        assert!(matches!(
            cliff_delta(&[1.0, 2.0], &[3.0, 4.0], 1.5, CiMethod::Consistent),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_magnitude_thresholds() {
        assert_eq!(Magnitude::from_delta(0.1), Magnitude::Negligible);
        assert_eq!(Magnitude::from_delta(-0.2), Magnitude::Small);
        assert_eq!(Magnitude::from_delta(0.4), Magnitude::Medium);
        assert_eq!(Magnitude::from_delta(-0.474), Magnitude::Large);
    }
}
