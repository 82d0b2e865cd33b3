// src/stats/mod.rs

pub mod brunner_munzel;
pub mod cliff;
pub mod permutation;
pub mod rank;

pub use brunner_munzel::brunner_munzel;
pub use cliff::{cliff_delta, CiMethod, EffectSize, Magnitude};
pub use permutation::{permuted_brunnermunzel, PermutationOptions};

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// Default significance level for effect-size intervals.
pub const ALPHA: f64 = 0.05;

/// Groups smaller than this are tested by permutation.
pub const PERMUTATION_THRESHOLD: usize = 10;

/// Direction of the alternative hypothesis, stated for `x` relative to `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alternative {
    /// `x` is stochastically smaller: P(X < Y) > P(Y < X).
    Less,
    /// `x` is stochastically greater.
    Greater,
    TwoSided,
}

impl Alternative {
    pub fn as_str(&self) -> &'static str {
        match self {
            Alternative::Less => "less",
            Alternative::Greater => "greater",
            Alternative::TwoSided => "two-sided",
        }
    }
}

impl FromStr for Alternative {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "less" => Ok(Alternative::Less),
            "greater" => Ok(Alternative::Greater),
            "two-sided" | "two_sided" => Ok(Alternative::TwoSided),
            other => Err(Error::InvalidInput(format!(
                "alternative must be 'less', 'greater' or 'two-sided', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Alternative {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference distribution a p-value was taken from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TestMethod {
    Asymptotic,
    ExactPermutation { permutations: u64 },
    MonteCarlo { resamples: u64 },
}

impl TestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMethod::Asymptotic => "asymptotic",
            TestMethod::ExactPermutation { .. } => "exact_permutation",
            TestMethod::MonteCarlo { .. } => "monte_carlo",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Significance {
    /// Brunner-Munzel W.
    pub statistic: f64,
    pub p_value: f64,
    /// Degrees of freedom of the t approximation; `None` for permutation tests.
    pub df: Option<f64>,
    pub alternative: Alternative,
    pub method: TestMethod,
}

pub(crate) fn check_samples(x: &[f64], y: &[f64], needed: usize) -> Result<()> {
    if x.is_empty() {
        return Err(Error::EmptySample("x"));
    }
    if y.is_empty() {
        return Err(Error::EmptySample("y"));
    }
    let got = x.len().min(y.len());
    if got < needed {
        return Err(Error::InsufficientData { needed, got });
    }
    Ok(())
}

/// Cliff's delta of `x` over `y` with its 95% consistent interval.
pub fn compute_effect_size(x: &[f64], y: &[f64]) -> Result<(f64, (f64, f64))> {
    let es = cliff_delta(x, y, ALPHA, CiMethod::Consistent)?;
    Ok((es.estimate, es.ci))
}

/// Brunner-Munzel, permuted when either sample (NaNs omitted) is under
/// [`PERMUTATION_THRESHOLD`] observations.
pub fn compute_significance(
    x: &[f64],
    y: &[f64],
    alternative: Alternative,
) -> Result<(f64, f64)> {
    let opts = PermutationOptions::default();
    let sig = significance(x, y, alternative, PERMUTATION_THRESHOLD, &opts)?;
    Ok((sig.statistic, sig.p_value))
}

/// Pick the asymptotic or permuted test by the smaller sample size.
pub fn significance(
    x: &[f64],
    y: &[f64],
    alternative: Alternative,
    permutation_threshold: usize,
    opts: &PermutationOptions,
) -> Result<Significance> {
    let smallest = rank::omit_nan(x).len().min(rank::omit_nan(y).len());
    if smallest < permutation_threshold {
        permuted_brunnermunzel(x, y, alternative, opts)
    } else {
        brunner_munzel(x, y, alternative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alternative_parsing() {
        assert_eq!("less".parse::<Alternative>().unwrap(), Alternative::Less);
        assert_eq!(" Greater".parse::<Alternative>().unwrap(), Alternative::Greater);
        assert_eq!("two_sided".parse::<Alternative>().unwrap(), Alternative::TwoSided);
        assert!(matches!(
            "sideways".parse::<Alternative>(),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_compute_effect_size_contract() {
        let (estimate, (lo, hi)) =
            compute_effect_size(&[1.0, 2.0, 3.0, 4.0], &[3.0, 4.0, 5.0, 6.0]).unwrap();
        assert!((estimate - (-0.75)).abs() < 1e-12);
        assert!(lo <= estimate && estimate <= hi);
    }

    #[test]
    fn test_small_samples_use_permutation() {
        let x: Vec<f64> = (0..5).map(f64::from).collect();
        let y: Vec<f64> = (3..15).map(f64::from).collect();
        let sig = significance(&x, &y, Alternative::Less, 10, &PermutationOptions::default())
            .unwrap();
        assert!(matches!(sig.method, TestMethod::ExactPermutation { .. }));

        let x: Vec<f64> = (0..12).map(f64::from).collect();
        let sig = significance(&x, &y, Alternative::Less, 10, &PermutationOptions::default())
            .unwrap();
        assert_eq!(sig.method, TestMethod::Asymptotic);

        let (w, p) = compute_significance(&x, &y, Alternative::Less).unwrap();
        assert_eq!((w, p), (sig.statistic, sig.p_value));
    }
}
