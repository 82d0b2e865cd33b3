// src/stats/brunner_munzel.rs

use statrs::distribution::{ContinuousCDF, StudentsT};
use tracing::debug;

use super::check_samples;
use super::rank::{mean, midranks, omit_nan};
use super::{Alternative, Significance, TestMethod};
use crate::error::{Error, Result};

/// Brunner-Munzel statistic and Welch-Satterthwaite degrees of freedom.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BmStatistic {
    pub w: f64,
    pub df: f64,
}

/// Statistic from the pooled midranks of each sample.
///
/// Within-sample ranks are derived from the pooled ranks, which order the
/// values identically, so permutations can reuse one pooled ranking.
pub(crate) fn statistic_from_ranks(rcx: &[f64], rcy: &[f64]) -> BmStatistic {
    let (nx, ny) = (rcx.len() as f64, rcy.len() as f64);
    let (rx, ry) = (midranks(rcx), midranks(rcy));
    let (mcx, mcy) = (mean(rcx), mean(rcy));
    let (mx, my) = (mean(&rx), mean(&ry));

    let sx = rcx
        .iter()
        .zip(&rx)
        .map(|(c, r)| (c - r - mcx + mx).powi(2))
        .sum::<f64>()
        / (nx - 1.0);
    let sy = rcy
        .iter()
        .zip(&ry)
        .map(|(c, r)| (c - r - mcy + my).powi(2))
        .sum::<f64>()
        / (ny - 1.0);

    let pooled = nx * sx + ny * sy;
    let diff = mcy - mcx;
    if pooled == 0.0 {
        // complete separation (or all ties): no spread to scale by
        let w = if diff == 0.0 {
            f64::NAN
        } else {
            f64::INFINITY.copysign(diff)
        };
        return BmStatistic { w, df: f64::NAN };
    }

    let w = nx * ny * diff / ((nx + ny) * pooled.sqrt());
    let df = pooled.powi(2) / ((nx * sx).powi(2) / (nx - 1.0) + (ny * sy).powi(2) / (ny - 1.0));
    BmStatistic { w, df }
}

pub(crate) fn pooled_ranks(x: &[f64], y: &[f64]) -> Vec<f64> {
    let pooled: Vec<f64> = x.iter().chain(y).copied().collect();
    midranks(&pooled)
}

/// Brunner-Munzel statistic for two samples, NaNs omitted.
pub fn statistic(x: &[f64], y: &[f64]) -> Result<BmStatistic> {
    let (x, y) = (omit_nan(x), omit_nan(y));
    check_samples(&x, &y, 2)?;
    let ranks = pooled_ranks(&x, &y);
    let (rcx, rcy) = ranks.split_at(x.len());
    Ok(statistic_from_ranks(rcx, rcy))
}

/// Asymptotic Brunner-Munzel test with a Student t reference distribution.
///
/// `Greater` means `x` is stochastically greater than `y`. A zero pooled
/// variance yields an infinite statistic with p = 0 or 1, or NaN when the
/// rank means coincide.
pub fn brunner_munzel(x: &[f64], y: &[f64], alternative: Alternative) -> Result<Significance> {
    let BmStatistic { w, df } = statistic(x, y)?;

    let cdf = if w.is_nan() {
        f64::NAN
    } else if w.is_infinite() {
        if w > 0.0 {
            1.0
        } else {
            0.0
        }
    } else {
        let t = StudentsT::new(0.0, 1.0, df)
            .map_err(|e| Error::InvalidInput(format!("t distribution with df={}: {}", df, e)))?;
        t.cdf(w)
    };

    // f64::min drops NaN, so an undefined statistic has to short-circuit
    let p_value = match alternative {
        _ if cdf.is_nan() => f64::NAN,
        Alternative::Greater => cdf,
        Alternative::Less => 1.0 - cdf,
        Alternative::TwoSided => (2.0 * cdf.min(1.0 - cdf)).min(1.0),
    };
    debug!(w, df, p_value, ?alternative, "brunner-munzel");

    Ok(Significance {
        statistic: w,
        p_value,
        df: df.is_finite().then_some(df),
        alternative,
        method: TestMethod::Asymptotic,
    })
}
