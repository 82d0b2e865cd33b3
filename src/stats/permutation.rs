// src/stats/permutation.rs

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::brunner_munzel::{pooled_ranks, statistic_from_ranks};
use super::check_samples;
use super::rank::omit_nan;
use super::{Alternative, Significance, TestMethod};
use crate::error::Result;

/// Tolerance for treating a permuted statistic as equal to the observed one.
const TIE_EPS: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermutationOptions {
    /// Enumerate every split when there are at most this many.
    pub max_exact: u64,
    /// Monte Carlo draws when enumeration would exceed `max_exact`.
    pub resamples: usize,
    pub seed: u64,
}

impl Default for PermutationOptions {
    fn default() -> Self {
        Self {
            max_exact: 100_000,
            resamples: 10_000,
            seed: 0x_b0b_cafe,
        }
    }
}

/// `n choose k`, saturating at `u64::MAX`.
pub fn binomial(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}

/// Advance `idx` to the next k-combination of `0..n` in lexicographic order.
fn next_combination(idx: &mut [usize], n: usize) -> bool {
    let k = idx.len();
    let Some(i) = (0..k).rev().find(|&i| idx[i] < n - k + i) else {
        return false;
    };
    idx[i] += 1;
    for j in i + 1..k {
        idx[j] = idx[j - 1] + 1;
    }
    true
}

/// Counts of permuted statistics on either side of the observed one.
#[derive(Debug, Default)]
struct Tally {
    at_most: u64,
    at_least: u64,
    total: u64,
}

impl Tally {
    fn add(&mut self, w: f64, observed: f64) {
        if w <= observed + TIE_EPS {
            self.at_most += 1;
        }
        if w >= observed - TIE_EPS {
            self.at_least += 1;
        }
        self.total += 1;
    }
}

/// Statistic with the undefined case (all ties) read as "no difference".
fn permuted_w(rcx: &[f64], rcy: &[f64]) -> f64 {
    let w = statistic_from_ranks(rcx, rcy).w;
    if w.is_nan() {
        0.0
    } else {
        w
    }
}

fn split(ranks: &[f64], in_x: &[bool], rcx: &mut Vec<f64>, rcy: &mut Vec<f64>) {
    rcx.clear();
    rcy.clear();
    for (r, &is_x) in ranks.iter().zip(in_x) {
        if is_x {
            rcx.push(*r);
        } else {
            rcy.push(*r);
        }
    }
}

/// Brunner-Munzel test with a permutation reference distribution.
///
/// Every split of the pooled sample into groups of the original sizes is
/// scored when there are at most `opts.max_exact` of them, otherwise
/// `opts.resamples` seeded random splits are drawn. NaNs are omitted.
pub fn permuted_brunnermunzel(
    x: &[f64],
    y: &[f64],
    alternative: Alternative,
    opts: &PermutationOptions,
) -> Result<Significance> {
    let (x, y) = (omit_nan(x), omit_nan(y));
    check_samples(&x, &y, 2)?;

    let (nx, n) = (x.len(), x.len() + y.len());
    let ranks = pooled_ranks(&x, &y);
    let observed = {
        let (rcx, rcy) = ranks.split_at(nx);
        permuted_w(rcx, rcy)
    };

    let mut tally = Tally::default();
    let mut in_x = vec![false; n];
    let mut rcx = Vec::with_capacity(n);
    let mut rcy = Vec::with_capacity(n);

    let splits = binomial(n, nx);
    let method = if splits <= opts.max_exact {
        let mut idx: Vec<usize> = (0..nx).collect();
        loop {
            in_x.iter_mut().for_each(|v| *v = false);
            idx.iter().for_each(|&i| in_x[i] = true);
            split(&ranks, &in_x, &mut rcx, &mut rcy);
            tally.add(permuted_w(&rcx, &rcy), observed);
            if !next_combination(&mut idx, n) {
                break;
            }
        }
        TestMethod::ExactPermutation {
            permutations: tally.total,
        }
    } else {
        let mut rng = StdRng::seed_from_u64(opts.seed);
        let mut order: Vec<usize> = (0..n).collect();
        // the observed split counts as one draw
        tally.add(observed, observed);
        for _ in 0..opts.resamples {
            order.shuffle(&mut rng);
            in_x.iter_mut().for_each(|v| *v = false);
            order[..nx].iter().for_each(|&i| in_x[i] = true);
            split(&ranks, &in_x, &mut rcx, &mut rcy);
            tally.add(permuted_w(&rcx, &rcy), observed);
        }
        TestMethod::MonteCarlo {
            resamples: opts.resamples as u64,
        }
    };

    let total = tally.total as f64;
    // small statistic ⇔ x ranks high
    let p_greater = tally.at_most as f64 / total;
    let p_less = tally.at_least as f64 / total;
    let p_value = match alternative {
        Alternative::Greater => p_greater,
        Alternative::Less => p_less,
        Alternative::TwoSided => (2.0 * p_greater.min(p_less)).min(1.0),
    };
    debug!(
        observed,
        p_value,
        splits,
        total = tally.total,
        ?alternative,
        "permuted brunner-munzel"
    );

    Ok(Significance {
        statistic: observed,
        p_value,
        df: None,
        alternative,
        method,
    })
}
