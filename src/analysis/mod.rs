// src/analysis/mod.rs

pub mod dataset;
pub mod export;

pub use dataset::{Dataset, Measure, Selection};
pub use export::{to_record_batch, write_parquet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::{Error, Result};
use crate::stats::{
    self, cliff_delta, Alternative, CiMethod, EffectSize, PermutationOptions, Significance,
};

/// Tunables for [`analyze`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Significance level of the effect-size interval.
    pub alpha: f64,
    pub ci_method: CiMethod,
    /// Pairs whose smaller group is under this size use the permuted test.
    pub permutation_threshold: usize,
    /// Measures tested with `greater` instead of `less`.
    pub reversed_measures: Vec<String>,
    pub max_exact: u64,
    pub resamples: usize,
    pub seed: u64,
}

impl Default for Settings {
    fn default() -> Self {
        let perm = PermutationOptions::default();
        Self {
            alpha: stats::ALPHA,
            ci_method: CiMethod::default(),
            permutation_threshold: stats::PERMUTATION_THRESHOLD,
            reversed_measures: vec!["Parental Stress".to_string()],
            max_exact: perm.max_exact,
            resamples: perm.resamples,
            seed: perm.seed,
        }
    }
}

impl Settings {
    pub fn permutation_options(&self) -> PermutationOptions {
        PermutationOptions {
            max_exact: self.max_exact,
            resamples: self.resamples,
            seed: self.seed,
        }
    }

    /// H_a is that the group with fewer sessions scores lower, except for
    /// reversed measures where it scores higher.
    pub fn alternative_for(&self, measure: &str) -> Alternative {
        if self.reversed_measures.iter().any(|m| m == measure) {
            Alternative::Greater
        } else {
            Alternative::Less
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PairwiseStats {
    /// `"<x> v.s. <y>"`.
    pub comparison: String,
    pub group_x: String,
    pub group_y: String,
    pub n_x: usize,
    pub n_y: usize,
    /// `None` when a group is too small to estimate.
    pub effect: Option<EffectSize>,
    pub significance: Option<Significance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasureStats {
    pub measure: String,
    pub pairs: Vec<PairwiseStats>,
}

/// Pairs of group indices to compare: neighbours first, then wider gaps.
/// For three groups this is `(0, 1), (1, 2), (0, 2)`.
pub fn comparison_pairs(k: usize) -> Vec<(usize, usize)> {
    (1..k)
        .flat_map(|gap| (0..k - gap).map(move |i| (i, i + gap)))
        .collect()
}

/// Too-small samples become `None`; everything else propagates.
fn tolerate_small<T>(result: Result<T>, what: &str, comparison: &str) -> Result<Option<T>> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(e @ (Error::EmptySample(_) | Error::InsufficientData { .. })) => {
            warn!(comparison, error = %e, "skipping {}", what);
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

/// Effect size and significance for every pair of groups within one measure.
pub fn test_measure(
    bins: &[Vec<f64>],
    labels: &[&str],
    measure: &str,
    settings: &Settings,
) -> Result<MeasureStats> {
    if bins.len() != labels.len() {
        return Err(Error::InvalidInput(format!(
            "measure '{}' has {} bins for {} groups",
            measure,
            bins.len(),
            labels.len()
        )));
    }
    let alternative = settings.alternative_for(measure);
    let opts = settings.permutation_options();

    let mut pairs = Vec::new();
    for (i, j) in comparison_pairs(labels.len()) {
        let (x, y) = (&bins[i], &bins[j]);
        let comparison = format!("{} v.s. {}", labels[i], labels[j]);

        let effect = tolerate_small(
            cliff_delta(x, y, settings.alpha, settings.ci_method),
            "effect size",
            &comparison,
        )?;
        let significance = tolerate_small(
            stats::significance(x, y, alternative, settings.permutation_threshold, &opts),
            "significance",
            &comparison,
        )?;
        debug!(
            measure,
            comparison = %comparison,
            delta = ?effect.map(|e| e.estimate),
            p = ?significance.map(|s| s.p_value),
            "pair tested"
        );

        pairs.push(PairwiseStats {
            comparison,
            group_x: labels[i].to_string(),
            group_y: labels[j].to_string(),
            n_x: x.len(),
            n_y: y.len(),
            effect,
            significance,
        });
    }

    Ok(MeasureStats {
        measure: measure.to_string(),
        pairs,
    })
}

/// Pairwise Cliff's delta and Brunner-Munzel for every measure in `dataset`.
#[instrument(level = "info", skip_all, fields(rows = dataset.num_rows()))]
pub fn analyze(dataset: &Dataset, settings: &Settings) -> Result<Vec<MeasureStats>> {
    let labels = dataset.group_labels();
    if labels.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "need at least two treatment groups, found {}",
            labels.len()
        )));
    }
    info!(groups = ?labels, measures = dataset.measures().len(), "analyzing");

    dataset
        .measures()
        .iter()
        .map(|measure| {
            let bins = dataset.group_measure(measure);
            test_measure(&bins, &labels, &measure.name, settings)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::TestMethod;

    fn dataset() -> Dataset {
        // three groups, interleaved, first-appearance order low → high
        let mut groups = Vec::new();
        let mut involvement = Vec::new();
        let mut stress = Vec::new();
        for i in 0..12 {
            for (g, offset) in [("low", 0.0), ("mid", 3.0), ("high", 6.0)] {
                if g == "low" && i >= 6 {
                    continue;
                }
                groups.push(g.to_string());
                involvement.push(Some(offset + (i % 5) as f64));
                stress.push(Some(20.0 - offset - (i % 4) as f64));
            }
        }
        stress[0] = None;
        Dataset::new(
            groups,
            vec![
                Measure {
                    name: "Involvement".into(),
                    values: involvement,
                },
                Measure {
                    name: "Parental Stress".into(),
                    values: stress,
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_comparison_pairs() {
        assert_eq!(comparison_pairs(3), vec![(0, 1), (1, 2), (0, 2)]);
        assert_eq!(
            comparison_pairs(4),
            vec![(0, 1), (1, 2), (2, 3), (0, 2), (1, 3), (0, 3)]
        );
        assert!(comparison_pairs(1).is_empty());
    }

    #[test]
    fn test_analyze_three_groups() {
        crate::init_test_logging();
        let results = analyze(&dataset(), &Settings::default()).unwrap();
        assert_eq!(results.len(), 2);

        for stats in &results {
            let labels: Vec<_> = stats.pairs.iter().map(|p| p.comparison.as_str()).collect();
            assert_eq!(labels, vec!["low v.s. mid", "mid v.s. high", "low v.s. high"]);
        }

        let involvement = &results[0];
        let low_mid = &involvement.pairs[0];
        assert_eq!((low_mid.n_x, low_mid.n_y), (6, 12));
        let sig = low_mid.significance.unwrap();
        // low has 6 < 10 observations
        assert!(matches!(sig.method, TestMethod::ExactPermutation { .. }));
        assert_eq!(sig.alternative, Alternative::Less);
        assert!(low_mid.effect.unwrap().estimate < 0.0);
        assert!(sig.p_value < 0.05);

        let mid_high = &involvement.pairs[1];
        assert_eq!(mid_high.significance.unwrap().method, TestMethod::Asymptotic);

        // reversed direction for parental stress; one low value is missing
        let stress = &results[1];
        assert_eq!(stress.pairs[0].n_x, 5);
        let sig = stress.pairs[0].significance.unwrap();
        assert_eq!(sig.alternative, Alternative::Greater);
        assert!(sig.p_value < 0.05);
    }

    #[test]
    fn test_tiny_group_is_skipped() {
        let ds = Dataset::new(
            vec!["a".into(), "a".into(), "b".into()],
            vec![Measure {
                name: "m".into(),
                values: vec![Some(1.0), Some(2.0), Some(3.0)],
            }],
        )
        .unwrap();
        let results = analyze(&ds, &Settings::default()).unwrap();
        let pair = &results[0].pairs[0];
        assert_eq!(pair.comparison, "a v.s. b");
        assert!(pair.effect.is_none());
        assert!(pair.significance.is_none());
    }

    #[test]
    fn test_measure_bins_must_match_labels() {
        let err =
            test_measure(&[vec![1.0, 2.0]], &["a", "b"], "m", &Settings::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(msg) if msg.contains("1 bins for 2 groups")));
    }

    #[test]
    fn test_single_group_rejected() {
        let ds = Dataset::new(vec!["a".into()], vec![]).unwrap();
        assert!(matches!(
            analyze(&ds, &Settings::default()),
            Err(Error::InvalidInput(_))
        ));
    }
}
