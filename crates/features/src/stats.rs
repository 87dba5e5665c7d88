//! Distribution summaries over per-auction counts.
//!
//! Every auction contributes one sample. Statistics that are undefined for
//! the sample at hand are `None` rather than NaN.

use crate::classifier::AuctionRebids;
use rebid_core::{ParticipantCategory, ParticipantId, ProductId};
use serde::Serialize;
use statrs::statistics::{Data, Distribution, Max, Median, Min, OrderStatistics};
use std::collections::BTreeMap;

/// Summary of one sample.
///
/// `q25`/`q75` come from `statrs` quartiles (R-8 estimator), which differs
/// from linear interpolation on small samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub n: usize,
    pub mean: Option<f64>,
    pub median: Option<f64>,
    /// Sample standard deviation (n - 1 denominator).
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub q25: Option<f64>,
    pub q75: Option<f64>,
    /// Percentage of samples equal to zero.
    pub pct_zero: Option<f64>,
}

#[inline]
fn defined(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

impl Summary {
    /// Summary of an empty sample.
    pub const EMPTY: Self = Self {
        n: 0,
        mean: None,
        median: None,
        std: None,
        min: None,
        max: None,
        q25: None,
        q75: None,
        pct_zero: None,
    };

    pub fn from_values(values: Vec<f64>) -> Self {
        let n = values.len();
        if n == 0 {
            return Self::EMPTY;
        }
        let zeros = values.iter().filter(|v| **v == 0.0).count();
        let mut data = Data::new(values);

        let std = if n >= 2 {
            data.std_dev().and_then(defined)
        } else {
            None
        };

        Self {
            n,
            mean: data.mean().and_then(defined),
            median: defined(data.median()),
            std,
            min: defined(data.min()),
            max: defined(data.max()),
            q25: defined(data.lower_quartile()),
            q75: defined(data.upper_quartile()),
            pct_zero: Some(zeros as f64 * 100.0 / n as f64),
        }
    }
}

/// Per-auction quantity to summarize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RebidMetric {
    Resubmissions,
    TrueRebids,
    TrueRebidRatio,
}

impl RebidMetric {
    pub fn value(&self, auction: &AuctionRebids) -> f64 {
        match self {
            RebidMetric::Resubmissions => auction.num_resubmissions as f64,
            RebidMetric::TrueRebids => auction.num_true_rebids as f64,
            RebidMetric::TrueRebidRatio => auction.true_rebid_ratio(),
        }
    }
}

/// Group items by `key_fn` and summarize `value_fn` within each group.
///
/// The result does not depend on input order.
pub fn summarize_by<T, K, KF, VF>(items: &[T], key_fn: KF, value_fn: VF) -> BTreeMap<K, Summary>
where
    K: Ord,
    KF: Fn(&T) -> K,
    VF: Fn(&T) -> f64,
{
    let mut samples: BTreeMap<K, Vec<f64>> = BTreeMap::new();
    for item in items {
        samples.entry(key_fn(item)).or_default().push(value_fn(item));
    }
    samples
        .into_iter()
        .map(|(key, values)| (key, Summary::from_values(values)))
        .collect()
}

/// Summaries of one rebid metric grouped by `key_fn`.
pub fn summarize_metric<K, KF>(
    auctions: &[AuctionRebids],
    metric: RebidMetric,
    key_fn: KF,
) -> BTreeMap<K, Summary>
where
    K: Ord,
    KF: Fn(&AuctionRebids) -> K,
{
    summarize_by(auctions, key_fn, |a| metric.value(a))
}

/// Group key of a per-unit profile.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct UnitKey {
    pub category: Option<ParticipantCategory>,
    pub product: ProductId,
    pub participant: ParticipantId,
}

/// True-rebid behaviour of one unit in one product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitProfile {
    pub key: UnitKey,
    pub auctions: usize,
    pub total_true_rebids: usize,
    pub true_rebids: Summary,
}

/// Per (category, product, participant) true-rebid profiles.
pub fn unit_profiles(auctions: &[AuctionRebids]) -> Vec<UnitProfile> {
    let mut totals: BTreeMap<UnitKey, usize> = BTreeMap::new();
    let unit_key = |a: &AuctionRebids| UnitKey {
        category: a.category,
        product: a.key.product.clone(),
        participant: a.key.participant.clone(),
    };
    for auction in auctions {
        *totals.entry(unit_key(auction)).or_default() += auction.num_true_rebids;
    }

    summarize_metric(auctions, RebidMetric::TrueRebids, unit_key)
        .into_iter()
        .map(|(key, summary)| UnitProfile {
            total_true_rebids: totals.get(&key).copied().unwrap_or(0),
            auctions: summary.n,
            key,
            true_rebids: summary,
        })
        .collect()
}

/// Mean of the per-unit mean true-rebid counts, per (category, product).
///
/// Each unit weighs the same regardless of how many auctions it bid into.
pub fn average_of_unit_means(
    profiles: &[UnitProfile],
) -> BTreeMap<(Option<ParticipantCategory>, ProductId), Summary> {
    let with_mean: Vec<(&UnitProfile, f64)> = profiles
        .iter()
        .filter_map(|p| p.true_rebids.mean.map(|m| (p, m)))
        .collect();
    summarize_by(
        &with_mean,
        |(p, _)| (p.key.category, p.key.product.clone()),
        |(_, mean)| *mean,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rebid_core::AuctionKey;

    fn auction(
        participant: &str,
        product: &str,
        category: Option<ParticipantCategory>,
        resubmissions: usize,
        true_rebids: usize,
    ) -> AuctionRebids {
        let day = NaiveDate::from_ymd_opt(2025, 10, 1).unwrap();
        AuctionRebids {
            key: AuctionKey::period_level(participant.into(), product.into(), day, 1),
            category,
            initial_offer: day.and_hms_opt(9, 0, 0).unwrap(),
            num_submissions: resubmissions + 1,
            num_resubmissions: resubmissions,
            num_true_rebids: true_rebids,
            flags: Vec::new(),
        }
    }

    #[test]
    fn test_summary_basic() {
        let summary = Summary::from_values(vec![3.0, 0.0, 6.0]);
        assert_eq!(summary.n, 3);
        assert_relative_eq!(summary.mean.unwrap(), 3.0);
        assert_relative_eq!(summary.median.unwrap(), 3.0);
        assert_relative_eq!(summary.std.unwrap(), 3.0);
        assert_relative_eq!(summary.min.unwrap(), 0.0);
        assert_relative_eq!(summary.max.unwrap(), 6.0);
        assert_relative_eq!(summary.pct_zero.unwrap(), 100.0 / 3.0);
    }

    #[test]
    fn test_summary_undefined_values() {
        assert_eq!(Summary::from_values(Vec::new()), Summary::EMPTY);

        let single = Summary::from_values(vec![4.0]);
        assert_eq!(single.n, 1);
        assert_eq!(single.std, None);
        assert_relative_eq!(single.mean.unwrap(), 4.0);
        assert_relative_eq!(single.median.unwrap(), 4.0);
    }

    #[test]
    fn test_summarize_by_category_is_order_independent() {
        let auto = Some(ParticipantCategory::AutobidderStorage);
        let other = Some(ParticipantCategory::NonStorage);
        let mut auctions = vec![
            auction("HPR1", "RAISEREG", auto, 2, 1),
            auction("HPR1", "LOWERREG", auto, 0, 0),
            auction("GEN1", "RAISEREG", other, 4, 3),
        ];

        let forward = summarize_metric(&auctions, RebidMetric::TrueRebids, |a| a.category);
        auctions.reverse();
        let backward = summarize_metric(&auctions, RebidMetric::TrueRebids, |a| a.category);
        assert_eq!(forward, backward);

        let auto_summary = forward[&auto];
        assert_eq!(auto_summary.n, 2);
        assert_relative_eq!(auto_summary.mean.unwrap(), 0.5);
        assert_relative_eq!(auto_summary.pct_zero.unwrap(), 50.0);
        assert_eq!(forward[&other].std, None);
    }

    #[test]
    fn test_true_rebid_ratio_metric() {
        let a = auction("HPR1", "RAISEREG", None, 4, 1);
        let b = auction("HPR1", "RAISEREG", None, 0, 0);
        assert_relative_eq!(RebidMetric::TrueRebidRatio.value(&a), 0.25);
        assert_relative_eq!(RebidMetric::TrueRebidRatio.value(&b), 0.0);
    }

    #[test]
    fn test_unit_profiles_and_average() {
        let auto = Some(ParticipantCategory::AutobidderStorage);
        let auctions = vec![
            auction("HPR1", "RAISEREG", auto, 3, 2),
            auction("HPR1", "RAISEREG", auto, 5, 4),
            auction("BESS2", "RAISEREG", auto, 0, 0),
        ];

        let profiles = unit_profiles(&auctions);
        assert_eq!(profiles.len(), 2);
        let hpr = profiles
            .iter()
            .find(|p| p.key.participant.as_str() == "HPR1")
            .unwrap();
        assert_eq!(hpr.auctions, 2);
        assert_eq!(hpr.total_true_rebids, 6);
        assert_relative_eq!(hpr.true_rebids.mean.unwrap(), 3.0);

        let averages = average_of_unit_means(&profiles);
        let key = (auto, ProductId::new("RAISEREG"));
        assert_eq!(averages[&key].n, 2);
        assert_relative_eq!(averages[&key].mean.unwrap(), 1.5);
    }
}
