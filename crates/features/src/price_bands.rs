//! Price-band analyses over day-level price submissions.

use crate::classifier::{group_auctions, BidRecord};
use crate::stats::Summary;
use ordered_float::OrderedFloat;
use rebid_core::{
    AuctionKey, Bands, ParticipantCategory, ParticipantId, PriceSubmission, BAND_COUNT,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Earliest submission of every day-level auction, in auction key order.
pub fn initial_bids(prices: &[PriceSubmission]) -> Vec<&PriceSubmission> {
    group_auctions(prices)
        .into_values()
        .filter_map(|group| group.first().copied())
        .collect()
}

/// Submissions filed as the initial daily bid.
pub fn daily_bids(prices: &[PriceSubmission]) -> Vec<&PriceSubmission> {
    prices.iter().filter(|p| p.submission_type.is_daily()).collect()
}

/// Movement of every price band over one day-level auction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceBandChange {
    pub key: AuctionKey,
    pub category: Option<ParticipantCategory>,
    pub num_submissions: usize,
    pub initial: Bands,
    pub last: Bands,
    /// Final minus initial per band, `None` if either side is missing.
    pub change: Bands,
}

impl PriceBandChange {
    /// Did any band move?
    pub fn any_change(&self) -> bool {
        self.change.iter().flatten().any(|c| *c != 0.0)
    }
}

/// Final minus initial price per band for every day-level auction.
pub fn price_band_changes(prices: &[PriceSubmission]) -> Vec<PriceBandChange> {
    group_auctions(prices)
        .into_iter()
        .filter_map(|(key, group)| {
            let first = *group.first()?;
            let last = *group.last()?;
            let mut change = [None; BAND_COUNT];
            for (slot, (a, b)) in change.iter_mut().zip(first.prices.iter().zip(&last.prices)) {
                *slot = match (a, b) {
                    (Some(a), Some(b)) => Some(b - a),
                    _ => None,
                };
            }
            Some(PriceBandChange {
                key,
                category: first.category(),
                num_submissions: group.len(),
                initial: first.prices,
                last: last.prices,
                change,
            })
        })
        .collect()
}

/// Spread of one participant's price in one band across all submissions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitBandVariation {
    pub participant: ParticipantId,
    pub category: Option<ParticipantCategory>,
    /// Band number (1-based).
    pub band: usize,
    pub samples: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    /// Coefficient of variation; zero when the mean is zero.
    pub cv: Option<f64>,
    pub distinct: usize,
}

/// Per participant and band price variation, in (participant, band) order.
///
/// Usually fed the daily bids only, so intraday rebids do not count as
/// variation of the unit's standing offer.
pub fn band_variation(prices: &[&PriceSubmission]) -> Vec<UnitBandVariation> {
    let mut samples: BTreeMap<(ParticipantId, usize), (Option<ParticipantCategory>, Vec<f64>)> =
        BTreeMap::new();
    for submission in prices {
        for (i, price) in submission.prices.iter().enumerate() {
            let entry = samples
                .entry((submission.participant.clone(), i + 1))
                .or_insert_with(|| (submission.category, Vec::new()));
            if let Some(p) = price {
                entry.1.push(*p);
            }
        }
    }

    samples
        .into_iter()
        .map(|((participant, band), (category, values))| {
            let distinct = values
                .iter()
                .map(|v| OrderedFloat(*v))
                .collect::<BTreeSet<_>>()
                .len();
            let summary = Summary::from_values(values);
            let cv = match (summary.mean, summary.std) {
                (Some(mean), _) if mean == 0.0 => Some(0.0),
                (Some(mean), Some(std)) => Some(std / mean),
                _ => None,
            };
            UnitBandVariation {
                participant,
                category,
                band,
                samples: summary.n,
                mean: summary.mean,
                std_dev: summary.std,
                cv,
                distinct,
            }
        })
        .collect()
}

/// Price summaries per (category, band) over the given submissions.
pub fn band_statistics(
    prices: &[&PriceSubmission],
) -> BTreeMap<(Option<ParticipantCategory>, usize), Summary> {
    let mut samples: BTreeMap<(Option<ParticipantCategory>, usize), Vec<f64>> = BTreeMap::new();
    for submission in prices {
        for (i, price) in submission.prices.iter().enumerate() {
            if let Some(p) = price {
                samples.entry((submission.category, i + 1)).or_default().push(*p);
            }
        }
    }
    samples
        .into_iter()
        .map(|(key, values)| (key, Summary::from_values(values)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use rebid_core::{ProductId, SubmissionType};

    fn submission(
        participant: &str,
        day: u32,
        hour: u32,
        kind: SubmissionType,
        band1: Option<f64>,
    ) -> PriceSubmission {
        let market_day = NaiveDate::from_ymd_opt(2025, 10, day).unwrap();
        let mut prices = [Some(100.0); BAND_COUNT];
        prices[0] = band1;
        PriceSubmission {
            participant: ParticipantId::new(participant),
            product: ProductId::new("RAISEREG"),
            market_day,
            offer_timestamp: market_day.and_hms_opt(hour, 0, 0).unwrap(),
            submission_type: kind,
            direction: None,
            prices,
            category: Some(ParticipantCategory::AutobidderStorage),
        }
    }

    #[test]
    fn test_initial_and_daily_bids() {
        let prices = vec![
            submission("HPR1", 1, 12, SubmissionType::Rebid, Some(5.0)),
            submission("HPR1", 1, 8, SubmissionType::Daily, Some(1.0)),
            submission("HPR1", 2, 9, SubmissionType::Daily, Some(2.0)),
        ];

        let initial = initial_bids(&prices);
        assert_eq!(initial.len(), 2);
        assert_eq!(initial[0].prices[0], Some(1.0));
        assert_eq!(daily_bids(&prices).len(), 2);
    }

    #[test]
    fn test_price_band_changes() {
        let prices = vec![
            submission("HPR1", 1, 8, SubmissionType::Daily, Some(1.0)),
            submission("HPR1", 1, 12, SubmissionType::Rebid, Some(-4.0)),
            submission("HPR1", 2, 8, SubmissionType::Daily, None),
            submission("HPR1", 2, 9, SubmissionType::Rebid, Some(3.0)),
        ];

        let changes = price_band_changes(&prices);
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0].num_submissions, 2);
        assert_eq!(changes[0].change[0], Some(-5.0));
        assert_eq!(changes[0].change[1], Some(0.0));
        assert!(changes[0].any_change());
        assert_eq!(changes[1].change[0], None);
        assert!(!changes[1].any_change());
    }

    #[test]
    fn test_band_variation() {
        let prices = vec![
            submission("HPR1", 1, 8, SubmissionType::Daily, Some(10.0)),
            submission("HPR1", 2, 8, SubmissionType::Daily, Some(20.0)),
            submission("HPR1", 3, 8, SubmissionType::Daily, Some(10.0)),
            submission("BESS2", 1, 8, SubmissionType::Daily, Some(0.0)),
            submission("BESS2", 2, 8, SubmissionType::Daily, Some(0.0)),
        ];

        let refs: Vec<&PriceSubmission> = prices.iter().collect();
        let variation = band_variation(&refs);
        assert_eq!(variation.len(), 2 * BAND_COUNT);

        let hpr_band1 = variation
            .iter()
            .find(|v| v.participant.as_str() == "HPR1" && v.band == 1)
            .unwrap();
        assert_eq!(hpr_band1.samples, 3);
        assert_eq!(hpr_band1.distinct, 2);
        let mean: f64 = 40.0 / 3.0;
        let std = ((2.0 * (10.0 - mean) * (10.0 - mean) + (20.0 - mean) * (20.0 - mean)) / 2.0).sqrt();
        assert_relative_eq!(hpr_band1.std_dev.unwrap(), std, epsilon = 1e-9);
        assert_relative_eq!(hpr_band1.cv.unwrap(), std / mean, epsilon = 1e-9);

        let bess_band1 = variation
            .iter()
            .find(|v| v.participant.as_str() == "BESS2" && v.band == 1)
            .unwrap();
        assert_eq!(bess_band1.cv, Some(0.0));
        assert_eq!(bess_band1.distinct, 1);
    }

    #[test]
    fn test_band_variation_over_daily_bids_skips_rebids() {
        let prices = vec![
            submission("HPR1", 1, 8, SubmissionType::Daily, Some(10.0)),
            submission("HPR1", 1, 12, SubmissionType::Rebid, Some(900.0)),
        ];

        let variation = band_variation(&daily_bids(&prices));
        let band1 = variation.iter().find(|v| v.band == 1).unwrap();
        assert_eq!(band1.samples, 1);
        assert_eq!(band1.distinct, 1);
        assert_eq!(band1.std_dev, None);
        assert_eq!(band1.mean, Some(10.0));
    }

    #[test]
    fn test_band_statistics() {
        let prices = vec![
            submission("HPR1", 1, 8, SubmissionType::Daily, Some(10.0)),
            submission("HPR1", 2, 8, SubmissionType::Daily, None),
        ];
        let refs: Vec<&PriceSubmission> = prices.iter().collect();
        let stats = band_statistics(&refs);
        let auto = Some(ParticipantCategory::AutobidderStorage);
        assert_eq!(stats[&(auto, 1)].n, 1);
        assert_eq!(stats[&(auto, 2)].n, 2);
    }
}
