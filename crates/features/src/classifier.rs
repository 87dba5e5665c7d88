//! Rebid classification.
//!
//! An auction is every submission sharing an [`AuctionKey`]. Submissions are
//! ordered by offer timestamp (stable, so equal timestamps keep their input
//! order); the first is the initial bid and each later one is a
//! resubmission. A resubmission is a true rebid when at least one quantity
//! band differs from the submission immediately before it.

use rayon::prelude::*;
use rebid_core::{
    AuctionKey, Bands, JoinedSubmission, OfferTimestamp, ParticipantCategory, PriceSubmission,
    QuantitySubmission,
};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

/// Any submission that takes part in an auction.
pub trait BidRecord {
    fn auction_key(&self) -> AuctionKey;
    fn offer_timestamp(&self) -> OfferTimestamp;
    fn category(&self) -> Option<ParticipantCategory>;
}

/// A submission that carries quantity bands.
pub trait QuantityBands: BidRecord {
    fn quantities(&self) -> &Bands;
}

impl BidRecord for PriceSubmission {
    fn auction_key(&self) -> AuctionKey {
        PriceSubmission::auction_key(self)
    }

    fn offer_timestamp(&self) -> OfferTimestamp {
        self.offer_timestamp
    }

    fn category(&self) -> Option<ParticipantCategory> {
        self.category
    }
}

impl BidRecord for QuantitySubmission {
    fn auction_key(&self) -> AuctionKey {
        QuantitySubmission::auction_key(self)
    }

    fn offer_timestamp(&self) -> OfferTimestamp {
        self.offer_timestamp
    }

    fn category(&self) -> Option<ParticipantCategory> {
        self.category
    }
}

impl QuantityBands for QuantitySubmission {
    fn quantities(&self) -> &Bands {
        &self.quantities
    }
}

impl BidRecord for JoinedSubmission {
    fn auction_key(&self) -> AuctionKey {
        self.quantity.auction_key()
    }

    fn offer_timestamp(&self) -> OfferTimestamp {
        self.quantity.offer_timestamp
    }

    fn category(&self) -> Option<ParticipantCategory> {
        self.quantity.category
    }
}

impl QuantityBands for JoinedSubmission {
    fn quantities(&self) -> &Bands {
        &self.quantity.quantities
    }
}

/// Did any band change between two consecutive submissions?
///
/// Present values compare with strict inequality. Missing on both sides is
/// not a change; missing on one side only is.
pub fn bands_changed(prev: &[Option<f64>], curr: &[Option<f64>]) -> bool {
    prev.len() != curr.len()
        || prev.iter().zip(curr).any(|pair| match pair {
            (Some(a), Some(b)) => a != b,
            (None, None) => false,
            _ => true,
        })
}

/// Is `curr` a true rebid of the submission immediately before it?
pub fn is_true_rebid<R: QuantityBands + ?Sized>(prev: &R, curr: &R) -> bool {
    bands_changed(prev.quantities(), curr.quantities())
}

/// Classification of one resubmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RebidFlag {
    pub offer_timestamp: OfferTimestamp,
    /// Always true: every submission after the initial bid is a resubmission.
    pub is_resubmission: bool,
    pub is_true_rebid: bool,
}

/// Naive resubmission count of one auction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResubmissionCount {
    pub key: AuctionKey,
    pub category: Option<ParticipantCategory>,
    pub num_submissions: usize,
    pub num_resubmissions: usize,
}

/// True rebid classification of one auction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuctionRebids {
    pub key: AuctionKey,
    pub category: Option<ParticipantCategory>,
    /// Offer timestamp of the initial bid.
    pub initial_offer: OfferTimestamp,
    pub num_submissions: usize,
    pub num_resubmissions: usize,
    pub num_true_rebids: usize,
    /// One flag per resubmission, in timestamp order.
    pub flags: Vec<RebidFlag>,
}

impl AuctionRebids {
    /// Share of resubmissions that were true rebids, 0 without resubmissions.
    pub fn true_rebid_ratio(&self) -> f64 {
        if self.num_resubmissions > 0 {
            self.num_true_rebids as f64 / self.num_resubmissions as f64
        } else {
            0.0
        }
    }
}

/// Stable sort by offer timestamp.
pub fn sort_by_offer<R: BidRecord + ?Sized>(records: &mut [&R]) {
    records.sort_by_key(|r| r.offer_timestamp());
}

/// Group records into auctions, each sorted by offer timestamp.
///
/// Groups are never empty.
pub fn group_auctions<R: BidRecord>(records: &[R]) -> BTreeMap<AuctionKey, Vec<&R>> {
    let mut groups: BTreeMap<AuctionKey, Vec<&R>> = BTreeMap::new();
    for record in records {
        groups.entry(record.auction_key()).or_default().push(record);
    }
    for group in groups.values_mut() {
        sort_by_offer(group);
    }
    groups
}

/// Count resubmissions of one auction. `None` for an empty slice.
///
/// All records must belong to the same auction.
pub fn count_resubmissions<R: BidRecord>(records: &[&R]) -> Option<ResubmissionCount> {
    let first = records.first()?;
    debug_assert!(records.iter().all(|r| r.auction_key() == first.auction_key()));

    Some(ResubmissionCount {
        key: first.auction_key(),
        category: first.category(),
        num_submissions: records.len(),
        num_resubmissions: records.len() - 1,
    })
}

/// Classify one auction. `None` for an empty slice.
///
/// The records are put in timestamp order first, so the slice may come in
/// any order. All records must belong to the same auction.
pub fn classify_auction<R: QuantityBands>(records: &[&R]) -> Option<AuctionRebids> {
    let mut ordered: Vec<&R> = records.to_vec();
    sort_by_offer(&mut ordered);

    let first = *ordered.first()?;
    let key = first.auction_key();
    debug_assert!(ordered.iter().all(|r| r.auction_key() == key));

    let flags: Vec<RebidFlag> = ordered
        .windows(2)
        .map(|pair| RebidFlag {
            offer_timestamp: pair[1].offer_timestamp(),
            is_resubmission: true,
            is_true_rebid: is_true_rebid(pair[0], pair[1]),
        })
        .collect();
    let num_true_rebids = flags.iter().filter(|f| f.is_true_rebid).count();

    Some(AuctionRebids {
        key,
        category: first.category(),
        initial_offer: first.offer_timestamp(),
        num_submissions: ordered.len(),
        num_resubmissions: flags.len(),
        num_true_rebids,
        flags,
    })
}

/// Count resubmissions for every auction in a table.
pub fn count_all<R: BidRecord>(records: &[R]) -> Vec<ResubmissionCount> {
    group_auctions(records)
        .values()
        .filter_map(|group| count_resubmissions(group))
        .collect()
}

/// Classify every auction in a table, in auction key order.
///
/// Auctions are independent, so `parallel` spreads them over the rayon pool.
pub fn classify_all<R: QuantityBands + Sync>(records: &[R], parallel: bool) -> Vec<AuctionRebids> {
    let groups: Vec<Vec<&R>> = group_auctions(records).into_values().collect();
    debug!(auctions = groups.len(), parallel, "classifying auctions");

    if parallel {
        groups
            .par_iter()
            .map(|group| classify_auction(group))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    } else {
        groups
            .iter()
            .filter_map(|group| classify_auction(group))
            .collect()
    }
}

/// The initial bid and every true rebid of one auction, in timestamp order.
pub fn filter_true_rebids<'a, R: QuantityBands>(records: &[&'a R]) -> Vec<&'a R> {
    let mut ordered: Vec<&'a R> = records.to_vec();
    sort_by_offer(&mut ordered);

    let mut kept = Vec::with_capacity(ordered.len());
    if let Some(first) = ordered.first() {
        kept.push(*first);
    }
    kept.extend(
        ordered
            .windows(2)
            .filter(|pair| is_true_rebid(pair[0], pair[1]))
            .map(|pair| pair[1]),
    );
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use rebid_core::{ParticipantId, ProductId, EMPTY_BANDS};

    fn ts(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 10, 1)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn bands(values: &[f64]) -> Bands {
        let mut b = [Some(0.0); 10];
        for (slot, v) in b.iter_mut().zip(values) {
            *slot = Some(*v);
        }
        b
    }

    fn submission(duid: &str, period: u16, offer: NaiveDateTime, quantities: Bands) -> QuantitySubmission {
        QuantitySubmission {
            participant: ParticipantId::new(duid),
            product: ProductId::new("RAISEREG"),
            market_day: NaiveDate::from_ymd_opt(2025, 10, 1).unwrap(),
            dispatch_period: period,
            offer_timestamp: offer,
            direction: None,
            quantities,
            category: Some(ParticipantCategory::AutobidderStorage),
        }
    }

    fn auction_a() -> Vec<QuantitySubmission> {
        vec![
            submission("HPR1", 1, ts(9, 0), bands(&[10.0, 10.0])),
            submission("HPR1", 1, ts(9, 5), bands(&[10.0, 10.0])),
            submission("HPR1", 1, ts(9, 10), bands(&[15.0, 10.0])),
        ]
    }

    #[test]
    fn test_scenario_identical_then_changed() {
        let records = auction_a();
        let refs: Vec<&QuantitySubmission> = records.iter().collect();
        let result = classify_auction(&refs).unwrap();

        assert_eq!(result.num_submissions, 3);
        assert_eq!(result.num_resubmissions, 2);
        assert_eq!(result.num_true_rebids, 1);
        assert!(!result.flags[0].is_true_rebid);
        assert_eq!(result.flags[0].offer_timestamp, ts(9, 5));
        assert!(result.flags[1].is_true_rebid);
        assert!(result.flags.iter().all(|f| f.is_resubmission));
        assert!((result.true_rebid_ratio() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_uses_timestamp_order_not_input_order() {
        let records = vec![
            submission("HPR1", 1, ts(9, 0), bands(&[10.0])),
            submission("HPR1", 1, ts(9, 5), bands(&[15.0])),
            submission("HPR1", 1, ts(9, 10), bands(&[10.0])),
        ];
        // File order: 09:00, 09:10, 09:05.
        let refs = vec![&records[0], &records[2], &records[1]];
        let result = classify_auction(&refs).unwrap();

        assert_eq!(result.initial_offer, ts(9, 0));
        assert_eq!(result.num_true_rebids, 2);
        assert_eq!(result.flags[0].offer_timestamp, ts(9, 5));
        assert_eq!(result.flags[1].offer_timestamp, ts(9, 10));

        // Scanned in file order the same submissions show a single change.
        let in_file_order = refs
            .windows(2)
            .filter(|p| is_true_rebid(p[0], p[1]))
            .count();
        assert_eq!(in_file_order, 1);
    }

    #[test]
    fn test_single_submission() {
        let records = vec![submission("HPR1", 1, ts(9, 0), bands(&[10.0]))];
        let refs: Vec<&QuantitySubmission> = records.iter().collect();
        let result = classify_auction(&refs).unwrap();

        assert_eq!(result.num_resubmissions, 0);
        assert_eq!(result.num_true_rebids, 0);
        assert!(result.flags.is_empty());
        assert_eq!(result.true_rebid_ratio(), 0.0);
    }

    #[test]
    fn test_empty_auction_not_produced() {
        let refs: Vec<&QuantitySubmission> = Vec::new();
        assert!(classify_auction(&refs).is_none());
        assert!(count_resubmissions(&refs).is_none());
        assert!(classify_all::<QuantitySubmission>(&[], false).is_empty());
    }

    #[test]
    fn test_missing_value_rule() {
        let base = bands(&[10.0, 10.0]);
        let mut one_missing = base;
        one_missing[1] = None;
        assert!(bands_changed(&base, &one_missing));
        assert!(bands_changed(&one_missing, &base));
        assert!(!bands_changed(&EMPTY_BANDS, &EMPTY_BANDS));
        assert!(!bands_changed(&base, &base));
    }

    #[test]
    fn test_all_missing_auction_has_no_true_rebids() {
        let records = vec![
            submission("HPR1", 1, ts(9, 0), EMPTY_BANDS),
            submission("HPR1", 1, ts(9, 5), EMPTY_BANDS),
            submission("HPR1", 1, ts(9, 10), EMPTY_BANDS),
        ];
        let refs: Vec<&QuantitySubmission> = records.iter().collect();
        let result = classify_auction(&refs).unwrap();
        assert_eq!(result.num_resubmissions, 2);
        assert_eq!(result.num_true_rebids, 0);
    }

    #[test]
    fn test_equal_timestamps_keep_input_order() {
        let records = vec![
            submission("HPR1", 1, ts(9, 0), bands(&[10.0])),
            submission("HPR1", 1, ts(9, 5), bands(&[20.0])),
            submission("HPR1", 1, ts(9, 5), bands(&[20.0])),
        ];
        let refs: Vec<&QuantitySubmission> = records.iter().collect();
        let result = classify_auction(&refs).unwrap();
        assert_eq!(result.num_true_rebids, 1);
        assert!(result.flags[0].is_true_rebid);
        assert!(!result.flags[1].is_true_rebid);
    }

    #[test]
    fn test_idempotent_and_bounded() {
        let mut records = auction_a();
        records.push(submission("HPR1", 2, ts(9, 0), bands(&[1.0])));
        records.push(submission("HVWWBA1", 1, ts(8, 0), bands(&[1.0])));
        records.push(submission("HPR1", 2, ts(9, 30), bands(&[2.0])));

        let first = classify_all(&records, false);
        let second = classify_all(&records, true);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);

        for auction in &first {
            assert_eq!(auction.num_resubmissions, auction.num_submissions - 1);
            assert!(auction.num_true_rebids <= auction.num_resubmissions);
        }
    }

    #[test]
    fn test_group_auctions_by_period() {
        let records = vec![
            submission("HPR1", 2, ts(9, 5), bands(&[1.0])),
            submission("HPR1", 1, ts(9, 0), bands(&[1.0])),
            submission("HPR1", 2, ts(9, 0), bands(&[1.0])),
        ];
        let groups = group_auctions(&records);
        assert_eq!(groups.len(), 2);

        let period_two = groups.values().nth(1).unwrap();
        assert_eq!(period_two.len(), 2);
        assert_eq!(period_two[0].offer_timestamp, ts(9, 0));

        let counts = count_all(&records);
        assert_eq!(counts[0].num_resubmissions, 0);
        assert_eq!(counts[1].num_resubmissions, 1);
    }

    #[test]
    fn test_filter_true_rebids() {
        let records = auction_a();
        let refs = vec![&records[1], &records[2], &records[0]];
        let kept = filter_true_rebids(&refs);

        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].offer_timestamp, ts(9, 0));
        assert_eq!(kept[1].offer_timestamp, ts(9, 10));
    }
}
