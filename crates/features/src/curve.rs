//! Bid curve reconstruction.
//!
//! A submission's (price, quantity) bands become a step function over
//! cumulative quantity. Bands stay in submitted order: no price sorting, no
//! merging of equal prices and no clipping, so non-monotonic ladders render
//! exactly as declared.

use crate::classifier::{filter_true_rebids, group_auctions, sort_by_offer};
use rebid_core::{
    AuctionKey, Error, JoinedSubmission, OfferTimestamp, Result, SubmissionType,
};
use serde::Serialize;

/// One band of the step function, covering `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CurveSegment {
    /// Band number (1-based).
    pub band: usize,
    pub start: f64,
    pub end: f64,
    /// Declared price, kept even for zero-width bands.
    pub price: Option<f64>,
    /// Declared quantity, kept even when missing.
    pub quantity: Option<f64>,
}

impl CurveSegment {
    pub fn width(&self) -> f64 {
        self.end - self.start
    }

    pub fn is_zero_width(&self) -> bool {
        self.end == self.start
    }
}

/// Step function of one submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BidCurve {
    segments: Vec<CurveSegment>,
}

/// Width a band contributes. Missing, zero and invalid quantities are zero-width.
#[inline]
fn band_width(quantity: Option<f64>) -> f64 {
    match quantity {
        Some(q) if q.is_finite() && q > 0.0 => q,
        _ => 0.0,
    }
}

impl BidCurve {
    /// Build a curve from band-ordered prices and quantities of equal length.
    pub fn from_bands(prices: &[Option<f64>], quantities: &[Option<f64>]) -> Result<Self> {
        if prices.len() != quantities.len() {
            return Err(Error::data(format!(
                "{} price bands but {} quantity bands",
                prices.len(),
                quantities.len()
            )));
        }
        Ok(Self::build(prices, quantities))
    }

    /// Curve of a joined submission.
    pub fn from_joined(submission: &JoinedSubmission) -> Self {
        Self::build(&submission.prices, submission.quantities())
    }

    fn build(prices: &[Option<f64>], quantities: &[Option<f64>]) -> Self {
        let mut cumulative = 0.0;
        let segments = prices
            .iter()
            .zip(quantities)
            .enumerate()
            .map(|(i, (&price, &quantity))| {
                let start = cumulative;
                cumulative += band_width(quantity);
                CurveSegment {
                    band: i + 1,
                    start,
                    end: cumulative,
                    price,
                    quantity,
                }
            })
            .collect();
        Self { segments }
    }

    pub fn segments(&self) -> &[CurveSegment] {
        &self.segments
    }

    /// Condensed curve over the first `n` bands.
    pub fn leading_bands(&self, n: usize) -> Self {
        Self {
            segments: self.segments.iter().take(n).copied().collect(),
        }
    }

    /// Total offered quantity (end of the last segment).
    pub fn total_quantity(&self) -> f64 {
        self.segments.last().map(|s| s.end).unwrap_or(0.0)
    }

    /// Vertices of a post-step line: each segment's (start, price), then the
    /// last segment's end at the last price.
    pub fn step_points(&self) -> Vec<(f64, Option<f64>)> {
        let mut points: Vec<(f64, Option<f64>)> =
            self.segments.iter().map(|s| (s.start, s.price)).collect();
        if let Some(last) = self.segments.last() {
            points.push((last.end, last.price));
        }
        points
    }
}

/// Curve of one submission within an auction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedCurve {
    pub offer_timestamp: OfferTimestamp,
    pub submission_type: SubmissionType,
    /// Position within the auction (1 = initial bid), counted over all
    /// submissions rather than only the rendered ones.
    pub sequence: usize,
    pub curve: BidCurve,
}

/// Curves of one auction in timestamp order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuctionCurves {
    pub key: AuctionKey,
    pub curves: Vec<TimedCurve>,
}

/// Curves of every submission of one auction, in timestamp order.
///
/// With `true_rebids_only` only the initial bid and the true rebids are
/// kept. `bands` limits every curve to its leading bands.
pub fn auction_curves(
    records: &[&JoinedSubmission],
    true_rebids_only: bool,
    bands: usize,
) -> Vec<TimedCurve> {
    let mut ordered: Vec<&JoinedSubmission> = records.to_vec();
    sort_by_offer(&mut ordered);

    let selected: Vec<&JoinedSubmission> = if true_rebids_only {
        filter_true_rebids(&ordered)
    } else {
        ordered.clone()
    };

    selected
        .into_iter()
        .map(|submission| TimedCurve {
            offer_timestamp: submission.offer_timestamp(),
            submission_type: submission.submission_type.clone(),
            sequence: ordered
                .iter()
                .position(|r| std::ptr::eq(*r, submission))
                .map(|p| p + 1)
                .unwrap_or(0),
            curve: BidCurve::from_joined(submission).leading_bands(bands),
        })
        .collect()
}

/// Curves for every auction in a joined table, in auction key order.
pub fn all_auction_curves(
    records: &[JoinedSubmission],
    true_rebids_only: bool,
    bands: usize,
) -> Vec<AuctionCurves> {
    group_auctions(records)
        .into_iter()
        .map(|(key, group)| AuctionCurves {
            key,
            curves: auction_curves(&group, true_rebids_only, bands),
        })
        .collect()
}
