//! Analyses over loaded bid records.
//!
//! This crate handles:
//! - True-rebid classification of auction submission sequences
//! - Bid curve reconstruction from (price, quantity) bands
//! - Summary statistics per category and product
//! - Price-band movement and variation
//! - The engine tying them together

pub mod classifier;
pub mod curve;
pub mod stats;
pub mod price_bands;
pub mod engine;

pub use classifier::{
    bands_changed, classify_all, classify_auction, count_all, count_resubmissions,
    filter_true_rebids, group_auctions, is_true_rebid, AuctionRebids, BidRecord, QuantityBands,
    RebidFlag, ResubmissionCount,
};
pub use curve::{auction_curves, AuctionCurves, BidCurve, CurveSegment, TimedCurve};
pub use stats::{average_of_unit_means, unit_profiles, RebidMetric, Summary, UnitProfile};
pub use price_bands::{
    band_statistics, band_variation, daily_bids, initial_bids, price_band_changes, PriceBandChange,
    UnitBandVariation,
};
pub use engine::{GroupSummary, RebidEngine, RebidReport};
