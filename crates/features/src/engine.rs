//! Rebid analysis engine.
//!
//! Runs every analysis over one load and collects the results into a report.

use crate::{
    classifier::{classify_all, count_all, AuctionRebids, ResubmissionCount},
    curve::{all_auction_curves, AuctionCurves},
    stats::{
        average_of_unit_means, summarize_by, summarize_metric, unit_profiles, RebidMetric, Summary,
        UnitProfile,
    },
};
use rebid_core::{Config, JoinedSubmission, ParticipantCategory, ProductId};
use rebid_ingestion::{LoadDiagnostics, LoadedBids};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// Summary of one group of auctions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub category: Option<ParticipantCategory>,
    /// `None` for summaries across all products.
    pub product: Option<ProductId>,
    pub summary: Summary,
}

fn by_category(map: BTreeMap<Option<ParticipantCategory>, Summary>) -> Vec<GroupSummary> {
    map.into_iter()
        .map(|(category, summary)| GroupSummary {
            category,
            product: None,
            summary,
        })
        .collect()
}

fn by_category_product(
    map: BTreeMap<(Option<ParticipantCategory>, ProductId), Summary>,
) -> Vec<GroupSummary> {
    map.into_iter()
        .map(|((category, product), summary)| GroupSummary {
            category,
            product: Some(product),
            summary,
        })
        .collect()
}

/// Everything one run produces.
#[derive(Debug, Clone, Serialize)]
pub struct RebidReport {
    /// Naive resubmission counts per day-level auction.
    pub day_auctions: Vec<ResubmissionCount>,
    /// True-rebid classification per period-level auction.
    pub period_auctions: Vec<AuctionRebids>,
    /// Day-level resubmissions per category.
    pub resubmissions_by_category: Vec<GroupSummary>,
    /// Day-level resubmissions per (category, product).
    pub resubmissions_by_product: Vec<GroupSummary>,
    /// Period-level true rebids per category.
    pub true_rebids_by_category: Vec<GroupSummary>,
    /// Period-level true rebids per (category, product).
    pub true_rebids_by_product: Vec<GroupSummary>,
    pub unit_profiles: Vec<UnitProfile>,
    /// Per (category, product) spread of the per-unit mean true rebids,
    /// each unit weighted once.
    pub unit_mean_true_rebids: Vec<GroupSummary>,
    pub price_diagnostics: LoadDiagnostics,
    pub quantity_diagnostics: LoadDiagnostics,
}

impl RebidReport {
    /// Total true rebids across all period-level auctions.
    pub fn total_true_rebids(&self) -> usize {
        self.period_auctions.iter().map(|a| a.num_true_rebids).sum()
    }

    /// Total resubmissions across all period-level auctions.
    pub fn total_period_resubmissions(&self) -> usize {
        self.period_auctions.iter().map(|a| a.num_resubmissions).sum()
    }
}

/// Rebid analysis engine.
pub struct RebidEngine {
    parallel: bool,
    true_rebids_only_curves: bool,
    curve_bands: usize,
}

impl RebidEngine {
    /// Create a new engine from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            parallel: config.analysis.parallel,
            true_rebids_only_curves: config.analysis.true_rebids_only_curves,
            curve_bands: config.analysis.curve_bands,
        }
    }

    /// Classify every auction and summarize the results.
    pub fn run(&self, bids: &LoadedBids) -> RebidReport {
        let day_auctions = count_all(&bids.prices.records);
        let period_auctions = classify_all(&bids.quantities.records, self.parallel);

        let resubmissions_by_category = by_category(summarize_by(
            &day_auctions,
            |a| a.category,
            |a| a.num_resubmissions as f64,
        ));
        let resubmissions_by_product = by_category_product(summarize_by(
            &day_auctions,
            |a| (a.category, a.key.product.clone()),
            |a| a.num_resubmissions as f64,
        ));
        let true_rebids_by_category = by_category(summarize_metric(
            &period_auctions,
            RebidMetric::TrueRebids,
            |a| a.category,
        ));
        let true_rebids_by_product = by_category_product(summarize_metric(
            &period_auctions,
            RebidMetric::TrueRebids,
            |a| (a.category, a.key.product.clone()),
        ));
        let unit_profiles = unit_profiles(&period_auctions);
        let unit_mean_true_rebids = by_category_product(average_of_unit_means(&unit_profiles));

        let report = RebidReport {
            day_auctions,
            period_auctions,
            resubmissions_by_category,
            resubmissions_by_product,
            true_rebids_by_category,
            true_rebids_by_product,
            unit_profiles,
            unit_mean_true_rebids,
            price_diagnostics: bids.prices.diagnostics.clone(),
            quantity_diagnostics: bids.quantities.diagnostics.clone(),
        };

        info!(
            day_auctions = report.day_auctions.len(),
            period_auctions = report.period_auctions.len(),
            resubmissions = report.total_period_resubmissions(),
            true_rebids = report.total_true_rebids(),
            "rebid analysis complete"
        );
        report
    }

    /// Bid curves of every auction in a joined table.
    pub fn curves(&self, joined: &[JoinedSubmission]) -> Vec<AuctionCurves> {
        all_auction_curves(joined, self.true_rebids_only_curves, self.curve_bands)
    }
}
