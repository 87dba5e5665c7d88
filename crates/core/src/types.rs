//! Core data types for the rebid analysis workspace.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fixed-position bands in every bid ladder.
pub const BAND_COUNT: usize = 10;

/// Band values in band order. `None` marks a missing value.
pub type Bands = [Option<f64>; BAND_COUNT];

/// Offer timestamp (market local time, no zone).
pub type OfferTimestamp = NaiveDateTime;

/// Dispatch period index within a market day (1-based).
pub type DispatchPeriod = u16;

/// A band set with every value missing.
pub const EMPTY_BANDS: Bands = [None; BAND_COUNT];

macro_rules! string_id {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(ParticipantId, "Dispatchable unit identifier of a bidding participant.");
string_id!(ProductId, "Market product a participant bids into (energy or an FCAS service).");

/// Participant category derived from the classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ParticipantCategory {
    /// Storage resource running the target autobidder.
    AutobidderStorage,
    /// Storage resource bidding without the target autobidder.
    NonAutobidderStorage,
    /// Anything that is not a storage resource.
    NonStorage,
}

impl ParticipantCategory {
    /// Derive the category from the two classification flags.
    pub fn from_flags(is_storage: bool, uses_autobidder: bool) -> Self {
        match (is_storage, uses_autobidder) {
            (true, true) => ParticipantCategory::AutobidderStorage,
            (true, false) => ParticipantCategory::NonAutobidderStorage,
            (false, _) => ParticipantCategory::NonStorage,
        }
    }

    /// Human readable label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            ParticipantCategory::AutobidderStorage => "Autobidder Storage",
            ParticipantCategory::NonAutobidderStorage => "Non-Autobidder Storage",
            ParticipantCategory::NonStorage => "Non-Storage",
        }
    }
}

impl fmt::Display for ParticipantCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Label for an optional category, `"Unknown"` for untagged participants.
pub fn category_label(category: Option<ParticipantCategory>) -> &'static str {
    category.map(ParticipantCategory::label).unwrap_or("Unknown")
}

/// Submission type of a day-level price record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubmissionType {
    /// Initial daily bid.
    Daily,
    /// Intraday resubmission.
    Rebid,
    /// Any other entry type, kept verbatim.
    Other(String),
}

impl SubmissionType {
    /// Parse the raw entry type field (case-insensitive).
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("DAILY") {
            SubmissionType::Daily
        } else if trimmed.eq_ignore_ascii_case("REBID") {
            SubmissionType::Rebid
        } else {
            SubmissionType::Other(trimmed.to_string())
        }
    }

    /// Is this the initial daily bid?
    pub fn is_daily(&self) -> bool {
        matches!(self, SubmissionType::Daily)
    }
}

impl fmt::Display for SubmissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionType::Daily => f.write_str("DAILY"),
            SubmissionType::Rebid => f.write_str("REBID"),
            SubmissionType::Other(raw) => f.write_str(raw),
        }
    }
}

/// Identity of an auction: the unit over which rebids are sequenced.
///
/// Day-level auctions have no dispatch period; period-level auctions do.
/// Ordering is total so grouped outputs come out in a stable order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuctionKey {
    pub participant: ParticipantId,
    pub product: ProductId,
    pub market_day: NaiveDate,
    pub dispatch_period: Option<DispatchPeriod>,
}

impl AuctionKey {
    /// Key of a day-level auction.
    pub fn day_level(participant: ParticipantId, product: ProductId, market_day: NaiveDate) -> Self {
        Self {
            participant,
            product,
            market_day,
            dispatch_period: None,
        }
    }

    /// Key of a period-level auction.
    pub fn period_level(
        participant: ParticipantId,
        product: ProductId,
        market_day: NaiveDate,
        dispatch_period: DispatchPeriod,
    ) -> Self {
        Self {
            participant,
            product,
            market_day,
            dispatch_period: Some(dispatch_period),
        }
    }
}

impl fmt::Display for AuctionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.participant, self.product, self.market_day)?;
        if let Some(period) = self.dispatch_period {
            write!(f, "/p{}", period)?;
        }
        Ok(())
    }
}

/// Key shared by price and quantity records, used to join them.
///
/// Bidirectional units file separate generation and load offers at the same
/// timestamp, told apart only by direction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OfferKey {
    pub participant: ParticipantId,
    pub product: ProductId,
    pub market_day: NaiveDate,
    pub offer_timestamp: OfferTimestamp,
    pub direction: Option<String>,
}

/// Day-level price bands as submitted at one offer timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSubmission {
    pub participant: ParticipantId,
    pub product: ProductId,
    pub market_day: NaiveDate,
    pub offer_timestamp: OfferTimestamp,
    pub submission_type: SubmissionType,
    /// Offer direction (`GEN`/`LOAD`) when the table carries one.
    pub direction: Option<String>,
    /// Price per band ($/MWh), may be negative.
    pub prices: Bands,
    /// `None` when the participant is not in the classification table.
    pub category: Option<ParticipantCategory>,
}

impl PriceSubmission {
    /// Day-level auction this submission belongs to.
    pub fn auction_key(&self) -> AuctionKey {
        AuctionKey::day_level(self.participant.clone(), self.product.clone(), self.market_day)
    }

    /// Key used to match period-level quantity records.
    pub fn offer_key(&self) -> OfferKey {
        OfferKey {
            participant: self.participant.clone(),
            product: self.product.clone(),
            market_day: self.market_day,
            offer_timestamp: self.offer_timestamp,
            direction: self.direction.clone(),
        }
    }
}

/// Period-level quantity bands as submitted at one offer timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantitySubmission {
    pub participant: ParticipantId,
    pub product: ProductId,
    pub market_day: NaiveDate,
    pub dispatch_period: DispatchPeriod,
    pub offer_timestamp: OfferTimestamp,
    /// Offer direction (`GEN`/`LOAD`) when the table carries one.
    pub direction: Option<String>,
    /// Available quantity per band (MW), never negative.
    pub quantities: Bands,
    /// `None` when the participant is not in the classification table.
    pub category: Option<ParticipantCategory>,
}

impl QuantitySubmission {
    /// Period-level auction this submission belongs to.
    pub fn auction_key(&self) -> AuctionKey {
        AuctionKey::period_level(
            self.participant.clone(),
            self.product.clone(),
            self.market_day,
            self.dispatch_period,
        )
    }

    /// Key used to find the matching day-level price record.
    pub fn offer_key(&self) -> OfferKey {
        OfferKey {
            participant: self.participant.clone(),
            product: self.product.clone(),
            market_day: self.market_day,
            offer_timestamp: self.offer_timestamp,
            direction: self.direction.clone(),
        }
    }
}

/// A quantity submission together with the price bands filed at the same
/// offer timestamp. This is the full ten-band (price, quantity) ladder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedSubmission {
    pub quantity: QuantitySubmission,
    pub submission_type: SubmissionType,
    pub prices: Bands,
}

impl JoinedSubmission {
    #[inline]
    pub fn quantities(&self) -> &Bands {
        &self.quantity.quantities
    }

    #[inline]
    pub fn offer_timestamp(&self) -> OfferTimestamp {
        self.quantity.offer_timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 10, d).unwrap()
    }

    #[test]
    fn test_category_from_flags() {
        assert_eq!(
            ParticipantCategory::from_flags(true, true),
            ParticipantCategory::AutobidderStorage
        );
        assert_eq!(
            ParticipantCategory::from_flags(true, false),
            ParticipantCategory::NonAutobidderStorage
        );
        assert_eq!(
            ParticipantCategory::from_flags(false, true),
            ParticipantCategory::NonStorage
        );
        assert_eq!(
            ParticipantCategory::from_flags(false, false),
            ParticipantCategory::NonStorage
        );
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(category_label(None), "Unknown");
        assert_eq!(
            category_label(Some(ParticipantCategory::AutobidderStorage)),
            "Autobidder Storage"
        );
    }

    #[test]
    fn test_submission_type_parse() {
        assert_eq!(SubmissionType::parse("DAILY"), SubmissionType::Daily);
        assert_eq!(SubmissionType::parse(" rebid "), SubmissionType::Rebid);
        assert_eq!(
            SubmissionType::parse("MNSP"),
            SubmissionType::Other("MNSP".to_string())
        );
        assert!(SubmissionType::Daily.is_daily());
        assert_eq!(SubmissionType::parse("rebid").to_string(), "REBID");
        assert_eq!(SubmissionType::parse("MNSP").to_string(), "MNSP");
    }

    #[test]
    fn test_auction_key_ordering() {
        let a = AuctionKey::period_level("HPR1".into(), "RAISEREG".into(), day(1), 2);
        let b = AuctionKey::period_level("HPR1".into(), "RAISEREG".into(), day(1), 10);
        let c = AuctionKey::period_level("HPR1".into(), "RAISEREG".into(), day(2), 1);
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a.to_string(), "HPR1/RAISEREG/2025-10-01/p2");
    }
}
