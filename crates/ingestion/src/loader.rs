//! Bid record loader.
//!
//! Turns raw price-band and quantity-band tables into typed submissions,
//! tagged with the participant category, and joins the two streams on the
//! shared (participant, product, market day, offer timestamp) key.

use crate::parse::{coerce_number, parse_market_day, parse_period, parse_timestamp, Coerced};
use crate::participants::ParticipantTable;
use crate::source::{cell, RawTable, TableSource};
use rebid_core::config::{ColumnConfig, LoaderConfig, UnknownParticipantPolicy};
use rebid_core::{
    Bands, Config, Error, JoinedSubmission, OfferKey, ParticipantCategory, ParticipantId,
    PriceSubmission, ProductId, QuantitySubmission, Result, SubmissionType, BAND_COUNT,
    EMPTY_BANDS,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};

/// Counts describing what a load kept, dropped and coerced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadDiagnostics {
    /// Data rows seen.
    pub rows_read: usize,
    /// Submissions produced.
    pub loaded: usize,
    /// Rows of participants on the exclusion list.
    pub excluded_participants: usize,
    /// Rows of participants outside the selection.
    pub unselected_participants: usize,
    /// Rows of products rejected by the product filter.
    pub filtered_products: usize,
    /// Rows whose participant is not in the classification table
    /// (dropped or tagged, per policy).
    pub unmatched_participants: usize,
    /// Band cells that could not be parsed and were read as missing.
    pub malformed_values: usize,
    /// Negative quantity cells read as missing.
    pub negative_quantities: usize,
    /// Rows dropped because a key field could not be parsed.
    pub malformed_keys: usize,
}

impl LoadDiagnostics {
    /// Rows that did not become submissions.
    pub fn dropped(&self) -> usize {
        self.rows_read - self.loaded
    }

    fn log(&self, what: &str) {
        info!(
            table = what,
            rows = self.rows_read,
            loaded = self.loaded,
            excluded = self.excluded_participants,
            filtered_products = self.filtered_products,
            "loaded bid records"
        );
        if self.unmatched_participants > 0 {
            warn!(
                table = what,
                count = self.unmatched_participants,
                "records without a participant classification"
            );
        }
        if self.malformed_values + self.negative_quantities > 0 {
            warn!(
                table = what,
                malformed = self.malformed_values,
                negative = self.negative_quantities,
                "band values coerced to missing"
            );
        }
        if self.malformed_keys > 0 {
            warn!(table = what, count = self.malformed_keys, "rows dropped for unparseable keys");
        }
    }
}

/// Typed records with their load diagnostics.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub diagnostics: LoadDiagnostics,
}

/// Counts describing the price/quantity join.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JoinDiagnostics {
    /// Joined submissions produced.
    pub joined: usize,
    /// Quantity submissions with no price submission at the same offer.
    pub unjoined_quantities: usize,
    /// Price submissions no quantity submission refers to.
    pub unjoined_prices: usize,
    /// Price submissions repeating an offer key already seen (first one wins).
    pub duplicate_prices: usize,
}

/// Joined (price, quantity) ladders with join diagnostics.
#[derive(Debug, Clone)]
pub struct Joined {
    pub records: Vec<JoinedSubmission>,
    pub diagnostics: JoinDiagnostics,
}

/// Both record streams of one load.
#[derive(Debug, Clone)]
pub struct LoadedBids {
    pub prices: Loaded<PriceSubmission>,
    pub quantities: Loaded<QuantitySubmission>,
}

impl LoadedBids {
    /// Join the two streams into full ladders.
    pub fn join(&self) -> Joined {
        BidLoader::join(&self.prices.records, &self.quantities.records)
    }
}

/// Read both sources (one scoped read each) and load them.
pub fn load_bids(
    config: &Config,
    participants: &ParticipantTable,
    prices: impl TableSource,
    quantities: impl TableSource,
) -> Result<LoadedBids> {
    let loader = BidLoader::new(config, participants);
    let prices = loader.load_prices(&prices.read_table()?)?;
    let quantities = loader.load_quantities(&quantities.read_table()?)?;
    Ok(LoadedBids { prices, quantities })
}

/// Loader over one configuration and participant table.
pub struct BidLoader<'a> {
    loader: &'a LoaderConfig,
    columns: &'a ColumnConfig,
    participants: &'a ParticipantTable,
}

impl<'a> BidLoader<'a> {
    pub fn new(config: &'a Config, participants: &'a ParticipantTable) -> Self {
        Self {
            loader: &config.loader,
            columns: &config.columns,
            participants,
        }
    }

    /// Load day-level price submissions.
    pub fn load_prices(&self, table: &RawTable) -> Result<Loaded<PriceSubmission>> {
        let cols = &self.columns.price;
        let participant_col = table.require_column(&cols.participant)?;
        let product_col = table.require_column(&cols.product)?;
        let day_col = table.require_column(&cols.market_day)?;
        let offer_col = table.require_column(&cols.offer_timestamp)?;
        let type_col = table.require_column(&cols.submission_type)?;
        let direction_col = optional_column(table, cols.direction.as_deref());
        let band_cols = band_columns(table, &cols.band_prefix)?;

        let mut diag = LoadDiagnostics::default();
        let mut records = Vec::with_capacity(table.len());

        for (i, row) in table.rows().enumerate() {
            diag.rows_read += 1;
            let participant = cell(row, participant_col);
            let product = cell(row, product_col);
            if participant.is_empty() || product.is_empty() {
                self.reject_key(&mut diag, i, "participant/product", participant)?;
                continue;
            }
            let Some(category) = self.admit(participant, product, &mut diag) else {
                continue;
            };
            let Some(market_day) = parse_market_day(cell(row, day_col)) else {
                self.reject_key(&mut diag, i, &cols.market_day, cell(row, day_col))?;
                continue;
            };
            let Some(offer_timestamp) = parse_timestamp(cell(row, offer_col)) else {
                self.reject_key(&mut diag, i, &cols.offer_timestamp, cell(row, offer_col))?;
                continue;
            };

            records.push(PriceSubmission {
                participant: ParticipantId::new(participant),
                product: ProductId::new(product),
                market_day,
                offer_timestamp,
                submission_type: SubmissionType::parse(cell(row, type_col)),
                direction: direction(row, direction_col),
                prices: parse_bands(row, &band_cols, false, &mut diag),
                category,
            });
        }

        diag.loaded = records.len();
        diag.log("price");
        Ok(Loaded { records, diagnostics: diag })
    }

    /// Load period-level quantity submissions.
    pub fn load_quantities(&self, table: &RawTable) -> Result<Loaded<QuantitySubmission>> {
        let cols = &self.columns.quantity;
        let participant_col = table.require_column(&cols.participant)?;
        let product_col = table.require_column(&cols.product)?;
        let day_col = table.require_column(&cols.market_day)?;
        let period_col = table.require_column(&cols.dispatch_period)?;
        let offer_col = table.require_column(&cols.offer_timestamp)?;
        let direction_col = optional_column(table, cols.direction.as_deref());
        let band_cols = band_columns(table, &cols.band_prefix)?;

        let mut diag = LoadDiagnostics::default();
        let mut records = Vec::with_capacity(table.len());

        for (i, row) in table.rows().enumerate() {
            diag.rows_read += 1;
            let participant = cell(row, participant_col);
            let product = cell(row, product_col);
            if participant.is_empty() || product.is_empty() {
                self.reject_key(&mut diag, i, "participant/product", participant)?;
                continue;
            }
            let Some(category) = self.admit(participant, product, &mut diag) else {
                continue;
            };
            let Some(market_day) = parse_market_day(cell(row, day_col)) else {
                self.reject_key(&mut diag, i, &cols.market_day, cell(row, day_col))?;
                continue;
            };
            let Some(dispatch_period) = parse_period(cell(row, period_col)) else {
                self.reject_key(&mut diag, i, &cols.dispatch_period, cell(row, period_col))?;
                continue;
            };
            let Some(offer_timestamp) = parse_timestamp(cell(row, offer_col)) else {
                self.reject_key(&mut diag, i, &cols.offer_timestamp, cell(row, offer_col))?;
                continue;
            };

            records.push(QuantitySubmission {
                participant: ParticipantId::new(participant),
                product: ProductId::new(product),
                market_day,
                dispatch_period,
                offer_timestamp,
                direction: direction(row, direction_col),
                quantities: parse_bands(row, &band_cols, true, &mut diag),
                category,
            });
        }

        diag.loaded = records.len();
        diag.log("quantity");
        Ok(Loaded { records, diagnostics: diag })
    }

    /// Join quantity submissions to the price submission filed at the same
    /// offer. Unmatched records on either side are dropped and counted.
    pub fn join(prices: &[PriceSubmission], quantities: &[QuantitySubmission]) -> Joined {
        let mut diag = JoinDiagnostics::default();

        let mut by_offer: HashMap<OfferKey, &PriceSubmission> = HashMap::with_capacity(prices.len());
        for price in prices {
            if by_offer.contains_key(&price.offer_key()) {
                diag.duplicate_prices += 1;
            } else {
                by_offer.insert(price.offer_key(), price);
            }
        }

        let mut used: HashSet<OfferKey> = HashSet::with_capacity(by_offer.len());
        let mut records = Vec::with_capacity(quantities.len());
        for quantity in quantities {
            let key = quantity.offer_key();
            match by_offer.get(&key) {
                Some(price) => {
                    records.push(JoinedSubmission {
                        quantity: quantity.clone(),
                        submission_type: price.submission_type.clone(),
                        prices: price.prices,
                    });
                    used.insert(key);
                }
                None => diag.unjoined_quantities += 1,
            }
        }

        diag.joined = records.len();
        diag.unjoined_prices = by_offer.len() - used.len();

        info!(joined = diag.joined, "joined price and quantity bands");
        if diag.unjoined_quantities + diag.unjoined_prices + diag.duplicate_prices > 0 {
            warn!(
                unjoined_quantities = diag.unjoined_quantities,
                unjoined_prices = diag.unjoined_prices,
                duplicate_prices = diag.duplicate_prices,
                "records dropped by the price/quantity join"
            );
        }

        Joined { records, diagnostics: diag }
    }

    /// Apply participant and product filters.
    ///
    /// Returns `None` to drop the row, otherwise the (possibly unknown) category.
    fn admit(
        &self,
        participant: &str,
        product: &str,
        diag: &mut LoadDiagnostics,
    ) -> Option<Option<ParticipantCategory>> {
        if self.loader.is_excluded_participant(participant) {
            diag.excluded_participants += 1;
            return None;
        }
        if !self.loader.is_selected_participant(participant) {
            diag.unselected_participants += 1;
            return None;
        }
        if !self.loader.accepts_product(product) {
            diag.filtered_products += 1;
            return None;
        }

        match self.participants.category_of(participant) {
            Some(category) => Some(Some(category)),
            None => {
                diag.unmatched_participants += 1;
                match self.loader.unknown_participants {
                    UnknownParticipantPolicy::Drop => None,
                    UnknownParticipantPolicy::Tag => Some(None),
                }
            }
        }
    }

    /// Handle an unparseable key field: fail in strict mode, count otherwise.
    fn reject_key(
        &self,
        diag: &mut LoadDiagnostics,
        row: usize,
        field: &str,
        raw: &str,
    ) -> Result<()> {
        if self.loader.strict_keys {
            return Err(Error::data(format!(
                "row {}: unparseable {} value {:?}",
                row + 1,
                field,
                raw
            )));
        }
        diag.malformed_keys += 1;
        Ok(())
    }
}

/// Index of a column that may be absent from the table.
fn optional_column(table: &RawTable, name: Option<&str>) -> Option<usize> {
    name.and_then(|n| table.column_index(n))
}

/// Direction cell, upper-cased; `None` when absent or empty.
fn direction(row: &[String], col: Option<usize>) -> Option<String> {
    let raw = cell(row, col?);
    (!raw.is_empty()).then(|| raw.to_ascii_uppercase())
}

/// Column indices of `{prefix}1` .. `{prefix}10`.
fn band_columns(table: &RawTable, prefix: &str) -> Result<[usize; BAND_COUNT]> {
    let mut indices = [0usize; BAND_COUNT];
    for (band, slot) in indices.iter_mut().enumerate() {
        *slot = table.require_column(&format!("{}{}", prefix.trim(), band + 1))?;
    }
    Ok(indices)
}

fn parse_bands(
    row: &[String],
    band_cols: &[usize; BAND_COUNT],
    non_negative: bool,
    diag: &mut LoadDiagnostics,
) -> Bands {
    let mut bands = EMPTY_BANDS;
    for (slot, &col) in bands.iter_mut().zip(band_cols) {
        *slot = match coerce_number(cell(row, col)) {
            Coerced::Present(v) if non_negative && v < 0.0 => {
                diag.negative_quantities += 1;
                None
            }
            Coerced::Malformed => {
                diag.malformed_values += 1;
                None
            }
            other => other.value(),
        };
    }
    bands
}
