//! Configuration structures for the rebid analysis workspace.

use crate::error::{Error, Result};
use crate::types::BAND_COUNT;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Loader filtering and join policy.
    pub loader: LoaderConfig,
    /// Column names of the input tables.
    pub columns: ColumnConfig,
    /// Analysis options.
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load a configuration from a JSON file. Missing sections fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    pub fn validate(&self) -> Result<()> {
        self.columns.validate()?;

        let bands = self.analysis.curve_bands;
        if bands == 0 || bands > BAND_COUNT {
            return Err(Error::config(format!(
                "analysis.curve_bands must be within 1..={}, got {}",
                BAND_COUNT, bands
            )));
        }

        if let Some(include) = &self.loader.include_products {
            if let Some(p) = include.iter().find(|p| self.loader.exclude_products.contains(p)) {
                return Err(Error::config(format!(
                    "product {} is both included and excluded",
                    p
                )));
            }
        }

        Ok(())
    }
}

/// What to do with records whose participant is missing from the
/// classification table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownParticipantPolicy {
    /// Drop the record and count it.
    Drop,
    /// Keep the record with no category and count it.
    Tag,
}

/// Loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Participants removed from every category (synthetic or aggregator units).
    pub excluded_participants: Vec<String>,
    /// Restrict loading to these participants (single-unit extracts).
    pub participants: Option<Vec<String>>,
    /// Allow-list of products. `None` accepts every product not excluded.
    pub include_products: Option<Vec<String>>,
    /// Deny-list of products.
    pub exclude_products: Vec<String>,
    /// Unknown participant handling.
    pub unknown_participants: UnknownParticipantPolicy,
    /// Fail on unparseable key fields instead of dropping the row.
    pub strict_keys: bool,
    /// Table name of the price records in multi-record files.
    pub price_table: Option<String>,
    /// Table name of the quantity records in multi-record files.
    pub quantity_table: Option<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            excluded_participants: vec!["VSSEL1V1".to_string()],
            participants: None,
            include_products: None,
            exclude_products: vec!["ENERGY".to_string()],
            unknown_participants: UnknownParticipantPolicy::Drop,
            strict_keys: true,
            price_table: Some("BIDDAYOFFER".to_string()),
            quantity_table: Some("BIDOFFERPERIOD".to_string()),
        }
    }
}

impl LoaderConfig {
    /// Is the participant on the exclusion list?
    pub fn is_excluded_participant(&self, participant: &str) -> bool {
        self.excluded_participants.iter().any(|p| p == participant)
    }

    /// Is the participant selected (always true without a selection)?
    pub fn is_selected_participant(&self, participant: &str) -> bool {
        match &self.participants {
            Some(selected) => selected.iter().any(|p| p == participant),
            None => true,
        }
    }

    /// Does the product pass the include/exclude filter?
    pub fn accepts_product(&self, product: &str) -> bool {
        if self.exclude_products.iter().any(|p| p == product) {
            return false;
        }
        match &self.include_products {
            Some(include) => include.iter().any(|p| p == product),
            None => true,
        }
    }
}

/// Column names of all input tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    pub price: PriceColumns,
    pub quantity: QuantityColumns,
    pub participants: ParticipantColumns,
}

impl ColumnConfig {
    fn validate(&self) -> Result<()> {
        let names = [
            ("price.participant", &self.price.participant),
            ("price.product", &self.price.product),
            ("price.market_day", &self.price.market_day),
            ("price.offer_timestamp", &self.price.offer_timestamp),
            ("price.submission_type", &self.price.submission_type),
            ("price.band_prefix", &self.price.band_prefix),
            ("quantity.participant", &self.quantity.participant),
            ("quantity.product", &self.quantity.product),
            ("quantity.market_day", &self.quantity.market_day),
            ("quantity.dispatch_period", &self.quantity.dispatch_period),
            ("quantity.offer_timestamp", &self.quantity.offer_timestamp),
            ("quantity.band_prefix", &self.quantity.band_prefix),
            ("participants.participant", &self.participants.participant),
            ("participants.dispatch_type", &self.participants.dispatch_type),
            ("participants.autobidder", &self.participants.autobidder),
            ("participants.name", &self.participants.name),
        ];
        for (field, value) in names {
            if value.trim().is_empty() {
                return Err(Error::config(format!("columns.{} must not be empty", field)));
            }
        }
        Ok(())
    }
}

/// Columns of the day-level price band table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceColumns {
    pub participant: String,
    pub product: String,
    pub market_day: String,
    pub offer_timestamp: String,
    pub submission_type: String,
    /// Optional offer direction column, part of the join key when present.
    pub direction: Option<String>,
    /// Band columns are `{band_prefix}1` .. `{band_prefix}10`.
    pub band_prefix: String,
}

impl Default for PriceColumns {
    fn default() -> Self {
        Self {
            participant: "DUID".to_string(),
            product: "BIDTYPE".to_string(),
            market_day: "SETTLEMENTDATE".to_string(),
            offer_timestamp: "OFFERDATE".to_string(),
            submission_type: "ENTRYTYPE".to_string(),
            direction: Some("DIRECTION".to_string()),
            band_prefix: "PRICEBAND".to_string(),
        }
    }
}

/// Columns of the period-level quantity band table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantityColumns {
    pub participant: String,
    pub product: String,
    pub market_day: String,
    pub dispatch_period: String,
    pub offer_timestamp: String,
    /// Optional offer direction column, part of the join key when present.
    pub direction: Option<String>,
    pub band_prefix: String,
}

impl Default for QuantityColumns {
    fn default() -> Self {
        Self {
            participant: "DUID".to_string(),
            product: "BIDTYPE".to_string(),
            market_day: "TRADINGDATE".to_string(),
            dispatch_period: "PERIODID".to_string(),
            offer_timestamp: "OFFERDATETIME".to_string(),
            direction: Some("DIRECTION".to_string()),
            band_prefix: "BANDAVAIL".to_string(),
        }
    }
}

/// Columns of the participant classification table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantColumns {
    pub participant: String,
    pub dispatch_type: String,
    pub autobidder: String,
    pub name: String,
    /// Dispatch type value that marks a storage resource.
    pub storage_dispatch_type: String,
}

impl Default for ParticipantColumns {
    fn default() -> Self {
        Self {
            participant: "DUID".to_string(),
            dispatch_type: "DISPATCHTYPE".to_string(),
            autobidder: "TESLA_AUTOBIDDER".to_string(),
            name: "PARTICIPANT_NAME".to_string(),
            storage_dispatch_type: "BIDIRECTIONAL".to_string(),
        }
    }
}

/// Analysis configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Classify auctions on the rayon pool.
    pub parallel: bool,
    /// Only reconstruct curves for the initial bid and true rebids.
    pub true_rebids_only_curves: bool,
    /// Number of leading bands rendered in curves (condensed view below 10).
    pub curve_bands: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            parallel: true,
            true_rebids_only_curves: true,
            curve_bands: BAND_COUNT,
        }
    }
}
