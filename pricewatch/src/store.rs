//! Supported retailers and the store-mode selection.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// A supported retailer.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreId {
    /// Woolworths supermarkets.
    Woolworths,
    /// Coles supermarkets.
    Coles,
    /// Aldi supermarkets.
    Aldi,
}

impl StoreId {
    /// All supported stores.
    pub fn all() -> Vec<StoreId> {
        StoreId::iter().collect()
    }

    /// Product search URL for the store. Used to locate product links by hand.
    pub fn search_url(&self, query: &str) -> String {
        let q: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();

        match self {
            StoreId::Woolworths => format!(
                "https://www.woolworths.com.au/shop/search/products?searchTerm={q}"
            ),
            StoreId::Coles => format!("https://www.coles.com.au/search?q={q}"),
            StoreId::Aldi => format!("https://www.aldi.com.au/en/search/?q={q}"),
        }
    }
}

/// Parse a comma separated store list like `"WOOLWORTHS,coles"`.
/// Empty segments are skipped and order is kept.
pub fn parse_store_list(value: &str) -> Result<Vec<StoreId>, strum::ParseError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(StoreId::from_str)
        .collect()
}

/// Join stores into the comma separated form the collection service expects.
pub fn join_stores(stores: &[StoreId]) -> String {
    stores
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(",")
}

/// Which stores a capture run targets, in order.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreMode {
    #[default]
    /// Woolworths only.
    Woolworths,
    /// Coles only.
    Coles,
    /// Aldi only.
    Aldi,
    /// Woolworths, then Coles.
    SeqWc,
    /// Coles, then Woolworths.
    SeqCw,
}

impl StoreMode {
    /// The ordered store set for the mode.
    pub fn stores(&self) -> Vec<StoreId> {
        match self {
            StoreMode::Woolworths => vec![StoreId::Woolworths],
            StoreMode::Coles => vec![StoreId::Coles],
            StoreMode::Aldi => vec![StoreId::Aldi],
            StoreMode::SeqWc => vec![StoreId::Woolworths, StoreId::Coles],
            StoreMode::SeqCw => vec![StoreId::Coles, StoreId::Woolworths],
        }
    }
}
