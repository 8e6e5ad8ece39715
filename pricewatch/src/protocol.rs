//! Messages exchanged between the orchestrator and the page agent.
//!
//! Wire forms:
//! - `{"type":"PRICEWATCH_CAPTURE","store":"COLES","price":3.5,"unit_price":1.75}`
//! - `{"type":"PRICEWATCH_CAPTURE_FAIL","store":"COLES","reason":"no_price_found","url":"..."}`
//!
//! A capture that carries no price is always a failure, whatever else it carries.

use crate::job::Job;
use crate::session::SessionState;
use crate::store::StoreId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message type of a successful capture.
pub const CAPTURE: &str = "PRICEWATCH_CAPTURE";
/// Message type of a failed capture.
pub const CAPTURE_FAIL: &str = "PRICEWATCH_CAPTURE_FAIL";

/// Failure reason when every extraction attempt missed.
pub const NO_PRICE_FOUND: &str = "no_price_found";
/// Failure reason when the page never matched a store profile.
pub const UNSUPPORTED_PAGE: &str = "unsupported_page";
/// Failure reason when the page failed to load after dispatch.
pub const NAVIGATION_FAILED: &str = "navigation_failed";

/// Identifier of a browser tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub String);

impl TabId {
    /// Create a new tab id.
    pub fn new(id: impl Into<String>) -> Self {
        TabId(id.into())
    }

    /// The raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TabId {
    fn from(id: &str) -> Self {
        TabId(id.to_string())
    }
}

/// Ticket of a single navigation. The page agent for that page load echoes it back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NavigationId(pub u64);

impl fmt::Display for NavigationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "nav-{}", self.0)
    }
}

/// The outcome a page agent reports for one page load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCapture", into = "RawCapture")]
pub enum CaptureMessage {
    /// A price was found.
    Success {
        /// Store the page agent recognised.
        store: Option<StoreId>,
        /// Shelf price.
        price: Decimal,
        /// Unit price (per kg, per litre...).
        unit_price: Option<Decimal>,
        /// Price before a promotion.
        was_price: Option<Decimal>,
        /// Promotion label.
        promo_text: Option<String>,
    },
    /// No price could be extracted.
    Failure {
        /// Store the page agent recognised.
        store: Option<StoreId>,
        /// Short machine readable reason.
        reason: String,
        /// The page location at the time of failure.
        url: Option<String>,
    },
}

impl CaptureMessage {
    /// Build a capture from extracted values. A missing price yields a failure.
    pub fn from_values(
        store: Option<StoreId>,
        price: Option<Decimal>,
        unit_price: Option<Decimal>,
        was_price: Option<Decimal>,
        promo_text: Option<String>,
        url: Option<String>,
    ) -> Self {
        match price {
            Some(price) => CaptureMessage::Success {
                store,
                price,
                unit_price,
                was_price,
                promo_text,
            },
            None => CaptureMessage::failure(store, NO_PRICE_FOUND, url),
        }
    }

    /// Build a failure.
    pub fn failure(store: Option<StoreId>, reason: impl Into<String>, url: Option<String>) -> Self {
        CaptureMessage::Failure {
            store,
            reason: reason.into(),
            url,
        }
    }

    /// Is this a success.
    pub fn is_success(&self) -> bool {
        matches!(self, CaptureMessage::Success { .. })
    }

    /// The store the message names.
    pub fn store(&self) -> Option<StoreId> {
        match self {
            CaptureMessage::Success { store, .. } | CaptureMessage::Failure { store, .. } => *store,
        }
    }

    /// Normalise into a capture result, using `fallback_store` when the agent did not name one.
    pub fn into_result(self, fallback_store: StoreId) -> CaptureResult {
        match self {
            CaptureMessage::Success {
                store,
                price,
                unit_price,
                was_price,
                promo_text,
            } => CaptureResult {
                store_id: store.unwrap_or(fallback_store),
                price: Some(price),
                unit_price,
                was_price,
                promo_text,
                outcome: CaptureOutcome::Success,
            },
            CaptureMessage::Failure { store, reason, .. } => CaptureResult {
                store_id: store.unwrap_or(fallback_store),
                price: None,
                unit_price: None,
                was_price: None,
                promo_text: None,
                outcome: CaptureOutcome::Failure(reason),
            },
        }
    }
}

/// Wire form of a capture message. Every field is optional so untrusted input can be classified.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawCapture {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    store: Option<StoreId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    was_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    promo_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

impl TryFrom<RawCapture> for CaptureMessage {
    type Error = String;

    fn try_from(raw: RawCapture) -> Result<Self, Self::Error> {
        match raw.kind.as_str() {
            CAPTURE => Ok(CaptureMessage::from_values(
                raw.store,
                raw.price,
                raw.unit_price,
                raw.was_price,
                raw.promo_text,
                raw.url,
            )),
            CAPTURE_FAIL => Ok(CaptureMessage::failure(
                raw.store,
                raw.reason.unwrap_or_else(|| "unknown".into()),
                raw.url,
            )),
            other => Err(format!("unknown capture message type: {other}")),
        }
    }
}

impl From<CaptureMessage> for RawCapture {
    fn from(message: CaptureMessage) -> Self {
        match message {
            CaptureMessage::Success {
                store,
                price,
                unit_price,
                was_price,
                promo_text,
            } => RawCapture {
                kind: CAPTURE.into(),
                store,
                price: Some(price),
                unit_price,
                was_price,
                promo_text,
                ..Default::default()
            },
            CaptureMessage::Failure { store, reason, url } => RawCapture {
                kind: CAPTURE_FAIL.into(),
                store,
                reason: Some(reason),
                url,
                ..Default::default()
            },
        }
    }
}

/// A capture message together with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEnvelope {
    /// The tab that sent the message.
    pub sender: TabId,
    /// The navigation the page agent was started for, when known.
    pub navigation: Option<NavigationId>,
    /// The message.
    pub message: CaptureMessage,
}

impl CaptureEnvelope {
    /// Create a new envelope.
    pub fn new(sender: TabId, navigation: Option<NavigationId>, message: CaptureMessage) -> Self {
        Self {
            sender,
            navigation,
            message,
        }
    }
}

/// Outcome of a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CaptureOutcome {
    /// A price was captured.
    Success,
    /// Extraction failed with the reason.
    Failure(String),
}

/// A normalised capture for the current job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResult {
    /// The store of the capture.
    pub store_id: StoreId,
    /// Shelf price. Always set for a success.
    pub price: Option<Decimal>,
    /// Unit price.
    pub unit_price: Option<Decimal>,
    /// Price before a promotion.
    pub was_price: Option<Decimal>,
    /// Promotion label.
    pub promo_text: Option<String>,
    /// Success or failure.
    pub outcome: CaptureOutcome,
}

impl CaptureResult {
    /// Is the capture a success.
    pub fn is_success(&self) -> bool {
        self.outcome == CaptureOutcome::Success && self.price.is_some()
    }
}

/// Reply to a status query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Is a session running.
    pub running: bool,
    /// State of the session.
    pub state: SessionState,
    /// The job in flight.
    pub current_job: Option<Job>,
    /// The tab the session owns.
    pub owned_tab: Option<TabId>,
    /// The store set of the session.
    pub stores: Vec<StoreId>,
}
