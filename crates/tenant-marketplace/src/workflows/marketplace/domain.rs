use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for requests for quote.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RfqId(pub String);

/// Identifier wrapper for provider quotes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct QuoteId(pub String);

/// Identifier wrapper for service providers listed in the directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

impl fmt::Display for RfqId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for QuoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Three-letter upper-case currency code (e.g. `EUR`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("currency code '{0}' must be three ASCII letters")]
pub struct InvalidCurrency(pub String);

impl Currency {
    pub fn parse(raw: &str) -> Result<Self, InvalidCurrency> {
        let trimmed = raw.trim();
        if trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(InvalidCurrency(raw.to_string()))
        }
    }

    pub fn eur() -> Self {
        Self("EUR".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = InvalidCurrency;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    Plumbing,
    Electrical,
    Hvac,
    Cleaning,
    Landscaping,
    Security,
    Painting,
    Roofing,
    Carpentry,
    Locksmith,
    PestControl,
    GeneralMaintenance,
    ElevatorMaintenance,
    FireSafety,
    WasteManagement,
    Other,
}

impl ServiceCategory {
    pub const fn ordered() -> [Self; 16] {
        [
            Self::Plumbing,
            Self::Electrical,
            Self::Hvac,
            Self::Cleaning,
            Self::Landscaping,
            Self::Security,
            Self::Painting,
            Self::Roofing,
            Self::Carpentry,
            Self::Locksmith,
            Self::PestControl,
            Self::GeneralMaintenance,
            Self::ElevatorMaintenance,
            Self::FireSafety,
            Self::WasteManagement,
            Self::Other,
        ]
    }

    pub const fn key(self) -> &'static str {
        match self {
            Self::Plumbing => "plumbing",
            Self::Electrical => "electrical",
            Self::Hvac => "hvac",
            Self::Cleaning => "cleaning",
            Self::Landscaping => "landscaping",
            Self::Security => "security",
            Self::Painting => "painting",
            Self::Roofing => "roofing",
            Self::Carpentry => "carpentry",
            Self::Locksmith => "locksmith",
            Self::PestControl => "pest_control",
            Self::GeneralMaintenance => "general_maintenance",
            Self::ElevatorMaintenance => "elevator_maintenance",
            Self::FireSafety => "fire_safety",
            Self::WasteManagement => "waste_management",
            Self::Other => "other",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Plumbing => "Plumbing",
            Self::Electrical => "Electrical",
            Self::Hvac => "HVAC",
            Self::Cleaning => "Cleaning",
            Self::Landscaping => "Landscaping",
            Self::Security => "Security",
            Self::Painting => "Painting",
            Self::Roofing => "Roofing",
            Self::Carpentry => "Carpentry",
            Self::Locksmith => "Locksmith",
            Self::PestControl => "Pest Control",
            Self::GeneralMaintenance => "General Maintenance",
            Self::ElevatorMaintenance => "Elevator Maintenance",
            Self::FireSafety => "Fire Safety",
            Self::WasteManagement => "Waste Management",
            Self::Other => "Other",
        }
    }

    /// Looks up a category by its snake_case key, ignoring case and surrounding whitespace.
    pub fn from_key(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ordered()
            .into_iter()
            .find(|category| category.key() == normalized)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqStatus {
    Draft,
    Sent,
    QuotesReceived,
    Awarded,
    Cancelled,
    Expired,
}

impl RfqStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RfqStatus::Draft => "draft",
            RfqStatus::Sent => "sent",
            RfqStatus::QuotesReceived => "quotes_received",
            RfqStatus::Awarded => "awarded",
            RfqStatus::Cancelled => "cancelled",
            RfqStatus::Expired => "expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            RfqStatus::Awarded | RfqStatus::Cancelled | RfqStatus::Expired
        )
    }

    /// Statuses in which providers may still respond.
    pub const fn accepts_quotes(self) -> bool {
        matches!(self, RfqStatus::Sent | RfqStatus::QuotesReceived)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Pending,
    Submitted,
    Accepted,
    Rejected,
    Withdrawn,
    Expired,
}

impl QuoteStatus {
    pub const fn label(self) -> &'static str {
        match self {
            QuoteStatus::Pending => "pending",
            QuoteStatus::Submitted => "submitted",
            QuoteStatus::Accepted => "accepted",
            QuoteStatus::Rejected => "rejected",
            QuoteStatus::Withdrawn => "withdrawn",
            QuoteStatus::Expired => "expired",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !self.is_open()
    }

    /// Still awaiting a manager decision.
    pub const fn is_open(self) -> bool {
        matches!(self, QuoteStatus::Pending | QuoteStatus::Submitted)
    }

    /// Counts toward the one-active-quote-per-provider rule.
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            QuoteStatus::Pending | QuoteStatus::Submitted | QuoteStatus::Accepted
        )
    }

    /// Live offers that belong in a quote comparison. At most one per provider and RFQ.
    pub const fn is_comparable(self) -> bool {
        matches!(self, QuoteStatus::Submitted | QuoteStatus::Accepted)
    }
}

/// Request for quote as stored by the marketplace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rfq {
    pub id: RfqId,
    pub building_id: Option<String>,
    pub title: String,
    pub description: String,
    pub service_category: ServiceCategory,
    pub scope_of_work: Option<String>,
    pub preferred_start_date: Option<NaiveDate>,
    pub preferred_end_date: Option<NaiveDate>,
    pub is_urgent: bool,
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    pub currency: Currency,
    pub status: RfqStatus,
    pub quote_deadline: Option<DateTime<Utc>>,
    pub invited_provider_ids: BTreeSet<ProviderId>,
    pub site_visit_required: bool,
    pub awarded_quote_id: Option<QuoteId>,
    pub awarded_to: Option<ProviderId>,
    pub awarded_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Rfq {
    pub fn is_invited(&self, provider_id: &ProviderId) -> bool {
        self.invited_provider_ids.contains(provider_id)
    }
}

/// Manager input for a new draft RFQ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRfq {
    #[serde(default)]
    pub building_id: Option<String>,
    pub title: String,
    pub description: String,
    pub service_category: ServiceCategory,
    #[serde(default)]
    pub scope_of_work: Option<String>,
    #[serde(default)]
    pub preferred_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub preferred_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_urgent: bool,
    #[serde(default)]
    pub budget_min: Option<Decimal>,
    #[serde(default)]
    pub budget_max: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub quote_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provider_ids: Vec<ProviderId>,
    #[serde(default)]
    pub site_visit_required: bool,
}

/// Draft edits; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RfqChanges {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub scope_of_work: Option<String>,
    #[serde(default)]
    pub preferred_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub preferred_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_urgent: Option<bool>,
    #[serde(default)]
    pub budget_min: Option<Decimal>,
    #[serde(default)]
    pub budget_max: Option<Decimal>,
    #[serde(default)]
    pub quote_deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub site_visit_required: Option<bool>,
}

/// Quote submitted by a provider against one RFQ.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub id: QuoteId,
    pub rfq_id: RfqId,
    pub provider_id: ProviderId,
    pub price: Decimal,
    pub currency: Currency,
    pub estimated_start_date: Option<NaiveDate>,
    pub estimated_end_date: Option<NaiveDate>,
    pub estimated_duration_days: Option<u32>,
    pub warranty_period_days: Option<u32>,
    pub payment_terms: Option<String>,
    pub terms_and_conditions: Option<String>,
    pub notes: Option<String>,
    pub status: QuoteStatus,
    pub valid_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Provider input for a new quote. `currency` defaults to the RFQ currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteSubmission {
    pub price: Decimal,
    #[serde(default)]
    pub currency: Option<Currency>,
    #[serde(default)]
    pub estimated_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_duration_days: Option<u32>,
    #[serde(default)]
    pub warranty_period_days: Option<u32>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub terms_and_conditions: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    /// Keep the quote as `pending` instead of submitting it right away.
    #[serde(default)]
    pub save_as_pending: bool,
}

impl QuoteSubmission {
    pub fn priced(price: Decimal) -> Self {
        Self {
            price,
            currency: None,
            estimated_start_date: None,
            estimated_end_date: None,
            estimated_duration_days: None,
            warranty_period_days: None,
            payment_terms: None,
            terms_and_conditions: None,
            notes: None,
            valid_until: None,
            save_as_pending: false,
        }
    }
}

/// Provider edits to an open quote; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteRevision {
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub estimated_start_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_end_date: Option<NaiveDate>,
    #[serde(default)]
    pub estimated_duration_days: Option<u32>,
    #[serde(default)]
    pub warranty_period_days: Option<u32>,
    #[serde(default)]
    pub payment_terms: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
}
