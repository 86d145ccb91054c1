//! Side-by-side quote comparison for a single RFQ.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::domain::{Currency, ProviderId, Quote, QuoteId, QuoteStatus};
use super::error::MarketplaceError;

/// Provider attributes the comparison needs, as supplied by the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub id: ProviderId,
    pub company_name: String,
    pub average_rating: Option<Decimal>,
    pub is_verified: bool,
}

impl ProviderSnapshot {
    /// Placeholder for providers the directory no longer knows about.
    pub fn unknown(id: ProviderId) -> Self {
        Self {
            company_name: id.0.clone(),
            id,
            average_rating: None,
            is_verified: false,
        }
    }
}

/// One quote paired with its provider, the unit of comparison input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonEntry {
    pub quote: Quote,
    pub provider: ProviderSnapshot,
}

/// Criteria on which a row holds the most favorable value. Ties mark every tied row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BestFlags {
    pub price: bool,
    pub rating: bool,
    pub verified: bool,
    pub warranty: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    pub quote_id: QuoteId,
    pub provider_id: ProviderId,
    pub company_name: String,
    pub status: QuoteStatus,
    pub price: Decimal,
    pub rating: Option<Decimal>,
    pub is_verified: bool,
    pub warranty_period_days: Option<u32>,
    pub estimated_start_date: Option<NaiveDate>,
    pub estimated_end_date: Option<NaiveDate>,
    pub estimated_duration_days: Option<u32>,
    pub valid_until: Option<DateTime<Utc>>,
    pub best: BestFlags,
}

impl ComparisonRow {
    pub fn rating_label(&self) -> String {
        match self.rating {
            Some(rating) => format!("{:.1}", rating),
            None => "Unrated".to_string(),
        }
    }

    pub fn warranty_label(&self) -> String {
        match self.warranty_period_days {
            Some(days) => format!("{days} days"),
            None => "-".to_string(),
        }
    }
}

/// Aggregate price figures. `None` means "no data", never zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct PriceStatistics {
    pub lowest: Option<Decimal>,
    pub highest: Option<Decimal>,
    pub average: Option<Decimal>,
}

impl PriceStatistics {
    pub fn is_defined(&self) -> bool {
        self.lowest.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonResult {
    pub currency: Option<Currency>,
    pub quote_count: usize,
    pub rows: Vec<ComparisonRow>,
    pub statistics: PriceStatistics,
}

/// Compare quotes for one RFQ. Pure and order-independent: rows come back sorted by quote id.
///
/// Fails with `DataIntegrity` when the quotes do not share one currency or their total does not
/// fit in a `Decimal`.
pub fn compare_quotes(entries: &[ComparisonEntry]) -> Result<ComparisonResult, MarketplaceError> {
    let currency = entries.first().map(|first| first.quote.currency.clone());

    if let Some(expected) = &currency {
        if let Some(mismatch) = entries
            .iter()
            .find(|entry| &entry.quote.currency != expected)
        {
            return Err(MarketplaceError::DataIntegrity(format!(
                "quote {} is priced in {} but the comparison set uses {expected}",
                mismatch.quote.id, mismatch.quote.currency
            )));
        }
    }

    let lowest = entries.iter().map(|entry| entry.quote.price).min();
    let highest = entries.iter().map(|entry| entry.quote.price).max();
    let best_rating = entries
        .iter()
        .filter_map(|entry| entry.provider.average_rating)
        .max();
    let best_warranty = entries
        .iter()
        .filter_map(|entry| entry.quote.warranty_period_days)
        .max();
    let average = if entries.is_empty() {
        None
    } else {
        let total = entries
            .iter()
            .try_fold(Decimal::ZERO, |total, entry| total.checked_add(entry.quote.price))
            .ok_or_else(|| {
                MarketplaceError::DataIntegrity(format!(
                    "quote prices in {} overflow the comparison total",
                    currency.as_ref().map_or("the comparison set", |code| code.as_str())
                ))
            })?;
        Some((total / Decimal::from(entries.len())).round_dp(2))
    };

    let mut rows: Vec<ComparisonRow> = entries
        .iter()
        .map(|entry| {
            let quote = &entry.quote;
            let provider = &entry.provider;
            let best = BestFlags {
                price: Some(quote.price) == lowest,
                rating: provider.average_rating.is_some() && provider.average_rating == best_rating,
                verified: provider.is_verified,
                warranty: quote.warranty_period_days.is_some()
                    && quote.warranty_period_days == best_warranty,
            };

            ComparisonRow {
                quote_id: quote.id.clone(),
                provider_id: quote.provider_id.clone(),
                company_name: provider.company_name.clone(),
                status: quote.status,
                price: quote.price,
                rating: provider.average_rating,
                is_verified: provider.is_verified,
                warranty_period_days: quote.warranty_period_days,
                estimated_start_date: quote.estimated_start_date,
                estimated_end_date: quote.estimated_end_date,
                estimated_duration_days: quote.estimated_duration_days,
                valid_until: quote.valid_until,
                best,
            }
        })
        .collect();
    rows.sort_by(|left, right| left.quote_id.cmp(&right.quote_id));

    Ok(ComparisonResult {
        currency,
        quote_count: rows.len(),
        rows,
        statistics: PriceStatistics {
            lowest,
            highest,
            average,
        },
    })
}
