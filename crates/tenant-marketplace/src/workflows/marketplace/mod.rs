//! Service-provider marketplace: requests for quote, provider quotes, and award decisions.
//!
//! Managers draft an RFQ, invite providers, and send it. Invited providers answer with quotes
//! until the quote deadline passes. The manager compares the quotes side by side and accepts one,
//! which awards the RFQ and rejects the remaining open quotes in the same commit.

pub mod comparison;
pub mod deadline;
pub mod domain;
mod error;
pub mod lifecycle;
pub mod memory;
pub mod providers;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use comparison::{
    compare_quotes, BestFlags, ComparisonEntry, ComparisonResult, ComparisonRow, PriceStatistics,
    ProviderSnapshot,
};
pub use deadline::{DeadlinePolicy, DeadlineStatus};
pub use domain::{
    Currency, NewRfq, ProviderId, Quote, QuoteId, QuoteRevision, QuoteStatus, QuoteSubmission, Rfq,
    RfqChanges, RfqId, RfqStatus, ServiceCategory,
};
pub use error::MarketplaceError;
pub use memory::InMemoryMarketplaceRepository;
pub use providers::{
    DirectoryError, ProviderDirectory, ProviderImportError, ProviderProfile, ProviderRoster,
    ProviderRosterImporter,
};
pub use repository::{ChangeSet, MarketplaceRepository, RepositoryError, SweepReport};
pub use router::marketplace_router;
pub use service::{
    AwardOutcome, MarketplaceService, ProviderSummary, QuoteComparisonView, QuoteValidity,
    RfqQuery,
};
