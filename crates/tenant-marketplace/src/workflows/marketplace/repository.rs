use serde::Serialize;

use super::domain::{ProviderId, Quote, QuoteId, Rfq, RfqId};

/// A record write guarded by the copy of the record the writer last observed.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardedWrite<T> {
    pub record: T,
    pub expected: T,
}

/// Unit of work applied atomically by [`MarketplaceRepository::commit`].
///
/// Every guarded write is a compare-and-swap on the whole record: if the stored record differs
/// from `expected` in any field, nothing in the set is written and the commit fails with
/// [`RepositoryError::Conflict`]. Two edits that leave the status alone still cannot overwrite
/// each other. New quotes must not collide with an active quote from the same
/// provider on the same RFQ.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    pub rfq: Option<GuardedWrite<Rfq>>,
    pub quotes: Vec<GuardedWrite<Quote>>,
    pub new_quotes: Vec<Quote>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update_rfq(mut self, record: Rfq, expected: Rfq) -> Self {
        self.rfq = Some(GuardedWrite { record, expected });
        self
    }

    pub fn update_quote(mut self, record: Quote, expected: Quote) -> Self {
        self.quotes.push(GuardedWrite { record, expected });
        self
    }

    pub fn insert_quote(mut self, record: Quote) -> Self {
        self.new_quotes.push(record);
        self
    }
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait MarketplaceRepository: Send + Sync {
    fn insert_rfq(&self, rfq: Rfq) -> Result<Rfq, RepositoryError>;
    fn fetch_rfq(&self, id: &RfqId) -> Result<Option<Rfq>, RepositoryError>;
    fn list_rfqs(&self) -> Result<Vec<Rfq>, RepositoryError>;
    fn fetch_quote(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError>;
    fn quotes_for_rfq(&self, rfq_id: &RfqId) -> Result<Vec<Quote>, RepositoryError>;
    fn quotes_for_provider(&self, provider_id: &ProviderId)
        -> Result<Vec<Quote>, RepositoryError>;
    fn list_quotes(&self) -> Result<Vec<Quote>, RepositoryError>;
    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a sweep pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_rfq_ids: Vec<RfqId>,
    pub expired_quote_ids: Vec<QuoteId>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_rfq_ids.is_empty() && self.expired_quote_ids.is_empty()
    }
}
