use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{ProviderId, Quote, QuoteId, Rfq, RfqId};
use super::repository::{ChangeSet, MarketplaceRepository, RepositoryError};

#[derive(Debug, Default)]
struct Tables {
    rfqs: BTreeMap<RfqId, Rfq>,
    quotes: BTreeMap<QuoteId, Quote>,
}

impl Tables {
    fn verify(&self, changes: &ChangeSet) -> Result<(), RepositoryError> {
        if let Some(write) = &changes.rfq {
            let stored = self
                .rfqs
                .get(&write.record.id)
                .ok_or(RepositoryError::NotFound)?;
            if stored != &write.expected {
                return Err(stale(
                    "RFQ",
                    &stored.id.0,
                    stored.status.label(),
                    write.expected.status.label(),
                ));
            }
        }

        for write in &changes.quotes {
            let stored = self
                .quotes
                .get(&write.record.id)
                .ok_or(RepositoryError::NotFound)?;
            if stored != &write.expected {
                return Err(stale(
                    "quote",
                    &stored.id.0,
                    stored.status.label(),
                    write.expected.status.label(),
                ));
            }
        }

        for (index, quote) in changes.new_quotes.iter().enumerate() {
            if self.quotes.contains_key(&quote.id) {
                return Err(RepositoryError::Conflict(format!(
                    "quote {} already exists",
                    quote.id
                )));
            }
            let same_pair = |other: &Quote| {
                other.rfq_id == quote.rfq_id
                    && other.provider_id == quote.provider_id
                    && other.status.is_active()
            };
            let retired_in_batch = |stored: &Quote| {
                changes.quotes.iter().any(|write| {
                    write.record.id == stored.id && !write.record.status.is_active()
                })
            };
            let clashes_stored = self
                .quotes
                .values()
                .any(|stored| same_pair(stored) && !retired_in_batch(stored));
            let clashes_batch = changes.new_quotes[..index].iter().any(same_pair);
            if quote.status.is_active() && (clashes_stored || clashes_batch) {
                return Err(RepositoryError::Conflict(format!(
                    "provider {} already has an active quote on RFQ {}",
                    quote.provider_id, quote.rfq_id
                )));
            }
        }

        Ok(())
    }
}

fn stale(entity: &str, id: &str, stored: &str, expected: &str) -> RepositoryError {
    if stored == expected {
        RepositoryError::Conflict(format!("{entity} {id} was modified since it was read"))
    } else {
        RepositoryError::Conflict(format!("{entity} {id} is {stored}, expected {expected}"))
    }
}

/// Thread-safe in-memory repository; one lock guards both tables so change sets apply atomically.
#[derive(Debug, Default, Clone)]
pub struct InMemoryMarketplaceRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryMarketplaceRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, RepositoryError> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl MarketplaceRepository for InMemoryMarketplaceRepository {
    fn insert_rfq(&self, rfq: Rfq) -> Result<Rfq, RepositoryError> {
        let mut tables = self.lock()?;
        if tables.rfqs.contains_key(&rfq.id) {
            return Err(RepositoryError::Conflict(format!("RFQ {} already exists", rfq.id)));
        }
        tables.rfqs.insert(rfq.id.clone(), rfq.clone());
        Ok(rfq)
    }

    fn fetch_rfq(&self, id: &RfqId) -> Result<Option<Rfq>, RepositoryError> {
        Ok(self.lock()?.rfqs.get(id).cloned())
    }

    fn list_rfqs(&self) -> Result<Vec<Rfq>, RepositoryError> {
        Ok(self.lock()?.rfqs.values().cloned().collect())
    }

    fn fetch_quote(&self, id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Ok(self.lock()?.quotes.get(id).cloned())
    }

    fn quotes_for_rfq(&self, rfq_id: &RfqId) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self
            .lock()?
            .quotes
            .values()
            .filter(|quote| &quote.rfq_id == rfq_id)
            .cloned()
            .collect())
    }

    fn quotes_for_provider(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self
            .lock()?
            .quotes
            .values()
            .filter(|quote| &quote.provider_id == provider_id)
            .cloned()
            .collect())
    }

    fn list_quotes(&self) -> Result<Vec<Quote>, RepositoryError> {
        Ok(self.lock()?.quotes.values().cloned().collect())
    }

    fn commit(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        let mut tables = self.lock()?;
        tables.verify(&changes)?;

        let ChangeSet {
            rfq,
            quotes,
            new_quotes,
        } = changes;
        if let Some(write) = rfq {
            tables.rfqs.insert(write.record.id.clone(), write.record);
        }
        for write in quotes {
            tables.quotes.insert(write.record.id.clone(), write.record);
        }
        for quote in new_quotes {
            tables.quotes.insert(quote.id.clone(), quote);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::marketplace::domain::{
        Currency, NewRfq, QuoteStatus, QuoteSubmission, RfqStatus, ServiceCategory,
    };
    use crate::workflows::marketplace::lifecycle;
    use chrono::{TimeZone, Utc};
    use rust_decimal::Decimal;

    fn seeded() -> (InMemoryMarketplaceRepository, Rfq, Quote) {
        let now = Utc
            .with_ymd_and_hms(2025, 10, 6, 9, 0, 0)
            .single()
            .expect("valid timestamp");
        let input = NewRfq {
            building_id: None,
            title: "Gutter cleaning".to_string(),
            description: "Clear gutters on both wings".to_string(),
            service_category: ServiceCategory::Cleaning,
            scope_of_work: None,
            preferred_start_date: None,
            preferred_end_date: None,
            is_urgent: false,
            budget_min: None,
            budget_max: None,
            currency: None,
            quote_deadline: None,
            provider_ids: vec![ProviderId("prov-1".to_string())],
            site_visit_required: false,
        };
        let rfq = lifecycle::draft_rfq(RfqId("rfq-mem".to_string()), input, &Currency::eur(), now)
            .expect("draft builds");
        let rfq = lifecycle::send(&rfq, now).expect("sends");
        let quote = lifecycle::draft_quote(
            QuoteId("quote-mem-1".to_string()),
            &rfq,
            ProviderId("prov-1".to_string()),
            QuoteSubmission::priced(Decimal::from(300)),
            now,
        )
        .expect("quote builds");

        let repository = InMemoryMarketplaceRepository::default();
        repository.insert_rfq(rfq.clone()).expect("rfq stored");
        repository
            .commit(ChangeSet::new().insert_quote(quote.clone()))
            .expect("quote stored");
        (repository, rfq, quote)
    }

    #[test]
    fn stale_expectations_abort_the_whole_change_set() {
        let (repository, rfq, quote) = seeded();
        let mut cancelled = rfq.clone();
        cancelled.status = RfqStatus::Cancelled;
        let mut withdrawn = quote.clone();
        withdrawn.status = QuoteStatus::Withdrawn;
        let mut stale_rfq = rfq.clone();
        stale_rfq.status = RfqStatus::Draft;

        let result = repository.commit(
            ChangeSet::new()
                .update_quote(withdrawn, quote.clone())
                .update_rfq(cancelled, stale_rfq),
        );

        assert!(matches!(result, Err(RepositoryError::Conflict(_))));
        let stored = repository.fetch_quote(&quote.id).expect("fetch").expect("present");
        assert_eq!(stored.status, QuoteStatus::Submitted);
        let stored = repository.fetch_rfq(&rfq.id).expect("fetch").expect("present");
        assert_eq!(stored.status, RfqStatus::Sent);
    }

    #[test]
    fn second_active_quote_for_same_provider_conflicts() {
        let (repository, _, quote) = seeded();
        let mut duplicate = quote.clone();
        duplicate.id = QuoteId("quote-mem-2".to_string());

        assert!(matches!(
            repository.commit(ChangeSet::new().insert_quote(duplicate.clone())),
            Err(RepositoryError::Conflict(_))
        ));

        let mut withdrawn = quote.clone();
        withdrawn.status = QuoteStatus::Withdrawn;
        repository
            .commit(
                ChangeSet::new()
                    .update_quote(withdrawn, quote)
                    .insert_quote(duplicate),
            )
            .expect("replacement allowed once the old quote is withdrawn");
        assert_eq!(repository.list_quotes().expect("list").len(), 2);
    }

    #[test]
    fn unknown_records_are_not_found() {
        let (repository, rfq, _) = seeded();
        let mut ghost = rfq;
        ghost.id = RfqId("rfq-ghost".to_string());

        assert!(matches!(
            repository.commit(ChangeSet::new().update_rfq(ghost.clone(), ghost)),
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn edits_that_keep_the_status_still_conflict() {
        let (repository, _, quote) = seeded();
        let mut repriced = quote.clone();
        repriced.price = Decimal::from(280);
        let mut annotated = quote.clone();
        annotated.notes = Some("includes downpipes".to_string());

        repository
            .commit(ChangeSet::new().update_quote(repriced, quote.clone()))
            .expect("first edit applies");
        let result = repository.commit(ChangeSet::new().update_quote(annotated, quote.clone()));

        match result {
            Err(RepositoryError::Conflict(reason)) => assert!(reason.contains("modified")),
            other => panic!("expected conflict, got {other:?}"),
        }
        let stored = repository.fetch_quote(&quote.id).expect("fetch").expect("present");
        assert_eq!(stored.price, Decimal::from(280));
        assert_eq!(stored.notes, None);
    }
}
