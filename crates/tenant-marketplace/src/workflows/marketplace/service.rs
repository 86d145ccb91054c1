use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::comparison::{compare_quotes, ComparisonEntry, ComparisonResult, ProviderSnapshot};
use super::deadline::{DeadlinePolicy, DeadlineStatus};
use super::domain::{
    NewRfq, ProviderId, Quote, QuoteId, QuoteRevision, QuoteStatus, QuoteSubmission, Rfq,
    RfqChanges, RfqId, RfqStatus, ServiceCategory,
};
use super::error::MarketplaceError;
use super::lifecycle::{self, QuoteEvent};
use super::providers::ProviderDirectory;
use super::repository::{ChangeSet, MarketplaceRepository, RepositoryError, SweepReport};
use crate::config::MarketplaceConfig;

static RFQ_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static QUOTE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_rfq_id() -> RfqId {
    let id = RFQ_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RfqId(format!("rfq-{id:06}"))
}

fn next_quote_id() -> QuoteId {
    let id = QUOTE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    QuoteId(format!("quote-{id:06}"))
}

/// Filters accepted by [`MarketplaceService::list_rfqs`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RfqQuery {
    #[serde(default)]
    pub status: Option<RfqStatus>,
    #[serde(default)]
    pub service_category: Option<ServiceCategory>,
    #[serde(default)]
    pub is_urgent: Option<bool>,
}

impl RfqQuery {
    fn matches(&self, rfq: &Rfq) -> bool {
        self.status.map_or(true, |status| rfq.status == status)
            && self
                .service_category
                .map_or(true, |category| rfq.service_category == category)
            && self.is_urgent.map_or(true, |urgent| rfq.is_urgent == urgent)
    }
}

/// Result of accepting a quote: the awarded RFQ and every quote it holds afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AwardOutcome {
    pub rfq: Rfq,
    pub quotes: Vec<Quote>,
}

impl AwardOutcome {
    pub fn accepted(&self) -> Option<&Quote> {
        self.quotes
            .iter()
            .find(|quote| quote.status == QuoteStatus::Accepted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuoteValidity {
    pub quote_id: QuoteId,
    pub validity: DeadlineStatus,
    pub label: String,
}

/// Comparison table for one RFQ plus the validity standing of each row at the requested instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteComparisonView {
    pub rfq_id: RfqId,
    pub rfq_status: RfqStatus,
    pub comparison: ComparisonResult,
    pub validity: Vec<QuoteValidity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderSummary {
    pub provider_id: ProviderId,
    pub pending_invitations: usize,
    pub active_quotes: usize,
    pub won_quotes: usize,
    pub total_submitted: usize,
    /// Won over decided (accepted + rejected), two decimals; zero until something is decided.
    pub win_rate: Decimal,
}

/// Facade composing the lifecycle engine, comparison engine, repository, and provider directory.
pub struct MarketplaceService<R, D> {
    repository: Arc<R>,
    directory: Arc<D>,
    config: MarketplaceConfig,
    deadlines: DeadlinePolicy,
}

impl<R, D> MarketplaceService<R, D>
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    pub fn new(repository: Arc<R>, directory: Arc<D>, config: MarketplaceConfig) -> Self {
        let deadlines = DeadlinePolicy::new(config.urgent_within_days);
        Self {
            repository,
            directory,
            config,
            deadlines,
        }
    }

    pub fn config(&self) -> &MarketplaceConfig {
        &self.config
    }

    pub fn create_rfq(&self, input: NewRfq, now: DateTime<Utc>) -> Result<Rfq, MarketplaceError> {
        let rfq = lifecycle::draft_rfq(next_rfq_id(), input, &self.config.default_currency, now)
            .map_err(|err| rejected("create_rfq", "new RFQ", err))?;
        let stored = self.repository.insert_rfq(rfq)?;
        info!(
            rfq_id = %stored.id,
            category = stored.service_category.key(),
            invitees = stored.invited_provider_ids.len(),
            "RFQ drafted"
        );
        Ok(stored)
    }

    pub fn update_rfq(
        &self,
        rfq_id: &RfqId,
        changes: RfqChanges,
        now: DateTime<Utc>,
    ) -> Result<Rfq, MarketplaceError> {
        let rfq = self.load_rfq(rfq_id)?;
        let next = lifecycle::edit_draft(&rfq, changes, now)
            .map_err(|err| rejected("update_rfq", &rfq_id.0, err))?;
        self.commit(ChangeSet::new().update_rfq(next.clone(), rfq))?;
        info!(rfq_id = %next.id, "RFQ draft updated");
        Ok(next)
    }

    pub fn invite_providers(
        &self,
        rfq_id: &RfqId,
        providers: Vec<ProviderId>,
        now: DateTime<Utc>,
    ) -> Result<Rfq, MarketplaceError> {
        let rfq = self.load_rfq(rfq_id)?;
        let next = lifecycle::invite(&rfq, providers, now)
            .map_err(|err| rejected("invite_providers", &rfq_id.0, err))?;
        self.commit(ChangeSet::new().update_rfq(next.clone(), rfq))?;
        info!(
            rfq_id = %next.id,
            invitees = next.invited_provider_ids.len(),
            "RFQ invitees updated"
        );
        Ok(next)
    }

    pub fn remove_invitee(
        &self,
        rfq_id: &RfqId,
        provider_id: &ProviderId,
        now: DateTime<Utc>,
    ) -> Result<Rfq, MarketplaceError> {
        let rfq = self.load_rfq(rfq_id)?;
        let next = lifecycle::uninvite(&rfq, provider_id, now)
            .map_err(|err| rejected("remove_invitee", &rfq_id.0, err))?;
        self.commit(ChangeSet::new().update_rfq(next.clone(), rfq))?;
        info!(rfq_id = %next.id, provider_id = %provider_id, "RFQ invitee removed");
        Ok(next)
    }

    pub fn send_rfq(&self, rfq_id: &RfqId, now: DateTime<Utc>) -> Result<Rfq, MarketplaceError> {
        let rfq = self.load_rfq(rfq_id)?;
        let next =
            lifecycle::send(&rfq, now).map_err(|err| rejected("send_rfq", &rfq_id.0, err))?;
        self.commit(ChangeSet::new().update_rfq(next.clone(), rfq))?;
        info!(
            rfq_id = %next.id,
            invitees = next.invited_provider_ids.len(),
            "RFQ sent to providers"
        );
        Ok(next)
    }

    pub fn cancel_rfq(&self, rfq_id: &RfqId, now: DateTime<Utc>) -> Result<Rfq, MarketplaceError> {
        let rfq = self.load_rfq(rfq_id)?;
        let next =
            lifecycle::cancel(&rfq, now).map_err(|err| rejected("cancel_rfq", &rfq_id.0, err))?;
        let from = rfq.status;
        self.commit(ChangeSet::new().update_rfq(next.clone(), rfq))?;
        info!(rfq_id = %next.id, from = from.label(), "RFQ cancelled");
        Ok(next)
    }

    /// Record a provider's quote. The RFQ write is guarded on the record as read so a quote never
    /// lands on an RFQ that was awarded, cancelled, or expired in the meantime.
    pub fn submit_quote(
        &self,
        rfq_id: &RfqId,
        provider_id: &ProviderId,
        submission: QuoteSubmission,
        now: DateTime<Utc>,
    ) -> Result<Quote, MarketplaceError> {
        let rfq = self.load_rfq(rfq_id)?;
        lifecycle::ensure_open_for_quotes(&rfq, provider_id, now)
            .map_err(|err| rejected("submit_quote", &rfq_id.0, err))?;

        if let Some(existing) = self
            .repository
            .quotes_for_rfq(rfq_id)?
            .into_iter()
            .find(|quote| &quote.provider_id == provider_id && quote.status.is_active())
        {
            return Err(rejected(
                "submit_quote",
                &rfq_id.0,
                MarketplaceError::InvalidState(format!(
                    "provider {provider_id} already holds {} quote {} on RFQ {rfq_id}",
                    existing.status.label(),
                    existing.id
                )),
            ));
        }

        let quote =
            lifecycle::draft_quote(next_quote_id(), &rfq, provider_id.clone(), submission, now)
                .map_err(|err| rejected("submit_quote", &rfq_id.0, err))?;

        let rfq_after = if quote.status == QuoteStatus::Submitted {
            lifecycle::note_quote_received(&rfq, now)?.unwrap_or_else(|| rfq.clone())
        } else {
            rfq.clone()
        };
        self.commit(
            ChangeSet::new()
                .update_rfq(rfq_after, rfq)
                .insert_quote(quote.clone()),
        )?;

        info!(
            rfq_id = %rfq_id,
            quote_id = %quote.id,
            provider_id = %provider_id,
            status = quote.status.label(),
            price = %quote.price,
            "quote recorded"
        );
        Ok(quote)
    }

    /// Move a pending quote to `submitted`.
    pub fn finalize_quote(
        &self,
        quote_id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<Quote, MarketplaceError> {
        let quote = self.load_quote(quote_id)?;
        let rfq = self.load_rfq(&quote.rfq_id)?;
        lifecycle::ensure_open_for_quotes(&rfq, &quote.provider_id, now)
            .map_err(|err| rejected("finalize_quote", &quote_id.0, err))?;
        let submitted = lifecycle::transition_quote(&quote, QuoteEvent::Submit, now)
            .map_err(|err| rejected("finalize_quote", &quote_id.0, err))?;
        let rfq_after = lifecycle::note_quote_received(&rfq, now)?.unwrap_or_else(|| rfq.clone());

        self.commit(
            ChangeSet::new()
                .update_rfq(rfq_after, rfq)
                .update_quote(submitted.clone(), quote.clone()),
        )?;
        info!(quote_id = %quote_id, rfq_id = %quote.rfq_id, "quote submitted");
        Ok(submitted)
    }

    /// Re-price or amend an open quote. Allowed only while the RFQ still takes quotes.
    pub fn revise_quote(
        &self,
        quote_id: &QuoteId,
        revision: QuoteRevision,
        now: DateTime<Utc>,
    ) -> Result<Quote, MarketplaceError> {
        let quote = self.load_quote(quote_id)?;
        let next = lifecycle::revise(&quote, revision, now)
            .map_err(|err| rejected("revise_quote", &quote_id.0, err))?;
        let rfq = self.load_rfq(&quote.rfq_id)?;
        lifecycle::ensure_open_for_quotes(&rfq, &quote.provider_id, now)
            .map_err(|err| rejected("revise_quote", &quote_id.0, err))?;

        // The unchanged RFQ rides along so a cancel or award in between fails the commit.
        self.commit(
            ChangeSet::new()
                .update_rfq(rfq.clone(), rfq)
                .update_quote(next.clone(), quote),
        )?;
        info!(quote_id = %quote_id, price = %next.price, "quote revised");
        Ok(next)
    }

    /// Accept one quote, award its RFQ, and reject every other open quote in a single commit.
    ///
    /// A concurrent accept on the same RFQ loses the compare-and-swap and reports `InvalidState`.
    pub fn accept_quote(
        &self,
        quote_id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<AwardOutcome, MarketplaceError> {
        let quote = self.load_quote(quote_id)?;
        let rfq = self.load_rfq(&quote.rfq_id)?;
        let siblings = self.repository.quotes_for_rfq(&rfq.id)?;

        let plan = lifecycle::plan_award(&rfq, &quote, &siblings, now)
            .map_err(|err| rejected("accept_quote", &quote_id.0, err))?;

        let observed: BTreeMap<&QuoteId, &Quote> = siblings
            .iter()
            .map(|sibling| (&sibling.id, sibling))
            .collect();
        let mut changes = ChangeSet::new()
            .update_rfq(plan.rfq.clone(), rfq.clone())
            .update_quote(plan.accepted.clone(), quote.clone());
        for rejected_quote in &plan.rejected {
            let expected = observed.get(&rejected_quote.id).ok_or_else(|| {
                MarketplaceError::DataIntegrity(format!(
                    "quote {} is not on RFQ {}",
                    rejected_quote.id, rfq.id
                ))
            })?;
            changes = changes.update_quote(rejected_quote.clone(), (*expected).clone());
        }
        self.commit(changes)
            .map_err(|err| rejected("accept_quote", &quote_id.0, err))?;

        info!(
            rfq_id = %plan.rfq.id,
            quote_id = %quote_id,
            provider_id = %plan.accepted.provider_id,
            rejected = plan.rejected.len(),
            "quote accepted and RFQ awarded"
        );

        let mut updated: BTreeMap<QuoteId, Quote> = siblings
            .into_iter()
            .map(|sibling| (sibling.id.clone(), sibling))
            .collect();
        for changed in std::iter::once(plan.accepted).chain(plan.rejected) {
            updated.insert(changed.id.clone(), changed);
        }

        Ok(AwardOutcome {
            rfq: plan.rfq,
            quotes: updated.into_values().collect(),
        })
    }

    pub fn reject_quote(
        &self,
        quote_id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<Quote, MarketplaceError> {
        self.close_quote(quote_id, QuoteEvent::Reject, now)
    }

    pub fn withdraw_quote(
        &self,
        quote_id: &QuoteId,
        now: DateTime<Utc>,
    ) -> Result<Quote, MarketplaceError> {
        self.close_quote(quote_id, QuoteEvent::Withdraw, now)
    }

    fn close_quote(
        &self,
        quote_id: &QuoteId,
        event: QuoteEvent,
        now: DateTime<Utc>,
    ) -> Result<Quote, MarketplaceError> {
        let quote = self.load_quote(quote_id)?;
        let next = lifecycle::transition_quote(&quote, event, now)
            .map_err(|err| rejected(event.label(), &quote_id.0, err))?;
        self.commit(ChangeSet::new().update_quote(next.clone(), quote))?;
        info!(
            quote_id = %quote_id,
            rfq_id = %next.rfq_id,
            status = next.status.label(),
            "quote closed"
        );
        Ok(next)
    }

    /// Expire RFQs past their quote deadline and submitted quotes past their validity.
    ///
    /// Records that change between the scan and the write (for instance a quote accepted at the
    /// same instant) are skipped, so repeated or concurrent sweeps are harmless.
    pub fn sweep_expirations(&self, now: DateTime<Utc>) -> Result<SweepReport, MarketplaceError> {
        let mut report = SweepReport::default();

        for rfq in self.repository.list_rfqs()? {
            let Some(expired) = lifecycle::expire_rfq_if_due(&rfq, now) else {
                continue;
            };
            match self
                .repository
                .commit(ChangeSet::new().update_rfq(expired, rfq.clone()))
            {
                Ok(()) => {
                    debug!(rfq_id = %rfq.id, from = rfq.status.label(), "RFQ expired");
                    report.expired_rfq_ids.push(rfq.id);
                }
                Err(RepositoryError::Conflict(reason)) => {
                    debug!(rfq_id = %rfq.id, %reason, "RFQ changed during sweep; skipped");
                }
                Err(err) => return Err(err.into()),
            }
        }

        for quote in self.repository.list_quotes()? {
            let Some(expired) = lifecycle::expire_quote_if_lapsed(&quote, now) else {
                continue;
            };
            match self
                .repository
                .commit(ChangeSet::new().update_quote(expired, quote.clone()))
            {
                Ok(()) => {
                    debug!(quote_id = %quote.id, "quote expired");
                    report.expired_quote_ids.push(quote.id);
                }
                Err(RepositoryError::Conflict(reason)) => {
                    debug!(quote_id = %quote.id, %reason, "quote changed during sweep; skipped");
                }
                Err(err) => return Err(err.into()),
            }
        }

        if !report.is_empty() {
            info!(
                rfqs = report.expired_rfq_ids.len(),
                quotes = report.expired_quote_ids.len(),
                "expiration sweep applied"
            );
        }
        Ok(report)
    }

    pub fn get_rfq(&self, rfq_id: &RfqId) -> Result<Rfq, MarketplaceError> {
        self.load_rfq(rfq_id)
    }

    pub fn get_quote(&self, quote_id: &QuoteId) -> Result<Quote, MarketplaceError> {
        self.load_quote(quote_id)
    }

    pub fn list_rfqs(&self, query: &RfqQuery) -> Result<Vec<Rfq>, MarketplaceError> {
        Ok(self
            .repository
            .list_rfqs()?
            .into_iter()
            .filter(|rfq| query.matches(rfq))
            .collect())
    }

    pub fn list_rfq_quotes(&self, rfq_id: &RfqId) -> Result<Vec<Quote>, MarketplaceError> {
        self.load_rfq(rfq_id)?;
        Ok(self.repository.quotes_for_rfq(rfq_id)?)
    }

    pub fn list_provider_quotes(
        &self,
        provider_id: &ProviderId,
    ) -> Result<Vec<Quote>, MarketplaceError> {
        Ok(self.repository.quotes_for_provider(provider_id)?)
    }

    /// Deadline standing of an RFQ under the configured urgency window.
    pub fn deadline_status(&self, rfq: &Rfq, now: DateTime<Utc>) -> DeadlineStatus {
        self.deadlines.classify(rfq.quote_deadline, now)
    }

    pub fn deadline_policy(&self) -> DeadlinePolicy {
        self.deadlines
    }

    /// Compare the live offers on the RFQ: submitted quotes and the accepted one. Pending drafts,
    /// withdrawn, rejected and expired quotes stay out so each provider appears at most once.
    pub fn quote_comparison(
        &self,
        rfq_id: &RfqId,
        now: DateTime<Utc>,
    ) -> Result<QuoteComparisonView, MarketplaceError> {
        let rfq = self.load_rfq(rfq_id)?;
        let entries = self
            .repository
            .quotes_for_rfq(rfq_id)?
            .into_iter()
            .filter(|quote| quote.status.is_comparable())
            .map(|quote| -> Result<ComparisonEntry, MarketplaceError> {
                let provider = self
                    .directory
                    .find(&quote.provider_id)?
                    .map(|profile| profile.snapshot())
                    .unwrap_or_else(|| ProviderSnapshot::unknown(quote.provider_id.clone()));
                Ok(ComparisonEntry { quote, provider })
            })
            .collect::<Result<Vec<_>, MarketplaceError>>()?;

        let comparison = compare_quotes(&entries)?;
        let validity = comparison
            .rows
            .iter()
            .map(|row| {
                let validity = self.deadlines.classify(row.valid_until, now);
                QuoteValidity {
                    quote_id: row.quote_id.clone(),
                    validity,
                    label: validity.validity_label(),
                }
            })
            .collect();

        debug!(rfq_id = %rfq_id, quotes = comparison.quote_count, "quote comparison built");
        Ok(QuoteComparisonView {
            rfq_id: rfq.id,
            rfq_status: rfq.status,
            comparison,
            validity,
        })
    }

    pub fn provider_summary(
        &self,
        provider_id: &ProviderId,
    ) -> Result<ProviderSummary, MarketplaceError> {
        let quotes = self.repository.quotes_for_provider(provider_id)?;
        let pending_invitations = self
            .repository
            .list_rfqs()?
            .iter()
            .filter(|rfq| rfq.status.accepts_quotes() && rfq.is_invited(provider_id))
            .filter(|rfq| !quotes.iter().any(|quote| quote.rfq_id == rfq.id))
            .count();

        let count = |status: QuoteStatus| quotes.iter().filter(|quote| quote.status == status).count();
        let won_quotes = count(QuoteStatus::Accepted);
        let decided = won_quotes + count(QuoteStatus::Rejected);
        let win_rate = if decided == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(won_quotes) / Decimal::from(decided)).round_dp(2)
        };

        Ok(ProviderSummary {
            provider_id: provider_id.clone(),
            pending_invitations,
            active_quotes: quotes.iter().filter(|quote| quote.status.is_open()).count(),
            won_quotes,
            total_submitted: quotes
                .iter()
                .filter(|quote| quote.submitted_at.is_some())
                .count(),
            win_rate,
        })
    }

    fn load_rfq(&self, rfq_id: &RfqId) -> Result<Rfq, MarketplaceError> {
        self.repository
            .fetch_rfq(rfq_id)?
            .ok_or_else(|| MarketplaceError::NotFound {
                entity: "RFQ",
                id: rfq_id.0.clone(),
            })
    }

    fn load_quote(&self, quote_id: &QuoteId) -> Result<Quote, MarketplaceError> {
        self.repository
            .fetch_quote(quote_id)?
            .ok_or_else(|| MarketplaceError::NotFound {
                entity: "quote",
                id: quote_id.0.clone(),
            })
    }

    /// Apply a change set; a lost compare-and-swap surfaces as `InvalidState`.
    fn commit(&self, changes: ChangeSet) -> Result<(), MarketplaceError> {
        self.repository.commit(changes).map_err(|err| match err {
            RepositoryError::Conflict(reason) => {
                MarketplaceError::InvalidState(format!("concurrent update: {reason}"))
            }
            other => other.into(),
        })
    }
}

fn rejected(operation: &str, subject: &str, err: MarketplaceError) -> MarketplaceError {
    if matches!(
        err,
        MarketplaceError::InvalidState(_)
            | MarketplaceError::InvalidTransition { .. }
            | MarketplaceError::Validation(_)
    ) {
        warn!(operation, subject, error = %err, "marketplace operation rejected");
    }
    err
}
