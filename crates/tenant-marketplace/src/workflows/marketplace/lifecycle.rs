//! RFQ and quote state machines.
//!
//! Every function here is pure: it receives the current record(s) and returns the next version,
//! or an error describing the rule that blocked the change. Persisting the result is the
//! service's job.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::domain::{
    Currency, NewRfq, ProviderId, Quote, QuoteId, QuoteRevision, QuoteStatus, QuoteSubmission,
    Rfq, RfqChanges, RfqId, RfqStatus,
};
use super::error::MarketplaceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RfqEvent {
    Send,
    QuoteReceived,
    Award,
    Cancel,
    Expire,
}

impl RfqEvent {
    pub const fn label(self) -> &'static str {
        match self {
            RfqEvent::Send => "send",
            RfqEvent::QuoteReceived => "receive quotes",
            RfqEvent::Award => "award",
            RfqEvent::Cancel => "cancel",
            RfqEvent::Expire => "expire",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteEvent {
    Submit,
    Accept,
    Reject,
    Withdraw,
    Expire,
}

impl QuoteEvent {
    pub const fn label(self) -> &'static str {
        match self {
            QuoteEvent::Submit => "submit",
            QuoteEvent::Accept => "accept",
            QuoteEvent::Reject => "reject",
            QuoteEvent::Withdraw => "withdraw",
            QuoteEvent::Expire => "expire",
        }
    }
}

const RFQ_TRANSITIONS: &[(RfqStatus, RfqEvent, RfqStatus)] = &[
    (RfqStatus::Draft, RfqEvent::Send, RfqStatus::Sent),
    (RfqStatus::Sent, RfqEvent::QuoteReceived, RfqStatus::QuotesReceived),
    (
        RfqStatus::QuotesReceived,
        RfqEvent::QuoteReceived,
        RfqStatus::QuotesReceived,
    ),
    (RfqStatus::Sent, RfqEvent::Award, RfqStatus::Awarded),
    (RfqStatus::QuotesReceived, RfqEvent::Award, RfqStatus::Awarded),
    (RfqStatus::Draft, RfqEvent::Cancel, RfqStatus::Cancelled),
    (RfqStatus::Sent, RfqEvent::Cancel, RfqStatus::Cancelled),
    (RfqStatus::Draft, RfqEvent::Expire, RfqStatus::Expired),
    (RfqStatus::Sent, RfqEvent::Expire, RfqStatus::Expired),
    (RfqStatus::QuotesReceived, RfqEvent::Expire, RfqStatus::Expired),
];

const QUOTE_TRANSITIONS: &[(QuoteStatus, QuoteEvent, QuoteStatus)] = &[
    (QuoteStatus::Pending, QuoteEvent::Submit, QuoteStatus::Submitted),
    (QuoteStatus::Pending, QuoteEvent::Accept, QuoteStatus::Accepted),
    (QuoteStatus::Submitted, QuoteEvent::Accept, QuoteStatus::Accepted),
    (QuoteStatus::Pending, QuoteEvent::Reject, QuoteStatus::Rejected),
    (QuoteStatus::Submitted, QuoteEvent::Reject, QuoteStatus::Rejected),
    (QuoteStatus::Pending, QuoteEvent::Withdraw, QuoteStatus::Withdrawn),
    (QuoteStatus::Submitted, QuoteEvent::Withdraw, QuoteStatus::Withdrawn),
    (QuoteStatus::Submitted, QuoteEvent::Expire, QuoteStatus::Expired),
];

/// Resolve the next RFQ status. Terminal statuses report `InvalidState`; a missing edge from a
/// live status reports `InvalidTransition`.
pub fn next_rfq_status(from: RfqStatus, event: RfqEvent) -> Result<RfqStatus, MarketplaceError> {
    if let Some((_, _, to)) = RFQ_TRANSITIONS
        .iter()
        .find(|(status, candidate, _)| *status == from && *candidate == event)
    {
        return Ok(*to);
    }

    if from.is_terminal() {
        Err(MarketplaceError::InvalidState(format!(
            "RFQ is {} and can no longer {}",
            from.label(),
            event.label()
        )))
    } else {
        Err(MarketplaceError::InvalidTransition {
            entity: "RFQ",
            from: from.label(),
            event: event.label(),
        })
    }
}

/// Resolve the next quote status, with the same error split as [`next_rfq_status`].
pub fn next_quote_status(
    from: QuoteStatus,
    event: QuoteEvent,
) -> Result<QuoteStatus, MarketplaceError> {
    if let Some((_, _, to)) = QUOTE_TRANSITIONS
        .iter()
        .find(|(status, candidate, _)| *status == from && *candidate == event)
    {
        return Ok(*to);
    }

    if from.is_terminal() {
        Err(MarketplaceError::InvalidState(format!(
            "quote is {} and can no longer {}",
            from.label(),
            event.label()
        )))
    } else {
        Err(MarketplaceError::InvalidTransition {
            entity: "quote",
            from: from.label(),
            event: event.label(),
        })
    }
}

pub fn validate_budget(min: Option<Decimal>, max: Option<Decimal>) -> Result<(), MarketplaceError> {
    for amount in [min, max].into_iter().flatten() {
        if amount.is_sign_negative() {
            return Err(MarketplaceError::Validation(format!(
                "budget amounts must not be negative (found {amount})"
            )));
        }
    }

    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(MarketplaceError::Validation(format!(
                "budget minimum {min} exceeds maximum {max}"
            )));
        }
    }

    Ok(())
}

fn validate_window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    what: &str,
) -> Result<(), MarketplaceError> {
    match (start, end) {
        (Some(start), Some(end)) if start > end => Err(MarketplaceError::Validation(format!(
            "{what} start {start} is after end {end}"
        ))),
        _ => Ok(()),
    }
}

fn validate_rfq_fields(rfq: &Rfq) -> Result<(), MarketplaceError> {
    if rfq.title.trim().is_empty() {
        return Err(MarketplaceError::Validation(
            "RFQ title must not be blank".to_string(),
        ));
    }
    validate_budget(rfq.budget_min, rfq.budget_max)?;
    validate_window(
        rfq.preferred_start_date,
        rfq.preferred_end_date,
        "preferred",
    )
}

/// Build a new `draft` RFQ from manager input.
pub fn draft_rfq(
    id: RfqId,
    input: NewRfq,
    default_currency: &Currency,
    now: DateTime<Utc>,
) -> Result<Rfq, MarketplaceError> {
    let rfq = Rfq {
        id,
        building_id: input.building_id,
        title: input.title.trim().to_string(),
        description: input.description,
        service_category: input.service_category,
        scope_of_work: input.scope_of_work,
        preferred_start_date: input.preferred_start_date,
        preferred_end_date: input.preferred_end_date,
        is_urgent: input.is_urgent,
        budget_min: input.budget_min,
        budget_max: input.budget_max,
        currency: input.currency.unwrap_or_else(|| default_currency.clone()),
        status: RfqStatus::Draft,
        quote_deadline: input.quote_deadline,
        invited_provider_ids: input.provider_ids.into_iter().collect(),
        site_visit_required: input.site_visit_required,
        awarded_quote_id: None,
        awarded_to: None,
        awarded_at: None,
        created_at: now,
        updated_at: now,
    };

    validate_rfq_fields(&rfq)?;
    Ok(rfq)
}

fn ensure_draft(rfq: &Rfq, action: &str) -> Result<(), MarketplaceError> {
    if rfq.status == RfqStatus::Draft {
        Ok(())
    } else {
        Err(MarketplaceError::InvalidState(format!(
            "RFQ {} is {}; only drafts can {action}",
            rfq.id,
            rfq.status.label()
        )))
    }
}

/// Apply manager edits to a draft.
pub fn edit_draft(
    rfq: &Rfq,
    changes: RfqChanges,
    now: DateTime<Utc>,
) -> Result<Rfq, MarketplaceError> {
    ensure_draft(rfq, "be edited")?;

    let mut next = rfq.clone();
    if let Some(title) = changes.title {
        next.title = title.trim().to_string();
    }
    if let Some(description) = changes.description {
        next.description = description;
    }
    if let Some(scope) = changes.scope_of_work {
        next.scope_of_work = Some(scope);
    }
    if let Some(start) = changes.preferred_start_date {
        next.preferred_start_date = Some(start);
    }
    if let Some(end) = changes.preferred_end_date {
        next.preferred_end_date = Some(end);
    }
    if let Some(is_urgent) = changes.is_urgent {
        next.is_urgent = is_urgent;
    }
    if let Some(min) = changes.budget_min {
        next.budget_min = Some(min);
    }
    if let Some(max) = changes.budget_max {
        next.budget_max = Some(max);
    }
    if let Some(deadline) = changes.quote_deadline {
        next.quote_deadline = Some(deadline);
    }
    if let Some(site_visit) = changes.site_visit_required {
        next.site_visit_required = site_visit;
    }

    validate_rfq_fields(&next)?;
    next.updated_at = now;
    Ok(next)
}

/// Add providers to a draft's invitee list.
pub fn invite(
    rfq: &Rfq,
    providers: impl IntoIterator<Item = ProviderId>,
    now: DateTime<Utc>,
) -> Result<Rfq, MarketplaceError> {
    ensure_draft(rfq, "change invitees")?;
    let mut next = rfq.clone();
    next.invited_provider_ids.extend(providers);
    next.updated_at = now;
    Ok(next)
}

/// Drop a provider from a draft's invitee list.
pub fn uninvite(
    rfq: &Rfq,
    provider_id: &ProviderId,
    now: DateTime<Utc>,
) -> Result<Rfq, MarketplaceError> {
    ensure_draft(rfq, "change invitees")?;
    if !rfq.is_invited(provider_id) {
        return Err(MarketplaceError::Validation(format!(
            "provider {provider_id} is not invited to RFQ {}",
            rfq.id
        )));
    }
    let mut next = rfq.clone();
    next.invited_provider_ids.remove(provider_id);
    next.updated_at = now;
    Ok(next)
}

pub fn send(rfq: &Rfq, now: DateTime<Utc>) -> Result<Rfq, MarketplaceError> {
    let status = next_rfq_status(rfq.status, RfqEvent::Send)?;
    if rfq.invited_provider_ids.is_empty() {
        return Err(MarketplaceError::Validation(format!(
            "RFQ {} must invite at least one provider before it is sent",
            rfq.id
        )));
    }

    let mut next = rfq.clone();
    next.status = status;
    next.updated_at = now;
    Ok(next)
}

pub fn cancel(rfq: &Rfq, now: DateTime<Utc>) -> Result<Rfq, MarketplaceError> {
    let status = next_rfq_status(rfq.status, RfqEvent::Cancel)?;
    let mut next = rfq.clone();
    next.status = status;
    next.updated_at = now;
    Ok(next)
}

/// Record that a submitted quote arrived. Returns `None` when the status is already
/// `quotes_received`.
pub fn note_quote_received(rfq: &Rfq, now: DateTime<Utc>) -> Result<Option<Rfq>, MarketplaceError> {
    let status = next_rfq_status(rfq.status, RfqEvent::QuoteReceived)?;
    if status == rfq.status {
        return Ok(None);
    }
    let mut next = rfq.clone();
    next.status = status;
    next.updated_at = now;
    Ok(Some(next))
}

/// Expire an RFQ whose quote deadline lies strictly before `now`.
pub fn expire_rfq_if_due(rfq: &Rfq, now: DateTime<Utc>) -> Option<Rfq> {
    let deadline = rfq.quote_deadline?;
    if now <= deadline {
        return None;
    }
    let status = next_rfq_status(rfq.status, RfqEvent::Expire).ok()?;
    let mut next = rfq.clone();
    next.status = status;
    next.updated_at = now;
    Some(next)
}

/// Expire a submitted quote whose validity lies strictly before `now`.
pub fn expire_quote_if_lapsed(quote: &Quote, now: DateTime<Utc>) -> Option<Quote> {
    let valid_until = quote.valid_until?;
    if now <= valid_until {
        return None;
    }
    transition_quote(quote, QuoteEvent::Expire, now).ok()
}

/// Guard run before a provider may quote on an RFQ.
pub fn ensure_open_for_quotes(
    rfq: &Rfq,
    provider_id: &ProviderId,
    now: DateTime<Utc>,
) -> Result<(), MarketplaceError> {
    if !rfq.status.accepts_quotes() {
        return Err(MarketplaceError::InvalidState(format!(
            "RFQ {} is {} and is not accepting quotes",
            rfq.id,
            rfq.status.label()
        )));
    }
    if let Some(deadline) = rfq.quote_deadline {
        if now > deadline {
            return Err(MarketplaceError::InvalidState(format!(
                "RFQ {} stopped accepting quotes at {deadline}",
                rfq.id
            )));
        }
    }
    if !rfq.is_invited(provider_id) {
        return Err(MarketplaceError::Validation(format!(
            "provider {provider_id} was not invited to RFQ {}",
            rfq.id
        )));
    }
    Ok(())
}

/// Upper bound on a single quote price, far below the point where comparison totals overflow.
pub const MAX_QUOTE_PRICE: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

fn validate_quote_fields(quote: &Quote) -> Result<(), MarketplaceError> {
    if quote.price.is_sign_negative() {
        return Err(MarketplaceError::Validation(format!(
            "quote price must not be negative (found {})",
            quote.price
        )));
    }
    if quote.price > MAX_QUOTE_PRICE {
        return Err(MarketplaceError::Validation(format!(
            "quote price {} exceeds the maximum of {MAX_QUOTE_PRICE}",
            quote.price
        )));
    }
    validate_window(
        quote.estimated_start_date,
        quote.estimated_end_date,
        "estimated",
    )
}

/// Build a new quote for `rfq`. Status is `submitted` unless the provider asked to hold it.
pub fn draft_quote(
    id: QuoteId,
    rfq: &Rfq,
    provider_id: ProviderId,
    submission: QuoteSubmission,
    now: DateTime<Utc>,
) -> Result<Quote, MarketplaceError> {
    let currency = submission.currency.unwrap_or_else(|| rfq.currency.clone());
    if currency != rfq.currency {
        return Err(MarketplaceError::DataIntegrity(format!(
            "quote currency {currency} does not match RFQ {} currency {}",
            rfq.id, rfq.currency
        )));
    }

    let (status, submitted_at) = if submission.save_as_pending {
        (QuoteStatus::Pending, None)
    } else {
        (QuoteStatus::Submitted, Some(now))
    };

    let quote = Quote {
        id,
        rfq_id: rfq.id.clone(),
        provider_id,
        price: submission.price,
        currency,
        estimated_start_date: submission.estimated_start_date,
        estimated_end_date: submission.estimated_end_date,
        estimated_duration_days: submission.estimated_duration_days,
        warranty_period_days: submission.warranty_period_days,
        payment_terms: submission.payment_terms,
        terms_and_conditions: submission.terms_and_conditions,
        notes: submission.notes,
        status,
        valid_until: submission.valid_until,
        created_at: now,
        updated_at: now,
        submitted_at,
    };

    validate_quote_fields(&quote)?;
    Ok(quote)
}

/// Apply provider edits to an open quote.
pub fn revise(
    quote: &Quote,
    revision: QuoteRevision,
    now: DateTime<Utc>,
) -> Result<Quote, MarketplaceError> {
    if !quote.status.is_open() {
        return Err(MarketplaceError::InvalidState(format!(
            "quote {} is {} and can no longer be revised",
            quote.id,
            quote.status.label()
        )));
    }

    let mut next = quote.clone();
    if let Some(price) = revision.price {
        next.price = price;
    }
    if let Some(start) = revision.estimated_start_date {
        next.estimated_start_date = Some(start);
    }
    if let Some(end) = revision.estimated_end_date {
        next.estimated_end_date = Some(end);
    }
    if let Some(days) = revision.estimated_duration_days {
        next.estimated_duration_days = Some(days);
    }
    if let Some(days) = revision.warranty_period_days {
        next.warranty_period_days = Some(days);
    }
    if let Some(terms) = revision.payment_terms {
        next.payment_terms = Some(terms);
    }
    if let Some(notes) = revision.notes {
        next.notes = Some(notes);
    }
    if let Some(valid_until) = revision.valid_until {
        next.valid_until = Some(valid_until);
    }

    validate_quote_fields(&next)?;
    next.updated_at = now;
    Ok(next)
}

pub fn transition_quote(
    quote: &Quote,
    event: QuoteEvent,
    now: DateTime<Utc>,
) -> Result<Quote, MarketplaceError> {
    let status = next_quote_status(quote.status, event)?;
    let mut next = quote.clone();
    next.status = status;
    next.updated_at = now;
    if event == QuoteEvent::Submit {
        next.submitted_at = Some(now);
    }
    Ok(next)
}

/// Records touched when one quote wins an RFQ.
#[derive(Debug, Clone, PartialEq)]
pub struct AwardPlan {
    pub rfq: Rfq,
    pub accepted: Quote,
    pub rejected: Vec<Quote>,
}

/// Accept `quote`, award `rfq`, and reject every still-open sibling.
///
/// `siblings` is the full quote set of the RFQ and may include `quote` itself.
pub fn plan_award(
    rfq: &Rfq,
    quote: &Quote,
    siblings: &[Quote],
    now: DateTime<Utc>,
) -> Result<AwardPlan, MarketplaceError> {
    if quote.rfq_id != rfq.id {
        return Err(MarketplaceError::DataIntegrity(format!(
            "quote {} belongs to RFQ {}, not {}",
            quote.id, quote.rfq_id, rfq.id
        )));
    }

    let accepted = transition_quote(quote, QuoteEvent::Accept, now)?;

    if let Some(valid_until) = quote.valid_until {
        if now > valid_until {
            return Err(MarketplaceError::InvalidState(format!(
                "quote {} lapsed at {valid_until}",
                quote.id
            )));
        }
    }

    if let Some(existing) = siblings
        .iter()
        .find(|sibling| sibling.id != quote.id && sibling.status == QuoteStatus::Accepted)
    {
        return Err(MarketplaceError::InvalidState(format!(
            "RFQ {} already accepted quote {}",
            rfq.id, existing.id
        )));
    }

    let status = next_rfq_status(rfq.status, RfqEvent::Award)?;
    let mut awarded = rfq.clone();
    awarded.status = status;
    awarded.awarded_quote_id = Some(quote.id.clone());
    awarded.awarded_to = Some(quote.provider_id.clone());
    awarded.awarded_at = Some(now);
    awarded.updated_at = now;

    let rejected = siblings
        .iter()
        .filter(|sibling| sibling.id != quote.id && sibling.status.is_open())
        .map(|sibling| transition_quote(sibling, QuoteEvent::Reject, now))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AwardPlan {
        rfq: awarded,
        accepted,
        rejected,
    })
}
