use std::sync::Arc;

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::config::MarketplaceConfig;
use crate::workflows::marketplace::domain::{
    Currency, NewRfq, ProviderId, Quote, QuoteId, QuoteStatus, QuoteSubmission, Rfq, RfqId,
    RfqStatus, ServiceCategory,
};
use crate::workflows::marketplace::providers::{ProviderProfile, ProviderRoster};
use crate::workflows::marketplace::repository::{
    ChangeSet, MarketplaceRepository, RepositoryError,
};
use crate::workflows::marketplace::{InMemoryMarketplaceRepository, MarketplaceService};

pub(super) type TestService = MarketplaceService<InMemoryMarketplaceRepository, ProviderRoster>;

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 6, 9, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn provider(id: &str) -> ProviderId {
    ProviderId(id.to_string())
}

pub(super) fn eur(amount: i64) -> Decimal {
    Decimal::from(amount)
}

pub(super) fn roster() -> ProviderRoster {
    ProviderRoster::from_profiles(vec![
        ProviderProfile {
            id: provider("prov-aqua"),
            company_name: "AquaFix Plumbing".to_string(),
            average_rating: Some(Decimal::new(45, 1)),
            total_reviews: 112,
            is_verified: true,
            service_categories: vec![ServiceCategory::Plumbing],
        },
        ProviderProfile {
            id: provider("prov-brook"),
            company_name: "Brook & Sons".to_string(),
            average_rating: Some(Decimal::new(48, 1)),
            total_reviews: 40,
            is_verified: false,
            service_categories: vec![ServiceCategory::Plumbing, ServiceCategory::Hvac],
        },
        ProviderProfile {
            id: provider("prov-cobalt"),
            company_name: "Cobalt Services".to_string(),
            average_rating: None,
            total_reviews: 0,
            is_verified: true,
            service_categories: vec![ServiceCategory::Plumbing],
        },
    ])
}

pub(super) fn marketplace_config() -> MarketplaceConfig {
    MarketplaceConfig {
        default_currency: Currency::eur(),
        urgent_within_days: 3,
    }
}

pub(super) fn build_service() -> (TestService, Arc<InMemoryMarketplaceRepository>) {
    let repository = Arc::new(InMemoryMarketplaceRepository::default());
    let service = MarketplaceService::new(
        repository.clone(),
        Arc::new(roster()),
        marketplace_config(),
    );
    (service, repository)
}

/// Riser replacement with a 1000-2000 EUR budget, open for a week, three invitees.
pub(super) fn new_rfq(at: DateTime<Utc>) -> NewRfq {
    NewRfq {
        building_id: Some("bldg-12".to_string()),
        title: "Replace basement water riser".to_string(),
        description: "Corroded riser in the boiler room needs replacement".to_string(),
        service_category: ServiceCategory::Plumbing,
        scope_of_work: Some("Remove old riser, fit copper replacement, pressure test".to_string()),
        preferred_start_date: None,
        preferred_end_date: None,
        is_urgent: false,
        budget_min: Some(eur(1000)),
        budget_max: Some(eur(2000)),
        currency: None,
        quote_deadline: Some(at + Duration::days(7)),
        provider_ids: vec![
            provider("prov-aqua"),
            provider("prov-brook"),
            provider("prov-cobalt"),
        ],
        site_visit_required: false,
    }
}

pub(super) fn sent_rfq(service: &TestService, at: DateTime<Utc>) -> Rfq {
    let draft = service.create_rfq(new_rfq(at), at).expect("draft created");
    service.send_rfq(&draft.id, at).expect("rfq sent")
}

pub(super) fn submit(
    service: &TestService,
    rfq_id: &RfqId,
    provider_id: &str,
    price: i64,
    at: DateTime<Utc>,
) -> Quote {
    service
        .submit_quote(
            rfq_id,
            &provider(provider_id),
            QuoteSubmission::priced(eur(price)),
            at,
        )
        .expect("quote submitted")
}

/// RFQ with quotes A=1500, B=1200, C=1800, in that order.
pub(super) fn quoted_rfq(service: &TestService) -> (Rfq, Quote, Quote, Quote) {
    let rfq = sent_rfq(service, now());
    let a = submit(service, &rfq.id, "prov-aqua", 1500, now());
    let b = submit(service, &rfq.id, "prov-brook", 1200, now());
    let c = submit(service, &rfq.id, "prov-cobalt", 1800, now());
    let rfq = service.get_rfq(&rfq.id).expect("rfq reloads");
    (rfq, a, b, c)
}

pub(super) struct UnavailableRepository;

impl MarketplaceRepository for UnavailableRepository {
    fn insert_rfq(&self, _rfq: Rfq) -> Result<Rfq, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_rfq(&self, _id: &RfqId) -> Result<Option<Rfq>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_rfqs(&self) -> Result<Vec<Rfq>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_quote(&self, _id: &QuoteId) -> Result<Option<Quote>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn quotes_for_rfq(&self, _rfq_id: &RfqId) -> Result<Vec<Quote>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn quotes_for_provider(
        &self,
        _provider_id: &ProviderId,
    ) -> Result<Vec<Quote>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn list_quotes(&self) -> Result<Vec<Quote>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn commit(&self, _changes: ChangeSet) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

pub(super) fn accepted_count(quotes: &[Quote]) -> usize {
    quotes
        .iter()
        .filter(|quote| quote.status == QuoteStatus::Accepted)
        .count()
}

pub(super) fn assert_status(rfq: &Rfq, expected: RfqStatus) {
    assert_eq!(
        rfq.status,
        expected,
        "RFQ {} is {}",
        rfq.id,
        rfq.status.label()
    );
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
