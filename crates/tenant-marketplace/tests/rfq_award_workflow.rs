//! Integration scenarios for the RFQ award workflow.
//!
//! Scenarios drive the public service facade and HTTP router end to end: a roster imported from
//! CSV, an RFQ sent to invited providers, quotes compared, and one quote accepted.

mod common {
    use std::io::Cursor;
    use std::sync::Arc;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;

    use tenant_marketplace::config::MarketplaceConfig;
    use tenant_marketplace::workflows::marketplace::{
        Currency, InMemoryMarketplaceRepository, MarketplaceService, NewRfq, ProviderId,
        ProviderRoster, ProviderRosterImporter, ServiceCategory,
    };

    pub(super) type Service = MarketplaceService<InMemoryMarketplaceRepository, ProviderRoster>;

    const ROSTER: &str = "Provider ID,Company Name,Average Rating,Total Reviews,Verified,Categories\n\
prov-north,Northside Electric,4.6,58,yes,electrical\n\
prov-spark,Spark & Wire,4.9,12,no,electrical;general_maintenance\n\
prov-volt,Volt Brothers,,0,yes,electrical\n";

    pub(super) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 8, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    pub(super) fn provider(id: &str) -> ProviderId {
        ProviderId(id.to_string())
    }

    pub(super) fn build_service() -> Service {
        let roster =
            ProviderRosterImporter::from_reader(Cursor::new(ROSTER)).expect("roster imports");
        MarketplaceService::new(
            Arc::new(InMemoryMarketplaceRepository::default()),
            Arc::new(roster),
            MarketplaceConfig {
                default_currency: Currency::eur(),
                urgent_within_days: 3,
            },
        )
    }

    pub(super) fn lobby_lighting(deadline_in_days: i64) -> NewRfq {
        NewRfq {
            building_id: Some("bldg-7".to_string()),
            title: "Lobby lighting retrofit".to_string(),
            description: "Swap fluorescent fixtures for LED panels in the lobby".to_string(),
            service_category: ServiceCategory::Electrical,
            scope_of_work: None,
            preferred_start_date: None,
            preferred_end_date: None,
            is_urgent: false,
            budget_min: Some(Decimal::from(1000)),
            budget_max: Some(Decimal::from(2000)),
            currency: None,
            quote_deadline: Some(now() + Duration::days(deadline_in_days)),
            provider_ids: vec![
                provider("prov-north"),
                provider("prov-spark"),
                provider("prov-volt"),
            ],
            site_visit_required: true,
        }
    }
}

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use chrono::Duration;
use rust_decimal::Decimal;
use std::sync::Arc;
use tower::ServiceExt;

use common::*;
use tenant_marketplace::workflows::marketplace::{
    marketplace_router, DeadlineStatus, MarketplaceError, QuoteStatus, QuoteSubmission, RfqStatus,
};

#[test]
fn rfq_is_awarded_to_the_accepted_quote() {
    let service = build_service();
    let draft = service
        .create_rfq(lobby_lighting(7), now())
        .expect("draft created");
    let rfq = service.send_rfq(&draft.id, now()).expect("sent");

    let mut quotes = Vec::new();
    for (provider_id, price) in [("prov-north", 1500), ("prov-spark", 1200), ("prov-volt", 1800)] {
        let mut submission = QuoteSubmission::priced(Decimal::from(price));
        submission.valid_until = Some(now() + Duration::days(14));
        quotes.push(
            service
                .submit_quote(&rfq.id, &provider(provider_id), submission, now())
                .expect("quote submitted"),
        );
    }

    let view = service
        .quote_comparison(&rfq.id, now())
        .expect("comparison builds");
    let stats = &view.comparison.statistics;
    assert_eq!(stats.lowest, Some(Decimal::from(1200)));
    assert_eq!(stats.highest, Some(Decimal::from(1800)));
    assert_eq!(stats.average, Some(Decimal::from(1500)));
    let spark = view
        .comparison
        .rows
        .iter()
        .find(|row| row.provider_id == provider("prov-spark"))
        .expect("spark row");
    assert!(spark.best.price);
    assert!(spark.best.rating);
    assert_eq!(spark.company_name, "Spark & Wire");
    assert!(view
        .validity
        .iter()
        .all(|entry| entry.label == "Valid for 14 days"));

    let outcome = service
        .accept_quote(&quotes[1].id, now() + Duration::days(1))
        .expect("award succeeds");
    assert_eq!(outcome.rfq.status, RfqStatus::Awarded);
    assert_eq!(outcome.rfq.awarded_to, Some(provider("prov-spark")));
    let statuses: Vec<QuoteStatus> = outcome.quotes.iter().map(|quote| quote.status).collect();
    assert_eq!(
        statuses,
        vec![
            QuoteStatus::Rejected,
            QuoteStatus::Accepted,
            QuoteStatus::Rejected
        ]
    );

    assert!(matches!(
        service.accept_quote(&quotes[0].id, now() + Duration::days(1)),
        Err(MarketplaceError::InvalidState(_))
    ));
}

#[test]
fn deadline_classification_tracks_the_clock() {
    let service = build_service();
    let rfq = service
        .create_rfq(lobby_lighting(2), now())
        .expect("draft created");

    assert_eq!(
        service.deadline_status(&rfq, now()),
        DeadlineStatus::Urgent { days_left: 2 }
    );
    assert_eq!(
        service.deadline_status(&rfq, now() + Duration::days(1)),
        DeadlineStatus::DueTomorrow
    );
    assert_eq!(
        service.deadline_status(&rfq, now() + Duration::days(3)),
        DeadlineStatus::Expired
    );
}

#[test]
fn sweep_expires_unanswered_rfqs() {
    let service = build_service();
    let draft = service
        .create_rfq(lobby_lighting(2), now())
        .expect("draft created");
    service.send_rfq(&draft.id, now()).expect("sent");

    let report = service
        .sweep_expirations(now() + Duration::days(3))
        .expect("sweep runs");

    assert_eq!(report.expired_rfq_ids, vec![draft.id.clone()]);
    assert_eq!(
        service.get_rfq(&draft.id).expect("reload").status,
        RfqStatus::Expired
    );
    assert!(service
        .sweep_expirations(now() + Duration::days(4))
        .expect("sweep runs")
        .is_empty());
}

#[tokio::test]
async fn router_serves_rfq_lifecycle() {
    let service = Arc::new(build_service());
    let draft = service
        .create_rfq(lobby_lighting(30), chrono::Utc::now())
        .expect("draft created");
    let router = marketplace_router(service.clone());

    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/api/v1/marketplace/rfqs/{}/send", draft.id.0))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);

    let response = router
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(format!("/api/v1/marketplace/rfqs/{}/send", draft.id.0))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    assert_eq!(
        service.get_rfq(&draft.id).expect("reload").status,
        RfqStatus::Sent
    );
}
