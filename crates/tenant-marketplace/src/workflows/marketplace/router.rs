use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::deadline::DeadlineStatus;
use super::domain::{
    NewRfq, ProviderId, QuoteId, QuoteRevision, QuoteSubmission, Rfq, RfqChanges, RfqId,
};
use super::error::MarketplaceError;
use super::providers::ProviderDirectory;
use super::repository::MarketplaceRepository;
use super::service::{MarketplaceService, RfqQuery};

type SharedService<R, D> = Arc<MarketplaceService<R, D>>;

/// RFQ payload enriched with its deadline standing at response time.
#[derive(Debug, Clone, Serialize)]
pub struct RfqView {
    #[serde(flatten)]
    pub rfq: Rfq,
    pub deadline: DeadlineStatus,
    pub deadline_label: String,
    pub deadline_urgent: bool,
}

impl RfqView {
    fn build<R, D>(service: &MarketplaceService<R, D>, rfq: Rfq, now: DateTime<Utc>) -> Self
    where
        R: MarketplaceRepository + 'static,
        D: ProviderDirectory + 'static,
    {
        let deadline = service.deadline_status(&rfq, now);
        Self {
            rfq,
            deadline,
            deadline_label: deadline.deadline_label(),
            deadline_urgent: service.deadline_policy().is_urgent(deadline),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitQuoteRequest {
    pub rfq_id: RfqId,
    pub provider_id: ProviderId,
    #[serde(flatten)]
    pub submission: QuoteSubmission,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InviteRequest {
    pub provider_ids: Vec<ProviderId>,
}

/// Router builder exposing RFQ, quote, and provider endpoints under `/api/v1/marketplace`.
pub fn marketplace_router<R, D>(service: SharedService<R, D>) -> Router
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/marketplace/rfqs",
            post(create_rfq_handler::<R, D>).get(list_rfqs_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/rfqs/:rfq_id",
            get(get_rfq_handler::<R, D>).patch(update_rfq_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/rfqs/:rfq_id/send",
            post(send_rfq_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/rfqs/:rfq_id/cancel",
            post(cancel_rfq_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/rfqs/:rfq_id/invitees",
            post(invite_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/rfqs/:rfq_id/invitees/:provider_id",
            delete(uninvite_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/rfqs/:rfq_id/quotes",
            get(rfq_quotes_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/rfqs/:rfq_id/compare",
            get(compare_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/quotes",
            post(submit_quote_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/quotes/:quote_id",
            get(get_quote_handler::<R, D>).patch(revise_quote_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/quotes/:quote_id/submit",
            post(finalize_quote_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/quotes/:quote_id/accept",
            post(accept_quote_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/quotes/:quote_id/reject",
            post(reject_quote_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/quotes/:quote_id/withdraw",
            post(withdraw_quote_handler::<R, D>),
        )
        .route("/api/v1/marketplace/sweep", post(sweep_handler::<R, D>))
        .route(
            "/api/v1/marketplace/providers/:provider_id/quotes",
            get(provider_quotes_handler::<R, D>),
        )
        .route(
            "/api/v1/marketplace/providers/:provider_id/summary",
            get(provider_summary_handler::<R, D>),
        )
        .with_state(service)
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, MarketplaceError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(&error),
    }
}

pub(crate) fn error_response(error: &MarketplaceError) -> Response {
    let payload = json!({
        "error": error.kind(),
        "message": error.to_string(),
    });
    (error.status_code(), axum::Json(payload)).into_response()
}

pub(crate) async fn create_rfq_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    axum::Json(input): axum::Json<NewRfq>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let now = Utc::now();
    let result = service
        .create_rfq(input, now)
        .map(|rfq| RfqView::build(&service, rfq, now));
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn list_rfqs_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Query(query): Query<RfqQuery>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let now = Utc::now();
    let result = service.list_rfqs(&query).map(|rfqs| {
        rfqs.into_iter()
            .map(|rfq| RfqView::build(&service, rfq, now))
            .collect::<Vec<_>>()
    });
    respond(StatusCode::OK, result)
}

pub(crate) async fn get_rfq_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(rfq_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let result = service
        .get_rfq(&RfqId(rfq_id))
        .map(|rfq| RfqView::build(&service, rfq, Utc::now()));
    respond(StatusCode::OK, result)
}

pub(crate) async fn update_rfq_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(rfq_id): Path<String>,
    axum::Json(changes): axum::Json<RfqChanges>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let now = Utc::now();
    let result = service
        .update_rfq(&RfqId(rfq_id), changes, now)
        .map(|rfq| RfqView::build(&service, rfq, now));
    respond(StatusCode::OK, result)
}

pub(crate) async fn send_rfq_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(rfq_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let now = Utc::now();
    let result = service
        .send_rfq(&RfqId(rfq_id), now)
        .map(|rfq| RfqView::build(&service, rfq, now));
    respond(StatusCode::OK, result)
}

pub(crate) async fn cancel_rfq_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(rfq_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let now = Utc::now();
    let result = service
        .cancel_rfq(&RfqId(rfq_id), now)
        .map(|rfq| RfqView::build(&service, rfq, now));
    respond(StatusCode::OK, result)
}

pub(crate) async fn invite_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(rfq_id): Path<String>,
    axum::Json(request): axum::Json<InviteRequest>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let now = Utc::now();
    let result = service
        .invite_providers(&RfqId(rfq_id), request.provider_ids, now)
        .map(|rfq| RfqView::build(&service, rfq, now));
    respond(StatusCode::OK, result)
}

pub(crate) async fn uninvite_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path((rfq_id, provider_id)): Path<(String, String)>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let now = Utc::now();
    let result = service
        .remove_invitee(&RfqId(rfq_id), &ProviderId(provider_id), now)
        .map(|rfq| RfqView::build(&service, rfq, now));
    respond(StatusCode::OK, result)
}

pub(crate) async fn rfq_quotes_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(rfq_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(StatusCode::OK, service.list_rfq_quotes(&RfqId(rfq_id)))
}

pub(crate) async fn compare_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(rfq_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(
        StatusCode::OK,
        service.quote_comparison(&RfqId(rfq_id), Utc::now()),
    )
}

pub(crate) async fn submit_quote_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    axum::Json(request): axum::Json<SubmitQuoteRequest>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    let SubmitQuoteRequest {
        rfq_id,
        provider_id,
        submission,
    } = request;
    respond(
        StatusCode::CREATED,
        service.submit_quote(&rfq_id, &provider_id, submission, Utc::now()),
    )
}

pub(crate) async fn get_quote_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(quote_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(StatusCode::OK, service.get_quote(&QuoteId(quote_id)))
}

pub(crate) async fn revise_quote_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(quote_id): Path<String>,
    axum::Json(revision): axum::Json<QuoteRevision>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(
        StatusCode::OK,
        service.revise_quote(&QuoteId(quote_id), revision, Utc::now()),
    )
}

pub(crate) async fn finalize_quote_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(quote_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(
        StatusCode::OK,
        service.finalize_quote(&QuoteId(quote_id), Utc::now()),
    )
}

pub(crate) async fn accept_quote_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(quote_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(
        StatusCode::OK,
        service.accept_quote(&QuoteId(quote_id), Utc::now()),
    )
}

pub(crate) async fn reject_quote_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(quote_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(
        StatusCode::OK,
        service.reject_quote(&QuoteId(quote_id), Utc::now()),
    )
}

pub(crate) async fn withdraw_quote_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(quote_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(
        StatusCode::OK,
        service.withdraw_quote(&QuoteId(quote_id), Utc::now()),
    )
}

pub(crate) async fn sweep_handler<R, D>(State(service): State<SharedService<R, D>>) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(StatusCode::OK, service.sweep_expirations(Utc::now()))
}

pub(crate) async fn provider_quotes_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(provider_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(
        StatusCode::OK,
        service.list_provider_quotes(&ProviderId(provider_id)),
    )
}

pub(crate) async fn provider_summary_handler<R, D>(
    State(service): State<SharedService<R, D>>,
    Path(provider_id): Path<String>,
) -> Response
where
    R: MarketplaceRepository + 'static,
    D: ProviderDirectory + 'static,
{
    respond(
        StatusCode::OK,
        service.provider_summary(&ProviderId(provider_id)),
    )
}
