use chrono::{DateTime, NaiveDate, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tenant_marketplace::config::MarketplaceConfig;
use tenant_marketplace::error::AppError;
use tenant_marketplace::workflows::marketplace::{
    InMemoryMarketplaceRepository, MarketplaceService, ProviderId, ProviderProfile,
    ProviderRoster, ProviderRosterImporter, ServiceCategory,
};

pub(crate) type ApiService = MarketplaceService<InMemoryMarketplaceRepository, ProviderRoster>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn build_service(config: MarketplaceConfig, roster: ProviderRoster) -> ApiService {
    MarketplaceService::new(
        Arc::new(InMemoryMarketplaceRepository::default()),
        Arc::new(roster),
        config,
    )
}

/// Roster from CSV when a path is given, otherwise the sample directory.
pub(crate) fn load_roster(path: Option<&Path>) -> Result<ProviderRoster, AppError> {
    match path {
        Some(path) => Ok(ProviderRosterImporter::from_path(path)?),
        None => Ok(sample_roster()),
    }
}

pub(crate) fn sample_roster() -> ProviderRoster {
    let profile = |id: &str,
                   name: &str,
                   rating: Option<Decimal>,
                   reviews: u32,
                   verified: bool,
                   categories: Vec<ServiceCategory>| ProviderProfile {
        id: ProviderId(id.to_string()),
        company_name: name.to_string(),
        average_rating: rating,
        total_reviews: reviews,
        is_verified: verified,
        service_categories: categories,
    };

    ProviderRoster::from_profiles(vec![
        profile(
            "prov-aquafix",
            "AquaFix Plumbing",
            Some(Decimal::new(46, 1)),
            112,
            true,
            vec![ServiceCategory::Plumbing, ServiceCategory::Hvac],
        ),
        profile(
            "prov-pipeworks",
            "Pipeworks & Co",
            Some(Decimal::new(49, 1)),
            31,
            false,
            vec![ServiceCategory::Plumbing],
        ),
        profile(
            "prov-handyline",
            "Handyline Maintenance",
            None,
            0,
            true,
            vec![
                ServiceCategory::Plumbing,
                ServiceCategory::GeneralMaintenance,
            ],
        ),
        profile(
            "prov-brightwire",
            "Brightwire Electric",
            Some(Decimal::new(42, 1)),
            57,
            true,
            vec![ServiceCategory::Electrical],
        ),
    ])
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| format!("failed to parse '{raw}' as RFC 3339 or YYYY-MM-DD"))
}
