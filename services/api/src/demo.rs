use crate::infra::{build_service, load_roster, ApiService};
use chrono::{DateTime, Duration, Utc};
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use tenant_marketplace::config::MarketplaceConfig;
use tenant_marketplace::error::AppError;
use tenant_marketplace::workflows::marketplace::{
    ComparisonResult, NewRfq, ProviderId, QuoteSubmission, RfqId, ServiceCategory,
};

const DEMO_PRICES: [i64; 4] = [1500, 1200, 1800, 1650];
const DEMO_WARRANTIES: [Option<u32>; 4] = [Some(180), Some(365), None, Some(90)];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Provider roster CSV (defaults to the built-in sample directory)
    #[arg(long)]
    pub(crate) providers: Option<PathBuf>,
    /// Demo clock as RFC 3339 or YYYY-MM-DD (defaults to now)
    #[arg(long, value_parser = crate::infra::parse_timestamp)]
    pub(crate) now: Option<DateTime<Utc>>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs { providers, now } = args;
    let now = now.unwrap_or_else(Utc::now);

    let roster = load_roster(providers.as_deref())?;
    let invitees: Vec<ProviderId> = roster
        .offering(ServiceCategory::Plumbing)
        .into_iter()
        .take(DEMO_PRICES.len())
        .map(|profile| profile.id.clone())
        .collect();

    println!("Service-provider marketplace demo ({})", now.to_rfc3339());
    if invitees.is_empty() {
        println!("  No plumbing providers in the directory; nothing to demo.");
        return Ok(());
    }

    let service = build_service(MarketplaceConfig::default(), roster);
    let draft = service.create_rfq(demo_rfq(now, invitees.clone()), now)?;
    let rfq = service.send_rfq(&draft.id, now)?;
    println!(
        "- RFQ {} '{}' sent to {} providers | deadline: {}",
        rfq.id,
        rfq.title,
        rfq.invited_provider_ids.len(),
        service.deadline_status(&rfq, now).deadline_label()
    );

    for (index, provider_id) in invitees.iter().enumerate() {
        let mut submission = QuoteSubmission::priced(Decimal::from(DEMO_PRICES[index]));
        submission.warranty_period_days = DEMO_WARRANTIES[index];
        submission.estimated_duration_days = Some(3 + index as u32);
        submission.valid_until = Some(now + Duration::days(14));
        let quote = service.submit_quote(&rfq.id, provider_id, submission, now)?;
        println!(
            "  quote {} from {} at {} {}",
            quote.id, provider_id, quote.price, quote.currency
        );
    }

    let view = service.quote_comparison(&rfq.id, now)?;
    render_comparison(&view.comparison);

    let Some(winner) = view
        .comparison
        .rows
        .iter()
        .find(|row| row.best.price)
        .map(|row| row.quote_id.clone())
    else {
        return Ok(());
    };

    let decided_at = now + Duration::hours(4);
    let outcome = service.accept_quote(&winner, decided_at)?;
    println!(
        "\nAwarded RFQ {} to {} (quote {})",
        outcome.rfq.id,
        outcome
            .rfq
            .awarded_to
            .as_ref()
            .map(|provider| provider.0.as_str())
            .unwrap_or("-"),
        winner
    );
    for quote in &outcome.quotes {
        println!("  - {} {}", quote.id, quote.status.label());
    }

    render_provider_summaries(&service, &invitees)?;
    render_sweep(&service, &rfq.id, now + Duration::days(8))?;
    Ok(())
}

fn demo_rfq(now: DateTime<Utc>, provider_ids: Vec<ProviderId>) -> NewRfq {
    NewRfq {
        building_id: Some("bldg-riverside".to_string()),
        title: "Replace basement water riser".to_string(),
        description: "Corroded riser in the boiler room needs replacement before winter"
            .to_string(),
        service_category: ServiceCategory::Plumbing,
        scope_of_work: Some("Remove old riser, fit copper replacement, pressure test".to_string()),
        preferred_start_date: None,
        preferred_end_date: None,
        is_urgent: false,
        budget_min: Some(Decimal::from(1000)),
        budget_max: Some(Decimal::from(2000)),
        currency: None,
        quote_deadline: Some(now + Duration::days(7)),
        provider_ids,
        site_visit_required: true,
    }
}

fn render_comparison(result: &ComparisonResult) {
    let currency = result
        .currency
        .as_ref()
        .map(|currency| currency.as_str())
        .unwrap_or("");
    println!("\nQuote comparison ({} quotes)", result.quote_count);
    for row in &result.rows {
        let mut best = Vec::new();
        if row.best.price {
            best.push("price");
        }
        if row.best.rating {
            best.push("rating");
        }
        if row.best.verified {
            best.push("verified");
        }
        if row.best.warranty {
            best.push("warranty");
        }
        println!(
            "  - {:<24} {:>8} {currency} | rating {:<7} | warranty {:<9} | best: {}",
            row.company_name,
            row.price,
            row.rating_label(),
            row.warranty_label(),
            if best.is_empty() {
                "-".to_string()
            } else {
                best.join(", ")
            }
        );
    }

    let stats = &result.statistics;
    let show = |value: Option<Decimal>| {
        value
            .map(|amount| format!("{amount} {currency}"))
            .unwrap_or_else(|| "n/a".to_string())
    };
    println!(
        "  lowest {} | highest {} | average {}",
        show(stats.lowest),
        show(stats.highest),
        show(stats.average)
    );
}

fn render_provider_summaries(
    service: &ApiService,
    providers: &[ProviderId],
) -> Result<(), AppError> {
    println!("\nProvider scorecards");
    for provider_id in providers {
        let summary = service.provider_summary(provider_id)?;
        println!(
            "  - {}: {} won | {} submitted | win rate {} | {} pending invitations",
            provider_id,
            summary.won_quotes,
            summary.total_submitted,
            summary.win_rate,
            summary.pending_invitations
        );
    }
    Ok(())
}

fn render_sweep(service: &ApiService, rfq_id: &RfqId, at: DateTime<Utc>) -> Result<(), AppError> {
    let report = service.sweep_expirations(at)?;
    let rfq = service.get_rfq(rfq_id)?;
    println!(
        "\nExpiration sweep at {}: {} RFQs, {} quotes expired; RFQ {} remains {}",
        at.date_naive(),
        report.expired_rfq_ids.len(),
        report.expired_quote_ids.len(),
        rfq.id,
        rfq.status.label()
    );
    Ok(())
}
