use crate::infra::{load_rate_schedule, parse_date, parse_time};
use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::Args;
use ndis_coord::error::AppError;
use ndis_coord::workflows::coordination::{
    CandidateSearch, CoordinationConfig, CoordinationError, CoordinationService, DocumentType,
    DocumentUpload, EligibilityVerdict, GeoPoint, InMemoryCoordinationStore, InMemoryNotifier,
    ParticipantId, PayBreakdown, PayCalculator, PayQuote, RequestSubmission, ServiceCategory,
    ServiceRequestStatus, TimeWindow, TimesheetSubmission, Urgency, VerificationStatus, Worker,
    WorkerRegistration,
};
use rust_decimal::Decimal;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = CoordinationService<InMemoryCoordinationStore, InMemoryNotifier>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Service date (YYYY-MM-DD). Defaults to tomorrow.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    /// CSV of `classification,base_rate` rows merged into the standard rate table
    #[arg(long)]
    pub(crate) rates_csv: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub(crate) struct PayQuoteArgs {
    /// SCHADS classification key, e.g. scs_level_2
    #[arg(long)]
    pub(crate) classification: String,
    /// Shift date (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: NaiveDate,
    /// Shift start (HH:MM)
    #[arg(long, value_parser = parse_time)]
    pub(crate) start: NaiveTime,
    /// Shift end (HH:MM)
    #[arg(long, value_parser = parse_time)]
    pub(crate) end: NaiveTime,
    /// The shift finishes on the day after `--date`
    #[arg(long)]
    pub(crate) ends_next_day: bool,
    /// Unpaid break in minutes
    #[arg(long, default_value_t = 0)]
    pub(crate) break_minutes: u32,
    /// Travel time in minutes, used when no distance is recorded
    #[arg(long, default_value_t = 0)]
    pub(crate) travel_minutes: u32,
    /// Recorded travel distance in kilometres
    #[arg(long)]
    pub(crate) travel_km: Option<Decimal>,
    /// CSV of `classification,base_rate` rows merged into the standard rate table
    #[arg(long)]
    pub(crate) rates_csv: Option<PathBuf>,
    /// Print the breakdown as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_pay_quote(args: PayQuoteArgs) -> Result<(), AppError> {
    let schedule = load_rate_schedule(args.rates_csv.as_deref())?;
    let quote = PayQuote {
        classification: args.classification,
        date: args.date,
        start_time: args.start,
        end_time: args.end,
        ends_next_day: args.ends_next_day,
        break_minutes: args.break_minutes,
        travel_minutes: args.travel_minutes,
        travel_kilometres: args.travel_km,
    };

    let breakdown = PayCalculator::new()
        .calculate_scheduled(&quote.to_timesheet(), &quote.classification, &schedule)
        .map_err(CoordinationError::from)?;

    if args.json {
        match serde_json::to_string_pretty(&breakdown) {
            Ok(json) => println!("{json}"),
            Err(err) => println!("Breakdown unavailable as JSON: {err}"),
        }
    } else {
        println!(
            "Pay quote for {} on {} ({} to {})",
            quote.classification, quote.date, quote.start_time, quote.end_time
        );
        render_breakdown(&breakdown);
    }
    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let service_date = args
        .date
        .unwrap_or_else(|| Local::now().date_naive() + Duration::days(1));
    let intake = at(service_date - Duration::days(1), 9);

    let notifier = InMemoryNotifier::default();
    let service: DemoService = CoordinationService::new(
        Arc::new(InMemoryCoordinationStore::default()),
        Arc::new(notifier.clone()),
        CoordinationConfig::default(),
        load_rate_schedule(args.rates_csv.as_deref())?,
    );

    println!("NDIS service coordination demo");
    println!("Service date: {service_date}");

    onboard(
        &service,
        "Ava Nguyen",
        GeoPoint::new(-37.8060, 144.9630),
        "scs_level_3",
        service_date,
        intake,
        &[],
    )?;
    onboard(
        &service,
        "Ben Costa",
        GeoPoint::new(-37.8550, 144.9930),
        "scs_level_2",
        service_date,
        intake,
        &[],
    )?;
    onboard(
        &service,
        "Chloe Park",
        GeoPoint::new(-37.8140, 144.9660),
        "scs_level_2",
        service_date,
        intake,
        &[DocumentType::PoliceCheck],
    )?;

    let alerts = service.compliance_alerts(intake.date())?;
    if alerts.is_empty() {
        println!("\nCompliance alerts: none");
    } else {
        println!("\nCompliance alerts");
        for alert in &alerts {
            println!(
                "  [{}] {} - {}: {}",
                alert.severity_label,
                alert.worker_name,
                alert.document_type.label(),
                alert.detail
            );
        }
    }

    let request = service.submit_request(
        RequestSubmission {
            participant_id: ParticipantId("ndis-430001".to_string()),
            category: ServiceCategory::PersonalCare,
            required_specializations: BTreeSet::from([ServiceCategory::PersonalCare]),
            location: GeoPoint::new(-37.8001, 144.9671),
            preferred_window: TimeWindow::new(at(service_date, 15), at(service_date, 20)),
            urgency: Urgency::High,
        },
        "participant",
        intake,
    )?;
    service.begin_review(&request.id, "team_leader", intake)?;
    println!(
        "\nService request {} ({}, {} to {})",
        request.id,
        request.category.label(),
        request.preferred_window.start,
        request.preferred_window.end
    );

    match service.candidates(&request.id, intake)? {
        CandidateSearch::Ranked {
            candidates,
            excluded,
            ..
        } => {
            println!("Ranked candidates");
            for candidate in &candidates {
                println!(
                    "  #{} {} score {:.2}",
                    candidate.rank, candidate.worker_name, candidate.score
                );
                for component in &candidate.components {
                    println!(
                        "      {:?}: {:.2} x {:.2} ({})",
                        component.factor, component.sub_score, component.weight, component.notes
                    );
                }
            }
            render_exclusions(&service, &excluded);
        }
        CandidateSearch::NoEligibleWorker { excluded, .. } => {
            println!("No eligible worker; widen the search");
            render_exclusions(&service, &excluded);
            return Ok(());
        }
    }

    let assignment = service.assign_best_match(
        &request.id,
        ServiceRequestStatus::UnderReview,
        "team_leader",
        intake,
    )?;
    println!(
        "\nAssigned {} to {} (match {:.2})",
        assignment.worker_id, request.id, assignment.match_score_at_assignment
    );
    service.confirm(&request.id, "admin", intake)?;

    let shift_end = at(service_date, 20) + Duration::minutes(30);
    let timesheet = service.submit_timesheet(
        TimesheetSubmission {
            assignment_id: assignment.id.clone(),
            date: service_date,
            start_time: at(service_date, 15).time(),
            end_time: shift_end.time(),
            ends_next_day: false,
            break_minutes: 30,
            travel_minutes: 0,
            travel_kilometres: Some(Decimal::new(12, 0)),
            notes: "Evening routine and medication prompt".to_string(),
            supersedes: None,
        },
        "support_worker",
        shift_end,
    )?;

    let invoice = service.approve_timesheet(&timesheet.id, "team_leader", shift_end)?;
    println!("\nInvoice {} for timesheet {}", invoice.id, timesheet.id);
    render_breakdown(&invoice.breakdown);

    let completed = service.complete_due(shift_end, "system")?;
    for request in &completed {
        println!("\nRequest {} marked {}", request.id, request.status.label());
    }

    println!("\nLedger events: {}", service.events()?.len());
    let sent = notifier.sent();
    if sent.is_empty() {
        println!("Notifications: none dispatched");
    } else {
        println!("Notifications");
        for notification in sent {
            println!("  {} -> {}", notification.template, notification.recipient);
        }
    }

    Ok(())
}

fn at(date: NaiveDate, hour: i64) -> NaiveDateTime {
    date.and_time(NaiveTime::default()) + Duration::hours(hour)
}

/// Registers a personal care worker and approves their mandated documents, leaving out any in
/// `withheld`. First aid lapses shortly after the service date to surface an expiry warning.
fn onboard(
    service: &DemoService,
    name: &str,
    location: GeoPoint,
    classification: &str,
    service_date: NaiveDate,
    intake: NaiveDateTime,
    withheld: &[DocumentType],
) -> Result<Worker, AppError> {
    let worker = service.register_worker(
        WorkerRegistration {
            name: name.to_string(),
            location,
            hourly_rate: Decimal::new(4200, 2),
            classification: classification.to_string(),
            working_radius_km: 20.0,
            specializations: BTreeSet::from([ServiceCategory::PersonalCare]),
            availability: vec![TimeWindow::new(at(service_date, 7), at(service_date, 22))],
            ratings: vec![4.5, 4.0, 5.0],
        },
        "admin",
        intake,
    )?;

    let mandated = service
        .policy()
        .mandated_for([ServiceCategory::PersonalCare].iter());
    for document_type in mandated.into_iter().filter(|kind| !withheld.contains(kind)) {
        let expiry_date = if document_type == DocumentType::FirstAid {
            service_date + Duration::days(10)
        } else {
            service_date + Duration::days(730)
        };
        let document = service.upload_document(
            &worker.id,
            DocumentUpload {
                document_type,
                issued_date: service_date - Duration::days(365),
                expiry_date: Some(expiry_date),
                holder_id: Some(worker.id.clone()),
            },
            "support_worker",
            intake,
        )?;
        service.verify_document(
            &worker.id,
            &document.id,
            VerificationStatus::Approved,
            "compliance",
            intake,
        )?;
    }

    Ok(service.worker(&worker.id)?)
}

fn render_exclusions(
    service: &DemoService,
    excluded: &[EligibilityVerdict],
) {
    if excluded.is_empty() {
        return;
    }
    println!("Excluded workers");
    for verdict in excluded {
        let name = service
            .worker(&verdict.worker_id)
            .map(|worker| worker.name)
            .unwrap_or_else(|_| verdict.worker_id.to_string());
        let reasons: Vec<String> = verdict.reasons.iter().map(|reason| reason.summary()).collect();
        println!("  {}: {}", name, reasons.join("; "));
    }
}

fn render_breakdown(breakdown: &PayBreakdown) {
    println!(
        "  Base: {} h x ${} = ${}",
        breakdown.billable_hours, breakdown.base_rate, breakdown.base_amount
    );
    for penalty in &breakdown.penalties {
        println!(
            "  {}: {} h at x{} = +${}",
            penalty.kind.label(),
            penalty.applicable_hours,
            penalty.rate_multiplier,
            penalty.amount
        );
    }
    for allowance in &breakdown.allowances {
        println!("  Allowance ({}): ${}", allowance.detail, allowance.amount);
    }
    println!(
        "  Total: ${} (rates effective {})",
        breakdown.total, breakdown.rate_table_effective_from
    );
}
