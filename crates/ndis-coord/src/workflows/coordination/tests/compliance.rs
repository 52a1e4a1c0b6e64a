use super::common::*;
use crate::workflows::coordination::compliance::{status, validate_document};
use crate::workflows::coordination::{
    AlertSeverity, CompliancePolicy, ComplianceStatus, DocumentType, DocumentViolation,
    ServiceCategory, VerificationStatus, WorkerId,
};

fn holder() -> WorkerId {
    WorkerId("wkr-compliance".to_string())
}

fn approved_expiring(expiry: chrono::NaiveDate) -> crate::workflows::coordination::ComplianceDocument {
    document(
        &holder(),
        DocumentType::FirstAid,
        date(2023, 3, 1),
        Some(expiry),
        VerificationStatus::Approved,
    )
}

#[test]
fn expired_only_after_the_expiry_date() {
    let on_expiry_day = approved_expiring(as_of());
    let day_before = approved_expiring(date(2026, 3, 1));

    assert_eq!(status(&on_expiry_day, as_of(), 30), ComplianceStatus::ExpiringSoon);
    assert_eq!(status(&day_before, as_of(), 30), ComplianceStatus::Expired);
}

#[test]
fn warning_window_is_inclusive() {
    let thirty_days_out = approved_expiring(date(2026, 4, 1));
    let thirty_one_days_out = approved_expiring(date(2026, 4, 2));

    assert_eq!(
        status(&thirty_days_out, as_of(), 30),
        ComplianceStatus::ExpiringSoon
    );
    assert_eq!(
        status(&thirty_one_days_out, as_of(), 30),
        ComplianceStatus::Compliant
    );
    assert_eq!(
        status(&thirty_days_out, as_of(), 7),
        ComplianceStatus::Compliant,
        "a shorter window delays the warning"
    );
}

#[test]
fn non_expiring_documents_stay_compliant() {
    let lifetime = document(
        &holder(),
        DocumentType::NdisOrientationModule,
        date(2020, 6, 1),
        None,
        VerificationStatus::Approved,
    );
    assert_eq!(status(&lifetime, date(2040, 1, 1), 30), ComplianceStatus::Compliant);
}

#[test]
fn unverified_documents_are_pending_regardless_of_dates() {
    for verification in [VerificationStatus::Pending, VerificationStatus::Rejected] {
        let doc = document(
            &holder(),
            DocumentType::Cpr,
            date(2025, 6, 1),
            Some(date(2027, 6, 1)),
            verification,
        );
        let result = status(&doc, as_of(), 30);
        assert_eq!(result, ComplianceStatus::Pending);
        assert!(!result.is_valid());
    }
}

#[test]
fn expiring_soon_still_counts_as_valid() {
    assert!(ComplianceStatus::Compliant.is_valid());
    assert!(ComplianceStatus::ExpiringSoon.is_valid());
    assert!(!ComplianceStatus::Expired.is_valid());
}

#[test]
fn validate_rejects_expiry_before_issue() {
    let doc = document(
        &holder(),
        DocumentType::PoliceCheck,
        date(2025, 6, 1),
        Some(date(2025, 5, 31)),
        VerificationStatus::Pending,
    );

    match validate_document(&doc) {
        Err(DocumentViolation::ExpiryBeforeIssue { issued, expiry }) => {
            assert_eq!(issued, date(2025, 6, 1));
            assert_eq!(expiry, date(2025, 5, 31));
        }
        other => panic!("expected expiry-before-issue, got {other:?}"),
    }
}

#[test]
fn mandated_set_is_baseline_plus_category_additions() {
    let policy = CompliancePolicy::default();
    let mandated = policy.mandated_for([ServiceCategory::Transport].iter());

    assert!(mandated.contains(&DocumentType::NdisWorkerScreening));
    assert!(mandated.contains(&DocumentType::FirstAid));
    assert!(mandated.contains(&DocumentType::DriversLicence));
    assert!(mandated.contains(&DocumentType::VehicleInsurance));
    assert!(!mandated.contains(&DocumentType::ManualHandlingTraining));

    let baseline = policy.mandated_for([ServiceCategory::SocialSupport].iter());
    assert_eq!(baseline, policy.baseline);
}

#[test]
fn current_document_is_latest_issued_and_not_rejected() {
    let mut worker = worker("wkr-renewal", cbd());
    worker
        .documents
        .retain(|doc| doc.document_type != DocumentType::FirstAid);

    let expired = document(
        &worker.id,
        DocumentType::FirstAid,
        date(2022, 2, 1),
        Some(date(2025, 2, 1)),
        VerificationStatus::Approved,
    );
    let renewal = document(
        &worker.id,
        DocumentType::FirstAid,
        date(2025, 1, 20),
        Some(date(2028, 1, 20)),
        VerificationStatus::Approved,
    );
    let rejected_rescan = document(
        &worker.id,
        DocumentType::FirstAid,
        date(2025, 2, 10),
        Some(date(2028, 2, 10)),
        VerificationStatus::Rejected,
    );
    worker
        .documents
        .extend([expired, renewal.clone(), rejected_rescan]);

    let policy = CompliancePolicy::default();
    let current = policy
        .current_document(&worker, DocumentType::FirstAid)
        .expect("current first aid document");
    assert_eq!(current.id, renewal.id);
    assert!(policy.is_worker_compliant(&worker, as_of()));
}

#[test]
fn pending_renewal_fails_closed() {
    let mut worker = worker("wkr-pending", cbd());
    worker.documents.push(document(
        &worker.id,
        DocumentType::Cpr,
        date(2026, 2, 20),
        Some(date(2027, 2, 20)),
        VerificationStatus::Pending,
    ));

    let policy = CompliancePolicy::default();
    assert!(!policy.is_worker_compliant(&worker, as_of()));
}

#[test]
fn alerts_cover_missing_expired_and_expiring_documents() {
    let mut worker = worker("wkr-alerts", cbd());
    worker.documents.retain(|doc| {
        !matches!(
            doc.document_type,
            DocumentType::Cpr | DocumentType::FirstAid | DocumentType::ManualHandlingTraining
        )
    });
    worker.documents.push(document(
        &worker.id,
        DocumentType::Cpr,
        date(2025, 2, 1),
        Some(date(2026, 2, 28)),
        VerificationStatus::Approved,
    ));
    worker.documents.push(document(
        &worker.id,
        DocumentType::FirstAid,
        date(2023, 3, 20),
        Some(date(2026, 3, 20)),
        VerificationStatus::Approved,
    ));

    let alerts = CompliancePolicy::default().alerts_for(&worker, as_of());
    assert_eq!(alerts.len(), 3);

    let severity_of = |document_type| {
        alerts
            .iter()
            .find(|alert| alert.document_type == document_type)
            .map(|alert| alert.severity)
    };
    assert_eq!(severity_of(DocumentType::Cpr), Some(AlertSeverity::Critical));
    assert_eq!(
        severity_of(DocumentType::ManualHandlingTraining),
        Some(AlertSeverity::Critical)
    );
    assert_eq!(severity_of(DocumentType::FirstAid), Some(AlertSeverity::Warning));

    let warning = alerts
        .iter()
        .find(|alert| alert.severity == AlertSeverity::Warning)
        .expect("warning alert");
    assert!(warning.detail.contains("18 day(s)"));
}
