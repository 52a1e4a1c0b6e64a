use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    ComplianceDocument, DocumentId, DocumentType, ServiceCategory, VerificationStatus, Worker,
    WorkerId,
};

pub const DEFAULT_WARNING_WINDOW_DAYS: i64 = 30;

/// Point-in-time standing of a single credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    ExpiringSoon,
    Expired,
    Pending,
}

impl ComplianceStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::ExpiringSoon => "expiring_soon",
            Self::Expired => "expired",
            Self::Pending => "pending",
        }
    }

    /// Expiring documents still count toward eligibility until their expiry date passes.
    pub const fn is_valid(self) -> bool {
        matches!(self, Self::Compliant | Self::ExpiringSoon)
    }
}

/// Evaluates a document against `as_of` using a warning window in days.
pub fn status(
    document: &ComplianceDocument,
    as_of: NaiveDate,
    warning_window_days: i64,
) -> ComplianceStatus {
    if document.verification_status != VerificationStatus::Approved {
        return ComplianceStatus::Pending;
    }

    match document.expiry_date {
        Some(expiry) if as_of > expiry => ComplianceStatus::Expired,
        Some(expiry) if (expiry - as_of).num_days() <= warning_window_days => {
            ComplianceStatus::ExpiringSoon
        }
        _ => ComplianceStatus::Compliant,
    }
}

/// Validation errors raised when a document is uploaded.
#[derive(Debug, thiserror::Error)]
pub enum DocumentViolation {
    #[error("expiry date {expiry} precedes issue date {issued}")]
    ExpiryBeforeIssue {
        issued: NaiveDate,
        expiry: NaiveDate,
    },
    #[error("document holder {found} does not match worker {expected}")]
    HolderMismatch { expected: WorkerId, found: WorkerId },
}

pub fn validate_document(document: &ComplianceDocument) -> Result<(), DocumentViolation> {
    if let Some(expiry) = document.expiry_date {
        if expiry < document.issued_date {
            return Err(DocumentViolation::ExpiryBeforeIssue {
                issued: document.issued_date,
                expiry,
            });
        }
    }
    Ok(())
}

/// Mandated credentials per service category plus the baseline every worker must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompliancePolicy {
    pub warning_window_days: i64,
    pub baseline: BTreeSet<DocumentType>,
    pub by_category: BTreeMap<ServiceCategory, BTreeSet<DocumentType>>,
}

impl Default for CompliancePolicy {
    fn default() -> Self {
        Self::standard(DEFAULT_WARNING_WINDOW_DAYS)
    }
}

impl CompliancePolicy {
    /// NDIS Practice Standards baseline with category-specific additions.
    pub fn standard(warning_window_days: i64) -> Self {
        use DocumentType::*;

        let baseline = BTreeSet::from([NdisWorkerScreening, FirstAid, Cpr, NdisOrientationModule]);

        let by_category = BTreeMap::from([
            (
                ServiceCategory::PersonalCare,
                BTreeSet::from([ManualHandlingTraining, InfectionControlTraining]),
            ),
            (
                ServiceCategory::RespiteCare,
                BTreeSet::from([ManualHandlingTraining, MedicationTraining]),
            ),
            (
                ServiceCategory::Transport,
                BTreeSet::from([DriversLicence, VehicleInsurance]),
            ),
            (
                ServiceCategory::CommunityAccess,
                BTreeSet::from([DriversLicence]),
            ),
            (
                ServiceCategory::BehaviourSupport,
                BTreeSet::from([PositiveBehaviourSupportTraining, PoliceCheck]),
            ),
            (
                ServiceCategory::Therapy,
                BTreeSet::from([PublicLiabilityInsurance]),
            ),
        ]);

        Self {
            warning_window_days: warning_window_days.max(0),
            baseline,
            by_category,
        }
    }

    pub fn status(&self, document: &ComplianceDocument, as_of: NaiveDate) -> ComplianceStatus {
        status(document, as_of, self.warning_window_days)
    }

    /// Union of the baseline and every category's additions.
    pub fn mandated_for<'a, I>(&self, categories: I) -> BTreeSet<DocumentType>
    where
        I: IntoIterator<Item = &'a ServiceCategory>,
    {
        let mut mandated = self.baseline.clone();
        for category in categories {
            if let Some(extra) = self.by_category.get(category) {
                mandated.extend(extra.iter().copied());
            }
        }
        mandated
    }

    /// Most recently issued document of a type that has not been rejected.
    pub fn current_document<'a>(
        &self,
        worker: &'a Worker,
        document_type: DocumentType,
    ) -> Option<&'a ComplianceDocument> {
        worker
            .documents
            .iter()
            .filter(|doc| doc.document_type == document_type)
            .filter(|doc| doc.verification_status != VerificationStatus::Rejected)
            .max_by(|a, b| {
                a.issued_date
                    .cmp(&b.issued_date)
                    .then_with(|| a.uploaded_at.cmp(&b.uploaded_at))
            })
    }

    /// Per-type findings for the given mandated set. Missing documents are reported as `None`.
    pub fn review(
        &self,
        worker: &Worker,
        mandated: &BTreeSet<DocumentType>,
        as_of: NaiveDate,
    ) -> Vec<DocumentFinding> {
        mandated
            .iter()
            .map(|document_type| {
                let current = self.current_document(worker, *document_type);
                DocumentFinding {
                    document_type: *document_type,
                    document_id: current.map(|doc| doc.id.clone()),
                    status: current.map(|doc| self.status(doc, as_of)),
                    expiry_date: current.and_then(|doc| doc.expiry_date),
                }
            })
            .collect()
    }

    /// Compliant iff every document mandated for the worker's own specializations is valid.
    pub fn is_worker_compliant(&self, worker: &Worker, as_of: NaiveDate) -> bool {
        let mandated = self.mandated_for(worker.specializations.iter());
        self.review(worker, &mandated, as_of)
            .iter()
            .all(DocumentFinding::is_valid)
    }

    /// Alerts for a worker's mandated credentials that need attention.
    pub fn alerts_for(&self, worker: &Worker, as_of: NaiveDate) -> Vec<ComplianceAlert> {
        let mandated = self.mandated_for(worker.specializations.iter());
        self.review(worker, &mandated, as_of)
            .into_iter()
            .filter_map(|finding| finding.alert(worker, as_of))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentFinding {
    pub document_type: DocumentType,
    pub document_id: Option<DocumentId>,
    pub status: Option<ComplianceStatus>,
    pub expiry_date: Option<NaiveDate>,
}

impl DocumentFinding {
    pub fn is_valid(&self) -> bool {
        self.status.map(ComplianceStatus::is_valid).unwrap_or(false)
    }

    fn alert(self, worker: &Worker, as_of: NaiveDate) -> Option<ComplianceAlert> {
        let (severity, detail) = match (self.status, self.expiry_date) {
            (None, _) => (
                AlertSeverity::Critical,
                format!("{} has not been uploaded", self.document_type.label()),
            ),
            (Some(ComplianceStatus::Pending), _) => (
                AlertSeverity::Critical,
                format!("{} is awaiting verification", self.document_type.label()),
            ),
            (Some(ComplianceStatus::Expired), Some(expiry)) => (
                AlertSeverity::Critical,
                format!("{} expired on {}", self.document_type.label(), expiry),
            ),
            (Some(ComplianceStatus::ExpiringSoon), Some(expiry)) => (
                AlertSeverity::Warning,
                format!(
                    "{} expires in {} day(s) on {}",
                    self.document_type.label(),
                    (expiry - as_of).num_days(),
                    expiry
                ),
            ),
            _ => return None,
        };

        Some(ComplianceAlert {
            worker_id: worker.id.clone(),
            worker_name: worker.name.clone(),
            document_type: self.document_type,
            severity,
            severity_label: severity.label(),
            detail,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

impl AlertSeverity {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceAlert {
    pub worker_id: WorkerId,
    pub worker_name: String,
    pub document_type: DocumentType,
    pub severity: AlertSeverity,
    pub severity_label: &'static str,
    pub detail: String,
}
