use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::compliance::{
    validate_document, ComplianceAlert, CompliancePolicy, DocumentViolation,
    DEFAULT_WARNING_WINDOW_DAYS,
};
use super::domain::{
    Assignment, AssignmentId, AssignmentStatus, ComplianceDocument, DocumentId, DocumentType,
    GeoPoint, InvoiceId, ParticipantId, ServiceCategory, ServiceRequest, ServiceRequestId,
    ServiceRequestStatus, TimeWindow, Timesheet, TimesheetId, TimesheetStatus, Urgency,
    VerificationStatus, Worker, WorkerId,
};
use super::eligibility::{EligibilityFilter, EligibilityVerdict};
use super::ledger::{Invoice, LedgerEvent, LedgerEventKind};
use super::matching::{MatchScorer, MatchWeights, RankedCandidate};
use super::pay::{PayBreakdown, PayCalculator, PayError, RateSchedule};
use super::repository::{
    CoordinationRepository, Notification, NotificationError, NotificationPublisher,
    RepositoryError,
};

const CANCELLED_SERVICE_REASON: &str = "service request cancelled";

/// Tunables for eligibility and matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinationConfig {
    pub compliance_warning_days: i64,
    pub match_weights: MatchWeights,
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            compliance_warning_days: DEFAULT_WARNING_WINDOW_DAYS,
            match_weights: MatchWeights::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkerRegistration {
    pub name: String,
    pub location: GeoPoint,
    pub hourly_rate: Decimal,
    pub classification: String,
    pub working_radius_km: f64,
    pub specializations: BTreeSet<ServiceCategory>,
    #[serde(default)]
    pub availability: Vec<TimeWindow>,
    #[serde(default)]
    pub ratings: Vec<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentUpload {
    pub document_type: DocumentType,
    pub issued_date: NaiveDate,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    /// When supplied it must match the worker the document is uploaded against.
    #[serde(default)]
    pub holder_id: Option<WorkerId>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RequestSubmission {
    pub participant_id: ParticipantId,
    pub category: ServiceCategory,
    #[serde(default)]
    pub required_specializations: BTreeSet<ServiceCategory>,
    pub location: GeoPoint,
    pub preferred_window: TimeWindow,
    pub urgency: Urgency,
}

/// Admin assignment carrying the request status the admin last observed.
#[derive(Debug, Clone, Deserialize)]
pub struct AssignCommand {
    pub worker_id: WorkerId,
    pub expected_status: ServiceRequestStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimesheetSubmission {
    pub assignment_id: AssignmentId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub ends_next_day: bool,
    #[serde(default)]
    pub break_minutes: u32,
    #[serde(default)]
    pub travel_minutes: u32,
    #[serde(default)]
    pub travel_kilometres: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
    /// Rejected timesheet being replaced. Defaults to the latest rejected one.
    #[serde(default)]
    pub supersedes: Option<TimesheetId>,
}

/// Shift details priced without touching the ledger.
#[derive(Debug, Clone, Deserialize)]
pub struct PayQuote {
    pub classification: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(default)]
    pub ends_next_day: bool,
    #[serde(default)]
    pub break_minutes: u32,
    #[serde(default)]
    pub travel_minutes: u32,
    #[serde(default)]
    pub travel_kilometres: Option<Decimal>,
}

impl PayQuote {
    pub fn to_timesheet(&self) -> Timesheet {
        Timesheet {
            id: TimesheetId("quote".to_string()),
            assignment_id: AssignmentId("quote".to_string()),
            date: self.date,
            start_time: self.start_time,
            end_time: self.end_time,
            ends_next_day: self.ends_next_day,
            break_minutes: self.break_minutes,
            travel_minutes: self.travel_minutes,
            travel_kilometres: self.travel_kilometres,
            notes: String::new(),
            status: TimesheetStatus::Submitted,
            supersedes: None,
            submitted_at: self.date.and_time(self.start_time),
        }
    }
}

/// Candidate search result. An empty pool is an outcome, not an error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CandidateSearch {
    Ranked {
        request_id: ServiceRequestId,
        candidates: Vec<RankedCandidate>,
        excluded: Vec<EligibilityVerdict>,
    },
    NoEligibleWorker {
        request_id: ServiceRequestId,
        excluded: Vec<EligibilityVerdict>,
    },
}

impl CandidateSearch {
    pub fn candidates(&self) -> &[RankedCandidate] {
        match self {
            Self::Ranked { candidates, .. } => candidates,
            Self::NoEligibleWorker { .. } => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cancellation {
    pub request: ServiceRequest,
    pub voided_assignment: Option<Assignment>,
    /// Submitted timesheets rejected because the service will not be delivered.
    pub withdrawn_timesheets: Vec<Timesheet>,
}

/// Composes eligibility, matching, pay, and the ledger over a repository and notifier.
pub struct CoordinationService<R, N> {
    repository: Arc<R>,
    notifier: Arc<N>,
    eligibility: EligibilityFilter,
    scorer: MatchScorer,
    calculator: PayCalculator,
    rates: RateSchedule,
    sequence: AtomicU64,
}

impl<R, N> CoordinationService<R, N>
where
    R: CoordinationRepository + 'static,
    N: NotificationPublisher + 'static,
{
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        config: CoordinationConfig,
        rates: RateSchedule,
    ) -> Self {
        let policy = CompliancePolicy::standard(config.compliance_warning_days);
        Self {
            repository,
            notifier,
            eligibility: EligibilityFilter::new(policy),
            scorer: MatchScorer::new(config.match_weights),
            calculator: PayCalculator::new(),
            rates,
            sequence: AtomicU64::new(1),
        }
    }

    pub fn policy(&self) -> &CompliancePolicy {
        self.eligibility.policy()
    }

    pub fn rates(&self) -> &RateSchedule {
        &self.rates
    }

    fn next_id(&self, prefix: &str) -> String {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{id:06}")
    }

    fn record(
        &self,
        actor: &str,
        at: NaiveDateTime,
        kind: LedgerEventKind,
    ) -> Result<LedgerEvent, CoordinationError> {
        Ok(self.repository.append_event(actor, at, kind)?)
    }

    /// Delivery failures are logged; the ledger change they describe has already committed.
    fn notify(&self, template: &str, recipient: &str, details: &[(&str, String)]) {
        let notification = Notification {
            template: template.to_string(),
            recipient: recipient.to_string(),
            details: details
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect::<BTreeMap<_, _>>(),
        };

        if let Err(error) = self
            .notifier
            .publish(notification)
            .map_err(CoordinationError::from)
        {
            warn!(template, recipient, %error, "notification not delivered");
        }
    }

    pub fn register_worker(
        &self,
        registration: WorkerRegistration,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<Worker, CoordinationError> {
        if registration.name.trim().is_empty() {
            return Err(CoordinationError::invalid("worker name is required"));
        }
        if !registration.working_radius_km.is_finite() || registration.working_radius_km <= 0.0 {
            return Err(CoordinationError::invalid(
                "working radius must be a positive number of kilometres",
            ));
        }
        if registration.hourly_rate <= Decimal::ZERO {
            return Err(CoordinationError::invalid("hourly rate must be positive"));
        }
        if registration
            .ratings
            .iter()
            .any(|rating| !(1.0..=5.0).contains(rating))
        {
            return Err(CoordinationError::invalid("ratings must be between 1 and 5"));
        }
        if registration
            .availability
            .iter()
            .any(|window| window.end <= window.start)
        {
            return Err(CoordinationError::invalid(
                "availability windows must end after they start",
            ));
        }

        let worker = Worker {
            id: WorkerId(self.next_id("wkr")),
            name: registration.name.trim().to_string(),
            location: registration.location,
            hourly_rate: registration.hourly_rate,
            classification: registration.classification,
            working_radius_km: registration.working_radius_km,
            specializations: registration.specializations,
            documents: Vec::new(),
            availability: registration.availability,
            ratings: registration.ratings,
            registered_at: at,
        };

        let stored = self.repository.insert_worker(worker)?;
        self.record(
            actor,
            at,
            LedgerEventKind::WorkerRegistered {
                worker_id: stored.id.clone(),
            },
        )?;
        info!(worker_id = %stored.id, classification = %stored.classification, "worker registered");
        Ok(stored)
    }

    pub fn worker(&self, worker_id: &WorkerId) -> Result<Worker, CoordinationError> {
        self.repository
            .fetch_worker(worker_id)?
            .ok_or_else(|| CoordinationError::not_found("worker", worker_id))
    }

    /// Stores a new document as pending. Renewals are new documents; older ones are retained.
    pub fn upload_document(
        &self,
        worker_id: &WorkerId,
        upload: DocumentUpload,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<ComplianceDocument, CoordinationError> {
        let worker = self.worker(worker_id)?;
        if let Some(holder) = upload.holder_id {
            if holder != worker.id {
                return Err(DocumentViolation::HolderMismatch {
                    expected: worker.id,
                    found: holder,
                }
                .into());
            }
        }

        let document = ComplianceDocument {
            id: DocumentId(self.next_id("doc")),
            document_type: upload.document_type,
            holder_id: worker.id.clone(),
            issued_date: upload.issued_date,
            expiry_date: upload.expiry_date,
            verification_status: VerificationStatus::Pending,
            uploaded_at: at,
        };
        validate_document(&document)?;

        let stored = self.repository.append_document(&worker.id, document)?;
        self.record(
            actor,
            at,
            LedgerEventKind::DocumentUploaded {
                worker_id: worker.id.clone(),
                document_id: stored.id.clone(),
            },
        )?;
        info!(
            worker_id = %worker.id,
            document_id = %stored.id,
            document_type = stored.document_type.label(),
            "compliance document uploaded"
        );
        Ok(stored)
    }

    pub fn verify_document(
        &self,
        worker_id: &WorkerId,
        document_id: &DocumentId,
        decision: VerificationStatus,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<ComplianceDocument, CoordinationError> {
        let worker = self.worker(worker_id)?;
        let current = worker
            .document(document_id)
            .ok_or_else(|| CoordinationError::not_found("compliance document", document_id))?
            .verification_status;

        if !current.can_transition_to(decision) {
            return Err(CoordinationError::IllegalTransition {
                entity: "compliance document",
                from: current.label(),
                to: decision.label(),
            });
        }

        let document = self
            .repository
            .verify_document(worker_id, document_id, current, decision)?;
        self.record(
            actor,
            at,
            LedgerEventKind::DocumentVerified {
                worker_id: worker_id.clone(),
                document_id: document_id.clone(),
                status: decision,
            },
        )?;
        info!(
            %worker_id,
            %document_id,
            status = decision.label(),
            "compliance document verified"
        );
        Ok(document)
    }

    /// Alerts across the roster, critical first.
    pub fn compliance_alerts(
        &self,
        as_of: NaiveDate,
    ) -> Result<Vec<ComplianceAlert>, CoordinationError> {
        let policy = self.eligibility.policy();
        let mut alerts: Vec<ComplianceAlert> = self
            .repository
            .workers()?
            .iter()
            .flat_map(|worker| policy.alerts_for(worker, as_of))
            .collect();

        alerts.sort_by(|a, b| {
            b.severity
                .cmp(&a.severity)
                .then_with(|| a.worker_id.cmp(&b.worker_id))
                .then_with(|| a.document_type.cmp(&b.document_type))
        });
        Ok(alerts)
    }

    pub fn submit_request(
        &self,
        submission: RequestSubmission,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<ServiceRequest, CoordinationError> {
        let window = submission.preferred_window;
        if window.end <= window.start {
            return Err(CoordinationError::invalid(
                "preferred window must end after it starts",
            ));
        }
        if !submission.location.latitude.is_finite() || !submission.location.longitude.is_finite()
        {
            return Err(CoordinationError::invalid("request location is not a valid point"));
        }

        let mut required_specializations = submission.required_specializations;
        required_specializations.insert(submission.category);

        let request = ServiceRequest {
            id: ServiceRequestId(self.next_id("req")),
            participant_id: submission.participant_id,
            category: submission.category,
            required_specializations,
            location: submission.location,
            preferred_window: window,
            urgency: submission.urgency,
            status: ServiceRequestStatus::Submitted,
            submitted_at: at,
        };

        let stored = self.repository.insert_request(request)?;
        self.record(
            actor,
            at,
            LedgerEventKind::RequestSubmitted {
                request_id: stored.id.clone(),
            },
        )?;
        info!(
            request_id = %stored.id,
            category = stored.category.label(),
            urgency = ?stored.urgency,
            "service request submitted"
        );
        Ok(stored)
    }

    pub fn request(&self, request_id: &ServiceRequestId) -> Result<ServiceRequest, CoordinationError> {
        self.repository
            .fetch_request(request_id)?
            .ok_or_else(|| CoordinationError::not_found("service request", request_id))
    }

    pub fn begin_review(
        &self,
        request_id: &ServiceRequestId,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<ServiceRequest, CoordinationError> {
        self.advance(request_id, ServiceRequestStatus::UnderReview, actor, at)
    }

    /// Eligible workers ranked by match score, plus the exclusion reasons for everyone else.
    pub fn candidates(
        &self,
        request_id: &ServiceRequestId,
        at: NaiveDateTime,
    ) -> Result<CandidateSearch, CoordinationError> {
        let request = self.request(request_id)?;
        let workers = self.repository.workers()?;
        let verdicts = self
            .eligibility
            .assess_all(&request, &workers, evaluation_date(&request, at));

        let eligible: Vec<&Worker> = workers
            .iter()
            .zip(&verdicts)
            .filter(|(_, verdict)| verdict.is_eligible())
            .map(|(worker, _)| worker)
            .collect();
        let excluded: Vec<EligibilityVerdict> = verdicts
            .into_iter()
            .filter(|verdict| !verdict.is_eligible())
            .collect();

        if eligible.is_empty() {
            warn!(
                request_id = %request.id,
                excluded = excluded.len(),
                "no eligible worker for request"
            );
            return Ok(CandidateSearch::NoEligibleWorker {
                request_id: request.id,
                excluded,
            });
        }

        let open = self.open_assignment_counts()?;
        let candidates = self.scorer.rank(&request, &eligible, &open);
        Ok(CandidateSearch::Ranked {
            request_id: request.id,
            candidates,
            excluded,
        })
    }

    fn open_assignment_counts(&self) -> Result<HashMap<WorkerId, usize>, CoordinationError> {
        let statuses: HashMap<ServiceRequestId, ServiceRequestStatus> = self
            .repository
            .requests(None)?
            .into_iter()
            .map(|request| (request.id, request.status))
            .collect();

        let mut counts = HashMap::new();
        for assignment in self.repository.active_assignments()? {
            let open = statuses
                .get(&assignment.service_request_id)
                .map(|status| !status.is_terminal())
                .unwrap_or(false);
            if open {
                *counts.entry(assignment.worker_id).or_insert(0) += 1;
            }
        }
        Ok(counts)
    }

    /// Assigns a worker if the request is still in the status the admin observed.
    pub fn assign(
        &self,
        request_id: &ServiceRequestId,
        command: AssignCommand,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<Assignment, CoordinationError> {
        let request = self.request(request_id)?;
        if request.status != command.expected_status {
            return Err(CoordinationError::ConcurrentModification {
                entity: "service request",
                id: request.id.to_string(),
                expected: command.expected_status.label(),
                found: request.status.label(),
            });
        }
        ensure_request_transition(request.status, ServiceRequestStatus::Assigned)?;

        let worker = self.worker(&command.worker_id)?;
        let verdict = self
            .eligibility
            .assess(&request, &worker, evaluation_date(&request, at));
        if !verdict.is_eligible() {
            return Err(CoordinationError::WorkerNotEligible {
                worker_id: worker.id,
                reasons: verdict.reasons.iter().map(|reason| reason.summary()).collect(),
            });
        }

        let score = self.scorer.score(&worker, &request);
        let assignment = Assignment {
            id: AssignmentId(self.next_id("asg")),
            service_request_id: request.id.clone(),
            worker_id: worker.id.clone(),
            assigned_at: at,
            assigned_by: actor.to_string(),
            match_score_at_assignment: score,
            status: AssignmentStatus::Active,
            voided_at: None,
        };

        self.repository
            .assign(&request.id, command.expected_status, assignment.clone())?;

        self.record(
            actor,
            at,
            LedgerEventKind::AssignmentCreated {
                assignment_id: assignment.id.clone(),
                request_id: request.id.clone(),
                worker_id: worker.id.clone(),
                match_score: score,
            },
        )?;
        self.record(
            actor,
            at,
            LedgerEventKind::RequestStatusChanged {
                request_id: request.id.clone(),
                from: command.expected_status,
                to: ServiceRequestStatus::Assigned,
            },
        )?;
        info!(
            request_id = %request.id,
            worker_id = %worker.id,
            assignment_id = %assignment.id,
            match_score = score,
            "worker assigned"
        );

        self.notify(
            "assignment_offered",
            worker.id.as_str(),
            &[
                ("request_id", request.id.to_string()),
                ("category", request.category.label().to_string()),
                ("starts_at", request.preferred_window.start.to_string()),
            ],
        );

        Ok(assignment)
    }

    /// Assigns the top-ranked eligible worker.
    pub fn assign_best_match(
        &self,
        request_id: &ServiceRequestId,
        expected_status: ServiceRequestStatus,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<Assignment, CoordinationError> {
        let search = self.candidates(request_id, at)?;
        let best = search
            .candidates()
            .first()
            .map(|candidate| candidate.worker_id.clone())
            .ok_or_else(|| CoordinationError::NoEligibleWorker {
                request_id: request_id.clone(),
            })?;

        self.assign(
            request_id,
            AssignCommand {
                worker_id: best,
                expected_status,
            },
            actor,
            at,
        )
    }

    pub fn confirm(
        &self,
        request_id: &ServiceRequestId,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<ServiceRequest, CoordinationError> {
        let confirmed = self.advance(request_id, ServiceRequestStatus::Confirmed, actor, at)?;
        self.notify(
            "service_confirmed",
            confirmed.participant_id.as_str(),
            &[
                ("request_id", confirmed.id.to_string()),
                ("starts_at", confirmed.preferred_window.start.to_string()),
            ],
        );
        Ok(confirmed)
    }

    /// Cancels the request and voids its active assignment. The assignment record is kept.
    pub fn cancel(
        &self,
        request_id: &ServiceRequestId,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<Cancellation, CoordinationError> {
        let current = self.request(request_id)?;
        ensure_request_transition(current.status, ServiceRequestStatus::Cancelled)?;

        let (request, voided) = self
            .repository
            .cancel_request(request_id, current.status, at)?;

        self.record(
            actor,
            at,
            LedgerEventKind::RequestStatusChanged {
                request_id: request.id.clone(),
                from: current.status,
                to: ServiceRequestStatus::Cancelled,
            },
        )?;

        if let Some(assignment) = &voided {
            self.record(
                actor,
                at,
                LedgerEventKind::AssignmentVoided {
                    assignment_id: assignment.id.clone(),
                    request_id: request.id.clone(),
                },
            )?;
            self.notify(
                "assignment_cancelled",
                assignment.worker_id.as_str(),
                &[("request_id", request.id.to_string())],
            );
        }

        let mut withdrawn_timesheets = Vec::new();
        if let Some(assignment) = &voided {
            for open in self
                .repository
                .timesheets_for_assignment(&assignment.id)?
                .into_iter()
                .filter(|timesheet| timesheet.status == TimesheetStatus::Submitted)
            {
                let rejected = self.repository.transition_timesheet(
                    &open.id,
                    TimesheetStatus::Submitted,
                    TimesheetStatus::Rejected,
                )?;
                self.record(
                    actor,
                    at,
                    LedgerEventKind::TimesheetRejected {
                        timesheet_id: rejected.id.clone(),
                        reason: CANCELLED_SERVICE_REASON.to_string(),
                    },
                )?;
                withdrawn_timesheets.push(rejected);
            }
        }

        info!(
            request_id = %request.id,
            from = current.status.label(),
            voided = voided.is_some(),
            withdrawn_timesheets = withdrawn_timesheets.len(),
            "service request cancelled"
        );
        Ok(Cancellation {
            request,
            voided_assignment: voided,
            withdrawn_timesheets,
        })
    }

    pub fn active_assignments(&self) -> Result<Vec<Assignment>, CoordinationError> {
        Ok(self.repository.active_assignments()?)
    }

    fn advance(
        &self,
        request_id: &ServiceRequestId,
        next: ServiceRequestStatus,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<ServiceRequest, CoordinationError> {
        let current = self.request(request_id)?;
        ensure_request_transition(current.status, next)?;

        let updated = self
            .repository
            .transition_request(request_id, current.status, next)?;
        self.record(
            actor,
            at,
            LedgerEventKind::RequestStatusChanged {
                request_id: request_id.clone(),
                from: current.status,
                to: next,
            },
        )?;
        info!(
            %request_id,
            from = current.status.label(),
            to = next.label(),
            "service request transitioned"
        );
        Ok(updated)
    }

    /// Records a timesheet against a confirmed, active assignment. A resubmission supersedes the
    /// latest rejected timesheet unless another rejected one is named.
    pub fn submit_timesheet(
        &self,
        submission: TimesheetSubmission,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<Timesheet, CoordinationError> {
        let assignment = self
            .repository
            .fetch_assignment(&submission.assignment_id)?
            .ok_or_else(|| CoordinationError::not_found("assignment", &submission.assignment_id))?;
        if !assignment.is_active() {
            return Err(CoordinationError::invalid_timesheet(format!(
                "assignment {} has been voided",
                assignment.id
            )));
        }

        let request = self.request(&assignment.service_request_id)?;
        if request.status != ServiceRequestStatus::Confirmed {
            return Err(CoordinationError::invalid_timesheet(format!(
                "service request {} is {}; timesheets need a confirmed request",
                request.id,
                request.status.label()
            )));
        }

        let prior = self.repository.timesheets_for_assignment(&assignment.id)?;
        let supersedes = match submission.supersedes {
            Some(id) => {
                let rejected = prior
                    .iter()
                    .any(|timesheet| timesheet.id == id && timesheet.status == TimesheetStatus::Rejected);
                if !rejected {
                    return Err(CoordinationError::invalid_timesheet(format!(
                        "timesheet {id} is not a rejected timesheet for this assignment"
                    )));
                }
                Some(id)
            }
            None => prior
                .iter()
                .rev()
                .find(|timesheet| timesheet.status == TimesheetStatus::Rejected)
                .map(|timesheet| timesheet.id.clone()),
        };

        let timesheet = Timesheet {
            id: TimesheetId(self.next_id("ts")),
            assignment_id: assignment.id.clone(),
            date: submission.date,
            start_time: submission.start_time,
            end_time: submission.end_time,
            ends_next_day: submission.ends_next_day,
            break_minutes: submission.break_minutes,
            travel_minutes: submission.travel_minutes,
            travel_kilometres: submission.travel_kilometres,
            notes: submission.notes,
            status: TimesheetStatus::Submitted,
            supersedes,
            submitted_at: at,
        };
        validate_shift(&timesheet)?;

        let stored = self.repository.insert_timesheet(timesheet)?;
        self.record(
            actor,
            at,
            LedgerEventKind::TimesheetSubmitted {
                timesheet_id: stored.id.clone(),
                assignment_id: stored.assignment_id.clone(),
                supersedes: stored.supersedes.clone(),
            },
        )?;
        info!(
            timesheet_id = %stored.id,
            assignment_id = %stored.assignment_id,
            billable_minutes = stored.billable_minutes(),
            resubmission = stored.supersedes.is_some(),
            "timesheet submitted"
        );
        Ok(stored)
    }

    pub fn timesheet(&self, timesheet_id: &TimesheetId) -> Result<Timesheet, CoordinationError> {
        self.repository
            .fetch_timesheet(timesheet_id)?
            .ok_or_else(|| CoordinationError::not_found("timesheet", timesheet_id))
    }

    /// Prices the timesheet, approves it, and freezes the breakdown into an invoice.
    pub fn approve_timesheet(
        &self,
        timesheet_id: &TimesheetId,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<Invoice, CoordinationError> {
        let timesheet = self.timesheet(timesheet_id)?;
        ensure_timesheet_transition(timesheet.status, TimesheetStatus::Approved)?;

        let assignment = self
            .repository
            .fetch_assignment(&timesheet.assignment_id)?
            .ok_or_else(|| CoordinationError::not_found("assignment", &timesheet.assignment_id))?;
        if !assignment.is_active() {
            return Err(CoordinationError::invalid_timesheet(format!(
                "assignment {} has been voided",
                assignment.id
            )));
        }
        let request = self.request(&assignment.service_request_id)?;
        if request.status != ServiceRequestStatus::Confirmed {
            return Err(CoordinationError::invalid_timesheet(format!(
                "service request {} is {}; only confirmed services are invoiced",
                request.id,
                request.status.label()
            )));
        }
        let worker = self.worker(&assignment.worker_id)?;

        let breakdown =
            self.calculator
                .calculate_scheduled(&timesheet, &worker.classification, &self.rates)?;

        let invoice = Invoice {
            id: InvoiceId(self.next_id("inv")),
            timesheet_id: timesheet.id.clone(),
            assignment_id: assignment.id.clone(),
            service_request_id: request.id.clone(),
            participant_id: request.participant_id.clone(),
            worker_id: worker.id.clone(),
            breakdown,
            issued_at: at,
        };
        let (_, invoice) = self
            .repository
            .approve_timesheet(timesheet.status, invoice)?;

        self.record(
            actor,
            at,
            LedgerEventKind::TimesheetApproved {
                timesheet_id: timesheet.id.clone(),
            },
        )?;
        self.record(
            actor,
            at,
            LedgerEventKind::InvoiceIssued {
                invoice_id: invoice.id.clone(),
                timesheet_id: timesheet.id.clone(),
                total: invoice.breakdown.total,
            },
        )?;
        info!(
            %timesheet_id,
            invoice_id = %invoice.id,
            total = %invoice.breakdown.total,
            "timesheet approved and invoiced"
        );

        self.notify(
            "invoice_issued",
            request.participant_id.as_str(),
            &[
                ("invoice_id", invoice.id.to_string()),
                ("total", invoice.breakdown.total.to_string()),
            ],
        );
        Ok(invoice)
    }

    pub fn reject_timesheet(
        &self,
        timesheet_id: &TimesheetId,
        reason: &str,
        actor: &str,
        at: NaiveDateTime,
    ) -> Result<Timesheet, CoordinationError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(CoordinationError::invalid("a rejection reason is required"));
        }

        let timesheet = self.timesheet(timesheet_id)?;
        ensure_timesheet_transition(timesheet.status, TimesheetStatus::Rejected)?;

        let rejected = self.repository.transition_timesheet(
            timesheet_id,
            timesheet.status,
            TimesheetStatus::Rejected,
        )?;
        self.record(
            actor,
            at,
            LedgerEventKind::TimesheetRejected {
                timesheet_id: timesheet_id.clone(),
                reason: reason.to_string(),
            },
        )?;
        info!(%timesheet_id, reason, "timesheet rejected");

        if let Some(assignment) = self.repository.fetch_assignment(&rejected.assignment_id)? {
            self.notify(
                "timesheet_rejected",
                assignment.worker_id.as_str(),
                &[
                    ("timesheet_id", timesheet_id.to_string()),
                    ("reason", reason.to_string()),
                ],
            );
        }
        Ok(rejected)
    }

    /// Prices a shift against the rate schedule without recording anything.
    pub fn pay_quote(&self, quote: &PayQuote) -> Result<PayBreakdown, CoordinationError> {
        Ok(self
            .calculator
            .calculate_scheduled(&quote.to_timesheet(), &quote.classification, &self.rates)?)
    }

    /// Completes confirmed requests whose approved timesheet shift has ended by `now`.
    pub fn complete_due(
        &self,
        now: NaiveDateTime,
        actor: &str,
    ) -> Result<Vec<ServiceRequest>, CoordinationError> {
        let mut completed = Vec::new();

        for request in self
            .repository
            .requests(Some(ServiceRequestStatus::Confirmed))?
        {
            let Some(assignment) = self
                .repository
                .assignments_for_request(&request.id)?
                .into_iter()
                .find(Assignment::is_active)
            else {
                continue;
            };

            let due = self
                .repository
                .timesheets_for_assignment(&assignment.id)?
                .iter()
                .any(|timesheet| {
                    timesheet.status == TimesheetStatus::Approved && timesheet.shift_end() <= now
                });
            if !due {
                continue;
            }

            match self.repository.transition_request(
                &request.id,
                ServiceRequestStatus::Confirmed,
                ServiceRequestStatus::Completed,
            ) {
                Ok(updated) => {
                    self.record(
                        actor,
                        now,
                        LedgerEventKind::RequestStatusChanged {
                            request_id: updated.id.clone(),
                            from: ServiceRequestStatus::Confirmed,
                            to: ServiceRequestStatus::Completed,
                        },
                    )?;
                    info!(request_id = %updated.id, "service request completed");
                    completed.push(updated);
                }
                Err(RepositoryError::ConcurrentModification { found, .. }) => {
                    warn!(request_id = %request.id, found, "skipped completion after concurrent change");
                }
                Err(other) => return Err(other.into()),
            }
        }

        Ok(completed)
    }

    pub fn events(&self) -> Result<Vec<LedgerEvent>, CoordinationError> {
        Ok(self.repository.events()?)
    }

    pub fn invoices(&self) -> Result<Vec<Invoice>, CoordinationError> {
        Ok(self.repository.invoices()?)
    }
}

/// Credentials are judged as of the service date when it lies in the future.
fn evaluation_date(request: &ServiceRequest, at: NaiveDateTime) -> NaiveDate {
    at.date().max(request.preferred_window.start.date())
}

fn ensure_request_transition(
    from: ServiceRequestStatus,
    to: ServiceRequestStatus,
) -> Result<(), CoordinationError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoordinationError::IllegalTransition {
            entity: "service request",
            from: from.label(),
            to: to.label(),
        })
    }
}

fn ensure_timesheet_transition(
    from: TimesheetStatus,
    to: TimesheetStatus,
) -> Result<(), CoordinationError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoordinationError::IllegalTransition {
            entity: "timesheet",
            from: from.label(),
            to: to.label(),
        })
    }
}

fn validate_shift(timesheet: &Timesheet) -> Result<(), CoordinationError> {
    if timesheet.shift_end() <= timesheet.shift_start() {
        return Err(CoordinationError::invalid_timesheet(
            "shift must end after it starts",
        ));
    }
    if timesheet.billable_minutes() <= 0 {
        return Err(CoordinationError::invalid_timesheet(format!(
            "break of {} minute(s) leaves no billable time",
            timesheet.break_minutes
        )));
    }
    if timesheet
        .travel_kilometres
        .map(|km| km < Decimal::ZERO)
        .unwrap_or(false)
    {
        return Err(CoordinationError::invalid_timesheet(
            "travel distance cannot be negative",
        ));
    }
    Ok(())
}

/// Error raised by the coordination service.
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    #[error("invalid input: {reason}")]
    InvalidInput { reason: String },
    #[error("invalid document: {0}")]
    InvalidDocument(#[from] DocumentViolation),
    #[error("invalid timesheet: {reason}")]
    InvalidTimesheet { reason: String },
    #[error("classification '{classification}' has no base rate in the rate table")]
    UnknownClassification { classification: String },
    #[error("no rate table in force on {date}")]
    NoRateTableInForce { date: NaiveDate },
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("no eligible worker for service request {request_id}")]
    NoEligibleWorker { request_id: ServiceRequestId },
    #[error("worker {worker_id} is not eligible: {}", .reasons.join("; "))]
    WorkerNotEligible {
        worker_id: WorkerId,
        reasons: Vec<String>,
    },
    #[error("{entity} cannot move from {from} to {to}")]
    IllegalTransition {
        entity: &'static str,
        from: &'static str,
        to: &'static str,
    },
    #[error("{entity} {id} was modified concurrently (expected {expected}, found {found})")]
    ConcurrentModification {
        entity: &'static str,
        id: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("worker {worker_id} already holds overlapping assignment {assignment_id}")]
    ScheduleConflict {
        worker_id: WorkerId,
        assignment_id: AssignmentId,
    },
    #[error(transparent)]
    Repository(RepositoryError),
    #[error(transparent)]
    Notification(#[from] NotificationError),
}

impl CoordinationError {
    fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }

    fn invalid_timesheet(reason: impl Into<String>) -> Self {
        Self::InvalidTimesheet {
            reason: reason.into(),
        }
    }

    fn not_found(entity: &'static str, id: &impl std::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::InvalidDocument(_) => ErrorKind::InvalidDocument,
            Self::InvalidTimesheet { .. } => ErrorKind::InvalidTimesheet,
            Self::UnknownClassification { .. } => ErrorKind::UnknownClassification,
            Self::NoRateTableInForce { .. } => ErrorKind::NoRateTableInForce,
            Self::NotFound { .. } | Self::Repository(RepositoryError::NotFound) => {
                ErrorKind::NotFound
            }
            Self::NoEligibleWorker { .. } => ErrorKind::NoEligibleWorker,
            Self::WorkerNotEligible { .. } => ErrorKind::WorkerNotEligible,
            Self::IllegalTransition { .. } => ErrorKind::IllegalTransition,
            Self::ConcurrentModification { .. } => ErrorKind::ConcurrentModification,
            Self::ScheduleConflict { .. } => ErrorKind::ScheduleConflict,
            Self::Repository(RepositoryError::Conflict) => ErrorKind::Conflict,
            Self::Repository(_) => ErrorKind::Unavailable,
            Self::Notification(_) => ErrorKind::NotificationFailed,
        }
    }
}

impl From<RepositoryError> for CoordinationError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::ConcurrentModification {
                entity,
                id,
                expected,
                found,
            } => Self::ConcurrentModification {
                entity,
                id,
                expected,
                found,
            },
            RepositoryError::ScheduleConflict {
                worker_id,
                assignment_id,
            } => Self::ScheduleConflict {
                worker_id,
                assignment_id,
            },
            other => Self::Repository(other),
        }
    }
}

impl From<PayError> for CoordinationError {
    fn from(value: PayError) -> Self {
        match value {
            PayError::InvalidTimesheet { reason } => Self::InvalidTimesheet { reason },
            PayError::UnknownClassification { classification } => {
                Self::UnknownClassification { classification }
            }
            PayError::NoRateTableInForce { date } => Self::NoRateTableInForce { date },
        }
    }
}

/// Stable machine-readable classification of a [`CoordinationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    InvalidDocument,
    InvalidTimesheet,
    UnknownClassification,
    NoRateTableInForce,
    NotFound,
    NoEligibleWorker,
    WorkerNotEligible,
    IllegalTransition,
    ConcurrentModification,
    ScheduleConflict,
    Conflict,
    Unavailable,
    NotificationFailed,
}

impl ErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::InvalidDocument => "invalid_document",
            Self::InvalidTimesheet => "invalid_timesheet",
            Self::UnknownClassification => "unknown_classification",
            Self::NoRateTableInForce => "no_rate_table_in_force",
            Self::NotFound => "not_found",
            Self::NoEligibleWorker => "no_eligible_worker",
            Self::WorkerNotEligible => "worker_not_eligible",
            Self::IllegalTransition => "illegal_transition",
            Self::ConcurrentModification => "concurrent_modification",
            Self::ScheduleConflict => "schedule_conflict",
            Self::Conflict => "conflict",
            Self::Unavailable => "unavailable",
            Self::NotificationFailed => "notification_failed",
        }
    }

    /// What the caller should do next.
    pub const fn action(self) -> &'static str {
        match self {
            Self::InvalidInput | Self::InvalidDocument | Self::InvalidTimesheet => "correct_input",
            Self::UnknownClassification | Self::NoRateTableInForce => "update_rate_table",
            Self::NotFound => "check_identifier",
            Self::NoEligibleWorker => "widen_search",
            Self::WorkerNotEligible | Self::ScheduleConflict => "choose_another_worker",
            Self::IllegalTransition | Self::Conflict => "reload",
            Self::ConcurrentModification => "reload_and_retry",
            Self::Unavailable | Self::NotificationFailed => "retry_later",
        }
    }
}
