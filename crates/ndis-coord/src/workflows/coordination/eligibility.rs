use chrono::NaiveDate;
use serde::Serialize;

use super::compliance::{CompliancePolicy, ComplianceStatus};
use super::domain::{DocumentType, ServiceCategory, ServiceRequest, Worker, WorkerId};

/// Why a worker was excluded from a request's candidate pool.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum IneligibilityReason {
    MissingDocument {
        document_type: DocumentType,
    },
    NonCompliantDocument {
        document_type: DocumentType,
        status: ComplianceStatus,
    },
    MissingSpecialization {
        category: ServiceCategory,
    },
    OutsideWorkingRadius {
        distance_km: f64,
        radius_km: f64,
    },
}

impl IneligibilityReason {
    pub fn summary(&self) -> String {
        match self {
            Self::MissingDocument { document_type } => {
                format!("missing {}", document_type.label())
            }
            Self::NonCompliantDocument {
                document_type,
                status,
            } => format!("{} is {}", document_type.label(), status.label()),
            Self::MissingSpecialization { category } => {
                format!("no {} specialization", category.label())
            }
            Self::OutsideWorkingRadius {
                distance_km,
                radius_km,
            } => format!(
                "{:.1} km away, outside {:.1} km working radius",
                distance_km, radius_km
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityVerdict {
    pub worker_id: WorkerId,
    pub distance_km: f64,
    pub reasons: Vec<IneligibilityReason>,
}

impl EligibilityVerdict {
    pub fn is_eligible(&self) -> bool {
        self.reasons.is_empty()
    }
}

/// Filters a roster down to workers who are compliant, qualified, and within range.
#[derive(Debug, Clone, Default)]
pub struct EligibilityFilter {
    policy: CompliancePolicy,
}

impl EligibilityFilter {
    pub fn new(policy: CompliancePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CompliancePolicy {
        &self.policy
    }

    /// Full assessment of one worker. Pending, rejected, expired, or missing mandated
    /// documents all exclude the worker.
    pub fn assess(
        &self,
        request: &ServiceRequest,
        worker: &Worker,
        as_of: NaiveDate,
    ) -> EligibilityVerdict {
        let mut reasons = Vec::new();
        let required = request.required_categories();

        let mandated = self.policy.mandated_for(required.iter());
        for finding in self.policy.review(worker, &mandated, as_of) {
            match finding.status {
                None => reasons.push(IneligibilityReason::MissingDocument {
                    document_type: finding.document_type,
                }),
                Some(status) if !status.is_valid() => {
                    reasons.push(IneligibilityReason::NonCompliantDocument {
                        document_type: finding.document_type,
                        status,
                    })
                }
                Some(_) => {}
            }
        }

        for category in &required {
            if !worker.specializations.contains(category) {
                reasons.push(IneligibilityReason::MissingSpecialization {
                    category: *category,
                });
            }
        }

        let distance_km = worker.location.distance_km(&request.location);
        if !distance_km.is_finite() || distance_km > worker.working_radius_km {
            reasons.push(IneligibilityReason::OutsideWorkingRadius {
                distance_km,
                radius_km: worker.working_radius_km,
            });
        }

        EligibilityVerdict {
            worker_id: worker.id.clone(),
            distance_km,
            reasons,
        }
    }

    /// Workers eligible for the request, in roster order. An empty result is a normal outcome.
    pub fn eligible<'a>(
        &self,
        request: &ServiceRequest,
        workers: &'a [Worker],
        as_of: NaiveDate,
    ) -> Vec<&'a Worker> {
        workers
            .iter()
            .filter(|worker| self.assess(request, worker, as_of).is_eligible())
            .collect()
    }

    pub fn assess_all(
        &self,
        request: &ServiceRequest,
        workers: &[Worker],
        as_of: NaiveDate,
    ) -> Vec<EligibilityVerdict> {
        workers
            .iter()
            .map(|worker| self.assess(request, worker, as_of))
            .collect()
    }
}
