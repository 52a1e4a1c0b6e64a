use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

identifier!(
    /// Identifier wrapper for registered support workers.
    WorkerId
);
identifier!(
    /// Identifier wrapper for NDIS participants.
    ParticipantId
);
identifier!(ServiceRequestId);
identifier!(DocumentId);
identifier!(AssignmentId);
identifier!(TimesheetId);
identifier!(InvoiceId);

/// Support categories a request can ask for and a worker can specialize in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    PersonalCare,
    DomesticAssistance,
    RespiteCare,
    CommunityAccess,
    SocialSupport,
    Transport,
    Therapy,
    BehaviourSupport,
    SupportCoordination,
}

impl ServiceCategory {
    pub const fn label(self) -> &'static str {
        match self {
            Self::PersonalCare => "Personal Care",
            Self::DomesticAssistance => "Domestic Assistance",
            Self::RespiteCare => "Respite Care",
            Self::CommunityAccess => "Community Access",
            Self::SocialSupport => "Social Support",
            Self::Transport => "Transport",
            Self::Therapy => "Therapy",
            Self::BehaviourSupport => "Behaviour Support",
            Self::SupportCoordination => "Support Coordination",
        }
    }

    /// Categories sharing a family are treated as related specializations when scoring.
    pub const fn family(self) -> CategoryFamily {
        match self {
            Self::PersonalCare | Self::DomesticAssistance | Self::RespiteCare => {
                CategoryFamily::DailyLiving
            }
            Self::CommunityAccess | Self::SocialSupport | Self::Transport => {
                CategoryFamily::Community
            }
            Self::Therapy | Self::BehaviourSupport => CategoryFamily::Clinical,
            Self::SupportCoordination => CategoryFamily::Coordination,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFamily {
    DailyLiving,
    Community,
    Clinical,
    Coordination,
}

/// Credential kinds tracked for worker compliance.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    NdisWorkerScreening,
    WorkingWithChildrenCheck,
    PoliceCheck,
    FirstAid,
    Cpr,
    NdisOrientationModule,
    ManualHandlingTraining,
    InfectionControlTraining,
    MedicationTraining,
    PositiveBehaviourSupportTraining,
    DriversLicence,
    VehicleInsurance,
    PublicLiabilityInsurance,
}

impl DocumentType {
    pub const fn label(self) -> &'static str {
        match self {
            Self::NdisWorkerScreening => "NDIS Worker Screening Check",
            Self::WorkingWithChildrenCheck => "Working With Children Check",
            Self::PoliceCheck => "National Police Check",
            Self::FirstAid => "First Aid Certificate",
            Self::Cpr => "CPR Certificate",
            Self::NdisOrientationModule => "NDIS Worker Orientation Module",
            Self::ManualHandlingTraining => "Manual Handling Training",
            Self::InfectionControlTraining => "Infection Control Training",
            Self::MedicationTraining => "Medication Administration Training",
            Self::PositiveBehaviourSupportTraining => "Positive Behaviour Support Training",
            Self::DriversLicence => "Driver's Licence",
            Self::VehicleInsurance => "Comprehensive Vehicle Insurance",
            Self::PublicLiabilityInsurance => "Public Liability Insurance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

/// Uploaded credential. Only `verification_status` changes after upload; renewals add a new
/// document and keep the old one for audit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceDocument {
    pub id: DocumentId,
    pub document_type: DocumentType,
    pub holder_id: WorkerId,
    pub issued_date: NaiveDate,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    pub verification_status: VerificationStatus,
    pub uploaded_at: NaiveDateTime,
}

/// Geographic position used for radius checks and proximity scoring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postcode: Option<String>,
}

const EARTH_RADIUS_KM: f64 = 6371.0088;

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            postcode: None,
        }
    }

    /// Great-circle distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_KM * c
    }
}

/// Half-open interval of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        if self.end > self.start {
            self.end - self.start
        } else {
            Duration::zero()
        }
    }

    pub fn overlap(&self, other: &TimeWindow) -> Duration {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end > start {
            end - start
        } else {
            Duration::zero()
        }
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.overlap(other) > Duration::zero()
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub name: String,
    pub location: GeoPoint,
    pub hourly_rate: Decimal,
    /// SCHADS classification key used for rate table lookups.
    pub classification: String,
    pub working_radius_km: f64,
    pub specializations: BTreeSet<ServiceCategory>,
    #[serde(default)]
    pub documents: Vec<ComplianceDocument>,
    #[serde(default)]
    pub availability: Vec<TimeWindow>,
    /// Completed-service ratings on a 1-5 scale.
    #[serde(default)]
    pub ratings: Vec<f32>,
    pub registered_at: NaiveDateTime,
}

impl Worker {
    pub fn average_rating(&self) -> Option<f32> {
        if self.ratings.is_empty() {
            return None;
        }
        let sum: f32 = self.ratings.iter().sum();
        Some(sum / self.ratings.len() as f32)
    }

    pub fn document(&self, id: &DocumentId) -> Option<&ComplianceDocument> {
        self.documents.iter().find(|doc| &doc.id == id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceRequestStatus {
    Submitted,
    UnderReview,
    Assigned,
    Confirmed,
    Completed,
    Cancelled,
}

impl ServiceRequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::UnderReview => "under_review",
            Self::Assigned => "assigned",
            Self::Confirmed => "confirmed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: ServiceRequestId,
    pub participant_id: ParticipantId,
    pub category: ServiceCategory,
    #[serde(default)]
    pub required_specializations: BTreeSet<ServiceCategory>,
    pub location: GeoPoint,
    pub preferred_window: TimeWindow,
    pub urgency: Urgency,
    pub status: ServiceRequestStatus,
    pub submitted_at: NaiveDateTime,
}

impl ServiceRequest {
    /// Required specializations plus the request's own category.
    pub fn required_categories(&self) -> BTreeSet<ServiceCategory> {
        let mut categories = self.required_specializations.clone();
        categories.insert(self.category);
        categories
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Voided,
}

impl AssignmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Voided => "voided",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub service_request_id: ServiceRequestId,
    pub worker_id: WorkerId,
    pub assigned_at: NaiveDateTime,
    pub assigned_by: String,
    pub match_score_at_assignment: f64,
    pub status: AssignmentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voided_at: Option<NaiveDateTime>,
}

impl Assignment {
    pub fn is_active(&self) -> bool {
        self.status == AssignmentStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimesheetStatus {
    Submitted,
    Approved,
    Rejected,
}

impl TimesheetStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timesheet {
    pub id: TimesheetId,
    pub assignment_id: AssignmentId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    /// Set for overnight shifts whose `end_time` falls on the following day.
    #[serde(default)]
    pub ends_next_day: bool,
    #[serde(default)]
    pub break_minutes: u32,
    #[serde(default)]
    pub travel_minutes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub travel_kilometres: Option<Decimal>,
    #[serde(default)]
    pub notes: String,
    pub status: TimesheetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supersedes: Option<TimesheetId>,
    pub submitted_at: NaiveDateTime,
}

impl Timesheet {
    pub fn shift_start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn shift_end(&self) -> NaiveDateTime {
        let end_date = if self.ends_next_day {
            self.date + Duration::days(1)
        } else {
            self.date
        };
        end_date.and_time(self.end_time)
    }

    pub fn worked_minutes(&self) -> i64 {
        (self.shift_end() - self.shift_start()).num_minutes()
    }

    pub fn billable_minutes(&self) -> i64 {
        self.worked_minutes() - i64::from(self.break_minutes)
    }
}
