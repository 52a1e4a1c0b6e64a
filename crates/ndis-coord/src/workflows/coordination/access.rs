use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

/// Header carrying the caller's role, set by the upstream identity gateway.
pub const ROLE_HEADER: &str = "x-ndis-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Participant,
    SupportWorker,
    Admin,
    TeamLeader,
    Compliance,
}

/// Operations gated at the HTTP boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    RegisterWorker,
    ViewWorker,
    UploadDocument,
    VerifyDocument,
    ViewComplianceAlerts,
    SubmitRequest,
    ViewRequest,
    ReviewRequest,
    ViewCandidates,
    AssignWorker,
    ConfirmRequest,
    CancelRequest,
    ViewAssignments,
    SubmitTimesheet,
    DecideTimesheet,
    QuotePay,
    RunCompletions,
    ViewLedger,
    ViewInvoices,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Participant => "participant",
            Self::SupportWorker => "support_worker",
            Self::Admin => "admin",
            Self::TeamLeader => "team_leader",
            Self::Compliance => "compliance",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "participant" => Some(Self::Participant),
            "support_worker" | "worker" => Some(Self::SupportWorker),
            "admin" => Some(Self::Admin),
            "team_leader" => Some(Self::TeamLeader),
            "compliance" => Some(Self::Compliance),
            _ => None,
        }
    }

    pub fn from_headers(headers: &HeaderMap) -> Option<Self> {
        headers
            .get(ROLE_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::parse)
    }

    /// The single role-to-capability table.
    pub const fn permits(self, capability: Capability) -> bool {
        use Capability::*;
        use Role::*;

        match capability {
            RegisterWorker | RunCompletions => matches!(self, Admin),
            ViewWorker => matches!(self, Admin | TeamLeader | Compliance | SupportWorker),
            UploadDocument => matches!(self, Admin | Compliance | SupportWorker),
            VerifyDocument => matches!(self, Admin | Compliance),
            ViewComplianceAlerts => matches!(self, Admin | TeamLeader | Compliance),
            SubmitRequest => matches!(self, Admin | Participant),
            ViewRequest => true,
            ReviewRequest | ViewCandidates | AssignWorker | ConfirmRequest | DecideTimesheet => {
                matches!(self, Admin | TeamLeader)
            }
            CancelRequest => matches!(self, Admin | TeamLeader | Participant),
            ViewAssignments => matches!(self, Admin | TeamLeader | SupportWorker),
            SubmitTimesheet => matches!(self, Admin | SupportWorker),
            QuotePay => matches!(self, Admin | TeamLeader | SupportWorker),
            ViewLedger => matches!(self, Admin | Compliance),
            ViewInvoices => matches!(self, Admin | TeamLeader),
        }
    }
}
